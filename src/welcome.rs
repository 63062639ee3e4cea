use chrono::{DateTime, Utc};
use chrono_tz::Europe::Vienna;
use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{error, info, warn};

use crate::emoji::{self, GuildEmoji};
use crate::sheets::{Record, SheetError, Table};

/// Row holding the fallback text for clans without their own copy.
pub const DEFAULT_TEMPLATE_TAG: &str = "C1C";

pub const DEFAULT_GENERAL_NOTICE: &str = "A new flame joins the cult — welcome {MENTION} to {CLAN}!\n\
Be loud, be nerdy, and maybe even helpful. You know the drill, C1C.";

const LOG_PREFIX: &str = "c1c-matchmaker/welcome";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WelcomeTemplate {
    pub tag: String,
    pub target_channel_id: String,
    pub title: String,
    pub body: String,
    pub footer: String,
    pub crest_url: String,
    pub ping_user: bool,
    pub active: bool,
    pub clan_lead: String,
    pub deputies: String,
    pub general_notice: String,
}

impl WelcomeTemplate {
    fn from_record(record: &Record) -> Option<Self> {
        let text = |key: &str| record.get(key).unwrap_or_default().to_string();
        let flag = |key: &str| record.get(key).is_some_and(|v| v.trim().eq_ignore_ascii_case("y"));

        let tag = record.get("TAG")?.trim().to_uppercase();
        if tag.is_empty() {
            return None;
        }
        Some(Self {
            tag,
            target_channel_id: text("TARGET_CHANNEL_ID").trim().to_string(),
            title: text("TITLE"),
            body: text("BODY"),
            footer: text("FOOTER"),
            crest_url: text("CREST_URL").trim().to_string(),
            ping_user: flag("PING_USER"),
            active: flag("ACTIVE"),
            clan_lead: text("CLANLEAD"),
            deputies: text("DEPUTIES"),
            general_notice: text("GENERAL_NOTICE"),
        })
    }

    /// Target channel, when the sheet holds a usable id.
    pub fn channel_id(&self) -> Option<u64> {
        if self.target_channel_id.is_empty()
            || !self.target_channel_id.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        self.target_channel_id.parse().ok().filter(|id| *id != 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WelcomeTemplates {
    clans: HashMap<String, WelcomeTemplate>,
    default: Option<WelcomeTemplate>,
}

impl WelcomeTemplates {
    pub fn from_table(table: &Table) -> Self {
        let mut templates = Self::default();
        for template in table.records.iter().filter_map(WelcomeTemplate::from_record) {
            if template.tag == DEFAULT_TEMPLATE_TAG {
                templates.default = Some(template);
            } else {
                templates.clans.insert(template.tag.clone(), template);
            }
        }
        templates
    }

    pub fn len(&self) -> usize {
        self.clans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clans.is_empty()
    }

    pub fn default_template(&self) -> Option<&WelcomeTemplate> {
        self.default.as_ref()
    }

    /// The template to post for a clan. An active clan row is used as is;
    /// an inactive one keeps its routing but takes the text from the
    /// default row. Without a clan row there is no channel to post to.
    pub fn effective(&self, tag: &str) -> Option<WelcomeTemplate> {
        let clan = self.clans.get(&tag.to_uppercase())?;
        if clan.active {
            return Some(clan.clone());
        }
        let default = self.default.as_ref()?;
        Some(WelcomeTemplate {
            title: default.title.clone(),
            body: default.body.clone(),
            footer: default.footer.clone(),
            ping_user: default.ping_user,
            ..clan.clone()
        })
    }

    pub fn general_notice(&self) -> &str {
        self.default
            .as_ref()
            .map(|d| d.general_notice.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_GENERAL_NOTICE)
    }
}

/// Values substituted into template text.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    pub mention: String,
    pub username: String,
    pub clan: String,
    pub guild: String,
    pub now: String,
    pub inviter: String,
}

/// `{NOW}` in Vienna local time.
pub fn format_now(now: DateTime<Utc>) -> String {
    now.with_timezone(&Vienna)
        .format("%a, %d %b %Y %H:%M")
        .to_string()
}

pub fn expand(text: &str, values: &Placeholders, emojis: &[GuildEmoji]) -> String {
    if text.is_empty() {
        return String::new();
    }
    let replaced = text
        .replace("{MENTION}", &values.mention)
        .replace("{USERNAME}", &values.username)
        .replace("{CLAN}", &values.clan)
        .replace("{GUILD}", &values.guild)
        .replace("{NOW}", &values.now)
        .replace("{INVITER}", &values.inviter);
    emoji::replace_emoji_tokens(&replaced, emojis)
}

/// Drops "Clan Lead:" / "Deputies:" lines left empty after substitution
/// and collapses runs of blank lines.
pub fn strip_empty_role_lines(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| {
            let raw = line.trim();
            !((raw.contains("Clan Lead") || raw.contains("Deputies")) && raw.ends_with(':'))
        })
        .collect();
    let mut joined = kept.join("\n");
    while joined.contains("\n\n\n") {
        joined = joined.replace("\n\n\n", "\n\n");
    }
    joined.trim_matches('\n').to_string()
}

/// Full expansion used for the clan embed.
pub fn expand_all(
    text: &str,
    template: &WelcomeTemplate,
    values: &Placeholders,
    emojis: &[GuildEmoji],
) -> String {
    let text = text
        .replace("{CLANLEAD}", &template.clan_lead)
        .replace("{DEPUTIES}", &template.deputies);
    strip_empty_role_lines(&expand(&text, values, emojis))
}

pub fn has_permission(member_roles: &[u64], allowed: &[u64]) -> bool {
    allowed.is_empty() || member_roles.iter().any(|r| allowed.contains(r))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

pub fn format_log_line(level: LogLevel, msg: &str, kv: &[(&str, Option<String>)]) -> String {
    let mut line = format!("[{}/{}] {}", LOG_PREFIX, level.as_str(), msg);
    let pairs: Vec<String> = kv
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| format!("{}={}", k, v)))
        .collect();
    if !kv.is_empty() {
        line.push_str(" • ");
        line.push_str(&pairs.join(" "));
    }
    line
}

/// Logs locally and mirrors the line into the log channel. Mirroring
/// failures are swallowed.
pub async fn log_to_channel(
    http: &serenity::Http,
    channel_id: Option<u64>,
    level: LogLevel,
    msg: &str,
    kv: &[(&str, Option<String>)],
) {
    let line = format_log_line(level, msg, kv);
    match level {
        LogLevel::Info => info!("{}", line),
        LogLevel::Warn => warn!("{}", line),
        LogLevel::Error => error!("{}", line),
    }
    let Some(id) = channel_id else {
        return;
    };
    if let Err(e) = serenity::ChannelId::new(id).say(http, &line).await {
        warn!("Could not mirror welcome log to channel {}: {}", id, e);
    }
}

/// Runtime state of the welcome module.
pub struct WelcomeState {
    templates: RwLock<WelcomeTemplates>,
    enabled_default: bool,
    enabled_override: RwLock<Option<bool>>,
}

impl WelcomeState {
    pub fn new(enabled_default: bool) -> Self {
        Self {
            templates: RwLock::new(WelcomeTemplates::default()),
            enabled_default,
            enabled_override: RwLock::new(None),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled_override
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or(self.enabled_default)
    }

    pub fn set_enabled(&self, on: bool) {
        *self
            .enabled_override
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(on);
    }

    /// `(ENABLED|DISABLED, runtime_override|env_default)`
    pub fn status(&self) -> (&'static str, &'static str) {
        let overridden = self
            .enabled_override
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        let state = if self.enabled() { "ENABLED" } else { "DISABLED" };
        let source = if overridden {
            "runtime_override"
        } else {
            "env_default"
        };
        (state, source)
    }

    pub fn replace_templates(&self, templates: WelcomeTemplates) {
        *self.templates.write().unwrap_or_else(PoisonError::into_inner) = templates;
    }

    pub fn effective(&self, tag: &str) -> Option<WelcomeTemplate> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .effective(tag)
    }

    pub fn general_notice(&self) -> String {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .general_notice()
            .to_string()
    }

    /// Swaps in templates from a freshly read sheet and returns
    /// `(clan rows, has default row)`.
    pub fn load(&self, table: &Table) -> (usize, bool) {
        let templates = WelcomeTemplates::from_table(table);
        let summary = (templates.len(), templates.default_template().is_some());
        self.replace_templates(templates);
        summary
    }

    /// Rereads the template tab and mirrors the outcome to the log channel.
    pub async fn reload(
        &self,
        http: &serenity::Http,
        sheets: &crate::sheets::SheetService,
        tab: &str,
        log_channel: Option<u64>,
    ) -> Result<(), SheetError> {
        match sheets.fresh_table(Some(tab)).await {
            Ok(table) => {
                let (rows, has_default) = self.load(&table);
                log_to_channel(
                    http,
                    log_channel,
                    LogLevel::Info,
                    "Templates reloaded",
                    &[
                        ("rows", Some(rows.to_string())),
                        ("has_default", Some(has_default.to_string())),
                    ],
                )
                .await;
                Ok(())
            }
            Err(e) => {
                log_to_channel(
                    http,
                    log_channel,
                    LogLevel::Error,
                    "Sheet error while loading templates",
                    &[("error", Some(e.to_string()))],
                )
                .await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::table::table_from;
    use chrono::TimeZone;

    fn templates() -> WelcomeTemplates {
        let table = table_from(&[
            &[
                "TAG",
                "TARGET_CHANNEL_ID",
                "TITLE",
                "BODY",
                "FOOTER",
                "CREST_URL",
                "PING_USER",
                "ACTIVE",
                "CLANLEAD",
                "DEPUTIES",
                "GENERAL_NOTICE",
            ],
            &["C1C", "", "Welcome {USERNAME}", "Default body", "C1C", "", "Y", "Y", "", "", "Hi {MENTION}"],
            &["alp", "123", "Alpha!", "Lead: {CLANLEAD}", "", "", "N", "Y", "Ann", "", ""],
            &["BET", "456", "Beta", "Beta body", "Beta foot", "", "N", "N", "", "", ""],
            &["", "789", "orphan", "", "", "", "", "Y", "", "", ""],
        ]);
        WelcomeTemplates::from_table(&table)
    }

    #[test]
    fn test_templates_loaded_by_upper_tag() {
        let t = templates();
        assert_eq!(t.len(), 2);
        assert!(t.default_template().is_some());
        assert_eq!(t.effective("Alp").map(|r| r.title), Some("Alpha!".to_string()));
    }

    #[test]
    fn test_inactive_row_takes_default_text() {
        let t = templates();
        let eff = t.effective("bet").unwrap();
        assert_eq!(eff.title, "Welcome {USERNAME}");
        assert_eq!(eff.body, "Default body");
        assert_eq!(eff.footer, "C1C");
        assert!(eff.ping_user);
        assert_eq!(eff.channel_id(), Some(456));
    }

    #[test]
    fn test_missing_clan_has_no_template() {
        let t = templates();
        assert!(t.effective("GAM").is_none());

        let mut no_default = templates();
        no_default.default = None;
        assert!(no_default.effective("BET").is_none());
        assert!(no_default.effective("ALP").is_some());
        assert_eq!(no_default.general_notice(), DEFAULT_GENERAL_NOTICE);
    }

    #[test]
    fn test_channel_id_validation() {
        let mut row = WelcomeTemplate {
            target_channel_id: "12a".to_string(),
            ..Default::default()
        };
        assert_eq!(row.channel_id(), None);
        row.target_channel_id = "0".to_string();
        assert_eq!(row.channel_id(), None);
        row.target_channel_id = "42".to_string();
        assert_eq!(row.channel_id(), Some(42));
    }

    #[test]
    fn test_expand_placeholders() {
        let values = Placeholders {
            mention: "<@1>".to_string(),
            username: "Neo".to_string(),
            clan: "ALP".to_string(),
            guild: "C1C".to_string(),
            now: "now".to_string(),
            inviter: "Trinity".to_string(),
        };
        assert_eq!(
            expand("{MENTION} {USERNAME} joined {CLAN} in {GUILD} at {NOW} via {INVITER}", &values, &[]),
            "<@1> Neo joined ALP in C1C at now via Trinity"
        );
        assert_eq!(expand("", &values, &[]), "");
    }

    #[test]
    fn test_strip_empty_role_lines() {
        let text = "Hello\nClan Lead: \nDeputies:\n\n\n\nBye\n";
        assert_eq!(strip_empty_role_lines(text), "Hello\n\nBye");
        assert_eq!(strip_empty_role_lines("Clan Lead: Ann"), "Clan Lead: Ann");
    }

    #[test]
    fn test_expand_all_fills_roles() {
        let t = templates();
        let eff = t.effective("ALP").unwrap();
        let body = expand_all("Clan Lead: {CLANLEAD}\nDeputies: {DEPUTIES}\nEnjoy", &eff, &Placeholders::default(), &[]);
        assert_eq!(body, "Clan Lead: Ann\nEnjoy");
    }

    #[test]
    fn test_permission_check() {
        assert!(has_permission(&[], &[]));
        assert!(has_permission(&[5], &[]));
        assert!(has_permission(&[1, 5], &[5, 9]));
        assert!(!has_permission(&[1], &[5]));
    }

    #[test]
    fn test_log_line_format() {
        let line = format_log_line(
            LogLevel::Warn,
            "General notice failed",
            &[("tag", Some("ALP".to_string())), ("channel", None)],
        );
        assert_eq!(line, "[c1c-matchmaker/welcome/WARN] General notice failed • tag=ALP");
        assert_eq!(
            format_log_line(LogLevel::Info, "Status query", &[]),
            "[c1c-matchmaker/welcome/INFO] Status query"
        );
    }

    #[test]
    fn test_format_now() {
        let winter = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        assert_eq!(format_now(winter), "Sat, 09 Mar 2024 08:05");
        let summer = Utc.with_ymd_and_hms(2024, 7, 1, 22, 30, 0).unwrap();
        assert_eq!(format_now(summer), "Tue, 02 Jul 2024 00:30");
    }

    #[tokio::test]
    async fn test_reload_from_sheet() {
        use crate::sheets::testing::MemorySheets;
        use crate::sheets::{SheetCache, SheetService};
        use std::sync::Arc;
        use std::time::Duration;

        let source = Arc::new(MemorySheets::new(&[(
            "WelcomeTemplates",
            "TAG|TARGET_CHANNEL_ID|TITLE|ACTIVE\nC1C||Hello|Y\nALP|55|Alpha|N",
        )]));
        let sheets = SheetService::new(source.clone(), SheetCache::new(Duration::from_secs(30)), "bot_info");
        let http = serenity::Http::new("");
        let state = WelcomeState::new(true);

        state.reload(&http, &sheets, "welcometemplates", None).await.unwrap();
        let eff = state.effective("ALP").unwrap();
        assert_eq!(eff.title, "Hello");
        assert_eq!(eff.channel_id(), Some(55));

        // A second reload bypasses the cache.
        state.reload(&http, &sheets, "WelcomeTemplates", None).await.unwrap();
        assert_eq!(source.fetch_count(), 2);

        assert!(state.reload(&http, &sheets, "Missing", None).await.is_err());
    }

    #[test]
    fn test_state_override_and_load() {
        let state = WelcomeState::new(true);
        assert_eq!(state.status(), ("ENABLED", "env_default"));
        state.set_enabled(false);
        assert!(!state.enabled());
        assert_eq!(state.status(), ("DISABLED", "runtime_override"));

        let table = table_from(&[&["TAG", "TARGET_CHANNEL_ID", "ACTIVE"], &["ALP", "1", "Y"]]);
        assert_eq!(state.load(&table), (1, false));
        assert!(state.effective("alp").is_some());
        assert_eq!(state.general_notice(), DEFAULT_GENERAL_NOTICE);
    }
}
