use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub sheet_id: String,
    pub google_api_key: Option<String>,
    pub google_access_token: Option<String>,
    pub default_tab: String,
    pub welcome_tab: String,
    pub sheet_cache_ttl: Duration,
    pub panel_timeout: Duration,
    pub command_prefix: String,
    pub register_commands: bool,

    // Welcome module
    pub welcome_enabled: bool,
    pub welcome_allowed_roles: Vec<u64>,
    pub log_channel_id: Option<u64>,
    pub general_channel_id: Option<u64>,
    pub footer_emoji_id: Option<u64>,

    // Daily recruiter summary
    pub recruiters_channel_id: Option<u64>,
    pub recruiter_role_ids: Vec<u64>,
    pub daily_summary_hour_utc: u32,
}

const SHEET_ID_VARS: [&str; 3] = ["GSHEET_ID", "GOOGLE_SHEET_ID", "CONFIG_SHEET_ID"];

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let sheet_id = SHEET_ID_VARS
            .iter()
            .find_map(|name| env::var(name).ok().filter(|v| !v.trim().is_empty()))
            .ok_or_else(|| {
                anyhow::anyhow!("Set GSHEET_ID (or GOOGLE_SHEET_ID / CONFIG_SHEET_ID)")
            })?;

        let google_api_key = non_empty_var("GOOGLE_API_KEY");
        let google_access_token = non_empty_var("GOOGLE_ACCESS_TOKEN");
        if google_api_key.is_none() && google_access_token.is_none() {
            anyhow::bail!("Set GOOGLE_API_KEY or GOOGLE_ACCESS_TOKEN");
        }

        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            sheet_id: sheet_id.trim().to_string(),
            google_api_key,
            google_access_token,
            default_tab: env::var("C1C_MATCH_TAB").unwrap_or_else(|_| "bot_info".to_string()),
            welcome_tab: env::var("WELCOME_TAB")
                .unwrap_or_else(|_| "WelcomeTemplates".to_string()),
            sheet_cache_ttl: duration_var("SHEET_CACHE_TTL", Duration::from_secs(30))?,
            panel_timeout: duration_var("PANEL_TIMEOUT", Duration::from_secs(300))?,
            command_prefix: env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),
            register_commands: env::var("REGISTER_COMMANDS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            welcome_enabled: env::var("WELCOME_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            welcome_allowed_roles: id_list_var("WELCOME_ALLOWED_ROLES"),
            log_channel_id: id_var("LOG_CHANNEL_ID"),
            general_channel_id: id_var("WELCOME_GENERAL_CHANNEL_ID"),
            footer_emoji_id: id_var("C1C_FOOTER_EMOJI_ID"),

            recruiters_channel_id: id_var("RECRUITERS_CHANNEL_ID"),
            recruiter_role_ids: id_list_var("RECRUITER_ROLE_IDS"),
            daily_summary_hour_utc: env::var("DAILY_SUMMARY_HOUR_UTC")
                .unwrap_or_else(|_| "17".to_string())
                .parse::<u32>()
                .ok()
                .filter(|h| *h < 24)
                .unwrap_or(17),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn duration_var(name: &str, default: Duration) -> anyhow::Result<Duration> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => parse_duration(name, &raw),
        _ => Ok(default),
    }
}

/// Parses a humantime duration; zero is rejected since it drives timers.
fn parse_duration(name: &str, raw: &str) -> anyhow::Result<Duration> {
    let value = humantime::parse_duration(raw.trim())
        .map_err(|e| anyhow::anyhow!("{} must be a duration like 30s or 5m: {}", name, e))?;
    if value.is_zero() {
        anyhow::bail!("{} must be longer than zero", name);
    }
    Ok(value)
}

/// Parses a comma separated list of Discord ids, skipping anything that is
/// not a non-zero number.
pub fn parse_id_list(raw: &str) -> Vec<u64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .filter(|id| *id != 0)
        .collect()
}

fn id_var(name: &str) -> Option<u64> {
    env::var(name)
        .ok()
        .and_then(|id| id.trim().parse().ok())
        .filter(|id| *id != 0)
}

fn id_list_var(name: &str) -> Vec<u64> {
    env::var(name).map(|raw| parse_id_list(&raw)).unwrap_or_default()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("sheet_id", &self.sheet_id)
            .field(
                "google_api_key",
                &self.google_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "google_access_token",
                &self.google_access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("default_tab", &self.default_tab)
            .field("welcome_tab", &self.welcome_tab)
            .field("sheet_cache_ttl", &self.sheet_cache_ttl)
            .field("panel_timeout", &self.panel_timeout)
            .field("command_prefix", &self.command_prefix)
            .field("register_commands", &self.register_commands)
            .field("welcome_enabled", &self.welcome_enabled)
            .field("welcome_allowed_roles", &self.welcome_allowed_roles)
            .field("log_channel_id", &self.log_channel_id)
            .field("general_channel_id", &self.general_channel_id)
            .field("footer_emoji_id", &self.footer_emoji_id)
            .field("recruiters_channel_id", &self.recruiters_channel_id)
            .field("recruiter_role_ids", &self.recruiter_role_ids)
            .field("daily_summary_hour_utc", &self.daily_summary_hour_utc)
            .finish()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
/// Embed description limit is 4096 characters
pub const DISCORD_EMBED_LIMIT: usize = 4096;

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        discord_token: "test".to_string(),
        sheet_id: "sheet".to_string(),
        google_api_key: Some("key".to_string()),
        google_access_token: None,
        default_tab: "bot_info".to_string(),
        welcome_tab: "WelcomeTemplates".to_string(),
        sheet_cache_ttl: Duration::from_secs(30),
        panel_timeout: Duration::from_secs(300),
        command_prefix: "!".to_string(),
        register_commands: false,
        welcome_enabled: true,
        welcome_allowed_roles: Vec::new(),
        log_channel_id: None,
        general_channel_id: None,
        footer_emoji_id: None,
        recruiters_channel_id: None,
        recruiter_role_ids: Vec::new(),
        daily_summary_hour_utc: 17,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("1, 2,abc,,0,3 "), vec![1, 2, 3]);
        assert!(parse_id_list("").is_empty());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(
            parse_duration("SHEET_CACHE_TTL", " 2m ").unwrap(),
            Duration::from_secs(120)
        );
        assert!(parse_duration("SHEET_CACHE_TTL", "0s").is_err());
        assert!(parse_duration("PANEL_TIMEOUT", "later").is_err());
    }

    #[test]
    fn test_config_logic() {
        // 1. Test missing vars
        env::remove_var("DISCORD_TOKEN");
        for name in SHEET_ID_VARS {
            env::remove_var(name);
        }
        env::remove_var("GOOGLE_API_KEY");
        env::remove_var("GOOGLE_ACCESS_TOKEN");
        assert!(Config::build().is_err(), "Should fail when required vars are missing");

        // 2. Sheet id aliases and credentials
        env::set_var("DISCORD_TOKEN", "test_token");
        env::set_var("CONFIG_SHEET_ID", "from_config");
        assert!(Config::build().is_err(), "Should fail without Sheets credentials");

        env::set_var("GOOGLE_API_KEY", "secret_api_key");
        let config = Config::build().unwrap();
        assert_eq!(config.sheet_id, "from_config");
        assert_eq!(config.default_tab, "bot_info");
        assert_eq!(config.sheet_cache_ttl, Duration::from_secs(30));
        assert_eq!(config.daily_summary_hour_utc, 17);

        env::set_var("GSHEET_ID", "primary");
        env::set_var("SHEET_CACHE_TTL", "45s");
        let config = Config::build().unwrap();
        assert_eq!(config.sheet_id, "primary");
        assert_eq!(config.sheet_cache_ttl, Duration::from_secs(45));

        env::set_var("SHEET_CACHE_TTL", "soon");
        assert!(Config::build().is_err());
        env::remove_var("SHEET_CACHE_TTL");

        // 3. Test debug redaction
        let debug_output = format!("{:?}", Config::build().unwrap());
        assert!(!debug_output.contains("test_token"));
        assert!(!debug_output.contains("secret_api_key"));
        assert!(debug_output.contains("[REDACTED]"));

        // Cleanup
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("GSHEET_ID");
        env::remove_var("CONFIG_SHEET_ID");
        env::remove_var("GOOGLE_API_KEY");
    }
}
