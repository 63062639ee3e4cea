//! Turns a clan row into display text: the clan card, the profile card
//! shown on 💡, and the one-line list entry.

use poise::serenity_prelude as serenity;

use crate::config::DISCORD_EMBED_LIMIT;
use crate::emoji::{self, GuildEmoji};
use crate::matching::{PLAYSTYLE_KEYS, SPOTS_KEYS};
use crate::sheets::Record;

pub const CARD_COLOR: u32 = 0x5865F2;
pub const PROFILE_EMOJI: &str = "💡";
pub const CARD_FOOTER: &str = "React with 💡 for Clan Profile";

pub const TAG_KEYS: [&str; 3] = ["ClanTag", "Clan Tag", "Tag"];
pub const NAME_KEYS: [&str; 3] = ["ClanName", "Clan Name", "Name"];
pub const LEVEL_KEYS: [&str; 3] = ["Level", "Lvl", "Clan Level"];

const HYDRA_KEYS_COUNT: [&str; 4] = ["HydraKeys", "Hydra Keys", "Hydra Key", "Hydra keys"];
const HYDRA_TARGET: [&str; 5] = [
    "HydraTargetM",
    "Hydra Target (M)",
    "Hydra Clash (M)",
    "Hydra Clash Target (M)",
    "Hydra Clash",
];
const CHIMERA_KEYS_COUNT: [&str; 4] = ["ChimeraKeys", "Chimera Keys", "Chimera Key", "Chim keys"];
const CHIMERA_TARGET: [&str; 5] = [
    "ChimeraTargetM",
    "Chimera Target (M)",
    "Chimera Clash (M)",
    "Chimera Clash Target (M)",
    "Chimera Clash",
];
const PR_MIN: [&str; 6] = ["PR minimum", "PR Minimum", "PR Min", "PR_Min", "PRmin", "PR"];
const NON_PR_MIN: [&str; 7] = [
    "non PR minimum",
    "NonPR minimum",
    "Non PR Min",
    "NonPR Min",
    "NonPR",
    "nonPR",
    "NPR",
];
const ROSTER_KEYS: [&str; 3] = ["Roster", "Roster Type", "Roster Policy"];
const FILTERS_KEYS: [&str; 3] = ["Filters used", "Filters", "Filter"];
const NOTES_KEYS: [&str; 4] = ["Notes", "Note", "Extra", "Description"];
const THUMB_KEYS: [&str; 5] = ["LogoUrl", "Logo", "ThumbUrl", "EmojiNameOrId", "Emoji"];

/// Integer value of a cell: commas dropped, decimals truncated.
pub fn to_int(value: &str) -> Option<i64> {
    let cleaned = value.replace(',', "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }
    let parsed: f64 = cleaned.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }
    Some(parsed.trunc() as i64)
}

/// Cuts text to fit an embed description, marking the cut with `…`.
pub fn clamp_description(text: String) -> String {
    if text.chars().count() <= DISCORD_EMBED_LIMIT {
        return text;
    }
    let mut cut: String = text.chars().take(DISCORD_EMBED_LIMIT - 1).collect();
    cut.push('…');
    cut
}

pub fn plural(n: i64, word: &str) -> String {
    if n == 1 {
        format!("{} {}", n, word)
    } else {
        format!("{} {}s", n, word)
    }
}

pub fn boolish(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "1" | "y" | "yes" | "true" | "open" => true,
        "0" | "n" | "no" | "false" | "closed" => false,
        _ => default,
    }
}

fn pick_int(record: &Record, keys: &[&str]) -> Option<i64> {
    record.pick(keys).and_then(to_int)
}

pub fn clan_tag(record: &Record) -> String {
    record.pick(&TAG_KEYS).unwrap_or_default().trim().to_string()
}

pub fn clan_name(record: &Record) -> String {
    record.pick(&NAME_KEYS).unwrap_or_default().trim().to_string()
}

fn boss_line(label: &str, keys: Option<i64>, target: Option<i64>) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(k) = keys {
        parts.push(plural(k, "key"));
    }
    if let Some(t) = target {
        parts.push(format!("{}M {} Clash", t, label));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("{}: {}", label, parts.join(" — ")))
    }
}

/// The "Entry Criteria" block of a card.
pub fn format_entry_criteria(record: &Record) -> String {
    let mut lines = Vec::new();

    if let Some(line) = boss_line(
        "Hydra",
        pick_int(record, &HYDRA_KEYS_COUNT),
        pick_int(record, &HYDRA_TARGET),
    ) {
        lines.push(line);
    }
    if let Some(line) = boss_line(
        "Chimera",
        pick_int(record, &CHIMERA_KEYS_COUNT),
        pick_int(record, &CHIMERA_TARGET),
    ) {
        lines.push(line);
    }

    let pr = pick_int(record, &PR_MIN).map(|v| format!("PR minimum: {}", v));
    let non_pr = pick_int(record, &NON_PR_MIN).map(|v| format!("non PR minimum: {}", v));
    let cvc: Vec<String> = pr.into_iter().chain(non_pr).collect();
    if !cvc.is_empty() {
        lines.push(format!("CvC: {}", cvc.join(" | ")));
    }

    if lines.is_empty() {
        "**Entry Criteria:**\n—".to_string()
    } else {
        format!("**Entry Criteria:**\n{}", lines.join("\n"))
    }
}

/// Where the card thumbnail comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    Url(String),
    /// Guild emoji referenced by id or name.
    Emoji(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClanCard {
    pub title: String,
    pub description: String,
    pub thumbnail: Option<Thumbnail>,
    pub footer: String,
}

impl ClanCard {
    pub fn from_record(record: &Record) -> Self {
        let tag = clan_tag(record);
        let name = match clan_name(record) {
            n if n.is_empty() => tag.clone(),
            n => n,
        };

        let mut title = name;
        if !tag.is_empty() {
            title.push_str(&format!(" | {}", tag));
        }
        if let Some(level) = pick_int(record, &LEVEL_KEYS) {
            title.push_str(&format!(" | Level {}", level));
        }
        if let Some(spots) = pick_int(record, &SPOTS_KEYS) {
            title.push_str(&format!(" | Spots: {}", spots));
        }

        let mut sections = vec![format_entry_criteria(record)];
        let bullets: Vec<String> = [
            ("Filters used", &FILTERS_KEYS[..]),
            ("Playstyle", &PLAYSTYLE_KEYS[..]),
            ("Roster", &ROSTER_KEYS[..]),
        ]
        .into_iter()
        .filter_map(|(label, keys)| record.pick(keys).map(|v| format!("{}: {}", label, v)))
        .collect();
        if !bullets.is_empty() {
            sections.push(bullets.join("\n"));
        }
        if let Some(notes) = record.pick(&NOTES_KEYS) {
            sections.push(notes.to_string());
        }

        let thumbnail = record
            .pick(&THUMB_KEYS)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                if t.starts_with("http") {
                    Thumbnail::Url(t.to_string())
                } else {
                    Thumbnail::Emoji(t.to_string())
                }
            });

        Self {
            title,
            description: clamp_description(sections.join("\n\n")),
            thumbnail,
            footer: CARD_FOOTER.to_string(),
        }
    }

    /// Appends `• Result i/n` style text to the footer.
    pub fn with_footer_suffix(mut self, suffix: &str) -> Self {
        if self.footer.is_empty() {
            self.footer = suffix.to_string();
        } else {
            self.footer = format!("{} • {}", self.footer, suffix);
        }
        self
    }

    pub fn to_embed(&self, emojis: &[GuildEmoji]) -> serenity::CreateEmbed {
        let mut embed = serenity::CreateEmbed::new()
            .title(&self.title)
            .description(&self.description)
            .color(CARD_COLOR)
            .footer(serenity::CreateEmbedFooter::new(&self.footer));
        let thumb_url = match &self.thumbnail {
            Some(Thumbnail::Url(url)) => Some(url.clone()),
            Some(Thumbnail::Emoji(token)) => emoji::find_emoji(emojis, token).map(GuildEmoji::url),
            None => None,
        };
        if let Some(url) = thumb_url {
            embed = embed.thumbnail(url);
        }
        embed
    }
}

const LEAD_KEYS: [&str; 4] = ["Clan Lead", "ClanLead", "CLANLEAD", "Leader"];
const DEPUTY_KEYS: [&str; 3] = ["Deputies", "DEPUTIES", "Deputy"];
const TIMEZONE_KEYS: [&str; 3] = ["Timezone", "Time Zone", "TZ"];
const LANGUAGE_KEYS: [&str; 2] = ["Language", "Lang"];
const PROGRESS_KEYS: [(&str, &[&str]); 6] = [
    ("Clan Boss", &["CB", "Clan Boss", "ClanBoss", "CB Difficulty"]),
    ("Hydra", &["Hydra", "Hydra Difficulty", "HydraDifficulty"]),
    ("Chimera", &["Chimera", "Chimera Difficulty", "ChimeraDifficulty"]),
    ("CvC", &["CvC", "CVC"]),
    ("Siege", &["Siege"]),
    ("Inactives", &["Inactives", "Inactive"]),
];

/// Detail card posted when someone reacts 💡 on a clan card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileCard {
    pub title: String,
    pub fields: Vec<(String, String)>,
    pub description: Option<String>,
}

impl ProfileCard {
    pub fn from_record(record: &Record) -> Self {
        let tag = clan_tag(record);
        let name = match clan_name(record) {
            n if n.is_empty() => tag.clone(),
            n => n,
        };
        let title = if tag.is_empty() {
            format!("{} — Clan Profile", name)
        } else {
            format!("{} | {} — Clan Profile", name, tag)
        };

        let mut fields = Vec::new();
        let mut push = |label: &str, keys: &[&str]| {
            if let Some(v) = record.pick(keys) {
                fields.push((label.to_string(), v.trim().to_string()));
            }
        };
        push("Clan Lead", &LEAD_KEYS);
        push("Deputies", &DEPUTY_KEYS);
        push("Level", &LEVEL_KEYS);
        push("Open Spots", &SPOTS_KEYS);
        push("Timezone", &TIMEZONE_KEYS);
        push("Language", &LANGUAGE_KEYS);
        push("Playstyle", &PLAYSTYLE_KEYS);
        for (label, keys) in PROGRESS_KEYS {
            push(label, keys);
        }

        let description = record
            .pick(&NOTES_KEYS)
            .map(|notes| clamp_description(notes.to_string()));
        Self {
            title,
            fields,
            description,
        }
    }

    pub fn to_embed(&self) -> serenity::CreateEmbed {
        let mut embed = serenity::CreateEmbed::new()
            .title(&self.title)
            .color(CARD_COLOR);
        match &self.description {
            Some(desc) => embed = embed.description(desc),
            None if self.fields.is_empty() => {
                embed = embed.description("No profile details in the sheet.")
            }
            None => {}
        }
        for (name, value) in &self.fields {
            embed = embed.field(name, value, true);
        }
        embed
    }
}

/// `Name (TAG) · L12 · spots 3` with `?` for missing numbers.
pub fn list_line(record: &Record) -> String {
    let name = clan_name(record);
    let tag = clan_tag(record);
    let level = pick_int(record, &LEVEL_KEYS)
        .filter(|l| *l != 0)
        .map(|l| l.to_string())
        .unwrap_or_else(|| "?".to_string());
    let spots = pick_int(record, &["Spots", "Open Spots", "Open"])
        .filter(|s| *s != 0)
        .map(|s| s.to_string())
        .unwrap_or_else(|| "?".to_string());
    let first = if name.is_empty() { &tag } else { &name };
    let second = if tag.is_empty() { &name } else { &tag };
    format!("{} ({}) · L{} · spots {}", first, second, level, spots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::table::table_from;

    #[test]
    fn test_to_int() {
        assert_eq!(to_int("1,250"), Some(1250));
        assert_eq!(to_int(" 3.9 "), Some(3));
        assert_eq!(to_int("-2.5"), Some(-2));
        assert_eq!(to_int(""), None);
        assert_eq!(to_int("n/a"), None);
        assert_eq!(to_int("inf"), None);
    }

    #[test]
    fn test_plural_and_boolish() {
        assert_eq!(plural(1, "key"), "1 key");
        assert_eq!(plural(0, "key"), "0 keys");
        assert!(boolish(" Yes ", false));
        assert!(!boolish("CLOSED", true));
        assert!(boolish("maybe", true));
        assert!(!boolish("maybe", false));
    }

    #[test]
    fn test_entry_criteria_full() {
        let table = table_from(&[
            &["Tag", "Hydra Keys", "Hydra Clash", "ChimeraKeys", "PR Min", "NonPR"],
            &["ALP", "1", "2,000", "3", "10000", "5000.7"],
        ]);
        assert_eq!(
            format_entry_criteria(&table.records[0]),
            "**Entry Criteria:**\nHydra: 1 key — 2000M Hydra Clash\nChimera: 3 keys\nCvC: PR minimum: 10000 | non PR minimum: 5000"
        );
    }

    #[test]
    fn test_entry_criteria_partial_and_empty() {
        let table = table_from(&[
            &["Tag", "HydraTargetM", "non PR minimum"],
            &["ALP", "40", ""],
            &["BET", "", "x"],
        ]);
        assert_eq!(
            format_entry_criteria(&table.records[0]),
            "**Entry Criteria:**\nHydra: 40M Hydra Clash"
        );
        assert_eq!(format_entry_criteria(&table.records[1]), "**Entry Criteria:**\n—");
    }

    #[test]
    fn test_clan_card() {
        let table = table_from(&[
            &["Clan Name", "Clan Tag", "Level", "Spots", "Playstyle", "Roster", "Notes", "Logo"],
            &["Alpha Wolves", "ALP", "20", "3", "Competitive", "Open", "Be active!", "https://img/x.png"],
            &["", "BET", "", "", "", "", "", "wolf"],
        ]);
        let card = ClanCard::from_record(&table.records[0]);
        assert_eq!(card.title, "Alpha Wolves | ALP | Level 20 | Spots: 3");
        assert_eq!(
            card.description,
            "**Entry Criteria:**\n—\n\nPlaystyle: Competitive\nRoster: Open\n\nBe active!"
        );
        assert_eq!(card.thumbnail, Some(Thumbnail::Url("https://img/x.png".to_string())));
        assert_eq!(card.footer, CARD_FOOTER);

        let bare = ClanCard::from_record(&table.records[1]);
        assert_eq!(bare.title, "BET | BET");
        assert_eq!(bare.thumbnail, Some(Thumbnail::Emoji("wolf".to_string())));

        let paged = bare.with_footer_suffix("Result 1/2");
        assert_eq!(paged.footer, "React with 💡 for Clan Profile • Result 1/2");
    }

    #[test]
    fn test_profile_card() {
        let table = table_from(&[
            &["Clan Name", "Clan Tag", "Clan Lead", "Timezone", "CB", "Notes"],
            &["Alpha Wolves", "ALP", "Rex", "CET", "UNM", "Friendly"],
        ]);
        let card = ProfileCard::from_record(&table.records[0]);
        assert_eq!(card.title, "Alpha Wolves | ALP — Clan Profile");
        assert_eq!(
            card.fields,
            vec![
                ("Clan Lead".to_string(), "Rex".to_string()),
                ("Timezone".to_string(), "CET".to_string()),
                ("Clan Boss".to_string(), "UNM".to_string()),
            ]
        );
        assert_eq!(card.description.as_deref(), Some("Friendly"));
    }

    #[test]
    fn test_long_notes_fit_embed_description() {
        let notes = "x".repeat(DISCORD_EMBED_LIMIT + 500);
        let table = table_from(&[&["Clan Tag", "Notes"], &["ALP", notes.as_str()]]);

        let card = ClanCard::from_record(&table.records[0]);
        assert_eq!(card.description.chars().count(), DISCORD_EMBED_LIMIT);
        assert!(card.description.ends_with('…'));

        let profile = ProfileCard::from_record(&table.records[0]);
        let desc = profile.description.unwrap_or_default();
        assert_eq!(desc.chars().count(), DISCORD_EMBED_LIMIT);
        assert!(desc.ends_with('…'));

        assert_eq!(clamp_description("short".to_string()), "short");
    }

    #[test]
    fn test_list_line() {
        let table = table_from(&[
            &["Clan Name", "Clan Tag", "Level", "Spots"],
            &["Alpha Wolves", "ALP", "20", "3"],
            &["", "BET", "", "0"],
        ]);
        assert_eq!(list_line(&table.records[0]), "Alpha Wolves (ALP) · L20 · spots 3");
        assert_eq!(list_line(&table.records[1]), "BET (BET) · L? · spots ?");
    }
}
