//! Row matching: clan lookup by tag/name, free-text search and the
//! filter panel's conjunctive criteria.

use std::fmt;

use crate::card::{boolish, to_int};
use crate::sheets::{Record, Table};

const TAG_HINTS: [&str; 9] = [
    "clantag", "clan tag", "tag", "abbr", "abbrev", "short", "ticker", "code", "id",
];

pub const SPOTS_KEYS: [&str; 5] = ["Spots", "Open Spots", "Open", "OpenSlots", "Open spots"];
const STATUS_KEYS: [&str; 3] = ["Open", "Status", "Recruitment"];
const CB_KEYS: [&str; 4] = ["CB", "Clan Boss", "ClanBoss", "CB Difficulty"];
const HYDRA_KEYS: [&str; 3] = ["Hydra", "Hydra Difficulty", "HydraDifficulty"];
const CHIMERA_KEYS: [&str; 3] = ["Chimera", "Chimera Difficulty", "ChimeraDifficulty"];
const CVC_KEYS: [&str; 2] = ["CvC", "CVC"];
const SIEGE_KEYS: [&str; 1] = ["Siege"];
pub const PLAYSTYLE_KEYS: [&str; 2] = ["Playstyle", "Play Style"];
const INACTIVES_KEYS: [&str; 2] = ["Inactives", "Inactive"];

/// Lowercase and keep only ASCII letters and digits.
pub fn norm(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

pub fn tag_keys(headers: &[String]) -> Vec<&str> {
    headers
        .iter()
        .filter(|h| {
            let hl = h.trim().to_lowercase();
            TAG_HINTS.iter().any(|k| hl.contains(k))
        })
        .map(String::as_str)
        .collect()
}

pub fn name_keys(headers: &[String]) -> Vec<&str> {
    headers
        .iter()
        .filter(|h| {
            let hl = h.trim().to_lowercase();
            hl.contains("name") && !hl.contains("tag")
        })
        .map(String::as_str)
        .collect()
}

/// Header names searched by tag/name lookups, tags first.
pub fn search_keys(headers: &[String]) -> Vec<&str> {
    let mut keys = tag_keys(headers);
    keys.extend(name_keys(headers));
    keys
}

/// Finds one clan: exact normalized tag, then exact normalized name, then
/// normalized substring over either.
pub fn find_row<'a>(table: &'a Table, query: &str) -> Option<&'a Record> {
    let want = norm(query);
    let tkeys = tag_keys(&table.headers);
    let nkeys = name_keys(&table.headers);

    let field_eq = |keys: &[&str]| {
        table.records.iter().find(|r| {
            keys.iter()
                .any(|k| norm(r.get(k).unwrap_or_default()) == want)
        })
    };

    field_eq(&tkeys[..])
        .or_else(|| field_eq(&nkeys[..]))
        .or_else(|| {
            if want.is_empty() {
                return None;
            }
            table.records.iter().find(|r| {
                tkeys
                    .iter()
                    .chain(nkeys.iter())
                    .any(|k| norm(r.get(k).unwrap_or_default()).contains(&want))
            })
        })
}

fn contains_text(record: &Record, keys: &[&str], want: &str) -> bool {
    keys.iter()
        .any(|k| norm(record.get(k).unwrap_or_default()).contains(want))
}

/// Substring search over tag/name fields, capped at `limit`.
pub fn text_hits<'a>(table: &'a Table, text: &str, limit: usize) -> Vec<&'a Record> {
    let want = norm(text);
    let keys = search_keys(&table.headers);
    table
        .records
        .iter()
        .filter(|r| contains_text(r, &keys, &want))
        .take(limit)
        .collect()
}

/// A clan is open when it has spots; without a spots column the status
/// columns decide, and a missing status counts as open.
pub fn is_open(record: &Record) -> bool {
    match record.pick(&SPOTS_KEYS).and_then(to_int) {
        Some(spots) => spots > 0,
        None => boolish(record.pick(&STATUS_KEYS).unwrap_or("open"), true),
    }
}

/// Browser panel results: text matches, or open clans when text is empty
/// (the first `limit` rows if none are open).
pub fn search_hits<'a>(table: &'a Table, text: &str, limit: usize) -> Vec<&'a Record> {
    if !norm(text).is_empty() {
        return text_hits(table, text, limit);
    }
    let open: Vec<&Record> = table.records.iter().filter(|r| is_open(r)).take(limit).collect();
    if open.is_empty() {
        table.records.iter().take(limit).collect()
    } else {
        open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
    Brutal,
    Nightmare,
    UltraNightmare,
}

impl Difficulty {
    pub const ALL: [Difficulty; 6] = [
        Difficulty::Easy,
        Difficulty::Normal,
        Difficulty::Hard,
        Difficulty::Brutal,
        Difficulty::Nightmare,
        Difficulty::UltraNightmare,
    ];

    /// Token used in sheet cells once long names are folded.
    pub fn code(self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Normal => "NORMAL",
            Difficulty::Hard => "HARD",
            Difficulty::Brutal => "BRUTAL",
            Difficulty::Nightmare => "NM",
            Difficulty::UltraNightmare => "UNM",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
            Difficulty::Brutal => "Brutal",
            Difficulty::Nightmare => "Nightmare",
            Difficulty::UltraNightmare => "Ultra-Nightmare",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let folded = fold_difficulty_names(&code.to_uppercase());
        Self::ALL.into_iter().find(|d| d.code() == folded.trim())
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn fold_difficulty_names(upper: &str) -> String {
    upper
        .replace("ULTRA-NIGHTMARE", "UNM")
        .replace("ULTRA NIGHTMARE", "UNM")
        .replace("ULTRANIGHTMARE", "UNM")
        .replace("NIGHTMARE", "NM")
}

/// Uppercased tokens of a cell, with difficulty long names folded.
pub fn difficulty_tokens(cell: &str) -> Vec<String> {
    fold_difficulty_names(&cell.to_uppercase())
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RosterMode {
    #[default]
    Any,
    Open,
    Inactives,
    Full,
}

impl RosterMode {
    pub fn next(self) -> Self {
        match self {
            RosterMode::Any => RosterMode::Open,
            RosterMode::Open => RosterMode::Inactives,
            RosterMode::Inactives => RosterMode::Full,
            RosterMode::Full => RosterMode::Any,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RosterMode::Any => "Any roster",
            RosterMode::Open => "Open spots",
            RosterMode::Inactives => "Inactives",
            RosterMode::Full => "Full",
        }
    }

    fn admits(self, record: &Record) -> bool {
        match self {
            RosterMode::Any => true,
            RosterMode::Open => is_open(record),
            RosterMode::Full => record
                .pick(&SPOTS_KEYS)
                .and_then(to_int)
                .is_some_and(|spots| spots <= 0),
            RosterMode::Inactives => record
                .pick(&INACTIVES_KEYS)
                .and_then(to_int)
                .is_some_and(|n| n > 0),
        }
    }
}

/// Filter state chosen on the panel. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClanFilters {
    pub clan_boss: Option<Difficulty>,
    pub hydra: Option<Difficulty>,
    pub chimera: Option<Difficulty>,
    pub cvc: Option<bool>,
    pub siege: Option<bool>,
    pub playstyle: Option<String>,
    pub roster: RosterMode,
}

impl ClanFilters {
    pub fn is_empty(&self) -> bool {
        *self == ClanFilters::default()
    }

    /// True when every active criterion holds for the row.
    pub fn matches(&self, record: &Record) -> bool {
        difficulty_ok(record, &CB_KEYS, self.clan_boss)
            && difficulty_ok(record, &HYDRA_KEYS, self.hydra)
            && difficulty_ok(record, &CHIMERA_KEYS, self.chimera)
            && toggle_ok(record, &CVC_KEYS, self.cvc)
            && toggle_ok(record, &SIEGE_KEYS, self.siege)
            && playstyle_ok(record, self.playstyle.as_deref())
            && self.roster.admits(record)
    }

    /// Uppercased text terms used by the relaxed pass.
    fn text_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = [self.clan_boss, self.hydra, self.chimera]
            .into_iter()
            .flatten()
            .map(|d| d.code().to_string())
            .collect();
        if let Some(style) = self.playstyle.as_deref().map(str::trim) {
            if !style.is_empty() {
                terms.push(style.to_uppercase());
            }
        }
        terms
    }

    /// One-line description for panel headers.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(d) = self.clan_boss {
            parts.push(format!("CB: {}", d));
        }
        if let Some(d) = self.hydra {
            parts.push(format!("Hydra: {}", d));
        }
        if let Some(d) = self.chimera {
            parts.push(format!("Chimera: {}", d));
        }
        if let Some(on) = self.cvc {
            parts.push(format!("CvC: {}", yes_no(on)));
        }
        if let Some(on) = self.siege {
            parts.push(format!("Siege: {}", yes_no(on)));
        }
        if let Some(style) = &self.playstyle {
            parts.push(format!("Playstyle: {}", style));
        }
        if self.roster != RosterMode::Any {
            parts.push(format!("Roster: {}", self.roster.label()));
        }
        if parts.is_empty() {
            "No filters (all clans)".to_string()
        } else {
            parts.join(" • ")
        }
    }
}

fn yes_no(on: bool) -> &'static str {
    if on {
        "Yes"
    } else {
        "No"
    }
}

fn difficulty_ok(record: &Record, keys: &[&str], wanted: Option<Difficulty>) -> bool {
    let Some(wanted) = wanted else {
        return true;
    };
    record
        .pick(keys)
        .map(difficulty_tokens)
        .is_some_and(|tokens| tokens.iter().any(|t| t == wanted.code()))
}

fn toggle_ok(record: &Record, keys: &[&str], wanted: Option<bool>) -> bool {
    let Some(wanted) = wanted else {
        return true;
    };
    let actual = record.pick(keys).map(|v| boolish(v, false)).unwrap_or(false);
    actual == wanted
}

fn playstyle_ok(record: &Record, wanted: Option<&str>) -> bool {
    let wanted = match wanted.map(str::trim) {
        Some(w) if !w.is_empty() => w.to_uppercase(),
        _ => return true,
    };
    record
        .pick(&PLAYSTYLE_KEYS)
        .is_some_and(|v| v.to_uppercase().contains(&wanted))
}

#[derive(Debug)]
pub struct FilterOutcome<'a> {
    pub rows: Vec<&'a Record>,
    /// Set when the strict pass found nothing and the relaxed pass was used.
    pub relaxed: bool,
}

/// Strict conjunctive filtering, falling back to a substring search across
/// every field when the strict pass comes back empty.
pub fn filter_rows<'a>(table: &'a Table, filters: &ClanFilters) -> FilterOutcome<'a> {
    let strict: Vec<&Record> = table.records.iter().filter(|r| filters.matches(r)).collect();
    if !strict.is_empty() {
        return FilterOutcome {
            rows: strict,
            relaxed: false,
        };
    }

    let terms = filters.text_terms();
    if terms.is_empty() {
        return FilterOutcome {
            rows: strict,
            relaxed: false,
        };
    }

    let rows = table
        .records
        .iter()
        .filter(|r| filters.roster.admits(r))
        .filter(|r| {
            let haystack = fold_difficulty_names(&r.values().join(" ").to_uppercase());
            terms.iter().all(|t| haystack.contains(t.as_str()))
        })
        .collect();
    FilterOutcome {
        rows,
        relaxed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::table::table_from;

    fn roster() -> Table {
        table_from(&[
            &["Clan Name", "Clan Tag", "Level", "Spots", "CB", "Hydra", "Chimera", "CvC", "Siege", "Playstyle", "Inactives"],
            &["Alpha Wolves", "ALP", "20", "3", "UNM", "Nightmare", "Ultra Nightmare", "Yes", "no", "Competitive", "0"],
            &["Beta Bears", "BET", "15", "0", "NM / Brutal", "Hard", "Normal", "no", "yes", "Casual, stress-free", "2"],
            &["Gamma Rays", "GAM", "8", "5", "Brutal", "Normal", "Easy", "y", "y", "Semi Competitive", ""],
        ])
    }

    fn tags(rows: &[&Record]) -> Vec<String> {
        rows.iter()
            .map(|r| r.get("Clan Tag").unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_norm() {
        assert_eq!(norm("C1C-Alpha Wolves!"), "c1calphawolves");
        assert_eq!(norm(""), "");
    }

    #[test]
    fn test_header_hints() {
        let headers: Vec<String> = ["Clan Name", "Clan Tag", "Spots", "Leader Name", "ID"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tag_keys(&headers), vec!["Clan Tag", "ID"]);
        assert_eq!(name_keys(&headers), vec!["Clan Name", "Leader Name"]);
    }

    #[test]
    fn test_find_row_order() {
        let table = roster();
        assert_eq!(find_row(&table, "bet").unwrap().get("Clan Tag"), Some("BET"));
        assert_eq!(find_row(&table, "gamma rays").unwrap().get("Clan Tag"), Some("GAM"));
        // Substring fallback
        assert_eq!(find_row(&table, "wolves").unwrap().get("Clan Tag"), Some("ALP"));
        assert!(find_row(&table, "zzz").is_none());
        assert!(find_row(&table, "  ").is_none());
    }

    #[test]
    fn test_tag_beats_name_substring() {
        let table = table_from(&[
            &["Clan Tag", "Clan Name"],
            &["XALP", "Alp Fans"],
            &["ALP", "Alpha"],
        ]);
        assert_eq!(find_row(&table, "ALP").unwrap().get("Clan Name"), Some("Alpha"));
    }

    #[test]
    fn test_search_hits_text_and_open() {
        let table = roster();
        assert_eq!(tags(&search_hits(&table, "a", 50)), vec!["ALP", "BET", "GAM"]);
        assert_eq!(tags(&search_hits(&table, "a", 2)), vec!["ALP", "BET"]);
        // Empty text shows open clans only
        assert_eq!(tags(&search_hits(&table, "", 50)), vec!["ALP", "GAM"]);
    }

    #[test]
    fn test_search_hits_no_open_falls_back_to_first_rows() {
        let table = table_from(&[
            &["Clan Tag", "Spots"],
            &["AAA", "0"],
            &["BBB", "0"],
        ]);
        assert_eq!(tags(&search_hits(&table, "", 1)), vec!["AAA"]);
    }

    #[test]
    fn test_is_open_status_fallback() {
        let table = table_from(&[
            &["Clan Tag", "Status"],
            &["AAA", "closed"],
            &["BBB", ""],
            &["CCC", "whatever"],
        ]);
        let open: Vec<bool> = table.records.iter().map(is_open).collect();
        assert_eq!(open, vec![false, true, true]);
    }

    #[test]
    fn test_difficulty_tokens() {
        assert_eq!(difficulty_tokens("NM / Brutal"), vec!["NM", "BRUTAL"]);
        assert_eq!(difficulty_tokens("Ultra-Nightmare"), vec!["UNM"]);
        assert_eq!(difficulty_tokens("ultra nightmare, hard"), vec!["UNM", "HARD"]);
        assert_eq!(Difficulty::from_code("Nightmare"), Some(Difficulty::Nightmare));
        assert_eq!(Difficulty::from_code("unm"), Some(Difficulty::UltraNightmare));
        assert_eq!(Difficulty::from_code("legendary"), None);
    }

    #[test]
    fn test_filters_conjunction() {
        let table = roster();
        let filters = ClanFilters {
            clan_boss: Some(Difficulty::Brutal),
            siege: Some(true),
            ..Default::default()
        };
        let outcome = filter_rows(&table, &filters);
        assert!(!outcome.relaxed);
        assert_eq!(tags(&outcome.rows), vec!["BET", "GAM"]);

        let filters = ClanFilters {
            clan_boss: Some(Difficulty::Brutal),
            cvc: Some(true),
            ..Default::default()
        };
        assert_eq!(tags(&filter_rows(&table, &filters).rows), vec!["GAM"]);
    }

    #[test]
    fn test_nightmare_does_not_match_unm() {
        let table = roster();
        let filters = ClanFilters {
            hydra: Some(Difficulty::Nightmare),
            ..Default::default()
        };
        assert_eq!(tags(&filter_rows(&table, &filters).rows), vec!["ALP"]);

        let filters = ClanFilters {
            chimera: Some(Difficulty::UltraNightmare),
            ..Default::default()
        };
        assert_eq!(tags(&filter_rows(&table, &filters).rows), vec!["ALP"]);
    }

    #[test]
    fn test_playstyle_and_roster() {
        let table = roster();
        let filters = ClanFilters {
            playstyle: Some("competitive".to_string()),
            roster: RosterMode::Open,
            ..Default::default()
        };
        assert_eq!(tags(&filter_rows(&table, &filters).rows), vec!["ALP", "GAM"]);

        let full = ClanFilters {
            roster: RosterMode::Full,
            ..Default::default()
        };
        assert_eq!(tags(&filter_rows(&table, &full).rows), vec!["BET"]);

        let inactives = ClanFilters {
            roster: RosterMode::Inactives,
            ..Default::default()
        };
        assert_eq!(tags(&filter_rows(&table, &inactives).rows), vec!["BET"]);
    }

    #[test]
    fn test_relaxed_pass_searches_all_fields() {
        let table = table_from(&[
            &["Clan Tag", "CB", "Notes"],
            &["AAA", "", "We run UNM daily"],
            &["BBB", "Hard", ""],
        ]);
        let filters = ClanFilters {
            clan_boss: Some(Difficulty::UltraNightmare),
            ..Default::default()
        };
        let outcome = filter_rows(&table, &filters);
        assert!(outcome.relaxed);
        assert_eq!(tags(&outcome.rows), vec!["AAA"]);
    }

    #[test]
    fn test_relaxed_pass_folds_long_difficulty_names() {
        let table = table_from(&[
            &["Clan Tag", "Clan Boss Level", "Playstyle"],
            &["AAA", "Nightmare", "Casual"],
            &["BBB", "Ultra Nightmare", "Casual"],
        ]);
        let filters = ClanFilters {
            clan_boss: Some(Difficulty::Nightmare),
            ..Default::default()
        };
        let outcome = filter_rows(&table, &filters);
        assert!(outcome.relaxed);
        assert_eq!(tags(&outcome.rows), vec!["AAA", "BBB"]);
    }

    #[test]
    fn test_toggle_only_filters_do_not_relax() {
        let table = roster();
        let filters = ClanFilters {
            cvc: Some(false),
            siege: Some(false),
            ..Default::default()
        };
        let outcome = filter_rows(&table, &filters);
        assert!(outcome.rows.is_empty());
        assert!(!outcome.relaxed);
    }

    #[test]
    fn test_summary() {
        assert_eq!(ClanFilters::default().summary(), "No filters (all clans)");
        let filters = ClanFilters {
            clan_boss: Some(Difficulty::UltraNightmare),
            cvc: Some(true),
            roster: RosterMode::Open,
            ..Default::default()
        };
        assert_eq!(filters.summary(), "CB: Ultra-Nightmare • CvC: Yes • Roster: Open spots");
        assert_eq!(RosterMode::Full.next(), RosterMode::Any);
    }
}
