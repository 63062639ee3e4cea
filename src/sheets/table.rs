//! Parsed worksheet contents.
//!
//! Sheets maintained by hand rarely start at row 1: there are banner rows,
//! blank header cells and repeated column names. `Table::from_values` finds
//! the real header row and turns the remaining rows into records.

use std::collections::HashMap;
use std::sync::Arc;

/// How many leading rows are scanned for something that looks like a header.
const HEADER_SCAN_ROWS: usize = 20;

const HEADER_KEYS: [&str; 8] = [
    "clantag",
    "clan tag",
    "clanname",
    "clan name",
    "tag",
    "name",
    "level",
    "spots",
];

/// One data row, keyed by the (deduplicated) header of its table.
#[derive(Debug, Clone)]
pub struct Record {
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl Record {
    pub fn new(headers: Arc<[String]>, mut values: Vec<String>) -> Self {
        values.resize(headers.len(), String::new());
        Self { headers, values }
    }

    /// Value for an exact header name.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == header)
            .map(|i| self.values[i].as_str())
    }

    /// First non-blank value among the given header aliases.
    pub fn pick(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .filter_map(|name| self.get(name))
            .find(|v| !v.trim().is_empty())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .zip(self.values.iter())
            .map(|(h, v)| (h.as_str(), v.as_str()))
    }

    /// Header/value pairs as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(h, v)| (h.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::Value::Object(map)
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub title: String,
    pub headers: Arc<[String]>,
    pub records: Vec<Record>,
}

impl Table {
    pub fn from_values(title: impl Into<String>, values: Vec<Vec<String>>) -> Self {
        let title = title.into();
        if values.is_empty() {
            return Self {
                title,
                headers: Arc::from(Vec::<String>::new()),
                records: Vec::new(),
            };
        }

        let header_idx = find_header_row(&values);
        let headers: Arc<[String]> = Arc::from(dedupe_headers(&values[header_idx]));

        let records = values
            .into_iter()
            .skip(header_idx + 1)
            .map(|mut row| {
                row.truncate(headers.len());
                Record::new(headers.clone(), row)
            })
            .filter(|record| record.values().iter().any(|c| !c.trim().is_empty()))
            .collect();

        Self {
            title,
            headers,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn looks_like_header(row: &[String]) -> bool {
    row.iter()
        .map(|c| c.trim().to_lowercase())
        .any(|c| HEADER_KEYS.contains(&c.as_str()))
}

fn find_header_row(values: &[Vec<String>]) -> usize {
    values
        .iter()
        .take(HEADER_SCAN_ROWS)
        .position(|row| looks_like_header(row))
        .unwrap_or(0)
}

/// Trim headers, name blanks `_colN` and suffix repeats with `_2`, `_3`, ...
pub fn dedupe_headers(headers: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let base = match h.trim() {
                "" => format!("_col{}", i + 1),
                trimmed => trimmed.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{}_{}", base, count)
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn table_from(rows: &[&[&str]]) -> Table {
    Table::from_values(
        "bot_info",
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect(),
    )
}
