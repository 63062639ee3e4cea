use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub mod cache;
pub mod error;
pub mod google;
pub mod table;

pub use cache::SheetCache;
pub use error::SheetError;
pub use table::{Record, Table};

/// Anything that can hand back the raw cell grid of a named worksheet.
#[async_trait]
pub trait SheetSource: Send + Sync {
    fn spreadsheet_id(&self) -> &str;
    async fn worksheet_titles(&self) -> Result<Vec<String>, SheetError>;
    async fn values(&self, title: &str) -> Result<Vec<Vec<String>>, SheetError>;
}

/// Cache-first access to the worksheets the bot reads.
pub struct SheetService {
    source: Arc<dyn SheetSource>,
    cache: SheetCache,
    default_tab: String,
}

impl SheetService {
    pub fn new(source: Arc<dyn SheetSource>, cache: SheetCache, default_tab: impl Into<String>) -> Self {
        Self {
            source,
            cache,
            default_tab: default_tab.into(),
        }
    }

    pub fn spreadsheet_id(&self) -> &str {
        self.source.spreadsheet_id()
    }

    pub fn default_tab(&self) -> &str {
        &self.default_tab
    }

    pub fn cache(&self) -> &SheetCache {
        &self.cache
    }

    pub async fn titles(&self) -> Result<Vec<String>, SheetError> {
        self.source.worksheet_titles().await
    }

    /// Resolves a worksheet title: exact match first, then case-insensitive.
    /// A blank name means the default tab.
    pub async fn resolve_title(&self, name: Option<&str>) -> Result<String, SheetError> {
        let wanted = self.wanted(name);
        let titles = self.source.worksheet_titles().await?;
        resolve_title(&titles, wanted)
            .map(str::to_string)
            .ok_or_else(|| SheetError::WorksheetNotFound(wanted.to_string()))
    }

    /// Parsed worksheet, served from the cache while fresh.
    pub async fn table(&self, name: Option<&str>) -> Result<Arc<Table>, SheetError> {
        let wanted = self.wanted(name);
        if let Some(table) = self.cache.get(wanted) {
            debug!("Sheet cache hit for '{}'", wanted);
            return Ok(table);
        }

        let title = self.resolve_title(Some(wanted)).await?;
        let values = self.source.values(&title).await?;
        let table = Arc::new(Table::from_values(title, values));
        info!(
            "Loaded {} row(s) from worksheet '{}'",
            table.len(),
            table.title
        );
        self.cache.insert(wanted, table.clone());
        Ok(table)
    }

    /// Bypasses the cache for one worksheet and stores the fresh copy.
    pub async fn fresh_table(&self, name: Option<&str>) -> Result<Arc<Table>, SheetError> {
        self.cache.invalidate(self.wanted(name));
        self.table(name).await
    }

    /// Drops cached worksheets so the next read goes to the API.
    pub fn refresh(&self) {
        self.cache.clear();
        info!("Sheet cache cleared");
    }

    fn wanted<'a>(&'a self, name: Option<&'a str>) -> &'a str {
        match name.map(str::trim) {
            Some(n) if !n.is_empty() => n,
            _ => self.default_tab.trim(),
        }
    }
}

pub fn resolve_title<'a>(titles: &'a [String], wanted: &str) -> Option<&'a str> {
    titles
        .iter()
        .find(|t| t.as_str() == wanted)
        .or_else(|| {
            let lower = wanted.to_lowercase();
            titles.iter().find(|t| t.to_lowercase() == lower)
        })
        .map(String::as_str)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory spreadsheet that counts value fetches.
    pub struct MemorySheets {
        pub tabs: Vec<(String, Vec<Vec<String>>)>,
        pub fetches: AtomicUsize,
    }

    impl MemorySheets {
        /// Each tab is given as text: rows split on newlines, cells on `|`.
        pub fn new(tabs: &[(&str, &str)]) -> Self {
            Self {
                tabs: tabs
                    .iter()
                    .map(|(title, grid)| {
                        (
                            title.to_string(),
                            grid.lines()
                                .map(|r| r.split('|').map(|c| c.to_string()).collect())
                                .collect(),
                        )
                    })
                    .collect(),
                fetches: AtomicUsize::new(0),
            }
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SheetSource for MemorySheets {
        fn spreadsheet_id(&self) -> &str {
            "memory"
        }

        async fn worksheet_titles(&self) -> Result<Vec<String>, SheetError> {
            Ok(self.tabs.iter().map(|(t, _)| t.clone()).collect())
        }

        async fn values(&self, title: &str) -> Result<Vec<Vec<String>>, SheetError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let tabs: HashMap<&str, &Vec<Vec<String>>> =
                self.tabs.iter().map(|(t, v)| (t.as_str(), v)).collect();
            tabs.get(title)
                .map(|v| (*v).clone())
                .ok_or_else(|| SheetError::WorksheetNotFound(title.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemorySheets;
    use super::*;
    use std::time::Duration;

    fn service(source: Arc<MemorySheets>) -> SheetService {
        SheetService::new(source, SheetCache::new(Duration::from_secs(30)), "bot_info")
    }

    fn sheets() -> Arc<MemorySheets> {
        Arc::new(MemorySheets::new(&[
            ("Bot_Info", "Tag|Name\nALP|Alpha"),
            ("bot_info_old", "Tag\nOLD"),
        ]))
    }

    #[test]
    fn test_resolve_title_prefers_exact() {
        let titles = vec!["Tab".to_string(), "tab".to_string()];
        assert_eq!(resolve_title(&titles, "tab"), Some("tab"));
        assert_eq!(resolve_title(&titles, "TAB"), Some("Tab"));
        assert_eq!(resolve_title(&titles, "other"), None);
    }

    #[tokio::test]
    async fn test_default_tab_case_insensitive() {
        let source = sheets();
        let service = service(source.clone());
        let table = service.table(None).await.unwrap();
        assert_eq!(table.title, "Bot_Info");
        assert_eq!(table.records[0].get("Name"), Some("Alpha"));

        let blank = service.table(Some("  ")).await.unwrap();
        assert_eq!(blank.title, "Bot_Info");
    }

    #[tokio::test]
    async fn test_cache_avoids_refetch_until_refresh() {
        let source = sheets();
        let service = service(source.clone());

        service.table(Some("bot_info")).await.unwrap();
        service.table(Some("BOT_INFO")).await.unwrap();
        assert_eq!(source.fetch_count(), 1);

        service.refresh();
        service.table(Some("bot_info")).await.unwrap();
        assert_eq!(source.fetch_count(), 2);

        service.fresh_table(None).await.unwrap();
        assert_eq!(source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_tab() {
        let service = service(sheets());
        let err = service.table(Some("nope")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "WorksheetNotFound: nope");
    }
}
