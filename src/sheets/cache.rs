use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

use super::table::Table;

const DEFAULT_CAPACITY: usize = 16;

struct CachedTable {
    fetched_at: Instant,
    table: Arc<Table>,
}

/// Short-lived cache of parsed worksheets, keyed by lowercase tab name.
#[derive(Clone)]
pub struct SheetCache {
    ttl: Duration,
    entries: Arc<Mutex<LruCache<String, CachedTable>>>,
}

impl SheetCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(ttl: Duration, capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn get(&self, tab: &str) -> Option<Arc<Table>> {
        self.get_at(tab, Instant::now())
    }

    fn get_at(&self, tab: &str, now: Instant) -> Option<Arc<Table>> {
        let key = tab.to_lowercase();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = match entries.get(&key) {
            Some(entry) => now.saturating_duration_since(entry.fetched_at) < self.ttl,
            None => return None,
        };
        if fresh {
            entries.get(&key).map(|entry| entry.table.clone())
        } else {
            entries.pop(&key);
            None
        }
    }

    pub fn insert(&self, tab: &str, table: Arc<Table>) {
        self.insert_at(tab, table, Instant::now());
    }

    fn insert_at(&self, tab: &str, table: Arc<Table>, now: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.put(
            tab.to_lowercase(),
            CachedTable {
                fetched_at: now,
                table,
            },
        );
    }

    pub fn invalidate(&self, tab: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(&tab.to_lowercase());
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.fetched_at) >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically evicts expired worksheets so stale data does not linger
/// in memory between bursts of commands.
pub async fn run_expiry_sweeper(cache: SheetCache, every: Duration) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
    loop {
        ticker.tick().await;
        let purged = cache.purge_expired();
        if purged > 0 {
            debug!("Sheet cache sweep dropped {} expired tab(s)", purged);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::table::table_from;

    fn table() -> Arc<Table> {
        Arc::new(table_from(&[&["Tag"], &["ALP"]]))
    }

    #[tokio::test]
    async fn test_sweeper_survives_zero_period() {
        let cache = SheetCache::new(Duration::ZERO);
        cache.insert("bot_info", table());
        let sweeper = tokio::spawn(run_expiry_sweeper(cache.clone(), Duration::ZERO));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!sweeper.is_finished());
        assert!(cache.is_empty());
        sweeper.abort();
    }

    #[test]
    fn test_case_insensitive_hit() {
        let cache = SheetCache::new(Duration::from_secs(30));
        cache.insert("Bot_Info", table());
        assert!(cache.get("bot_info").is_some());
        assert!(cache.get("BOT_INFO").is_some());
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn test_expired_entry_is_dropped_on_read() {
        let cache = SheetCache::new(Duration::from_secs(30));
        let start = Instant::now();
        cache.insert_at("bot_info", table(), start);

        assert!(cache.get_at("bot_info", start + Duration::from_secs(29)).is_some());
        assert!(cache.get_at("bot_info", start + Duration::from_secs(30)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired() {
        let cache = SheetCache::new(Duration::from_secs(30));
        let start = Instant::now();
        cache.insert_at("old", table(), start);
        cache.insert_at("new", table(), start + Duration::from_secs(20));

        assert_eq!(cache.purge_expired_at(start + Duration::from_secs(35)), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at("new", start + Duration::from_secs(35)).is_some());
    }

    #[test]
    fn test_capacity_bound() {
        let cache = SheetCache::with_capacity(Duration::from_secs(30), 2);
        cache.insert("a", table());
        cache.insert("b", table());
        cache.insert("c", table());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_invalidate_single_tab() {
        let cache = SheetCache::new(Duration::from_secs(30));
        cache.insert("a", table());
        cache.insert("b", table());
        cache.invalidate("A");
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_clear() {
        let cache = SheetCache::new(Duration::from_secs(30));
        cache.insert("a", table());
        cache.clear();
        assert!(cache.get("a").is_none());
    }
}
