use lru::LruCache;
use serenity::model::id::MessageId;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

/// What a posted clan card points back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedCard {
    pub tab: String,
    pub tag: String,
}

/// Remembers recently posted clan cards so a 💡 reaction can find the
/// clan again without parsing the embed.
#[derive(Clone)]
pub struct PostedCards {
    cache: Arc<Mutex<LruCache<MessageId, PostedCard>>>,
}

impl PostedCards {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn insert(&self, message_id: MessageId, card: PostedCard) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.put(message_id, card);
    }

    pub fn get(&self, message_id: MessageId) -> Option<PostedCard> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.get(&message_id).cloned()
    }
}
