use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::StoreError;
use crate::core::ports::store::{ChatHistory, ChatStorePort};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheState {
    #[default]
    Unloaded,
    Loaded(Vec<ChatHistory>),
}

#[derive(Debug, Default)]
struct Cached {
    state: CacheState,
    // Generation of the read that produced `state`.
    generation: u64,
}

/// Process-lifetime mirror of every chat history in the store.
///
/// Overlapping refreshes are ordered by the generation taken when each one
/// started; a read that finishes after a newer one has landed is dropped.
pub struct HistoryCache {
    store: Arc<dyn ChatStorePort>,
    cached: Mutex<Cached>,
    next_generation: AtomicU64,
    pending: AtomicUsize,
}

impl HistoryCache {
    pub fn new(store: Arc<dyn ChatStorePort>) -> Self {
        Self {
            store,
            cached: Mutex::new(Cached::default()),
            next_generation: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    /// `None` until the first load completes.
    pub fn histories(&self) -> Option<Vec<ChatHistory>> {
        match &self.lock_cached().state {
            CacheState::Unloaded => None,
            CacheState::Loaded(histories) => Some(histories.clone()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    pub async fn ensure_loaded(&self) -> Result<Vec<ChatHistory>, StoreError> {
        let cached = match &self.lock_cached().state {
            CacheState::Loaded(histories) => Some(histories.clone()),
            CacheState::Unloaded => None,
        };
        match cached {
            Some(histories) => Ok(histories),
            None => self.refresh().await,
        }
    }

    /// Re-reads the store. Returns the list the cache holds afterwards, which
    /// is a newer one when another refresh overtook this read.
    pub async fn refresh(&self) -> Result<Vec<ChatHistory>, StoreError> {
        let generation = self.begin();
        self.pending.fetch_add(1, Ordering::SeqCst);
        let result = self.store.get_all_chat_histories().await;
        self.pending.fetch_sub(1, Ordering::SeqCst);

        let histories = result?;
        let mut cached = self.lock_cached();
        if generation < cached.generation {
            log::debug!("dropping history read {} overtaken by {}", generation, cached.generation);
            if let CacheState::Loaded(newer) = &cached.state {
                return Ok(newer.clone());
            }
        }
        cached.state = CacheState::Loaded(histories.clone());
        cached.generation = generation;
        log::debug!("history cache refreshed with {} entries", histories.len());
        Ok(histories)
    }

    pub async fn nuke(&self) -> Result<(), StoreError> {
        let generation = self.begin();
        self.store.reset().await?;
        let mut cached = self.lock_cached();
        cached.state = CacheState::Loaded(Vec::new());
        cached.generation = cached.generation.max(generation);
        log::info!("chat store reset");
        Ok(())
    }

    fn begin(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn lock_cached(&self) -> MutexGuard<'_, Cached> {
        self.cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
