use dashmap::DashMap;
use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc
    }
};
use tokio::sync::OnceCell;

/// Parsed beatmaps for the duration of one run, keyed by beatmap id.
///
/// Concurrent misses for the same id share a single load; a failed load
/// leaves the slot empty so a later item can try again. Nothing is ever
/// evicted.
pub struct BeatmapCache<B> {
    entries: DashMap<i32, Arc<OnceCell<Arc<B>>>>,
    loads: AtomicUsize
}

impl<B> Default for BeatmapCache<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> BeatmapCache<B> {
    pub fn new() -> Self {
        BeatmapCache {
            entries: DashMap::new(),
            loads: AtomicUsize::new(0)
        }
    }

    // The shard guard is released here, before the slot is awaited
    fn slot(&self, map_id: i32) -> Arc<OnceCell<Arc<B>>> {
        self.entries.entry(map_id).or_default().clone()
    }

    /// Returns the cached beatmap or runs `load` to produce it
    pub async fn get_or_load<E, F, Fut>(&self, map_id: i32, load: F) -> Result<Arc<B>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<B, E>>
    {
        let slot = self.slot(map_id);
        let beatmap = slot
            .get_or_try_init(|| async move {
                self.loads.fetch_add(1, Ordering::Relaxed);
                load().await.map(Arc::new)
            })
            .await?;

        Ok(Arc::clone(beatmap))
    }

    pub fn get(&self, map_id: i32) -> Option<Arc<B>> {
        self.entries.get(&map_id).and_then(|slot| slot.get().cloned())
    }

    /// Number of beatmaps held
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|entry| entry.value().initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times a loader was started, successful or not
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}
