use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::coldstore::ColdStore;
use crate::config::SyncConfig;
use crate::hotindex::HotIndex;

/// Periodic HotIndex -> ColdStore snapshot and one-shot startup recovery in
/// the other direction (§4.4). A leaderboard that fails to sync does not
/// stop the others; failures are logged and counted per cycle.
pub struct ReconcileWorker {
    hot: Arc<dyn HotIndex>,
    cold: Arc<dyn ColdStore>,
    config: SyncConfig,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReconcileWorker {
    pub fn new(hot: Arc<dyn HotIndex>, cold: Arc<dyn ColdStore>, config: SyncConfig) -> Arc<Self> {
        Arc::new(ReconcileWorker { hot, cold, config, running: AtomicBool::new(false), handle: Mutex::new(None) })
    }

    /// One-shot ColdStore -> HotIndex rebuild, run synchronously on startup
    /// before the API or queue ingestor opens for business.
    pub async fn sync_all_from_cold(&self) -> anyhow::Result<()> {
        let leaderboards = self.cold.list_leaderboards().await?;
        info!("Rebuilding hot index from cold store for {} leaderboard(s)", leaderboards.len());
        for lb in leaderboards {
            match self.cold.all_scores(&lb.id).await {
                Ok(scores) if scores.is_empty() => continue,
                Ok(scores) => {
                    for chunk in chunk_map(&scores, self.config.batch_size) {
                        if let Err(e) = self.hot.batch_set(&lb.id, &chunk).await {
                            warn!("failed to rebuild hot index for {}: {}", lb.id, e);
                        }
                    }
                }
                Err(e) => warn!("failed to read cold store scores for {}: {}", lb.id, e),
            }
        }
        Ok(())
    }

    async fn sync_to_cold(&self, leaderboard_id: &str, higher_is_better: bool) -> anyhow::Result<()> {
        let entries = self.hot.all(leaderboard_id, higher_is_better).await?;
        let snapshot: std::collections::HashMap<String, i64> =
            entries.into_iter().map(|e| (e.player_id, e.score)).collect();
        for chunk in chunk_map(&snapshot, self.config.batch_size) {
            self.cold.batch_upsert(leaderboard_id, &chunk).await?;
        }
        Ok(())
    }

    async fn run_cycle(&self) {
        let started = Instant::now();
        let leaderboards = match self.cold.list_leaderboards().await {
            Ok(lbs) => lbs,
            Err(e) => {
                warn!("reconcile cycle aborted, could not list leaderboards: {}", e);
                return;
            }
        };
        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for lb in &leaderboards {
            match self.sync_to_cold(&lb.id, lb.sort_order.higher_is_better()).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    failed += 1;
                    warn!("reconcile sync failed for {}: {}", lb.id, e);
                }
            }
        }
        info!(
            "Reconcile cycle finished in {:?}: {} succeeded, {} failed",
            started.elapsed(),
            succeeded,
            failed
        );
    }

    /// Idempotent: a second call while already running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.config.enabled {
            self.running.store(false, Ordering::SeqCst);
            return;
        }
        let worker = self.clone();
        let interval = Duration::from_secs(self.config.interval_secs);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !worker.running.load(Ordering::SeqCst) {
                    break;
                }
                worker.run_cycle().await;
            }
        });
        *self.handle.lock().await = Some(handle);
    }

    /// Waits for any in-flight cycle to finish before returning.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }
}

fn chunk_map(map: &std::collections::HashMap<String, i64>, size: usize) -> Vec<std::collections::HashMap<String, i64>> {
    if map.is_empty() {
        return Vec::new();
    }
    let size = size.max(1);
    let mut chunks = Vec::new();
    let mut current = std::collections::HashMap::with_capacity(size);
    for (k, v) in map {
        current.insert(k.clone(), *v);
        if current.len() >= size {
            chunks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coldstore::memory::InMemoryColdStore;
    use crate::domain::LeaderboardConfig;
    use crate::hotindex::memory::InMemoryHotIndex;
    use chrono::Utc;

    #[tokio::test]
    async fn sync_all_from_cold_rebuilds_hot_index() {
        let cold = Arc::new(InMemoryColdStore::new());
        let hot: Arc<dyn HotIndex> = Arc::new(InMemoryHotIndex::new());
        let cold_trait: Arc<dyn ColdStore> = cold.clone();

        let config = LeaderboardConfig {
            id: "lb1".into(),
            name: "Test".into(),
            sort_order: Default::default(),
            update_mode: Default::default(),
            max_entries: 100,
            reset_period: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        cold.create_leaderboard(&config).await.unwrap();
        let mut scores = std::collections::HashMap::new();
        scores.insert("p1".to_string(), 10);
        scores.insert("p2".to_string(), 20);
        cold.batch_upsert("lb1", &scores).await.unwrap();

        let worker = ReconcileWorker::new(hot.clone(), cold_trait, SyncConfig { interval_secs: 1800, batch_size: 10, enabled: true });
        worker.sync_all_from_cold().await.unwrap();

        assert_eq!(hot.count("lb1").await.unwrap(), 2);
    }
}
