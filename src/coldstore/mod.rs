pub mod memory;
pub mod postgres_store;
pub mod schema;

use crate::domain::{LeaderboardConfig, PlayerScore, RankEntry, ScoreEvent};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ColdStoreError {
    #[error("leaderboard already exists")]
    AlreadyExists,
    #[error("not found")]
    NotFound,
    #[error("cold store transport error: {0}")]
    Transport(String),
}

pub type ColdStoreResult<T> = Result<T, ColdStoreError>;

/// Durable source of truth: leaderboard configurations, current per-player
/// scores, and the append-only event log (§4.2). Deleting a leaderboard
/// cascades to its player-score rows.
#[async_trait]
pub trait ColdStore: Send + Sync {
    async fn create_leaderboard(&self, config: &LeaderboardConfig) -> ColdStoreResult<()>;
    async fn get_leaderboard(&self, id: &str) -> ColdStoreResult<Option<LeaderboardConfig>>;
    async fn list_leaderboards(&self) -> ColdStoreResult<Vec<LeaderboardConfig>>;
    async fn delete_leaderboard(&self, id: &str) -> ColdStoreResult<()>;
    async fn leaderboard_exists(&self, id: &str) -> ColdStoreResult<bool>;

    async fn upsert_score(&self, score: &PlayerScore) -> ColdStoreResult<()>;
    async fn upsert_best_score(&self, score: &PlayerScore, higher_is_better: bool) -> ColdStoreResult<i64>;
    async fn increment_score(&self, lb: &str, player: &str, delta: i64) -> ColdStoreResult<i64>;

    async fn record_event(&self, event: &ScoreEvent) -> ColdStoreResult<()>;

    async fn get_player_score(&self, lb: &str, player: &str, higher_is_better: bool)
        -> ColdStoreResult<Option<RankEntry>>;

    async fn list_scores(&self, lb: &str, higher_is_better: bool, limit: u64, offset: u64) -> ColdStoreResult<Vec<RankEntry>>;

    async fn all_scores(&self, lb: &str) -> ColdStoreResult<HashMap<String, i64>>;

    async fn remove_player(&self, lb: &str, player: &str) -> ColdStoreResult<()>;

    async fn reset_leaderboard(&self, lb: &str) -> ColdStoreResult<()>;

    async fn batch_upsert(&self, lb: &str, scores: &HashMap<String, i64>) -> ColdStoreResult<()>;

    async fn player_count(&self, lb: &str) -> ColdStoreResult<u64>;
}
