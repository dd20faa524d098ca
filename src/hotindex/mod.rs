pub mod memory;
pub mod redis_store;

use crate::domain::RankEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HotIndexError {
    #[error("hot index transport error: {0}")]
    Transport(String),
}

pub type HotIndexResult<T> = Result<T, HotIndexError>;

/// Per-leaderboard ordered-by-score index. All operations are scoped to a
/// single leaderboard id; the store itself holds every leaderboard's index.
///
/// `set`/`incr`/`remove`/`rank_of` must be O(log N); `top_n`/`around`/`range`
/// must be O(log N + k); `all` is O(N). `set_if_better` must be linearizable
/// against concurrent `set`/`incr` on the same (leaderboard, player) — the
/// Redis implementation gets this for free from `ZADD`/`ZSCORE` being
/// single-threaded server-side operations on the same key.
#[async_trait]
pub trait HotIndex: Send + Sync {
    async fn set(&self, lb: &str, player: &str, score: i64) -> HotIndexResult<()>;

    async fn incr(&self, lb: &str, player: &str, delta: i64) -> HotIndexResult<i64>;

    /// Atomic compare-and-write: write iff strictly better than the current
    /// value (absent counts as write). Returns whether a write happened.
    async fn set_if_better(
        &self,
        lb: &str,
        player: &str,
        score: i64,
        higher_is_better: bool,
    ) -> HotIndexResult<bool>;

    async fn remove(&self, lb: &str, player: &str) -> HotIndexResult<()>;

    async fn top_n(&self, lb: &str, n: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>>;

    /// Mirror of `top_n` from the worst end; ranks are still dense ranks
    /// over the full membership (worst entry's rank == `count`).
    async fn bottom_n(&self, lb: &str, n: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>>;

    async fn rank_of(&self, lb: &str, player: &str, higher_is_better: bool) -> HotIndexResult<Option<RankEntry>>;

    /// Window of up to 2r+1 entries centred on the player's rank, clipped to
    /// [1, count].
    async fn around(&self, lb: &str, player: &str, r: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>>;

    /// `start`/`end` are 0-based inclusive indices; returns entries with
    /// ranks in [start+1, end+1].
    async fn range(&self, lb: &str, start: u64, end: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>>;

    async fn count(&self, lb: &str) -> HotIndexResult<u64>;

    async fn all(&self, lb: &str, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>>;

    async fn drop_leaderboard(&self, lb: &str) -> HotIndexResult<()>;

    async fn batch_set(&self, lb: &str, scores: &HashMap<String, i64>) -> HotIndexResult<()>;
}
