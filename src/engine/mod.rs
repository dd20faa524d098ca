use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;

use chrono::Utc;

use crate::coldstore::ColdStore;
use crate::config::LeaderboardQueryConfig;
use crate::domain::{
    CreateLeaderboardRequest, LeaderboardConfig, LeaderboardStats, PlayerScore, RankEntry, ResetPeriod,
    ScoreEvent, ScoreEventType, ScoreSubmission, SortOrder, UpdateMode, DEFAULT_MAX_ENTRIES,
};
use crate::hotindex::HotIndex;
use crate::subscription::SubscriptionHub;
use crate::util::error::AppError;

const MAX_AROUND_RADIUS: u64 = 50;

/// Result of applying a single submission, handed to the subscription hub
/// for broadcast and to callers of `submit_batch` for per-item reporting.
pub struct SubmitOutcome {
    pub leaderboard_id: String,
    pub player_id: String,
    pub score: i64,
}

/// Orchestrates the hot index, cold store and subscription hub for every
/// write and read path (§4.3). Holds a small engine-local cache of
/// leaderboard configs so reads don't round-trip the cold store on every
/// request; the cache is invalidated on create/reset/delete.
pub struct RankingEngine {
    hot: Arc<dyn HotIndex>,
    cold: Arc<dyn ColdStore>,
    hub: Arc<SubscriptionHub>,
    query_config: LeaderboardQueryConfig,
    config_cache: RwLock<HashMap<String, LeaderboardConfig>>,
}

impl RankingEngine {
    pub fn new(
        hot: Arc<dyn HotIndex>,
        cold: Arc<dyn ColdStore>,
        hub: Arc<SubscriptionHub>,
        query_config: LeaderboardQueryConfig,
    ) -> Self {
        RankingEngine {
            hot,
            cold,
            hub,
            query_config,
            config_cache: RwLock::new(HashMap::new()),
        }
    }

    fn cache_invalidate(&self, id: &str) {
        self.config_cache.write().unwrap().remove(id);
    }

    fn cache_put(&self, config: LeaderboardConfig) {
        self.config_cache.write().unwrap().insert(config.id.clone(), config);
    }

    async fn config_for(&self, id: &str) -> Result<LeaderboardConfig, AppError> {
        if let Some(config) = self.config_cache.read().unwrap().get(id).cloned() {
            return Ok(config);
        }
        let config = self
            .cold
            .get_leaderboard(id)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .ok_or(AppError::LeaderboardNotFound)?;
        self.cache_put(config.clone());
        Ok(config)
    }

    fn clamp_limit(&self, limit: Option<u64>) -> u64 {
        let limit = limit.unwrap_or(self.query_config.default_limit);
        limit.clamp(1, self.query_config.max_limit)
    }

    pub async fn create_leaderboard(&self, request: CreateLeaderboardRequest) -> Result<LeaderboardConfig, AppError> {
        if request.id.trim().is_empty() {
            return Err(AppError::InvalidRequest("leaderboard id must not be empty".into()));
        }
        if request.name.trim().is_empty() {
            return Err(AppError::InvalidRequest("leaderboard name must not be empty".into()));
        }
        if self
            .cold
            .leaderboard_exists(&request.id)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
        {
            return Err(AppError::LeaderboardAlreadyExists);
        }
        let now = Utc::now();
        let config = LeaderboardConfig {
            id: request.id,
            name: request.name,
            sort_order: request.sort_order.unwrap_or_default(),
            update_mode: request.update_mode.unwrap_or_default(),
            max_entries: request.max_entries.unwrap_or(DEFAULT_MAX_ENTRIES),
            reset_period: request.reset_period.unwrap_or(ResetPeriod::None),
            created_at: now,
            updated_at: now,
        };
        self.cold
            .create_leaderboard(&config)
            .await
            .map_err(|e| match e {
                crate::coldstore::ColdStoreError::AlreadyExists => AppError::LeaderboardAlreadyExists,
                other => AppError::Internal(other.to_string()),
            })?;
        self.cache_put(config.clone());
        info!("Created leaderboard {}", config.id);
        Ok(config)
    }

    pub async fn delete_leaderboard(&self, id: &str) -> Result<(), AppError> {
        self.config_for(id).await?;
        self.hot
            .drop_leaderboard(id)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        self.cold
            .delete_leaderboard(id)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        self.cache_invalidate(id);
        info!("Deleted leaderboard {}", id);
        Ok(())
    }

    pub async fn reset_leaderboard(&self, id: &str) -> Result<(), AppError> {
        self.config_for(id).await?;
        self.hot
            .drop_leaderboard(id)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        self.cold
            .reset_leaderboard(id)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        self.cache_invalidate(id);
        // Leaderboard-wide action, not a single player's; player_id is left
        // empty since the event covers every player on the board.
        crate::util::validation::verbose_result_ok(
            format!("cold store record_event failed for reset of {}", id),
            self.cold
                .record_event(&ScoreEvent {
                    leaderboard_id: id.to_string(),
                    player_id: String::new(),
                    score: 0,
                    event_type: ScoreEventType::Reset,
                    game_id: None,
                    metadata: None,
                    timestamp: Utc::now(),
                })
                .await,
        );
        self.broadcast_top(id).await;
        info!("Reset leaderboard {}", id);
        Ok(())
    }

    pub async fn submit(&self, submission: ScoreSubmission) -> Result<SubmitOutcome, AppError> {
        if submission.player_id.trim().is_empty() {
            return Err(AppError::InvalidRequest("player id must not be empty".into()));
        }
        let config = self.config_for(&submission.leaderboard_id).await?;
        let higher_is_better = config.sort_order.higher_is_better();

        let resolved_score = match config.update_mode {
            UpdateMode::Replace => {
                self.hot
                    .set(&config.id, &submission.player_id, submission.score)
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                let player_score = PlayerScore {
                    leaderboard_id: config.id.clone(),
                    player_id: submission.player_id.clone(),
                    score: submission.score,
                    metadata: submission.metadata.clone(),
                    updated_at: Utc::now(),
                };
                crate::util::validation::verbose_result_ok(
                    format!("cold store upsert_score failed for {}/{}", config.id, submission.player_id),
                    self.cold.upsert_score(&player_score).await,
                );
                submission.score
            }
            UpdateMode::Increment => {
                let new_score = self
                    .hot
                    .incr(&config.id, &submission.player_id, submission.score)
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                crate::util::validation::verbose_result_ok(
                    format!("cold store increment_score failed for {}/{}", config.id, submission.player_id),
                    self.cold.increment_score(&config.id, &submission.player_id, submission.score).await,
                );
                new_score
            }
            UpdateMode::Best => {
                self.hot
                    .set_if_better(&config.id, &submission.player_id, submission.score, higher_is_better)
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                // HotIndex is the source of truth for live reads (§4.3); read back
                // the player's current best rather than trusting the cold store's
                // best-effort write, which may fail independently of the hot write.
                let current = self
                    .hot
                    .rank_of(&config.id, &submission.player_id, higher_is_better)
                    .await
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                let resolved = current.map(|e| e.score).unwrap_or(submission.score);
                let player_score = PlayerScore {
                    leaderboard_id: config.id.clone(),
                    player_id: submission.player_id.clone(),
                    score: resolved,
                    metadata: submission.metadata.clone(),
                    updated_at: Utc::now(),
                };
                crate::util::validation::verbose_result_ok(
                    format!("cold store upsert_best_score failed for {}/{}", config.id, submission.player_id),
                    self.cold.upsert_best_score(&player_score, higher_is_better).await,
                );
                resolved
            }
        };

        let event = ScoreEvent {
            leaderboard_id: config.id.clone(),
            player_id: submission.player_id.clone(),
            score: submission.score,
            event_type: match config.update_mode {
                UpdateMode::Increment => ScoreEventType::Increment,
                _ => ScoreEventType::Submit,
            },
            game_id: submission.game_id,
            metadata: submission.metadata,
            timestamp: Utc::now(),
        };
        crate::util::validation::verbose_result_ok(
            format!("cold store record_event failed for {}/{}", config.id, submission.player_id),
            self.cold.record_event(&event).await,
        );

        self.hub
            .broadcast_player_update(&config.id, &submission.player_id, resolved_score)
            .await;
        self.broadcast_top(&config.id).await;

        Ok(SubmitOutcome { leaderboard_id: config.id, player_id: submission.player_id, score: resolved_score })
    }

    /// Applies every submission independently; one failure does not abort
    /// the rest (§4.3 batch semantics).
    pub async fn submit_batch(&self, submissions: Vec<ScoreSubmission>) -> Vec<Result<SubmitOutcome, AppError>> {
        let mut results = Vec::with_capacity(submissions.len());
        for submission in submissions {
            results.push(self.submit(submission).await);
        }
        results
    }

    pub async fn remove_player(&self, leaderboard_id: &str, player_id: &str) -> Result<(), AppError> {
        self.config_for(leaderboard_id).await?;
        self.hot
            .remove(leaderboard_id, player_id)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        self.cold
            .remove_player(leaderboard_id, player_id)
            .await
            .map_err(|e| match e {
                crate::coldstore::ColdStoreError::NotFound => AppError::PlayerNotFound,
                other => AppError::Internal(other.to_string()),
            })?;
        self.broadcast_top(leaderboard_id).await;
        Ok(())
    }

    pub async fn top(&self, leaderboard_id: &str, limit: Option<u64>) -> Result<Vec<RankEntry>, AppError> {
        let config = self.config_for(leaderboard_id).await?;
        let limit = self.clamp_limit(limit);
        self.hot
            .top_n(leaderboard_id, limit, config.sort_order.higher_is_better())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    pub async fn range(&self, leaderboard_id: &str, start: u64, end: u64) -> Result<Vec<RankEntry>, AppError> {
        let config = self.config_for(leaderboard_id).await?;
        let max_limit = self.query_config.max_limit;
        let end = end.min(start + max_limit.saturating_sub(1));
        self.hot
            .range(leaderboard_id, start, end, config.sort_order.higher_is_better())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    pub async fn around(&self, leaderboard_id: &str, player_id: &str, radius: u64) -> Result<Vec<RankEntry>, AppError> {
        let config = self.config_for(leaderboard_id).await?;
        let radius = radius.clamp(1, MAX_AROUND_RADIUS);
        self.hot
            .around(leaderboard_id, player_id, radius, config.sort_order.higher_is_better())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))
    }

    pub async fn player_rank(&self, leaderboard_id: &str, player_id: &str) -> Result<RankEntry, AppError> {
        let config = self.config_for(leaderboard_id).await?;
        self.hot
            .rank_of(leaderboard_id, player_id, config.sort_order.higher_is_better())
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .ok_or(AppError::PlayerNotFound)
    }

    pub async fn count(&self, leaderboard_id: &str) -> Result<u64, AppError> {
        self.config_for(leaderboard_id).await?;
        self.hot.count(leaderboard_id).await.map_err(|e| AppError::Internal(e.to_string()))
    }

    pub async fn stats(&self, leaderboard_id: &str) -> Result<LeaderboardStats, AppError> {
        let config = self.config_for(leaderboard_id).await?;
        let higher_is_better = config.sort_order.higher_is_better();
        let total_players = self
            .hot
            .count(leaderboard_id)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let top = self
            .hot
            .top_n(leaderboard_id, 1, higher_is_better)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let bottom = self
            .hot
            .bottom_n(leaderboard_id, 1, higher_is_better)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(LeaderboardStats {
            total_players,
            top_score: top.first().map(|e| e.score),
            lowest_score: bottom.first().map(|e| e.score),
        })
    }

    pub async fn get_leaderboard(&self, id: &str) -> Result<LeaderboardConfig, AppError> {
        self.config_for(id).await
    }

    pub async fn list_leaderboards(&self) -> Result<Vec<LeaderboardConfig>, AppError> {
        self.cold.list_leaderboards().await.map_err(|e| AppError::Internal(e.to_string()))
    }

    async fn broadcast_top(&self, leaderboard_id: &str) {
        let higher_is_better = match self.config_cache.read().unwrap().get(leaderboard_id) {
            Some(c) => c.sort_order.higher_is_better(),
            None => true,
        };
        let snapshot_limit = self.query_config.default_limit;
        match self.hot.top_n(leaderboard_id, snapshot_limit, higher_is_better).await {
            Ok(top) => self.hub.broadcast_leaderboard_update(leaderboard_id, &top).await,
            Err(e) => warn!("failed to snapshot top for broadcast on {}: {}", leaderboard_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coldstore::memory::InMemoryColdStore;
    use crate::hotindex::memory::InMemoryHotIndex;

    fn test_engine() -> RankingEngine {
        RankingEngine::new(
            Arc::new(InMemoryHotIndex::new()),
            Arc::new(InMemoryColdStore::new()),
            Arc::new(SubscriptionHub::new()),
            LeaderboardQueryConfig { default_limit: 100, max_limit: 1000 },
        )
    }

    #[tokio::test]
    async fn create_then_submit_then_top() {
        let engine = test_engine();
        engine
            .create_leaderboard(CreateLeaderboardRequest {
                id: "lb1".into(),
                name: "Weekly".into(),
                sort_order: Some(SortOrder::Descending),
                update_mode: Some(UpdateMode::Best),
                max_entries: None,
                reset_period: None,
            })
            .await
            .unwrap();

        engine
            .submit(ScoreSubmission { leaderboard_id: "lb1".into(), player_id: "p1".into(), score: 100, game_id: None, metadata: None })
            .await
            .unwrap();
        engine
            .submit(ScoreSubmission { leaderboard_id: "lb1".into(), player_id: "p1".into(), score: 50, game_id: None, metadata: None })
            .await
            .unwrap();

        let top = engine.top("lb1", None).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].score, 100);
    }

    #[tokio::test]
    async fn duplicate_create_is_conflict() {
        let engine = test_engine();
        let req = || CreateLeaderboardRequest {
            id: "lb1".into(),
            name: "Weekly".into(),
            sort_order: None,
            update_mode: None,
            max_entries: None,
            reset_period: None,
        };
        engine.create_leaderboard(req()).await.unwrap();
        let err = engine.create_leaderboard(req()).await.unwrap_err();
        assert!(matches!(err, AppError::LeaderboardAlreadyExists));
    }

    #[tokio::test]
    async fn submit_to_unknown_leaderboard_is_not_found() {
        let engine = test_engine();
        let err = engine
            .submit(ScoreSubmission { leaderboard_id: "missing".into(), player_id: "p1".into(), score: 1, game_id: None, metadata: None })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LeaderboardNotFound));
    }
}
