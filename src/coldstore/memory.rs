use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::coldstore::{ColdStore, ColdStoreError, ColdStoreResult};
use crate::domain::{LeaderboardConfig, PlayerScore, RankEntry, ScoreEvent};

#[derive(Default)]
struct State {
    configs: HashMap<String, LeaderboardConfig>,
    scores: HashMap<String, HashMap<String, PlayerScore>>,
    events: Vec<ScoreEvent>,
}

/// In-memory `ColdStore` used by engine/reconcile tests, mirroring
/// `InMemoryHotIndex`. Not durable, not meant to exercise persistence.
#[derive(Default)]
pub struct InMemoryColdStore {
    state: Mutex<State>,
}

impl InMemoryColdStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ordered(board: &HashMap<String, PlayerScore>, higher_is_better: bool) -> Vec<(String, i64)> {
        let mut entries: Vec<(String, i64)> = board.iter().map(|(p, s)| (p.clone(), s.score)).collect();
        entries.sort_by(|a, b| {
            let score_cmp = if higher_is_better { b.1.cmp(&a.1) } else { a.1.cmp(&b.1) };
            score_cmp.then_with(|| a.0.cmp(&b.0))
        });
        entries
    }
}

#[async_trait]
impl ColdStore for InMemoryColdStore {
    async fn create_leaderboard(&self, config: &LeaderboardConfig) -> ColdStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.configs.contains_key(&config.id) {
            return Err(ColdStoreError::AlreadyExists);
        }
        state.configs.insert(config.id.clone(), config.clone());
        state.scores.entry(config.id.clone()).or_default();
        Ok(())
    }

    async fn get_leaderboard(&self, id: &str) -> ColdStoreResult<Option<LeaderboardConfig>> {
        let state = self.state.lock().unwrap();
        Ok(state.configs.get(id).cloned())
    }

    async fn list_leaderboards(&self) -> ColdStoreResult<Vec<LeaderboardConfig>> {
        let state = self.state.lock().unwrap();
        Ok(state.configs.values().cloned().collect())
    }

    async fn delete_leaderboard(&self, id: &str) -> ColdStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.configs.remove(id);
        state.scores.remove(id);
        Ok(())
    }

    async fn leaderboard_exists(&self, id: &str) -> ColdStoreResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.configs.contains_key(id))
    }

    async fn upsert_score(&self, score: &PlayerScore) -> ColdStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .scores
            .entry(score.leaderboard_id.clone())
            .or_default()
            .insert(score.player_id.clone(), score.clone());
        Ok(())
    }

    async fn upsert_best_score(&self, score: &PlayerScore, higher_is_better: bool) -> ColdStoreResult<i64> {
        let mut state = self.state.lock().unwrap();
        let board = state.scores.entry(score.leaderboard_id.clone()).or_default();
        let resolved = match board.get(&score.player_id) {
            Some(existing) if higher_is_better && existing.score >= score.score => existing.score,
            Some(existing) if !higher_is_better && existing.score <= score.score => existing.score,
            _ => {
                board.insert(score.player_id.clone(), score.clone());
                score.score
            }
        };
        Ok(resolved)
    }

    async fn increment_score(&self, lb: &str, player: &str, delta: i64) -> ColdStoreResult<i64> {
        let mut state = self.state.lock().unwrap();
        let board = state.scores.entry(lb.to_string()).or_default();
        let now = Utc::now();
        let entry = board.entry(player.to_string()).or_insert_with(|| PlayerScore {
            leaderboard_id: lb.to_string(),
            player_id: player.to_string(),
            score: 0,
            metadata: None,
            updated_at: now,
        });
        entry.score += delta;
        entry.updated_at = now;
        Ok(entry.score)
    }

    async fn record_event(&self, event: &ScoreEvent) -> ColdStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(event.clone());
        Ok(())
    }

    async fn get_player_score(
        &self,
        lb: &str,
        player: &str,
        higher_is_better: bool,
    ) -> ColdStoreResult<Option<RankEntry>> {
        let state = self.state.lock().unwrap();
        let board = match state.scores.get(lb) {
            Some(b) => b,
            None => return Ok(None),
        };
        let ordered = Self::ordered(board, higher_is_better);
        Ok(ordered
            .iter()
            .position(|(p, _)| p == player)
            .map(|idx| RankEntry { rank: idx as u64 + 1, player_id: player.to_string(), score: ordered[idx].1 }))
    }

    async fn list_scores(
        &self,
        lb: &str,
        higher_is_better: bool,
        limit: u64,
        offset: u64,
    ) -> ColdStoreResult<Vec<RankEntry>> {
        let state = self.state.lock().unwrap();
        let board = match state.scores.get(lb) {
            Some(b) => b,
            None => return Ok(Vec::new()),
        };
        let ordered = Self::ordered(board, higher_is_better);
        Ok(ordered
            .into_iter()
            .enumerate()
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(i, (p, s))| RankEntry { rank: i as u64 + 1, player_id: p, score: s })
            .collect())
    }

    async fn all_scores(&self, lb: &str) -> ColdStoreResult<HashMap<String, i64>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .scores
            .get(lb)
            .map(|board| board.iter().map(|(p, s)| (p.clone(), s.score)).collect())
            .unwrap_or_default())
    }

    async fn remove_player(&self, lb: &str, player: &str) -> ColdStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.scores.get_mut(lb).and_then(|board| board.remove(player)) {
            Some(_) => Ok(()),
            None => Err(ColdStoreError::NotFound),
        }
    }

    async fn reset_leaderboard(&self, lb: &str) -> ColdStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(board) = state.scores.get_mut(lb) {
            board.clear();
        }
        Ok(())
    }

    async fn batch_upsert(&self, lb: &str, scores: &HashMap<String, i64>) -> ColdStoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let board = state.scores.entry(lb.to_string()).or_default();
        let now = Utc::now();
        for (player, score) in scores {
            board.insert(
                player.clone(),
                PlayerScore {
                    leaderboard_id: lb.to_string(),
                    player_id: player.clone(),
                    score: *score,
                    metadata: None,
                    updated_at: now,
                },
            );
        }
        Ok(())
    }

    async fn player_count(&self, lb: &str) -> ColdStoreResult<u64> {
        let state = self.state.lock().unwrap();
        Ok(state.scores.get(lb).map(|b| b.len() as u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_leaderboard_rejects_duplicates() {
        let store = InMemoryColdStore::new();
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
        store.create_leaderboard(&config).await.unwrap();
        let err = store.create_leaderboard(&config).await.unwrap_err();
        assert!(matches!(err, ColdStoreError::AlreadyExists));
    }

    #[tokio::test]
    async fn upsert_best_score_only_moves_in_favorable_direction() {
        let store = InMemoryColdStore::new();
        let mk = |score: i64| PlayerScore {
            leaderboard_id: "lb1".into(),
            player_id: "p1".into(),
            score,
            metadata: None,
            updated_at: Utc::now(),
        };
        assert_eq!(store.upsert_best_score(&mk(100), true).await.unwrap(), 100);
        assert_eq!(store.upsert_best_score(&mk(50), true).await.unwrap(), 100);
        assert_eq!(store.upsert_best_score(&mk(150), true).await.unwrap(), 150);
    }
}
