use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_postgres::{Config as PgConfig, Pool, Runtime};
use tokio_postgres::NoTls;

use crate::config::ColdStoreConfig;
use crate::coldstore::{ColdStore, ColdStoreError, ColdStoreResult};
use crate::domain::{LeaderboardConfig, PlayerScore, RankEntry, ScoreEvent};

pub struct PostgresColdStore {
    pool: Pool,
}

fn order_clause(higher_is_better: bool) -> &'static str {
    if higher_is_better {
        "score DESC, player_id ASC"
    } else {
        "score ASC, player_id ASC"
    }
}

impl PostgresColdStore {
    pub fn new(config: &ColdStoreConfig) -> ColdStoreResult<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host = Some(config.host.clone());
        pg_config.port = Some(config.port);
        pg_config.user = Some(config.user.clone());
        pg_config.password = Some(config.password.clone());
        pg_config.dbname = Some(config.database.clone());
        pg_config.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });
        pg_config.pool = Some(deadpool_postgres::PoolConfig::new(config.max_connections));

        let pool = pg_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(PostgresColdStore { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn conn(&self) -> ColdStoreResult<deadpool_postgres::Client> {
        self.pool.get().await.map_err(|e| ColdStoreError::Transport(e.to_string()))
    }
}

fn row_to_config(row: &tokio_postgres::Row) -> ColdStoreResult<LeaderboardConfig> {
    let sort_order: String = row.get("sort_order");
    let update_mode: String = row.get("update_mode");
    let reset_period: String = row.get("reset_period");
    Ok(LeaderboardConfig {
        id: row.get("id"),
        name: row.get("name"),
        sort_order: sort_order
            .parse()
            .map_err(|_| ColdStoreError::Transport("corrupt sort_order".into()))?,
        update_mode: update_mode
            .parse()
            .map_err(|_| ColdStoreError::Transport("corrupt update_mode".into()))?,
        max_entries: row.get::<_, i32>("max_entries") as u32,
        reset_period: reset_period
            .parse()
            .map_err(|_| ColdStoreError::Transport("corrupt reset_period".into()))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl ColdStore for PostgresColdStore {
    async fn create_leaderboard(&self, config: &LeaderboardConfig) -> ColdStoreResult<()> {
        let client = self.conn().await?;
        let result = client
            .execute(
                "INSERT INTO leaderboards (id, name, sort_order, update_mode, max_entries, reset_period, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &config.id,
                    &config.name,
                    &config.sort_order.to_string(),
                    &config.update_mode.to_string(),
                    &(config.max_entries as i32),
                    &config.reset_period.to_string(),
                    &config.created_at,
                    &config.updated_at,
                ],
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some(&tokio_postgres::error::SqlState::UNIQUE_VIOLATION) => {
                Err(ColdStoreError::AlreadyExists)
            }
            Err(e) => Err(ColdStoreError::Transport(e.to_string())),
        }
    }

    async fn get_leaderboard(&self, id: &str) -> ColdStoreResult<Option<LeaderboardConfig>> {
        let client = self.conn().await?;
        let row = client
            .query_opt("SELECT * FROM leaderboards WHERE id = $1", &[&id])
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        row.as_ref().map(row_to_config).transpose()
    }

    async fn list_leaderboards(&self) -> ColdStoreResult<Vec<LeaderboardConfig>> {
        let client = self.conn().await?;
        let rows = client
            .query("SELECT * FROM leaderboards ORDER BY created_at ASC", &[])
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        rows.iter().map(row_to_config).collect()
    }

    async fn delete_leaderboard(&self, id: &str) -> ColdStoreResult<()> {
        let client = self.conn().await?;
        client
            .execute("DELETE FROM leaderboards WHERE id = $1", &[&id])
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn leaderboard_exists(&self, id: &str) -> ColdStoreResult<bool> {
        let client = self.conn().await?;
        let row = client
            .query_one("SELECT EXISTS(SELECT 1 FROM leaderboards WHERE id = $1) AS present", &[&id])
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(row.get("present"))
    }

    async fn upsert_score(&self, score: &PlayerScore) -> ColdStoreResult<()> {
        let client = self.conn().await?;
        client
            .execute(
                "INSERT INTO player_scores (leaderboard_id, player_id, score, metadata, updated_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (leaderboard_id, player_id) DO UPDATE SET
                    score = EXCLUDED.score, metadata = EXCLUDED.metadata, updated_at = EXCLUDED.updated_at",
                &[&score.leaderboard_id, &score.player_id, &score.score, &score.metadata, &score.updated_at],
            )
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn upsert_best_score(&self, score: &PlayerScore, higher_is_better: bool) -> ColdStoreResult<i64> {
        let client = self.conn().await?;
        let comparator = if higher_is_better { ">" } else { "<" };
        let query = format!(
            "INSERT INTO player_scores (leaderboard_id, player_id, score, metadata, updated_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (leaderboard_id, player_id) DO UPDATE SET
                score = CASE WHEN EXCLUDED.score {comparator} player_scores.score THEN EXCLUDED.score ELSE player_scores.score END,
                metadata = CASE WHEN EXCLUDED.score {comparator} player_scores.score THEN EXCLUDED.metadata ELSE player_scores.metadata END,
                updated_at = CASE WHEN EXCLUDED.score {comparator} player_scores.score THEN EXCLUDED.updated_at ELSE player_scores.updated_at END
             RETURNING score",
            comparator = comparator
        );
        let row = client
            .query_one(
                query.as_str(),
                &[&score.leaderboard_id, &score.player_id, &score.score, &score.metadata, &score.updated_at],
            )
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(row.get("score"))
    }

    async fn increment_score(&self, lb: &str, player: &str, delta: i64) -> ColdStoreResult<i64> {
        let client = self.conn().await?;
        let now = Utc::now();
        let row = client
            .query_one(
                "INSERT INTO player_scores (leaderboard_id, player_id, score, updated_at)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (leaderboard_id, player_id) DO UPDATE SET
                    score = player_scores.score + EXCLUDED.score, updated_at = EXCLUDED.updated_at
                 RETURNING score",
                &[&lb, &player, &delta, &now],
            )
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(row.get("score"))
    }

    async fn record_event(&self, event: &ScoreEvent) -> ColdStoreResult<()> {
        let client = self.conn().await?;
        client
            .execute(
                "INSERT INTO score_events (leaderboard_id, player_id, score, event_type, game_id, metadata, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &event.leaderboard_id,
                    &event.player_id,
                    &event.score,
                    &event.event_type.to_string(),
                    &event.game_id,
                    &event.metadata,
                    &event.timestamp,
                ],
            )
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn get_player_score(
        &self,
        lb: &str,
        player: &str,
        higher_is_better: bool,
    ) -> ColdStoreResult<Option<RankEntry>> {
        let client = self.conn().await?;
        let query = format!(
            "SELECT player_id, score, rnk FROM (
                 SELECT player_id, score, ROW_NUMBER() OVER (ORDER BY {order}) AS rnk
                 FROM player_scores WHERE leaderboard_id = $1
             ) ranked WHERE player_id = $2",
            order = order_clause(higher_is_better)
        );
        let row = client
            .query_opt(query.as_str(), &[&lb, &player])
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(row.map(|r| RankEntry {
            rank: r.get::<_, i64>("rnk") as u64,
            player_id: r.get("player_id"),
            score: r.get("score"),
        }))
    }

    async fn list_scores(
        &self,
        lb: &str,
        higher_is_better: bool,
        limit: u64,
        offset: u64,
    ) -> ColdStoreResult<Vec<RankEntry>> {
        let client = self.conn().await?;
        let query = format!(
            "SELECT player_id, score, ROW_NUMBER() OVER (ORDER BY {order}) AS rnk
             FROM player_scores WHERE leaderboard_id = $1
             ORDER BY {order}
             LIMIT $2 OFFSET $3",
            order = order_clause(higher_is_better)
        );
        let rows = client
            .query(query.as_str(), &[&lb, &(limit as i64), &(offset as i64)])
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(rows
            .iter()
            .map(|r| RankEntry {
                rank: r.get::<_, i64>("rnk") as u64,
                player_id: r.get("player_id"),
                score: r.get("score"),
            })
            .collect())
    }

    async fn all_scores(&self, lb: &str) -> ColdStoreResult<HashMap<String, i64>> {
        let client = self.conn().await?;
        let rows = client
            .query("SELECT player_id, score FROM player_scores WHERE leaderboard_id = $1", &[&lb])
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(rows.iter().map(|r| (r.get("player_id"), r.get("score"))).collect())
    }

    async fn remove_player(&self, lb: &str, player: &str) -> ColdStoreResult<()> {
        let client = self.conn().await?;
        let affected = client
            .execute(
                "DELETE FROM player_scores WHERE leaderboard_id = $1 AND player_id = $2",
                &[&lb, &player],
            )
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        if affected == 0 {
            return Err(ColdStoreError::NotFound);
        }
        Ok(())
    }

    async fn reset_leaderboard(&self, lb: &str) -> ColdStoreResult<()> {
        let client = self.conn().await?;
        client
            .execute("DELETE FROM player_scores WHERE leaderboard_id = $1", &[&lb])
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn batch_upsert(&self, lb: &str, scores: &HashMap<String, i64>) -> ColdStoreResult<()> {
        if scores.is_empty() {
            return Ok(());
        }
        let mut client = self.conn().await?;
        let now = Utc::now();
        let tx = client.transaction().await.map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        {
            let stmt = tx
                .prepare(
                    "INSERT INTO player_scores (leaderboard_id, player_id, score, updated_at)
                     VALUES ($1, $2, $3, $4)
                     ON CONFLICT (leaderboard_id, player_id) DO UPDATE SET
                        score = EXCLUDED.score, updated_at = EXCLUDED.updated_at",
                )
                .await
                .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
            for (player, score) in scores {
                tx.execute(&stmt, &[&lb, player, score, &now])
                    .await
                    .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
            }
        }
        tx.commit().await.map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn player_count(&self, lb: &str) -> ColdStoreResult<u64> {
        let client = self.conn().await?;
        let row = client
            .query_one(
                "SELECT COUNT(*) AS total FROM player_scores WHERE leaderboard_id = $1",
                &[&lb],
            )
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
        Ok(row.get::<_, i64>("total") as u64)
    }
}
