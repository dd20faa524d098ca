use deadpool_postgres::Pool;

use crate::coldstore::{ColdStoreError, ColdStoreResult};

const CREATE_LEADERBOARDS: &str = r#"
CREATE TABLE IF NOT EXISTS leaderboards (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    sort_order TEXT NOT NULL,
    update_mode TEXT NOT NULL,
    max_entries INTEGER NOT NULL,
    reset_period TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_PLAYER_SCORES: &str = r#"
CREATE TABLE IF NOT EXISTS player_scores (
    leaderboard_id TEXT NOT NULL REFERENCES leaderboards(id) ON DELETE CASCADE,
    player_id TEXT NOT NULL,
    score BIGINT NOT NULL,
    metadata JSONB,
    updated_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (leaderboard_id, player_id)
)
"#;

const CREATE_PLAYER_SCORES_RANK_IDX: &str =
    "CREATE INDEX IF NOT EXISTS player_scores_rank_idx ON player_scores (leaderboard_id, score DESC)";

const CREATE_SCORE_EVENTS: &str = r#"
CREATE TABLE IF NOT EXISTS score_events (
    id BIGSERIAL PRIMARY KEY,
    leaderboard_id TEXT NOT NULL,
    player_id TEXT NOT NULL,
    score BIGINT NOT NULL,
    event_type TEXT NOT NULL,
    game_id TEXT,
    metadata JSONB,
    created_at TIMESTAMPTZ NOT NULL
)
"#;

const CREATE_SCORE_EVENTS_IDX: &str =
    "CREATE INDEX IF NOT EXISTS score_events_player_idx ON score_events (player_id, created_at DESC)";

/// Idempotent create-if-not-exists migration, run once on startup (§6
/// "Persisted state"). Not a general migration framework with a named-step
/// ledger — unnecessary since the schema never changes shape at runtime.
pub async fn run_startup_migrations(pool: &Pool) -> ColdStoreResult<()> {
    let client = pool.get().await.map_err(|e| ColdStoreError::Transport(e.to_string()))?;
    for statement in [
        CREATE_LEADERBOARDS,
        CREATE_PLAYER_SCORES,
        CREATE_PLAYER_SCORES_RANK_IDX,
        CREATE_SCORE_EVENTS,
        CREATE_SCORE_EVENTS_IDX,
    ] {
        client
            .batch_execute(statement)
            .await
            .map_err(|e| ColdStoreError::Transport(e.to_string()))?;
    }
    info!("Cold store schema verified/created");
    Ok(())
}
