use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Whether a higher or lower score is "better" for a given leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn higher_is_better(&self) -> bool {
        matches!(self, SortOrder::Descending)
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Descending
    }
}

/// The rule applied when a player submits a new score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateMode {
    Replace,
    Increment,
    Best,
}

impl Default for UpdateMode {
    fn default() -> Self {
        UpdateMode::Replace
    }
}

/// Recorded only; scheduled resets are not implemented by the core (§1 Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResetPeriod {
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Default for ResetPeriod {
    fn default() -> Self {
        ResetPeriod::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScoreEventType {
    Submit,
    Increment,
    Reset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardConfig {
    pub id: String,
    pub name: String,
    pub sort_order: SortOrder,
    pub update_mode: UpdateMode,
    pub max_entries: u32,
    pub reset_period: ResetPeriod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_MAX_ENTRIES: u32 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerScore {
    pub leaderboard_id: String,
    pub player_id: String,
    pub score: i64,
    pub metadata: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvent {
    pub leaderboard_id: String,
    pub player_id: String,
    pub score: i64,
    pub event_type: ScoreEventType,
    pub game_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// A dense-ranked entry as returned by `HotIndex`/`ColdStore` queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub rank: u64,
    pub player_id: String,
    pub score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardStats {
    pub total_players: u64,
    pub top_score: Option<i64>,
    pub lowest_score: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSubmission {
    pub leaderboard_id: String,
    pub player_id: String,
    pub score: i64,
    pub game_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeaderboardRequest {
    pub id: String,
    pub name: String,
    pub sort_order: Option<SortOrder>,
    pub update_mode: Option<UpdateMode>,
    pub max_entries: Option<u32>,
    pub reset_period: Option<ResetPeriod>,
}
