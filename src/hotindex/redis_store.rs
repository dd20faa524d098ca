use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;
use mobc::{Connection as PooledConnection, Manager, Pool};
use redis::aio::Connection;
use redis::{Client, RedisError};

use crate::config::HotIndexConfig;
use crate::domain::RankEntry;
use crate::hotindex::{HotIndex, HotIndexError, HotIndexResult};

pub struct RedisConnectionManager {
    client: Client,
}

#[async_trait]
impl Manager for RedisConnectionManager {
    type Connection = Connection;
    type Error = RedisError;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        self.client.get_async_connection().await
    }

    async fn check(&self, mut conn: Self::Connection) -> Result<Self::Connection, Self::Error> {
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(conn)
    }
}

/// Pooled Redis client backing every sorted-set operation against the hot
/// index.
pub struct RedisAdapter {
    pool: Pool<RedisConnectionManager>,
}

impl RedisAdapter {
    pub fn new(config: &HotIndexConfig) -> HotIndexResult<Self> {
        let url = build_redis_url(config);
        let client = Client::open(url).map_err(|e| HotIndexError::Transport(e.to_string()))?;
        let pool = Pool::builder()
            .max_open(config.pool_size)
            .min_idle(Some(config.min_idle_conns))
            .build(RedisConnectionManager { client });
        Ok(RedisAdapter { pool })
    }

    pub async fn submit<F, Fut, T>(&self, f: F) -> HotIndexResult<T>
    where
        F: FnOnce(PooledConnection<RedisConnectionManager>) -> Fut,
        Fut: Future<Output = redis::RedisResult<T>>,
    {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| HotIndexError::Transport(e.to_string()))?;
        f(conn).await.map_err(|e| HotIndexError::Transport(e.to_string()))
    }
}

fn build_redis_url(config: &HotIndexConfig) -> String {
    let addr = config.addr.trim_start_matches("redis://");
    match &config.password {
        Some(password) if !password.is_empty() => {
            format!("redis://:{}@{}/{}", password, addr, config.db)
        }
        _ => format!("redis://{}/{}", addr, config.db),
    }
}

fn leaderboard_key(lb: &str) -> String {
    format!("hot:{}", lb)
}

const SET_IF_BETTER_SCRIPT: &str = r#"
local current = redis.call('ZSCORE', KEYS[1], ARGV[1])
if current == false then
    redis.call('ZADD', KEYS[1], ARGV[2], ARGV[1])
    return 1
end
local cur = tonumber(current)
local new = tonumber(ARGV[2])
local higher_is_better = ARGV[3] == '1'
local better = false
if higher_is_better then
    better = new > cur
else
    better = new < cur
end
if better then
    redis.call('ZADD', KEYS[1], ARGV[2], ARGV[1])
    return 1
end
return 0
"#;

/// Converts a WITHSCORES flat string vec `[member, score, member, score...]`
/// into `RankEntry`s, ranks starting at `first_rank`.
fn entries_from_withscores(raw: Vec<String>, first_rank: u64) -> Vec<RankEntry> {
    let mut out = Vec::with_capacity(raw.len() / 2);
    let mut rank = first_rank;
    let mut iter = raw.into_iter();
    while let (Some(member), Some(score_str)) = (iter.next(), iter.next()) {
        let score: i64 = score_str.parse().unwrap_or(0);
        out.push(RankEntry { rank, player_id: member, score });
        rank += 1;
    }
    out
}

#[async_trait]
impl HotIndex for RedisAdapter {
    async fn set(&self, lb: &str, player: &str, score: i64) -> HotIndexResult<()> {
        let key = leaderboard_key(lb);
        let player = player.to_owned();
        self.submit(|mut conn| async move {
            redis::cmd("ZADD").arg(&key).arg(score).arg(&player).query_async(&mut conn).await
        })
        .await
    }

    async fn incr(&self, lb: &str, player: &str, delta: i64) -> HotIndexResult<i64> {
        let key = leaderboard_key(lb);
        let player = player.to_owned();
        self.submit(|mut conn| async move {
            redis::cmd("ZINCRBY")
                .arg(&key)
                .arg(delta)
                .arg(&player)
                .query_async::<_, f64>(&mut conn)
                .await
                .map(|v| v as i64)
        })
        .await
    }

    async fn set_if_better(
        &self,
        lb: &str,
        player: &str,
        score: i64,
        higher_is_better: bool,
    ) -> HotIndexResult<bool> {
        let key = leaderboard_key(lb);
        let player = player.to_owned();
        self.submit(|mut conn| async move {
            let script = redis::Script::new(SET_IF_BETTER_SCRIPT);
            script
                .key(&key)
                .arg(&player)
                .arg(score)
                .arg(if higher_is_better { "1" } else { "0" })
                .invoke_async::<_, i64>(&mut conn)
                .await
                .map(|wrote| wrote == 1)
        })
        .await
    }

    async fn remove(&self, lb: &str, player: &str) -> HotIndexResult<()> {
        let key = leaderboard_key(lb);
        let player = player.to_owned();
        self.submit(|mut conn| async move {
            redis::cmd("ZREM").arg(&key).arg(&player).query_async(&mut conn).await
        })
        .await
    }

    async fn top_n(&self, lb: &str, n: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>> {
        self.range(lb, 0, n.saturating_sub(1), higher_is_better).await
    }

    async fn bottom_n(&self, lb: &str, n: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>> {
        let count = self.count(lb).await?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let start = count.saturating_sub(n);
        self.range(lb, start, count - 1, higher_is_better).await
    }

    async fn rank_of(&self, lb: &str, player: &str, higher_is_better: bool) -> HotIndexResult<Option<RankEntry>> {
        let key = leaderboard_key(lb);
        let player_owned = player.to_owned();
        let rank_cmd = if higher_is_better { "ZREVRANK" } else { "ZRANK" };
        self.submit(|mut conn| async move {
            let score: Option<f64> = redis::cmd("ZSCORE")
                .arg(&key)
                .arg(&player_owned)
                .query_async(&mut conn)
                .await?;
            let score = match score {
                Some(s) => s,
                None => return Ok(None),
            };
            let rank: Option<u64> = redis::cmd(rank_cmd)
                .arg(&key)
                .arg(&player_owned)
                .query_async(&mut conn)
                .await?;
            Ok(rank.map(|r| RankEntry { rank: r + 1, player_id: player_owned, score: score as i64 }))
        })
        .await
    }

    async fn around(&self, lb: &str, player: &str, r: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>> {
        let found = self.rank_of(lb, player, higher_is_better).await?;
        let center_rank = match found {
            Some(entry) => entry.rank,
            None => return Ok(Vec::new()),
        };
        let center_idx = center_rank - 1;
        let start = center_idx.saturating_sub(r);
        let end = center_idx + r;
        self.range(lb, start, end, higher_is_better).await
    }

    async fn range(&self, lb: &str, start: u64, end: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>> {
        let key = leaderboard_key(lb);
        let range_cmd = if higher_is_better { "ZREVRANGE" } else { "ZRANGE" };
        self.submit(|mut conn| async move {
            let raw: Vec<String> = redis::cmd(range_cmd)
                .arg(&key)
                .arg(start)
                .arg(end)
                .arg("WITHSCORES")
                .query_async(&mut conn)
                .await?;
            Ok(entries_from_withscores(raw, start + 1))
        })
        .await
    }

    async fn count(&self, lb: &str) -> HotIndexResult<u64> {
        let key = leaderboard_key(lb);
        self.submit(|mut conn| async move {
            redis::cmd("ZCARD").arg(&key).query_async::<_, u64>(&mut conn).await
        })
        .await
    }

    async fn all(&self, lb: &str, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>> {
        let key = leaderboard_key(lb);
        let range_cmd = if higher_is_better { "ZREVRANGE" } else { "ZRANGE" };
        self.submit(|mut conn| async move {
            let raw: Vec<String> = redis::cmd(range_cmd)
                .arg(&key)
                .arg(0)
                .arg(-1)
                .arg("WITHSCORES")
                .query_async(&mut conn)
                .await?;
            Ok(entries_from_withscores(raw, 1))
        })
        .await
    }

    async fn drop_leaderboard(&self, lb: &str) -> HotIndexResult<()> {
        let key = leaderboard_key(lb);
        self.submit(|mut conn| async move { redis::cmd("DEL").arg(&key).query_async(&mut conn).await })
            .await
    }

    async fn batch_set(&self, lb: &str, scores: &HashMap<String, i64>) -> HotIndexResult<()> {
        let key = leaderboard_key(lb);
        let items: Vec<(i64, String)> = scores.iter().map(|(p, s)| (*s, p.clone())).collect();
        if items.is_empty() {
            return Ok(());
        }
        self.submit(|mut conn| async move {
            let mut pipe = redis::pipe();
            for (score, player) in &items {
                pipe.cmd("ZADD").arg(&key).arg(score).arg(player);
            }
            pipe.query_async(&mut conn).await
        })
        .await
    }
}
