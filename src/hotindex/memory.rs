use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::RankEntry;
use crate::hotindex::{HotIndex, HotIndexResult};

/// In-memory `HotIndex` used by engine/reconcile tests. Not meant to satisfy
/// the O(log N) algorithmic requirements (§4.1) — it exists purely to
/// exercise update-mode/rank semantics without a live Redis.
#[derive(Default)]
pub struct InMemoryHotIndex {
    boards: Mutex<HashMap<String, BTreeMap<String, i64>>>,
}

impl InMemoryHotIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn ordered(board: &BTreeMap<String, i64>, higher_is_better: bool) -> Vec<(String, i64)> {
        let mut entries: Vec<(String, i64)> = board.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| {
            let score_cmp = if higher_is_better { b.1.cmp(&a.1) } else { a.1.cmp(&b.1) };
            score_cmp.then_with(|| a.0.cmp(&b.0))
        });
        entries
    }
}

#[async_trait]
impl HotIndex for InMemoryHotIndex {
    async fn set(&self, lb: &str, player: &str, score: i64) -> HotIndexResult<()> {
        let mut boards = self.boards.lock().unwrap();
        boards.entry(lb.to_string()).or_default().insert(player.to_string(), score);
        Ok(())
    }

    async fn incr(&self, lb: &str, player: &str, delta: i64) -> HotIndexResult<i64> {
        let mut boards = self.boards.lock().unwrap();
        let board = boards.entry(lb.to_string()).or_default();
        let entry = board.entry(player.to_string()).or_insert(0);
        *entry += delta;
        Ok(*entry)
    }

    async fn set_if_better(
        &self,
        lb: &str,
        player: &str,
        score: i64,
        higher_is_better: bool,
    ) -> HotIndexResult<bool> {
        let mut boards = self.boards.lock().unwrap();
        let board = boards.entry(lb.to_string()).or_default();
        let wrote = match board.get(player) {
            None => true,
            Some(&current) => {
                if higher_is_better {
                    score > current
                } else {
                    score < current
                }
            }
        };
        if wrote {
            board.insert(player.to_string(), score);
        }
        Ok(wrote)
    }

    async fn remove(&self, lb: &str, player: &str) -> HotIndexResult<()> {
        let mut boards = self.boards.lock().unwrap();
        if let Some(board) = boards.get_mut(lb) {
            board.remove(player);
        }
        Ok(())
    }

    async fn top_n(&self, lb: &str, n: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>> {
        self.range(lb, 0, n.saturating_sub(1), higher_is_better).await
    }

    async fn bottom_n(&self, lb: &str, n: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>> {
        let count = self.count(lb).await?;
        let start = count.saturating_sub(n);
        self.range(lb, start, count.saturating_sub(1), higher_is_better).await
    }

    async fn rank_of(&self, lb: &str, player: &str, higher_is_better: bool) -> HotIndexResult<Option<RankEntry>> {
        let boards = self.boards.lock().unwrap();
        let board = match boards.get(lb) {
            Some(b) => b,
            None => return Ok(None),
        };
        let ordered = Self::ordered(board, higher_is_better);
        Ok(ordered
            .iter()
            .position(|(p, _)| p == player)
            .map(|idx| RankEntry { rank: idx as u64 + 1, player_id: player.to_string(), score: ordered[idx].1 }))
    }

    async fn around(&self, lb: &str, player: &str, r: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>> {
        let found = self.rank_of(lb, player, higher_is_better).await?;
        let center_rank = match found {
            Some(e) => e.rank,
            None => return Ok(Vec::new()),
        };
        let center_idx = center_rank - 1;
        let start = center_idx.saturating_sub(r);
        let end = center_idx + r;
        self.range(lb, start, end, higher_is_better).await
    }

    async fn range(&self, lb: &str, start: u64, end: u64, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>> {
        let boards = self.boards.lock().unwrap();
        let board = match boards.get(lb) {
            Some(b) => b,
            None => return Ok(Vec::new()),
        };
        let ordered = Self::ordered(board, higher_is_better);
        let start = start as usize;
        let end = (end as usize).min(ordered.len().saturating_sub(1));
        if ordered.is_empty() || start >= ordered.len() || start > end {
            return Ok(Vec::new());
        }
        Ok(ordered[start..=end]
            .iter()
            .enumerate()
            .map(|(i, (p, s))| RankEntry { rank: (start + i) as u64 + 1, player_id: p.clone(), score: *s })
            .collect())
    }

    async fn count(&self, lb: &str) -> HotIndexResult<u64> {
        let boards = self.boards.lock().unwrap();
        Ok(boards.get(lb).map(|b| b.len() as u64).unwrap_or(0))
    }

    async fn all(&self, lb: &str, higher_is_better: bool) -> HotIndexResult<Vec<RankEntry>> {
        let count = self.count(lb).await?;
        self.range(lb, 0, count.saturating_sub(1), higher_is_better).await
    }

    async fn drop_leaderboard(&self, lb: &str) -> HotIndexResult<()> {
        let mut boards = self.boards.lock().unwrap();
        boards.remove(lb);
        Ok(())
    }

    async fn batch_set(&self, lb: &str, scores: &HashMap<String, i64>) -> HotIndexResult<()> {
        let mut boards = self.boards.lock().unwrap();
        let board = boards.entry(lb.to_string()).or_default();
        for (player, score) in scores {
            board.insert(player.clone(), *score);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_if_better_respects_direction() {
        let idx = InMemoryHotIndex::new();
        assert!(idx.set_if_better("lb", "p1", 100, true).await.unwrap());
        assert!(!idx.set_if_better("lb", "p1", 50, true).await.unwrap());
        assert!(idx.set_if_better("lb", "p1", 150, true).await.unwrap());
        let rank = idx.rank_of("lb", "p1", true).await.unwrap().unwrap();
        assert_eq!(rank.score, 150);
    }

    #[tokio::test]
    async fn top_n_ranks_are_dense_and_consecutive() {
        let idx = InMemoryHotIndex::new();
        idx.set("lb", "a", 10).await.unwrap();
        idx.set("lb", "b", 30).await.unwrap();
        idx.set("lb", "c", 20).await.unwrap();
        let top = idx.top_n("lb", 10, true).await.unwrap();
        let ranks: Vec<u64> = top.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(top[0].player_id, "b");
        assert_eq!(top[1].player_id, "c");
        assert_eq!(top[2].player_id, "a");
    }

    #[tokio::test]
    async fn bottom_n_assigns_ranks_from_the_worst_end() {
        let idx = InMemoryHotIndex::new();
        for (p, s) in [("a", 10), ("b", 30), ("c", 20), ("d", 40)] {
            idx.set("lb", p, s).await.unwrap();
        }
        let bottom = idx.bottom_n("lb", 2, true).await.unwrap();
        assert_eq!(bottom.len(), 2);
        assert_eq!(bottom[0].player_id, "c");
        assert_eq!(bottom[0].rank, 3);
        assert_eq!(bottom[1].player_id, "a");
        assert_eq!(bottom[1].rank, 4);
    }
}
