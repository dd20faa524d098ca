pub mod ws;

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::RankEntry;

/// Outbound subscriber queue capacity (§4.5). Once full, new pushes are
/// dropped rather than blocking the broadcaster or disconnecting the
/// subscriber.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Subscribed { leaderboard_id: String, timestamp: u64 },
    Unsubscribed { leaderboard_id: String, timestamp: u64 },
    LeaderboardUpdate { leaderboard_id: String, top: Vec<RankEntry>, timestamp: u64 },
    PlayerUpdate { leaderboard_id: String, player_id: String, score: i64, timestamp: u64 },
    Pong { timestamp: u64 },
    Error { message: String, timestamp: u64 },
}

struct Subscriber {
    tx: mpsc::Sender<OutboundMessage>,
}

/// Tracks subscriber interest per leaderboard and fans out updates (§4.5).
/// A single `RwLock` guards the routing tables; pushes themselves go
/// through each subscriber's own bounded channel so one slow reader never
/// blocks the broadcast path.
#[derive(Default)]
pub struct SubscriptionHub {
    subscribers: RwLock<HashMap<Uuid, Subscriber>>,
    by_leaderboard: RwLock<HashMap<String, HashSet<Uuid>>>,
    all_subscribers: RwLock<HashSet<Uuid>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> (Uuid, mpsc::Receiver<OutboundMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        self.subscribers.write().unwrap().insert(id, Subscriber { tx });
        (id, rx)
    }

    pub fn unregister(&self, id: Uuid) {
        self.subscribers.write().unwrap().remove(&id);
        self.all_subscribers.write().unwrap().remove(&id);
        let mut by_lb = self.by_leaderboard.write().unwrap();
        for set in by_lb.values_mut() {
            set.remove(&id);
        }
    }

    pub fn subscribe(&self, id: Uuid, leaderboard_id: &str) {
        self.by_leaderboard
            .write()
            .unwrap()
            .entry(leaderboard_id.to_string())
            .or_default()
            .insert(id);
    }

    pub fn subscribe_all(&self, id: Uuid) {
        self.all_subscribers.write().unwrap().insert(id);
    }

    pub fn unsubscribe(&self, id: Uuid, leaderboard_id: &str) {
        if let Some(set) = self.by_leaderboard.write().unwrap().get_mut(leaderboard_id) {
            set.remove(&id);
        }
    }

    /// Non-blocking best-effort push. A full queue silently drops the
    /// message rather than stalling or disconnecting the subscriber.
    fn push(&self, id: &Uuid, message: OutboundMessage) {
        let subscribers = self.subscribers.read().unwrap();
        if let Some(subscriber) = subscribers.get(id) {
            if subscriber.tx.try_send(message).is_err() {
                warn!("subscriber {} outbound queue full, dropping update", id);
            }
        }
    }

    pub async fn broadcast_leaderboard_update(&self, leaderboard_id: &str, top: &[RankEntry]) {
        let targets: Vec<Uuid> = {
            let by_lb = self.by_leaderboard.read().unwrap();
            let all = self.all_subscribers.read().unwrap();
            by_lb
                .get(leaderboard_id)
                .into_iter()
                .flatten()
                .chain(all.iter())
                .copied()
                .collect()
        };
        if targets.is_empty() {
            return;
        }
        let message = OutboundMessage::LeaderboardUpdate {
            leaderboard_id: leaderboard_id.to_string(),
            top: top.to_vec(),
            timestamp: crate::util::time::get_u64_time_millis(),
        };
        for id in targets {
            self.push(&id, message.clone());
        }
    }

    pub async fn broadcast_player_update(&self, leaderboard_id: &str, player_id: &str, score: i64) {
        let targets: Vec<Uuid> = {
            let by_lb = self.by_leaderboard.read().unwrap();
            let all = self.all_subscribers.read().unwrap();
            by_lb
                .get(leaderboard_id)
                .into_iter()
                .flatten()
                .chain(all.iter())
                .copied()
                .collect()
        };
        if targets.is_empty() {
            return;
        }
        let message = OutboundMessage::PlayerUpdate {
            leaderboard_id: leaderboard_id.to_string(),
            player_id: player_id.to_string(),
            score,
            timestamp: crate::util::time::get_u64_time_millis(),
        };
        for id in targets {
            self.push(&id, message.clone());
        }
    }

    pub fn send_subscribed(&self, id: Uuid, leaderboard_id: &str) {
        self.push(&id, OutboundMessage::Subscribed { leaderboard_id: leaderboard_id.to_string(), timestamp: crate::util::time::get_u64_time_millis() });
    }

    pub fn send_unsubscribed(&self, id: Uuid, leaderboard_id: &str) {
        self.push(&id, OutboundMessage::Unsubscribed { leaderboard_id: leaderboard_id.to_string(), timestamp: crate::util::time::get_u64_time_millis() });
    }

    pub fn send_pong(&self, id: Uuid) {
        self.push(&id, OutboundMessage::Pong { timestamp: crate::util::time::get_u64_time_millis() });
    }

    pub fn send_error(&self, id: Uuid, message: impl Into<String>) {
        self.push(&id, OutboundMessage::Error { message: message.into(), timestamp: crate::util::time::get_u64_time_millis() });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap().len()
    }

    /// Drops every subscriber's outbound sender, closing their channels so
    /// each connection's receive loop observes `None` and exits on its own.
    /// Called during shutdown; no further registrations are expected after.
    pub fn close_all(&self) {
        self.subscribers.write().unwrap().clear();
        self.by_leaderboard.write().unwrap().clear();
        self.all_subscribers.write().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_subscribed_but_not_unrelated_leaderboard() {
        let hub = SubscriptionHub::new();
        let (id, mut rx) = hub.register();
        hub.subscribe(id, "lb1");

        hub.broadcast_leaderboard_update("lb2", &[]).await;
        assert!(rx.try_recv().is_err());

        hub.broadcast_leaderboard_update("lb1", &[RankEntry { rank: 1, player_id: "p1".into(), score: 10 }]).await;
        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, OutboundMessage::LeaderboardUpdate { .. }));
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let hub = SubscriptionHub::new();
        let (id, _rx) = hub.register();
        hub.subscribe(id, "lb1");
        for _ in 0..(SUBSCRIBER_QUEUE_CAPACITY + 10) {
            hub.broadcast_leaderboard_update("lb1", &[]).await;
        }
        // Must not hang or panic; excess pushes are silently dropped.
    }

    #[tokio::test]
    async fn unregister_stops_further_delivery() {
        let hub = SubscriptionHub::new();
        let (id, mut rx) = hub.register();
        hub.subscribe(id, "lb1");
        hub.unregister(id);
        hub.broadcast_leaderboard_update("lb1", &[]).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn close_all_closes_every_subscriber_channel() {
        let hub = SubscriptionHub::new();
        let (_id1, mut rx1) = hub.register();
        let (_id2, mut rx2) = hub.register();
        hub.close_all();
        assert!(rx1.recv().await.is_none());
        assert!(rx2.recv().await.is_none());
        assert_eq!(hub.subscriber_count(), 0);
    }
}
