use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use crate::config::ServerConfig;
use crate::subscription::SubscriptionHub;

const MAX_INBOUND_MESSAGE_BYTES: usize = 4096;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundMessage {
    Subscribe { leaderboard_id: String },
    Unsubscribe { leaderboard_id: String },
    Ping,
}

/// Independent accept loop for the push channel. Rocket 0.5 has no native
/// WebSocket upgrade, so this runs alongside the HTTP server as its own
/// listener rather than as a mounted route. `server_config` carries the same
/// timeout knobs the HTTP server is configured with, since Rocket itself has
/// no read/write-timeout surface to reuse here.
pub async fn run(hub: Arc<SubscriptionHub>, addr: SocketAddr, server_config: ServerConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Subscription websocket listening on {}", addr);
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!("websocket accept error: {}", e);
                continue;
            }
        };
        let hub = hub.clone();
        let server_config = server_config.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(hub, stream, peer, server_config).await {
                debug!("websocket connection {} closed: {}", peer, e);
            }
        });
    }
}

async fn handle_connection(
    hub: Arc<SubscriptionHub>,
    stream: TcpStream,
    peer: SocketAddr,
    server_config: ServerConfig,
) -> anyhow::Result<()> {
    let handshake_deadline = Duration::from_secs(server_config.read_timeout.max(1));
    let write_deadline = Duration::from_secs(server_config.write_timeout.max(1));
    let keepalive_interval = Duration::from_secs(server_config.idle_timeout.max(2) / 2);
    let keepalive_timeout = Duration::from_secs(server_config.idle_timeout.max(1));

    let ws = timeout(handshake_deadline, tokio_tungstenite::accept_async(stream)).await??;
    let (mut outbound, mut inbound) = ws.split();
    let (id, mut rx) = hub.register();
    debug!("websocket subscriber {} connected from {}", id, peer);

    let mut keepalive = tokio::time::interval(keepalive_interval);
    let mut last_seen = tokio::time::Instant::now();

    loop {
        tokio::select! {
            pushed = rx.recv() => {
                let message = match pushed {
                    Some(m) => m,
                    None => break,
                };
                let text = serde_json::to_string(&message)?;
                if timeout(write_deadline, outbound.send(Message::Text(text))).await.is_err() {
                    warn!("websocket subscriber {} write deadline exceeded, dropping connection", id);
                    break;
                }
            }
            frame = inbound.next() => {
                let frame = match frame {
                    Some(Ok(f)) => f,
                    _ => break,
                };
                last_seen = tokio::time::Instant::now();
                match frame {
                    Message::Text(text) => {
                        if text.len() > MAX_INBOUND_MESSAGE_BYTES {
                            hub.send_error(id, "message too large");
                            continue;
                        }
                        handle_inbound(&hub, id, &text);
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            _ = keepalive.tick() => {
                if last_seen.elapsed() > keepalive_timeout {
                    info!("websocket subscriber {} timed out", id);
                    break;
                }
                if timeout(write_deadline, outbound.send(Message::Ping(Vec::new()))).await.is_err() {
                    break;
                }
            }
        }
    }

    hub.unregister(id);
    Ok(())
}

fn handle_inbound(hub: &SubscriptionHub, id: uuid::Uuid, text: &str) {
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(InboundMessage::Subscribe { leaderboard_id }) => {
            if leaderboard_id.trim().is_empty() {
                hub.send_error(id, "leaderboard_id must not be empty");
                return;
            }
            hub.subscribe(id, &leaderboard_id);
            hub.send_subscribed(id, &leaderboard_id);
        }
        Ok(InboundMessage::Unsubscribe { leaderboard_id }) => {
            if leaderboard_id.trim().is_empty() {
                hub.send_error(id, "leaderboard_id must not be empty");
                return;
            }
            hub.unsubscribe(id, &leaderboard_id);
            hub.send_unsubscribed(id, &leaderboard_id);
        }
        Ok(InboundMessage::Ping) => hub.send_pong(id),
        Err(e) => hub.send_error(id, format!("invalid message: {}", e)),
    }
}
