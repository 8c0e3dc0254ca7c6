//! Realtime change-notification feed over WebSocket.
//!
//! A managed connection to the platform's change channel: connect, subscribe
//! to the watched table, forward parsed change events, reconnect with capped
//! backoff when the socket drops. Unparseable frames are logged and dropped.

use std::sync::Arc;

use campusnet_shared::{RealtimeCommand, RealtimeEvent};
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Connection lifecycle as observed by subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting {
        attempt: u32,
    },
    Failed {
        reason: String,
    },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Reconnect policy for the change feed.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// 0 means retry forever.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectConfig {
    /// Exponential backoff capped at `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let factor = 1u64 << attempt.min(16);
        self.base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms)
    }
}

/// A managed WebSocket subscription to the platform's change channel.
pub struct ChangeFeed {
    state: watch::Receiver<ConnectionState>,
    commands: UnboundedSender<RealtimeCommand>,
}

impl ChangeFeed {
    /// Connect to `url`, subscribe to `table`, and forward change events
    /// into `events`. The connection loop runs until the feed is dropped
    /// and the event receiver closes.
    pub fn spawn(url: String, table: String, events: mpsc::Sender<RealtimeEvent>) -> Self {
        let (commands_tx, commands_rx) = unbounded();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        start_connection_loop(
            url,
            table,
            state_tx,
            commands_rx,
            events,
            ReconnectConfig::default(),
        );
        Self {
            state: state_rx,
            commands: commands_tx,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch additional tables on the same connection.
    pub fn subscribe_table(&self, table: impl Into<String>) {
        let _ = self
            .commands
            .unbounded_send(RealtimeCommand::Subscribe { table: table.into() });
    }

    pub fn unsubscribe_table(&self, table: impl Into<String>) {
        let _ = self
            .commands
            .unbounded_send(RealtimeCommand::Unsubscribe { table: table.into() });
    }
}

/// Start the connection management loop in a background task.
fn start_connection_loop(
    url: String,
    table: String,
    state: watch::Sender<ConnectionState>,
    commands: UnboundedReceiver<RealtimeCommand>,
    events: mpsc::Sender<RealtimeEvent>,
    reconnect_config: ReconnectConfig,
) {
    tokio::spawn(async move {
        // share the command receiver across reconnect attempts
        let commands = Arc::new(tokio::sync::Mutex::new(commands));
        let mut attempt = 0u32;

        loop {
            if events.is_closed() {
                break;
            }

            if attempt == 0 {
                let _ = state.send(ConnectionState::Connecting);
            } else {
                let _ = state.send(ConnectionState::Reconnecting { attempt });
            }

            match connect_async(&url).await {
                Ok((ws_stream, _response)) => {
                    let _ = state.send(ConnectionState::Connected);
                    attempt = 0;
                    tracing::info!("change feed connected to {url}");

                    let (mut write, mut read) = ws_stream.split();

                    // subscribe to the watched table on every (re)connect
                    let subscribe = RealtimeCommand::Subscribe {
                        table: table.clone(),
                    };
                    if let Ok(json) = serde_json::to_string(&subscribe) {
                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            tracing::error!("subscribe failed: {e}");
                        }
                    }

                    let (close_tx, mut close_rx) = tokio::sync::mpsc::unbounded_channel::<()>();

                    // read task: parse and forward change events
                    let events_for_read = events.clone();
                    let close_tx_for_read = close_tx.clone();
                    tokio::spawn(async move {
                        while let Some(msg_result) = read.next().await {
                            match msg_result {
                                Ok(Message::Text(text)) => {
                                    match serde_json::from_str::<RealtimeEvent>(&text) {
                                        Ok(event) => {
                                            if events_for_read.send(event).await.is_err() {
                                                break;
                                            }
                                        }
                                        Err(e) => {
                                            tracing::error!("failed to parse change event: {e}")
                                        }
                                    }
                                }
                                Ok(Message::Close(_)) => break,
                                Ok(_) => {
                                    // ping/pong handled by tungstenite; ignore binary
                                }
                                Err(e) => {
                                    tracing::error!("change feed read error: {e}");
                                    break;
                                }
                            }
                        }
                        let _ = close_tx_for_read.send(());
                    });

                    // write task: forward subscribe/unsubscribe commands
                    let commands_for_write = commands.clone();
                    tokio::spawn(async move {
                        loop {
                            let cmd = {
                                let mut rx = commands_for_write.lock().await;
                                rx.next().await
                            };
                            match cmd {
                                Some(cmd) => match serde_json::to_string(&cmd) {
                                    Ok(json) => {
                                        if let Err(e) = write.send(Message::Text(json.into())).await
                                        {
                                            tracing::error!("command send failed: {e}");
                                            break;
                                        }
                                    }
                                    Err(e) => tracing::error!("command serialize failed: {e}"),
                                },
                                None => break, // feed dropped
                            }
                        }
                        let _ = close_tx.send(());
                    });

                    close_rx.recv().await;
                    tracing::info!("change feed to {url} closed");
                    let _ = state.send(ConnectionState::Disconnected);
                }
                Err(e) => {
                    tracing::error!("change feed connect error for {url}: {e}");

                    if reconnect_config.max_attempts > 0 && attempt >= reconnect_config.max_attempts
                    {
                        let _ = state.send(ConnectionState::Failed {
                            reason: format!(
                                "max reconnect attempts ({}) exceeded",
                                reconnect_config.max_attempts
                            ),
                        });
                        break;
                    }

                    let delay = reconnect_config.delay_for_attempt(attempt);
                    tracing::info!("reconnecting to {url} in {delay}ms (attempt {})", attempt + 1);
                    tokio::time::sleep(tokio::time::Duration::from_millis(delay)).await;
                    attempt += 1;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(0), 1000);
        assert_eq!(config.delay_for_attempt(1), 2000);
        assert_eq!(config.delay_for_attempt(3), 8000);
        assert_eq!(config.delay_for_attempt(10), 30_000);
    }
}
