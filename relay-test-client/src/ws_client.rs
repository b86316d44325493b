use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use log::*;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Debug, Clone)]
pub struct Event {
    pub operation: String,
    pub data: Value,
    pub raw: String,
    pub timestamp: Instant,
}

pub struct Connection {
    pub label: String,
    event_rx: mpsc::UnboundedReceiver<Event>,
    close_tx: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl Connection {
    pub async fn establish(base_url: &str, label: String) -> Result<Self> {
        let url = relay_url(base_url);
        let (socket, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Failed to open relay socket at {url}"))?;
        let (mut sink, mut stream) = socket.split();
        let (tx, rx) = mpsc::unbounded_channel();
        let (close_tx, mut close_rx) = oneshot::channel();

        let task_label = label.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut close_rx => {
                        if let Err(e) = sink.send(Message::Close(None)).await {
                            debug!("Close frame not sent for {task_label}: {e}");
                        }
                        // Drain until the server acknowledges the close.
                        while let Some(Ok(msg)) = stream.next().await {
                            if msg.is_close() {
                                break;
                            }
                        }
                        break;
                    }
                    msg = stream.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            let raw = text.as_str().to_string();
                            match serde_json::from_str::<Value>(&raw) {
                                Ok(data) => {
                                    let event = Event {
                                        operation: data["operation"].as_str().unwrap_or_default().to_string(),
                                        data,
                                        raw,
                                        timestamp: Instant::now(),
                                    };
                                    if tx.send(event).is_err() {
                                        debug!("Event receiver dropped for {task_label}");
                                        break;
                                    }
                                }
                                Err(e) => warn!("Non-JSON frame for {task_label}: {e}"),
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!("Relay closed the socket for {task_label}: {frame:?}");
                            break;
                        }
                        Some(Ok(_)) => {
                            // Ping/pong are answered by tungstenite
                        }
                        Some(Err(e)) => {
                            warn!("Relay socket error for {task_label}: {e}");
                            break;
                        }
                        None => {
                            debug!("Relay socket ended for {task_label}");
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            label,
            event_rx: rx,
            close_tx: Some(close_tx),
            handle,
        })
    }

    pub async fn wait_for_event(&mut self, operation: &str, timeout: Duration) -> Result<Event> {
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                anyhow::bail!("Timeout waiting for {} event", operation);
            }

            match tokio::time::timeout(remaining, self.event_rx.recv()).await {
                Ok(Some(event)) if event.operation == operation => return Ok(event),
                Ok(Some(_)) => continue,
                Ok(None) => anyhow::bail!("Relay connection closed"),
                Err(_) => anyhow::bail!("Timeout waiting for {} event", operation),
            }
        }
    }

    /// True while the reader task still holds the socket open.
    pub fn is_open(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Send a close frame and wait for the server to finish the handshake.
    pub async fn close(mut self) -> Result<()> {
        if let Some(close_tx) = self.close_tx.take() {
            let _ = close_tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .context("Timed out closing the relay socket")?
            .context("Relay reader task panicked")?;
        Ok(())
    }
}

fn relay_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws_base}/ws/sales")
}
