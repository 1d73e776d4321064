//! Downstream sinks a relay forwards into

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{tungstenite::protocol::Message, WebSocketStream};
use tracing::debug;

use crate::common::errors::{ClientError, Result};

/// The client side of a relay
#[async_trait]
pub trait Downstream: Send {
    fn is_connected(&self) -> bool;

    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the downstream. Calling it twice is harmless.
    async fn close(&mut self) -> Result<()>;

    /// Fires `true` when the client goes away without a message to forward
    fn close_signal(&self) -> Option<watch::Receiver<bool>> {
        None
    }
}

/// Forwards into an mpsc channel; disconnected once the receiver is dropped
#[derive(Debug)]
pub struct ChannelDownstream {
    sender: Option<mpsc::Sender<String>>,
}

impl ChannelDownstream {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self {
            sender: Some(sender),
        }
    }
}

#[async_trait]
impl Downstream for ChannelDownstream {
    fn is_connected(&self) -> bool {
        self.sender.as_ref().is_some_and(|s| !s.is_closed())
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ClientError::ChannelSend("downstream closed".to_string()))?;
        sender
            .send(text)
            .await
            .map_err(|e| ClientError::ChannelSend(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.sender = None;
        Ok(())
    }

    fn close_signal(&self) -> Option<watch::Receiver<bool>> {
        let sender = self.sender.clone()?;
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::select! {
                _ = sender.closed() => {
                    let _ = tx.send(true);
                }
                // relay finished first; release our sender clone
                _ = tx.closed() => {}
            }
        });
        Some(rx)
    }
}

/// Forwards into a client WebSocket.
///
/// Construction spawns a task that watches the client half for a close frame,
/// so it must happen inside a tokio runtime.
pub struct WebSocketDownstream<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    connected: Arc<AtomicBool>,
    closed_rx: watch::Receiver<bool>,
    watcher: JoinHandle<()>,
    closed: bool,
}

impl<S> WebSocketDownstream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(socket: WebSocketStream<S>) -> Self {
        let (sink, mut stream) = socket.split();
        let connected = Arc::new(AtomicBool::new(true));
        let (closed_tx, closed_rx) = watch::channel(false);

        let flag = connected.clone();
        let watcher = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(other) => debug!("Ignoring client frame: {:?}", other),
                }
            }
            flag.store(false, Ordering::SeqCst);
            let _ = closed_tx.send(true);
        });

        Self {
            sink,
            connected,
            closed_rx,
            watcher,
            closed: false,
        }
    }
}

#[async_trait]
impl<S> Downstream for WebSocketDownstream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn is_connected(&self) -> bool {
        !self.closed && self.connected.load(Ordering::SeqCst)
    }

    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.watcher.abort();
        self.connected.store(false, Ordering::SeqCst);
        if let Err(e) = self.sink.close().await {
            debug!("Client socket already closed: {}", e);
        }
        Ok(())
    }

    fn close_signal(&self) -> Option<watch::Receiver<bool>> {
        Some(self.closed_rx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_downstream_forwards_until_closed() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut downstream = ChannelDownstream::new(tx);

        assert!(downstream.is_connected());
        downstream.send_text("hello".to_string()).await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));

        downstream.close().await.unwrap();
        downstream.close().await.unwrap();
        assert!(!downstream.is_connected());
        assert!(downstream.send_text("late".to_string()).await.is_err());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_channel_downstream_signals_receiver_drop() {
        let (tx, rx) = mpsc::channel::<String>(4);
        let downstream = ChannelDownstream::new(tx);
        let mut signal = downstream.close_signal().unwrap();

        drop(rx);
        signal.changed().await.unwrap();
        assert!(*signal.borrow());
        assert!(!downstream.is_connected());
    }
}
