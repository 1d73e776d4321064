//! One upstream socket bridged to one downstream client

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, instrument, warn};

use super::downstream::Downstream;
use super::upstream::{
    connect_with_timeout, heartbeat, ChannelSubscription, DEFAULT_HANDSHAKE_TIMEOUT,
};
pub use super::upstream::DEFAULT_HEARTBEAT_INTERVAL;
use crate::common::errors::{ClientError, Result};

/// Why a relay stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    UpstreamClosed,
    DownstreamClosed,
    PingFailed(String),
    UpstreamError(String),
    Cancelled,
}

/// Outcome of a finished relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub reason: TerminationReason,
    /// Messages delivered downstream
    pub forwarded: u64,
    /// Whether this run's teardown aborted the keepalive task
    pub keepalive_cancelled: bool,
}

/// Bridges an exchange channel to a client.
///
/// Every terminal condition (either side closing, a failed ping, an upstream
/// error, external cancellation) funnels into one teardown that aborts the
/// keepalive task and closes both sockets.
#[derive(Debug, Clone)]
pub struct StreamRelay {
    subscription: ChannelSubscription,
    heartbeat_interval: Duration,
    handshake_timeout: Duration,
}

impl StreamRelay {
    pub fn new(subscription: ChannelSubscription) -> Self {
        Self {
            subscription,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn subscription(&self) -> &ChannelSubscription {
        &self.subscription
    }

    /// Run in the background; cancel or await through the returned handle
    pub fn spawn<D>(self, downstream: D) -> RelayHandle
    where
        D: Downstream + 'static,
    {
        let (cancel, cancelled) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            self.run(downstream, async move {
                let _ = cancelled.await;
            })
            .await
        });
        RelayHandle {
            cancel: Some(cancel),
            join,
        }
    }

    /// Relay until a terminal condition or `shutdown` resolves.
    ///
    /// Connect and login failures are returned as errors (the downstream is
    /// closed first). Terminal conditions after that are reported in the
    /// [`RelayReport`], not raised.
    #[instrument(skip(self, downstream, shutdown), fields(url = %self.subscription.url))]
    pub async fn run<D, F>(&self, mut downstream: D, shutdown: F) -> Result<RelayReport>
    where
        D: Downstream,
        F: Future<Output = ()> + Send,
    {
        let socket = match connect_with_timeout(&self.subscription, self.handshake_timeout).await {
            Ok(socket) => socket,
            Err(e) => {
                warn!("Upstream connect failed: {}", e);
                let _ = downstream.close().await;
                return Err(e);
            }
        };

        let (sink, upstream) = socket.split();
        Ok(self.pump(upstream, sink, &mut downstream, shutdown).await)
    }

    /// Relay loop over an already connected upstream, ending in one teardown
    async fn pump<U, E, S, D, F>(
        &self,
        mut upstream: U,
        sink: S,
        downstream: &mut D,
        shutdown: F,
    ) -> RelayReport
    where
        U: Stream<Item = std::result::Result<Message, E>> + Unpin,
        E: Display,
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display + Send,
        D: Downstream,
        F: Future<Output = ()> + Send,
    {
        let sink = Arc::new(Mutex::new(sink));
        let (ping_failed_tx, mut ping_failed_rx) = oneshot::channel::<String>();
        let keepalive = tokio::spawn(keepalive(sink.clone(), self.heartbeat_interval, ping_failed_tx));
        let teardown = Teardown::new(keepalive, sink);

        let mut close_signal = downstream.close_signal();
        tokio::pin!(shutdown);
        let mut forwarded: u64 = 0;

        let reason = loop {
            tokio::select! {
                _ = &mut shutdown => break TerminationReason::Cancelled,
                failure = &mut ping_failed_rx => {
                    let error = failure.unwrap_or_else(|_| "keepalive stopped".to_string());
                    break TerminationReason::PingFailed(error);
                }
                _ = wait_for_close(&mut close_signal) => break TerminationReason::DownstreamClosed,
                message = upstream.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if !forward(downstream, text).await {
                            break TerminationReason::DownstreamClosed;
                        }
                        forwarded += 1;
                    }
                    Some(Ok(Message::Binary(data))) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        if !forward(downstream, text).await {
                            break TerminationReason::DownstreamClosed;
                        }
                        forwarded += 1;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Upstream close frame: {:?}", frame);
                        break TerminationReason::UpstreamClosed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break TerminationReason::UpstreamError(e.to_string()),
                    None => break TerminationReason::UpstreamClosed,
                }
            }
        };

        let keepalive_cancelled = teardown.run(downstream).await;
        info!(
            "Relay stopped: {:?}, forwarded {} messages",
            reason, forwarded
        );

        RelayReport {
            reason,
            forwarded,
            keepalive_cancelled,
        }
    }
}

/// Deliver one message; false means stop relaying
async fn forward<D: Downstream>(downstream: &mut D, text: String) -> bool {
    if !downstream.is_connected() {
        return false;
    }
    match downstream.send_text(text).await {
        Ok(()) => true,
        Err(e) => {
            debug!("Downstream send failed: {}", e);
            false
        }
    }
}

async fn wait_for_close(signal: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = signal else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // watcher gone without reporting a close
            return std::future::pending().await;
        }
    }
}

async fn keepalive<S>(sink: Arc<Mutex<S>>, every: Duration, failed: oneshot::Sender<String>)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut ticker = heartbeat(every);

    loop {
        ticker.tick().await;
        let sent = sink.lock().await.send(Message::Ping(Vec::new())).await;
        if let Err(e) = sent {
            warn!("Keepalive ping failed: {}", e);
            let _ = failed.send(e.to_string());
            return;
        }
        debug!("Keepalive ping sent");
    }
}

/// Single teardown path shared by every terminal condition
struct Teardown<S> {
    done: AtomicBool,
    keepalive: JoinHandle<()>,
    upstream: Arc<Mutex<S>>,
}

impl<S> Teardown<S>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    fn new(keepalive: JoinHandle<()>, upstream: Arc<Mutex<S>>) -> Self {
        Self {
            done: AtomicBool::new(false),
            keepalive,
            upstream,
        }
    }

    /// Returns true only for the call that actually tore down
    async fn run<D: Downstream>(&self, downstream: &mut D) -> bool {
        if self.done.swap(true, Ordering::SeqCst) {
            return false;
        }

        self.keepalive.abort();

        if let Err(e) = self.upstream.lock().await.close().await {
            debug!("Upstream already closed: {}", e);
        }
        if let Err(e) = downstream.close().await {
            debug!("Downstream close failed: {}", e);
        }
        info!("Relay torn down");
        true
    }
}

/// Handle to a relay running in the background. Dropping it cancels the relay.
pub struct RelayHandle {
    cancel: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<RelayReport>>,
}

impl RelayHandle {
    /// Request shutdown; idempotent
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the relay to stop
    pub async fn join(self) -> Result<RelayReport> {
        let RelayHandle { cancel, join } = self;
        // keep the cancel sender alive while waiting
        let _cancel = cancel;
        join.await
            .map_err(|e| ClientError::Internal(format!("relay task failed: {}", e)))?
    }

    /// Cancel and wait
    pub async fn shutdown(mut self) -> Result<RelayReport> {
        self.cancel();
        self.join().await
    }
}
