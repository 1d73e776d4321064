//! Upstream exchange socket: connect, optional login, subscribe

use futures_util::{stream, SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, instrument, warn};

use crate::common::errors::{ClientError, Result};
use crate::common::traits::MessageStream;

pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default keepalive ping interval
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Bound on connect and login acknowledgment
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything needed to open one exchange channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSubscription {
    pub url: String,
    /// Signed login frame, sent and acknowledged before subscribing
    pub login: Option<String>,
    /// Subscribe frames, sent in order
    pub subscribe: Vec<String>,
}

impl ChannelSubscription {
    pub fn public(url: impl Into<String>, subscribe: Vec<String>) -> Self {
        Self {
            url: url.into(),
            login: None,
            subscribe,
        }
    }

    pub fn with_login(mut self, login: String) -> Self {
        self.login = Some(login);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.login.is_some()
    }
}

/// Connect with the default handshake timeout
pub async fn connect(subscription: &ChannelSubscription) -> Result<UpstreamSocket> {
    connect_with_timeout(subscription, DEFAULT_HANDSHAKE_TIMEOUT).await
}

/// Open the socket, log in if required and send the subscribe frames
#[instrument(skip(subscription), fields(url = %subscription.url))]
pub async fn connect_with_timeout(
    subscription: &ChannelSubscription,
    handshake_timeout: Duration,
) -> Result<UpstreamSocket> {
    info!("Connecting upstream");

    let (mut socket, _response) = timeout(handshake_timeout, connect_async(subscription.url.as_str()))
        .await
        .map_err(|_| ClientError::Timeout(format!("connect to {}", subscription.url)))?
        .map_err(|e| ClientError::WebSocketConnection(e.to_string()))?;

    if let Some(login) = &subscription.login {
        socket.send(Message::Text(login.clone())).await?;
        timeout(handshake_timeout, await_login_ack(&mut socket))
            .await
            .map_err(|_| ClientError::Timeout("login acknowledgment".to_string()))??;
        info!("Upstream login acknowledged");
    }

    for frame in &subscription.subscribe {
        debug!("Subscribing: {}", frame);
        socket.send(Message::Text(frame.clone())).await?;
    }

    Ok(socket)
}

async fn await_login_ack(socket: &mut UpstreamSocket) -> Result<()> {
    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => {
                let Ok(value) = serde_json::from_str::<Value>(&text) else {
                    debug!("Ignoring non-JSON frame before login ack: {}", text);
                    continue;
                };
                match value.get("event").and_then(Value::as_str) {
                    Some("login") | Some("error") => {
                        return if is_login_ack(&value) {
                            Ok(())
                        } else {
                            warn!("Login rejected: {}", value);
                            Err(ClientError::Authentication(value.to_string()))
                        };
                    }
                    _ => debug!("Ignoring frame before login ack: {}", text),
                }
            }
            Message::Close(frame) => {
                return Err(ClientError::StreamTerminated(format!(
                    "closed during login: {:?}",
                    frame
                )));
            }
            _ => {}
        }
    }
    Err(ClientError::StreamTerminated(
        "upstream ended before login ack".to_string(),
    ))
}

/// `event == "login"` with a zero code, string or numeric
pub fn is_login_ack(value: &Value) -> bool {
    let is_login = value.get("event").and_then(Value::as_str) == Some("login");
    let code_ok = match value.get("code") {
        Some(Value::String(code)) => code == "0",
        Some(Value::Number(code)) => code.as_i64() == Some(0),
        _ => false,
    };
    is_login && code_ok
}

/// Keepalive ticker whose first tick fires one period from now
pub fn heartbeat(every: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Connect and expose the socket as a stream of text frames, pinging the
/// upstream every `heartbeat_interval` while the stream is polled.
///
/// The stream ends on a close frame and yields at most one error; a failed
/// ping is that error.
pub async fn open_message_stream(
    subscription: &ChannelSubscription,
    heartbeat_interval: Duration,
) -> Result<MessageStream> {
    let socket = connect(subscription).await?;
    let ticker = heartbeat(heartbeat_interval);

    let frames = stream::unfold(Some((socket, ticker)), |state| async move {
        let (mut socket, mut ticker) = state?;
        loop {
            tokio::select! {
                message = socket.next() => match message {
                    Some(Ok(Message::Text(text))) => return Some((Ok(text), Some((socket, ticker)))),
                    Some(Ok(Message::Binary(data))) => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        return Some((Ok(text), Some((socket, ticker))));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!("Upstream closed: {:?}", frame);
                        return None;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Some((Err(ClientError::from(e)), None)),
                    None => return None,
                },
                _ = ticker.tick() => {
                    if let Err(e) = socket.send(Message::Ping(Vec::new())).await {
                        warn!("Keepalive ping failed: {}", e);
                        return Some((Err(ClientError::from(e)), None));
                    }
                    debug!("Keepalive ping sent");
                }
            }
        }
    });

    Ok(Box::pin(frames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_login_ack_accepts_string_and_numeric_codes() {
        assert!(is_login_ack(&json!({"event": "login", "code": "0", "msg": ""})));
        assert!(is_login_ack(&json!({"event": "login", "code": 0})));
    }

    #[test]
    fn test_login_ack_rejects_errors() {
        assert!(!is_login_ack(&json!({"event": "login", "code": "152409"})));
        assert!(!is_login_ack(&json!({"event": "error", "code": "0"})));
        assert!(!is_login_ack(&json!({"event": "login"})));
    }

    #[test]
    fn test_subscription_builder() {
        let sub = ChannelSubscription::public("wss://example.test/ws", vec!["{}".to_string()])
            .with_login("{\"op\":\"login\"}".to_string());
        assert!(sub.is_authenticated());
        assert_eq!(sub.subscribe.len(), 1);
    }
}
