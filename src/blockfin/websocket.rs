//! WebSocket channels for BlockFin

use futures_util::{stream, Stream, StreamExt};
use reqwest::Method;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::auth::{BlockFinSigner, WS_LOGIN_PATH};
use super::messages::*;
use crate::common::auth::{now_millis, SignedRequest, Signer};
use crate::common::errors::{ClientError, Result};
use crate::common::types::PositionSnapshot;
use crate::relay::upstream::{
    open_message_stream, ChannelSubscription, DEFAULT_HEARTBEAT_INTERVAL,
};

pub const DEFAULT_PUBLIC_URL: &str = "wss://openapi.blockfin.com/ws/public";
pub const DEFAULT_PRIVATE_URL: &str = "wss://openapi.blockfin.com/ws/private";

/// Channels that need a login before subscribing
const PRIVATE_CHANNELS: &[&str] = &["positions", "orders", "orders-algo", "account"];

pub type PositionStream = Pin<Box<dyn Stream<Item = Result<PositionSnapshot>> + Send>>;

pub fn is_private_channel(channel: &str) -> bool {
    PRIVATE_CHANNELS.contains(&channel)
}

/// Builds subscriptions for the public and private BlockFin sockets
#[derive(Debug, Clone)]
pub struct BlockFinWebSocket {
    public_url: String,
    private_url: String,
    signer: Arc<BlockFinSigner>,
    heartbeat: Duration,
}

impl BlockFinWebSocket {
    pub fn new(public_url: &str, private_url: &str, signer: Arc<BlockFinSigner>) -> Self {
        Self {
            public_url: public_url.to_string(),
            private_url: private_url.to_string(),
            signer,
            heartbeat: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat_interval(mut self, every: Duration) -> Self {
        self.heartbeat = every;
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat
    }

    /// Signed login frame for the private socket
    pub fn login_message(&self, timestamp: i64, nonce: &str) -> Result<String> {
        let request = SignedRequest::new(Method::GET, WS_LOGIN_PATH, timestamp).with_nonce(nonce);
        let signature = self.signer.sign(&request)?;
        let login = WsRequest {
            op: "login",
            args: vec![WsLoginArgs {
                api_key: &self.signer.credential().api_key,
                passphrase: self.signer.passphrase(),
                timestamp: signature.timestamp.to_string(),
                sign: signature.value,
                nonce: nonce.to_string(),
            }],
        };
        Ok(serde_json::to_string(&login)?)
    }

    pub fn subscribe_message(channel: &str, inst_id: Option<&str>) -> Result<String> {
        let request = WsRequest {
            op: "subscribe",
            args: vec![WsChannelArgs { channel, inst_id }],
        };
        Ok(serde_json::to_string(&request)?)
    }

    /// Subscription for `channel`, logging in first when the channel is private.
    /// An empty `inst_id` subscribes to every instrument.
    pub fn subscription(&self, channel: &str, inst_id: &str) -> Result<ChannelSubscription> {
        let inst_id = (!inst_id.is_empty()).then_some(inst_id);
        let subscribe = vec![Self::subscribe_message(channel, inst_id)?];

        if is_private_channel(channel) {
            let login = self.login_message(now_millis(), &Uuid::new_v4().to_string())?;
            Ok(ChannelSubscription::public(&self.private_url, subscribe).with_login(login))
        } else {
            Ok(ChannelSubscription::public(&self.public_url, subscribe))
        }
    }

    /// Position pushes for one instrument, decoded into snapshots
    pub async fn position_stream(&self, inst_id: &str) -> Result<PositionStream> {
        let subscription = self.subscription("positions", inst_id)?;
        let frames = open_message_stream(&subscription, self.heartbeat).await?;
        let snapshots = frames.flat_map(|frame| {
            let items = match frame {
                Ok(text) => parse_position_push(&text),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        });
        Ok(Box::pin(snapshots))
    }
}

/// Decode a `positions` push, one result per open position.
///
/// Event frames, pongs and other channels yield nothing. Entries without a
/// mark or average price are flat and skipped; an entry that fails to decode
/// does not affect the others.
pub fn parse_position_push(text: &str) -> Vec<Result<PositionSnapshot>> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        debug!("Ignoring non-JSON frame: {}", text);
        return Vec::new();
    };
    if value.get("event").is_some() {
        debug!("Event frame: {}", value);
        return Vec::new();
    }
    if value.pointer("/arg/channel").and_then(Value::as_str) != Some("positions") {
        return Vec::new();
    }
    let Some(entries) = value.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| !is_flat(entry))
        .map(|entry| {
            serde_json::from_value::<PositionData>(entry.clone())
                .map_err(ClientError::from)
                .and_then(PositionSnapshot::try_from)
                .map_err(|e| {
                    warn!("Undecodable position entry {}: {}", entry, e);
                    e
                })
        })
        .collect()
}

fn is_flat(entry: &Value) -> bool {
    ["markPrice", "averagePrice", "positions"].iter().any(|field| {
        entry
            .get(*field)
            .and_then(Value::as_str)
            .map_or(false, |v| v.trim().is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::auth::Credential;
    use crate::common::types::PositionSide;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn websocket() -> BlockFinWebSocket {
        let credential = Credential::new("blockfin_key", "blockfin_secret")
            .unwrap()
            .with_passphrase("blockfin_pass");
        let signer = Arc::new(BlockFinSigner::new(credential).unwrap());
        BlockFinWebSocket::new(DEFAULT_PUBLIC_URL, DEFAULT_PRIVATE_URL, signer)
    }

    #[test]
    fn test_login_message_shape() {
        let login = websocket()
            .login_message(1700000000000, "5f0c3b9e-1d2a-4c1e-9a5b-0e8f7d6c5b4a")
            .unwrap();
        assert_eq!(
            login,
            r#"{"op":"login","args":[{"apiKey":"blockfin_key","passphrase":"blockfin_pass","timestamp":"1700000000000","sign":"x6sxjJWmScNvg/7tLN0fI4NYxy0tbat7X54s1bwpIRY=","nonce":"5f0c3b9e-1d2a-4c1e-9a5b-0e8f7d6c5b4a"}]}"#
        );
    }

    #[test]
    fn test_private_channel_uses_login() {
        let sub = websocket().subscription("positions", "BTC-USDT").unwrap();
        assert_eq!(sub.url, DEFAULT_PRIVATE_URL);
        assert!(sub.is_authenticated());
        assert_eq!(
            sub.subscribe,
            vec![r#"{"op":"subscribe","args":[{"channel":"positions","instId":"BTC-USDT"}]}"#.to_string()]
        );
    }

    #[test]
    fn test_public_channel_skips_login() {
        let sub = websocket().subscription("trades", "ETH-USDT").unwrap();
        assert_eq!(sub.url, DEFAULT_PUBLIC_URL);
        assert!(!sub.is_authenticated());
    }

    #[test]
    fn test_parse_position_push() {
        let push = r#"{
            "arg": {"channel": "positions"},
            "data": [{
                "instId": "BTC-USDT", "positionSide": "long", "positions": "4.4",
                "markPrice": "49500", "averagePrice": "50000", "leverage": "2"
            }]
        }"#;
        let snapshots: Vec<PositionSnapshot> = parse_position_push(push)
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(
            snapshots,
            vec![PositionSnapshot {
                inst_id: "BTC-USDT".to_string(),
                position_side: PositionSide::Long,
                quantity: dec!(4.4),
                mark_price: dec!(49500),
                average_price: dec!(50000),
                leverage: dec!(2),
            }]
        );
    }

    #[test]
    fn test_parse_ignores_event_frames() {
        assert!(parse_position_push(r#"{"event":"subscribe","arg":{"channel":"positions"}}"#).is_empty());
        assert!(parse_position_push("pong").is_empty());
    }

    #[test]
    fn test_flat_entry_does_not_drop_open_positions() {
        let push = r#"{
            "arg": {"channel": "positions"},
            "data": [
                {"instId": "BTC-USDT", "positionSide": "long", "positions": "4.4",
                 "markPrice": "49500", "averagePrice": "50000", "leverage": "2"},
                {"instId": "ETH-USDT", "positionSide": "long", "positions": "",
                 "markPrice": "2500", "averagePrice": "", "leverage": "2"}
            ]
        }"#;
        let results = parse_position_push(push);
        assert_eq!(results.len(), 1);
        let snapshot = results.into_iter().next().unwrap().unwrap();
        assert_eq!(snapshot.inst_id, "BTC-USDT");
        assert_eq!(snapshot.average_price, dec!(50000));
    }

    #[test]
    fn test_bad_entry_is_reported_alone() {
        let push = r#"{
            "arg": {"channel": "positions"},
            "data": [
                {"instId": "ETH-USDT", "positionSide": "sideways", "positions": "1",
                 "markPrice": "2500", "averagePrice": "2400", "leverage": "3"},
                {"instId": "BTC-USDT", "positionSide": "net", "positions": "-2",
                 "markPrice": "50500", "averagePrice": "50000", "leverage": "2"}
            ]
        }"#;
        let results = parse_position_push(push);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(ClientError::InvalidResponse(_))));
        let net = results[1].as_ref().unwrap();
        assert_eq!(net.position_side, PositionSide::Net);
        assert_eq!(net.quantity, dec!(-2));
    }
}
