//! WebSocket channels for Bitget (public)
//!
//! Channels default to spot. Prefix the channel with an instrument type to
//! subscribe elsewhere, e.g. `coin-futures:ticker` or `usdt-futures:ticker`;
//! `futures:` is shorthand for coin-margined futures.

use super::messages::{WsChannelArgs, WsRequest};
use crate::common::errors::{ClientError, Result};
use crate::relay::upstream::ChannelSubscription;

pub const DEFAULT_WS_URL: &str = "wss://ws.bitget.com/v2/ws/public";

pub const SPOT: &str = "SPOT";
pub const COIN_FUTURES: &str = "COIN-FUTURES";
pub const USDT_FUTURES: &str = "USDT-FUTURES";
pub const USDC_FUTURES: &str = "USDC-FUTURES";

/// Split `inst-type:channel` into the wire instrument type and channel
pub fn split_channel(channel: &str) -> Result<(&'static str, &str)> {
    let Some((prefix, name)) = channel.split_once(':') else {
        return Ok((SPOT, channel));
    };
    let inst_type = match prefix.to_ascii_lowercase().as_str() {
        "spot" => SPOT,
        "futures" | "coin-futures" => COIN_FUTURES,
        "usdt-futures" => USDT_FUTURES,
        "usdc-futures" => USDC_FUTURES,
        _ => {
            return Err(ClientError::Validation(format!(
                "unknown Bitget instrument type: {}",
                prefix
            )))
        }
    };
    Ok((inst_type, name))
}

pub fn subscribe_message(inst_type: &str, channel: &str, inst_id: &str) -> Result<String> {
    let request = WsRequest {
        op: "subscribe",
        args: vec![WsChannelArgs {
            inst_type,
            channel,
            inst_id,
        }],
    };
    Ok(serde_json::to_string(&request)?)
}

/// Public subscription for `channel` on `inst_id`
pub fn subscription(url: &str, channel: &str, inst_id: &str) -> Result<ChannelSubscription> {
    let (inst_type, channel) = split_channel(channel)?;
    Ok(ChannelSubscription::public(
        url,
        vec![subscribe_message(inst_type, channel, inst_id)?],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_subscribe_frame() {
        let sub = subscription(DEFAULT_WS_URL, "ticker", "BTCUSDT").unwrap();
        assert_eq!(sub.url, DEFAULT_WS_URL);
        assert!(sub.login.is_none());
        assert_eq!(
            sub.subscribe,
            vec![r#"{"op":"subscribe","args":[{"instType":"SPOT","channel":"ticker","instId":"BTCUSDT"}]}"#.to_string()]
        );
    }

    #[test]
    fn test_futures_ticker_subscribe_frame() {
        let sub = subscription(DEFAULT_WS_URL, "futures:ticker", "POPCATPERP_CMCBL").unwrap();
        assert_eq!(
            sub.subscribe,
            vec![r#"{"op":"subscribe","args":[{"instType":"COIN-FUTURES","channel":"ticker","instId":"POPCATPERP_CMCBL"}]}"#.to_string()]
        );

        let usdt = subscription(DEFAULT_WS_URL, "USDT-FUTURES:books5", "BTCUSDT").unwrap();
        assert!(usdt.subscribe[0].contains(r#""instType":"USDT-FUTURES","channel":"books5""#));
    }

    #[test]
    fn test_unknown_inst_type_is_rejected() {
        assert!(matches!(
            subscription(DEFAULT_WS_URL, "options:ticker", "BTCUSDT"),
            Err(ClientError::Validation(_))
        ));
    }
}
