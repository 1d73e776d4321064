//! Authentication utilities for the Binance API
//!
//! Binance signs the literal query string. `timestamp` and `recvWindow` are
//! appended after the call-site parameters (no sorting) and the hex HMAC is
//! sent back as a trailing `signature` parameter.

use crate::common::auth::{encode_query, hmac_sha256_hex, Credential, SignedRequest, Signature, Signer};
use crate::common::errors::Result;
use crate::common::types::Exchange;

/// Default `recvWindow` in milliseconds
pub const DEFAULT_RECV_WINDOW_MS: u64 = 60_000;

/// Binance request signer
#[derive(Debug, Clone)]
pub struct BinanceSigner {
    credential: Credential,
    recv_window_ms: u64,
}

impl BinanceSigner {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            recv_window_ms: DEFAULT_RECV_WINDOW_MS,
        }
    }

    pub fn with_recv_window(mut self, recv_window_ms: u64) -> Self {
        self.recv_window_ms = recv_window_ms;
        self
    }

    pub fn recv_window_ms(&self) -> u64 {
        self.recv_window_ms
    }
}

impl Signer for BinanceSigner {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    fn credential(&self) -> &Credential {
        &self.credential
    }

    fn pre_hash(&self, request: &SignedRequest) -> String {
        let mut pairs = request.query.clone();
        pairs.push(("timestamp".to_string(), request.timestamp.to_string()));
        pairs.push(("recvWindow".to_string(), self.recv_window_ms.to_string()));
        encode_query(&pairs)
    }

    fn sign(&self, request: &SignedRequest) -> Result<Signature> {
        let value = hmac_sha256_hex(&self.credential.api_secret, &self.pre_hash(request))?;
        Ok(Signature {
            value,
            timestamp: request.timestamp,
            nonce: None,
        })
    }

    fn auth_headers(&self, _signature: &Signature) -> Vec<(&'static str, String)> {
        vec![("X-MBX-APIKEY", self.credential.api_key.clone())]
    }

    fn wire_query(&self, request: &SignedRequest, signature: &Signature) -> String {
        format!("{}&signature={}", self.pre_hash(request), signature.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    fn signer() -> BinanceSigner {
        BinanceSigner::new(Credential::new("binance_key", "binance_secret").unwrap())
    }

    fn order_request() -> SignedRequest {
        SignedRequest::new(Method::POST, "/api/v3/order", 1_700_000_000_000).with_query(vec![
            ("symbol".to_string(), "BTCUSDT".to_string()),
            ("side".to_string(), "BUY".to_string()),
            ("type".to_string(), "MARKET".to_string()),
            ("quantity".to_string(), "0.01".to_string()),
        ])
    }

    #[test]
    fn test_pre_hash_appends_timestamp_then_recv_window() {
        assert_eq!(
            signer().pre_hash(&order_request()),
            "symbol=BTCUSDT&side=BUY&type=MARKET&quantity=0.01&timestamp=1700000000000&recvWindow=60000"
        );
    }

    #[test]
    fn test_known_signature() {
        let signature = signer().sign(&order_request()).unwrap();
        assert_eq!(
            signature.value,
            "d42d562bdb047cf2b7bd16640766a4877db5c0a005f74c91fc946d1734248fec"
        );
        assert_eq!(signature.timestamp, 1_700_000_000_000);
        assert!(signature.nonce.is_none());
    }

    #[test]
    fn test_empty_query_signature() {
        let request = SignedRequest::new(Method::POST, "/sapi/v3/asset/getUserAsset", 1_700_000_000_000);
        assert_eq!(signer().pre_hash(&request), "timestamp=1700000000000&recvWindow=60000");
        assert_eq!(
            signer().sign(&request).unwrap().value,
            "8dbd1c85961252452c12e8bd4f5f54d70c9ffb61699d07d9914f78389e469ef0"
        );
    }

    #[test]
    fn test_parameter_order_changes_signature() {
        let mut swapped = order_request();
        swapped.query.swap(0, 1);
        assert_ne!(
            signer().sign(&order_request()).unwrap(),
            signer().sign(&swapped).unwrap()
        );
    }

    #[test]
    fn test_wire_query_ends_with_signature() {
        let request = order_request();
        let signature = signer().sign(&request).unwrap();
        let query = signer().wire_query(&request, &signature);
        assert!(query.starts_with("symbol=BTCUSDT&side=BUY"));
        assert!(query.ends_with(&format!("&signature={}", signature.value)));
    }

    #[test]
    fn test_api_key_header() {
        let signature = signer().sign(&order_request()).unwrap();
        let headers = signer().auth_headers(&signature);
        assert_eq!(headers, vec![("X-MBX-APIKEY", "binance_key".to_string())]);
    }
}
