//! Request signing primitives shared by every exchange
//!
//! A [`Signer`] turns a [`SignedRequest`] into a [`Signature`] and knows how to
//! present it (headers and, for Binance, the query string). One implementation
//! exists per exchange; the client picks it at construction time.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use reqwest::Method;
use serde::Serialize;
use sha2::Sha256;

use crate::common::errors::{ClientError, Result};
use crate::common::types::Exchange;

type HmacSha256 = Hmac<Sha256>;

/// API credentials. Immutable once built.
#[derive(Clone)]
pub struct Credential {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
    pub uid: Option<String>,
}

impl Credential {
    /// Build credentials, rejecting empty key or secret
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        if api_key.trim().is_empty() {
            return Err(ClientError::Signing("api key is empty".to_string()));
        }
        if api_secret.trim().is_empty() {
            return Err(ClientError::Signing("api secret is empty".to_string()));
        }
        Ok(Self {
            api_key,
            api_secret,
            passphrase: None,
            uid: None,
        })
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Passphrase, or a signing error naming the exchange that needs it
    pub fn require_passphrase(&self, exchange: Exchange) -> Result<&str> {
        match self.passphrase.as_deref() {
            Some(p) if !p.trim().is_empty() => Ok(p),
            _ => Err(ClientError::Signing(format!(
                "{} credentials require a passphrase",
                exchange
            ))),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &redact(&self.api_key))
            .field("api_secret", &"***")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .field("uid", &self.uid)
            .finish()
    }
}

fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    format!("{}***", prefix)
}

/// Everything that goes into a signature. Built per call, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    pub method: Method,
    pub path: String,
    /// Query parameters in call-site order
    pub query: Vec<(String, String)>,
    /// Compact JSON body, empty when there is none
    pub body: String,
    /// Milliseconds since the epoch, taken when the request is signed
    pub timestamp: i64,
    pub nonce: Option<String>,
}

impl SignedRequest {
    pub fn new(method: Method, path: impl Into<String>, timestamp: i64) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: String::new(),
            timestamp,
            nonce: None,
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }
}

/// Output of signing. Pure function of credential and request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Hex or base64 digest, depending on the exchange
    pub value: String,
    pub timestamp: i64,
    pub nonce: Option<String>,
}

/// Exchange-specific signing scheme
pub trait Signer: Send + Sync + std::fmt::Debug {
    fn exchange(&self) -> Exchange;

    fn credential(&self) -> &Credential;

    /// Whether requests must carry a fresh nonce
    fn requires_nonce(&self) -> bool {
        false
    }

    /// Canonical string that gets HMAC'd
    fn pre_hash(&self, request: &SignedRequest) -> String;

    fn sign(&self, request: &SignedRequest) -> Result<Signature>;

    /// Headers that present the signature
    fn auth_headers(&self, signature: &Signature) -> Vec<(&'static str, String)>;

    /// Query string sent on the wire (without the leading `?`)
    fn wire_query(&self, request: &SignedRequest, _signature: &Signature) -> String {
        encode_query(&request.query)
    }
}

/// HMAC-SHA256 of `payload` keyed with `secret`
pub fn hmac_sha256(secret: &str, payload: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ClientError::Signing(format!("Failed to create HMAC: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String> {
    Ok(hex::encode(hmac_sha256(secret, payload)?))
}

pub fn hmac_sha256_base64(secret: &str, payload: &str) -> Result<String> {
    Ok(BASE64.encode(hmac_sha256(secret, payload)?))
}

/// Form-urlencode query pairs, keeping their order
pub fn encode_query(query: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(query.iter())
        .finish()
}

/// Serialize a request body to the exact string that is both signed and sent.
///
/// Field order follows the struct declaration. `None`, `{}` and `null` all
/// collapse to the empty string.
pub fn canonical_body<B: Serialize + ?Sized>(body: Option<&B>) -> Result<String> {
    let Some(body) = body else {
        return Ok(String::new());
    };
    let json = serde_json::to_string(body)?;
    match json.as_str() {
        "{}" | "null" => Ok(String::new()),
        _ => Ok(json),
    }
}

/// `path` plus `?query` when the query is non-empty
pub fn path_with_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Leverage<'a> {
        inst_id: &'a str,
        leverage: String,
        margin_mode: &'a str,
    }

    #[test]
    fn test_canonical_body_keeps_declaration_order() {
        let body = Leverage {
            inst_id: "BTC-USDT",
            leverage: "2".to_string(),
            margin_mode: "isolated",
        };
        let json = canonical_body(Some(&body)).unwrap();
        assert_eq!(json, r#"{"instId":"BTC-USDT","leverage":"2","marginMode":"isolated"}"#);
    }

    #[test]
    fn test_empty_bodies_collapse() {
        assert_eq!(canonical_body::<Leverage>(None).unwrap(), "");
        let empty: BTreeMap<String, String> = BTreeMap::new();
        assert_eq!(canonical_body(Some(&empty)).unwrap(), "");
        assert_eq!(canonical_body(Some(&serde_json::Value::Null)).unwrap(), "");
    }

    #[test]
    fn test_encode_query_keeps_call_site_order() {
        let query = vec![
            ("symbol".to_string(), "BTCUSDT".to_string()),
            ("side".to_string(), "BUY".to_string()),
            ("accountType".to_string(), "a b".to_string()),
        ];
        assert_eq!(encode_query(&query), "symbol=BTCUSDT&side=BUY&accountType=a+b");
    }

    #[test]
    fn test_hmac_encodings() {
        // RFC 4231 style sanity: same input, same digest
        let a = hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            a,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
        let b = hmac_sha256_base64("key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(b, "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg=");
    }

    #[test]
    fn test_credential_rejects_blank_secret() {
        assert!(matches!(
            Credential::new("key", "  "),
            Err(ClientError::Signing(_))
        ));
        let cred = Credential::new("key", "secret").unwrap();
        assert!(cred.require_passphrase(Exchange::Bitget).is_err());
        let cred = cred.with_passphrase("pass");
        assert_eq!(cred.require_passphrase(Exchange::Bitget).unwrap(), "pass");
    }

    #[test]
    fn test_credential_debug_redacts_secret() {
        let cred = Credential::new("abcdefgh", "topsecret")
            .unwrap()
            .with_passphrase("hunter2");
        let text = format!("{:?}", cred);
        assert!(!text.contains("topsecret"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("abcdefgh"));
    }
}
