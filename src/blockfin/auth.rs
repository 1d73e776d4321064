//! Authentication utilities for the BlockFin API

use crate::common::auth::{
    encode_query, hmac_sha256_base64, path_with_query, Credential, SignedRequest, Signature, Signer,
};
use crate::common::errors::{ClientError, Result};
use crate::common::types::Exchange;

/// Path signed for the private WebSocket login
pub const WS_LOGIN_PATH: &str = "/users/self/verify";

/// BlockFin request signer
///
/// Pre-hash: `timestamp + nonce + METHOD + path[?query] + body`, base64
/// HMAC-SHA256. Every request needs a fresh nonce.
#[derive(Debug, Clone)]
pub struct BlockFinSigner {
    credential: Credential,
    passphrase: String,
}

impl BlockFinSigner {
    /// Fails when the credential has no passphrase
    pub fn new(credential: Credential) -> Result<Self> {
        let passphrase = credential.require_passphrase(Exchange::BlockFin)?.to_string();
        Ok(Self {
            credential,
            passphrase,
        })
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }
}

impl Signer for BlockFinSigner {
    fn exchange(&self) -> Exchange {
        Exchange::BlockFin
    }

    fn credential(&self) -> &Credential {
        &self.credential
    }

    fn requires_nonce(&self) -> bool {
        true
    }

    fn pre_hash(&self, request: &SignedRequest) -> String {
        format!(
            "{}{}{}{}{}",
            request.timestamp,
            request.nonce.as_deref().unwrap_or_default(),
            request.method.as_str().to_uppercase(),
            path_with_query(&request.path, &encode_query(&request.query)),
            request.body
        )
    }

    fn sign(&self, request: &SignedRequest) -> Result<Signature> {
        let nonce = request
            .nonce
            .clone()
            .ok_or_else(|| ClientError::Signing("BlockFin requests need a nonce".to_string()))?;
        let value = hmac_sha256_base64(&self.credential.api_secret, &self.pre_hash(request))?;
        Ok(Signature {
            value,
            timestamp: request.timestamp,
            nonce: Some(nonce),
        })
    }

    fn auth_headers(&self, signature: &Signature) -> Vec<(&'static str, String)> {
        vec![
            ("ACCESS-KEY", self.credential.api_key.clone()),
            ("ACCESS-SIGN", signature.value.clone()),
            ("ACCESS-TIMESTAMP", signature.timestamp.to_string()),
            ("ACCESS-NONCE", signature.nonce.clone().unwrap_or_default()),
            ("ACCESS-PASSPHRASE", self.passphrase.clone()),
        ]
    }
}
