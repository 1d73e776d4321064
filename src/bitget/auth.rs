//! Authentication utilities for the Bitget API

use crate::common::auth::{
    encode_query, hmac_sha256_base64, path_with_query, Credential, SignedRequest, Signature, Signer,
};
use crate::common::errors::Result;
use crate::common::types::Exchange;

/// Bitget request signer
///
/// Pre-hash: `timestamp + METHOD + path[?query] + body`, base64 HMAC-SHA256.
#[derive(Debug, Clone)]
pub struct BitgetSigner {
    credential: Credential,
    passphrase: String,
}

impl BitgetSigner {
    /// Fails when the credential has no passphrase
    pub fn new(credential: Credential) -> Result<Self> {
        let passphrase = credential.require_passphrase(Exchange::Bitget)?.to_string();
        Ok(Self {
            credential,
            passphrase,
        })
    }
}

impl Signer for BitgetSigner {
    fn exchange(&self) -> Exchange {
        Exchange::Bitget
    }

    fn credential(&self) -> &Credential {
        &self.credential
    }

    fn pre_hash(&self, request: &SignedRequest) -> String {
        format!(
            "{}{}{}{}",
            request.timestamp,
            request.method.as_str().to_uppercase(),
            path_with_query(&request.path, &encode_query(&request.query)),
            request.body
        )
    }

    fn sign(&self, request: &SignedRequest) -> Result<Signature> {
        let value = hmac_sha256_base64(&self.credential.api_secret, &self.pre_hash(request))?;
        Ok(Signature {
            value,
            timestamp: request.timestamp,
            nonce: None,
        })
    }

    fn auth_headers(&self, signature: &Signature) -> Vec<(&'static str, String)> {
        vec![
            ("ACCESS-KEY", self.credential.api_key.clone()),
            ("ACCESS-SIGN", signature.value.clone()),
            ("ACCESS-TIMESTAMP", signature.timestamp.to_string()),
            ("ACCESS-PASSPHRASE", self.passphrase.clone()),
            ("Content-Type", "application/json".to_string()),
            ("locale", "en-US".to_string()),
        ]
    }
}
