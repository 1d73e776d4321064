//! Signed REST transport shared by the exchange clients
//!
//! Every call takes a fresh timestamp (from the exchange clock where the
//! exchange demands it), builds a [`SignedRequest`], signs it and sends
//! exactly the query and body bytes that were signed. Nothing is reused
//! between calls.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::common::auth::{canonical_body, encode_query, now_millis, path_with_query, SignedRequest, Signer};
use crate::common::errors::{ClientError, Result};

/// Where signing timestamps come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clock {
    /// Local wall clock
    Local,
    /// Fetched from the exchange before every signed call
    Server {
        path: String,
        /// JSON pointer to the millisecond timestamp in the response
        pointer: String,
    },
}

impl Clock {
    pub fn server(path: impl Into<String>, pointer: impl Into<String>) -> Self {
        Clock::Server {
            path: path.into(),
            pointer: pointer.into(),
        }
    }
}

/// Timeouts applied by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestTimeouts {
    pub request: Duration,
    pub server_time: Duration,
    pub order: Duration,
}

impl Default for RestTimeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            server_time: Duration::from_secs(5),
            order: Duration::from_secs(10),
        }
    }
}

/// REST client that signs every request with one exchange's [`Signer`]
#[derive(Debug, Clone)]
pub struct SignedRestClient {
    client: Client,
    base_url: String,
    signer: Arc<dyn Signer>,
    clock: Clock,
    timeouts: RestTimeouts,
}

impl SignedRestClient {
    pub fn new(base_url: &str, signer: Arc<dyn Signer>, clock: Clock) -> Result<Self> {
        Self::with_timeouts(base_url, signer, clock, RestTimeouts::default())
    }

    pub fn with_timeouts(
        base_url: &str,
        signer: Arc<dyn Signer>,
        clock: Clock,
        timeouts: RestTimeouts,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeouts.request)
            .build()
            .map_err(|e| ClientError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
            clock,
            timeouts,
        })
    }

    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange server time in milliseconds, bounded by the server-time timeout
    #[instrument(skip(self))]
    pub async fn server_time(&self) -> Result<i64> {
        let Clock::Server { path, pointer } = &self.clock else {
            return Ok(now_millis());
        };

        let url = format!("{}{}", self.base_url, path);
        let response = tokio::time::timeout(self.timeouts.server_time, self.client.get(&url).send())
            .await
            .map_err(|_| ClientError::Timeout(format!("server time from {}", url)))??;
        let body = read_json(response).await?;

        let millis = match body.pointer(pointer) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        millis.ok_or_else(|| {
            ClientError::InvalidResponse(format!("no server time at {} in {}", pointer, body))
        })
    }

    /// Unsigned GET for public market data
    #[instrument(skip(self))]
    pub async fn get_public(&self, path: &str, query: &[(String, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path_with_query(path, &encode_query(query)));
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        read_json(response).await
    }

    /// Signed GET
    pub async fn get_signed(&self, path: &str, query: Vec<(String, String)>) -> Result<Value> {
        self.execute(Method::GET, path, query, String::new(), None).await
    }

    /// Signed POST with an optional JSON body
    pub async fn post_signed<B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<&B>,
    ) -> Result<Value> {
        let body = canonical_body(body)?;
        self.execute(Method::POST, path, query, body, None).await
    }

    /// Signed POST for order placement, bounded by the order timeout
    pub async fn post_order<B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        body: Option<&B>,
    ) -> Result<Value> {
        let body = canonical_body(body)?;
        self.execute(Method::POST, path, query, body, Some(self.timeouts.order))
            .await
    }

    #[instrument(skip(self, query, body), fields(exchange = %self.signer.exchange()))]
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Vec<(String, String)>,
        body: String,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let timestamp = self.server_time().await?;
        let mut request = SignedRequest::new(method.clone(), path, timestamp)
            .with_query(query)
            .with_body(body);
        if self.signer.requires_nonce() {
            request = request.with_nonce(Uuid::new_v4().to_string());
        }
        let signature = self.signer.sign(&request)?;

        let url = format!(
            "{}{}",
            self.base_url,
            path_with_query(path, &self.signer.wire_query(&request, &signature))
        );
        debug!("{} {}", method, url);

        let headers = self.signer.auth_headers(&signature);
        let has_content_type = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));

        let mut builder = self.client.request(method, &url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if !request.body.is_empty() {
            if !has_content_type {
                builder = builder.header(CONTENT_TYPE, "application/json");
            }
            builder = builder.body(request.body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        read_json(response).await
    }
}

/// Parse a response body, turning non-2xx statuses into [`ClientError::ExchangeRejection`]
async fn read_json(response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await?;
    let parsed = serde_json::from_str::<Value>(&text);

    if !status.is_success() {
        return Err(ClientError::ExchangeRejection {
            status: status.as_u16(),
            body: parsed.unwrap_or(Value::String(text)),
        });
    }

    parsed.map_err(|e| ClientError::InvalidResponse(format!("{}: {}", e, text)))
}

/// Turn a 2xx payload whose in-band code is not `success` into a rejection
pub fn ensure_code(body: Value, success: &str) -> Result<Value> {
    let code = match body.get("code") {
        Some(Value::String(code)) => Some(code.clone()),
        Some(Value::Number(code)) => Some(code.to_string()),
        _ => None,
    };
    match code {
        Some(code) if code != success => Err(ClientError::ExchangeRejection { status: 200, body }),
        _ => Ok(body),
    }
}

/// Pull `data` out of a `{code, msg, data}` envelope
pub fn envelope_data<T: DeserializeOwned>(body: Value) -> Result<T> {
    let data = match body {
        Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
        other => {
            return Err(ClientError::InvalidResponse(format!(
                "expected envelope object, got {}",
                other
            )))
        }
    };
    Ok(serde_json::from_value(data)?)
}
