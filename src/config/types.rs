//! Configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::auth::Credential;
use crate::common::errors::{ClientError, Result};
use crate::common::rest::RestTimeouts;
use crate::common::types::Exchange;
use crate::strategy::{default_strategies, PositionSetting};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub binance: ExchangeConfig,
    #[serde(default)]
    pub bitget: ExchangeConfig,
    #[serde(default)]
    pub blockfin: ExchangeConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
    /// Tracked positions for the additional-entry strategy
    #[serde(default = "default_strategies")]
    pub strategies: Vec<PositionSetting>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            binance: ExchangeConfig::default(),
            bitget: ExchangeConfig::default(),
            blockfin: ExchangeConfig::default(),
            settings: AppSettings::default(),
            strategies: default_strategies(),
        }
    }
}

impl AppConfig {
    pub fn exchange(&self, exchange: Exchange) -> &ExchangeConfig {
        match exchange {
            Exchange::Binance => &self.binance,
            Exchange::Bitget => &self.bitget,
            Exchange::BlockFin => &self.blockfin,
        }
    }
}

/// Per-exchange credentials and endpoints.
///
/// Unset URLs fall back to each client's production defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_secret: Option<String>,
    #[serde(default, skip_serializing)]
    pub api_passphrase: Option<String>,
    /// Account uid (BlockFin)
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Public WebSocket base URL
    #[serde(default)]
    pub ws_base_url: Option<String>,
    /// Private WebSocket URL (BlockFin)
    #[serde(default)]
    pub ws_private_url: Option<String>,
}

impl ExchangeConfig {
    /// Build the credential for `exchange`, failing with a signing error when
    /// key or secret is missing
    pub fn credential(&self, exchange: Exchange) -> Result<Credential> {
        let (Some(key), Some(secret)) = (&self.api_key, &self.api_secret) else {
            return Err(ClientError::Signing(format!(
                "{} api key and secret are not configured",
                exchange
            )));
        };
        let mut credential = Credential::new(key.clone(), secret.clone())?;
        if let Some(passphrase) = &self.api_passphrase {
            credential = credential.with_passphrase(passphrase.clone());
        }
        if let Some(uid) = &self.uid {
            credential = credential.with_uid(uid.clone());
        }
        Ok(credential)
    }

    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url.as_deref().unwrap_or(default)
    }

    pub fn ws_base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.ws_base_url.as_deref().unwrap_or(default)
    }

    pub fn ws_private_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.ws_private_url.as_deref().unwrap_or(default)
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Delay between reconnection attempts in milliseconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Maximum reconnection attempts (0 = infinite)
    #[serde(default)]
    pub max_reconnect_attempts: u32,
    /// Keepalive ping interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Bound on server-time lookups in milliseconds
    #[serde(default = "default_server_time_timeout")]
    pub server_time_timeout_ms: u64,
    /// Bound on order placement in seconds
    #[serde(default = "default_order_timeout")]
    pub order_timeout_seconds: u64,
    /// Bound on WebSocket connect and login in seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_seconds: u64,
    /// Binance `recvWindow`
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            reconnect_delay_ms: default_reconnect_delay(),
            max_reconnect_attempts: 0,
            heartbeat_interval_seconds: default_heartbeat_interval(),
            request_timeout_seconds: default_request_timeout(),
            server_time_timeout_ms: default_server_time_timeout(),
            order_timeout_seconds: default_order_timeout(),
            handshake_timeout_seconds: default_handshake_timeout(),
            recv_window_ms: default_recv_window(),
        }
    }
}

impl AppSettings {
    pub fn rest_timeouts(&self) -> RestTimeouts {
        RestTimeouts {
            request: Duration::from_secs(self.request_timeout_seconds),
            server_time: Duration::from_millis(self.server_time_timeout_ms),
            order: Duration::from_secs(self.order_timeout_seconds),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_seconds)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reconnect_delay() -> u64 {
    5000
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30
}

fn default_server_time_timeout() -> u64 {
    5000
}

fn default_order_timeout() -> u64 {
    10
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_recv_window() -> u64 {
    60_000
}
