//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::{AppConfig, AppSettings, ExchangeConfig};
use crate::common::errors::{ClientError, Result};
use crate::strategy::default_strategies;

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with APP__, e.g. `APP__BLOCKFIN__API_KEY`)
/// 2. Configuration file (TOML format)
/// 3. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ClientError::Configuration(e.to_string()))?;

    let app: AppConfig = config
        .try_deserialize()
        .map_err(|e| ClientError::Configuration(e.to_string()))?;

    for setting in &app.strategies {
        setting.validate()?;
    }
    Ok(app)
}

/// Load configuration from the per-exchange environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

    let binance = ExchangeConfig {
        api_key: var("BINANCE_API_KEY"),
        api_secret: var("BINANCE_API_SECRET"),
        base_url: var("BINANCE_BASE_URL"),
        ws_base_url: var("BINANCE_WS_STREAM_BASE_URL"),
        ..Default::default()
    };

    let bitget = ExchangeConfig {
        api_key: var("BITGET_API_KEY"),
        api_secret: var("BITGET_API_SECRET"),
        api_passphrase: var("BITGET_API_PASSPHRASE"),
        base_url: var("BITGET_BASE_URL"),
        ws_base_url: var("BITGET_WS_BASE_URL"),
        ..Default::default()
    };

    let blockfin = ExchangeConfig {
        api_key: var("BLOCKFIN_API_KEY"),
        api_secret: var("BLOCKFIN_API_SECRET"),
        api_passphrase: var("BLOCKFIN_API_PASSPHRASE"),
        uid: var("BLOCKFIN_UID"),
        base_url: var("BLOCKFIN_BASE_URL"),
        ws_base_url: var("BLOCKFIN_WS_BASE_URL"),
        ws_private_url: var("BLOCKFIN_WS_PRIVATE_URL"),
    };

    let mut settings = AppSettings::default();
    if let Some(level) = var("LOG_LEVEL") {
        settings.log_level = level;
    }

    Ok(AppConfig {
        binance,
        bitget,
        blockfin,
        settings,
        strategies: default_strategies(),
    })
}
