//! ExchangeGateway - Main Entry Point
//!
//! Command-line front end for the exchange clients, the additional-entry
//! strategy and the stream relay.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use exchange_gateway::common::channels::create_relay_channel;
use exchange_gateway::config::{load_config, load_from_env};
use exchange_gateway::{
    AppConfig, BinanceClient, BitgetClient, BlockFinClient, ChannelDownstream, ClientError,
    Exchange, ExchangeClient, OrderPipeline, StrategyEngine, StrategyStore, StreamRelay,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file; falls back to environment variables when absent
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print nonzero balances
    Balances { exchange: Exchange },
    /// Print the top of an order book
    Book { exchange: Exchange, inst_id: String },
    /// Open the first rung of a configured strategy on BlockFin
    Enter { strategy: String },
    /// Watch BlockFin position pushes and add entries as ROI crosses each rung
    Monitor {
        /// Strategies to enter before monitoring; repeat for several
        #[arg(long)]
        enter: Vec<String>,
    },
    /// Relay an exchange channel to stdout
    Relay {
        exchange: Exchange,
        channel: String,
        inst_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting ExchangeGateway");

    let config = if Path::new(&args.config).exists() {
        info!("Configuration file: {}", args.config);
        load_config(Some(&args.config))?
    } else {
        info!("No configuration file, reading environment");
        load_from_env()?
    };

    match args.command {
        Command::Balances { exchange } => {
            let client = build_client(&config, exchange)?;
            for balance in client.get_balances().await? {
                println!(
                    "{:<10} available={} locked={}",
                    balance.asset, balance.available, balance.locked
                );
            }
        }
        Command::Book { exchange, inst_id } => {
            let client = build_client(&config, exchange)?;
            let book = client.get_order_book(&inst_id).await?;
            println!(
                "{} {} bid={:?} ask={:?} mid={:?}",
                exchange,
                book.inst_id,
                book.best_bid().map(|l| l.price),
                book.best_ask().map(|l| l.price),
                book.midpoint()
            );
        }
        Command::Enter { strategy } => {
            let engine = build_engine(&config)?.1;
            let outcome = engine.enter_position(&strategy).await?;
            println!("{:?}", outcome);
        }
        Command::Monitor { enter } => monitor(&config, &enter).await?,
        Command::Relay {
            exchange,
            channel,
            inst_id,
        } => relay(&config, exchange, &channel, &inst_id).await?,
    }

    Ok(())
}

fn build_client(config: &AppConfig, exchange: Exchange) -> Result<Box<dyn ExchangeClient>> {
    let settings = &config.settings;
    let client: Box<dyn ExchangeClient> = match exchange {
        Exchange::Binance => Box::new(BinanceClient::from_config(&config.binance, settings)?),
        Exchange::Bitget => Box::new(BitgetClient::from_config(&config.bitget, settings)?),
        Exchange::BlockFin => Box::new(BlockFinClient::from_config(&config.blockfin, settings)?),
    };
    Ok(client)
}

fn build_engine(config: &AppConfig) -> Result<(Arc<BlockFinClient>, StrategyEngine)> {
    let client = Arc::new(BlockFinClient::from_config(&config.blockfin, &config.settings)?);
    let store = Arc::new(StrategyStore::new(config.strategies.clone())?);
    let engine = StrategyEngine::new(store, OrderPipeline::new(client.clone()));
    Ok((client, engine))
}

async fn monitor(config: &AppConfig, enter: &[String]) -> Result<()> {
    let (client, engine) = build_engine(config)?;
    let settings = &config.settings;

    for (id, result) in engine.enter_all(enter).await {
        match result {
            Ok(outcome) => println!("{}: {:?}", id, outcome),
            Err(e) => warn!("{} was not entered: {}", id, e),
        }
    }
    info!("Monitoring {} strategies", engine.store().len());

    let mut attempts = 0u32;
    loop {
        let session = async {
            match client.position_stream("").await {
                Ok(stream) => {
                    let summary = engine.monitor(stream).await;
                    info!("Monitor session ended: {:?}", summary);
                    Ok(())
                }
                Err(e @ (ClientError::Authentication(_) | ClientError::Signing(_))) => Err(e),
                Err(e) => {
                    error!("Failed to open position stream: {}", e);
                    Ok(())
                }
            }
        };

        tokio::select! {
            result = session => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, cleaning up...");
                return Ok(());
            }
        }

        attempts += 1;
        if settings.max_reconnect_attempts > 0 && attempts >= settings.max_reconnect_attempts {
            warn!("Giving up after {} reconnect attempts", attempts);
            return Ok(());
        }
        info!("Reconnecting in {:?}", settings.reconnect_delay());
        tokio::time::sleep(settings.reconnect_delay()).await;
    }
}

async fn relay(config: &AppConfig, exchange: Exchange, channel: &str, inst_id: &str) -> Result<()> {
    let client = build_client(config, exchange)?;
    let subscription = client.channel_subscription(channel, inst_id)?;
    let stream_relay = StreamRelay::new(subscription)
        .with_heartbeat_interval(config.settings.heartbeat_interval())
        .with_handshake_timeout(config.settings.handshake_timeout());

    let (tx, mut rx) = create_relay_channel();
    let handle = stream_relay.spawn(ChannelDownstream::new(tx));

    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(text) => println!("{}", text),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, cleaning up...");
                break;
            }
        }
    }

    drop(rx);
    let report = handle.shutdown().await?;
    info!(
        "Relay finished: {:?}, {} messages forwarded",
        report.reason, report.forwarded
    );
    Ok(())
}
