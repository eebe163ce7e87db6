//! marketcast - market analysis command line
//!
//! Trains and serves the multi-horizon price forecaster and runs the
//! indicator-based sentiment and alert heuristics over local bar files.
//!
//! # Usage
//! ```sh
//! MARKET_API_KEY=... marketcast train
//! marketcast predict --input request.json
//! marketcast alerts --input bars.csv
//! ```
//!
//! # Environment Variables
//! - `MARKET_API_KEY` - Alpha Vantage key (needed for `train` without
//!   `--input` and for `movers`)
//! - `MODEL_DIR`, `MODEL_KEY` - Where the model bundle is stored
//! - `RUST_LOG` - Log filter (default: info)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use marketcast::application::analysis::alert_generator::generate_alerts;
use marketcast::application::analysis::sentiment_scorer::{
    DEFAULT_SENTIMENT_LOOKBACK, score_sentiment,
};
use marketcast::application::market_data::indicator_engine::compute_indicators;
use marketcast::application::market_data::top_movers::{
    default_mover_symbols, identify_top_movers,
};
use marketcast::application::ml::model_lifecycle::ModelLifecycleManager;
use marketcast::config::Config;
use marketcast::domain::ports::MarketDataSource;
use marketcast::infrastructure::{
    AlphaVantageMarketDataSource, FileModelRepository, InMemoryMarketDataSource,
};
use marketcast::interfaces::api::{
    ErrorResponse, HealthReport, PredictResponse, handle_predict,
};
use marketcast::interfaces::bar_files::{load_series, read_request};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a new model bundle and store it
    Train {
        /// Train on local bars (.json request or .csv) instead of fetching
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Forecast prices for the 15/30/60 minute horizons
    Predict {
        /// Prediction request (.json) or bars (.csv)
        #[arg(long)]
        input: PathBuf,
    },
    /// Score market sentiment from the latest bars
    Sentiment {
        #[arg(long)]
        input: PathBuf,
        /// Number of most recent rows to score
        #[arg(long, default_value_t = DEFAULT_SENTIMENT_LOOKBACK)]
        lookback: usize,
    },
    /// List triggered market alerts
    Alerts {
        #[arg(long)]
        input: PathBuf,
    },
    /// Rank symbols by absolute percentage change
    Movers {
        /// Comma-separated symbols (default: AAPL,MSFT,GOOGL,AMZN,TSLA)
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Report model state
    Status,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn market_source(config: &Config) -> Result<Arc<dyn MarketDataSource>> {
    match &config.market_data.api_key {
        Some(key) => {
            let source = AlphaVantageMarketDataSource::builder()
                .api_key(key.clone())
                .base_url(config.market_data.base_url.clone())
                .timeout(config.market_data.request_timeout)
                .build()?;
            Ok(Arc::new(source))
        }
        None => {
            warn!("MARKET_API_KEY not set; remote market data is unavailable");
            Ok(Arc::new(InMemoryMarketDataSource::new()))
        }
    }
}

async fn lifecycle(config: &Config) -> Result<ModelLifecycleManager> {
    let store = Arc::new(FileModelRepository::new(config.model.model_dir.clone()));
    let source = market_source(config)?;
    Ok(ModelLifecycleManager::initialize(store, source, config.lifecycle_settings()).await)
}

async fn predict(config: &Config, input: PathBuf) -> Result<()> {
    let manager = lifecycle(config).await?;
    let is_request = input.extension().and_then(|e| e.to_str()) == Some("json");
    if !is_request {
        let series = load_series(&input)?;
        let forecast = manager.predict(&series).await?;
        return print_json(&PredictResponse::from_forecast(
            &config.market_data.symbol,
            &forecast,
        ));
    }

    let request = read_request(&input)?;
    match handle_predict(&manager, &request).await {
        Ok(response) => print_json(&response),
        Err(e) => {
            error!("Prediction failed ({}): {}", e.status_code(), e);
            print_json(&ErrorResponse::from(&e))?;
            Err(e.into())
        }
    }
}

async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Train { input } => {
            let manager = lifecycle(&config).await?;
            let bundle = match input {
                Some(path) => manager.train_on(load_series(&path)?).await?,
                None => manager.train().await?,
            };
            info!(
                "Model {} version {} trained: loss {:.6}, val_loss {:?}",
                bundle.model_key, bundle.version, bundle.report.train_loss, bundle.report.val_loss
            );
            print_json(&manager.status())
        }
        Command::Predict { input } => predict(&config, input).await,
        Command::Sentiment { input, lookback } => {
            let panel = compute_indicators(&load_series(&input)?)?;
            print_json(&score_sentiment(&panel, lookback))
        }
        Command::Alerts { input } => {
            let panel = compute_indicators(&load_series(&input)?)?;
            print_json(&generate_alerts(&panel))
        }
        Command::Movers { symbols } => {
            let symbols = if symbols.is_empty() {
                default_mover_symbols()
            } else {
                symbols
            };
            let source = market_source(&config)?;
            print_json(&identify_top_movers(source.as_ref(), &symbols).await)
        }
        Command::Status => {
            let manager = lifecycle(&config).await?;
            let status = manager.status();
            info!("Model state: {}", status.state);
            print_json(&HealthReport::from(&status))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays machine-readable
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stderr_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!(
        "marketcast {} ({} {} bars, model {:?})",
        env!("CARGO_PKG_VERSION"),
        config.market_data.symbol,
        config.market_data.interval,
        config.model.model_dir.join(&config.model.model_key)
    );

    run(cli.command, config).await
}
