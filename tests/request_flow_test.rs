use chrono::{Duration, Utc};
use marketcast::application::market_data::top_movers::identify_top_movers;
use marketcast::application::ml::model_lifecycle::{LifecycleSettings, ModelLifecycleManager};
use marketcast::application::ml::sequence_model::ModelConfig;
use marketcast::domain::market::ohlcv::{Bar, OhlcvSeries};
use marketcast::domain::market::quote::Quote;
use marketcast::infrastructure::{InMemoryMarketDataSource, InMemoryModelRepository};
use marketcast::interfaces::api::{ApiError, PredictRequest, RequestError, handle_predict};
use serde_json::json;
use std::sync::Arc;

fn quote(symbol: &str, change_pct: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        price: 100.0,
        change_pct,
    }
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_top_movers_ranked_by_absolute_change() {
    let source = InMemoryMarketDataSource::new()
        .with_quote(quote("AAPL", 1.2))
        .with_quote(quote("MSFT", -3.4))
        .with_quote(quote("AMZN", 0.1))
        .with_quote(quote("TSLA", 2.5));

    let movers = identify_top_movers(&source, &symbols(&["AAPL", "MSFT", "AMZN", "TSLA"])).await;
    let ranked: Vec<(&str, f64)> = movers.iter().map(|m| (m.symbol.as_str(), m.change_pct)).collect();
    assert_eq!(
        ranked,
        vec![("MSFT", -3.4), ("TSLA", 2.5), ("AAPL", 1.2), ("AMZN", 0.1)]
    );
}

#[tokio::test]
async fn test_top_movers_skip_failed_symbols() {
    let source = InMemoryMarketDataSource::new()
        .with_quote(quote("AAPL", 0.4))
        .with_quote(quote("GOOGL", -0.9))
        .with_failure("GOOGL");

    let movers = identify_top_movers(&source, &symbols(&["AAPL", "GOOGL", "NFLX"])).await;
    assert_eq!(movers.len(), 1);
    assert_eq!(movers[0].symbol, "AAPL");

    assert!(identify_top_movers(&source, &[]).await.is_empty());
}

fn request_json(records: usize) -> serde_json::Value {
    let start = Utc::now() - Duration::hours(12);
    let data: Vec<_> = (0..records)
        .map(|i| {
            let close = 444.0 + (i as f64 * 0.3).sin();
            json!({
                "symbol": "SPY",
                "timestamp": (start + Duration::minutes(5 * i as i64)).to_rfc3339(),
                "open": close - 0.2, "high": close + 0.5, "low": close - 0.5,
                "close": close, "volume": 3_000_000.0 + i as f64 * 10.0
            })
        })
        .collect();
    json!({"symbol": "SPY", "days": 30, "marketData": data})
}

async fn manager(training_bars: usize) -> (ModelLifecycleManager, InMemoryMarketDataSource) {
    let now = Utc::now();
    let bars = (0..training_bars)
        .map(|i| {
            let c = 440.0 + (i as f64 * 0.17).cos() * 2.5;
            Bar {
                timestamp: now - Duration::minutes(5 * (training_bars - i) as i64),
                open: c,
                high: c + 0.3,
                low: c - 0.3,
                close: c,
                volume: 15_000.0 + (i % 5) as f64 * 500.0,
            }
        })
        .collect();
    let source = InMemoryMarketDataSource::new()
        .with_series("SPY", OhlcvSeries::new(bars).unwrap());
    let settings = LifecycleSettings {
        model: ModelConfig {
            look_back: 12,
            lstm1_units: 6,
            lstm2_units: 4,
            dense_units: 3,
            epochs: 1,
            batch_size: 32,
            ..ModelConfig::default()
        },
        ..LifecycleSettings::default()
    };
    let manager = ModelLifecycleManager::initialize(
        Arc::new(InMemoryModelRepository::new()),
        Arc::new(source.clone()),
        settings,
    )
    .await;
    (manager, source)
}

#[tokio::test]
async fn test_predict_request_produces_three_horizons() {
    let (manager, _) = manager(240).await;
    let request: PredictRequest = serde_json::from_value(request_json(30)).unwrap();

    let response = handle_predict(&manager, &request).await.unwrap();
    assert_eq!(response.symbol, "SPY");
    let labels: Vec<&str> = response.predictions.keys().map(String::as_str).collect();
    assert_eq!(labels, vec!["15min", "30min", "60min"]);
    assert!(response.predictions.values().all(|p| p.is_finite()));
}

#[tokio::test]
async fn test_twenty_nine_records_never_reach_the_model() {
    let (manager, source) = manager(240).await;
    let request: PredictRequest = serde_json::from_value(request_json(29)).unwrap();

    let err = handle_predict(&manager, &request).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Request(RequestError::TooFewRecords {
            required: 30,
            got: 29
        })
    );
    assert_eq!(err.status_code(), 400);
    assert_eq!(source.ohlcv_fetches(), 0);
    assert!(manager.current().is_none());
}

#[tokio::test]
async fn test_record_with_null_field_is_rejected() {
    let (manager, source) = manager(240).await;
    let mut body = request_json(30);
    body["marketData"][4]["volume"] = serde_json::Value::Null;
    let request: PredictRequest = serde_json::from_value(body).unwrap();

    let err = handle_predict(&manager, &request).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Request(RequestError::MissingField {
            index: 4,
            field: "volume"
        })
    ));
    assert_eq!(source.ohlcv_fetches(), 0);
}
