//! Ranks symbols by the size of their latest move.

use crate::domain::market::quote::Mover;
use crate::domain::ports::MarketDataSource;
use futures::future::join_all;
use tracing::{info, warn};

pub const DEFAULT_MOVER_SYMBOLS: [&str; 5] = ["AAPL", "MSFT", "GOOGL", "AMZN", "TSLA"];

/// Queries a quote for every symbol and returns the movers sorted by absolute
/// percentage change, largest first. Symbols whose quote cannot be fetched
/// are left out.
pub async fn identify_top_movers(source: &dyn MarketDataSource, symbols: &[String]) -> Vec<Mover> {
    let quotes = join_all(symbols.iter().map(|s| source.fetch_quote(s))).await;

    let mut movers: Vec<Mover> = symbols
        .iter()
        .zip(quotes)
        .filter_map(|(symbol, quote)| match quote {
            Ok(quote) => Some(Mover {
                symbol: quote.symbol,
                change_pct: quote.change_pct,
            }),
            Err(e) => {
                warn!("Skipping {} in top movers: {}", symbol, e);
                None
            }
        })
        .collect();

    movers.sort_by(|a, b| b.change_pct.abs().total_cmp(&a.change_pct.abs()));
    info!("Identified {} top movers", movers.len());
    movers
}

pub fn default_mover_symbols() -> Vec<String> {
    DEFAULT_MOVER_SYMBOLS.iter().map(|s| s.to_string()).collect()
}
