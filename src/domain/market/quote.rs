use serde::{Deserialize, Serialize};

/// Latest quote snapshot of a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    /// Change versus previous close, in percent (1.5 = +1.5%).
    pub change_pct: f64,
}

/// A symbol ranked by the size of its move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mover {
    pub symbol: String,
    pub change_pct: f64,
}
