use serde::{Deserialize, Serialize};

/// A single long position, valued at a mark price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub unrealized_pnl: f64,
}

/// A point-in-time view of the paper-trade account, derived by replaying
/// the trade log. Never persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub available: f64,
    pub exposure_pct: f64,
    pub daily_pnl_pct: f64,
    pub realized_pnl: f64,
    pub positions: Vec<Position>,
}

/// The internal replay state the ledger reconstructs from the trade log.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccountState {
    pub cash: f64,
    pub position_qty: f64,
    pub avg_entry_price: f64,
    pub realized_pnl: f64,
    pub day_realized_pnl: f64,
}
