use crate::domain::signal::Action;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A structured trading decision. Immutable once written; `timestamp` is
/// monotone non-decreasing per insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub position_size_pct: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub confidence: f64,
    pub reasoning: Value,
    pub model_used: String,
    pub input_hash: String,
}
