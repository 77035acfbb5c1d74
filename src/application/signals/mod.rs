pub mod aggregate;
pub mod breakout;
pub mod indicators;
pub mod trend;
pub mod volatility;

pub use aggregate::{apply_cognitive_filter, compute_signals, default_strategy_weights, summarize, AggregateSummary};
