pub mod candle;
pub mod decision;
pub mod errors;
pub mod mind;
pub mod portfolio;
pub mod signal;
pub mod trade;
