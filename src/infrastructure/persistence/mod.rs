pub mod candle_repository;
pub mod database;
pub mod decision_repository;
pub mod mind_history_repository;
pub mod trade_repository;

pub use database::Database;
