pub mod market_data;
pub mod mind_store;
pub mod persistence;
