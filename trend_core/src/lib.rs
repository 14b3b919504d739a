pub mod analyzer;
pub mod candles;
pub mod config;
pub mod error;
pub mod market;
pub mod report;
pub mod scheduler;
pub mod ta;
