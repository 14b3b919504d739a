pub mod dto;

pub use dto::{Candle, CandleSeries, RawCandle, Timeframe};
