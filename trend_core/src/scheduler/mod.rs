pub mod dto;
pub mod pacer;
pub mod runner;

pub use dto::{CycleOutcome, SchedulingState};
pub use pacer::RequestPacer;
pub use runner::{next_wake_delay, CandleCloseScheduler};
