pub mod dto;
pub mod handler;

pub use dto::SkipReason;
pub use handler::TimeframeAnalyzer;
