pub mod indicators;
pub mod signals;
pub mod types;

pub use indicators::compute;
pub use signals::classify;
pub use types::*;
