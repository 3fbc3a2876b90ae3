pub mod logger;
pub use logger::Severity;

pub mod runner;
pub use runner::{Mode, Report};
