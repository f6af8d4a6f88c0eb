// Logging configuration
pub mod config;

// Structured logging setup
pub mod logging;

pub use config::{LogConfig, LogFormat};
pub use logging::init_logging;
