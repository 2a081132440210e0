pub mod config;
pub mod init;

pub use config::LoggingConfig;
pub use init::{init, LoggingGuards};
