pub mod config;

pub use config::{AppConfig, ClearPolicy, HistorySettings};
