// src/config/mod.rs
pub mod app;
pub mod source;

pub use app::AppConfig;
pub use source::{Layout, SourceConfig, Timeouts};
