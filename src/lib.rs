// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod adapters;
pub mod browser;
pub mod change_detector;
pub mod config;
pub mod notify;
pub mod pipeline;
pub mod record;
pub mod retry;
pub mod runner;
pub mod seen;

// ---- Re-exports for stable public API ----
pub use crate::adapters::{AdapterError, SiteAdapter};
pub use crate::browser::{BrowserError, ElementRef, Session};
pub use crate::change_detector::{detect, ChangeDetector, Detection};
pub use crate::config::{AppConfig, SourceConfig};
pub use crate::notify::{Digest, Notifier, StatusReport};
pub use crate::record::VacancyRecord;
pub use crate::runner::{run_source, RunReport};
pub use crate::seen::{SeenSet, SeenStore};
