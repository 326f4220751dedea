pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod filename;
pub mod http;
pub mod registry;
pub mod scrapers;
pub mod walker;

pub use crate::core::{Announcement, Attachment, Detail, DownloadMethod, SiteScraper};

pub use crate::config::{Config, Defaults, SiteConfig, SiteKind};
pub use crate::engine::{RunResult, RunStatus, ScrapeEngine};
pub use crate::error::{ConfigError, Error, ScrapeError, ScrapeErrorKind};
pub use crate::registry::SiteRegistry;
