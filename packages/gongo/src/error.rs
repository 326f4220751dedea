use std::borrow::Cow;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scrape(Box<ScrapeError>),

    #[error("run interrupted by user")]
    Interrupted,
}

impl From<ScrapeError> for Error {
    fn from(err: ScrapeError) -> Self {
        Error::Scrape(Box::new(err))
    }
}

/// Error raised while scraping one site. Carries the site code so that log
/// lines and run summaries stay attributable in multi-site batches.
#[derive(Debug, Error)]
#[error("[{site}] {kind:?}: {message}")]
pub struct ScrapeError {
    kind: ScrapeErrorKind,
    site: String,
    message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeErrorKind {
    Request,
    Parse,
    Download,
    Custom(Cow<'static, str>),
}

impl ScrapeError {
    pub fn request(site: &str, message: String) -> Self {
        Self {
            kind: ScrapeErrorKind::Request,
            site: site.to_string(),
            message,
        }
    }

    pub fn parse(site: &str, message: String) -> Self {
        Self {
            kind: ScrapeErrorKind::Parse,
            site: site.to_string(),
            message,
        }
    }

    pub fn download(site: &str, message: String) -> Self {
        Self {
            kind: ScrapeErrorKind::Download,
            site: site.to_string(),
            message,
        }
    }

    pub fn custom(site: &str, name: impl Into<Cow<'static, str>>, message: String) -> Self {
        Self {
            kind: ScrapeErrorKind::Custom(name.into()),
            site: site.to_string(),
            message,
        }
    }

    pub fn kind(&self) -> &ScrapeErrorKind {
        &self.kind
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Startup-time fatal conditions. These are never retried or skipped; a
/// broken configuration should surface before any network traffic happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown site code: {0}")]
    UnknownSite(String),

    #[error("site {site} references unknown scraper `{scraper}`")]
    UnknownScraper { site: String, scraper: String },

    #[error("site {site} has an invalid `{field}` selector: {message}")]
    InvalidSelector {
        site: String,
        field: &'static str,
        message: String,
    },

    #[error("site {site} is missing required field `{field}`")]
    MissingField { site: String, field: &'static str },

    #[error("failed to build HTTP client for site {site}: {message}")]
    Client { site: String, message: String },
}
