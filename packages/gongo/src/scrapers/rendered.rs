//! JavaScript-rendered variant.
//!
//! Listing pages that only exist after client-side script runs are obtained
//! through the [`PageRenderer`] black box; the rendered HTML then flows
//! through the same table-parsing contract. Detail pages are fetched with
//! plain HTTP, which is faster and almost always sufficient.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use url::Url;

use crate::config::{Defaults, SiteConfig};
use crate::core::{Announcement, Attachment, Detail, SiteScraper};
use crate::error::{ConfigError, ScrapeError};
use crate::http;
use crate::scrapers::TableScraper;

#[derive(Debug, Error)]
#[error("render failed: {0}")]
pub struct RenderError(pub String);

/// Headless-browser collaborator: load `url`, optionally wait for
/// `wait_for` to appear in the DOM, return the rendered HTML. Browser
/// internals are out of scope; embedders inject their own engine via
/// [`crate::registry::SiteRegistry::with_renderer`].
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str, wait_for: Option<&str>) -> Result<String, RenderError>;
}

/// Plain-HTTP fallback renderer. Good enough for sites whose "JavaScript"
/// is progressive enhancement over server-rendered markup; real SPA boards
/// need a browser-backed implementation injected instead.
pub struct HttpRenderer {
    client: reqwest::Client,
}

impl HttpRenderer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &str, wait_for: Option<&str>) -> Result<String, RenderError> {
        if let Some(selector) = wait_for {
            tracing::debug!(url, selector, "HttpRenderer cannot wait for selectors, plain GET");
        }
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RenderError(format!("GET {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RenderError(format!("HTTP {status} for {url}")));
        }
        response
            .text()
            .await
            .map_err(|e| RenderError(format!("body of {url}: {e}")))
    }
}

pub struct RenderedScraper {
    inner: TableScraper,
    renderer: Arc<dyn PageRenderer>,
}

impl RenderedScraper {
    pub fn from_config(
        site: SiteConfig,
        defaults: &Defaults,
        renderer: Arc<dyn PageRenderer>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: TableScraper::from_config(site, defaults)?,
            renderer,
        })
    }
}

#[async_trait]
impl SiteScraper for RenderedScraper {
    fn config(&self) -> &SiteConfig {
        self.inner.config()
    }

    fn defaults(&self) -> &Defaults {
        self.inner.defaults()
    }

    fn client(&self) -> &reqwest::Client {
        self.inner.client()
    }

    fn list_url(&self, page: u32) -> String {
        self.inner.list_url(page)
    }

    async fn fetch_list_page(&self, page: u32) -> Result<String, ScrapeError> {
        let site = self.config();
        let url = self.list_url(page);
        let wait_for = site.selectors.wait_for.as_deref();
        self.renderer
            .render(&url, wait_for)
            .await
            .map_err(|e| ScrapeError::request(&site.code, e.to_string()))
    }

    fn parse_list_page(&self, raw: &str) -> Vec<Announcement> {
        self.inner.parse_list_page(raw)
    }

    async fn fetch_detail(&self, announcement: &Announcement) -> Result<String, ScrapeError> {
        // Detail pages are usually static; skip the browser round-trip.
        http::fetch_text(self.client(), self.config(), &announcement.url).await
    }

    fn parse_detail_page(&self, raw: &str, url: &str) -> Detail {
        self.inner.parse_detail_page(raw, url)
    }

    fn extract_attachments(&self, html: &str, base: &Url) -> Vec<Attachment> {
        self.inner.extract_attachments(html, base)
    }
}
