//! Data model and the polymorphic scraper contract.

pub mod ledger;
pub mod output;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use indexmap::IndexMap;
use scraper::Html;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{Defaults, PageStyle, SiteConfig};
use crate::error::ScrapeError;
use crate::http;

/// Placeholder body used when a detail page yields nothing parseable.
pub const PLACEHOLDER_CONTENT: &str = "본문 내용을 추출할 수 없습니다.";

/// One listed item on a site's listing page. Only `title` and `url` are
/// required; everything else is site-dependent and rides along into the
/// content.md metadata header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub title: String,
    /// Absolute detail-page URL, or an API key the variant knows how to use.
    pub url: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub views: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub has_attachment: bool,
    /// Site-specific passthrough fields (status, deadline, board_num, ...).
    #[serde(default)]
    pub extra: IndexMap<String, String>,
}

impl Announcement {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn is_usable(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }
}

/// Parsed detail page: markdown body plus attachments, with an optional
/// re-extracted title that overrides the listing title for folder naming.
#[derive(Debug, Clone, Default)]
pub struct Detail {
    pub title: Option<String>,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl Detail {
    pub fn placeholder() -> Self {
        Self {
            title: None,
            content: PLACEHOLDER_CONTENT.to_string(),
            attachments: vec![],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMethod {
    #[default]
    Get,
    /// Form-POST download; params carry the site-specific identifiers
    /// (file_id, board_num, seq, ...) the endpoint expects.
    Post { params: Vec<(String, String)> },
}

/// One downloadable file referenced from a detail page. The display name is
/// a hint only; the on-disk name comes from the download response headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: Option<String>,
    pub url: String,
    #[serde(default)]
    pub method: DownloadMethod,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl Attachment {
    pub fn new(name: Option<String>, url: impl Into<String>) -> Self {
        let url = url.into();
        let mime_type = name
            .as_deref()
            .and_then(|n| mime_guess::from_path(n).first())
            .map(|m| m.essence_str().to_string());
        Self {
            name,
            url,
            method: DownloadMethod::Get,
            mime_type,
        }
    }
}

/// The contract every site scraper implements. The three variants in
/// [`crate::scrapers`] cover most sites from configuration alone; bespoke
/// site modules implement (or wrap) this trait and register a factory.
///
/// Transport defaults live here so that site modules only supply parsing
/// and download-URL logic.
#[async_trait]
pub trait SiteScraper: Send + Sync {
    fn config(&self) -> &SiteConfig;

    /// Global defaults captured at construction, for layered option
    /// resolution (delays, thresholds, timeouts).
    fn defaults(&self) -> &Defaults;

    /// One persistent session (with cookie jar) per scraper instance.
    fn client(&self) -> &reqwest::Client;

    /// Build the URL for a 1-indexed listing page from the pagination
    /// recipe. Sites with exotic schemes override this.
    fn list_url(&self, page: u32) -> String {
        paged_list_url(self.config(), page)
    }

    /// Fetch one page of raw listing content (HTML or JSON).
    async fn fetch_list_page(&self, page: u32) -> Result<String, ScrapeError> {
        http::fetch_text(self.client(), self.config(), &self.list_url(page)).await
    }

    /// Parse one page of listing content. Tolerant: unrecognized structure
    /// yields an empty list and a warning, never an error.
    fn parse_list_page(&self, raw: &str) -> Vec<Announcement>;

    /// Fetch the detail page (or API record) for one announcement.
    async fn fetch_detail(&self, announcement: &Announcement) -> Result<String, ScrapeError> {
        http::fetch_text(self.client(), self.config(), &announcement.url).await
    }

    /// Parse a detail payload into markdown content plus attachments.
    /// Tolerant: failures produce placeholder content, never an error.
    fn parse_detail_page(&self, raw: &str, url: &str) -> Detail;

    /// Locate downloadable-file links in a detail page. The default
    /// heuristic looks for file-extension suffixes and download-path
    /// markers; variants and site modules override for selector- or
    /// script-driven sites.
    fn extract_attachments(&self, html: &str, base: &Url) -> Vec<Attachment> {
        crate::scrapers::extract_attachments_heuristic(&Html::parse_document(html), base)
    }

    /// Stream one attachment into `dir`, returning the path written.
    async fn download(&self, attachment: &Attachment, dir: &Path) -> Result<PathBuf, ScrapeError> {
        http::download_to_file(self.client(), self.config(), self.defaults(), attachment, dir)
            .await
    }
}

/// Default list-URL synthesis from a pagination recipe.
pub fn paged_list_url(site: &SiteConfig, page: u32) -> String {
    let base = site.list_url();
    let pagination = &site.pagination;
    match pagination.style {
        PageStyle::None => base.to_string(),
        PageStyle::Path => format!("{}/page/{page}", base.trim_end_matches('/')),
        PageStyle::Query => append_query(base, pagination.param(), page),
        PageStyle::Offset => {
            let offset = (page.saturating_sub(1)) * pagination.page_size;
            append_query(base, pagination.param(), offset)
        }
    }
}

fn append_query(base: &str, param: &str, value: u32) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}{param}={value}")
}
