//! Declarative site configuration.
//!
//! The registry consumes a YAML document with `defaults`, `scraper_types`
//! and `sites` sections. Per-site values override the global defaults; the
//! resolution lives in a single accessor per field so that site modules do
//! not re-implement the "config value if present, else default" dance.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    StandardTable,
    AjaxApi,
    Javascript,
    SessionBased,
    Playwright,
}

impl SiteKind {
    /// Factory name used when a site does not pin an explicit scraper.
    pub fn default_scraper(self) -> &'static str {
        match self {
            SiteKind::StandardTable | SiteKind::SessionBased => "standard_table",
            SiteKind::AjaxApi => "ajax_api",
            SiteKind::Javascript | SiteKind::Playwright => "javascript",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SiteKind::StandardTable => "standard_table",
            SiteKind::AjaxApi => "ajax_api",
            SiteKind::Javascript => "javascript",
            SiteKind::SessionBased => "session_based",
            SiteKind::Playwright => "playwright",
        }
    }
}

impl FromStr for SiteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard_table" => Ok(SiteKind::StandardTable),
            "ajax_api" => Ok(SiteKind::AjaxApi),
            "javascript" => Ok(SiteKind::Javascript),
            "session_based" => Ok(SiteKind::SessionBased),
            "playwright" => Ok(SiteKind::Playwright),
            other => Err(format!("unknown site type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStyle {
    /// `?page=N` style query parameter, 1-indexed.
    #[default]
    Query,
    /// `?offset=(N-1)*page_size` style query parameter.
    Offset,
    /// `/page/N` path segment.
    Path,
    /// Single page, or the scraper builds its own URLs.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    pub style: PageStyle,
    /// Query parameter name. Sites use `page`, `pageIndex`, `pn`, `ipage`...
    pub param: Option<String>,
    pub page_size: u32,
    /// Skip-and-continue to the next page after a list-page fetch failure
    /// instead of aborting the site run.
    pub continue_on_error: bool,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            style: PageStyle::default(),
            param: None,
            page_size: 10,
            continue_on_error: false,
        }
    }
}

impl Pagination {
    pub fn param(&self) -> &str {
        self.param.as_deref().unwrap_or("page")
    }
}

/// CSS selector recipes for list and detail extraction. All optional: the
/// table variant falls back to built-in heuristics, and bespoke site modules
/// may ignore them entirely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub rows: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
    pub views: Option<String>,
    pub category: Option<String>,
    pub detail_title: Option<String>,
    pub content: Option<String>,
    pub attachments: Option<String>,
    /// Selector the rendered variant waits for before reading the DOM.
    pub wait_for: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMethod {
    #[default]
    Get,
    Post,
}

/// Field mapping from an API item object to an announcement. Values are
/// JSON pointers (`/a/b`) or bare keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiFields {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
    pub views: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiAttachmentFields {
    /// Pointer to the attachment array within the detail response.
    pub items: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub method: ApiMethod,
    /// JSON POST body template. `{page}` in string values is substituted.
    pub body: Option<serde_json::Value>,
    /// Query parameter carrying the page number for GET APIs.
    pub page_param: Option<String>,
    /// JSON pointer to the item array in the list response.
    pub items: String,
    pub fields: ApiFields,
    /// Detail endpoint template; `{id}` and `{url}` are substituted. When
    /// absent the announcement URL is fetched and parsed as HTML.
    pub detail_url: Option<String>,
    /// Pointer to the body text/HTML in the detail response.
    pub content: Option<String>,
    pub attachments: ApiAttachmentFields,
    /// false = the endpoint returns the full result set regardless of page;
    /// the first response is cached and later pages are served empty.
    pub paged: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            method: ApiMethod::default(),
            body: None,
            page_param: None,
            items: "/items".to_string(),
            fields: ApiFields::default(),
            detail_url: None,
            content: None,
            attachments: ApiAttachmentFields::default(),
            paged: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Unique key; injected from the `sites` map key at load time.
    #[serde(skip)]
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SiteKind,
    /// Explicit factory name; defaults to the variant implied by `type`.
    #[serde(default)]
    pub scraper: Option<String>,
    pub base_url: String,
    #[serde(default)]
    pub list_url: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    /// "auto" lets the HTTP layer honor the response charset; an explicit
    /// label (e.g. "euc-kr") forces that decode.
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_true")]
    pub ssl_verify: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub download_timeout_secs: Option<u64>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub selectors: Selectors,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub duplicate_threshold: Option<u32>,
    #[serde(default)]
    pub delay_between_requests_ms: Option<u64>,
    #[serde(default)]
    pub delay_between_pages_ms: Option<u64>,
}

fn default_encoding() -> String {
    "auto".to_string()
}

fn default_true() -> bool {
    true
}

impl SiteConfig {
    /// Minimal config for programmatic registration (`add_site`) and tests.
    pub fn new(code: &str, name: &str, kind: SiteKind, base_url: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            kind,
            scraper: None,
            base_url: base_url.to_string(),
            list_url: None,
            api_url: None,
            encoding: default_encoding(),
            ssl_verify: true,
            timeout_secs: None,
            download_timeout_secs: None,
            pagination: Pagination::default(),
            selectors: Selectors::default(),
            api: None,
            headers: IndexMap::new(),
            duplicate_threshold: None,
            delay_between_requests_ms: None,
            delay_between_pages_ms: None,
        }
    }

    pub fn list_url(&self) -> &str {
        self.list_url.as_deref().unwrap_or(&self.base_url)
    }

    pub fn scraper_name(&self) -> &str {
        self.scraper
            .as_deref()
            .unwrap_or_else(|| self.kind.default_scraper())
    }

    pub fn duplicate_threshold(&self, defaults: &Defaults) -> u32 {
        self.duplicate_threshold
            .unwrap_or(defaults.duplicate_threshold)
    }

    pub fn request_delay(&self, defaults: &Defaults) -> Duration {
        Duration::from_millis(
            self.delay_between_requests_ms
                .unwrap_or(defaults.delay_between_requests_ms),
        )
    }

    pub fn page_delay(&self, defaults: &Defaults) -> Duration {
        Duration::from_millis(
            self.delay_between_pages_ms
                .unwrap_or(defaults.delay_between_pages_ms),
        )
    }

    pub fn timeout(&self, defaults: &Defaults) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(defaults.timeout_secs))
    }

    pub fn download_timeout(&self, defaults: &Defaults) -> Duration {
        Duration::from_secs(
            self.download_timeout_secs
                .unwrap_or(defaults.download_timeout_secs),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub max_pages: u32,
    pub output_dir: PathBuf,
    pub delay_between_requests_ms: u64,
    pub delay_between_pages_ms: u64,
    pub delay_between_sites_ms: u64,
    pub duplicate_threshold: u32,
    pub timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            max_pages: 3,
            output_dir: PathBuf::from("output"),
            delay_between_requests_ms: 500,
            delay_between_pages_ms: 1000,
            delay_between_sites_ms: 2000,
            duplicate_threshold: 3,
            timeout_secs: 30,
            download_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    /// type code -> human description, for `--list` output.
    #[serde(default)]
    pub scraper_types: IndexMap<String, String>,
    #[serde(default)]
    pub sites: IndexMap<String, SiteConfig>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(text)?;
        for (code, site) in config.sites.iter_mut() {
            site.code = code.clone();
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
defaults:
  max_pages: 5
  output_dir: scraped
scraper_types:
  standard_table: "server-rendered HTML table"
  ajax_api: "JSON API listing"
sites:
  btp:
    name: "부산테크노파크"
    type: standard_table
    base_url: "https://www.btp.or.kr"
    list_url: "https://www.btp.or.kr/kor/CMS/Board/Board.do?mCode=MN013"
    selectors:
      rows: "table.bbs_list tbody tr"
      title: "td.title a"
  kocca:
    name: "한국콘텐츠진흥원"
    type: ajax_api
    base_url: "https://www.kocca.kr"
    api_url: "https://www.kocca.kr/api/notice/list.json"
    encoding: euc-kr
    ssl_verify: false
    pagination:
      style: offset
      param: startPos
      page_size: 15
    api:
      items: "/result/list"
      fields:
        title: bbsTitle
        id: bbsSeq
"#;

    #[test]
    fn parses_sample_config() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.defaults.max_pages, 5);
        assert_eq!(config.sites.len(), 2);

        let btp = &config.sites["btp"];
        assert_eq!(btp.code, "btp");
        assert_eq!(btp.kind, SiteKind::StandardTable);
        assert_eq!(btp.scraper_name(), "standard_table");
        assert!(btp.ssl_verify);
        assert_eq!(
            btp.selectors.rows.as_deref(),
            Some("table.bbs_list tbody tr")
        );

        let kocca = &config.sites["kocca"];
        assert_eq!(kocca.encoding, "euc-kr");
        assert!(!kocca.ssl_verify);
        assert_eq!(kocca.pagination.style, PageStyle::Offset);
        assert_eq!(kocca.pagination.param(), "startPos");
        assert_eq!(kocca.api.as_ref().unwrap().items, "/result/list");
    }

    #[test]
    fn layered_resolution_prefers_site_values() {
        let defaults = Defaults::default();
        let mut site = SiteConfig::new("t", "테스트", SiteKind::StandardTable, "https://e.kr");
        assert_eq!(site.duplicate_threshold(&defaults), 3);
        assert_eq!(site.request_delay(&defaults), Duration::from_millis(500));

        site.duplicate_threshold = Some(5);
        site.delay_between_requests_ms = Some(50);
        assert_eq!(site.duplicate_threshold(&defaults), 5);
        assert_eq!(site.request_delay(&defaults), Duration::from_millis(50));
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = Config::load(Path::new("/nonexistent/sites.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
