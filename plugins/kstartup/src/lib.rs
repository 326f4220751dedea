//! K-Startup (창업지원포털) site module.
//!
//! The announcement API returns full records, body text included, so the
//! detail "fetch" is a lookup into the records kept from list parsing
//! rather than another HTTP round-trip.

mod model;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use gongo::config::{Defaults, SiteConfig};
use gongo::core::{Announcement, Detail, SiteScraper};
use gongo::error::{ConfigError, ScrapeError};
use gongo::http;

pub use crate::model::{KstartupItem, KstartupListResponse};

const PER_PAGE: u32 = 20;

pub struct KstartupScraper {
    site: SiteConfig,
    defaults: Defaults,
    client: reqwest::Client,
    /// Records from list parsing, keyed by detail URL.
    items: Mutex<HashMap<String, KstartupItem>>,
}

impl KstartupScraper {
    pub fn from_config(site: SiteConfig, defaults: &Defaults) -> Result<Self, ConfigError> {
        if site.api_url.is_none() {
            return Err(ConfigError::MissingField {
                site: site.code.clone(),
                field: "api_url",
            });
        }
        let client = http::build_client(&site, defaults)?;
        Ok(Self {
            site,
            defaults: defaults.clone(),
            client,
            items: Mutex::new(HashMap::new()),
        })
    }

    fn item_to_announcement(&self, item: &KstartupItem) -> Option<Announcement> {
        let url = item.detail_url()?;
        let mut announcement = Announcement::new(item.biz_pbanc_nm.trim(), url);
        announcement.author = item.pbanc_ntrp_nm.clone();
        announcement.category = item.supt_biz_clsfc.clone();
        if let Some(period) = item.reception_period() {
            announcement.extra.insert("접수기간".to_string(), period);
        }
        announcement.is_usable().then_some(announcement)
    }
}

#[async_trait]
impl SiteScraper for KstartupScraper {
    fn config(&self) -> &SiteConfig {
        &self.site
    }

    fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn list_url(&self, page: u32) -> String {
        let api_url = self.site.api_url.as_deref().expect("checked in from_config");
        let sep = if api_url.contains('?') { '&' } else { '?' };
        format!("{api_url}{sep}page={page}&perPage={PER_PAGE}&returnType=json")
    }

    fn parse_list_page(&self, raw: &str) -> Vec<Announcement> {
        let response: KstartupListResponse = match serde_json::from_str(raw) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(site = %self.site.code, error = %e, "unexpected API response shape");
                return vec![];
            }
        };

        let mut items = self.items.lock().expect("items lock");
        response
            .data
            .iter()
            .filter_map(|item| {
                let announcement = self.item_to_announcement(item);
                match &announcement {
                    Some(announcement) => {
                        items.insert(announcement.url.clone(), item.clone());
                    }
                    None => {
                        tracing::warn!(site = %self.site.code, "dropping record without title/url");
                    }
                }
                announcement
            })
            .collect()
    }

    /// The list response already carries the body; serve the stored record
    /// instead of fetching the (JavaScript-heavy) detail page.
    async fn fetch_detail(&self, announcement: &Announcement) -> Result<String, ScrapeError> {
        let item = self
            .items
            .lock()
            .expect("items lock")
            .get(&announcement.url)
            .cloned();
        match item {
            Some(item) => serde_json::to_string(&item).map_err(|e| {
                ScrapeError::parse(&self.site.code, format!("re-serialize record: {e}"))
            }),
            None => Err(ScrapeError::custom(
                &self.site.code,
                "RecordMissing",
                format!("no stored record for {}", announcement.url),
            )),
        }
    }

    fn parse_detail_page(&self, raw: &str, url: &str) -> Detail {
        match serde_json::from_str::<KstartupItem>(raw) {
            Ok(item) => Detail {
                title: Some(item.biz_pbanc_nm.trim().to_string()).filter(|t| !t.is_empty()),
                content: item.pbanc_ctnt.trim().to_string(),
                attachments: vec![],
            },
            Err(e) => {
                tracing::warn!(site = %self.site.code, url, error = %e, "record not parseable");
                Detail::placeholder()
            }
        }
    }
}
