//! AJAX/JSON API variant.
//!
//! List (and optionally detail) data arrive as JSON from a GET/POST
//! endpoint; HTML parsing is bypassed entirely. Field mapping is driven by
//! JSON pointers from the site's `api` block. Endpoints that ignore the
//! page parameter and return everything at once are fetched once and cached.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use crate::config::{ApiConfig, ApiMethod, Defaults, SiteConfig};
use crate::core::{Announcement, Attachment, Detail, SiteScraper};
use crate::error::{ConfigError, ScrapeError};
use crate::http;

pub struct ApiScraper {
    site: SiteConfig,
    defaults: Defaults,
    client: reqwest::Client,
    /// Raw first response for unpaged endpoints.
    full_set: Mutex<Option<String>>,
}

impl ApiScraper {
    pub fn from_config(site: SiteConfig, defaults: &Defaults) -> Result<Self, ConfigError> {
        if site.api.is_none() {
            return Err(ConfigError::MissingField {
                site: site.code.clone(),
                field: "api",
            });
        }
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
            full_set: Mutex::new(None),
        })
    }

    fn api(&self) -> &ApiConfig {
        self.site.api.as_ref().expect("checked in from_config")
    }

    fn api_url(&self) -> &str {
        self.site.api_url.as_deref().expect("checked in from_config")
    }

    async fn request_page(&self, page: u32) -> Result<String, ScrapeError> {
        let api = self.api();
        let response = match api.method {
            ApiMethod::Get => {
                let url = self.list_url(page);
                self.client.get(&url).send().await.map_err(|e| {
                    ScrapeError::request(&self.site.code, format!("GET {url}: {e}"))
                })?
            }
            ApiMethod::Post => {
                let body = substitute_page(api.body.clone().unwrap_or(Value::Null), page);
                let body = serde_json::to_string(&body).map_err(|e| {
                    ScrapeError::parse(&self.site.code, format!("serialize request body: {e}"))
                })?;
                self.client
                    .post(self.api_url())
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body)
                    .send()
                    .await
                    .map_err(|e| {
                        ScrapeError::request(
                            &self.site.code,
                            format!("POST {}: {e}", self.api_url()),
                        )
                    })?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::request(
                &self.site.code,
                format!("HTTP {status} for {}", self.api_url()),
            ));
        }
        http::decode_body(response, &self.site.code, &self.site.encoding).await
    }

    fn item_to_announcement(&self, item: &Value) -> Option<Announcement> {
        let api = self.api();
        let fields = &api.fields;

        let title = lookup_string(item, fields.title.as_deref().unwrap_or("title"))?;
        let url = match &fields.url {
            Some(field) => lookup_string(item, field),
            None => None,
        }
        .or_else(|| {
            // No URL field: derive one from the detail template and the id.
            let id = lookup_string(item, fields.id.as_deref().unwrap_or("id"))?;
            api.detail_url
                .as_ref()
                .map(|template| template.replace("{id}", &id))
        })?;

        let get = |field: &Option<String>| {
            field.as_deref().and_then(|f| lookup_string(item, f))
        };

        let announcement = Announcement {
            title,
            url,
            date: get(&fields.date),
            author: get(&fields.author),
            views: get(&fields.views),
            category: get(&fields.category),
            has_attachment: false,
            extra: Default::default(),
        };
        announcement.is_usable().then_some(announcement)
    }
}

/// `{page}` substitution through a JSON body template. Numbers stay
/// numbers: a string value that is exactly "{page}" becomes a JSON number.
fn substitute_page(value: Value, page: u32) -> Value {
    match value {
        Value::String(s) if s == "{page}" => Value::from(page),
        Value::String(s) => Value::String(s.replace("{page}", &page.to_string())),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| substitute_page(v, page)).collect())
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, substitute_page(v, page)))
                .collect(),
        ),
        other => other,
    }
}

/// Field lookup: JSON pointer when the value starts with '/', bare key
/// otherwise. Numbers are stringified so `seq: 1234` works as an id.
fn lookup_string(item: &Value, field: &str) -> Option<String> {
    let value = if field.starts_with('/') {
        item.pointer(field)
    } else {
        item.get(field)
    }?;
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl SiteScraper for ApiScraper {
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
        let api = self.api();
        match (&api.method, &api.page_param) {
            (ApiMethod::Get, Some(param)) => {
                let sep = if self.api_url().contains('?') { '&' } else { '?' };
                format!("{}{sep}{param}={page}", self.api_url())
            }
            _ => self.api_url().to_string(),
        }
    }

    async fn fetch_list_page(&self, page: u32) -> Result<String, ScrapeError> {
        if self.api().paged {
            return self.request_page(page).await;
        }

        // Unpaged endpoint: the full set arrives on the first call; later
        // pages are served empty so the walker stops cleanly.
        if page > 1 {
            return Ok(String::new());
        }
        let mut cached = self.full_set.lock().await;
        if let Some(raw) = cached.as_ref() {
            return Ok(raw.clone());
        }
        let raw = self.request_page(1).await?;
        *cached = Some(raw.clone());
        Ok(raw)
    }

    fn parse_list_page(&self, raw: &str) -> Vec<Announcement> {
        if raw.trim().is_empty() {
            return vec![];
        }
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(site = %self.site.code, error = %e, "list response is not valid JSON");
                return vec![];
            }
        };
        let items = match value.pointer(&self.api().items).and_then(Value::as_array) {
            Some(items) => items,
            None => {
                tracing::warn!(
                    site = %self.site.code,
                    pointer = %self.api().items,
                    "item array not found in API response"
                );
                return vec![];
            }
        };
        items
            .iter()
            .filter_map(|item| {
                let announcement = self.item_to_announcement(item);
                if announcement.is_none() {
                    tracing::warn!(site = %self.site.code, "dropping API item without title/url");
                }
                announcement
            })
            .collect()
    }

    async fn fetch_detail(&self, announcement: &Announcement) -> Result<String, ScrapeError> {
        http::fetch_text(self.client(), &self.site, &announcement.url).await
    }

    fn parse_detail_page(&self, raw: &str, url: &str) -> Detail {
        let api = self.api();

        // JSON detail response when a content pointer is configured.
        if let Some(content_field) = &api.content {
            if let Ok(value) = serde_json::from_str::<Value>(raw) {
                let content = lookup_string(&value, content_field)
                    .map(|body| html_or_text_to_markdown(&body))
                    .unwrap_or_default();
                let attachments = json_attachments(api, &value);
                return Detail {
                    title: None,
                    content,
                    attachments,
                };
            }
            tracing::warn!(site = %self.site.code, url, "detail response is not valid JSON");
        }

        // Otherwise the announcement URL pointed at a plain HTML page.
        let base = Url::parse(url)
            .or_else(|_| Url::parse(&self.site.base_url))
            .unwrap_or_else(|_| Url::parse("http://localhost/").expect("static url"));
        let content = htmd::convert(raw).unwrap_or_default().trim().to_string();
        Detail {
            title: None,
            content,
            attachments: self.extract_attachments(raw, &base),
        }
    }
}

fn html_or_text_to_markdown(body: &str) -> String {
    if body.contains('<') {
        htmd::convert(body)
            .unwrap_or_else(|_| body.to_string())
            .trim()
            .to_string()
    } else {
        body.trim().to_string()
    }
}

fn json_attachments(api: &ApiConfig, detail: &Value) -> Vec<Attachment> {
    let Some(items_ptr) = &api.attachments.items else {
        return vec![];
    };
    let Some(items) = detail.pointer(items_ptr).and_then(Value::as_array) else {
        return vec![];
    };
    items
        .iter()
        .filter_map(|item| {
            let url = lookup_string(item, api.attachments.url.as_deref().unwrap_or("url"))?;
            let name = api
                .attachments
                .name
                .as_deref()
                .and_then(|f| lookup_string(item, f));
            Some(Attachment::new(name, url))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiFields, SiteKind};

    fn scraper() -> ApiScraper {
        let mut site = SiteConfig::new(
            "bizinfo",
            "기업마당",
            SiteKind::AjaxApi,
            "https://www.bizinfo.go.kr",
        );
        site.api_url = Some("https://www.bizinfo.go.kr/api/pblanc/list.json".to_string());
        site.api = Some(ApiConfig {
            items: "/jsonArray".to_string(),
            fields: ApiFields {
                id: Some("pblancId".to_string()),
                title: Some("pblancNm".to_string()),
                url: None,
                date: Some("creatPnttm".to_string()),
                author: Some("/excInsttNm".to_string()),
                views: None,
                category: Some("pldirSportRealmLclasCodeNm".to_string()),
            },
            detail_url: Some(
                "https://www.bizinfo.go.kr/web/lay1/bbs/view.do?id={id}".to_string(),
            ),
            ..ApiConfig::default()
        });
        ApiScraper::from_config(site, &Defaults::default()).unwrap()
    }

    const LIST_JSON: &str = r#"{
        "totalCnt": 2,
        "jsonArray": [
            {
                "pblancId": "PBLN_000001",
                "pblancNm": "2025년 창업도약패키지 지원사업",
                "creatPnttm": "2025-07-01",
                "excInsttNm": "창업진흥원",
                "pldirSportRealmLclasCodeNm": "창업"
            },
            {
                "pblancId": 20250702,
                "pblancNm": "수출바우처 2차 모집",
                "creatPnttm": "2025-07-02"
            },
            {
                "pblancNm": "  "
            }
        ]
    }"#;

    #[test]
    fn maps_json_items_to_announcements() {
        let scraper = scraper();
        let announcements = scraper.parse_list_page(LIST_JSON);
        assert_eq!(announcements.len(), 2);

        let first = &announcements[0];
        assert_eq!(first.title, "2025년 창업도약패키지 지원사업");
        assert_eq!(
            first.url,
            "https://www.bizinfo.go.kr/web/lay1/bbs/view.do?id=PBLN_000001"
        );
        assert_eq!(first.author.as_deref(), Some("창업진흥원"));
        assert_eq!(first.category.as_deref(), Some("창업"));

        // Numeric ids are stringified into the detail template.
        assert!(announcements[1].url.ends_with("id=20250702"));
    }

    #[test]
    fn invalid_json_returns_empty() {
        let scraper = scraper();
        assert!(scraper.parse_list_page("<html>오류</html>").is_empty());
        assert!(scraper.parse_list_page(r#"{"jsonArray": 3}"#).is_empty());
        assert!(scraper.parse_list_page("").is_empty());
    }

    #[test]
    fn page_substitution_keeps_numbers() {
        let body = serde_json::json!({
            "pageIndex": "{page}",
            "query": {"keyword": "", "page": "p{page}"},
            "rows": 15
        });
        let out = substitute_page(body, 3);
        assert_eq!(out["pageIndex"], serde_json::json!(3));
        assert_eq!(out["query"]["page"], serde_json::json!("p3"));
        assert_eq!(out["rows"], serde_json::json!(15));
    }

    #[test]
    fn json_detail_with_attachments() {
        let mut scraper = scraper();
        {
            let api = scraper.site.api.as_mut().unwrap();
            api.content = Some("/pblancDetail/cn".to_string());
            api.attachments.items = Some("/pblancDetail/atchFiles".to_string());
            api.attachments.name = Some("fileNm".to_string());
            api.attachments.url = Some("fileUrl".to_string());
        }

        let detail_json = r#"{
            "pblancDetail": {
                "cn": "<p>지원 대상: 7년 이내 창업기업</p>",
                "atchFiles": [
                    {"fileNm": "공고문.hwp", "fileUrl": "https://www.bizinfo.go.kr/files/1.hwp"}
                ]
            }
        }"#;
        let detail = scraper.parse_detail_page(detail_json, "https://www.bizinfo.go.kr/x");
        assert!(detail.content.contains("지원 대상"));
        assert_eq!(detail.attachments.len(), 1);
        assert_eq!(detail.attachments[0].name.as_deref(), Some("공고문.hwp"));
    }
}
