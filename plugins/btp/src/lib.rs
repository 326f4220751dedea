//! 부산테크노파크 (Busan Technopark) site module.
//!
//! The board itself is an ordinary server-rendered table, so listing and
//! detail parsing ride on the standard table variant with BTP's selector
//! recipe filled in wherever the config is silent. What the generic path
//! cannot do is download attachments: file links are
//! `javascript:fn_egov_downFile('FILE_...','0')` calls that must be turned
//! into a form POST against the eGovFrame download endpoint.

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use gongo::config::{Defaults, SiteConfig};
use gongo::core::{Announcement, Attachment, Detail, DownloadMethod, SiteScraper};
use gongo::error::{ConfigError, ScrapeError};
use gongo::scrapers::TableScraper;

const FILE_DOWN_PATH: &str = "/cmm/fms/FileDown.do";

pub struct BtpScraper {
    inner: TableScraper,
    file_down_url: String,
}

impl BtpScraper {
    pub fn from_config(mut site: SiteConfig, defaults: &Defaults) -> Result<Self, ConfigError> {
        apply_fallback_selectors(&mut site);
        let file_down_url = format!(
            "{}{FILE_DOWN_PATH}",
            site.base_url.trim_end_matches('/')
        );
        Ok(Self {
            inner: TableScraper::from_config(site, defaults)?,
            file_down_url,
        })
    }

    fn egov_attachments(&self, document: &Html) -> Vec<Attachment> {
        let anchors = Selector::parse("a[href^=\"javascript:fn_egov_downFile\"]")
            .expect("static selector");
        document
            .select(&anchors)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let (file_id, file_sn) = parse_down_file_call(href).or_else(|| {
                    tracing::warn!(site = "btp", href, "unparseable fn_egov_downFile call");
                    None
                })?;
                let text = a.text().collect::<String>().trim().to_string();
                let mut attachment =
                    Attachment::new((!text.is_empty()).then_some(text), self.file_down_url.as_str());
                attachment.method = DownloadMethod::Post {
                    params: vec![
                        ("atchFileId".to_string(), file_id),
                        ("fileSn".to_string(), file_sn),
                    ],
                };
                Some(attachment)
            })
            .collect()
    }
}

/// BTP board recipe, used for any selector the config does not provide.
fn apply_fallback_selectors(site: &mut SiteConfig) {
    let selectors = &mut site.selectors;
    selectors.rows.get_or_insert_with(|| "table.bbs_list tbody tr".to_string());
    selectors.title.get_or_insert_with(|| "td.title a".to_string());
    selectors.date.get_or_insert_with(|| "td.date".to_string());
    selectors.views.get_or_insert_with(|| "td.hit".to_string());
    selectors
        .content
        .get_or_insert_with(|| "div.bbs_view div.view_cont".to_string());
    selectors
        .detail_title
        .get_or_insert_with(|| "div.bbs_view h4.view_title".to_string());
}

/// `javascript:fn_egov_downFile('FILE_000000000012345','0')` -> (id, sn)
fn parse_down_file_call(href: &str) -> Option<(String, String)> {
    let args = href.split_once('(')?.1.rsplit_once(')')?.0;
    let mut quoted = args
        .split(',')
        .map(|arg| arg.trim().trim_matches(['\'', '"']))
        .filter(|arg| !arg.is_empty());
    let file_id = quoted.next()?;
    let file_sn = quoted.next().unwrap_or("0");
    file_id.starts_with("FILE_").then(|| (file_id.to_string(), file_sn.to_string()))
}

#[async_trait]
impl SiteScraper for BtpScraper {
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
        self.inner.fetch_list_page(page).await
    }

    fn parse_list_page(&self, raw: &str) -> Vec<Announcement> {
        self.inner.parse_list_page(raw)
    }

    fn parse_detail_page(&self, raw: &str, url: &str) -> Detail {
        let mut detail = self.inner.parse_detail_page(raw, url);
        if let Ok(base) = Url::parse(url) {
            detail.attachments = self.extract_attachments(raw, &base);
        }
        detail
    }

    /// eGovFrame download calls when present, the generic path otherwise.
    fn extract_attachments(&self, html: &str, base: &Url) -> Vec<Attachment> {
        let egov = self.egov_attachments(&Html::parse_document(html));
        if egov.is_empty() {
            self.inner.extract_attachments(html, base)
        } else {
            egov
        }
    }
}

#[cfg(test)]
mod tests {
    use gongo::config::SiteKind;

    use super::*;

    fn scraper() -> BtpScraper {
        let mut site = SiteConfig::new(
            "btp",
            "부산테크노파크",
            SiteKind::StandardTable,
            "https://www.btp.or.kr",
        );
        site.list_url =
            Some("https://www.btp.or.kr/kor/CMS/Board/Board.do?mCode=MN013".to_string());
        BtpScraper::from_config(site, &Defaults::default()).unwrap()
    }

    #[test]
    fn parses_down_file_calls() {
        assert_eq!(
            parse_down_file_call("javascript:fn_egov_downFile('FILE_000000000012345','0')"),
            Some(("FILE_000000000012345".to_string(), "0".to_string()))
        );
        assert_eq!(
            parse_down_file_call("javascript:fn_egov_downFile(\"FILE_1\", \"2\")"),
            Some(("FILE_1".to_string(), "2".to_string()))
        );
        assert_eq!(parse_down_file_call("javascript:fn_egov_downFile()"), None);
        assert_eq!(parse_down_file_call("javascript:alert('x')"), None);
    }

    #[test]
    fn detail_attachments_become_form_posts() {
        let html = r#"
            <div class="bbs_view">
              <h4 class="view_title">2025년 기술사업화 지원 공고</h4>
              <div class="view_cont"><p>지원 규모: 과제당 5천만원</p></div>
              <div class="file">
                <a href="javascript:fn_egov_downFile('FILE_000000000099001','0')">공고문.hwp</a>
                <a href="javascript:fn_egov_downFile('FILE_000000000099001','1')">신청서.hwp</a>
              </div>
            </div>"#;
        let scraper = scraper();
        let detail = scraper.parse_detail_page(html, "https://www.btp.or.kr/kor/view.do?seq=1");

        assert_eq!(detail.title.as_deref(), Some("2025년 기술사업화 지원 공고"));
        assert!(detail.content.contains("지원 규모"));
        assert_eq!(detail.attachments.len(), 2);

        let first = &detail.attachments[0];
        assert_eq!(first.name.as_deref(), Some("공고문.hwp"));
        assert_eq!(first.url, "https://www.btp.or.kr/cmm/fms/FileDown.do");
        assert_eq!(
            first.method,
            DownloadMethod::Post {
                params: vec![
                    ("atchFileId".to_string(), "FILE_000000000099001".to_string()),
                    ("fileSn".to_string(), "0".to_string()),
                ]
            }
        );
    }

    #[test]
    fn listing_uses_fallback_recipe() {
        let html = r#"
            <table class="bbs_list"><tbody>
              <tr>
                <td class="title"><a href="view.do?seq=55">수출 상담회 참가기업 모집</a></td>
                <td class="date">2025-07-10</td>
                <td class="hit">321</td>
              </tr>
            </tbody></table>"#;
        let scraper = scraper();
        let announcements = scraper.parse_list_page(html);
        assert_eq!(announcements.len(), 1);
        assert_eq!(announcements[0].title, "수출 상담회 참가기업 모집");
        assert_eq!(announcements[0].views.as_deref(), Some("321"));
        assert!(announcements[0].url.starts_with("https://www.btp.or.kr/kor/CMS/Board/"));
    }
}
