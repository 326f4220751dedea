//! Standard paginated HTML-table variant.
//!
//! Covers the majority of agency boards: a server-rendered listing table,
//! detail pages reachable via plain GET. Everything is driven by the
//! config's selector recipes, with built-in fallbacks where the config is
//! silent (config-first, hardcoded-fallback).

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::{Defaults, SiteConfig};
use crate::core::{Announcement, Attachment, Detail, SiteScraper};
use crate::error::ConfigError;
use crate::http;
use crate::scrapers::{absolutize, extract_attachments_heuristic};

/// Content-area candidates probed when no content selector is configured.
const CONTENT_FALLBACKS: [&str; 8] = [
    ".board_view .content",
    ".bbs_view .content",
    ".view_cont",
    "div.view_con",
    "article",
    "#content",
    "main",
    "body",
];

const DEFAULT_ROWS: &str = "table tbody tr";
const DEFAULT_TITLE: &str = "a";

#[derive(Debug)]
pub(crate) struct CompiledSelectors {
    rows: Selector,
    title: Selector,
    link: Option<Selector>,
    date: Option<Selector>,
    author: Option<Selector>,
    views: Option<Selector>,
    category: Option<Selector>,
    detail_title: Option<Selector>,
    content: Option<Selector>,
    attachments: Option<Selector>,
}

impl CompiledSelectors {
    pub(crate) fn compile(site: &SiteConfig) -> Result<Self, ConfigError> {
        let parse = |field: &'static str, value: &str| {
            Selector::parse(value).map_err(|e| ConfigError::InvalidSelector {
                site: site.code.clone(),
                field,
                message: e.to_string(),
            })
        };
        let parse_opt = |field: &'static str, value: &Option<String>| match value {
            Some(value) => parse(field, value).map(Some),
            None => Ok(None),
        };

        let selectors = &site.selectors;
        Ok(Self {
            rows: parse("rows", selectors.rows.as_deref().unwrap_or(DEFAULT_ROWS))?,
            title: parse("title", selectors.title.as_deref().unwrap_or(DEFAULT_TITLE))?,
            link: parse_opt("link", &selectors.link)?,
            date: parse_opt("date", &selectors.date)?,
            author: parse_opt("author", &selectors.author)?,
            views: parse_opt("views", &selectors.views)?,
            category: parse_opt("category", &selectors.category)?,
            detail_title: parse_opt("detail_title", &selectors.detail_title)?,
            content: parse_opt("content", &selectors.content)?,
            attachments: parse_opt("attachments", &selectors.attachments)?,
        })
    }
}

#[derive(Debug)]
pub struct TableScraper {
    site: SiteConfig,
    defaults: Defaults,
    client: reqwest::Client,
    selectors: CompiledSelectors,
}

impl TableScraper {
    pub fn from_config(site: SiteConfig, defaults: &Defaults) -> Result<Self, ConfigError> {
        let selectors = CompiledSelectors::compile(&site)?;
        let client = http::build_client(&site, defaults)?;
        Ok(Self {
            site,
            defaults: defaults.clone(),
            client,
            selectors,
        })
    }

    fn base_url(&self) -> Url {
        Url::parse(self.site.list_url())
            .or_else(|_| Url::parse(&self.site.base_url))
            .unwrap_or_else(|_| Url::parse("http://localhost/").expect("static url"))
    }

    fn row_to_announcement(&self, row: ElementRef<'_>, base: &Url) -> Option<Announcement> {
        let title_el = row.select(&self.selectors.title).next()?;
        let title = title_el.text().collect::<String>().trim().to_string();

        let link_el = match &self.selectors.link {
            Some(link) => row.select(link).next(),
            None => Some(title_el),
        };
        let href = link_el.and_then(|el| el.value().attr("href"))?;
        let url = absolutize(base, href)?;

        let text_of = |selector: &Option<Selector>| {
            selector.as_ref().and_then(|s| {
                row.select(s)
                    .next()
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .filter(|t| !t.is_empty())
            })
        };

        let announcement = Announcement {
            title,
            url,
            date: text_of(&self.selectors.date),
            author: text_of(&self.selectors.author),
            views: text_of(&self.selectors.views),
            category: text_of(&self.selectors.category),
            has_attachment: false,
            extra: Default::default(),
        };
        announcement.is_usable().then_some(announcement)
    }

    fn content_markdown(&self, document: &Html) -> Option<String> {
        let fragment = match &self.selectors.content {
            Some(selector) => document.select(selector).next().map(|el| el.inner_html()),
            None => CONTENT_FALLBACKS.iter().find_map(|candidate| {
                let selector = Selector::parse(candidate).expect("static selector");
                document.select(&selector).next().map(|el| el.inner_html())
            }),
        }?;

        let markdown = htmd::convert(&fragment).unwrap_or_else(|_| {
            // Tag soup the converter chokes on: fall back to plain text.
            Html::parse_fragment(&fragment)
                .root_element()
                .text()
                .collect::<String>()
        });
        let markdown = markdown.trim().to_string();
        (!markdown.is_empty()).then_some(markdown)
    }
}

#[async_trait]
impl SiteScraper for TableScraper {
    fn config(&self) -> &SiteConfig {
        &self.site
    }

    fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn parse_list_page(&self, raw: &str) -> Vec<Announcement> {
        let document = Html::parse_document(raw);
        let base = self.base_url();

        let rows: Vec<_> = document.select(&self.selectors.rows).collect();
        if rows.is_empty() {
            tracing::warn!(site = %self.site.code, "no listing rows matched, returning empty page");
            return vec![];
        }

        rows.into_iter()
            .filter_map(|row| {
                let announcement = self.row_to_announcement(row, &base);
                if announcement.is_none() {
                    // Header rows and notice separators fall through here.
                    tracing::debug!(site = %self.site.code, "skipping row without title/link");
                }
                announcement
            })
            .collect()
    }

    fn parse_detail_page(&self, raw: &str, url: &str) -> Detail {
        let document = Html::parse_document(raw);
        let base = Url::parse(url).unwrap_or_else(|_| self.base_url());

        let title = self.selectors.detail_title.as_ref().and_then(|s| {
            document
                .select(s)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty())
        });

        let content = match self.content_markdown(&document) {
            Some(content) => content,
            None => {
                tracing::warn!(site = %self.site.code, url, "content area not found");
                String::new()
            }
        };

        let attachments = self.extract_attachments(raw, &base);

        Detail {
            title,
            content,
            attachments,
        }
    }

    fn extract_attachments(&self, html: &str, base: &Url) -> Vec<Attachment> {
        let document = Html::parse_document(html);
        match &self.selectors.attachments {
            Some(selector) => document
                .select(selector)
                .filter_map(|a| {
                    let href = a.value().attr("href")?;
                    let url = absolutize(base, href)?;
                    let name = a.text().collect::<String>().trim().to_string();
                    Some(Attachment::new((!name.is_empty()).then_some(name), url))
                })
                .collect(),
            None => extract_attachments_heuristic(&document, base),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteKind;

    const LIST_HTML: &str = r#"
        <table class="bbs_list">
          <thead><tr><th>번호</th><th>제목</th><th>작성일</th></tr></thead>
          <tbody>
            <tr>
              <td class="num">123</td>
              <td class="title"><a href="view.do?seq=123">2025년 수출지원 사업 공고</a></td>
              <td class="date">2025-07-01</td>
            </tr>
            <tr>
              <td class="num">122</td>
              <td class="title"><a href="view.do?seq=122">기술창업 멘토링 참여기업 모집</a></td>
              <td class="date">2025-06-28</td>
            </tr>
            <tr>
              <td class="num" colspan="3">등록된 게시물이 없습니다</td>
            </tr>
          </tbody>
        </table>"#;

    const DETAIL_HTML: &str = r#"
        <html><body>
          <div class="board_view">
            <h3 class="view_title">2025년 수출지원 사업 공고</h3>
            <div class="content"><p>신청 기간: 7월 1일부터</p><p><strong>지원 내용</strong> 바우처</p></div>
            <ul class="file_list">
              <li><a href="/cmm/fms/FileDown.do?atchFileId=F1">공고문.hwp</a></li>
              <li><a href="/files/신청서.pdf">신청서.pdf</a></li>
            </ul>
          </div>
        </body></html>"#;

    fn scraper() -> TableScraper {
        let mut site = SiteConfig::new(
            "btp",
            "부산테크노파크",
            SiteKind::StandardTable,
            "https://www.btp.or.kr",
        );
        site.list_url = Some("https://www.btp.or.kr/kor/board/list.do?mCode=MN013".to_string());
        site.selectors.rows = Some("table.bbs_list tbody tr".to_string());
        site.selectors.title = Some("td.title a".to_string());
        site.selectors.date = Some("td.date".to_string());
        site.selectors.content = Some("div.board_view div.content".to_string());
        TableScraper::from_config(site, &Defaults::default()).unwrap()
    }

    #[test]
    fn parses_rows_and_drops_separators() {
        let scraper = scraper();
        let announcements = scraper.parse_list_page(LIST_HTML);
        assert_eq!(announcements.len(), 2);
        assert_eq!(announcements[0].title, "2025년 수출지원 사업 공고");
        assert_eq!(
            announcements[0].url,
            "https://www.btp.or.kr/kor/board/view.do?seq=123"
        );
        assert_eq!(announcements[0].date.as_deref(), Some("2025-07-01"));
    }

    #[test]
    fn unrecognized_structure_returns_empty() {
        let scraper = scraper();
        assert!(scraper.parse_list_page("<html><p>점검 중입니다</p></html>").is_empty());
    }

    #[test]
    fn detail_converts_to_markdown_and_finds_attachments() {
        let scraper = scraper();
        let detail =
            scraper.parse_detail_page(DETAIL_HTML, "https://www.btp.or.kr/kor/board/view.do?seq=123");
        assert!(detail.content.contains("신청 기간"));
        assert!(detail.content.contains("**지원 내용**"));
        assert_eq!(detail.attachments.len(), 2);
        assert_eq!(detail.attachments[0].name.as_deref(), Some("공고문.hwp"));
        assert!(detail.attachments[1].url.ends_with(".pdf"));
    }

    #[test]
    fn invalid_selector_is_a_config_error() {
        let mut site = SiteConfig::new("x", "x", SiteKind::StandardTable, "https://e.kr");
        site.selectors.rows = Some("td[".to_string());
        let err = TableScraper::from_config(site, &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSelector { field: "rows", .. }));
    }
}
