//! The three behavioral specializations of the scraper contract, selected
//! by `SiteConfig.type`: server-rendered tables, JSON APIs, and
//! JavaScript-rendered listings.

mod api;
mod rendered;
mod table;

pub use api::ApiScraper;
pub use rendered::{HttpRenderer, PageRenderer, RenderError, RenderedScraper};
pub use table::TableScraper;

use scraper::{Html, Selector};
use url::Url;

use crate::config::SiteConfig;
use crate::core::Attachment;
use crate::error::ConfigError;

/// Dry-run selector compilation for config validation.
pub(crate) fn compile_selectors(site: &SiteConfig) -> Result<(), ConfigError> {
    table::CompiledSelectors::compile(site).map(|_| ())
}

/// Extensions that mark a link as a downloadable document on Korean agency
/// boards. HWP/HWPX are the dominant formats, PDF/Office close behind.
const DOWNLOAD_EXTENSIONS: [&str; 14] = [
    "pdf", "hwp", "hwpx", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "zip", "txt", "jpg",
    "jpeg", "png",
];

/// URL path fragments that mark a download endpoint even without an
/// extension (`/cmm/fms/FileDown.do`, `fileDownload.jsp?...`).
const DOWNLOAD_MARKERS: [&str; 5] = ["filedown", "file_down", "download", "atchfile", "fms/"];

/// Attachment extraction fallback used when a site has no configured
/// attachment selector: every anchor whose target looks like a file.
pub(crate) fn extract_attachments_heuristic(document: &Html, base: &Url) -> Vec<Attachment> {
    let anchors = Selector::parse("a[href]").expect("static selector");
    document
        .select(&anchors)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
                return None;
            }
            let resolved = base.join(href).ok()?;
            if !looks_like_download(&resolved) {
                return None;
            }
            let text = a.text().collect::<String>().trim().to_string();
            let name = (!text.is_empty()).then_some(text);
            Some(Attachment::new(name, resolved.to_string()))
        })
        .collect()
}

fn looks_like_download(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    if let Some(ext) = path.rsplit_once('.').map(|(_, ext)| ext) {
        if DOWNLOAD_EXTENSIONS.contains(&ext) {
            return true;
        }
    }
    let haystack = match url.query() {
        Some(query) => format!("{path}?{}", query.to_ascii_lowercase()),
        None => path,
    };
    DOWNLOAD_MARKERS.iter().any(|m| haystack.contains(m))
}

/// Resolve a possibly relative href against the page it appeared on.
pub(crate) fn absolutize(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with('#') {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_finds_file_links() {
        let html = r##"
            <div>
                <a href="/files/공고문.hwp">공고문</a>
                <a href="/cmm/fms/FileDown.do?atchFileId=F123&fileSn=0">첨부 1</a>
                <a href="/board/view?id=3">다른 게시글</a>
                <a href="javascript:fileDown('1')">JS 다운로드</a>
                <a href="#top">맨 위로</a>
            </div>"##;
        let document = Html::parse_document(html);
        let base = Url::parse("https://www.btp.or.kr/kor/board/list").unwrap();

        let attachments = extract_attachments_heuristic(&document, &base);
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].name.as_deref(), Some("공고문"));
        assert!(attachments[0].url.ends_with(".hwp"));
        assert!(attachments[1].url.contains("FileDown.do"));
    }

    #[test]
    fn absolutize_skips_script_links() {
        let base = Url::parse("https://e.kr/board/").unwrap();
        assert_eq!(
            absolutize(&base, "view.do?seq=1").as_deref(),
            Some("https://e.kr/board/view.do?seq=1")
        );
        assert_eq!(absolutize(&base, "javascript:view(1)"), None);
        assert_eq!(absolutize(&base, ""), None);
    }
}
