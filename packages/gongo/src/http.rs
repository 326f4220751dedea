//! Per-site HTTP transport. One client (with its own cookie jar) per scraper
//! instance, built from the site's SSL/timeout/header options.

use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use futures::StreamExt as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::io::AsyncWriteExt as _;

use crate::config::{Defaults, SiteConfig};
use crate::core::{Attachment, DownloadMethod};
use crate::error::{ConfigError, ScrapeError};
use crate::filename;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DOWNLOAD_CHUNK_WARN: usize = 64 * 1024 * 1024;

pub fn build_client(site: &SiteConfig, defaults: &Defaults) -> Result<reqwest::Client, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
        ),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("ko-KR,ko;q=0.9,en;q=0.5"),
    );
    for (name, value) in &site.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::Client {
            site: site.code.clone(),
            message: format!("invalid header name {name}: {e}"),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| ConfigError::Client {
            site: site.code.clone(),
            message: format!("invalid header value for {name}: {e}"),
        })?;
        headers.insert(name, value);
    }

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(site.timeout(defaults))
        .cookie_store(true)
        .danger_accept_invalid_certs(!site.ssl_verify)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| ConfigError::Client {
            site: site.code.clone(),
            message: e.to_string(),
        })
}

/// GET a page and decode its body, honoring the site's encoding override.
/// Agencies on legacy stacks declare one charset and serve another; when the
/// config pins an encoding we decode the raw bytes ourselves.
pub async fn fetch_text(
    client: &reqwest::Client,
    site: &SiteConfig,
    url: &str,
) -> Result<String, ScrapeError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ScrapeError::request(&site.code, format!("GET {url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::request(
            &site.code,
            format!("HTTP {status} for {url}"),
        ));
    }

    decode_body(response, &site.code, &site.encoding).await
}

pub async fn decode_body(
    response: reqwest::Response,
    site_code: &str,
    encoding: &str,
) -> Result<String, ScrapeError> {
    if encoding.eq_ignore_ascii_case("auto") {
        return response
            .text()
            .await
            .map_err(|e| ScrapeError::parse(site_code, format!("failed to read body: {e}")));
    }

    let label = encoding.to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ScrapeError::parse(site_code, format!("failed to read body: {e}")))?;
    let encoding = Encoding::for_label(label.as_bytes()).ok_or_else(|| {
        ScrapeError::parse(site_code, format!("unknown encoding label: {label}"))
    })?;
    Ok(encoding.decode(&bytes).0.into_owned())
}

/// Stream an attachment to `dir`, naming the file from the response headers
/// (the scraped display name is only a hint). Partial files are removed on
/// any failure; zero-byte bodies and HTML error pages count as failures.
pub async fn download_to_file(
    client: &reqwest::Client,
    site: &SiteConfig,
    defaults: &Defaults,
    attachment: &Attachment,
    dir: &Path,
) -> Result<PathBuf, ScrapeError> {
    let request = match &attachment.method {
        DownloadMethod::Get => client.get(&attachment.url),
        DownloadMethod::Post { params } => client.post(&attachment.url).form(params),
    };

    let response = request
        .timeout(site.download_timeout(defaults))
        .send()
        .await
        .map_err(|e| ScrapeError::download(&site.code, format!("{}: {e}", attachment.url)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::download(
            &site.code,
            format!("HTTP {status} for {}", attachment.url),
        ));
    }

    let looks_like_html = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));

    let default_name = attachment.name.as_deref().unwrap_or(&attachment.url);
    let name = filename::sanitize_filename(&filename::filename_from_response(
        &response,
        default_name,
    ));
    let path = unique_path(dir, &name);

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| ScrapeError::download(&site.code, format!("create {name}: {e}")))?;

    let mut total: usize = 0;
    let mut head: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                remove_partial(&path).await;
                return Err(ScrapeError::download(
                    &site.code,
                    format!("{}: {e}", attachment.url),
                ));
            }
        };
        if head.len() < 512 {
            head.extend_from_slice(&chunk[..chunk.len().min(512 - head.len())]);
        }
        total += chunk.len();
        if total > DOWNLOAD_CHUNK_WARN && total - chunk.len() <= DOWNLOAD_CHUNK_WARN {
            tracing::warn!(site = %site.code, url = %attachment.url, "attachment exceeds 64MiB, still downloading");
        }
        if let Err(e) = file.write_all(&chunk).await {
            drop(file);
            remove_partial(&path).await;
            return Err(ScrapeError::download(
                &site.code,
                format!("write {name}: {e}"),
            ));
        }
    }
    if let Err(e) = file.flush().await {
        drop(file);
        remove_partial(&path).await;
        return Err(ScrapeError::download(&site.code, format!("flush {name}: {e}")));
    }
    drop(file);

    if total == 0 {
        remove_partial(&path).await;
        return Err(ScrapeError::download(
            &site.code,
            format!("zero-length body for {}", attachment.url),
        ));
    }

    if looks_like_html && body_is_html_page(&head) {
        remove_partial(&path).await;
        return Err(ScrapeError::download(
            &site.code,
            format!("HTML error page instead of a file for {}", attachment.url),
        ));
    }

    Ok(path)
}

fn body_is_html_page(head: &[u8]) -> bool {
    let head = String::from_utf8_lossy(head);
    let head = head.trim_start().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    for n in 2.. {
        let renamed = match ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        let candidate = dir.join(renamed);
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!()
}

async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove partial download");
    }
}
