//! The page-iteration / dedup / persistence loop shared by every scraper.
//!
//! Site modules only supply parsing and download-URL logic; everything a
//! run has in common lives here: pagination, the early-stop heuristic,
//! output-folder creation, attachment downloads and failure isolation.

use std::path::{Path, PathBuf};

use crate::core::ledger::TitleLedger;
use crate::core::{Announcement, SiteScraper, output};
use crate::error::Error;

/// Outcome of one site's page walk. Counts and errors survive even when the
/// walk aborted partway, so the engine can always produce a usable result.
#[derive(Debug, Default, Clone)]
pub struct WalkReport {
    pub pages: u32,
    pub announcements: u32,
    pub skipped: u32,
    pub early_stopped: bool,
    /// Set when a list-page failure aborted the walk.
    pub aborted: bool,
    pub errors: Vec<String>,
}

pub struct PageWalker<'a> {
    scraper: &'a dyn SiteScraper,
    max_pages: u32,
    site_dir: PathBuf,
}

impl<'a> PageWalker<'a> {
    pub fn new(scraper: &'a dyn SiteScraper, max_pages: u32, output_base: &Path) -> Self {
        let site_dir = output_base.join(&scraper.config().code);
        Self {
            scraper,
            max_pages,
            site_dir,
        }
    }

    pub fn site_dir(&self) -> &Path {
        &self.site_dir
    }

    pub async fn run(&self) -> Result<WalkReport, Error> {
        let site = self.scraper.config();
        let defaults = self.scraper.defaults();
        let threshold = site.duplicate_threshold(defaults).max(1);
        let request_delay = site.request_delay(defaults);
        let page_delay = site.page_delay(defaults);

        let mut ledger = TitleLedger::open(&self.site_dir).await?;
        let mut report = WalkReport::default();

        for page in 1..=self.max_pages {
            tracing::info!(site = %site.code, page, max_pages = self.max_pages, "fetching list page");

            let raw = match self.scraper.fetch_list_page(page).await {
                Ok(raw) => raw,
                Err(e) => {
                    report.errors.push(e.to_string());
                    if site.pagination.continue_on_error {
                        tracing::warn!(site = %site.code, page, error = %e, "list page failed, skipping");
                        continue;
                    }
                    tracing::error!(site = %site.code, page, error = %e, "list page failed, aborting site");
                    report.aborted = true;
                    break;
                }
            };

            let announcements = self.scraper.parse_list_page(&raw);
            if announcements.is_empty() {
                tracing::info!(site = %site.code, page, "no announcements parsed, stopping");
                break;
            }
            report.pages += 1;

            // Early-stop heuristic: a run of already-seen titles at the top
            // of the page means pagination has reached previously scraped
            // territory. The current page is still finished first, because
            // pinned notices can push genuinely new items further down.
            let leading_seen = announcements
                .iter()
                .take_while(|a| ledger.contains(&a.title))
                .count();
            let early_stop = leading_seen as u32 >= threshold;

            for announcement in &announcements {
                if ledger.contains(&announcement.title) {
                    report.skipped += 1;
                    tracing::debug!(site = %site.code, title = %announcement.title, "already processed");
                    continue;
                }
                match self.process(announcement, &mut ledger).await {
                    Ok(attachment_errors) => {
                        report.announcements += 1;
                        report.errors.extend(attachment_errors);
                    }
                    Err(e) => {
                        tracing::warn!(
                            site = %site.code,
                            title = %announcement.title,
                            error = %e,
                            "announcement failed, skipping"
                        );
                        report.errors.push(format!("{}: {e}", announcement.title));
                    }
                }
                tokio::time::sleep(request_delay).await;
            }

            if early_stop {
                tracing::info!(
                    site = %site.code,
                    page,
                    leading_seen,
                    threshold,
                    "reached previously scraped content, stopping early"
                );
                report.early_stopped = true;
                break;
            }
            if page < self.max_pages {
                tokio::time::sleep(page_delay).await;
            }
        }

        tracing::info!(
            site = %site.code,
            pages = report.pages,
            new = report.announcements,
            skipped = report.skipped,
            "site walk finished"
        );
        Ok(report)
    }

    /// Process a single new announcement: fetch and parse the detail page,
    /// persist content.md, download attachments, record the title. Returns
    /// the attachment-level error messages (downloads never abort the
    /// announcement).
    async fn process(
        &self,
        announcement: &Announcement,
        ledger: &mut TitleLedger,
    ) -> Result<Vec<String>, Error> {
        let site = self.scraper.config();
        let raw = self.scraper.fetch_detail(announcement).await?;
        let detail = self.scraper.parse_detail_page(&raw, &announcement.url);

        let index = ledger.len() + 1;
        let title = detail.title.as_deref().unwrap_or(&announcement.title);
        let dir = output::create_announcement_dir(&self.site_dir, index, title).await?;

        output::write_content(&dir, &output::render_content(announcement, &detail)).await?;
        tracing::info!(site = %site.code, title = %announcement.title, dir = %dir.display(), "saved announcement");

        let mut attachment_errors = Vec::new();
        if !detail.attachments.is_empty() {
            let attachments_dir = dir.join(output::ATTACHMENTS_DIR);
            tokio::fs::create_dir_all(&attachments_dir).await?;
            let request_delay = site.request_delay(self.scraper.defaults());
            for attachment in &detail.attachments {
                match self.scraper.download(attachment, &attachments_dir).await {
                    Ok(path) => {
                        tracing::info!(site = %site.code, file = %path.display(), "saved attachment");
                    }
                    Err(e) => {
                        tracing::warn!(
                            site = %site.code,
                            url = %attachment.url,
                            error = %e,
                            "attachment download failed, skipping"
                        );
                        attachment_errors.push(format!("attachment {}: {e}", attachment.url));
                    }
                }
                tokio::time::sleep(request_delay).await;
            }
        }

        ledger.record(&announcement.title).await?;
        Ok(attachment_errors)
    }
}
