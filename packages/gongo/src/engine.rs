//! Multi-site orchestration: single, batch, all-sites and by-type runs,
//! with per-site result aggregation and continue-on-error semantics.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use time::OffsetDateTime;

use crate::config::SiteKind;
use crate::error::{ConfigError, Error};
use crate::registry::SiteRegistry;
use crate::walker::PageWalker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
    Interrupted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub site: String,
    pub status: RunStatus,
    pub pages: u32,
    pub announcements: u32,
    pub errors: Vec<String>,
    pub output_dir: PathBuf,
    pub started_at: OffsetDateTime,
    pub finished_at: Option<OffsetDateTime>,
}

impl RunResult {
    fn start(site: &str, output_dir: PathBuf) -> Self {
        Self {
            site: site.to_string(),
            status: RunStatus::Failed,
            pages: 0,
            announcements: 0,
            errors: Vec::new(),
            output_dir,
            started_at: OffsetDateTime::now_utc(),
            finished_at: None,
        }
    }

    fn finish(&mut self) {
        self.finished_at = Some(OffsetDateTime::now_utc());
    }

    pub fn duration(&self) -> time::Duration {
        self.finished_at.unwrap_or_else(OffsetDateTime::now_utc) - self.started_at
    }
}

enum Outcome {
    Finished(Result<crate::walker::WalkReport, Error>),
    Interrupted,
}

/// Resolves on SIGINT. If the handler cannot be installed the run simply
/// becomes uninterruptible instead of aborting spuriously.
async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install SIGINT handler");
        std::future::pending::<()>().await;
    }
}

pub struct ScrapeEngine {
    registry: SiteRegistry,
    continue_on_error: bool,
    results: IndexMap<String, RunResult>,
}

impl ScrapeEngine {
    pub fn new(registry: SiteRegistry) -> Self {
        Self {
            registry,
            continue_on_error: false,
            results: IndexMap::new(),
        }
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn registry(&self) -> &SiteRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SiteRegistry {
        &mut self.registry
    }

    pub fn results(&self) -> &IndexMap<String, RunResult> {
        &self.results
    }

    /// Run one site to completion. A SIGINT is recorded as `interrupted`
    /// and re-raised as [`Error::Interrupted`] so batch runs can stop.
    /// Every other failure is folded into the returned `RunResult`.
    pub async fn scrape_site(
        &mut self,
        code: &str,
        max_pages: Option<u32>,
        output_base: Option<&Path>,
    ) -> Result<RunResult, Error> {
        if self.registry.site_config(code).is_none() {
            return Err(ConfigError::UnknownSite(code.to_string()).into());
        }
        let defaults = self.registry.defaults();
        let max_pages = max_pages.unwrap_or(defaults.max_pages);
        let output_base = output_base
            .map(Path::to_path_buf)
            .unwrap_or_else(|| defaults.output_dir.clone());

        let mut result = RunResult::start(code, output_base.join(code));
        tracing::info!(site = code, max_pages, "site run started");

        let outcome = {
            let registry = &self.registry;
            let run = async {
                let scraper = registry.create_scraper(code)?;
                PageWalker::new(scraper.as_ref(), max_pages, &output_base)
                    .run()
                    .await
            };
            tokio::select! {
                report = run => Outcome::Finished(report),
                _ = wait_for_interrupt() => Outcome::Interrupted,
            }
        };

        match outcome {
            Outcome::Interrupted => {
                result.status = RunStatus::Interrupted;
                result.finish();
                tracing::warn!(site = code, "site run interrupted by user");
                self.results.insert(code.to_string(), result);
                Err(Error::Interrupted)
            }
            Outcome::Finished(Ok(report)) => {
                result.pages = report.pages;
                result.announcements = report.announcements;
                result.errors = report.errors;
                result.status = if report.aborted {
                    RunStatus::Failed
                } else {
                    RunStatus::Completed
                };
                result.finish();
                tracing::info!(
                    site = code,
                    status = %result.status,
                    pages = result.pages,
                    announcements = result.announcements,
                    "site run finished"
                );
                self.results.insert(code.to_string(), result.clone());
                Ok(result)
            }
            Outcome::Finished(Err(e)) => {
                result.status = RunStatus::Failed;
                result.errors.push(e.to_string());
                result.finish();
                tracing::error!(site = code, error = %e, "site run failed");
                self.results.insert(code.to_string(), result.clone());
                Ok(result)
            }
        }
    }

    /// Run several sites sequentially with a politeness delay in between.
    /// Unknown codes are skipped with a warning. After a failed site the
    /// batch continues or aborts per `continue_on_error`.
    pub async fn scrape_sites(
        &mut self,
        codes: &[String],
        max_pages: Option<u32>,
        output_base: Option<&Path>,
    ) -> Result<IndexMap<String, RunResult>, Error> {
        let (valid, invalid) = self.validate_sites(codes);
        for code in &invalid {
            tracing::warn!(site = %code, "unknown site code, skipping");
        }

        let delay = Duration::from_millis(self.registry.defaults().delay_between_sites_ms);
        for (i, code) in valid.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(delay).await;
            }
            let result = self.scrape_site(code, max_pages, output_base).await?;
            if result.status == RunStatus::Failed && !self.continue_on_error {
                tracing::error!(site = %code, "site failed, aborting batch");
                break;
            }
        }

        Ok(valid
            .iter()
            .filter_map(|code| self.results.get(code).map(|r| (code.clone(), r.clone())))
            .collect())
    }

    pub async fn scrape_all(
        &mut self,
        max_pages: Option<u32>,
        output_base: Option<&Path>,
    ) -> Result<IndexMap<String, RunResult>, Error> {
        let codes = self.registry.site_codes();
        self.scrape_sites(&codes, max_pages, output_base).await
    }

    pub async fn scrape_by_type(
        &mut self,
        kind: SiteKind,
        max_pages: Option<u32>,
        output_base: Option<&Path>,
    ) -> Result<IndexMap<String, RunResult>, Error> {
        let codes = self.registry.sites_by_type(kind);
        if codes.is_empty() {
            tracing::warn!(kind = kind.as_str(), "no sites registered for type");
        }
        self.scrape_sites(&codes, max_pages, output_base).await
    }

    /// Partition a requested code list into known and unknown codes, so the
    /// CLI can reject typos before any network activity.
    pub fn validate_sites(&self, codes: &[String]) -> (Vec<String>, Vec<String>) {
        codes
            .iter()
            .cloned()
            .partition(|code| self.registry.site_config(code).is_some())
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for result in self.results.values() {
            match result.status {
                RunStatus::Completed => summary.completed += 1,
                RunStatus::Failed => summary.failed += 1,
                RunStatus::Interrupted => summary.interrupted += 1,
            }
            summary.results.push(result.clone());
        }
        summary
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub interrupted: usize,
    pub results: Vec<RunResult>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.results.len()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== 스크래핑 결과 요약 ===")?;
        writeln!(
            f,
            "총 {}개 사이트: 완료 {} / 실패 {} / 중단 {}",
            self.total(),
            self.completed,
            self.failed,
            self.interrupted
        )?;
        for result in &self.results {
            writeln!(
                f,
                "  [{}] {} - {} pages, {} announcements, {:.1}s -> {}",
                result.status,
                result.site,
                result.pages,
                result.announcements,
                result.duration().as_seconds_f64(),
                result.output_dir.display()
            )?;
            if let Some(first_error) = result.errors.first() {
                writeln!(f, "      first error: {first_error}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::config::{Config, Defaults, SiteConfig};
    use crate::core::{Announcement, Detail, SiteScraper};
    use crate::error::ScrapeError;

    /// One-page scraper that either serves a single announcement or fails
    /// its list fetch, depending on the site name used as a script.
    struct FlakyScraper {
        site: SiteConfig,
        defaults: Defaults,
        client: reqwest::Client,
    }

    #[async_trait]
    impl SiteScraper for FlakyScraper {
        fn config(&self) -> &SiteConfig {
            &self.site
        }

        fn defaults(&self) -> &Defaults {
            &self.defaults
        }

        fn client(&self) -> &reqwest::Client {
            &self.client
        }

        async fn fetch_list_page(&self, page: u32) -> Result<String, ScrapeError> {
            if self.site.name == "broken" {
                return Err(ScrapeError::request(&self.site.code, "boom".to_string()));
            }
            Ok(page.to_string())
        }

        fn parse_list_page(&self, raw: &str) -> Vec<Announcement> {
            if raw != "1" {
                return vec![];
            }
            vec![Announcement::new(
                format!("{} 공고", self.site.code),
                format!("https://{}.kr/view/1", self.site.code),
            )]
        }

        async fn fetch_detail(&self, _announcement: &Announcement) -> Result<String, ScrapeError> {
            Ok("본문".to_string())
        }

        fn parse_detail_page(&self, raw: &str, _url: &str) -> Detail {
            Detail {
                title: None,
                content: raw.to_string(),
                attachments: vec![],
            }
        }
    }

    fn engine_with_sites(names: &[(&str, &str)]) -> ScrapeEngine {
        let mut config = Config::default();
        config.defaults.delay_between_sites_ms = 0;
        config.defaults.delay_between_requests_ms = 0;
        config.defaults.delay_between_pages_ms = 0;
        let mut registry = crate::registry::SiteRegistry::new(config);
        registry.register_factory(
            "flaky",
            Arc::new(|site, defaults| {
                Ok(Box::new(FlakyScraper {
                    site,
                    defaults: defaults.clone(),
                    client: reqwest::Client::new(),
                }) as Box<dyn SiteScraper>)
            }),
        );
        for (code, name) in names {
            let mut site =
                SiteConfig::new(code, name, crate::config::SiteKind::StandardTable, "https://e.kr");
            site.scraper = Some("flaky".to_string());
            registry.add_site(code, site);
        }
        ScrapeEngine::new(registry)
    }

    #[test]
    fn validate_sites_partitions_codes() {
        let engine = engine_with_sites(&[("btp", "ok")]);
        let (valid, invalid) = engine.validate_sites(&[
            "btp".to_string(),
            "not_a_real_site".to_string(),
        ]);
        assert_eq!(valid, vec!["btp"]);
        assert_eq!(invalid, vec!["not_a_real_site"]);
    }

    #[tokio::test]
    async fn failed_site_does_not_block_others_with_continue_on_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = engine_with_sites(&[("one", "ok"), ("two", "broken"), ("three", "ok")])
            .with_continue_on_error(true);

        let codes: Vec<String> = ["one", "two", "three"].iter().map(|s| s.to_string()).collect();
        let results = engine
            .scrape_sites(&codes, Some(2), Some(tmp.path()))
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results["one"].status, RunStatus::Completed);
        assert_eq!(results["two"].status, RunStatus::Failed);
        assert_eq!(results["three"].status, RunStatus::Completed);
        assert!(results["two"].errors[0].contains("boom"));
    }

    #[tokio::test]
    async fn failed_site_aborts_batch_by_default() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = engine_with_sites(&[("one", "ok"), ("two", "broken"), ("three", "ok")]);

        let codes: Vec<String> = ["one", "two", "three"].iter().map(|s| s.to_string()).collect();
        let results = engine
            .scrape_sites(&codes, Some(2), Some(tmp.path()))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results["one"].status, RunStatus::Completed);
        assert_eq!(results["two"].status, RunStatus::Failed);
        assert!(!results.contains_key("three"));
    }

    #[tokio::test]
    async fn unknown_codes_are_skipped_with_results_for_the_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = engine_with_sites(&[("btp", "ok")]);

        let codes: Vec<String> = ["btp", "typo_site"].iter().map(|s| s.to_string()).collect();
        let results = engine
            .scrape_sites(&codes, Some(1), Some(tmp.path()))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results.contains_key("btp"));

        let err = engine
            .scrape_site("typo_site", None, Some(tmp.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::UnknownSite(_))));
    }

    #[tokio::test]
    async fn summary_counts_statuses() {
        let tmp = tempfile::tempdir().unwrap();
        let mut engine = engine_with_sites(&[("one", "ok"), ("two", "broken")])
            .with_continue_on_error(true);
        let codes: Vec<String> = ["one", "two"].iter().map(|s| s.to_string()).collect();
        engine
            .scrape_sites(&codes, Some(1), Some(tmp.path()))
            .await
            .unwrap();

        let summary = engine.summary();
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);
        let rendered = summary.to_string();
        assert!(rendered.contains("[completed] one"));
        assert!(rendered.contains("[failed] two"));
    }
}
