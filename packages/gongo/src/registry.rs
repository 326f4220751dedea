//! Site registry: maps a site code to a ready-to-use scraper instance.
//!
//! Scraper implementations are resolved through a factory map populated by
//! explicit registration calls (the three variants at construction, bespoke
//! site modules via [`SiteRegistry::register_factory`]) rather than any
//! runtime reflection. The config selects an implementation by name.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::config::{Config, Defaults, SiteConfig, SiteKind};
use crate::core::SiteScraper;
use crate::error::ConfigError;
use crate::scrapers::{ApiScraper, HttpRenderer, PageRenderer, RenderedScraper, TableScraper};

pub type ScraperFactory =
    Arc<dyn Fn(SiteConfig, &Defaults) -> Result<Box<dyn SiteScraper>, ConfigError> + Send + Sync>;

pub struct SiteRegistry {
    config: Config,
    factories: HashMap<String, ScraperFactory>,
    renderer: Arc<dyn PageRenderer>,
}

impl SiteRegistry {
    pub fn new(config: Config) -> Self {
        let mut registry = Self {
            config,
            factories: HashMap::new(),
            renderer: Arc::new(HttpRenderer::new()),
        };
        registry.register_builtin_factories();
        registry
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::new(Config::load(path)?))
    }

    /// Replace the headless-browser collaborator used by the rendered
    /// variant (the default is a plain-HTTP fallback).
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self.register_builtin_factories();
        self
    }

    fn register_builtin_factories(&mut self) {
        self.factories.insert(
            "standard_table".to_string(),
            Arc::new(|site, defaults| {
                Ok(Box::new(TableScraper::from_config(site, defaults)?) as Box<dyn SiteScraper>)
            }),
        );
        self.factories.insert(
            "ajax_api".to_string(),
            Arc::new(|site, defaults| {
                Ok(Box::new(ApiScraper::from_config(site, defaults)?) as Box<dyn SiteScraper>)
            }),
        );
        let renderer = self.renderer.clone();
        self.factories.insert(
            "javascript".to_string(),
            Arc::new(move |site, defaults| {
                Ok(Box::new(RenderedScraper::from_config(
                    site,
                    defaults,
                    renderer.clone(),
                )?) as Box<dyn SiteScraper>)
            }),
        );
    }

    pub fn defaults(&self) -> &Defaults {
        &self.config.defaults
    }

    pub fn scraper_types(&self) -> &IndexMap<String, String> {
        &self.config.scraper_types
    }

    pub fn site_config(&self, code: &str) -> Option<&SiteConfig> {
        self.config.sites.get(code)
    }

    pub fn site_codes(&self) -> Vec<String> {
        self.config.sites.keys().cloned().collect()
    }

    pub fn sites_by_type(&self, kind: SiteKind) -> Vec<String> {
        self.config
            .sites
            .iter()
            .filter(|(_, site)| site.kind == kind)
            .map(|(code, _)| code.clone())
            .collect()
    }

    /// Register (or replace) a named scraper factory. Bespoke site modules
    /// call this before any scraping starts; config entries reference the
    /// name through their `scraper` field.
    pub fn register_factory(&mut self, name: &str, factory: ScraperFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    /// Programmatic site registration for ad hoc or test-only sites.
    pub fn add_site(&mut self, code: &str, mut site: SiteConfig) {
        site.code = code.to_string();
        self.config.sites.insert(code.to_string(), site);
    }

    pub fn remove_site(&mut self, code: &str) -> Option<SiteConfig> {
        self.config.sites.shift_remove(code)
    }

    /// Instantiate the configured scraper for `code`, with the SiteConfig
    /// injected. Fails fast on unknown codes or factory names; those are
    /// deployment errors, not transient faults.
    pub fn create_scraper(&self, code: &str) -> Result<Box<dyn SiteScraper>, ConfigError> {
        let site = self
            .site_config(code)
            .ok_or_else(|| ConfigError::UnknownSite(code.to_string()))?;
        let factory = self.factories.get(site.scraper_name()).ok_or_else(|| {
            ConfigError::UnknownScraper {
                site: code.to_string(),
                scraper: site.scraper_name().to_string(),
            }
        })?;
        factory(site.clone(), &self.config.defaults)
    }

    /// Diagnostic pass over every registered site, catching configuration
    /// drift (renamed factories, deleted selectors) without any network
    /// activity.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        for (code, site) in &self.config.sites {
            if site.name.trim().is_empty() {
                report.missing_fields.push((code.clone(), "name"));
            }
            if site.base_url.trim().is_empty() {
                report.missing_fields.push((code.clone(), "base_url"));
            }
            if site.kind == SiteKind::AjaxApi {
                if site.api.is_none() {
                    report.missing_fields.push((code.clone(), "api"));
                }
                if site.api_url.is_none() {
                    report.missing_fields.push((code.clone(), "api_url"));
                }
            }
            if !self.factories.contains_key(site.scraper_name()) {
                report
                    .unknown_scrapers
                    .push((code.clone(), site.scraper_name().to_string()));
            }
            if let Err(e) = crate::scrapers::compile_selectors(site) {
                report.invalid_selectors.push((code.clone(), e.to_string()));
            }
        }
        report
    }
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub missing_fields: Vec<(String, &'static str)>,
    pub unknown_scrapers: Vec<(String, String)>,
    pub invalid_selectors: Vec<(String, String)>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.missing_fields.is_empty()
            && self.unknown_scrapers.is_empty()
            && self.invalid_selectors.is_empty()
    }
}
