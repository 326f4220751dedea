use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use clap::Parser;
use gongo::{Config, ConfigError, Error, ScrapeEngine, SiteKind, SiteRegistry};
use gongo_btp::BtpScraper;
use gongo_kstartup::KstartupScraper;
use tracing::level_filters::LevelFilter;

use crate::macros::register_scrapers;

mod macros;

#[derive(Parser, Debug)]
#[command(
    name = "gongo",
    about = "지원사업 공고 수집기 - scrape grant announcements from Korean public agencies.",
    version
)]
struct GongoOptions {
    /// Site codes to scrape (see --list).
    sites: Vec<String>,

    /// Scrape every registered site.
    #[arg(long, conflicts_with = "sites")]
    all: bool,

    /// Scrape all sites of one type (standard_table, ajax_api, javascript, ...).
    #[arg(long = "type", value_name = "TYPE", conflicts_with_all = ["sites", "all"])]
    site_type: Option<String>,

    /// Maximum listing pages per site (default from config).
    #[arg(short, long, value_name = "N")]
    pages: Option<u32>,

    /// Output directory (default from config).
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Site configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "sites.yaml")]
    config: PathBuf,

    /// List registered sites and exit.
    #[arg(long)]
    list: bool,

    /// Validate the configuration and exit.
    #[arg(long)]
    validate: bool,

    /// Keep going after a site fails.
    #[arg(long)]
    continue_on_error: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

const EXIT_GENERAL_FAILURE: u8 = 1;
const EXIT_CONFIG_NOT_FOUND: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let options = GongoOptions::parse();
    setup_tracing(options.verbose);
    if let Err(e) = color_eyre::install() {
        tracing::warn!(error = %e, "failed to install error reporter");
    }

    let config = match Config::load(&options.config) {
        Ok(config) => config,
        Err(e @ ConfigError::Read { .. }) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_CONFIG_NOT_FOUND);
        }
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_GENERAL_FAILURE);
        }
    };

    let mut registry = SiteRegistry::new(config);
    register_scrapers!(registry, {
        "btp" => BtpScraper,
        "kstartup" => KstartupScraper,
    });

    if options.list {
        print_site_list(&registry);
        return ExitCode::SUCCESS;
    }

    if options.validate {
        return validate_config(&registry);
    }

    let kind = match options.site_type.as_deref().map(SiteKind::from_str) {
        Some(Ok(kind)) => Some(kind),
        Some(Err(e)) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_GENERAL_FAILURE);
        }
        None => None,
    };
    if !options.all && kind.is_none() && options.sites.is_empty() {
        eprintln!("no sites specified; pass site codes, --all or --type (see --list)");
        return ExitCode::from(EXIT_GENERAL_FAILURE);
    }

    let mut engine = ScrapeEngine::new(registry).with_continue_on_error(options.continue_on_error);
    let outcome = run(&mut engine, &options, kind).await;

    let summary = engine.summary();
    print!("{summary}");

    match outcome {
        Err(Error::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(EXIT_GENERAL_FAILURE)
        }
        Ok(()) if summary.completed > 0 => ExitCode::SUCCESS,
        Ok(()) => ExitCode::from(EXIT_GENERAL_FAILURE),
    }
}

async fn run(
    engine: &mut ScrapeEngine,
    options: &GongoOptions,
    kind: Option<SiteKind>,
) -> Result<(), Error> {
    let pages = options.pages;
    let output = options.output.as_deref();

    if options.all {
        engine.scrape_all(pages, output).await?;
    } else if let Some(kind) = kind {
        engine.scrape_by_type(kind, pages, output).await?;
    } else {
        let (valid, invalid) = engine.validate_sites(&options.sites);
        if valid.is_empty() {
            return Err(ConfigError::UnknownSite(invalid.join(", ")).into());
        }
        engine.scrape_sites(&options.sites, pages, output).await?;
    }
    Ok(())
}

fn print_site_list(registry: &SiteRegistry) {
    println!("registered sites:");
    for code in registry.site_codes() {
        let site = registry.site_config(&code).expect("listed code exists");
        println!("  {code:<12} {:<14} {}", site.kind.as_str(), site.name);
    }
    if !registry.scraper_types().is_empty() {
        println!("\nscraper types:");
        for (kind, description) in registry.scraper_types() {
            println!("  {kind:<14} {description}");
        }
    }
}

fn validate_config(registry: &SiteRegistry) -> ExitCode {
    let report = registry.validate();
    if report.is_ok() {
        println!("configuration OK: {} sites", registry.site_codes().len());
        return ExitCode::SUCCESS;
    }
    for (code, field) in &report.missing_fields {
        println!("[{code}] missing field: {field}");
    }
    for (code, scraper) in &report.unknown_scrapers {
        println!("[{code}] unknown scraper: {scraper}");
    }
    for (code, error) in &report.invalid_selectors {
        println!("[{code}] {error}");
    }
    ExitCode::from(EXIT_GENERAL_FAILURE)
}

fn setup_tracing(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_ansi(true)
        .with_level(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();
}
