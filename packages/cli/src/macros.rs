/// Register bespoke site scrapers into the registry's factory map. Each
/// scraper type must expose `from_config(SiteConfig, &Defaults)`; the
/// config's `scraper` field selects it by name.
macro_rules! register_scrapers {
    ($registry:expr, { $($name:literal => $scraper:ty),+ $(,)? }) => {
        $(
            $registry.register_factory(
                $name,
                std::sync::Arc::new(|site, defaults| {
                    Ok(Box::new(<$scraper>::from_config(site, defaults)?)
                        as Box<dyn gongo::SiteScraper>)
                }),
            );
        )+
    };
}

pub(crate) use register_scrapers;
