#[macro_use]
extern crate rocket;

pub mod api;
pub mod cache;
pub mod config;
pub mod cors;
pub mod images;

use std::sync::Arc;

use log::info;
use rocket::figment::Figment;
use rocket::{Build, Rocket};

use cache::{Clock, ImageCache, SweepFairing, SystemClock};
use config::{AppConfig, ConfigError};
use cors::Cors;
use images::{Fetcher, HttpFetcher, ImageProxy};

/// Production assembly: real HTTP fetcher and wall clock.
pub fn build_rocket(figment: Figment, config: AppConfig) -> Result<Rocket<Build>, ConfigError> {
    let fetcher = HttpFetcher::from_config(&config)?;
    if let Some(proxy) = &config.outbound_proxy {
        info!("Outbound requests go through {}", proxy);
    }
    Ok(assemble(figment, config, Arc::new(fetcher), Arc::new(SystemClock)))
}

/// Wires the cache, proxy, sweep and routes together around the given
/// fetcher and clock.
pub fn assemble(
    figment: Figment,
    config: AppConfig,
    fetcher: Arc<dyn Fetcher>,
    clock: Arc<dyn Clock>,
) -> Rocket<Build> {
    let cache = ImageCache::new(config.cache_ttl(), clock);
    let image_proxy = ImageProxy::new(fetcher, &config);

    info!(
        "Image cache initialized (ttl {}s, sweep every {}s)",
        config.cache_ttl,
        config.sweep_interval().as_secs()
    );

    rocket::custom(figment)
        .attach(Cors)
        .attach(SweepFairing::new(config.sweep_interval()))
        .manage(cache)
        .manage(image_proxy)
        .manage(config)
        .mount("/", api::routes())
        .register("/", api::catchers())
}
