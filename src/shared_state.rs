use std::sync::Arc;

use chrono::Duration;

use crate::config::Config;
use crate::services::pvgis_client::PvgisClient;
use crate::services::solar_proxy::SolarProxy;

/// State handed to every handler. Cloning is cheap; the proxy, and with it
/// the response caches, is shared.
#[derive(Clone, Debug)]
pub struct AppState {
    pub proxy: Arc<SolarProxy<PvgisClient>>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = PvgisClient::new(&config.pvgis)?;
        let proxy = SolarProxy::new(
            client,
            config.pvgis.radiation_database.clone(),
            Duration::hours(config.cache.ttl_hours),
        );
        Ok(Self {
            proxy: Arc::new(proxy),
        })
    }
}
