use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::errors::ProxyError;
use crate::models::solar::{
    GeoPoint, HourlyRequest, HourlySolarDataResponse, MonthlyIrradiance, MonthlyProduction,
    PvProductionResponse, PvSystemRequest, SolarDataResponse,
};
use crate::services::normalizer::{
    month_name, normalize_hourly, normalize_monthly_irradiance, normalize_production,
    optimal_angles,
};
use crate::services::production_estimator::estimate_annual;
use crate::services::pvgis_client::{IrradianceSource, PvgisQuery, PvgisTool};
use crate::services::result_cache::{CacheKey, QueryKind, ResultCache};

/// Cache → PVGIS → normalize/estimate → cache, for each query kind.
#[derive(Debug)]
pub struct SolarProxy<S> {
    source: S,
    radiation_database: String,
    monthly_cache: ResultCache<SolarDataResponse>,
    production_cache: ResultCache<PvProductionResponse>,
    hourly_cache: ResultCache<HourlySolarDataResponse>,
}

impl<S: IrradianceSource> SolarProxy<S> {
    pub fn new(source: S, radiation_database: impl Into<String>, ttl: Duration) -> Self {
        Self {
            source,
            radiation_database: radiation_database.into(),
            monthly_cache: ResultCache::new(ttl),
            production_cache: ResultCache::new(ttl),
            hourly_cache: ResultCache::new(ttl),
        }
    }

    fn query(&self, location: GeoPoint) -> PvgisQuery {
        PvgisQuery::new(location, &self.radiation_database)
    }

    /// Monthly horizontal irradiation (MRcalc).
    pub async fn solar_data(&self, location: GeoPoint) -> Result<SolarDataResponse, ProxyError> {
        let key = CacheKey::new(QueryKind::MonthlyIrradiance)
            .num("lat", location.latitude)
            .num("lon", location.longitude);
        if let Some(hit) = self.monthly_cache.get(&key) {
            debug!(key = key.as_str(), "cache hit");
            return Ok(hit);
        }

        let query = self.query(location).int("horirrad", 1);
        let payload = self.source.fetch(PvgisTool::MRcalc, &query).await?;

        let response = match normalize_monthly_irradiance(&payload)? {
            Some(series) => SolarDataResponse {
                latitude: location.latitude,
                longitude: location.longitude,
                solar_data_available: true,
                annual_irradiance_kwh_m2: series.annual,
                monthly_irradiance: series
                    .monthly
                    .into_iter()
                    .map(|(month, irradiance_kwh_m2)| {
                        Ok(MonthlyIrradiance {
                            month,
                            month_name: month_name(month)?.to_string(),
                            irradiance_kwh_m2,
                        })
                    })
                    .collect::<Result<Vec<_>, ProxyError>>()?,
            },
            None => {
                info!(lat = location.latitude, lon = location.longitude, "no monthly data in PVGIS payload");
                SolarDataResponse {
                    latitude: location.latitude,
                    longitude: location.longitude,
                    solar_data_available: false,
                    annual_irradiance_kwh_m2: 0.0,
                    monthly_irradiance: Vec::new(),
                }
            }
        };

        self.monthly_cache.insert(key, response.clone());
        Ok(response)
    }

    /// Fixed-system production estimated by PVGIS itself (PVcalc).
    pub async fn pv_production(
        &self,
        request: &PvSystemRequest,
    ) -> Result<PvProductionResponse, ProxyError> {
        let location = request.location;
        let key = CacheKey::new(QueryKind::PvProduction)
            .num("lat", location.latitude)
            .num("lon", location.longitude)
            .num("peakpower", request.peak_power_kwp)
            .num("loss", request.system_losses_pct)
            .opt_num("angle", request.inclination_deg)
            .opt_num("aspect", request.azimuth_deg)
            .flag("optimal", request.optimal_angles);
        if let Some(hit) = self.production_cache.get(&key) {
            debug!(key = key.as_str(), "cache hit");
            return Ok(hit);
        }

        let mut query = self
            .query(location)
            .num("peakpower", request.peak_power_kwp)
            .num("loss", request.system_losses_pct)
            .text("mountingplace", "free");
        if request.optimal_angles {
            query = query.int("optimalangles", 1).int("optimalinclination", 1);
        } else {
            if let Some(angle) = request.inclination_deg {
                query = query.num("angle", angle);
            }
            if let Some(aspect) = request.azimuth_deg {
                query = query.num("aspect", aspect);
            }
        }
        let payload = self.source.fetch(PvgisTool::PVcalc, &query).await?;

        let angles = request
            .optimal_angles
            .then(|| optimal_angles(&payload))
            .flatten();
        let response = match normalize_production(&payload)? {
            Some(series) => PvProductionResponse {
                latitude: location.latitude,
                longitude: location.longitude,
                solar_data_available: true,
                annual_energy_kwh: series.annual_energy_kwh,
                annual_irradiance_kwh_m2: series.annual_irradiance_kwh_m2,
                total_loss_pct: series.total_loss_pct,
                monthly: series
                    .monthly
                    .into_iter()
                    .map(|(month, energy_kwh, irradiance_kwh_m2)| {
                        Ok(MonthlyProduction {
                            month,
                            month_name: month_name(month)?.to_string(),
                            energy_kwh,
                            irradiance_kwh_m2,
                        })
                    })
                    .collect::<Result<Vec<_>, ProxyError>>()?,
                optimal_angles: angles,
            },
            None => {
                info!(lat = location.latitude, lon = location.longitude, "no production data in PVGIS payload");
                PvProductionResponse {
                    latitude: location.latitude,
                    longitude: location.longitude,
                    solar_data_available: false,
                    annual_energy_kwh: 0.0,
                    annual_irradiance_kwh_m2: 0.0,
                    total_loss_pct: None,
                    monthly: Vec::new(),
                    optimal_angles: angles,
                }
            }
        };

        self.production_cache.insert(key, response.clone());
        Ok(response)
    }

    /// Hourly series (seriescalc) run through the local production estimator.
    pub async fn hourly_estimate(
        &self,
        request: &HourlyRequest,
    ) -> Result<HourlySolarDataResponse, ProxyError> {
        let location = request.location;
        let system = &request.system;
        let key = CacheKey::new(QueryKind::HourlySeries)
            .num("lat", location.latitude)
            .num("lon", location.longitude)
            .num("angle", system.tilt_deg)
            .opt_num("aspect", system.azimuth_deg)
            .num("efficiency", system.panel_efficiency)
            .num("area", system.panel_area_m2)
            .int("panels", system.panel_count as i64)
            .num("inverter", system.inverter_efficiency)
            .num("tempcoeff", system.temperature_coefficient)
            .num("noct", system.noct_c)
            .int("startyear", request.years.start as i64)
            .int("endyear", request.years.end as i64);
        if let Some(hit) = self.hourly_cache.get(&key) {
            debug!(key = key.as_str(), "cache hit");
            return Ok(hit);
        }

        let mut query = self
            .query(location)
            .int("startyear", request.years.start as i64)
            .int("endyear", request.years.end as i64)
            .text("mountingplace", "free")
            .int("pvcalculation", 0)
            .int("components", 1);
        query = match system.azimuth_deg {
            None => query.int("optimalangles", 1).int("optimalinclination", 1),
            Some(aspect) => query.num("angle", system.tilt_deg).num("aspect", aspect),
        };
        let payload = self.source.fetch(PvgisTool::SeriesCalc, &query).await?;

        let angles = system
            .wants_optimal_angles()
            .then(|| optimal_angles(&payload))
            .flatten();
        let (observations, rows_dropped) = match normalize_hourly(&payload) {
            Some(series) => {
                debug!(layout = ?series.layout, rows = series.observations.len(), "hourly series located");
                (series.observations, series.rows_dropped)
            }
            None => {
                info!(lat = location.latitude, lon = location.longitude, "no hourly data in PVGIS payload");
                (Vec::new(), 0)
            }
        };

        let mut estimate = estimate_annual(&observations, system, angles);
        estimate.rows_skipped += rows_dropped;
        info!(
            lat = location.latitude,
            lon = location.longitude,
            annual_kwh = estimate.annual_energy_kwh,
            years = estimate.years_covered,
            rows = estimate.rows_used,
            "hourly production estimated"
        );

        let response = HourlySolarDataResponse {
            latitude: location.latitude,
            longitude: location.longitude,
            solar_data_available: estimate.rows_used > 0,
            estimate,
        };
        self.hourly_cache.insert(key, response.clone());
        Ok(response)
    }

    pub fn cached_entries(&self) -> usize {
        self.monthly_cache.len() + self.production_cache.len() + self.hourly_cache.len()
    }

    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        self.monthly_cache.purge_expired(now)
            + self.production_cache.purge_expired(now)
            + self.hourly_cache.purge_expired(now)
    }
}
