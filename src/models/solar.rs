use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::ProxyError;

// ─── Query identity ──────────────────────────────────────────────────────────

/// Geographic coordinates of a query. Only constructed through [`GeoPoint::new`],
/// so a value in hand is always within range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ProxyError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(ProxyError::InvalidInput(format!(
                "latitude must be within [-90, 90], got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(ProxyError::InvalidInput(format!(
                "longitude must be within [-180, 180], got {longitude}"
            )));
        }
        Ok(Self { latitude, longitude })
    }
}

/// Inclusive range of calendar years requested from the hourly series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Result<Self, ProxyError> {
        if start > end {
            return Err(ProxyError::InvalidInput(format!(
                "start year {start} is after end year {end}"
            )));
        }
        Ok(Self { start, end })
    }
}

// ─── Panel / inverter parameters ─────────────────────────────────────────────

pub const DEFAULT_NOCT_C: f64 = 45.0;

/// Panel and inverter parameters for one estimation.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSystemConfig {
    /// Panel efficiency as a fraction (0, 1]
    pub panel_efficiency: f64,
    /// Area of a single panel (m²)
    pub panel_area_m2: f64,
    pub panel_count: u32,
    /// Inverter efficiency as a fraction (0, 1]
    pub inverter_efficiency: f64,
    /// Power temperature coefficient, fraction per °C (≤ 0)
    pub temperature_coefficient: f64,
    /// Nominal Operating Cell Temperature (°C)
    pub noct_c: f64,
    pub tilt_deg: f64,
    /// `None` asks the source for the optimal orientation
    pub azimuth_deg: Option<f64>,
}

impl PanelSystemConfig {
    pub fn validate(self) -> Result<Self, ProxyError> {
        let fraction = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(ProxyError::InvalidInput(format!(
                    "{name} must be a fraction in (0, 1], got {v}"
                )))
            }
        };
        fraction("panel efficiency", self.panel_efficiency)?;
        fraction("inverter efficiency", self.inverter_efficiency)?;

        if !(self.panel_area_m2.is_finite() && self.panel_area_m2 > 0.0) {
            return Err(ProxyError::InvalidInput(format!(
                "panel area must be positive, got {}",
                self.panel_area_m2
            )));
        }
        if self.panel_count == 0 {
            return Err(ProxyError::InvalidInput(
                "panel count must be at least 1".to_string(),
            ));
        }
        if !(self.temperature_coefficient.is_finite() && self.temperature_coefficient <= 0.0) {
            return Err(ProxyError::InvalidInput(format!(
                "temperature coefficient must be zero or negative, got {}",
                self.temperature_coefficient
            )));
        }
        if !self.noct_c.is_finite() || !self.tilt_deg.is_finite() {
            return Err(ProxyError::InvalidInput(
                "NOCT and tilt must be finite numbers".to_string(),
            ));
        }
        if self.azimuth_deg.is_some_and(|a| !a.is_finite()) {
            return Err(ProxyError::InvalidInput(
                "azimuth must be a finite number".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn wants_optimal_angles(&self) -> bool {
        self.azimuth_deg.is_none()
    }
}

// ─── Time series & aggregates ────────────────────────────────────────────────

/// One row of an hourly irradiance series.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyObservation {
    /// Source timestamp, `YYYYMMDD:HHMM`
    pub time: String,
    /// Plane-of-array irradiance (W/m²)
    pub irradiance_w_m2: f64,
    /// Ambient air temperature (°C)
    pub air_temp_c: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyEnergy {
    pub month: u32,
    pub month_name: String,
    pub energy_kwh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct OptimalAngles {
    pub tilt_deg: f64,
    pub azimuth_deg: f64,
}

/// Long-term average year derived from an hourly series.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AnnualEstimate {
    pub annual_energy_kwh: f64,
    /// Always 12 entries, January first
    pub monthly_energy: Vec<MonthlyEnergy>,
    pub optimal_angles: Option<OptimalAngles>,
    /// Most distinct calendar years any single month was averaged over
    pub years_covered: u32,
    pub rows_used: usize,
    pub rows_skipped: usize,
}

/// Instantaneous output for one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourlyProduction {
    pub cell_temp_c: f64,
    pub temperature_factor: f64,
    pub panel_dc_kw: f64,
    pub system_dc_kw: f64,
    pub system_ac_kw: f64,
}

// ─── Monthly irradiance (MRcalc) ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyIrradiance {
    pub month: u32,
    pub month_name: String,
    pub irradiance_kwh_m2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SolarDataResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub solar_data_available: bool,
    pub annual_irradiance_kwh_m2: f64,
    pub monthly_irradiance: Vec<MonthlyIrradiance>,
}

// ─── Fixed-system production (PVcalc) ────────────────────────────────────────

/// Body of `POST /api/solar-proxy/pv-system-production`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PvSystemParameters {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Nominal peak power (kWp)
    pub peak_power: Option<f64>,
    /// Total system losses (%)
    pub system_losses: Option<f64>,
    pub inclination_angle: Option<f64>,
    pub azimuth_angle: Option<f64>,
    #[serde(default)]
    pub get_optimal_angles: bool,
}

/// Validated form of [`PvSystemParameters`].
#[derive(Debug, Clone, PartialEq)]
pub struct PvSystemRequest {
    pub location: GeoPoint,
    pub peak_power_kwp: f64,
    pub system_losses_pct: f64,
    pub inclination_deg: Option<f64>,
    pub azimuth_deg: Option<f64>,
    pub optimal_angles: bool,
}

impl PvSystemParameters {
    pub fn validate(self) -> Result<PvSystemRequest, ProxyError> {
        let location = GeoPoint::new(
            required(self.latitude, "latitude")?,
            required(self.longitude, "longitude")?,
        )?;
        let peak_power_kwp = required(self.peak_power, "peakPower")?;
        if !(peak_power_kwp.is_finite() && peak_power_kwp > 0.0) {
            return Err(ProxyError::InvalidInput(format!(
                "peak power must be positive, got {peak_power_kwp}"
            )));
        }
        let system_losses_pct = required(self.system_losses, "systemLosses")?;
        if !(0.0..=100.0).contains(&system_losses_pct) {
            return Err(ProxyError::InvalidInput(format!(
                "system losses must be a percentage in [0, 100], got {system_losses_pct}"
            )));
        }
        Ok(PvSystemRequest {
            location,
            peak_power_kwp,
            system_losses_pct,
            inclination_deg: self.inclination_angle,
            azimuth_deg: self.azimuth_angle,
            optimal_angles: self.get_optimal_angles,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyProduction {
    pub month: u32,
    pub month_name: String,
    pub energy_kwh: f64,
    pub irradiance_kwh_m2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PvProductionResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub solar_data_available: bool,
    pub annual_energy_kwh: f64,
    pub annual_irradiance_kwh_m2: f64,
    pub total_loss_pct: Option<f64>,
    pub monthly: Vec<MonthlyProduction>,
    pub optimal_angles: Option<OptimalAngles>,
}

// ─── Hourly series + estimation (seriescalc) ─────────────────────────────────

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct HourlyQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Panel inclination (deg)
    pub angle: Option<f64>,
    /// Panel azimuth (deg, 0 = south)
    pub aspect: Option<f64>,
    pub panel_efficiency: Option<f64>,
    pub panel_area: Option<f64>,
    pub number_of_panels: Option<u32>,
    pub inverter_efficiency: Option<f64>,
    pub temperature_coefficient: Option<f64>,
    pub noct: Option<f64>,
    #[serde(rename = "startyear")]
    pub start_year: Option<i32>,
    #[serde(rename = "endyear")]
    pub end_year: Option<i32>,
    #[serde(rename = "useoptimalangles", default)]
    pub use_optimal_angles: bool,
}

/// Validated form of [`HourlyQuery`].
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRequest {
    pub location: GeoPoint,
    pub system: PanelSystemConfig,
    pub years: YearRange,
}

impl HourlyQuery {
    pub fn validate(self) -> Result<HourlyRequest, ProxyError> {
        let location = GeoPoint::new(required(self.lat, "lat")?, required(self.lng, "lng")?)?;
        let system = PanelSystemConfig {
            panel_efficiency: self.panel_efficiency.unwrap_or(0.20),
            panel_area_m2: self.panel_area.unwrap_or(1.6),
            panel_count: self.number_of_panels.unwrap_or(10),
            inverter_efficiency: self.inverter_efficiency.unwrap_or(0.95),
            temperature_coefficient: self.temperature_coefficient.unwrap_or(-0.004),
            noct_c: self.noct.unwrap_or(DEFAULT_NOCT_C),
            tilt_deg: self.angle.unwrap_or(30.0),
            azimuth_deg: if self.use_optimal_angles {
                None
            } else {
                Some(self.aspect.unwrap_or(0.0))
            },
        }
        .validate()?;
        let years = YearRange::new(
            self.start_year.unwrap_or(2005),
            self.end_year.unwrap_or(2020),
        )?;
        Ok(HourlyRequest { location, system, years })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HourlySolarDataResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub solar_data_available: bool,
    #[serde(flatten)]
    pub estimate: AnnualEstimate,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl LocationQuery {
    pub fn validate(self) -> Result<GeoPoint, ProxyError> {
        GeoPoint::new(required(self.lat, "lat")?, required(self.lng, "lng")?)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub cached_entries: usize,
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, ProxyError> {
    value.ok_or_else(|| ProxyError::InvalidInput(format!("missing required parameter '{name}'")))
}
