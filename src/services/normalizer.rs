/// PVGIS payload normalizer
///
/// The irradiance service has changed field names and nesting across its
/// versions. Each query kind lists the payload layouts we know about, in
/// priority order; the first layout whose rows are present and well-formed
/// wins. A payload matching no layout is reported as "no data" (`Ok(None)`),
/// while a payload that matches but carries an impossible month is an error.

use std::collections::BTreeMap;

use chrono::Month;
use serde_json::Value;

use crate::errors::NormalizeError;
use crate::models::solar::{HourlyObservation, OptimalAngles};

// ─── Month helpers ───────────────────────────────────────────────────────────

pub fn month_name(month: u32) -> Result<&'static str, NormalizeError> {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name())
        .ok_or(NormalizeError::MonthOutOfRange(month as i64))
}

fn checked_month(raw: i64) -> Result<u32, NormalizeError> {
    if (1..=12).contains(&raw) {
        Ok(raw as u32)
    } else {
        Err(NormalizeError::MonthOutOfRange(raw))
    }
}

/// Group `(month, value)` samples by month and average each group.
///
/// Sources with a year dimension list one sample per month per year; the
/// per-month mean is the figure that represents a typical month.
fn average_by_month<const N: usize>(
    samples: impl IntoIterator<Item = (i64, [f64; N])>,
) -> Result<Vec<(u32, [f64; N])>, NormalizeError> {
    let mut groups: BTreeMap<u32, ([f64; N], usize)> = BTreeMap::new();
    for (raw_month, values) in samples {
        let month = checked_month(raw_month)?;
        let (sums, count) = groups.entry(month).or_insert(([0.0; N], 0));
        for (sum, v) in sums.iter_mut().zip(values) {
            *sum += v;
        }
        *count += 1;
    }
    Ok(groups
        .into_iter()
        .map(|(month, (sums, count))| (month, sums.map(|s| s / count as f64)))
        .collect())
}

fn number(row: &Value, field: &str) -> Option<f64> {
    row.get(field).and_then(Value::as_f64)
}

fn rows_at<'a>(payload: &'a Value, pointer: &str) -> Option<&'a [Value]> {
    payload
        .pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .filter(|rows| !rows.is_empty())
}

// ─── Monthly irradiance (MRcalc) ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthlyIrradianceLayout {
    /// `outputs.monthly[]` rows with `H(h)_m` (PVGIS 5.x)
    Horizontal,
    /// `outputs.monthly[]` rows with `H_h_m`
    LegacyHorizontal,
    /// `outputs.monthly.fixed[]` rows with `H(i)_m` (in-plane irradiation)
    FixedPlane,
}

impl MonthlyIrradianceLayout {
    pub const PRIORITY: [Self; 3] = [Self::Horizontal, Self::LegacyHorizontal, Self::FixedPlane];

    fn pointer(self) -> &'static str {
        match self {
            Self::Horizontal | Self::LegacyHorizontal => "/outputs/monthly",
            Self::FixedPlane => "/outputs/monthly/fixed",
        }
    }

    fn value_field(self) -> &'static str {
        match self {
            Self::Horizontal => "H(h)_m",
            Self::LegacyHorizontal => "H_h_m",
            Self::FixedPlane => "H(i)_m",
        }
    }

    fn samples(self, payload: &Value) -> Option<Vec<(i64, [f64; 1])>> {
        let field = self.value_field();
        rows_at(payload, self.pointer())?
            .iter()
            .map(|row| Some((row.get("month")?.as_i64()?, [number(row, field)?])))
            .collect()
    }
}

/// Monthly series normalized to one value per month, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySeries {
    pub monthly: Vec<(u32, f64)>,
    /// Sum of the per-month averages
    pub annual: f64,
}

pub fn normalize_monthly_irradiance(payload: &Value) -> Result<Option<MonthlySeries>, NormalizeError> {
    let Some(samples) = MonthlyIrradianceLayout::PRIORITY
        .into_iter()
        .find_map(|layout| layout.samples(payload))
    else {
        return Ok(None);
    };

    let monthly: Vec<(u32, f64)> = average_by_month(samples)?
        .into_iter()
        .map(|(month, [v])| (month, v))
        .collect();
    let annual: f64 = monthly.iter().map(|(_, v)| v).sum();
    Ok(Some(MonthlySeries { monthly, annual }))
}

// ─── Fixed-system production (PVcalc) ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionLayout {
    /// `outputs.monthly.fixed[]` (`E_m`, `H(i)_m`) and `outputs.totals.fixed`
    FixedMount,
    /// `outputs.monthly[]` (`E_PV`, `E_G`) and `outputs.annual`
    Legacy,
}

impl ProductionLayout {
    pub const PRIORITY: [Self; 2] = [Self::FixedMount, Self::Legacy];

    fn monthly_pointer(self) -> &'static str {
        match self {
            Self::FixedMount => "/outputs/monthly/fixed",
            Self::Legacy => "/outputs/monthly",
        }
    }

    fn totals_pointer(self) -> &'static str {
        match self {
            Self::FixedMount => "/outputs/totals/fixed",
            Self::Legacy => "/outputs/annual",
        }
    }

    /// (monthly energy, monthly irradiation, annual energy, annual irradiation, total loss)
    fn fields(self) -> [&'static str; 5] {
        match self {
            Self::FixedMount => ["E_m", "H(i)_m", "E_y", "H(i)_y", "l_total"],
            Self::Legacy => ["E_PV", "E_G", "E_PV", "E_G", "L_total"],
        }
    }

    fn samples(self, payload: &Value) -> Option<Vec<(i64, [f64; 2])>> {
        let [energy, irradiance, ..] = self.fields();
        rows_at(payload, self.monthly_pointer())?
            .iter()
            .map(|row| {
                Some((
                    row.get("month")?.as_i64()?,
                    [number(row, energy)?, number(row, irradiance)?],
                ))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductionSeries {
    /// (month, energy kWh, in-plane irradiation kWh/m²)
    pub monthly: Vec<(u32, f64, f64)>,
    pub annual_energy_kwh: f64,
    pub annual_irradiance_kwh_m2: f64,
    pub total_loss_pct: Option<f64>,
}

pub fn normalize_production(payload: &Value) -> Result<Option<ProductionSeries>, NormalizeError> {
    let Some((layout, samples)) = ProductionLayout::PRIORITY
        .into_iter()
        .find_map(|layout| Some((layout, layout.samples(payload)?)))
    else {
        return Ok(None);
    };

    let monthly: Vec<(u32, f64, f64)> = average_by_month(samples)?
        .into_iter()
        .map(|(month, [e, h])| (month, e, h))
        .collect();

    let [_, _, annual_energy, annual_irradiance, loss] = layout.fields();
    let totals = payload.pointer(layout.totals_pointer());
    let total = |field: &str| totals.and_then(|t| number(t, field));

    Ok(Some(ProductionSeries {
        annual_energy_kwh: total(annual_energy)
            .unwrap_or_else(|| monthly.iter().map(|(_, e, _)| e).sum()),
        annual_irradiance_kwh_m2: total(annual_irradiance)
            .unwrap_or_else(|| monthly.iter().map(|(_, _, h)| h).sum()),
        total_loss_pct: total(loss),
        monthly,
    }))
}

// ─── Hourly series (seriescalc) ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HourlyLayout {
    /// `outputs.hourly[]` with `G(i)` (or its `Gb/Gd/Gr` components) and `T2m`
    Hourly,
    /// `outputs.tmy[]` with `G_tilt` and `Temp`
    TypicalYear,
}

impl HourlyLayout {
    pub const PRIORITY: [Self; 2] = [Self::Hourly, Self::TypicalYear];

    fn pointer(self) -> &'static str {
        match self {
            Self::Hourly => "/outputs/hourly",
            Self::TypicalYear => "/outputs/tmy",
        }
    }

    fn irradiance(self, row: &Value) -> Option<f64> {
        match self {
            Self::Hourly => number(row, "G(i)").or_else(|| {
                let components = ["Gb(i)", "Gd(i)", "Gr(i)"].map(|f| number(row, f));
                // Requests with components=1 split G(i) into beam, diffuse and reflected.
                components
                    .iter()
                    .any(Option::is_some)
                    .then(|| components.iter().flatten().sum())
            }),
            Self::TypicalYear => number(row, "G_tilt"),
        }
    }

    fn temperature(self, row: &Value) -> Option<f64> {
        match self {
            Self::Hourly => number(row, "T2m"),
            Self::TypicalYear => number(row, "Temp"),
        }
    }

    fn observation(self, row: &Value) -> Option<HourlyObservation> {
        Some(HourlyObservation {
            time: row.get("time")?.as_str()?.to_string(),
            irradiance_w_m2: self.irradiance(row)?,
            air_temp_c: self.temperature(row)?,
        })
    }

    pub fn detect(payload: &Value) -> Option<(Self, &[Value])> {
        Self::PRIORITY
            .into_iter()
            .find_map(|layout| Some((layout, rows_at(payload, layout.pointer())?)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries {
    pub layout: HourlyLayout,
    pub observations: Vec<HourlyObservation>,
    /// Rows lacking a timestamp string or a numeric irradiance/temperature
    pub rows_dropped: usize,
}

/// Extract hourly observations. Rows with missing fields are dropped and
/// counted; timestamps are passed through unparsed for the estimator to vet.
pub fn normalize_hourly(payload: &Value) -> Option<HourlySeries> {
    let (layout, rows) = HourlyLayout::detect(payload)?;
    let observations: Vec<HourlyObservation> =
        rows.iter().filter_map(|row| layout.observation(row)).collect();
    Some(HourlySeries {
        layout,
        rows_dropped: rows.len() - observations.len(),
        observations,
    })
}

// ─── Optimal angles ──────────────────────────────────────────────────────────

const OPTIMAL_ANGLE_POINTERS: [(&str, &str); 2] = [
    (
        "/inputs/mounting_system/fixed/slope/value",
        "/inputs/mounting_system/fixed/azimuth/value",
    ),
    ("/outputs/optimal_angles/angle/value", "/outputs/optimal_angles/aspect/value"),
];

/// Tilt/azimuth reported by the source, when it reports both.
pub fn optimal_angles(payload: &Value) -> Option<OptimalAngles> {
    OPTIMAL_ANGLE_POINTERS.iter().find_map(|(tilt, azimuth)| {
        Some(OptimalAngles {
            tilt_deg: payload.pointer(tilt)?.as_f64()?,
            azimuth_deg: payload.pointer(azimuth)?.as_f64()?,
        })
    })
}
