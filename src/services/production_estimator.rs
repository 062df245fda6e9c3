/// ============================================================
///  PV Production Estimator
///
///  Per hourly observation:
///   1. Cell temperature  – linear NOCT model (800 W/m², 20 °C ambient)
///   2. Thermal derating  – 1 + γ × (T_cell − 25 °C)   (STC reference)
///   3. DC power          – (G/1000) × A × η_panel × derating, per panel
///   4. AC power          – DC × panel count × η_inverter
///   5. Energy            – one-hour step, so kWh == kW
///
///  Aggregation buckets energy by calendar month and divides each month by
///  the number of distinct years that month was observed in, giving a
///  long-term average year. A typical meteorological year, whose months
///  come from different source years, therefore counts once per month.
/// ============================================================

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDateTime};

use crate::models::solar::{
    AnnualEstimate, HourlyObservation, HourlyProduction, MonthlyEnergy, OptimalAngles,
    PanelSystemConfig,
};
use crate::services::normalizer::month_name;

// ─── Reference conditions ────────────────────────────────────
const STC_CELL_TEMP_C: f64 = 25.0;
const STC_IRRADIANCE_W_M2: f64 = 1000.0;
const NOCT_IRRADIANCE_W_M2: f64 = 800.0;
const NOCT_AMBIENT_C: f64 = 20.0;

const TIMESTAMP_FORMAT: &str = "%Y%m%d:%H%M";

fn estimate_cell_temperature(air_temp_c: f64, g_w_m2: f64, noct_c: f64) -> f64 {
    if g_w_m2 <= 0.0 {
        return air_temp_c;
    }
    air_temp_c + (noct_c - NOCT_AMBIENT_C) * (g_w_m2 / NOCT_IRRADIANCE_W_M2)
}

/// Output of the configured system for a single observation.
pub fn estimate_hour(g_w_m2: f64, air_temp_c: f64, system: &PanelSystemConfig) -> HourlyProduction {
    let cell_temp_c = estimate_cell_temperature(air_temp_c, g_w_m2, system.noct_c);
    let temperature_factor =
        1.0 + system.temperature_coefficient * (cell_temp_c - STC_CELL_TEMP_C);

    let panel_dc_kw = ((g_w_m2 / STC_IRRADIANCE_W_M2)
        * system.panel_area_m2
        * system.panel_efficiency
        * temperature_factor)
        .max(0.0);
    let system_dc_kw = panel_dc_kw * system.panel_count as f64;
    let system_ac_kw = system_dc_kw * system.inverter_efficiency;

    HourlyProduction {
        cell_temp_c,
        temperature_factor,
        panel_dc_kw,
        system_dc_kw,
        system_ac_kw,
    }
}

/// `(year, month)` of a `YYYYMMDD:HHMM` timestamp, or `None` when malformed.
fn parse_year_month(time: &str) -> Option<(i32, u32)> {
    let ts = NaiveDateTime::parse_from_str(time.trim(), TIMESTAMP_FORMAT).ok()?;
    Some((ts.year(), ts.month()))
}

/// Aggregate an hourly series into an average year.
///
/// Rows whose timestamp cannot be parsed are skipped and counted in
/// `rows_skipped`; they never abort the aggregation.
pub fn estimate_annual(
    observations: &[HourlyObservation],
    system: &PanelSystemConfig,
    optimal_angles: Option<OptimalAngles>,
) -> AnnualEstimate {
    let mut monthly_kwh = [0.0_f64; 12];
    let mut years_by_month: [BTreeSet<i32>; 12] = Default::default();
    let mut rows_used = 0;
    let mut rows_skipped = 0;

    for obs in observations {
        let Some((year, month)) = parse_year_month(&obs.time) else {
            #[cfg(feature = "verbose_log")]
            tracing::trace!(time = %obs.time, "skipping row with malformed timestamp");
            rows_skipped += 1;
            continue;
        };
        let slot = (month - 1) as usize;
        years_by_month[slot].insert(year);
        rows_used += 1;

        if obs.irradiance_w_m2 <= 0.0 {
            continue;
        }
        let hour = estimate_hour(obs.irradiance_w_m2, obs.air_temp_c, system);
        tracing::trace!(
            time = %obs.time,
            cell_temp_c = hour.cell_temp_c,
            temperature_factor = hour.temperature_factor,
            panel_dc_kw = hour.panel_dc_kw,
            system_dc_kw = hour.system_dc_kw,
            system_ac_kw = hour.system_ac_kw,
            "hourly output"
        );
        // One-hour step: kW over the hour is kWh.
        monthly_kwh[slot] += hour.system_ac_kw;
    }

    for (energy, years) in monthly_kwh.iter_mut().zip(&years_by_month) {
        if years.len() > 1 {
            *energy /= years.len() as f64;
        }
    }
    let years_covered = years_by_month.iter().map(BTreeSet::len).max().unwrap_or(0) as u32;

    let monthly_energy: Vec<MonthlyEnergy> = (1..=12u32)
        .zip(monthly_kwh)
        .map(|(month, energy_kwh)| MonthlyEnergy {
            month,
            month_name: month_name(month).unwrap_or_default().to_string(),
            energy_kwh,
        })
        .collect();

    if rows_skipped > 0 {
        tracing::debug!(rows_skipped, rows_used, "hourly rows skipped during aggregation");
    }

    AnnualEstimate {
        annual_energy_kwh: monthly_kwh.iter().sum(),
        monthly_energy,
        optimal_angles,
        years_covered,
        rows_used,
        rows_skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Timelike;

    fn scenario_system() -> PanelSystemConfig {
        PanelSystemConfig {
            panel_efficiency: 0.20,
            panel_area_m2: 1.6,
            panel_count: 10,
            inverter_efficiency: 0.95,
            temperature_coefficient: -0.004,
            noct_c: 45.0,
            tilt_deg: 30.0,
            azimuth_deg: Some(0.0),
        }
    }

    fn obs(time: &str, g: f64, t: f64) -> HourlyObservation {
        HourlyObservation {
            time: time.to_string(),
            irradiance_w_m2: g,
            air_temp_c: t,
        }
    }

    /// Every hour of a non-leap year with a diurnal irradiance bump from 08:00 to 16:00.
    fn synthetic_year(year: i32) -> Vec<HourlyObservation> {
        let start = chrono::NaiveDate::from_ymd_opt(year, 1, 1)
            .unwrap()
            .and_hms_opt(0, 10, 0)
            .unwrap();
        (0..8760)
            .map(|h| {
                let ts = start + chrono::Duration::hours(h);
                let hour = ts.hour();
                let g = if (8..=16).contains(&hour) {
                    600.0 - 60.0 * (hour as f64 - 12.0).abs()
                } else {
                    0.0
                };
                obs(&ts.format(TIMESTAMP_FORMAT).to_string(), g, 15.0)
            })
            .collect()
    }

    #[test]
    fn test_reference_scenario() {
        let hour = estimate_hour(800.0, 20.0, &scenario_system());
        assert_relative_eq!(hour.cell_temp_c, 45.0);
        assert_relative_eq!(hour.temperature_factor, 0.92, epsilon = 1e-12);
        assert_relative_eq!(hour.panel_dc_kw, 0.23552, epsilon = 1e-12);
        assert_relative_eq!(hour.system_dc_kw, 2.3552, epsilon = 1e-12);
        assert_relative_eq!(hour.system_ac_kw, 2.23744, epsilon = 1e-12);
    }

    #[test]
    fn test_night_has_no_heating_and_no_output() {
        let sys = scenario_system();
        for g in [0.0, -3.0] {
            let hour = estimate_hour(g, 12.0, &sys);
            assert_eq!(hour.cell_temp_c, 12.0);
            assert_eq!(hour.system_ac_kw, 0.0);
        }
        let est = estimate_annual(
            &[obs("20200101:0010", 0.0, 5.0), obs("20200701:0010", -1.0, 5.0)],
            &sys,
            None,
        );
        assert_eq!(est.annual_energy_kwh, 0.0);
        assert_eq!(est.rows_used, 2);
    }

    #[test]
    fn test_dc_power_floored_at_zero() {
        // Extreme heat drives the derating factor negative.
        let mut sys = scenario_system();
        sys.temperature_coefficient = -0.05;
        let hour = estimate_hour(1000.0, 40.0, &sys);
        assert!(hour.temperature_factor < 0.0);
        assert_eq!(hour.panel_dc_kw, 0.0);
        assert_eq!(hour.system_ac_kw, 0.0);
    }

    #[test]
    fn test_empty_series_gives_twelve_zero_months() {
        let est = estimate_annual(&[], &scenario_system(), None);
        assert_eq!(est.annual_energy_kwh, 0.0);
        assert_eq!(est.monthly_energy.len(), 12);
        assert!(est.monthly_energy.iter().all(|m| m.energy_kwh == 0.0));
        assert_eq!(est.years_covered, 0);
    }

    #[test]
    fn test_monthly_entries_ordered_and_named() {
        let est = estimate_annual(&synthetic_year(2021), &scenario_system(), None);
        let months: Vec<u32> = est.monthly_energy.iter().map(|m| m.month).collect();
        assert_eq!(months, (1..=12).collect::<Vec<_>>());
        assert_eq!(est.monthly_energy[0].month_name, "January");
        assert_eq!(est.monthly_energy[11].month_name, "December");
    }

    #[test]
    fn test_annual_equals_sum_of_months() {
        let est = estimate_annual(&synthetic_year(2021), &scenario_system(), None);
        let sum: f64 = est.monthly_energy.iter().map(|m| m.energy_kwh).sum();
        assert!(est.annual_energy_kwh > 0.0);
        assert_relative_eq!(est.annual_energy_kwh, sum, max_relative = 1e-12);
    }

    #[test]
    fn test_identical_years_average_to_single_year() {
        let sys = scenario_system();
        let one = estimate_annual(&synthetic_year(2021), &sys, None);

        let mut two_years = synthetic_year(2021);
        two_years.extend(synthetic_year(2022));
        let two = estimate_annual(&two_years, &sys, None);

        assert_eq!(two.years_covered, 2);
        assert_relative_eq!(two.annual_energy_kwh, one.annual_energy_kwh, max_relative = 1e-9);
        for (a, b) in one.monthly_energy.iter().zip(&two.monthly_energy) {
            assert_relative_eq!(a.energy_kwh, b.energy_kwh, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_typical_year_with_mixed_source_years_counts_once() {
        let sys = scenario_system();
        fn noon_rows(year_of: impl Fn(u32) -> u32) -> Vec<HourlyObservation> {
            (1..=12u32)
                .map(|m| obs(&format!("{}{m:02}15:1200", year_of(m)), 800.0, 20.0))
                .collect()
        }
        let tmy = estimate_annual(&noon_rows(|m| 2005 + m), &sys, None);
        let single = estimate_annual(&noon_rows(|_| 2010), &sys, None);

        assert_eq!(tmy.years_covered, 1);
        assert_relative_eq!(tmy.annual_energy_kwh, 12.0 * 2.23744, epsilon = 1e-9);
        assert_relative_eq!(tmy.annual_energy_kwh, single.annual_energy_kwh, epsilon = 1e-12);
        for (a, b) in tmy.monthly_energy.iter().zip(&single.monthly_energy) {
            assert_relative_eq!(a.energy_kwh, b.energy_kwh, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_months_divided_by_their_own_year_count() {
        // January seen in two years, July in one.
        let est = estimate_annual(
            &[
                obs("20190115:1200", 800.0, 20.0),
                obs("20200115:1200", 800.0, 20.0),
                obs("20200715:1200", 800.0, 20.0),
            ],
            &scenario_system(),
            None,
        );
        assert_eq!(est.years_covered, 2);
        assert_relative_eq!(est.monthly_energy[0].energy_kwh, 2.23744, epsilon = 1e-9);
        assert_relative_eq!(est.monthly_energy[6].energy_kwh, 2.23744, epsilon = 1e-9);
        assert_relative_eq!(est.annual_energy_kwh, 2.0 * 2.23744, epsilon = 1e-9);
    }

    #[test]
    fn test_malformed_timestamp_row_is_skipped() {
        let sys = scenario_system();
        let mut rows = synthetic_year(2021);
        assert_eq!(rows.len(), 8760);
        let noon = rows.iter().position(|r| r.time == "20210615:1210").unwrap();
        let dropped_energy = estimate_hour(rows[noon].irradiance_w_m2, 15.0, &sys).system_ac_kw;
        let full = estimate_annual(&rows, &sys, None);

        rows[noon].time = "2021-06-15 12:10".to_string();
        let est = estimate_annual(&rows, &sys, None);

        assert_eq!(est.rows_used, 8759);
        assert_eq!(est.rows_skipped, 1);
        assert_relative_eq!(
            est.annual_energy_kwh,
            full.annual_energy_kwh - dropped_energy,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_month_out_of_range_is_skipped() {
        let est = estimate_annual(
            &[obs("20201301:1200", 500.0, 20.0), obs("20200101:1200", 500.0, 20.0)],
            &scenario_system(),
            None,
        );
        assert_eq!(est.rows_skipped, 1);
        assert!(est.monthly_energy[0].energy_kwh > 0.0);
    }

    #[test]
    fn test_optimal_angles_passed_through() {
        let angles = OptimalAngles { tilt_deg: 33.0, azimuth_deg: 1.0 };
        let est = estimate_annual(&[], &scenario_system(), Some(angles));
        assert_eq!(est.optimal_angles, Some(angles));
    }
}
