use axum::{
    extract::{Query, State},
    Json,
};

use crate::errors::ProxyError;
use crate::models::solar::{
    HealthStatus, HourlyQuery, HourlySolarDataResponse, LocationQuery, PvProductionResponse,
    PvSystemParameters, SolarDataResponse,
};
use crate::shared_state::AppState;

/// GET /api/solar-proxy/solar-data
/// Monthly horizontal irradiation for a point
///
/// Averages multi-year monthly samples per month; the annual figure is the
/// sum of those averages. Responds with `solar_data_available = false` when
/// PVGIS returns no usable monthly series.
#[utoipa::path(
    get,
    path = "/api/solar-proxy/solar-data",
    params(LocationQuery),
    responses(
        (status = 200, description = "Monthly irradiation", body = SolarDataResponse),
        (status = 400, description = "Missing or out-of-range coordinates"),
        (status = 502, description = "PVGIS unreachable or returned an invalid payload"),
        (status = 504, description = "PVGIS timed out")
    )
)]
pub async fn get_solar_data(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<SolarDataResponse>, ProxyError> {
    let location = query.validate()?;
    Ok(Json(state.proxy.solar_data(location).await?))
}

/// POST /api/solar-proxy/pv-system-production
/// Production of a grid-connected system as computed by PVGIS
#[utoipa::path(
    post,
    path = "/api/solar-proxy/pv-system-production",
    request_body = PvSystemParameters,
    responses(
        (status = 200, description = "Monthly and annual production", body = PvProductionResponse),
        (status = 400, description = "Invalid system parameters"),
        (status = 502, description = "PVGIS unreachable or returned an invalid payload"),
        (status = 504, description = "PVGIS timed out")
    )
)]
pub async fn post_pv_system_production(
    State(state): State<AppState>,
    Json(params): Json<PvSystemParameters>,
) -> Result<Json<PvProductionResponse>, ProxyError> {
    let request = params.validate()?;
    Ok(Json(state.proxy.pv_production(&request).await?))
}

/// GET /api/solar-proxy/hourly-solar-data
/// Hourly series estimated locally with the panel/inverter parameters
///
/// Omitted panel parameters fall back to a 10 × 1.6 m² array at 20 %
/// efficiency behind a 95 % inverter, 2005–2020.
#[utoipa::path(
    get,
    path = "/api/solar-proxy/hourly-solar-data",
    params(HourlyQuery),
    responses(
        (status = 200, description = "Average-year AC energy", body = HourlySolarDataResponse),
        (status = 400, description = "Invalid coordinates, panel parameters or year range"),
        (status = 502, description = "PVGIS unreachable or returned an invalid payload"),
        (status = 504, description = "PVGIS timed out")
    )
)]
pub async fn get_hourly_solar_data(
    State(state): State<AppState>,
    Query(query): Query<HourlyQuery>,
) -> Result<Json<HourlySolarDataResponse>, ProxyError> {
    let request = query.validate()?;
    Ok(Json(state.proxy.hourly_estimate(&request).await?))
}

/// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthStatus)
    )
)]
pub async fn get_health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_entries: state.proxy.cached_entries(),
    })
}
