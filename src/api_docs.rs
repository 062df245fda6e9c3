use utoipa::OpenApi;
use crate::controllers::solar_controller;
use crate::models::solar;

#[derive(OpenApi)]
#[openapi(
    paths(
        solar_controller::get_solar_data,
        solar_controller::post_pv_system_production,
        solar_controller::get_hourly_solar_data,
        solar_controller::get_health
    ),
    components(
        schemas(
            solar::SolarDataResponse,
            solar::MonthlyIrradiance,
            solar::PvSystemParameters,
            solar::PvProductionResponse,
            solar::MonthlyProduction,
            solar::HourlySolarDataResponse,
            solar::AnnualEstimate,
            solar::MonthlyEnergy,
            solar::OptimalAngles,
            solar::HealthStatus
        )
    ),
    tags(
        (name = "solar-proxy", description = "PVGIS proxy and PV production estimates")
    )
)]
pub struct ApiDoc;
