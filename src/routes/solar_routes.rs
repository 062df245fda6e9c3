use axum::{
    routing::{get, post},
    Router,
};

use crate::controllers::solar_controller::{
    get_health, get_hourly_solar_data, get_solar_data, post_pv_system_production,
};
use crate::shared_state::AppState;

/// Build the `/api/*` sub-router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/solar-proxy/solar-data",           get(get_solar_data))
        .route("/solar-proxy/pv-system-production", post(post_pv_system_production))
        .route("/solar-proxy/hourly-solar-data",    get(get_hourly_solar_data))
        .route("/health",                           get(get_health))
        .with_state(state)
}
