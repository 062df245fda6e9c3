use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PvgisConfig;
use crate::errors::SourceError;
use crate::models::solar::GeoPoint;

/// PVGIS tools the proxy talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvgisTool {
    /// Monthly radiation averages
    MRcalc,
    /// Grid-connected PV system performance
    PVcalc,
    /// Hourly radiation time series
    SeriesCalc,
}

impl PvgisTool {
    pub fn path(self) -> &'static str {
        match self {
            PvgisTool::MRcalc => "MRcalc",
            PvgisTool::PVcalc => "PVcalc",
            PvgisTool::SeriesCalc => "seriescalc",
        }
    }
}

/// Render a number with `.` as decimal separator regardless of locale.
/// Rust's float `Display` never switches to exponent notation, so the
/// output is always a plain decimal literal.
pub fn format_decimal(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{value}")
}

/// Outbound query parameters, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct PvgisQuery {
    params: Vec<(&'static str, String)>,
}

impl PvgisQuery {
    pub fn new(location: GeoPoint, radiation_database: &str) -> Self {
        Self { params: Vec::new() }
            .num("lat", location.latitude)
            .num("lon", location.longitude)
            .text("raddatabase", radiation_database)
            .text("outputformat", "json")
    }

    pub fn num(mut self, name: &'static str, value: f64) -> Self {
        self.params.push((name, format_decimal(value)));
        self
    }

    pub fn int(mut self, name: &'static str, value: i64) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    pub fn text(mut self, name: &'static str, value: &str) -> Self {
        self.params.push((name, value.to_string()));
        self
    }

    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn to_query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Source of raw irradiance payloads.
pub trait IrradianceSource: Send + Sync {
    fn fetch(
        &self,
        tool: PvgisTool,
        query: &PvgisQuery,
    ) -> impl Future<Output = Result<Value, SourceError>> + Send;
}

/// HTTP client for the PVGIS REST API.
#[derive(Debug, Clone)]
pub struct PvgisClient {
    http: reqwest::Client,
    base_url: String,
}

impl PvgisClient {
    pub fn new(config: &PvgisConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self { http, base_url })
    }
}

/// PVGIS reports failures as `{"message": "...", "status": 400}`.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().chars().take(300).collect())
}

impl IrradianceSource for PvgisClient {
    async fn fetch(&self, tool: PvgisTool, query: &PvgisQuery) -> Result<Value, SourceError> {
        let url = format!("{}{}", self.base_url, tool.path());
        debug!(tool = tool.path(), query = %query.to_query_string(), "calling PVGIS");

        let response = self.http.get(&url).query(query.params()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = upstream_message(&body);
            warn!(tool = tool.path(), status = status.as_u16(), %message, "PVGIS request failed");
            return Err(SourceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            warn!(tool = tool.path(), error = %e, "PVGIS returned a non-JSON body");
            SourceError::MalformedBody(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decimal_uses_point() {
        assert_eq!(format_decimal(-37.7972), "-37.7972");
        assert_eq!(format_decimal(30.0), "30");
        assert_eq!(format_decimal(0.0000001), "0.0000001");
        assert_eq!(format_decimal(-0.0), "0");
        assert!(!format_decimal(1234567.5).contains(','));
    }

    #[test]
    fn test_query_string_order_and_base_params() {
        let q = PvgisQuery::new(GeoPoint::new(-37.5, 72.25).unwrap(), "PVGIS-ERA5")
            .int("startyear", 2005)
            .num("angle", 30.0);
        assert_eq!(
            q.to_query_string(),
            "lat=-37.5&lon=72.25&raddatabase=PVGIS-ERA5&outputformat=json&startyear=2005&angle=30"
        );
        assert_eq!(q.get("angle"), Some("30"));
        assert_eq!(q.get("aspect"), None);
    }

    #[test]
    fn test_upstream_message_extraction() {
        assert_eq!(
            upstream_message(r#"{"message":"Location over the sea.","status":400}"#),
            "Location over the sea."
        );
        assert_eq!(upstream_message("  Service Unavailable \n"), "Service Unavailable");
    }

    #[test]
    fn test_client_normalizes_base_url() {
        let cfg = PvgisConfig {
            base_url: "https://example.test/api/v5_2".to_string(),
            ..PvgisConfig::default()
        };
        let client = PvgisClient::new(&cfg).unwrap();
        assert_eq!(client.base_url, "https://example.test/api/v5_2/");
    }
}
