pub mod normalizer;
pub mod production_estimator;
pub mod pvgis_client;
pub mod result_cache;
pub mod solar_proxy;
