pub mod api;
pub mod export;
pub mod health_checker;
pub mod query_engine;

pub use api::{BackendApi, HttpBackendApi};
pub use health_checker::{HealthCheckEvent, HealthChecker, HealthMetrics};
pub use query_engine::{QueryEngine, ResultSet};
