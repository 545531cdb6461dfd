pub mod assessment;
pub mod config;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod practice;
pub mod router;
pub mod schedule;
pub mod sessions;
pub mod state;
pub mod tracing;
pub mod usage;
pub mod validation;

pub use config::ApiConfig;
pub use state::ApiState;
