//! Log output setup.
//!
//! Development gets pretty, human-readable logs; production gets flattened
//! JSON lines carrying the request span fields. `RUST_LOG` overrides the
//! default filter in both cases (e.g. `RUST_LOG=qf_engine=trace,sqlx=info`).

use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Environment;

const DEVELOPMENT_FILTER: &str = "debug,qf_engine=debug,tower_http=debug,sqlx=warn";
const PRODUCTION_FILTER: &str = "info,qf_engine=info,tower_http=info,sqlx=warn";

/// Install the global subscriber. Call once, before anything logs.
pub fn init_tracing(env: &Environment) {
    let default_filter = if env.is_development() {
        DEVELOPMENT_FILTER
    } else {
        PRODUCTION_FILTER
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if env.is_development() {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .pretty()
                    .with_filter(env_filter),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .flatten_event(true)
                    .with_target(true)
                    .with_filter(env_filter),
            )
            .init();
    }

    tracing::info!(environment = ?env, "tracing initialized");
}
