use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use qf_engine::{EngineConfig, MemorySessionStore};
use sqlx::PgPool;

use crate::{
    ApiConfig,
    config::Environment,
    sessions::{AssessmentSession, PracticeSession},
    usage::UsageLogger,
};

#[derive(Clone)]
pub struct ApiState {
    pub pool: PgPool,
    pub engine: Arc<EngineConfig>,
    pub practice: Arc<MemorySessionStore<PracticeSession>>,
    pub assessments: Arc<MemorySessionStore<AssessmentSession>>,
    pub usage: UsageLogger,
    pub metrics: Option<PrometheusHandle>,
    pub environment: Environment,
}

impl ApiState {
    pub fn new(config: &ApiConfig, pool: PgPool, usage: UsageLogger) -> anyhow::Result<Self> {
        let engine = config.engine_config()?;
        tracing::debug!(?engine, "engine configuration loaded");

        Ok(Self {
            pool,
            engine: Arc::new(engine),
            practice: Arc::new(MemorySessionStore::new()),
            assessments: Arc::new(MemorySessionStore::new()),
            usage,
            metrics: None,
            environment: config.env,
        })
    }

    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
