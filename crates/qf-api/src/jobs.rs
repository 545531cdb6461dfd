//! Background tasks: the usage log writer and idle session cleanup.

use std::time::Duration;

use chrono::Utc;
use qf_db::{models::UsageLogInsert, repositories::usage};
use qf_engine::UsageRecord;
use sqlx::PgPool;
use tokio::{sync::mpsc, task::JoinHandle, time::interval};

use crate::{
    metrics,
    sessions::{is_expired, persist_assessment_result},
    state::ApiState,
};

/// Records written per insert statement.
const USAGE_BATCH_SIZE: usize = 256;
const SESSION_CLEANUP_PERIOD: Duration = Duration::from_secs(600);

/// Start all background jobs
///
/// Returns the join handles; the usage writer finishes once every
/// `UsageLogger` clone is dropped and the channel is drained.
pub fn start_background_jobs(
    state: &ApiState,
    usage_rx: mpsc::Receiver<UsageRecord>,
) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(usage_log_writer(state.pool.clone(), usage_rx)),
        tokio::spawn(session_cleanup_job(state.clone())),
    ]
}

/// Drain the usage channel into `question_usage` in batches.
///
/// Failed inserts are logged and the batch is discarded.
async fn usage_log_writer(pool: PgPool, mut rx: mpsc::Receiver<UsageRecord>) {
    let mut buffer = Vec::with_capacity(USAGE_BATCH_SIZE);

    while rx.recv_many(&mut buffer, USAGE_BATCH_SIZE).await > 0 {
        let batch: Vec<UsageLogInsert> = buffer.drain(..).map(UsageLogInsert::from).collect();

        match usage::insert_batch(&pool, &batch).await {
            Ok(written) => {
                tracing::debug!(written, "usage records written");
                metrics::record_usage_written(written, true);
            }
            Err(e) => {
                tracing::warn!(records = batch.len(), "failed to write usage records: {e}");
                metrics::record_usage_written(batch.len() as u64, false);
            }
        }
    }

    tracing::info!("usage log channel closed, writer stopped");
}

/// Evict practice and assessment sessions idle for too long.
///
/// Completed assessments whose result never reached the database are
/// retried first and stay in memory until the write succeeds.
async fn session_cleanup_job(state: ApiState) {
    let mut interval = interval(SESSION_CLEANUP_PERIOD);

    loop {
        interval.tick().await;
        cleanup_sessions(&state).await;
    }
}

/// One cleanup pass: retry unsaved assessment results, then evict.
pub async fn cleanup_sessions(state: &ApiState) {
    let unsaved = state.assessments.filter_map(|id, session| {
        if session.persisted {
            return None;
        }
        session.result_row(id).map(|row| (id, row))
    });
    for (id, row) in &unsaved {
        persist_assessment_result(state, *id, row).await;
    }

    let now = Utc::now();
    let practice = state
        .practice
        .evict(|session| is_expired(session.last_active_at, now));
    let assessments = state
        .assessments
        .evict(|session| session.is_evictable() && is_expired(session.last_active_at, now));

    if practice + assessments > 0 {
        tracing::info!(practice, assessments, "evicted idle sessions");
    } else {
        tracing::debug!("no idle sessions to evict");
    }
}
