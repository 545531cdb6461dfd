//! Prometheus metrics for the HTTP surface and the learning engine.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use qf_engine::LevelOutcome;

/// Path label for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Install the global Prometheus recorder.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        )?
        .set_buckets_for_metric(
            Matcher::Full("assessment_score".to_string()),
            &[20.0, 40.0, 55.0, 70.0, 85.0, 95.0, 100.0],
        )?
        .install_recorder()?;

    Ok(handle)
}

/// Middleware recording request count, duration and in-flight requests
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = route_label(req.extensions().get::<MatchedPath>());

    let in_flight = gauge!("http_requests_in_flight", "method" => method.clone(), "path" => path.clone());
    in_flight.increment(1.0);
    let response = next.run(req).await;
    in_flight.decrement(1.0);

    let status = response.status().as_u16().to_string();
    counter!(
        "http_requests_total",
        "method" => method.clone(),
        "path" => path.clone(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());

    response
}

/// Route template of the request, so path parameters never become labels.
fn route_label(matched: Option<&MatchedPath>) -> String {
    matched.map_or_else(|| UNMATCHED_ROUTE.to_string(), |path| path.as_str().to_string())
}

/// `mode` is `practice` or `assessment`.
pub fn record_answer(mode: &'static str, correct: bool) {
    counter!(
        "answers_submitted_total",
        "mode" => mode,
        "correct" => if correct { "true" } else { "false" }
    )
    .increment(1);
}

pub fn record_level_outcome(outcome: &LevelOutcome) {
    let result = match outcome {
        LevelOutcome::Continue { .. } => return,
        LevelOutcome::Passed { .. } => "passed",
        LevelOutcome::Failed { .. } => "failed",
        LevelOutcome::TopicMastered { .. } => "topic_mastered",
    };
    counter!("practice_levels_total", "result" => result).increment(1);
}

pub fn record_assessment_completed(tier: &str, score: u32) {
    counter!("assessments_completed_total", "tier" => tier.to_string()).increment(1);
    histogram!("assessment_score").record(f64::from(score));
}

/// `reason` is `full` or `closed`.
pub fn record_usage_dropped(reason: &'static str) {
    counter!("usage_records_dropped_total", "reason" => reason).increment(1);
}

pub fn record_usage_written(count: u64, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!("usage_records_written_total", "status" => status).increment(count);
}
