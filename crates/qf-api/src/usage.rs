//! Fire-and-forget answer analytics.
//!
//! Handlers hand each `UsageRecord` to a bounded channel and move on. A
//! full or closed channel drops the record; the answer itself never waits
//! on or fails because of analytics.

use qf_engine::UsageRecord;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::metrics;

#[derive(Clone, Debug)]
pub struct UsageLogger {
    tx: mpsc::Sender<UsageRecord>,
}

impl UsageLogger {
    /// Create the logger and the receiving end drained by the writer job.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<UsageRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn record(&self, record: UsageRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                tracing::warn!(question_id = %record.question_id, "usage log full, dropping record");
                metrics::record_usage_dropped("full");
            }
            Err(TrySendError::Closed(record)) => {
                tracing::warn!(question_id = %record.question_id, "usage log closed, dropping record");
                metrics::record_usage_dropped("closed");
            }
        }
    }
}
