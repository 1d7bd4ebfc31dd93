use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{Result, XrefError};
use crate::logic::LogicTableRegistry;

use super::aggregate::aggregate;
use super::types::{FeedbackRecord, LogPage, QcAnalysisInput, QcFilters};

/// Read access to persisted recommendation logs and their feedback.
pub trait QcLogSource {
    /// Logs matching `filters`, newest first, reading at most `limit` rows.
    fn fetch_logs(&self, filters: &QcFilters, limit: usize) -> Result<LogPage>;

    /// Feedback attached to any of the given log ids.
    fn fetch_feedback(&self, log_ids: &[String]) -> Result<Vec<FeedbackRecord>>;
}

/// Fetch logs and feedback from `source` and aggregate them.
///
/// Feedback is looked up in sequential chunks of `feedback_lookup_batch` ids.
/// An empty data set is a successful, zero-valued result.
pub fn collect_qc_input<S: QcLogSource + ?Sized>(
    source: &S,
    filters: &QcFilters,
    registry: &LogicTableRegistry,
    config: &EngineConfig,
) -> Result<QcAnalysisInput> {
    let limit = config.max_log_rows;
    if limit == 0 {
        return Err(XrefError::Config("max_log_rows must be at least 1".to_string()));
    }
    let page = source
        .fetch_logs(filters, limit)
        .map_err(|e| XrefError::Fetch(format!("Failed to fetch recommendation logs: {}", e)))?;
    let truncated = page.rows_read >= limit;
    if truncated {
        warn!("QC log fetch hit the {} row cap; results are truncated", limit);
    }
    if page.entries.len() < page.rows_read {
        warn!(
            "{} of {} log rows could not be decoded",
            page.rows_read - page.entries.len(),
            page.rows_read
        );
    }
    let logs = page.entries;
    info!("Fetched {} recommendation logs for QC", logs.len());

    let ids: Vec<String> = logs.iter().map(|l| l.id.clone()).collect();
    let chunk_size = config.feedback_lookup_batch.max(1);
    let mut feedback = Vec::new();
    for (i, chunk) in ids.chunks(chunk_size).enumerate() {
        debug!("Feedback lookup batch {} ({} ids)", i + 1, chunk.len());
        let rows = source.fetch_feedback(chunk).map_err(|e| {
            XrefError::Fetch(format!("Failed to fetch feedback (batch {}): {}", i + 1, e))
        })?;
        feedback.extend(rows);
    }

    let mut input = aggregate(&logs, &feedback, registry, filters);
    input.truncated = truncated;
    Ok(input)
}
