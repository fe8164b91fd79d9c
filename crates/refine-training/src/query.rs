//! Fetching curated inferences: the latest feedback per target that passes
//! the metric's threshold, joined to the function's inferences.

use crate::config::{FunctionDefinition, MetricDefinition, MetricType};
use crate::error::{TrainingError, TrainingResult};
use refine_abstraction::{ObservabilityStore, ParameterizedQuery, QueryValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Boundary between `false` (0) and `true` (1) for boolean feedback.
pub const BOOLEAN_THRESHOLD: f64 = 0.5;

/// Feedback value attached to a fetched inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeedbackValue {
    Boolean(bool),
    Float(f64),
}

/// One row returned by the fetch query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRecord {
    pub variant_name: String,
    /// Stored input, as JSON text.
    pub input: String,
    /// Stored output, as JSON text.
    pub output: String,
    pub value: FeedbackValue,
    pub episode_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchParams {
    /// Threshold for float metrics; boolean metrics always use [`BOOLEAN_THRESHOLD`].
    pub float_threshold: f64,
    pub max_samples: u64,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self { float_threshold: 0.5, max_samples: 100_000 }
    }
}

/// Threshold and comparison operator applied to feedback values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackFilter {
    pub threshold: f64,
    pub comparator: &'static str,
}

#[must_use]
pub fn feedback_filter(metric: &MetricDefinition, float_threshold: f64) -> FeedbackFilter {
    let threshold = match metric.metric_type {
        MetricType::Float => float_threshold,
        MetricType::Boolean => BOOLEAN_THRESHOLD,
    };
    FeedbackFilter { threshold, comparator: metric.optimize.comparator() }
}

/// Build the fetch query. Only feedback passing the threshold is ranked, so a
/// target qualifies through its most recent passing value.
///
/// Every user-supplied value is a bound parameter; only
/// table names, the join key and the comparator (all from closed enums) are
/// spliced into the text.
#[must_use]
pub fn build_query(function: &FunctionDefinition, metric: &MetricDefinition, params: &FetchParams) -> ParameterizedQuery {
    let filter = feedback_filter(metric, params.float_threshold);
    let sql = format!(
        r"SELECT
    i.variant_name AS variant_name,
    i.input AS input,
    i.output AS output,
    f.value AS value,
    i.episode_id AS episode_id
FROM {inference_table} AS i
INNER JOIN (
    SELECT
        target_id,
        value,
        ROW_NUMBER() OVER (PARTITION BY target_id ORDER BY timestamp DESC) AS rn
    FROM {feedback_table}
    WHERE metric_name = {{metric_name:String}}
        AND value {comparator} {{threshold:Float64}}
) AS f ON i.{join_key} = f.target_id
WHERE
    i.function_name = {{function_name:String}}
    AND f.rn = 1
LIMIT {{max_samples:UInt64}}",
        inference_table = function.function_type.inference_table_name(),
        feedback_table = metric.metric_type.feedback_table_name(),
        join_key = metric.level.join_key(),
        comparator = filter.comparator,
    );

    ParameterizedQuery::new(sql)
        .bind("function_name", QueryValue::String(function.name.clone()))
        .bind("metric_name", QueryValue::String(metric.name.clone()))
        .bind("threshold", QueryValue::Float(filter.threshold))
        .bind("max_samples", QueryValue::UInt(params.max_samples))
}

/// Run the fetch query and decode every row.
pub async fn fetch_records(
    store: &dyn ObservabilityStore,
    query: &ParameterizedQuery,
) -> TrainingResult<Vec<InferenceRecord>> {
    debug!(params = ?query.params, "Fetching inference records");

    let rows = store
        .query(query)
        .await
        .map_err(|e| TrainingError::Query(format!("observability store query failed: {e}")))?;

    let records = rows
        .into_iter()
        .enumerate()
        .map(|(idx, row)| {
            serde_json::from_value::<InferenceRecord>(row)
                .map_err(|e| TrainingError::Query(format!("unexpected shape for row {}: {e}", idx + 1)))
        })
        .collect::<TrainingResult<Vec<_>>>()?;

    info!(records = records.len(), "Fetched inference records");
    Ok(records)
}
