//! Metric emission in CloudWatch Embedded Metric Format (EMF).
//!
//! Every metric is a single JSON line. The `_aws` block carries the schema
//! (namespace, dimension names, metric name and unit) and the root level
//! carries the values, e.g.
//!
//! ```json
//! {"_aws":{"Timestamp":1611034887493,"CloudWatchMetrics":[{"Namespace":"MyDomain/SESForwarder/Spam",
//! "Dimensions":[["Type"]],"Metrics":[{"Name":"Viagra","Unit":"Count"}]}]},"Viagra":1.0,"Type":"SubjectKeyword"}
//! ```

use crate::error::{ForwarderError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Pipeline outcome recorded once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Success,
    Error,
    Spam,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Success => "Success",
            ResultKind::Error => "Error",
            ResultKind::Spam => "Spam",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Destination for serialized metric lines.
pub trait MetricSink: Send + Sync {
    fn write_line(&self, line: &str) -> std::io::Result<()>;
}

impl<T: MetricSink + ?Sized> MetricSink for Arc<T> {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        (**self).write_line(line)
    }
}

/// Writes records to stdout, where the Lambda log agent picks them up.
pub struct StdoutSink;

impl MetricSink for StdoutSink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()
    }
}

/// Keeps records in memory.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn records(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

impl MetricSink for MemorySink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut lines = self
            .lines
            .lock()
            .map_err(|_| std::io::Error::other("metric sink poisoned"))?;
        lines.push(line.to_string());
        Ok(())
    }
}

#[derive(Serialize)]
struct MetricDefinition<'a> {
    #[serde(rename = "Name")]
    name: &'a str,
    #[serde(rename = "Unit")]
    unit: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct MetricDirective<'a> {
    namespace: &'a str,
    dimensions: Vec<Vec<&'a str>>,
    metrics: Vec<MetricDefinition<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct Metadata<'a> {
    timestamp: i64,
    cloud_watch_metrics: Vec<MetricDirective<'a>>,
}

#[derive(Serialize)]
struct EmfRecord<'a> {
    #[serde(rename = "_aws")]
    aws: Metadata<'a>,
    #[serde(flatten)]
    values: Map<String, Value>,
}

/// Builds the EMF line for one count-1 event.
pub fn format_record(
    metric_name: &str,
    dimensions: &[Dimension],
    namespace: &str,
    timestamp_ms: i64,
) -> Result<String> {
    let mut values = Map::new();
    values.insert(metric_name.to_string(), Value::from(1.0));
    for dimension in dimensions {
        values.insert(dimension.name.clone(), Value::from(dimension.value.clone()));
    }

    let record = EmfRecord {
        aws: Metadata {
            timestamp: timestamp_ms,
            cloud_watch_metrics: vec![MetricDirective {
                namespace,
                dimensions: vec![dimensions.iter().map(|d| d.name.as_str()).collect()],
                metrics: vec![MetricDefinition {
                    name: metric_name,
                    unit: "Count",
                }],
            }],
        },
        values,
    };

    serde_json::to_string(&record)
        .map_err(|e| ForwarderError::MetricsEmission(std::io::Error::other(e)))
}

/// Emits metrics under `{project}/SESForwarder`.
pub struct Metrics {
    namespace_root: String,
    sink: Box<dyn MetricSink>,
}

impl Metrics {
    pub fn new(namespace_root: String, sink: Box<dyn MetricSink>) -> Self {
        Self {
            namespace_root,
            sink,
        }
    }

    pub fn namespace_root(&self) -> &str {
        &self.namespace_root
    }

    pub fn emit(&self, metric_name: &str, dimensions: &[Dimension], namespace: &str) -> Result<()> {
        let line = format_record(
            metric_name,
            dimensions,
            namespace,
            chrono::Utc::now().timestamp_millis(),
        )?;
        self.sink.write_line(&line)?;
        Ok(())
    }

    /// Emits under the root namespace.
    pub fn emit_metric(&self, metric_name: &str, dimensions: &[Dimension]) -> Result<()> {
        self.emit(metric_name, dimensions, &self.namespace_root)
    }

    pub fn emit_spam_metric(&self, filter_type: &str, term: &str) -> Result<()> {
        let namespace = format!("{}/Spam", self.namespace_root);
        self.emit(term, &[Dimension::new("Type", filter_type)], &namespace)
    }

    pub fn emit_result_metric(&self, result: ResultKind) -> Result<()> {
        let namespace = format!("{}/Result", self.namespace_root);
        self.emit(result.as_str(), &[], &namespace)
    }

    /// Emits a spam metric; losing it is logged and otherwise ignored.
    pub fn record_spam(&self, filter_type: &str, term: &str) {
        if let Err(e) = self.emit_spam_metric(filter_type, term) {
            log::warn!("Dropping spam metric {filter_type}/{term}: {e}");
        }
    }

    /// Emits a result metric; losing it is logged and otherwise ignored.
    pub fn record_result(&self, result: ResultKind) {
        if let Err(e) = self.emit_result_metric(result) {
            log::warn!("Dropping result metric {}: {e}", result.as_str());
        }
    }
}
