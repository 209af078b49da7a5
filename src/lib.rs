pub mod config;
pub mod error;
pub mod filters;
pub mod metrics;
pub mod notification;
pub mod pipeline;
pub mod recipient;

pub use config::{Config, SpamFilterMode};
pub use error::ForwarderError;
pub use filters::{ClassificationResult, SpamClassifier, SpamFilter, SpamReason};
pub use metrics::{MemorySink, MetricSink, Metrics, StdoutSink};
pub use notification::Notification;
pub use pipeline::{Instruction, Pipeline};
