use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForwarderError {
    /// Missing or invalid configuration. Fatal at load time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The incoming event does not have the shape of an SES receipt notification.
    #[error("malformed notification: {0}")]
    MalformedNotification(String),

    /// A spam filter could not evaluate the notification it was given.
    #[error("{filter} filter failed: {reason}")]
    ClassificationFailure { filter: String, reason: String },

    /// Writing a metric record failed. Never fatal.
    #[error("failed to emit metric: {0}")]
    MetricsEmission(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ForwarderError>;
