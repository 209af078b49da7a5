//! Custom spam filtering.
//!
//! Each filter is an independent check over the notification. The classifier
//! runs every filter in order, never stopping at the first hit, and collects
//! every reason. To add a filter implement [`SpamFilter`] and append it to
//! [`SpamClassifier::default`].

pub mod receipt_verdict;
pub mod subject_keyword;
pub mod target_recipient;

use crate::config::{Config, SpamFilterMode};
use crate::error::Result;
use crate::metrics::Metrics;
use crate::notification::Notification;
use serde::Serialize;

/// Why a message was considered spam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpamReason {
    pub filter_type: String,
    pub term: String,
}

impl SpamReason {
    pub fn new(filter_type: &str, term: &str) -> Self {
        Self {
            filter_type: filter_type.to_string(),
            term: term.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    reasons: Vec<SpamReason>,
}

impl ClassificationResult {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn from_reasons(reasons: Vec<SpamReason>) -> Self {
        Self { reasons }
    }

    pub fn is_spam(&self) -> bool {
        !self.reasons.is_empty()
    }

    pub fn reasons(&self) -> &[SpamReason] {
        &self.reasons
    }

    pub fn into_reasons(self) -> Vec<SpamReason> {
        self.reasons
    }
}

pub trait SpamFilter: Send + Sync {
    /// Filter type, used as the `Type` dimension of spam metrics.
    fn name(&self) -> &str;

    fn evaluate(&self, notification: &Notification, config: &Config) -> Result<Vec<SpamReason>>;
}

pub struct SpamClassifier {
    filters: Vec<Box<dyn SpamFilter>>,
}

impl Default for SpamClassifier {
    fn default() -> Self {
        Self::with_filters(vec![
            Box::new(receipt_verdict::ReceiptVerdictFilter),
            Box::new(subject_keyword::SubjectKeywordFilter),
            Box::new(target_recipient::TargetRecipientFilter),
        ])
    }
}

impl SpamClassifier {
    pub fn with_filters(filters: Vec<Box<dyn SpamFilter>>) -> Self {
        Self { filters }
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Classifies one notification. Only `SpamFilterMode::Custom` runs the
    /// filters; a spam metric is emitted for every reason as soon as the
    /// filter that found it returns.
    pub fn classify(
        &self,
        notification: &Notification,
        config: &Config,
        metrics: &Metrics,
    ) -> Result<ClassificationResult> {
        if config.spam_filter_mode != SpamFilterMode::Custom {
            log::debug!(
                "Custom spam filter disabled ({:?}), skipping filters",
                config.spam_filter_mode
            );
            return Ok(ClassificationResult::clean());
        }

        log::debug!(
            "Custom spam filter enabled, running {} filters on {}",
            self.filters.len(),
            notification.message_id()
        );

        let reasons = self
            .filters
            .iter()
            .try_fold(Vec::new(), |mut reasons, filter| {
                log::debug!("Running filter {}", filter.name());
                let found = filter.evaluate(notification, config)?;
                for reason in &found {
                    log::info!(
                        "Logging spam, type={}, term={}",
                        reason.filter_type,
                        reason.term
                    );
                    metrics.record_spam(&reason.filter_type, &reason.term);
                }
                reasons.extend(found);
                Ok::<_, crate::error::ForwarderError>(reasons)
            })?;

        Ok(ClassificationResult::from_reasons(reasons))
    }
}
