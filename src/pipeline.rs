//! Forwarding decision for one inbound message.
//!
//! Every invocation ends with exactly one result metric: `Spam` when the
//! message is dropped, `Success` when it is forwarded (even to nobody) and
//! `Error` when the notification could not be classified or resolved.

use crate::config::Config;
use crate::error::Result;
use crate::filters::{SpamClassifier, SpamReason};
use crate::metrics::{MetricSink, Metrics, ResultKind};
use crate::notification::Notification;
use crate::recipient;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardInstruction {
    /// Empty when no forwarding rule matched; nothing is sent.
    pub destinations: Vec<String>,
    pub original_recipient: String,
    /// Storage key of the raw message.
    pub message_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DropInstruction {
    pub reasons: Vec<SpamReason>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Instruction {
    Forward(ForwardInstruction),
    Drop(DropInstruction),
}

impl Instruction {
    fn result_kind(&self) -> ResultKind {
        match self {
            Instruction::Forward(_) => ResultKind::Success,
            Instruction::Drop(_) => ResultKind::Spam,
        }
    }
}

pub struct Pipeline {
    config: Arc<Config>,
    classifier: SpamClassifier,
    metrics: Metrics,
}

impl Pipeline {
    pub fn new(config: Arc<Config>, sink: Box<dyn MetricSink>) -> Self {
        Self::with_classifier(config, SpamClassifier::default(), sink)
    }

    pub fn with_classifier(
        config: Arc<Config>,
        classifier: SpamClassifier,
        sink: Box<dyn MetricSink>,
    ) -> Self {
        let metrics = Metrics::new(config.namespace_root(), sink);
        Self {
            config,
            classifier,
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parses a raw SES event and decides what to do with the message.
    pub fn handle_event(&self, raw: &str) -> Result<Instruction> {
        match Notification::from_event_json(raw) {
            Ok(notification) => self.decide(&notification),
            Err(e) => {
                log::error!("Rejecting event: {e}");
                self.metrics.record_result(ResultKind::Error);
                Err(e)
            }
        }
    }

    pub fn decide(&self, notification: &Notification) -> Result<Instruction> {
        match self.evaluate(notification) {
            Ok(instruction) => {
                self.metrics.record_result(instruction.result_kind());
                Ok(instruction)
            }
            Err(e) => {
                log::error!(
                    "Failed to process message {}: {e}",
                    notification.message_id()
                );
                self.metrics.record_result(ResultKind::Error);
                Err(e)
            }
        }
    }

    fn evaluate(&self, notification: &Notification) -> Result<Instruction> {
        let classification = self
            .classifier
            .classify(notification, &self.config, &self.metrics)?;

        if classification.is_spam() {
            let reasons = classification.into_reasons();
            log::error!("{}", drop_summary(notification, &reasons));
            return Ok(Instruction::Drop(DropInstruction { reasons }));
        }

        let original_recipient = notification.original_recipient();
        let destinations = recipient::resolve(original_recipient, &self.config);
        if destinations.is_empty() {
            log::info!(
                "No new recipients found for original destination {original_recipient}, \
                 nothing to forward"
            );
        } else {
            log::info!(
                "Forwarding {} from {original_recipient} to {}",
                notification.message_id(),
                destinations.join(", ")
            );
        }

        Ok(Instruction::Forward(ForwardInstruction {
            destinations,
            original_recipient: original_recipient.to_string(),
            message_key: self.config.message_key(notification.message_id()),
        }))
    }
}

fn drop_summary(notification: &Notification, reasons: &[SpamReason]) -> String {
    format!(
        "Dropped Spam. message={} recipient={} receipt_recipients=[{}] source={} reasons={}",
        notification.message_id(),
        notification.original_recipient(),
        notification.receipt.recipients.join(", "),
        notification.mail.source.as_deref().unwrap_or("-"),
        serde_json::to_string(reasons).unwrap_or_default()
    )
}
