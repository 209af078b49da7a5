//! SES receipt notifications.
//!
//! The event delivered for every inbound message is an object with a
//! `Records` array whose first entry carries the `ses` payload:
//!
//! ```json
//! {"Records":[{"ses":{
//!   "mail":{"messageId":"...","source":"...","destination":["..."],
//!           "commonHeaders":{"subject":"..."}},
//!   "receipt":{"spfVerdict":{"status":"PASS"},"dkimVerdict":{"status":"PASS"},
//!              "spamVerdict":{"status":"PASS"},"virusVerdict":{"status":"PASS"}}}}]}
//! ```
//!
//! Parsing validates the shape once at the boundary so the classifier and
//! resolver only ever see a [`Notification`].

use crate::error::{ForwarderError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictStatus {
    Pass,
    Fail,
    /// GRAY, PROCESSING_FAILED, DISABLED and anything SES adds later.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
}

/// Scan verdicts attached by the receipt rule. A verdict is absent when the
/// scan was not part of the rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub spf_verdict: Option<Verdict>,
    pub dkim_verdict: Option<Verdict>,
    pub spam_verdict: Option<Verdict>,
    pub virus_verdict: Option<Verdict>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonHeaders {
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mail {
    pub message_id: String,
    pub source: Option<String>,
    pub destination: Vec<String>,
    #[serde(default)]
    pub common_headers: CommonHeaders,
}

#[derive(Debug, Deserialize)]
struct SesPayload {
    mail: Mail,
    receipt: Receipt,
}

#[derive(Debug, Deserialize)]
struct SesRecord {
    ses: SesPayload,
}

#[derive(Debug, Deserialize)]
struct SesEvent {
    #[serde(rename = "Records")]
    records: Vec<SesRecord>,
}

/// One inbound message, as far as the policy engine is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub mail: Mail,
    pub receipt: Receipt,
}

impl Notification {
    /// Parses a raw SES event and validates the fields the engine relies on.
    pub fn from_event_json(raw: &str) -> Result<Self> {
        let event: SesEvent = serde_json::from_str(raw)
            .map_err(|e| ForwarderError::MalformedNotification(e.to_string()))?;

        let record = event.records.into_iter().next().ok_or_else(|| {
            ForwarderError::MalformedNotification("event has no records".to_string())
        })?;

        Self::new(record.ses.mail, record.ses.receipt)
    }

    pub fn new(mail: Mail, receipt: Receipt) -> Result<Self> {
        if mail.message_id.is_empty() {
            return Err(ForwarderError::MalformedNotification(
                "mail.messageId is empty".to_string(),
            ));
        }
        if mail.destination.is_empty() {
            return Err(ForwarderError::MalformedNotification(
                "mail.destination is empty".to_string(),
            ));
        }
        Ok(Notification { mail, receipt })
    }

    /// The recipient that triggered this invocation.
    pub fn original_recipient(&self) -> &str {
        // destination is checked to be non-empty in `new`
        &self.mail.destination[0]
    }

    /// Subject line; SES omits the header for messages without one.
    pub fn subject(&self) -> &str {
        self.mail.common_headers.subject.as_deref().unwrap_or("")
    }

    pub fn message_id(&self) -> &str {
        &self.mail.message_id
    }
}
