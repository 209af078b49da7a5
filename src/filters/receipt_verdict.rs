use crate::config::Config;
use crate::error::{ForwarderError, Result};
use crate::filters::{SpamFilter, SpamReason};
use crate::notification::{Notification, Verdict, VerdictStatus};

const FILTER_TYPE: &str = "SESReceiptVerdict";

/// Drops mail whose SES scans failed. Same checks the managed rule set
/// applies, so `Custom` mode covers everything `Managed` does.
pub struct ReceiptVerdictFilter;

impl SpamFilter for ReceiptVerdictFilter {
    fn name(&self) -> &str {
        FILTER_TYPE
    }

    fn evaluate(&self, notification: &Notification, _config: &Config) -> Result<Vec<SpamReason>> {
        let receipt = &notification.receipt;
        let verdicts: [(&Option<Verdict>, &str, &str); 4] = [
            (&receipt.spf_verdict, "spfVerdict", "Sender Policy Framework (SPF)"),
            (
                &receipt.dkim_verdict,
                "dkimVerdict",
                "DomainKeys Identified Mail (DKIM)",
            ),
            (&receipt.spam_verdict, "spamVerdict", "AWS Spam Verdict"),
            (&receipt.virus_verdict, "virusVerdict", "AWS Virus Verdict"),
        ];

        let mut reasons = Vec::new();
        for (verdict, field, term) in verdicts {
            let verdict = verdict
                .as_ref()
                .ok_or_else(|| ForwarderError::ClassificationFailure {
                    filter: FILTER_TYPE.to_string(),
                    reason: format!("receipt has no {field}"),
                })?;

            if verdict.status == VerdictStatus::Fail {
                reasons.push(SpamReason::new(FILTER_TYPE, term));
            }
        }

        Ok(reasons)
    }
}
