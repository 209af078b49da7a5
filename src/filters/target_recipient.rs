use crate::config::Config;
use crate::error::Result;
use crate::filters::{SpamFilter, SpamReason};
use crate::notification::Notification;

const FILTER_TYPE: &str = "TargetRecipient";

/// Drops mail sent to addresses that are known to attract spam, e.g. ones
/// handed out to conferences or games. Matching is exact and case-sensitive.
pub struct TargetRecipientFilter;

impl SpamFilter for TargetRecipientFilter {
    fn name(&self) -> &str {
        FILTER_TYPE
    }

    fn evaluate(&self, notification: &Notification, config: &Config) -> Result<Vec<SpamReason>> {
        let recipient = notification.original_recipient();

        Ok(config
            .blocked_recipients
            .iter()
            .filter(|blocked| blocked.as_str() == recipient)
            // '@' is not allowed in a metric name
            .map(|blocked| SpamReason::new(FILTER_TYPE, &blocked.replacen('@', ".", 1)))
            .collect())
    }
}
