use crate::config::Config;
use crate::error::Result;
use crate::filters::{SpamFilter, SpamReason};
use crate::notification::Notification;

const FILTER_TYPE: &str = "SubjectKeyword";

/// Flags subjects containing any configured keyword, ignoring case. The
/// reason keeps the keyword exactly as configured.
pub struct SubjectKeywordFilter;

impl SpamFilter for SubjectKeywordFilter {
    fn name(&self) -> &str {
        FILTER_TYPE
    }

    fn evaluate(&self, notification: &Notification, config: &Config) -> Result<Vec<SpamReason>> {
        let subject = notification.subject().to_lowercase();

        Ok(config
            .subject_filter_keywords
            .iter()
            .filter(|keyword| subject.contains(&keyword.to_lowercase()))
            .map(|keyword| SpamReason::new(FILTER_TYPE, keyword))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::test_support::notification;

    fn config(keywords: &[&str]) -> Config {
        Config {
            subject_filter_keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_keyword_case_insensitive() {
        let n = notification("a@b.com", "Buy Viagra Now");

        for keyword in ["viagra", "VIAGRA", "ViAgRa"] {
            let reasons = SubjectKeywordFilter.evaluate(&n, &config(&[keyword])).unwrap();
            assert_eq!(reasons, vec![SpamReason::new("SubjectKeyword", keyword)]);
        }
    }

    #[test]
    fn test_no_match() {
        let n = notification("a@b.com", "Buy Viagra Now");
        assert!(SubjectKeywordFilter
            .evaluate(&n, &config(&["cialis"]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_every_matching_keyword_reported() {
        let n = notification("a@b.com", "FREE crypto giveaway, act now");
        let reasons = SubjectKeywordFilter
            .evaluate(&n, &config(&["free", "lottery", "Crypto Giveaway"]))
            .unwrap();

        assert_eq!(
            reasons,
            vec![
                SpamReason::new("SubjectKeyword", "free"),
                SpamReason::new("SubjectKeyword", "Crypto Giveaway"),
            ]
        );
    }

    #[test]
    fn test_empty_keyword_list() {
        let n = notification("a@b.com", "anything");
        assert!(SubjectKeywordFilter.evaluate(&n, &config(&[])).unwrap().is_empty());
    }
}
