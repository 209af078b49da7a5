//! Maps an original recipient to the addresses mail is forwarded to.
//!
//! Rules are tried in a fixed order and the first one that matches wins:
//! the exact address, then `@domain`, then the bare mailbox name, then the
//! catch-all `@`. No match means nothing is forwarded.

use crate::config::Config;

/// Lower-cased address split into mailbox and domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAddress {
    pub address: String,
    pub user: String,
    pub domain: Option<String>,
}

impl NormalizedAddress {
    /// Lower-cases the address and, when `allow_plus_sign` is set, drops a
    /// `+tag` from the mailbox so `user+tag@example.com` is `user@example.com`.
    pub fn parse(address: &str, allow_plus_sign: bool) -> Self {
        let lower = address.to_lowercase();
        let (user, domain) = match lower.rfind('@') {
            Some(pos) => (&lower[..pos], Some(&lower[pos + 1..])),
            None => (lower.as_str(), None),
        };

        let user = match user.find('+') {
            Some(plus) if allow_plus_sign && domain.is_some() => &user[..plus],
            _ => user,
        };

        let address = match domain {
            Some(domain) => format!("{user}@{domain}"),
            None => user.to_string(),
        };

        NormalizedAddress {
            address,
            user: user.to_string(),
            domain: domain.map(str::to_string),
        }
    }
}

type Lookup = fn(&NormalizedAddress) -> Option<String>;

fn exact_key(address: &NormalizedAddress) -> Option<String> {
    Some(address.address.clone())
}

fn domain_key(address: &NormalizedAddress) -> Option<String> {
    address.domain.as_ref().map(|domain| format!("@{domain}"))
}

fn mailbox_key(address: &NormalizedAddress) -> Option<String> {
    if address.user.is_empty() {
        None
    } else {
        Some(address.user.clone())
    }
}

fn catch_all_key(_address: &NormalizedAddress) -> Option<String> {
    Some("@".to_string())
}

/// Rule keys to try, highest precedence first.
const LOOKUP_CHAIN: [(&str, Lookup); 4] = [
    ("exact", exact_key),
    ("domain", domain_key),
    ("mailbox", mailbox_key),
    ("catch-all", catch_all_key),
];

/// Finds the rule for a lower-cased key. Keys of a validated config are
/// already lower-case; other configs fall back to comparing lower-cased keys.
fn rule_for<'a>(config: &'a Config, key: &str) -> Option<&'a Vec<String>> {
    config.forwarding_rules.get(key).or_else(|| {
        config
            .forwarding_rules
            .iter()
            .find(|(rule, _)| rule.to_lowercase() == key)
            .map(|(_, destinations)| destinations)
    })
}

/// Returns the configured destinations for `address`, or an empty list when
/// no forwarding rule matches.
pub fn resolve(address: &str, config: &Config) -> Vec<String> {
    let normalized = NormalizedAddress::parse(address, config.allow_plus_sign);

    for (rule, lookup) in LOOKUP_CHAIN {
        let Some(key) = lookup(&normalized) else {
            continue;
        };
        if let Some(destinations) = rule_for(config, &key) {
            log::debug!("Recipient {address} matched {rule} rule '{key}'");
            return destinations.clone();
        }
    }

    log::debug!("No forwarding rule for recipient {address}");
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config(rules: Vec<(&str, Vec<&str>)>) -> Config {
        let forwarding_rules: BTreeMap<String, Vec<String>> = rules
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|d| d.to_string()).collect()))
            .collect();
        Config {
            forwarding_rules,
            ..Default::default()
        }
    }

    fn precedence_config() -> Config {
        config(vec![
            ("a@b.com", vec!["x@dest.com"]),
            ("@b.com", vec!["y@dest.com"]),
            ("a", vec!["z@dest.com"]),
            ("@", vec!["w@dest.com"]),
        ])
    }

    #[test]
    fn test_precedence() {
        let config = precedence_config();

        assert_eq!(resolve("a@b.com", &config), vec!["x@dest.com"]);
        assert_eq!(resolve("c@b.com", &config), vec!["y@dest.com"]);
        assert_eq!(resolve("a@other.com", &config), vec!["z@dest.com"]);
        assert_eq!(resolve("q@other.com", &config), vec!["w@dest.com"]);
    }

    #[test]
    fn test_no_rules() {
        let config = config(vec![]);
        assert!(resolve("a@b.com", &config).is_empty());
        assert!(resolve("anything", &config).is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let config = precedence_config();
        assert_eq!(resolve("A@B.COM", &config), vec!["x@dest.com"]);
        assert_eq!(resolve("C@B.com", &config), vec!["y@dest.com"]);
    }

    #[test]
    fn test_mixed_case_keys_without_validation() {
        let config = config(vec![
            ("Sales@Example.com", vec!["x@y.com"]),
            ("@Partner.ORG", vec!["p@y.com"]),
            ("Support", vec!["s@y.com"]),
        ]);

        assert_eq!(resolve("sales@example.com", &config), vec!["x@y.com"]);
        assert_eq!(resolve("Sales@Example.com", &config), vec!["x@y.com"]);
        assert_eq!(resolve("anyone@partner.org", &config), vec!["p@y.com"]);
        assert_eq!(resolve("SUPPORT@elsewhere.net", &config), vec!["s@y.com"]);
    }

    #[test]
    fn test_plus_sign() {
        let config = config(vec![("user@domain.com", vec!["me@home.com"])]);
        assert_eq!(resolve("user+tag@domain.com", &config), vec!["me@home.com"]);
        assert_eq!(resolve("User+Shop+x@Domain.com", &config), vec!["me@home.com"]);

        let strict = Config {
            allow_plus_sign: false,
            ..config
        };
        assert!(resolve("user+tag@domain.com", &strict).is_empty());
    }

    #[test]
    fn test_destinations_kept_verbatim() {
        let config = config(vec![(
            "info@example.com",
            vec!["Jen@Example.com", "john@example.com", "Jen@Example.com"],
        )]);
        assert_eq!(
            resolve("info@example.com", &config),
            vec!["Jen@Example.com", "john@example.com", "Jen@Example.com"]
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            NormalizedAddress::parse("Info+News@Example.COM", true),
            NormalizedAddress {
                address: "info@example.com".to_string(),
                user: "info".to_string(),
                domain: Some("example.com".to_string()),
            }
        );
        assert_eq!(
            NormalizedAddress::parse("info+news@example.com", false).address,
            "info+news@example.com"
        );
        assert_eq!(NormalizedAddress::parse("postmaster", true).domain, None);
    }
}
