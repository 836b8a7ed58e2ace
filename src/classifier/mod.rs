// Device Classifier: evaluates a priority-ordered rule set against each
// host. Falls back to a small legacy heuristic when nothing matches.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{NetweaverError, Result};
use crate::model::{Condition, Host, Rule, RuleFile};

const DEFAULT_RULES_YAML: &str = include_str!("default_rules.yaml");

pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    /// Loads the embedded default rule set, sorted ascending by priority.
    pub fn default() -> Result<Self> {
        let file: RuleFile = serde_yaml::from_str(DEFAULT_RULES_YAML).map_err(|e| {
            NetweaverError::RuleConfigError {
                reason: format!("embedded default rule set is malformed: {e}"),
            }
        })?;
        Self::from_rule_file(file)
    }

    /// Loads from an explicit path, falling back to the embedded default
    /// with a warning if the file is missing, malformed, or fails
    /// structural validation (a rule with neither `all_of` nor `any_of`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::default();
        };
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rule file unreadable, using embedded default");
                return Self::default();
            }
        };
        let file: RuleFile = match serde_yaml::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rule file malformed, using embedded default");
                return Self::default();
            }
        };
        let rule_count = file.rules.len();
        match Self::from_rule_file(file) {
            Ok(classifier) => {
                debug!(path = %path.display(), rules = rule_count, "loaded rule set");
                Ok(classifier)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rule file failed validation, using embedded default");
                Self::default()
            }
        }
    }

    /// Sorts rules ascending by priority. Rejects any rule with neither
    /// `all_of` nor `any_of` conditions, since such a rule is vacuously
    /// true for every host.
    fn from_rule_file(mut file: RuleFile) -> Result<Self> {
        if let Some(bad) = file
            .rules
            .iter()
            .find(|r| r.conditions.all_of.is_empty() && r.conditions.any_of.is_empty())
        {
            return Err(NetweaverError::RuleConfigError {
                reason: format!("rule '{}' has neither all_of nor any_of conditions", bad.name),
            });
        }
        file.rules.sort_by_key(|r| r.priority);
        Ok(Self { rules: file.rules })
    }

    /// Assigns `device_type`/`icon` for a host: the first matching rule in
    /// ascending priority wins. Falls back to a legacy heuristic if none
    /// match. Does not override an already-assigned (non-`Unknown`) type.
    pub fn classify(&self, host: &mut Host) {
        if host.device_type != "Unknown" {
            return;
        }
        for rule in &self.rules {
            if rule_matches(rule, host) {
                host.device_type = rule.device_type.clone();
                return;
            }
        }
        if let Some(fallback) = legacy_heuristic(host) {
            host.device_type = fallback;
        }
    }
}

fn rule_matches(rule: &Rule, host: &Host) -> bool {
    let conditions = &rule.conditions;
    if conditions.not_conditions.iter().any(|c| condition_matches(c, host)) {
        return false;
    }
    if !conditions.all_of.iter().all(|c| condition_matches(c, host)) {
        return false;
    }
    if !conditions.any_of.is_empty() && !conditions.any_of.iter().any(|c| condition_matches(c, host)) {
        return false;
    }
    true
}

fn condition_matches(condition: &Condition, host: &Host) -> bool {
    match condition {
        Condition::HostnameContains(needles) => host
            .hostname
            .as_deref()
            .is_some_and(|h| contains_any_ci(h, needles)),
        Condition::ServiceNameContains(needles) => host
            .services
            .iter()
            .any(|s| contains_any_ci(&s.name, needles)),
        Condition::ServiceTypeContains(needles) => host
            .services
            .iter()
            .any(|s| contains_any_ci(&s.service_type, needles)),
        Condition::MacVendorContains(needles) => host
            .mac_vendor
            .as_deref()
            .is_some_and(|v| contains_any_ci(v, needles)),
        Condition::OpenPorts(required) => required.iter().all(|p| host.ports.contains(p)),
    }
}

fn contains_any_ci(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles.iter().any(|n| haystack.contains(&n.to_lowercase()))
}

/// Applied only when no rule in the active rule set matches.
fn legacy_heuristic(host: &Host) -> Option<String> {
    if let Some(vendor) = &host.mac_vendor {
        if vendor.to_lowercase().contains("raspberry") {
            return Some("Raspberry Pi".to_string());
        }
    }
    if host.ports.contains(&22) && host.ports.contains(&80) {
        return Some("Linux Server".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Conditions;
    use std::net::Ipv4Addr;

    fn host_with_ports(ports: &[u16], hostname: Option<&str>) -> Host {
        let mut h = Host::new(Ipv4Addr::new(192, 168, 1, 50));
        h.ports = ports.to_vec();
        h.hostname = hostname.map(str::to_string);
        h
    }

    fn s6_rule() -> Rule {
        Rule {
            name: "ssh-http-not-test".to_string(),
            priority: 10,
            device_type: "Web Server".to_string(),
            icon: String::new(),
            description: String::new(),
            conditions: Conditions {
                all_of: vec![Condition::OpenPorts(vec![22, 80])],
                any_of: vec![],
                not_conditions: vec![Condition::HostnameContains(vec!["test".to_string()])],
            },
        }
    }

    #[test]
    fn s6_matches_full_port_set_with_clean_hostname() {
        let host = host_with_ports(&[22, 80, 443], Some("webserver.local"));
        assert!(rule_matches(&s6_rule(), &host));
    }

    #[test]
    fn s6_rejects_missing_port() {
        let host = host_with_ports(&[22], None);
        assert!(!rule_matches(&s6_rule(), &host));
    }

    #[test]
    fn s6_rejects_test_hostname() {
        let host = host_with_ports(&[22, 80], Some("test-box"));
        assert!(!rule_matches(&s6_rule(), &host));
    }

    #[test]
    fn default_rule_set_parses_and_sorts_ascending() {
        let classifier = Classifier::default().unwrap();
        assert!(classifier.rules.windows(2).all(|w| w[0].priority <= w[1].priority));
    }

    #[test]
    fn s1_router_gateway_classification() {
        let classifier = Classifier::default().unwrap();
        let mut host = host_with_ports(&[53, 80, 443], None);
        host.mac_vendor = Some("Linksys LLC".to_string());
        classifier.classify(&mut host);
        assert_eq!(host.device_type, "Router/Gateway");
    }

    #[test]
    fn legacy_heuristic_assigns_linux_server_when_no_rule_matches() {
        assert_eq!(legacy_heuristic(&host_with_ports(&[22, 80], None)), Some("Linux Server".to_string()));
        assert_eq!(legacy_heuristic(&host_with_ports(&[22], None)), None);
    }

    #[test]
    fn rule_with_no_all_of_or_any_of_is_rejected() {
        let file = RuleFile {
            version: "test".to_string(),
            updated: String::new(),
            rules: vec![Rule {
                name: "empty-conditions".to_string(),
                priority: 1,
                device_type: "Anything".to_string(),
                icon: String::new(),
                description: String::new(),
                conditions: Conditions {
                    all_of: vec![],
                    any_of: vec![],
                    not_conditions: vec![Condition::HostnameContains(vec!["test".to_string()])],
                },
            }],
            agent_config: Default::default(),
        };
        assert!(Classifier::from_rule_file(file).is_err());
    }
}
