// Core data model shared across the discovery engine: interfaces, scan
// ranges, hosts, services, routes, and classifier rules.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::util::Cidr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[clap(rename_all = "kebab-case")]
pub enum ScanMode {
    Quick,
    Normal,
    Comprehensive,
    FirewallTest,
    Intelligent,
}

/// A UP, non-loopback IPv4 interface. Immutable once enumerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub ip: Ipv4Addr,
    pub subnet: Cidr,
    pub gateway: Option<Ipv4Addr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeSource {
    Interface,
    Adjacent,
    Common,
    Discovered,
}

/// A candidate subnet to probe, as produced by the Range Planner. Higher
/// `priority` wins during merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRange {
    pub network: Cidr,
    pub priority: i32,
    pub source: RangeSource,
    pub description: String,
}

impl ScanRange {
    pub fn new(network: Cidr, priority: i32, source: RangeSource, description: impl Into<String>) -> Self {
        Self {
            network,
            priority,
            source,
            description: description.into(),
        }
    }
}

/// Internal to Intelligent Discovery: a range awaiting (or having passed)
/// gateway-probe validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetCandidate {
    pub network: Cidr,
    pub priority: i32,
    pub source: RangeSource,
    pub gateway_ip: Option<Ipv4Addr>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceSource {
    Mdns,
    Ssdp,
    Igmp,
    Probe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub service_type: String,
    pub domain: String,
    pub port: u16,
    pub protocol: String,
    #[serde(default)]
    pub txt: HashMap<String, String>,
    pub source: ServiceSource,
}

/// A discovered device. `device_type` starts `"Unknown"` and is assigned at
/// most once, by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub ip: Ipv4Addr,
    pub mac: Option<String>,
    pub mac_vendor: Option<String>,
    pub hostname: Option<String>,
    pub device_type: String,
    pub is_gateway: bool,
    pub ports: Vec<u16>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub upnp_info: HashMap<String, String>,
}

impl Host {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            mac: None,
            mac_vendor: None,
            hostname: None,
            device_type: "Unknown".to_string(),
            is_gateway: false,
            ports: Vec::new(),
            services: Vec::new(),
            upnp_info: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub destination: Cidr,
    pub gateway: Option<Ipv4Addr>,
    pub interface: String,
    pub metric: u32,
}

/// A single recognized rule predicate. Externally-tagged so the YAML shape
/// is exactly `hostname_contains: [...]` / `open_ports: [22, 80]` etc.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    HostnameContains(Vec<String>),
    ServiceNameContains(Vec<String>),
    ServiceTypeContains(Vec<String>),
    MacVendorContains(Vec<String>),
    OpenPorts(Vec<u16>),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Conditions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_of: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub any_of: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_conditions: Vec<Condition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub priority: u8,
    pub device_type: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    pub conditions: Conditions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    pub version: String,
    #[serde(default)]
    pub updated: String,
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub agent_config: HashMap<String, serde_yaml::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_yaml_shape_matches_rule_file() {
        let yaml = "hostname_contains:\n  - test\n";
        let c: Condition = serde_yaml::from_str(yaml).unwrap();
        match c {
            Condition::HostnameContains(v) => assert_eq!(v, vec!["test".to_string()]),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn host_starts_unknown() {
        let h = Host::new("10.0.0.1".parse().unwrap());
        assert_eq!(h.device_type, "Unknown");
        assert!(!h.is_gateway);
    }
}
