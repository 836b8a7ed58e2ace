// IPv4 CIDR arithmetic shared by the planner, intelligent discovery, and
// route table reader. Kept dependency-free (no `ipnetwork`/`cidr` crate)
// since every caller only needs plain u32 bit math.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{NetweaverError, Result};

/// An IPv4 network in CIDR notation. `network` is always the masked base
/// address — constructing with a host address silently normalizes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Cidr {
    network: u32,
    prefix: u8,
}

impl Cidr {
    pub fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self> {
        if prefix > 32 {
            return Err(NetweaverError::InvalidParameter {
                param: "prefix".to_string(),
                reason: "must be <= 32".to_string(),
            });
        }
        let mask = Self::mask_for(prefix);
        Ok(Self {
            network: u32::from(addr) & mask,
            prefix,
        })
    }

    fn mask_for(prefix: u8) -> u32 {
        if prefix == 0 {
            0
        } else {
            !0u32 << (32 - prefix as u32)
        }
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network | !Self::mask_for(self.prefix))
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = Self::mask_for(self.prefix);
        (u32::from(ip) & mask) == self.network
    }

    /// True iff `other` is fully contained within `self` (self is wider or equal).
    pub fn contains_range(&self, other: &Cidr) -> bool {
        self.prefix <= other.prefix && self.contains(other.network())
    }

    pub fn first_host(&self) -> Ipv4Addr {
        if self.prefix >= 31 {
            self.network()
        } else {
            Ipv4Addr::from(self.network + 1)
        }
    }

    pub fn last_host(&self) -> Ipv4Addr {
        if self.prefix >= 31 {
            self.broadcast()
        } else {
            Ipv4Addr::from(u32::from(self.broadcast()) - 1)
        }
    }

    /// Usable hosts: excludes the network and broadcast address for
    /// prefixes narrower than /31. A /30 yields exactly two addresses.
    pub fn usable_hosts(&self) -> Vec<Ipv4Addr> {
        if self.prefix >= 31 {
            let lo = self.network;
            let hi = u32::from(self.broadcast());
            return (lo..=hi).map(Ipv4Addr::from).collect();
        }
        let lo = self.network + 1;
        let hi = u32::from(self.broadcast()).saturating_sub(1);
        if hi < lo {
            return Vec::new();
        }
        (lo..=hi).map(Ipv4Addr::from).collect()
    }

    pub fn address_span(&self) -> u64 {
        1u64 << (32 - self.prefix as u32)
    }

    /// Narrow to the /prefix network that contains `addr`, only if this
    /// CIDR is wider than the target prefix. Used by Intelligent Discovery
    /// to bound interface subnets wider than /24 down to a /24.
    pub fn narrow_to(&self, addr: Ipv4Addr, prefix: u8) -> Cidr {
        if self.prefix >= prefix {
            return *self;
        }
        Cidr::new(addr, prefix).expect("prefix <= 32 checked by caller")
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.prefix)
    }
}

impl FromStr for Cidr {
    type Err = NetweaverError;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s.split_once('/').ok_or_else(|| NetweaverError::InvalidParameter {
            param: "cidr".to_string(),
            reason: format!("expected A.B.C.D/N, got '{}'", s),
        })?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| NetweaverError::InvalidParameter {
            param: "cidr".to_string(),
            reason: format!("invalid IPv4 address in '{}'", s),
        })?;
        let prefix: u8 = prefix.parse().map_err(|_| NetweaverError::InvalidParameter {
            param: "cidr".to_string(),
            reason: format!("invalid prefix length in '{}'", s),
        })?;
        Cidr::new(addr, prefix)
    }
}

impl From<Cidr> for String {
    fn from(c: Cidr) -> Self {
        c.to_string()
    }
}

impl TryFrom<String> for Cidr {
    type Error = NetweaverError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// RFC1918 private blocks, used throughout the Range Planner and
/// Intelligent Discovery to decide which "containing block" an interface
/// subnet belongs to.
pub fn rfc1918_parent(ip: Ipv4Addr) -> Option<Cidr> {
    let octets = ip.octets();
    match octets[0] {
        10 => Cidr::new(ip, 8).ok(),
        172 if (16..=31).contains(&octets[1]) => Cidr::new(ip, 12).ok(),
        192 if octets[1] == 168 => Cidr::new(ip, 16).ok(),
        _ => None,
    }
}

pub fn is_private(ip: Ipv4Addr) -> bool {
    rfc1918_parent(ip).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes() {
        let c: Cidr = "192.168.1.10/24".parse().unwrap();
        assert_eq!(c.network(), "192.168.1.0".parse::<Ipv4Addr>().unwrap());
        assert_eq!(c.prefix(), 24);
    }

    #[test]
    fn slash_30_has_two_usable_hosts() {
        let c: Cidr = "192.168.1.0/30".parse().unwrap();
        let hosts = c.usable_hosts();
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0], "192.168.1.1".parse::<Ipv4Addr>().unwrap());
        assert_eq!(hosts[1], "192.168.1.2".parse::<Ipv4Addr>().unwrap());
        assert!(!hosts.contains(&c.network()));
        assert!(!hosts.contains(&c.broadcast()));
    }

    #[test]
    fn contains_range_respects_priority_direction() {
        let wide: Cidr = "192.168.0.0/16".parse().unwrap();
        let narrow: Cidr = "192.168.1.0/24".parse().unwrap();
        assert!(wide.contains_range(&narrow));
        assert!(!narrow.contains_range(&wide));
    }

    #[test]
    fn rfc1918_parent_detection() {
        assert_eq!(
            rfc1918_parent("10.212.5.4".parse().unwrap()),
            Some("10.0.0.0/8".parse().unwrap())
        );
        assert_eq!(
            rfc1918_parent("172.20.1.1".parse().unwrap()),
            Some("172.16.0.0/12".parse().unwrap())
        );
        assert_eq!(rfc1918_parent("8.8.8.8".parse().unwrap()), None);
    }
}
