use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::util::normalize_mac;

/// Scoped ARP-table lookup for a single address. Returns `None` when the
/// entry is missing or incomplete — the MAC Resolver treats that as
/// "unknown", never as an error.
#[async_trait]
pub trait Arp: Send + Sync {
    async fn lookup(&self, ip: Ipv4Addr) -> Option<String>;
}

pub struct ShellArp;

#[async_trait]
impl Arp for ShellArp {
    async fn lookup(&self, ip: Ipv4Addr) -> Option<String> {
        let addr = ip.to_string();
        tokio::task::spawn_blocking(move || {
            let output = if cfg!(target_os = "windows") {
                std::process::Command::new("arp").args(["-a", &addr]).output()
            } else {
                std::process::Command::new("arp").args(["-n", &addr]).output()
            }
            .ok()?;
            let text = String::from_utf8_lossy(&output.stdout);
            parse_arp_output(&text, &addr)
        })
        .await
        .ok()
        .flatten()
    }
}

/// Finds the line mentioning `addr` and extracts the first MAC-shaped token.
fn parse_arp_output(text: &str, addr: &str) -> Option<String> {
    let line = text.lines().find(|l| l.contains(addr))?;
    if line.contains("incomplete") || line.contains("(incomplete)") {
        return None;
    }
    line.split_whitespace()
        .find_map(|tok| normalize_mac(tok).filter(|_| tok.contains(':') || tok.contains('-')))
}

/// In-memory fixture ARP table for tests.
#[derive(Default)]
pub struct FixtureArp {
    pub table: HashMap<Ipv4Addr, String>,
}

impl FixtureArp {
    pub fn new(entries: impl IntoIterator<Item = (Ipv4Addr, String)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Arp for FixtureArp {
    async fn lookup(&self, ip: Ipv4Addr) -> Option<String> {
        self.table.get(&ip).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mac_from_linux_arp_n_line() {
        let text = "? (192.168.1.1) at aa:bb:cc:11:22:33 [ether] on eth0\n";
        assert_eq!(
            parse_arp_output(text, "192.168.1.1"),
            Some("aa:bb:cc:11:22:33".to_string())
        );
    }

    #[test]
    fn incomplete_entry_yields_none() {
        let text = "? (192.168.1.2) at <incomplete> on eth0\n";
        assert_eq!(parse_arp_output(text, "192.168.1.2"), None);
    }
}
