use async_trait::async_trait;
use std::net::Ipv4Addr;

/// A parsed DHCP lease: enough to enrich a host missing a MAC or hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub ip: Ipv4Addr,
    pub mac: Option<String>,
    pub hostname: Option<String>,
}

/// Opportunistic lease-file reader. Missing or unreadable files simply
/// contribute no leases — never an error.
#[async_trait]
pub trait DhcpLeases: Send + Sync {
    async fn leases(&self) -> Vec<Lease>;
}

const LINUX_LEASE_PATHS: &[&str] = &[
    "/var/lib/dhcp/dhcpd.leases",
    "/var/lib/dhcpd/dhcpd.leases",
    "/var/lib/dhcp3/dhclient.leases",
];
const MACOS_LEASE_PATHS: &[&str] = &["/var/db/dhcpd_leases"];

pub struct FileDhcpLeases;

#[async_trait]
impl DhcpLeases for FileDhcpLeases {
    async fn leases(&self) -> Vec<Lease> {
        tokio::task::spawn_blocking(|| {
            let mut out = Vec::new();
            let candidates: Vec<String> = if cfg!(target_os = "windows") {
                windows_leases().unwrap_or_default()
            } else {
                let mut paths: Vec<String> = if cfg!(target_os = "macos") {
                    MACOS_LEASE_PATHS.iter().map(|s| s.to_string()).collect()
                } else {
                    LINUX_LEASE_PATHS.iter().map(|s| s.to_string()).collect()
                };
                paths.extend(glob_tmp_dhcp());
                paths
            };
            for path in candidates {
                if let Ok(content) = std::fs::read_to_string(&path) {
                    out.extend(parse_lease_blocks(&content));
                }
            }
            out
        })
        .await
        .unwrap_or_default()
    }
}

fn glob_tmp_dhcp() -> Vec<String> {
    std::fs::read_dir("/tmp")
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.contains("dhcp"))
                        .unwrap_or(false)
                })
                .filter_map(|p| p.to_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn windows_leases() -> Option<Vec<String>> {
    let output = std::process::Command::new("netsh")
        .args(["dhcp", "server", "show", "scope"])
        .output()
        .ok()?;
    Some(vec![String::from_utf8_lossy(&output.stdout).to_string()])
}

/// Parses `lease <ip> { hardware ethernet <mac>; client-hostname "<h>"; ends <time>; }`
/// blocks from an ISC-dhcpd style leases file.
fn parse_lease_blocks(content: &str) -> Vec<Lease> {
    let mut leases = Vec::new();
    let mut lines = content.lines().peekable();
    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if !trimmed.starts_with("lease ") {
            continue;
        }
        let ip: Option<Ipv4Addr> = trimmed
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok());
        let Some(ip) = ip else { continue };

        let mut mac = None;
        let mut hostname = None;
        for body_line in lines.by_ref() {
            let body = body_line.trim();
            if body.starts_with('}') {
                break;
            }
            if let Some(rest) = body.strip_prefix("hardware ethernet") {
                mac = rest.trim().trim_end_matches(';').trim().to_string().into();
            } else if let Some(rest) = body.strip_prefix("client-hostname") {
                hostname = rest
                    .trim()
                    .trim_matches(|c| c == '"' || c == ';')
                    .to_string()
                    .into();
            }
        }
        leases.push(Lease { ip, mac, hostname });
    }
    leases
}

/// In-memory fixture for tests.
pub struct FixtureDhcpLeases {
    pub entries: Vec<Lease>,
}

impl FixtureDhcpLeases {
    pub fn new(entries: Vec<Lease>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl DhcpLeases for FixtureDhcpLeases {
    async fn leases(&self) -> Vec<Lease> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lease_block() {
        let content = r#"
lease 192.168.1.50 {
  starts 3 2024/01/10 10:00:00;
  ends 3 2024/01/10 14:00:00;
  hardware ethernet aa:bb:cc:11:22:33;
  client-hostname "laptop";
}
"#;
        let leases = parse_lease_blocks(content);
        assert_eq!(leases.len(), 1);
        assert_eq!(leases[0].ip, "192.168.1.50".parse::<Ipv4Addr>().unwrap());
        assert_eq!(leases[0].mac.as_deref(), Some("aa:bb:cc:11:22:33"));
        assert_eq!(leases[0].hostname.as_deref(), Some("laptop"));
    }
}
