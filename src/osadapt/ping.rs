use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

/// One-packet reachability check delegated to the OS `ping` utility.
/// A timeout or non-zero exit is always a negative answer, never an error.
#[async_trait]
pub trait Ping: Send + Sync {
    async fn ping(&self, ip: Ipv4Addr, timeout: Duration) -> bool;
}

pub struct ShellPing;

#[async_trait]
impl Ping for ShellPing {
    async fn ping(&self, ip: Ipv4Addr, timeout: Duration) -> bool {
        let addr = ip.to_string();
        let secs = timeout.as_secs().max(1);
        tokio::task::spawn_blocking(move || {
            let mut cmd = if cfg!(target_os = "windows") {
                let mut c = std::process::Command::new("ping");
                c.args(["-n", "1", "-w", &(secs * 1000).to_string(), &addr]);
                c
            } else {
                let mut c = std::process::Command::new("ping");
                c.args(["-c", "1", "-W", &secs.to_string(), &addr]);
                c
            };
            cmd.output().map(|o| o.status.success()).unwrap_or(false)
        })
        .await
        .unwrap_or(false)
    }
}

/// In-memory fixture: a fixed set of IPs that "respond". Used by planner
/// and orchestrator tests instead of spawning real `ping` processes.
#[derive(Default)]
pub struct FixturePing {
    pub alive: HashMap<Ipv4Addr, bool>,
}

impl FixturePing {
    pub fn new(alive: impl IntoIterator<Item = Ipv4Addr>) -> Self {
        Self {
            alive: alive.into_iter().map(|ip| (ip, true)).collect(),
        }
    }
}

#[async_trait]
impl Ping for FixturePing {
    async fn ping(&self, ip: Ipv4Addr, _timeout: Duration) -> bool {
        self.alive.get(&ip).copied().unwrap_or(false)
    }
}
