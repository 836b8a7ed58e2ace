// Reachability Prober and Port Sampler: the two host-level probes run
// against every address under bounded parallelism.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::osadapt::Ping;

/// Budget for the platform `ping` invocation used by the main scan.
pub const PING_BUDGET: Duration = Duration::from_secs(1);

/// Default scan timeout used to derive the Intelligent Discovery liveness
/// probe's port-80/fallback budgets.
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(1);

/// Fixed well-known port set sampled against every alive host, in the
/// order they must be reported in.
pub const SAMPLE_PORTS: &[u16] = &[
    22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 993, 995, 1723, 3389, 5900, 8080,
];

pub const PORT_BUDGET: Duration = Duration::from_millis(500);

/// OS-ping based liveness check. Never raises — a timeout is "not alive".
pub async fn is_alive(ip: Ipv4Addr, ping: &dyn Ping) -> bool {
    ping.ping(ip, PING_BUDGET).await
}

/// Single TCP-connect attempt, closing immediately. A budget expiry or a
/// connection error both report as "closed".
pub async fn tcp_connect(ip: Ipv4Addr, port: u16, budget: Duration) -> bool {
    let addr = SocketAddr::new(IpAddr::V4(ip), port);
    timeout(budget, TcpStream::connect(addr))
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
}

/// Intelligent Discovery's own liveness probe: TCP-connect to port 80 with
/// half the scan timeout; on failure, {22, 53, 80, 443} at a tenth each.
pub async fn tcp_liveness_probe(ip: Ipv4Addr, scan_timeout: Duration) -> bool {
    if tcp_connect(ip, 80, scan_timeout / 2).await {
        return true;
    }
    let per_port = scan_timeout / 10;
    for port in [22u16, 53, 80, 443] {
        if tcp_connect(ip, port, per_port).await {
            return true;
        }
    }
    false
}

/// Samples the fixed port set, returning only the ports that completed a
/// handshake, in `SAMPLE_PORTS` definition order.
pub async fn sample_ports(ip: Ipv4Addr) -> Vec<u16> {
    let checks = futures::future::join_all(
        SAMPLE_PORTS
            .iter()
            .map(|&port| async move { (port, tcp_connect(ip, port, PORT_BUDGET).await) }),
    )
    .await;
    checks
        .into_iter()
        .filter_map(|(port, open)| open.then_some(port))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osadapt::FixturePing;

    #[tokio::test]
    async fn is_alive_reflects_fixture() {
        let ping = FixturePing::new(["192.168.1.1".parse().unwrap()]);
        assert!(is_alive("192.168.1.1".parse().unwrap(), &ping).await);
        assert!(!is_alive("192.168.1.2".parse().unwrap(), &ping).await);
    }

    #[tokio::test]
    async fn tcp_connect_to_closed_local_port_fails_fast() {
        let ok = tcp_connect(Ipv4Addr::LOCALHOST, 1, Duration::from_millis(50)).await;
        assert!(!ok);
    }
}
