// Multicast-group probe: a tiny datagram to each of a fixed set of
// well-known multicast groups; any reply is evidence of an IGMP-aware
// listener on that address.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::model::{Service, ServiceSource};

const PROBE_PORT: u16 = 1900;

const GROUPS: &[Ipv4Addr] = &[
    Ipv4Addr::new(224, 0, 0, 1),
    Ipv4Addr::new(224, 0, 0, 2),
    Ipv4Addr::new(224, 0, 0, 22),
    Ipv4Addr::new(224, 0, 0, 251),
    Ipv4Addr::new(224, 0, 0, 252),
    Ipv4Addr::new(239, 255, 255, 250),
    Ipv4Addr::new(224, 0, 1, 60),
    Ipv4Addr::new(224, 0, 1, 129),
    Ipv4Addr::new(224, 2, 127, 254),
];

pub async fn probe_all(budget: Duration) -> HashMap<Ipv4Addr, Vec<Service>> {
    let mut out: HashMap<Ipv4Addr, Vec<Service>> = HashMap::new();
    for &group in GROUPS {
        for (ip, service) in probe_one(group, budget).await {
            out.entry(ip).or_default().push(service);
        }
    }
    out
}

async fn probe_one(group: Ipv4Addr, budget: Duration) -> Vec<(Ipv4Addr, Service)> {
    let Ok(socket) = UdpSocket::bind("0.0.0.0:0").await else {
        return Vec::new();
    };
    if socket
        .send_to(b"\r\n", SocketAddrV4::new(group, PROBE_PORT))
        .await
        .is_err()
    {
        return Vec::new();
    }

    let mut results = Vec::new();
    let mut buf = [0u8; 512];
    match timeout(budget, socket.recv_from(&mut buf)).await {
        Ok(Ok((_, SocketAddr::V4(from)))) => {
            results.push((
                *from.ip(),
                Service {
                    name: group.to_string(),
                    service_type: "multicast-group".to_string(),
                    domain: String::new(),
                    port: PROBE_PORT,
                    protocol: "udp".to_string(),
                    txt: HashMap::new(),
                    source: ServiceSource::Igmp,
                },
            ));
        }
        _ => {}
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_list_matches_fixed_set() {
        assert_eq!(GROUPS.len(), 9);
        assert!(GROUPS.contains(&Ipv4Addr::new(224, 0, 0, 251)));
    }
}
