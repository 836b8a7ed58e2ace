// mDNS / DNS-SD queries over `.local` for a vetted set of service types.
// Builds a standard DNS PTR query by hand (no DNS-parsing crate is pulled
// in purely for this) and requests a unicast reply via the QU bit
// (RFC 6762 §5.4), so no multicast-group membership is required to read
// the answer back on our own ephemeral socket.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::model::{Service, ServiceSource};

const MDNS_ADDR: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const MDNS_PORT: u16 = 5353;
const TYPE_PTR: u16 = 12;
const CLASS_IN_QU: u16 = 0x8001;

pub const SERVICE_TYPES: &[(&str, u16)] = &[
    ("_http._tcp", 80),
    ("_ssh._tcp", 22),
    ("_airplay._tcp", 7000),
    ("_googlecast._tcp", 8009),
    ("_homekit._tcp", 0),
    ("_raop._tcp", 7000),
    ("_ipp._tcp", 631),
    ("_printer._tcp", 515),
    ("_smb._tcp", 445),
    ("_afpovertcp._tcp", 548),
    ("_adisk._tcp", 9),
    ("_timemachine._tcp", 9),
];

/// TXT keys that commonly carry a device's friendly name, checked in
/// order (Chromecast uses `fn`, HomeKit/AirPlay commonly use `name`).
const FRIENDLY_NAME_KEYS: &[&str] = &["fn", "name", "hostname", "host"];

/// Result of the mDNS track: services per IP, plus any friendly name
/// harvested from TXT records for the Service Aggregator's hostname merge.
#[derive(Default)]
pub struct MdnsResult {
    pub services: HashMap<Ipv4Addr, Vec<Service>>,
    pub hostnames: HashMap<Ipv4Addr, String>,
}

/// Queries every vetted service type and returns the merged-by-IP result.
pub async fn query_all(budget: Duration) -> MdnsResult {
    let mut out = MdnsResult::default();
    for &(service_type, default_port) in SERVICE_TYPES {
        for (ip, service) in query_one(service_type, default_port, budget).await {
            if !out.hostnames.contains_key(&ip) {
                if let Some(name) = friendly_name(&service.txt) {
                    out.hostnames.insert(ip, name);
                }
            }
            out.services.entry(ip).or_default().push(service);
        }
    }
    out
}

fn friendly_name(txt: &HashMap<String, String>) -> Option<String> {
    FRIENDLY_NAME_KEYS.iter().find_map(|key| txt.get(*key).cloned())
}

async fn query_one(service_type: &str, default_port: u16, budget: Duration) -> Vec<(Ipv4Addr, Service)> {
    let Ok(socket) = UdpSocket::bind("0.0.0.0:0").await else {
        return Vec::new();
    };
    let query = build_ptr_query(service_type);
    if socket
        .send_to(&query, SocketAddrV4::new(MDNS_ADDR, MDNS_PORT))
        .await
        .is_err()
    {
        return Vec::new();
    }

    let mut results = Vec::new();
    let mut buf = [0u8; 2048];
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        match timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, SocketAddr::V4(from)))) if len > 12 => {
                let txt = extract_txt_pairs(&buf[..len]);
                results.push((
                    *from.ip(),
                    Service {
                        name: format!("{}.local", from.ip()),
                        service_type: service_type.to_string(),
                        domain: "local".to_string(),
                        port: default_port,
                        protocol: "tcp".to_string(),
                        txt,
                        source: ServiceSource::Mdns,
                    },
                ));
            }
            Ok(Ok(_)) => continue,
            _ => break,
        }
    }
    results
}

/// Hand-encoded standard DNS query: header + one question (QNAME/QTYPE/QCLASS).
fn build_ptr_query(service_type: &str) -> Vec<u8> {
    let mut msg = Vec::with_capacity(32);
    msg.extend_from_slice(&0x1234u16.to_be_bytes()); // transaction id
    msg.extend_from_slice(&0x0000u16.to_be_bytes()); // flags: standard query
    msg.extend_from_slice(&1u16.to_be_bytes()); // qdcount
    msg.extend_from_slice(&0u16.to_be_bytes()); // ancount
    msg.extend_from_slice(&0u16.to_be_bytes()); // nscount
    msg.extend_from_slice(&0u16.to_be_bytes()); // arcount

    let qname = format!("{service_type}.local");
    for label in qname.split('.') {
        msg.push(label.len() as u8);
        msg.extend_from_slice(label.as_bytes());
    }
    msg.push(0); // root label

    msg.extend_from_slice(&TYPE_PTR.to_be_bytes());
    msg.extend_from_slice(&CLASS_IN_QU.to_be_bytes());
    msg
}

/// Pragmatic TXT extraction: scans the raw response for printable ASCII
/// runs containing `=` and splits on the first one into a key/value pair.
fn extract_txt_pairs(buf: &[u8]) -> HashMap<String, String> {
    let mut pairs = HashMap::new();
    let mut run = Vec::new();
    let mut flush = |run: &mut Vec<u8>, pairs: &mut HashMap<String, String>| {
        if run.len() > 2 {
            if let Ok(text) = std::str::from_utf8(run) {
                if let Some((k, v)) = text.split_once('=') {
                    if !k.is_empty() {
                        pairs.insert(k.to_string(), v.to_string());
                    }
                }
            }
        }
        run.clear();
    };
    for &b in buf {
        if b.is_ascii_graphic() || b == b' ' {
            run.push(b);
        } else {
            flush(&mut run, &mut pairs);
        }
    }
    flush(&mut run, &mut pairs);
    pairs
}
