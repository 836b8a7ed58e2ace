// SSDP: per-interface UDP M-SEARCH to the UPnP multicast address, cycling
// over a vetted set of search targets.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::model::{Service, ServiceSource};

const SSDP_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
const SSDP_PORT: u16 = 1900;

const SEARCH_TARGETS: &[&str] = &[
    "upnp:rootdevice",
    "urn:schemas-upnp-org:device:MediaServer:1",
    "urn:schemas-upnp-org:device:MediaRenderer:1",
    "urn:schemas-upnp-org:device:InternetGatewayDevice:1",
    "urn:schemas-upnp-org:device:WANDevice:1",
    "urn:schemas-upnp-org:device:PrinterBasic:1",
    "urn:dial-multiscreen-org:service:dial:1",
    "urn:schemas-upnp-org:service:ContentDirectory:1",
];

fn make_search_request(st: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: 239.255.255.250:1900\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: 2\r\n\
         ST: {st}\r\n\
         \r\n"
    )
}

/// Result of the SSDP track: services per IP, plus any hostname recovered
/// from a non-numeric `LOCATION` header host for the Service Aggregator's
/// hostname merge.
#[derive(Default)]
pub struct SsdpResult {
    pub services: HashMap<Ipv4Addr, Vec<Service>>,
    pub hostnames: HashMap<Ipv4Addr, String>,
}

pub async fn search_all(budget: Duration) -> SsdpResult {
    let mut out = SsdpResult::default();
    for &st in SEARCH_TARGETS {
        for (ip, service) in search_one(st, budget).await {
            if !out.hostnames.contains_key(&ip) {
                if let Some(host) = service.txt.get("LOCATION").and_then(|loc| hostname_from_location(loc)) {
                    out.hostnames.insert(ip, host);
                }
            }
            out.services.entry(ip).or_default().push(service);
        }
    }
    out
}

/// Extracts the host component of a `LOCATION` URL, returning it only
/// when it is not a bare IPv4 address (which carries no hostname info).
fn hostname_from_location(location: &str) -> Option<String> {
    let after_scheme = location.split_once("://").map(|(_, rest)| rest)?;
    let host = after_scheme.split(['/', ':']).next()?;
    if host.is_empty() || host.parse::<Ipv4Addr>().is_ok() {
        return None;
    }
    Some(host.to_string())
}

async fn search_one(st: &str, budget: Duration) -> Vec<(Ipv4Addr, Service)> {
    let Ok(socket) = UdpSocket::bind("0.0.0.0:0").await else {
        return Vec::new();
    };
    let request = make_search_request(st);
    if socket
        .send_to(request.as_bytes(), SocketAddrV4::new(SSDP_ADDR, SSDP_PORT))
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
            Ok(Ok((len, SocketAddr::V4(from)))) => {
                let text = String::from_utf8_lossy(&buf[..len]);
                let headers = parse_headers(&text);
                let mut upnp_info = HashMap::new();
                for key in ["server", "st", "location"] {
                    if let Some(v) = headers.get(key) {
                        upnp_info.insert(key.to_uppercase(), v.clone());
                    }
                }
                results.push((
                    *from.ip(),
                    Service {
                        name: headers.get("server").cloned().unwrap_or_else(|| st.to_string()),
                        service_type: st.to_string(),
                        domain: String::new(),
                        port: SSDP_PORT,
                        protocol: "udp".to_string(),
                        txt: upnp_info,
                        source: ServiceSource::Ssdp,
                    },
                ));
            }
            Ok(Ok(_)) => continue,
            _ => break,
        }
    }
    results
}

/// Parses `Header: value` lines (case-insensitive key) from an HTTP-like
/// SSDP response, lower-casing keys for lookup.
fn parse_headers(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ssdp_response_headers() {
        let text = "HTTP/1.1 200 OK\r\n\
                     SERVER: Linux/3.0 UPnP/1.0 MyRouter/1.0\r\n\
                     ST: upnp:rootdevice\r\n\
                     LOCATION: http://192.168.1.1:5000/desc.xml\r\n\r\n";
        let headers = parse_headers(text);
        assert_eq!(headers.get("server").unwrap(), "Linux/3.0 UPnP/1.0 MyRouter/1.0");
        assert_eq!(
            headers.get("location").unwrap(),
            "http://192.168.1.1:5000/desc.xml"
        );
    }

    #[test]
    fn search_request_names_the_target() {
        let req = make_search_request("upnp:rootdevice");
        assert!(req.contains("ST: upnp:rootdevice"));
        assert!(req.starts_with("M-SEARCH * HTTP/1.1"));
    }

    #[test]
    fn hostname_from_location_rejects_bare_ip_accepts_named_host() {
        assert_eq!(hostname_from_location("http://192.168.1.1:5000/desc.xml"), None);
        assert_eq!(
            hostname_from_location("http://router.local:5000/desc.xml"),
            Some("router.local".to_string())
        );
    }
}
