// Service Aggregator: fans out every discovery track in parallel and
// merges the results into a single per-IP service map. Each track is an
// independent task; slow or failing trackers never block the others.

pub mod broadcast;
pub mod mdns;
pub mod ssdp;
pub mod multicast;

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::model::Service;
use crate::util::Cidr;

/// All services discovered for one host, plus any UPnP metadata to merge
/// into that host's `upnp_info` and any hostname to adopt if the host has
/// none yet.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredServices {
    pub services: Vec<Service>,
    pub upnp_info: HashMap<String, String>,
    pub hostname: Option<String>,
}

/// Runs the mDNS, SSDP, multicast-group, and common-services broadcast
/// tracks concurrently for `subnet` and merges their results by IP.
pub async fn discover(subnet: Cidr, budget: Duration) -> HashMap<Ipv4Addr, DiscoveredServices> {
    let (mdns, ssdp, igmp, broadcast) = tokio::join!(
        mdns::query_all(budget),
        ssdp::search_all(budget),
        multicast::probe_all(budget),
        broadcast::probe_subnet(subnet),
    );

    let mut merged: HashMap<Ipv4Addr, DiscoveredServices> = HashMap::new();
    for track in [mdns.services, ssdp.services, igmp, broadcast] {
        merge_track(&mut merged, track);
    }
    for (ip, hostname) in mdns.hostnames.into_iter().chain(ssdp.hostnames) {
        let entry = merged.entry(ip).or_default();
        if entry.hostname.is_none() {
            entry.hostname = Some(hostname);
        }
    }
    merged
}

fn merge_track(merged: &mut HashMap<Ipv4Addr, DiscoveredServices>, track: HashMap<Ipv4Addr, Vec<Service>>) {
    for (ip, services) in track {
        let entry = merged.entry(ip).or_default();
        for service in services {
            if service.service_type == "upnp:rootdevice" || service.source == crate::model::ServiceSource::Ssdp {
                for (k, v) in &service.txt {
                    entry.upnp_info.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
            entry.services.push(service);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceSource;

    fn svc(source: ServiceSource) -> Service {
        Service {
            name: "x".to_string(),
            service_type: "t".to_string(),
            domain: String::new(),
            port: 1,
            protocol: "udp".to_string(),
            txt: HashMap::from([("SERVER".to_string(), "x".to_string())]),
            source,
        }
    }

    #[test]
    fn merge_appends_services_and_unions_upnp_info() {
        let mut merged = HashMap::new();
        let ip: Ipv4Addr = "192.168.1.5".parse().unwrap();
        merge_track(&mut merged, HashMap::from([(ip, vec![svc(ServiceSource::Mdns)])]));
        merge_track(&mut merged, HashMap::from([(ip, vec![svc(ServiceSource::Ssdp)])]));

        let entry = merged.get(&ip).unwrap();
        assert_eq!(entry.services.len(), 2);
        assert_eq!(entry.upnp_info.get("SERVER").map(String::as_str), Some("x"));
    }
}
