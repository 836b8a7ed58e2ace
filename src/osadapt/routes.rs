use async_trait::async_trait;
use std::net::Ipv4Addr;

use crate::model::Route;
use crate::util::Cidr;

/// OS-specific routing table access. A failed invocation of the underlying
/// command is a single "no routes" outcome — never a partial list.
#[async_trait]
pub trait RoutingTable: Send + Sync {
    async fn routes(&self) -> Vec<Route>;
}

pub struct ShellRoutingTable;

#[async_trait]
impl RoutingTable for ShellRoutingTable {
    async fn routes(&self) -> Vec<Route> {
        tokio::task::spawn_blocking(|| {
            if cfg!(target_os = "windows") {
                run_and_parse("route", &["print", "-4"], parse_windows_route_print)
            } else if cfg!(target_os = "macos") {
                run_and_parse("netstat", &["-rn", "-f", "inet"], parse_macos_netstat)
            } else {
                run_and_parse("ip", &["route", "show"], parse_linux_ip_route)
            }
        })
        .await
        .unwrap_or_default()
    }
}

fn run_and_parse(cmd: &str, args: &[&str], parse: fn(&str) -> Vec<Route>) -> Vec<Route> {
    std::process::Command::new(cmd)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| parse(&String::from_utf8_lossy(&o.stdout)))
        .unwrap_or_default()
}

/// `default via 192.168.1.1 dev eth0 metric 100` / `10.0.0.0/8 dev eth0 scope link`
fn parse_linux_ip_route(text: &str) -> Vec<Route> {
    text.lines().filter_map(parse_linux_route_line).collect()
}

fn parse_linux_route_line(line: &str) -> Option<Route> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }
    let destination = if tokens[0] == "default" {
        "0.0.0.0/0".parse().ok()?
    } else if tokens[0].contains('/') {
        tokens[0].parse().ok()?
    } else {
        format!("{}/32", tokens[0]).parse().ok()?
    };
    let gateway = find_after(&tokens, "via").and_then(|s| s.parse::<Ipv4Addr>().ok());
    let interface = find_after(&tokens, "dev")?.to_string();
    let metric = find_after(&tokens, "metric")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    Some(Route {
        destination,
        gateway,
        interface,
        metric,
    })
}

/// `default    192.168.1.1       UGScg           en0`
fn parse_macos_netstat(text: &str) -> Vec<Route> {
    text.lines().filter_map(parse_macos_route_line).collect()
}

fn parse_macos_route_line(line: &str) -> Option<Route> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return None;
    }
    let dest_tok = tokens[0];
    let destination: Cidr = if dest_tok == "default" {
        "0.0.0.0/0".parse().ok()?
    } else if dest_tok.contains('/') {
        dest_tok.parse().ok()?
    } else {
        format!("{}/32", dest_tok).parse().ok()?
    };
    let gateway = tokens[1].parse::<Ipv4Addr>().ok();
    let interface = tokens[tokens.len() - 1].to_string();
    Some(Route {
        destination,
        gateway,
        interface,
        metric: 0,
    })
}

/// `0.0.0.0   0.0.0.0   192.168.1.1   192.168.1.50   25`
fn parse_windows_route_print(text: &str) -> Vec<Route> {
    text.lines().filter_map(parse_windows_route_line).collect()
}

fn parse_windows_route_line(line: &str) -> Option<Route> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 5 {
        return None;
    }
    let network: Ipv4Addr = tokens[0].parse().ok()?;
    let mask: Ipv4Addr = tokens[1].parse().ok()?;
    let gateway: Ipv4Addr = tokens[2].parse().ok()?;
    let interface: Ipv4Addr = tokens[3].parse().ok()?;
    let metric: u32 = tokens[4].parse().ok()?;
    let prefix = u32::from(mask).count_ones() as u8;
    let destination = Cidr::new(network, prefix).ok()?;
    Some(Route {
        destination,
        gateway: Some(gateway),
        interface: interface.to_string(),
        metric,
    })
}

fn find_after<'a>(tokens: &[&'a str], marker: &str) -> Option<&'a str> {
    tokens
        .iter()
        .position(|t| *t == marker)
        .and_then(|i| tokens.get(i + 1))
        .copied()
}

/// Returns the route with the longest matching destination prefix for
/// `ip`, ties broken by lower metric.
pub fn longest_prefix_match(routes: &[Route], ip: Ipv4Addr) -> Option<&Route> {
    routes
        .iter()
        .filter(|r| r.destination.contains(ip))
        .max_by_key(|r| (r.destination.prefix(), std::cmp::Reverse(r.metric)))
}

/// In-memory fixture routing table for tests.
pub struct FixtureRoutingTable {
    pub entries: Vec<Route>,
}

impl FixtureRoutingTable {
    pub fn new(entries: Vec<Route>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl RoutingTable for FixtureRoutingTable {
    async fn routes(&self) -> Vec<Route> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linux_default_route() {
        let text = "default via 192.168.1.1 dev eth0 proto dhcp metric 100\n\
                     10.0.0.0/8 dev eth0 scope link\n";
        let routes = parse_linux_ip_route(text);
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].destination.to_string(), "0.0.0.0/0");
        assert_eq!(routes[0].gateway, Some("192.168.1.1".parse().unwrap()));
        assert_eq!(routes[0].interface, "eth0");
        assert_eq!(routes[0].metric, 100);
    }

    #[test]
    fn longest_prefix_wins_over_default() {
        let routes = vec![
            Route {
                destination: "0.0.0.0/0".parse().unwrap(),
                gateway: Some("192.168.1.1".parse().unwrap()),
                interface: "eth0".to_string(),
                metric: 100,
            },
            Route {
                destination: "192.168.1.0/24".parse().unwrap(),
                gateway: None,
                interface: "eth0".to_string(),
                metric: 0,
            },
        ];
        let matched = longest_prefix_match(&routes, "192.168.1.55".parse().unwrap()).unwrap();
        assert_eq!(matched.destination.prefix(), 24);
    }
}
