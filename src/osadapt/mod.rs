// OS-interaction capability interfaces: ping, ARP, routing table, DHCP
// leases. Each is a trait with one shell-out implementation and one
// in-memory fixture implementation, so every OS-touching component can be
// exercised in tests without spawning real processes.

pub mod arp;
pub mod dhcp;
pub mod ping;
pub mod routes;

pub use arp::{Arp, FixtureArp, ShellArp};
pub use dhcp::{DhcpLeases, FileDhcpLeases, FixtureDhcpLeases};
pub use ping::{FixturePing, Ping, ShellPing};
pub use routes::{FixtureRoutingTable, RoutingTable, ShellRoutingTable};
