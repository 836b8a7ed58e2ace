// DNS Resolver: bulk reverse lookups with bounded concurrency and a
// process-scoped cache (including negative results).

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tokio::sync::Semaphore;
use tracing::debug;

const CONCURRENCY_CAP: usize = 10;
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Bulk reverse-DNS resolver. Holds its own cache, success counters, and a
/// single resolver built from the platform's `/etc/resolv.conf` (or
/// platform-native equivalent) so VPN split-DNS routes are honored; cheap
/// to clone (all state is `Arc`-backed).
#[derive(Clone)]
pub struct DnsResolver {
    resolver: Arc<TokioAsyncResolver>,
    cache: Arc<DashMap<Ipv4Addr, String>>,
    successful: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
}

impl Default for DnsResolver {
    fn default() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .unwrap_or_else(|_| TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()));
        Self {
            resolver: Arc::new(resolver),
            cache: Arc::new(DashMap::new()),
            successful: Arc::new(AtomicU64::new(0)),
            total: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl DnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every address concurrently, capped at 10 in flight.
    /// Returns `(ip, Option<hostname>)` pairs in input order.
    pub async fn resolve_bulk(&self, ips: &[Ipv4Addr]) -> Vec<(Ipv4Addr, Option<String>)> {
        let semaphore = Arc::new(Semaphore::new(CONCURRENCY_CAP));
        let tasks: Vec<_> = ips
            .iter()
            .copied()
            .map(|ip| {
                let sem = Arc::clone(&semaphore);
                let this = self.clone();
                tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.ok();
                    let hostname = this.resolve_one(ip).await;
                    (ip, hostname)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            if let Ok(pair) = task.await {
                results.push(pair);
            }
        }
        results
    }

    /// Resolves a single IP, consulting and updating the cache.
    pub async fn resolve_one(&self, ip: Ipv4Addr) -> Option<String> {
        if let Some(cached) = self.cache.get(&ip) {
            return non_empty(cached.value().clone());
        }

        self.total.fetch_add(1, Ordering::Relaxed);
        let resolved = self.query(ip).await;
        let accepted = resolved.filter(|h| is_valid_ptr(h));

        if accepted.is_some() {
            self.successful.fetch_add(1, Ordering::Relaxed);
        }
        self.cache.insert(ip, accepted.clone().unwrap_or_default());
        accepted
    }

    async fn query(&self, ip: Ipv4Addr) -> Option<String> {
        match tokio::time::timeout(LOOKUP_TIMEOUT, self.resolver.reverse_lookup(ip.into())).await {
            Ok(Ok(response)) => response
                .iter()
                .next()
                .map(|name| name.to_string().trim_end_matches('.').to_string()),
            Ok(Err(e)) => {
                debug!(%ip, error = %e, "reverse lookup failed");
                None
            }
            Err(_) => {
                debug!(%ip, "reverse lookup timed out");
                None
            }
        }
    }

    /// `(successful, total)` lookups issued so far.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.successful.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }

    pub fn clear(&self) {
        self.cache.clear();
        self.successful.store(0, Ordering::Relaxed);
        self.total.store(0, Ordering::Relaxed);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Rejects empty, `localhost`, leading `_`/`.`, `unknown`, overlong, or
/// non-`[A-Za-z0-9.-]` answers.
fn is_valid_ptr(hostname: &str) -> bool {
    if hostname.is_empty()
        || hostname.eq_ignore_ascii_case("localhost")
        || hostname.eq_ignore_ascii_case("unknown")
        || hostname.len() > 253
        || hostname.starts_with('_')
        || hostname.starts_with('.')
    {
        return false;
    }
    hostname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_known_invalid_patterns() {
        assert!(!is_valid_ptr(""));
        assert!(!is_valid_ptr("localhost"));
        assert!(!is_valid_ptr("unknown"));
        assert!(!is_valid_ptr("_googlecast-._tcp.local"));
        assert!(!is_valid_ptr(".hidden.local"));
        assert!(!is_valid_ptr(&"a".repeat(254)));
        assert!(!is_valid_ptr("bad host name"));
    }

    #[test]
    fn accepts_plausible_hostname() {
        assert!(is_valid_ptr("webserver.local"));
        assert!(is_valid_ptr("my-printer-2.example.com"));
    }

    #[tokio::test]
    async fn cache_hit_avoids_requerying() {
        let resolver = DnsResolver::new();
        resolver.cache.insert("10.0.0.5".parse().unwrap(), "host.local".to_string());
        let result = resolver.resolve_one("10.0.0.5".parse().unwrap()).await;
        assert_eq!(result.as_deref(), Some("host.local"));
        assert_eq!(resolver.stats(), (0, 0));
    }
}
