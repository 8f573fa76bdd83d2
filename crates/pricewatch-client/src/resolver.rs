use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// DNS resolver that keeps lookups for a fixed TTL.
#[derive(Debug, Clone)]
pub struct CachingResolver {
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, CachedLookup>>>,
}

#[derive(Debug, Clone)]
struct CachedLookup {
    resolved_at: Instant,
    addrs: Vec<SocketAddr>,
}

impl CachingResolver {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached addresses for `host`, if the entry is still fresh. An expired
    /// entry is evicted.
    pub fn cached(&self, host: &str) -> Option<Vec<SocketAddr>> {
        let mut entries = self.entries.lock().ok()?;
        let entry = entries.get(host)?;
        if entry.resolved_at.elapsed() < self.ttl {
            return Some(entry.addrs.clone());
        }
        entries.remove(host);
        None
    }

    fn store(&self, host: &str, addrs: &[SocketAddr]) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                host.to_string(),
                CachedLookup {
                    resolved_at: Instant::now(),
                    addrs: addrs.to_vec(),
                },
            );
        }
    }

    async fn lookup(&self, host: String) -> std::io::Result<Vec<SocketAddr>> {
        if let Some(addrs) = self.cached(&host) {
            return Ok(addrs);
        }
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
            .await?
            .collect();
        if !addrs.is_empty() {
            tracing::trace!(%host, count = addrs.len(), "DNS lookup cached");
            self.store(&host, &addrs);
        }
        Ok(addrs)
    }
}

impl Resolve for CachingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        let host = name.as_str().to_string();
        Box::pin(async move {
            let addrs = resolver.lookup(host).await?;
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<_, BoxError>(addrs)
        })
    }
}
