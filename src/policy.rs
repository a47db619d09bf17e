//! Host policy gate
//!
//! Decides whether a remote host may interact with this instance at
//! all, in either allow-list or block-list mode. The policy lists are
//! owned by an external source (admin settings); this module reads
//! them through a short-lived snapshot cache so admin changes take
//! effect quickly, with a manual invalidation hook for immediate
//! effect.
//!
//! All host comparisons happen on punycode-normalized, lowercased
//! hostnames. Normalization runs before any set membership test.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::AppError;

/// Normalize a hostname for policy comparison.
///
/// Lowercases, strips a trailing dot, and converts Unicode labels to
/// their punycode (ASCII) form via the `url` crate's IDNA handling.
/// Inputs that do not parse as a host are lowercased verbatim so that
/// comparisons stay deterministic.
pub fn normalize_host(host: &str) -> String {
    let trimmed = host.trim().trim_end_matches('.');
    let parsed = url::Url::parse(&format!("http://{trimmed}"))
        .ok()
        .and_then(|url| url.host_str().map(|h| h.to_string()));
    parsed
        .unwrap_or_else(|| trimmed.to_string())
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Extract the normalized host of a URI, if it has one.
pub fn host_of(uri: &str) -> Option<String> {
    let url = url::Url::parse(uri).ok()?;
    url.host_str().map(normalize_host)
}

/// Policy list interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    /// Only hosts on the list may interact
    Allow,
    /// Hosts on the list may not interact
    Deny,
}

/// A point-in-time snapshot of the host policy
#[derive(Debug, Clone)]
pub struct HostPolicy {
    pub mode: PolicyMode,
    hosts: HashSet<String>,
}

impl HostPolicy {
    /// Allow-list policy over the given hosts.
    pub fn allow<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(PolicyMode::Allow, hosts)
    }

    /// Block-list policy over the given hosts.
    pub fn deny<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(PolicyMode::Deny, hosts)
    }

    fn new<I, S>(mode: PolicyMode, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|host| normalize_host(host.as_ref()))
            .collect();
        Self { mode, hosts }
    }

    /// Whether a normalized host is blocked under this snapshot.
    fn blocks(&self, host: &str) -> bool {
        match self.mode {
            PolicyMode::Allow => !self.hosts.contains(host),
            PolicyMode::Deny => self.hosts.contains(host),
        }
    }
}

/// Source of host policy snapshots
///
/// Implemented by the embedding application over its settings store.
/// Called on every gate check (through the snapshot cache), so an
/// implementation should be cheap.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostPolicySource: Send + Sync {
    /// Produce the current policy snapshot.
    async fn snapshot(&self) -> Result<HostPolicy, AppError>;
}

/// Cached policy snapshot entry
struct CachedSnapshot {
    policy: HostPolicy,
    cached_at: Instant,
}

impl CachedSnapshot {
    fn is_valid(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() < ttl
    }
}

/// Read-through cache over a [`HostPolicySource`]
///
/// Bounds how stale a served snapshot can be (TTL) and offers manual
/// invalidation for policy changes that must apply immediately.
pub struct PolicyCache {
    source: Arc<dyn HostPolicySource>,
    ttl: Duration,
    cached: RwLock<Option<CachedSnapshot>>,
}

impl PolicyCache {
    /// Create a new snapshot cache.
    ///
    /// # Arguments
    /// * `source` - Policy source to read through
    /// * `ttl` - Maximum snapshot staleness
    pub fn new(source: Arc<dyn HostPolicySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Get the current policy, reading through on miss or expiry.
    pub async fn snapshot(&self) -> Result<HostPolicy, AppError> {
        use crate::metrics::{CACHE_HITS_TOTAL, CACHE_MISSES_TOTAL};

        {
            let cached = self.cached.read().await;
            if let Some(entry) = cached.as_ref() {
                if entry.is_valid(self.ttl) {
                    CACHE_HITS_TOTAL.with_label_values(&["host_policy"]).inc();
                    return Ok(entry.policy.clone());
                }
                tracing::debug!("Host policy snapshot expired");
            }
        }

        CACHE_MISSES_TOTAL
            .with_label_values(&["host_policy"])
            .inc();
        let policy = self.source.snapshot().await?;

        let mut cached = self.cached.write().await;
        *cached = Some(CachedSnapshot {
            policy: policy.clone(),
            cached_at: Instant::now(),
        });

        Ok(policy)
    }

    /// Drop the cached snapshot so the next read hits the source.
    pub async fn invalidate(&self) {
        let mut cached = self.cached.write().await;
        *cached = None;
        tracing::debug!("Invalidated host policy snapshot");
    }
}

/// Host policy gate
///
/// The single decision point for "may this host interact". Local
/// traffic (no host, or this instance's own host) is always allowed.
pub struct HostPolicyGate {
    cache: PolicyCache,
    local_host: String,
}

impl HostPolicyGate {
    /// Create a gate for the given instance domain.
    ///
    /// # Arguments
    /// * `source` - Policy source to read through
    /// * `local_domain` - This instance's public domain
    /// * `snapshot_ttl` - Maximum policy snapshot staleness
    pub fn new(
        source: Arc<dyn HostPolicySource>,
        local_domain: &str,
        snapshot_ttl: Duration,
    ) -> Self {
        Self {
            cache: PolicyCache::new(source, snapshot_ttl),
            local_host: normalize_host(local_domain),
        }
    }

    /// Whether the given host is blocked from interacting.
    ///
    /// `None` (no host at all) and the local instance host are never
    /// blocked. Everything else is decided by the current policy
    /// snapshot, re-read through the cache on every call.
    pub async fn is_host_blocked(&self, host: Option<&str>) -> Result<bool, AppError> {
        let Some(host) = host else {
            return Ok(false);
        };

        let host = normalize_host(host);
        if host == self.local_host {
            return Ok(false);
        }

        let policy = self.cache.snapshot().await?;
        let blocked = policy.blocks(&host);
        if blocked {
            tracing::info!(host = %host, mode = ?policy.mode, "Host rejected by policy");
        }
        Ok(blocked)
    }

    /// Force the next check to re-read the policy source.
    ///
    /// Hook for "policy changed" signals from the admin surface.
    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }
}
