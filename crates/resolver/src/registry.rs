//! Process-wide registry of live resolvers
//!
//! Resolvers are added with [`ResolverRegistry::register`] and stay until
//! deregistered or the registry is reset. Dumps and reloads visit them in
//! registration order.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use kv_resolver_core::Result;

const REGISTERED_GAUGE: &str = "kv_resolver_registered_resolvers";

static REGISTRY: Lazy<ResolverRegistry> = Lazy::new(ResolverRegistry::new);

/// The process-wide registry
pub fn registry() -> &'static ResolverRegistry {
    &REGISTRY
}

/// Operations the registry needs from a resolver, independent of its payload type
pub trait ManagedResolver: Send + Sync {
    /// One-line description, e.g. `KeyValueResolver{domains=[a, b]}`
    fn describe(&self) -> String;

    fn dump(&self) -> String;

    /// Dump of one key, `None` when the resolver does not hold it
    fn dump_key(&self, key: &str) -> Result<Option<String>>;

    fn reload(&self) -> Result<()>;
}

pub type RegistrationId = Uuid;

struct Registration {
    seq: u64,
    resolver: Arc<dyn ManagedResolver>,
}

#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: DashMap<RegistrationId, Registration>,
    next_seq: AtomicU64,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, resolver: Arc<dyn ManagedResolver>) -> RegistrationId {
        let id = Uuid::new_v4();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id = %id, resolver = %resolver.describe(), "Registered resolver");
        self.resolvers.insert(id, Registration { seq, resolver });
        self.update_gauge();
        id
    }

    /// Returns whether `id` was registered
    pub fn deregister(&self, id: &RegistrationId) -> bool {
        let removed = self.resolvers.remove(id).is_some();
        if removed {
            tracing::debug!(id = %id, "Deregistered resolver");
            self.update_gauge();
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Every resolver's dump, each followed by a blank line
    pub fn dump_all(&self) -> String {
        let mut out = String::new();
        for resolver in self.snapshot() {
            out.push_str(&resolver.dump());
            out.push_str("\n\n");
        }
        out
    }

    /// The key's values from every resolver holding it
    pub fn dump_key(&self, key: &str) -> Result<String> {
        let mut out = String::new();
        for resolver in self.snapshot() {
            if let Some(dump) = resolver.dump_key(key)? {
                out.push_str(&dump);
                out.push_str("\n\n");
            }
        }
        Ok(out)
    }

    /// Reload every resolver; stops at the first failure
    pub fn reload_all(&self) -> Result<()> {
        let resolvers = self.snapshot();
        for resolver in &resolvers {
            resolver.reload()?;
        }
        tracing::info!(resolvers = resolvers.len(), "Reloaded registered resolvers");
        Ok(())
    }

    /// `[desc1, desc2]`
    pub fn list(&self) -> String {
        let descriptions: Vec<String> = self
            .snapshot()
            .iter()
            .map(|resolver| resolver.describe())
            .collect();
        format!("[{}]", descriptions.join(", "))
    }

    pub fn reset(&self) {
        self.resolvers.clear();
        self.update_gauge();
    }

    /// Registered resolvers in registration order, taken without holding shard locks
    fn snapshot(&self) -> Vec<Arc<dyn ManagedResolver>> {
        let mut entries: Vec<(u64, Arc<dyn ManagedResolver>)> = self
            .resolvers
            .iter()
            .map(|entry| (entry.seq, Arc::clone(&entry.resolver)))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, resolver)| resolver).collect()
    }

    fn update_gauge(&self) {
        metrics::gauge!(REGISTERED_GAUGE).set(self.resolvers.len() as f64);
    }
}
