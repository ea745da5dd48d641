//! Counters emitted through the `metrics` facade
//!
//! Nothing is recorded unless the host process installs a recorder.

pub const LOOKUPS_TOTAL: &str = "kv_resolver_lookups_total";
pub const LOADS_TOTAL: &str = "kv_resolver_persistence_loads_total";
pub const STORES_TOTAL: &str = "kv_resolver_stores_total";
pub const REMOVALS_TOTAL: &str = "kv_resolver_removals_total";
pub const RELOADS_TOTAL: &str = "kv_resolver_reloads_total";

/// Record a lookup against the store
pub fn record_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!(LOOKUPS_TOTAL, "result" => result).increment(1);
}

/// Record a load-through from persistence
pub fn record_load(found: bool) {
    let result = if found { "found" } else { "absent" };
    metrics::counter!(LOADS_TOTAL, "result" => result).increment(1);
}

pub fn record_store() {
    metrics::counter!(STORES_TOTAL).increment(1);
}

/// Record removed overrides; `kind` is `value`, `key` or `change_set`
pub fn record_removal(kind: &'static str, count: usize) {
    metrics::counter!(REMOVALS_TOTAL, "kind" => kind).increment(count as u64);
}

/// Record a reload; `scope` is `all` or `key`
pub fn record_reload(scope: &'static str) {
    metrics::counter!(RELOADS_TOTAL, "scope" => scope).increment(1);
}
