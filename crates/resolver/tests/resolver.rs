//! Integration tests for the resolver facade
//!
//! Lookups, change sets, persistence notifications and filtered snapshots.

use parking_lot::Mutex;
use std::sync::Arc;

use kv_resolver::{
    DomainResolver, DomainSpecificValue, KeyValueResolver, KeyValues, MapBackedDomainResolver,
    MapBackedDomainValues, Persistence, PersistenceError, ResolverError, SharedFactory,
    SharedPersistence, Value,
};
use kv_resolver_persistence::{InMemoryPersistence, KeyValuesRecord, ValueRecord};

/// Answers every domain with its own name
struct Echo;

impl DomainResolver for Echo {
    fn domain_value(&self, domain: &str) -> Option<String> {
        Some(domain.to_string())
    }
}

/// In-memory persistence recording every call
#[derive(Default)]
struct Recording {
    inner: InMemoryPersistence<Value>,
    events: Mutex<Vec<String>>,
}

impl Recording {
    fn record(&self, event: String) {
        self.events.lock().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn has_event(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }
}

impl Persistence<Value> for Recording {
    fn load(&self, key: &str, factory: &SharedFactory<Value>) -> Result<Option<KeyValues>, PersistenceError> {
        self.record(format!("load {}", key));
        self.inner.load(key, factory)
    }

    fn load_all(&self, factory: &SharedFactory<Value>) -> Result<Vec<KeyValues>, PersistenceError> {
        self.record("load_all".to_string());
        self.inner.load_all(factory)
    }

    fn reload(
        &self,
        current: Vec<Arc<KeyValues>>,
        factory: &SharedFactory<Value>,
    ) -> Result<Vec<Arc<KeyValues>>, PersistenceError> {
        self.record("reload".to_string());
        self.inner.reload(current, factory)
    }

    fn store(
        &self,
        key: &str,
        key_values: &KeyValues,
        changed: &DomainSpecificValue,
    ) -> Result<(), PersistenceError> {
        self.record(format!("store {} {}", key, changed));
        self.inner.store(key, key_values, changed)
    }

    fn remove_key(&self, key: &str) -> Result<(), PersistenceError> {
        self.record(format!("remove_key {}", key));
        self.inner.remove_key(key)
    }

    fn remove_value(&self, key: &str, value: &DomainSpecificValue) -> Result<(), PersistenceError> {
        self.record(format!("remove_value {} {}", key, value));
        self.inner.remove_value(key, value)
    }
}

fn resolver(domains: &[&str]) -> KeyValueResolver {
    KeyValueResolver::with_domains(domains).unwrap()
}

fn with_recording(domains: &[&str]) -> (KeyValueResolver, Arc<Recording>) {
    let recording = Arc::new(Recording::default());
    let persistence: SharedPersistence<Value> = recording.clone();
    let resolver = KeyValueResolver::from_persistence(persistence, domains).unwrap();
    (resolver, recording)
}

fn dsv(value: &str, change_set: Option<&str>, tokens: &[&str]) -> DomainSpecificValue {
    DomainSpecificValue::create(Value::from(value), change_set, tokens).unwrap()
}

fn lookup(values: &[(&str, &str)]) -> MapBackedDomainResolver {
    values
        .iter()
        .fold(MapBackedDomainResolver::new(), |resolver, (domain, value)| {
            resolver.with_domain_value(*domain, *value)
        })
}

fn assert_same_values(actual: Vec<DomainSpecificValue>, expected: Vec<DomainSpecificValue>) {
    assert_eq!(actual.len(), expected.len(), "actual: {:?}", actual);
    for value in &expected {
        assert!(actual.contains(value), "missing {} in {:?}", value, actual);
    }
}

fn get_str(resolver: &KeyValueResolver, key: &str, lookup: &dyn DomainResolver) -> Option<String> {
    resolver.get_as::<String>(key, lookup).unwrap()
}

// Lookups

#[test]
fn test_missing_key_gives_none_or_default() {
    let resolver = resolver(&[]);
    assert_eq!(resolver.get("key", &Echo).unwrap(), None);
    assert_eq!(
        resolver.get_or_default("key", Value::from("text"), &Echo).unwrap(),
        Value::from("text")
    );
    assert_eq!(
        resolver.get_or_default("key", Value::from(3), &Echo).unwrap(),
        Value::from(3)
    );
}

#[test]
fn test_blank_key_is_invalid() {
    let resolver = resolver(&[]);
    assert!(matches!(resolver.get("", &Echo), Err(ResolverError::InvalidArgument(_))));
    assert!(matches!(
        resolver.get_or_define(" ", Value::from("default"), None, &Echo),
        Err(ResolverError::InvalidArgument(_))
    ));
    assert!(matches!(
        resolver.set("", Value::from("value"), Some("descr"), &[]),
        Err(ResolverError::InvalidArgument(_))
    ));
}

#[test]
fn test_null_and_empty_values_are_stored() {
    let resolver = resolver(&[]);
    resolver.set("key", Value::from("value"), None, &[]).unwrap();
    assert_eq!(get_str(&resolver, "key", &Echo).as_deref(), Some("value"));

    resolver.set("key", Value::Null, None, &[]).unwrap();
    assert_eq!(resolver.get("key", &Echo).unwrap(), Some(Value::Null));

    resolver.set("key", Value::from(""), None, &[]).unwrap();
    assert_eq!(get_str(&resolver, "key", &Echo).as_deref(), Some(""));
}

#[test]
fn test_changing_a_value() {
    let resolver = resolver(&[]);
    resolver.set("key", Value::from("first"), None, &[]).unwrap();
    resolver.set("key", Value::from("other"), None, &[]).unwrap();
    assert_eq!(get_str(&resolver, "key", &Echo).as_deref(), Some("other"));
    assert_eq!(resolver.get_key_values("key").unwrap().unwrap().len(), 1);
}

#[test]
fn test_value_of_other_type_is_type_mismatch() {
    let resolver = resolver(&[]);
    resolver.set("key", Value::from("text"), None, &[]).unwrap();
    assert!(matches!(
        resolver.get_as::<i64>("key", &Echo),
        Err(ResolverError::TypeMismatch { .. })
    ));

    resolver.set("number", Value::from(7), None, &[]).unwrap();
    assert_eq!(resolver.get_as::<i64>("number", &Echo).unwrap(), Some(7));
}

#[test]
fn test_get_or_define_sets_default_once() {
    let resolver = resolver(&[]);
    let value = resolver
        .get_or_define("key", Value::from("text"), Some("descr"), &Echo)
        .unwrap();
    assert_eq!(value, Value::from("text"));
    let value = resolver
        .get_or_define("key", Value::from("ignored"), None, &Echo)
        .unwrap();
    assert_eq!(value, Value::from("text"));
}

#[test]
fn test_add_blank_domain_is_invalid() {
    let resolver = resolver(&[]);
    assert!(matches!(
        resolver.add_domains(&[""]),
        Err(ResolverError::InvalidArgument(_))
    ));
}

#[test]
fn test_overridden_value() {
    let resolver = resolver(&["domain1"]);
    resolver.set("key", Value::from("default"), None, &[]).unwrap();
    resolver.set("key", Value::from("overridden"), None, &["domain1"]).unwrap();
    assert_eq!(get_str(&resolver, "key", &Echo).as_deref(), Some("overridden"));
}

#[test]
fn test_subdomain_value_is_not_the_root_value() {
    let resolver = resolver(&[]);
    resolver.set("key", Value::from("value"), Some("descr"), &["subdomain"]).unwrap();
    assert_eq!(resolver.get("key", &Echo).unwrap(), None);
}

#[test]
fn test_correct_alternative_is_selected() {
    let resolver = resolver(&["domain1", "domain2"]);
    resolver.set("key", Value::from("other value"), None, &["other"]).unwrap();
    resolver.set("key", Value::from("domVal1"), None, &["domVal1"]).unwrap();
    resolver
        .set("key", Value::from("overridden"), None, &["domVal1", "domVal2"])
        .unwrap();
    resolver
        .set("key", Value::from("yet another value"), None, &["domVal1", "other"])
        .unwrap();

    let lookup = lookup(&[("domain1", "domVal1"), ("domain2", "domVal2")]);
    assert_eq!(get_str(&resolver, "key", &lookup).as_deref(), Some("overridden"));

    let first_only = lookup_first_only();
    assert_eq!(get_str(&resolver, "key", &first_only).as_deref(), Some("domVal1"));
}

fn lookup_first_only() -> MapBackedDomainResolver {
    lookup(&[("domain1", "domVal1")])
}

#[test]
fn test_wildcard_resolved_when_other_domains_match() {
    let resolver = resolver(&["domain1", "domain2"]);
    resolver
        .set("key", Value::from("overridden value"), None, &["*", "domain2"])
        .unwrap();
    assert_eq!(
        get_str(&resolver, "key", &Echo).as_deref(),
        Some("overridden value")
    );
}

#[test]
fn test_best_match_wins() {
    let resolver = resolver(&["domain1", "domain2"]);
    resolver.set("key", Value::from("A"), None, &["*", "domval2"]).unwrap();
    resolver.set("key", Value::from("B"), None, &["domval1", "domval2"]).unwrap();
    resolver.set("key", Value::from("C"), None, &["domval1", "*"]).unwrap();

    let lookup = resolver.resolver_for(&["domval1", "domval2"]);
    assert_eq!(get_str(&resolver, "key", &lookup).as_deref(), Some("B"));
}

#[test]
fn test_unresolved_trailing_domains_are_empty() {
    let resolver = resolver(&["dom", "dom2", "dom3"]);
    resolver.set("key", Value::from("value"), Some("desc"), &[]).unwrap();
    resolver.set("key", Value::from("valueDom"), Some("desc"), &["domVal"]).unwrap();
    resolver
        .set("key", Value::from("valueDom2"), Some("desc"), &["domVal", "dom2"])
        .unwrap();
    resolver
        .set("key", Value::from("valueDom3"), Some("desc"), &["domVal", "dom2", "dom3"])
        .unwrap();

    let lookup = lookup(&[("dom", "domVal")]);
    assert_eq!(get_str(&resolver, "key", &lookup).as_deref(), Some("valueDom"));
}

#[test]
fn test_separator_in_domain_value_is_invalid() {
    let resolver = resolver(&["domain1"]);
    resolver.set("key", Value::from("value"), None, &[]).unwrap();
    let lookup = lookup(&[("domain1", "a|b")]);
    assert!(matches!(
        resolver.get("key", &lookup),
        Err(ResolverError::InvalidArgument(_))
    ));
}

// Change sets

#[test]
fn test_change_set_values_only_when_active() {
    let resolver = resolver(&[]);
    resolver.set("key", Value::from("value"), Some("descr"), &[]).unwrap();
    resolver
        .set_with_change_set("key", Value::from("valueForChangeSet"), Some("descr"), Some("changeSet"), &[])
        .unwrap();

    assert_eq!(get_str(&resolver, "key", &Echo).as_deref(), Some("value"));

    let active = MapBackedDomainResolver::new().with_change_sets(["changeSet"]);
    assert_eq!(
        get_str(&resolver, "key", &active).as_deref(),
        Some("valueForChangeSet")
    );
}

#[test]
fn test_set_with_change_set_is_persisted() {
    let (resolver, recording) = with_recording(&[]);
    resolver
        .set_with_change_set("key", Value::from("valueForChangeSet"), Some("descr"), Some("changeSet"), &[])
        .unwrap();
    let expected = format!("store key {}", dsv("valueForChangeSet", Some("changeSet"), &[]));
    assert!(recording.has_event(&expected), "{:?}", recording.events());
}

#[test]
fn test_remove_value_from_change_set() {
    let resolver = resolver(&[]);
    resolver.set("key", Value::from("value"), Some("descr"), &[]).unwrap();
    resolver
        .set_with_change_set("key", Value::from("valueChangeSet"), Some("descr"), Some("changeSet"), &[])
        .unwrap();
    let active = MapBackedDomainResolver::new().with_change_sets(["changeSet"]);
    assert_eq!(get_str(&resolver, "key", &active).as_deref(), Some("valueChangeSet"));

    resolver.remove_with_change_set("key", Some("changeSet"), &[]).unwrap();
    assert_eq!(get_str(&resolver, "key", &active).as_deref(), Some("value"));
}

#[test]
fn test_remove_change_set_keeps_emptied_keys() {
    let (resolver, recording) = with_recording(&[]);
    resolver.set("key", Value::from("value"), Some("descr"), &[]).unwrap();
    resolver
        .set_with_change_set("key", Value::from("valueChangeSet"), Some("descr"), Some("changeSet"), &[])
        .unwrap();
    resolver
        .set_with_change_set("otherKey", Value::from("otherValueChangeSet"), Some("descr"), Some("changeSet"), &[])
        .unwrap();

    let active = MapBackedDomainResolver::new().with_change_sets(["changeSet"]);
    assert_eq!(get_str(&resolver, "key", &active).as_deref(), Some("valueChangeSet"));
    assert_eq!(
        get_str(&resolver, "otherKey", &active).as_deref(),
        Some("otherValueChangeSet")
    );

    resolver.remove_change_set("changeSet").unwrap();

    let removed = format!("remove_value key {}", dsv("valueChangeSet", Some("changeSet"), &[]));
    assert!(recording.has_event(&removed), "{:?}", recording.events());
    assert!(recording.has_event("remove_key otherKey"));
    assert_eq!(get_str(&resolver, "key", &active).as_deref(), Some("value"));
    assert_eq!(get_str(&resolver, "otherKey", &active), None);

    let emptied = resolver.get_key_values("otherKey").unwrap().unwrap();
    assert!(emptied.is_empty());
}

#[test]
fn test_remove_unknown_change_set_touches_nothing() {
    let (resolver, recording) = with_recording(&[]);
    resolver.remove_change_set("notExistingChangeSet").unwrap();
    assert_eq!(recording.events(), vec!["load_all".to_string()]);
}

// Persistence

#[test]
fn test_construction_preloads_everything() {
    let memory = InMemoryPersistence::with_records(vec![KeyValuesRecord {
        key: "preloaded".to_string(),
        description: Some("from disk".to_string()),
        values: vec![ValueRecord {
            pattern: "DE|".to_string(),
            change_set: None,
            value: Value::from("hallo"),
        }],
    }]);
    let persistence: SharedPersistence<Value> = Arc::new(memory);
    let resolver: KeyValueResolver = KeyValueResolver::from_persistence(persistence, &["country"]).unwrap();

    let key_values = resolver.get_key_values("preloaded").unwrap().unwrap();
    assert_eq!(key_values.description(), "from disk");
    let lookup = resolver.resolver_for(&["DE"]);
    assert_eq!(get_str(&resolver, "preloaded", &lookup).as_deref(), Some("hallo"));
}

#[test]
fn test_missing_key_is_loaded_and_kept() {
    let (resolver, recording) = with_recording(&["dom1", "dom2"]);
    recording.inner.insert_record(KeyValuesRecord {
        key: "key".to_string(),
        description: None,
        values: vec![ValueRecord {
            pattern: String::new(),
            change_set: None,
            value: Value::from("loaded"),
        }],
    });
    assert!(resolver.get_key_values("key").unwrap().is_none());

    assert_eq!(get_str(&resolver, "key", &Echo).as_deref(), Some("loaded"));
    assert!(recording.has_event("load key"));
    assert!(resolver.get_key_values("key").unwrap().is_some());

    get_str(&resolver, "key", &Echo);
    let loads = recording.events().iter().filter(|e| *e == "load key").count();
    assert_eq!(loads, 1);
}

#[test]
fn test_reload_replaces_values() {
    let (resolver, recording) = with_recording(&[]);
    resolver.set("key", Value::from("value"), Some("descr"), &[]).unwrap();
    recording.inner.insert_record(KeyValuesRecord {
        key: "external".to_string(),
        description: None,
        values: vec![ValueRecord {
            pattern: String::new(),
            change_set: None,
            value: Value::from("new"),
        }],
    });

    resolver.reload().unwrap();
    assert!(recording.has_event("reload"));
    assert_eq!(resolver.get_all_key_values().len(), 2);
    assert_eq!(get_str(&resolver, "key", &Echo).as_deref(), Some("value"));
    assert!(resolver.get_key_values("external").unwrap().is_some());
}

#[test]
fn test_reload_without_persistence_keeps_values() {
    let resolver = resolver(&[]);
    resolver.set("key", Value::from("value"), Some("descr"), &[]).unwrap();
    resolver.reload().unwrap();
    assert_eq!(get_str(&resolver, "key", &Echo).as_deref(), Some("value"));
}

#[test]
fn test_reload_single_key() {
    let (resolver, recording) = with_recording(&[]);
    resolver.set("key1", Value::from("value1"), Some("descr"), &[]).unwrap();
    resolver.set("key2", Value::from("value2"), Some("descr"), &[]).unwrap();
    recording.inner.insert_record(KeyValuesRecord {
        key: "key2".to_string(),
        description: Some("desc".to_string()),
        values: vec![ValueRecord {
            pattern: String::new(),
            change_set: None,
            value: Value::from("newValue"),
        }],
    });

    resolver.reload_key(" key2 ").unwrap();
    assert_eq!(get_str(&resolver, "key1", &Echo).as_deref(), Some("value1"));
    assert_eq!(get_str(&resolver, "key2", &Echo).as_deref(), Some("newValue"));
}

// Removal

#[test]
fn test_remove_default_value() {
    let (resolver, recording) = with_recording(&["domain1"]);
    resolver.set("key", Value::from("value"), Some("desc"), &[]).unwrap();
    resolver.set("key", Value::from("domValue"), Some("desc"), &["dom1"]).unwrap();

    let removed = resolver.remove("key", &[]).unwrap();
    assert_eq!(removed, Some(dsv("value", None, &[])));
    let expected = format!("remove_value key {}", dsv("value", None, &[]));
    assert!(recording.has_event(&expected), "{:?}", recording.events());

    let other = lookup(&[("domain1", "other")]);
    assert_eq!(resolver.get("key", &other).unwrap(), None);
    let dom1 = lookup(&[("domain1", "dom1")]);
    assert_eq!(get_str(&resolver, "key", &dom1).as_deref(), Some("domValue"));
}

#[test]
fn test_remove_domain_specific_value() {
    let (resolver, recording) = with_recording(&["domain1", "domain2"]);
    resolver.set("key", Value::from("value"), Some("desc"), &[]).unwrap();
    resolver.set("key", Value::from("domValue1"), Some("desc"), &["dom1"]).unwrap();
    resolver
        .set("key", Value::from("domValue2"), Some("desc"), &["dom1", "dom2"])
        .unwrap();

    resolver.remove("key", &["dom1"]).unwrap();
    let expected = format!("remove_value key {}", dsv("domValue1", None, &["dom1"]));
    assert!(recording.has_event(&expected), "{:?}", recording.events());

    let nothing = MapBackedDomainResolver::new();
    assert_eq!(get_str(&resolver, "key", &nothing).as_deref(), Some("value"));
    let both = resolver.resolver_for(&["dom1", "dom2"]);
    assert_eq!(get_str(&resolver, "key", &both).as_deref(), Some("domValue2"));
}

#[test]
fn test_remove_last_value_drops_key() {
    let (resolver, recording) = with_recording(&["domain1", "domain2", "domain3"]);
    resolver
        .set("key", Value::from("value2"), Some("descr"), &["dom1", "dom2"])
        .unwrap();
    resolver
        .set("key", Value::from("value3"), Some("descr"), &["dom1", "dom2", "dom3"])
        .unwrap();

    resolver.remove("key", &["dom1", "dom2"]).unwrap();
    resolver.remove("key", &["dom1", "dom2", "dom3"]).unwrap();

    assert!(resolver.get_all_key_values().is_empty());
    assert!(recording.has_event("remove_key key"));
}

#[test]
fn test_remove_without_match_leaves_persistence_alone() {
    let (resolver, recording) = with_recording(&[]);
    assert_eq!(resolver.remove("key", &["dom1"]).unwrap(), None);
    assert!(!recording.events().iter().any(|e| e.starts_with("remove")));
}

#[test]
fn test_remove_all_matching() {
    let resolver = resolver(&["domain1", "domain2", "domain3", "domain4"]);
    resolver.set("key", Value::from("value2"), Some("descr"), &["dom1", "dom2"]).unwrap();
    resolver
        .set("key", Value::from("value3"), Some("descr"), &["dom1", "dom2", "dom3"])
        .unwrap();
    resolver
        .set("key", Value::from("value2Other"), Some("descr"), &["dom1", "dom2Other", "dom3"])
        .unwrap();
    resolver
        .set("key", Value::from("value3Other"), Some("descr"), &["dom1", "dom2", "dom3Other"])
        .unwrap();
    resolver
        .set("key", Value::from("value4"), Some("descr"), &["dom1", "other", "dom3", "whatever"])
        .unwrap();

    let removed = resolver
        .remove_all_matching("key", &[Some("dom1"), None, Some("dom3")])
        .unwrap();
    assert_eq!(removed.len(), 3);

    let key_values = resolver.get_key_values("key").unwrap().unwrap();
    assert_same_values(
        key_values.domain_specific_values(),
        vec![
            dsv("value2", None, &["dom1", "dom2"]),
            dsv("value3Other", None, &["dom1", "dom2", "dom3Other"]),
        ],
    );
}

#[test]
fn test_remove_all_matching_last_values_drops_key() {
    let resolver = resolver(&["domain1", "domain2"]);
    resolver.set("key", Value::from("value2"), Some("descr"), &["dom1"]).unwrap();
    resolver
        .set("key", Value::from("value3"), Some("descr"), &["dom1", "dom2"])
        .unwrap();
    resolver.remove_all_matching("key", &[Some("dom1"), None]).unwrap();
    assert!(resolver.get_all_key_values().is_empty());
}

#[test]
fn test_remove_all_matching_with_domain_values() {
    let resolver = resolver(&["domain1", "domain2"]);
    resolver.set("key", Value::from("keep"), None, &["dom0"]).unwrap();
    resolver.set("key", Value::from("drop"), None, &["dom1", "dom2"]).unwrap();

    let domain_values = MapBackedDomainValues::new().set("domain1", Some("dom1"));
    let removed = resolver
        .remove_all_matching_domain_values("key", &domain_values)
        .unwrap();
    assert_eq!(removed, vec![dsv("drop", None, &["dom1", "dom2"])]);
    assert_eq!(resolver.get_key_values("key").unwrap().unwrap().len(), 1);
}

#[test]
fn test_remove_key_always_notifies_persistence() {
    let (resolver, recording) = with_recording(&[]);
    resolver.set("key", Value::from("value"), Some("desc"), &[]).unwrap();
    resolver.set("key", Value::from("domValue1"), Some("desc"), &["dom1"]).unwrap();

    assert!(resolver.remove_key("key").unwrap().is_some());
    assert!(recording.has_event("remove_key key"));
    assert_eq!(resolver.get("key", &Echo).unwrap(), None);

    assert!(resolver.remove_key("absent").unwrap().is_none());
    assert!(recording.has_event("remove_key absent"));
}

// Snapshots

fn snapshot_resolver() -> KeyValueResolver {
    resolver(&["dom1", "dom2", "dom3", "dom4"])
}

#[test]
fn test_empty_resolver_gives_empty_snapshots() {
    let resolver = snapshot_resolver();
    let lookup = lookup(&[("dom1", "val1"), ("dom2", "val2")]);
    assert!(resolver.get_all_key_values().is_empty());
    assert!(resolver.get_all_key_values_filtered(&[&lookup]).unwrap().is_empty());
}

#[test]
fn test_unfiltered_snapshot_has_everything() {
    let resolver = snapshot_resolver();
    resolver.set("key1", Value::from("value_1"), Some("desc"), &[]).unwrap();
    resolver.set("key1", Value::from("value_dom1"), Some("desc"), &["domval1"]).unwrap();
    resolver.set("key1", Value::from("value_dom2"), Some("desc"), &["domval2"]).unwrap();

    let all = resolver.get_all_key_values();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].key(), "key1");
    assert_same_values(
        all[0].domain_specific_values(),
        vec![
            dsv("value_1", None, &[]),
            dsv("value_dom1", None, &["domval1"]),
            dsv("value_dom2", None, &["domval2"]),
        ],
    );
}

#[test]
fn test_filtered_snapshot() {
    let resolver = snapshot_resolver();
    resolver.set("key1", Value::from("value_1"), Some("desc"), &[]).unwrap();
    resolver.set("key1", Value::from("value_dom1"), Some("desc"), &["domval1"]).unwrap();
    resolver
        .set("key1", Value::from("value_dom_2"), Some("desc"), &["domval1", "domval2"])
        .unwrap();
    resolver
        .set("key1", Value::from("value_dom_*"), Some("desc"), &["*", "domval_other_2"])
        .unwrap();
    resolver
        .set("key1", Value::from("value_dom_another"), Some("desc"), &["domval_another"])
        .unwrap();
    resolver
        .set("key1", Value::from("value_dom_other"), Some("desc"), &["domval_other", "domval2"])
        .unwrap();
    resolver.set("key2", Value::from("val2"), Some("desc"), &["other"]).unwrap();

    let lookup = lookup(&[("dom1", "domval1")]);
    let filtered = resolver.get_all_key_values_filtered(&[&lookup]).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].key(), "key1");
    assert_same_values(
        filtered[0].domain_specific_values(),
        vec![
            dsv("value_dom1", None, &["domval1"]),
            dsv("value_dom_2", None, &["domval1", "domval2"]),
        ],
    );
}

#[test]
fn test_filtered_snapshot_over_several_keys() {
    let resolver = snapshot_resolver();
    resolver.set("key1", Value::from("value_1"), Some("desc"), &[]).unwrap();
    resolver.set("key1", Value::from("value_dom1"), Some("desc"), &["domval1"]).unwrap();
    resolver
        .set("key1", Value::from("value_dom_other"), Some("desc"), &["domval_other"])
        .unwrap();
    resolver.set("key2", Value::from("key2_dom1"), Some("desc"), &["domval1"]).unwrap();
    resolver
        .set("key2", Value::from("key2_dom_other"), Some("desc"), &["domval_other"])
        .unwrap();

    let lookup = resolver.resolver_for(&["domval1"]);
    let mut filtered = resolver.get_all_key_values_filtered(&[&lookup]).unwrap();
    filtered.sort_by(|a, b| a.key().cmp(b.key()));
    assert_eq!(filtered.len(), 2);
    assert_same_values(
        filtered[0].domain_specific_values(),
        vec![dsv("value_dom1", None, &["domval1"])],
    );
    assert_same_values(
        filtered[1].domain_specific_values(),
        vec![dsv("key2_dom1", None, &["domval1"])],
    );
}

#[test]
fn test_inactive_change_set_is_filtered_out() {
    let resolver = snapshot_resolver();
    resolver.set("key1", Value::from("value_dom1"), Some("desc"), &["domval1"]).unwrap();
    let domain_values = MapBackedDomainValues::new().set("dom1", Some("domval1"));
    resolver
        .set_domain_values_with_change_set("key1", Value::from("CS_value"), Some("desc"), Some("ChangeSet"), &domain_values)
        .unwrap();

    let lookup = lookup(&[("dom1", "domval1")]);
    let filtered = resolver.get_all_key_values_filtered(&[&lookup]).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_same_values(
        filtered[0].domain_specific_values(),
        vec![dsv("value_dom1", None, &["domval1"])],
    );
}

#[test]
fn test_active_change_sets_win_with_smallest_name() {
    let resolver = snapshot_resolver();
    resolver.set("key1", Value::from("value_dom1"), Some("desc"), &["domval1"]).unwrap();
    resolver
        .set("key1", Value::from("val"), Some("desc"), &["domval1", "domval2"])
        .unwrap();
    resolver
        .set_with_change_set("key1", Value::from("CS_value"), Some("desc"), Some("ChangeSet"), &["domval1"])
        .unwrap();
    resolver
        .set_with_change_set("key1", Value::from("ACS_value"), Some("desc"), Some("AChangeSet"), &["domval1"])
        .unwrap();

    let lookup = lookup(&[("dom1", "domval1")]).with_change_sets(["ChangeSet", "AChangeSet"]);
    let filtered = resolver.get_all_key_values_filtered(&[&lookup]).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_same_values(
        filtered[0].domain_specific_values(),
        vec![
            dsv("val", None, &["domval1", "domval2"]),
            dsv("ACS_value", Some("AChangeSet"), &["domval1"]),
        ],
    );
}

#[test]
fn test_filtered_snapshot_with_several_resolvers() {
    let resolver = snapshot_resolver();
    resolver.set("key1", Value::from("value_1"), Some("desc"), &[]).unwrap();
    resolver.set("key1", Value::from("value_dom1"), Some("desc"), &["domval1"]).unwrap();
    resolver
        .set("key1", Value::from("value_dom_2"), Some("desc"), &["domval1", "domval2"])
        .unwrap();
    resolver
        .set("key1", Value::from("value_dom2"), Some("desc"), &["domval2", "domval2"])
        .unwrap();
    resolver
        .set("key1", Value::from("value_dom_*"), Some("desc"), &["*", "domval_other_2"])
        .unwrap();
    resolver.set("key2", Value::from("val2"), Some("desc"), &["other"]).unwrap();

    let first = lookup(&[("dom1", "domval1")]);
    let second = lookup(&[("dom1", "domval2")]);
    let filtered = resolver.get_all_key_values_filtered(&[&first, &second]).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_same_values(
        filtered[0].domain_specific_values(),
        vec![
            dsv("value_dom1", None, &["domval1"]),
            dsv("value_dom_2", None, &["domval1", "domval2"]),
            dsv("value_dom2", None, &["domval2", "domval2"]),
        ],
    );
}

#[test]
fn test_key_values_for_one_key_filtered() {
    let resolver = snapshot_resolver();
    resolver.set("key1", Value::from("value_dom1"), Some("desc"), &["domval1"]).unwrap();
    resolver
        .set("key1", Value::from("val"), Some("desc"), &["domvalOther", "domval2"])
        .unwrap();
    resolver
        .set("key1", Value::from("value_dom2"), Some("desc"), &["domval1", "domval2"])
        .unwrap();

    let lookup = lookup(&[("dom1", "domval1")]);
    let filtered = resolver.get_key_values_filtered("key1", &[&lookup]).unwrap().unwrap();
    assert_same_values(
        filtered.domain_specific_values(),
        vec![
            dsv("value_dom1", None, &["domval1"]),
            dsv("value_dom2", None, &["domval1", "domval2"]),
        ],
    );

    let unknown = lookup_first_only();
    assert!(resolver.get_key_values_filtered("key", &[&unknown]).unwrap().is_none());
}

#[test]
fn test_only_best_matches_in_snapshot() {
    let resolver = snapshot_resolver();
    resolver.set("key1", Value::from("value_dom2"), Some("desc"), &["*", "domval2"]).unwrap();
    resolver
        .set("key1", Value::from("value_dom1&2"), Some("desc"), &["domval1", "domval2"])
        .unwrap();
    resolver.set("key1", Value::from("value_dom1"), Some("desc"), &["domval1", "*"]).unwrap();

    let lookup = lookup(&[("dom1", "domval1"), ("dom2", "domval2")]);
    let filtered = resolver.get_all_key_values_filtered(&[&lookup]).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_same_values(
        filtered[0].domain_specific_values(),
        vec![dsv("value_dom1&2", None, &["domval1", "domval2"])],
    );
}

// Mappings

#[test]
fn test_mappings_of_empty_resolver() {
    let resolver = resolver(&[]);
    assert!(resolver.get_all_mappings(&MapBackedDomainResolver::new()).unwrap().is_empty());
}

#[test]
fn test_mapping_of_default_value() {
    let resolver = resolver(&[]);
    resolver.set("key", Value::from("value"), Some("desc"), &[]).unwrap();
    let mappings = resolver.get_all_mappings(&MapBackedDomainResolver::new()).unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings.get("key"), Some(&Value::from("value")));
}

#[test]
fn test_mapping_uses_best_match() {
    let resolver = resolver(&["domain1", "domain2"]);
    resolver.set("key", Value::from("value"), Some("desc"), &[]).unwrap();
    let wildcard_first = MapBackedDomainValues::new()
        .set("domain1", Some("*"))
        .set("domain2", Some("dom2"));
    resolver
        .set_domain_values("key", Value::from("value1"), Some("desc"), &wildcard_first)
        .unwrap();
    let both = MapBackedDomainValues::new()
        .set("domain2", Some("dom2"))
        .set("domain1", Some("dom1"));
    resolver
        .set_domain_values("key", Value::from("value2"), Some("desc"), &both)
        .unwrap();

    let lookup = lookup(&[("domain1", "dom1"), ("domain2", "dom2")]);
    let mappings = resolver.get_all_mappings(&lookup).unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings.get("key"), Some(&Value::from("value2")));
}

#[test]
fn test_partial_mappings() {
    let resolver = resolver(&["domain1", "domain2"]);
    resolver.set("key", Value::from("value1"), Some("desc"), &["*", "dom2"]).unwrap();
    resolver.set("key", Value::from("value2"), Some("desc"), &["dom1", "dom2"]).unwrap();
    resolver.set("key", Value::from("value3"), Some("desc"), &["dom1", "*"]).unwrap();
    resolver.set("key2", Value::from("otherValue"), Some("desc"), &[]).unwrap();

    let mappings = resolver.get_all_mappings(&resolver.resolver_for(&["dom1"])).unwrap();
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings.get("key"), Some(&Value::from("value3")));
    assert_eq!(mappings.get("key2"), Some(&Value::from("otherValue")));
}

#[test]
fn test_keys_without_match_are_not_mapped() {
    let resolver = resolver(&["domain1", "domain2"]);
    resolver.set("key", Value::from("value1"), Some("desc"), &["*", "dom2"]).unwrap();
    resolver.set("key", Value::from("value2"), Some("desc"), &["dom1", "dom2"]).unwrap();
    resolver.set("key2", Value::from("otherValue"), Some("desc"), &[]).unwrap();

    let lookup = lookup(&[("domain1", "dom1")]);
    let mappings = resolver.get_all_mappings(&lookup).unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings.get("key2"), Some(&Value::from("otherValue")));
}

// Domain value maps

#[test]
fn test_domain_values_map() {
    let resolver = resolver(&["dom1", "dom2", "dom3", "dom4"]);
    let map = resolver.domain_values_map(&dsv("val", None, &["domval1", "domval2", "domval3", "domval4"]));
    assert_eq!(map.len(), 4);
    assert_eq!(map["dom1"], "domval1");
    assert_eq!(map["dom4"], "domval4");
}

#[test]
fn test_domain_values_map_ignores_excess_values() {
    let resolver = resolver(&["dom1", "dom2", "dom3"]);
    let map = resolver.domain_values_map(&dsv("val", None, &["domval1", "domval2", "domval3", "domval4"]));
    assert_eq!(map.len(), 3);
    assert_eq!(map["dom3"], "domval3");
}

#[test]
fn test_domain_values_map_pads_missing_values() {
    let resolver = resolver(&["dom1", "dom2", "dom3", "dom4"]);
    let map = resolver.domain_values_map(&dsv("val", None, &["domval1", "domval2"]));
    assert_eq!(map.len(), 4);
    assert_eq!(map["dom2"], "domval2");
    assert_eq!(map["dom3"], "*");
    assert_eq!(map["dom4"], "*");
}

// Dump

#[test]
fn test_dump_of_filled_resolver() {
    let resolver = resolver(&["domain1", "domain2"]);
    resolver.set("key", Value::from("value"), None, &[]).unwrap();
    resolver.set("key", Value::from("value2"), None, &["domain1"]).unwrap();
    resolver.set(" otherKey ", Value::from("otherValue"), None, &[]).unwrap();

    let dump = resolver.dump();
    assert!(dump.starts_with("KeyValueResolver{domains=[domain1, domain2]\n"));
    assert!(dump.contains("KeyValues for \"otherKey\": KeyValues{\n"));
    assert!(dump.contains("\tdescription=\"\"\n"));
    assert!(dump.contains("\tDomainSpecificValue{pattern=\"\", ordering=1, value=\"otherValue\"}"));
    assert!(dump.contains("KeyValues for \"key\": KeyValues{\n"));
    assert!(dump.contains("\tDomainSpecificValue{pattern=\"domain1|\", ordering=3, value=\"value2\"}"));
    assert!(dump.contains("\tDomainSpecificValue{pattern=\"\", ordering=1, value=\"value\"}"));
    assert!(dump.find("\"key\"") < dump.find("\"otherKey\""));
    assert!(dump.ends_with("\n}"));
}

// Concurrency

#[test]
fn test_concurrent_writers_and_readers() {
    use std::sync::Barrier;
    use std::thread;

    const THREADS: usize = 8;
    const ROUNDS: i64 = 50;

    let resolver = Arc::new(resolver(&["country"]));
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let resolver = Arc::clone(&resolver);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let own_key = format!("key-{}", t);
                for i in 0..ROUNDS {
                    let country = format!("C{}", i);
                    resolver
                        .set("shared", Value::from(i), None, &[country.as_str()])
                        .unwrap();
                    resolver.set(&own_key, Value::from(i), None, &[]).unwrap();

                    let lookup = resolver.resolver_for(&[country.as_str()]);
                    assert_eq!(resolver.get("shared", &lookup).unwrap(), Some(Value::from(i)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let shared = resolver.get_key_values("shared").unwrap().unwrap();
    assert_eq!(shared.len(), ROUNDS as usize);
    for t in 0..THREADS {
        let value = resolver.get(&format!("key-{}", t), &Echo).unwrap();
        assert_eq!(value, Some(Value::from(ROUNDS - 1)));
    }
}

#[test]
fn test_concurrent_removal_and_writes_keep_key_consistent() {
    use std::thread;

    let resolver = Arc::new(resolver(&["country"]));
    let writer = {
        let resolver = Arc::clone(&resolver);
        thread::spawn(move || {
            for i in 0..200 {
                resolver.set("key", Value::from(i), None, &["DE"]).unwrap();
            }
        })
    };
    let remover = {
        let resolver = Arc::clone(&resolver);
        thread::spawn(move || {
            for _ in 0..200 {
                resolver.remove("key", &["DE"]).unwrap();
            }
        })
    };
    writer.join().unwrap();
    remover.join().unwrap();

    // Either the last write survived or the key was dropped with its last value
    match resolver.get_key_values("key").unwrap() {
        Some(key_values) => assert_eq!(key_values.len(), 1),
        None => assert!(resolver.get_all_key_values().is_empty()),
    }
    resolver.set("key", Value::from("final"), None, &["DE"]).unwrap();
    let lookup = resolver.resolver_for(&["DE"]);
    assert_eq!(get_str(&resolver, "key", &lookup).as_deref(), Some("final"));
}
