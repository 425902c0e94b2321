//! Behaviour every `ConfigStore` backend must share
//!
//! Each check takes a namespace that prefixes its keys and scopes, so the
//! suite can run repeatedly against a long-lived database.

use confstore::{ConfigEntry, ConfigStore, Error};

/// Unique namespace for one test run
pub fn namespace(test: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("{test}_{}_{nanos}", std::process::id())
}

/// Run the whole contract against `store`
pub async fn run_all(store: &dyn ConfigStore, ns: &str) {
    get_missing_returns_none(store, ns).await;
    upsert_then_get(store, ns).await;
    upsert_overwrites(store, ns).await;
    global_is_not_a_wildcard(store, ns).await;
    scopes_are_isolated(store, ns).await;
    blank_scope_is_global(store, ns).await;
    method_scope_overrides_entry_scope(store, ns).await;
    blank_keys_are_skipped(store, ns).await;
    blank_key_lookup_is_rejected(store, ns).await;
    invalid_batch_writes_nothing(store, ns).await;
    empty_value_round_trips(store, ns).await;
}

pub async fn get_missing_returns_none(store: &dyn ConfigStore, ns: &str) {
    let key = format!("{ns}.missing");
    assert!(store.get(&key, None).await.unwrap().is_none());
    assert!(store.get(&key, Some("nowhere")).await.unwrap().is_none());
    assert!(
        store
            .get_all(Some(&format!("{ns}-empty")))
            .await
            .unwrap()
            .is_empty()
    );
}

pub async fn upsert_then_get(store: &dyn ConfigStore, ns: &str) {
    let scope = format!("{ns}-basic");
    let entries = vec![
        ConfigEntry::new(format!("{ns}.a"), "1"),
        ConfigEntry::new(format!("{ns}.b"), "\"two\""),
    ];
    store.upsert(&entries, Some(&scope)).await.unwrap();

    let a = store.get(&format!("{ns}.a"), Some(&scope)).await.unwrap().unwrap();
    assert_eq!(a.value(), "1");
    assert_eq!(a.scope(), Some(scope.as_str()));

    let all = store.get_all(Some(&scope)).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[&format!("{ns}.b")].value(), "\"two\"");
}

pub async fn upsert_overwrites(store: &dyn ConfigStore, ns: &str) {
    let scope = format!("{ns}-overwrite");
    let key = format!("{ns}.value");
    store
        .upsert(&[ConfigEntry::new(&key, "old")], Some(&scope))
        .await
        .unwrap();
    store
        .upsert(&[ConfigEntry::new(&key, "new")], Some(&scope))
        .await
        .unwrap();

    let all = store.get_all(Some(&scope)).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[&key].value(), "new");
}

pub async fn global_is_not_a_wildcard(store: &dyn ConfigStore, ns: &str) {
    let scope = format!("{ns}-tenant");
    let key = format!("{ns}.only_scoped");
    store
        .upsert(&[ConfigEntry::new(&key, "scoped")], Some(&scope))
        .await
        .unwrap();

    assert!(store.get(&key, None).await.unwrap().is_none());
    assert!(!store.get_all(None).await.unwrap().contains_key(&key));
}

pub async fn scopes_are_isolated(store: &dyn ConfigStore, ns: &str) {
    let key = format!("{ns}.shared");
    let (a, b) = (format!("{ns}-a"), format!("{ns}-b"));

    store
        .upsert(&[ConfigEntry::new(&key, "global")], None)
        .await
        .unwrap();
    store
        .upsert(&[ConfigEntry::new(&key, "from-a")], Some(&a))
        .await
        .unwrap();
    store
        .upsert(&[ConfigEntry::new(&key, "from-b")], Some(&b))
        .await
        .unwrap();

    let value = |entry: Option<ConfigEntry>| entry.map(|e| e.value().to_string());
    assert_eq!(value(store.get(&key, None).await.unwrap()).as_deref(), Some("global"));
    assert_eq!(value(store.get(&key, Some(&a)).await.unwrap()).as_deref(), Some("from-a"));
    assert_eq!(value(store.get(&key, Some(&b)).await.unwrap()).as_deref(), Some("from-b"));

    let global = store.get(&key, None).await.unwrap().unwrap();
    assert_eq!(global.scope(), None);
}

pub async fn blank_scope_is_global(store: &dyn ConfigStore, ns: &str) {
    let key = format!("{ns}.blank_scope");
    store
        .upsert(&[ConfigEntry::new(&key, "x")], Some("   "))
        .await
        .unwrap();

    assert_eq!(store.get(&key, None).await.unwrap().unwrap().value(), "x");
    assert_eq!(store.get(&key, Some("")).await.unwrap().unwrap().value(), "x");
}

pub async fn method_scope_overrides_entry_scope(store: &dyn ConfigStore, ns: &str) {
    let key = format!("{ns}.override");
    let (entry_scope, call_scope) = (format!("{ns}-entry"), format!("{ns}-call"));
    let entry = ConfigEntry::scoped(&key, "v", Some(&entry_scope));

    store.upsert(&[entry.clone()], Some(&call_scope)).await.unwrap();
    assert!(store.get(&key, Some(&entry_scope)).await.unwrap().is_none());
    assert!(store.get(&key, Some(&call_scope)).await.unwrap().is_some());

    // Without a call scope the entry keeps its own
    store.upsert(&[entry], None).await.unwrap();
    assert!(store.get(&key, Some(&entry_scope)).await.unwrap().is_some());
}

pub async fn blank_keys_are_skipped(store: &dyn ConfigStore, ns: &str) {
    let scope = format!("{ns}-blank-keys");
    let entries = vec![
        ConfigEntry::new("", "ignored"),
        ConfigEntry::new("   ", "ignored"),
        ConfigEntry::new(format!("{ns}.kept"), "kept"),
    ];
    store.upsert(&entries, Some(&scope)).await.unwrap();

    let all = store.get_all(Some(&scope)).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all.contains_key(&format!("{ns}.kept")));
}

pub async fn blank_key_lookup_is_rejected(store: &dyn ConfigStore, _ns: &str) {
    let err = store.get("  ", None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

pub async fn invalid_batch_writes_nothing(store: &dyn ConfigStore, ns: &str) {
    let scope = format!("{ns}-invalid");
    let entries = vec![
        ConfigEntry::new(format!("{ns}.fine"), "1"),
        ConfigEntry::new("k".repeat(confstore::security::MAX_KEY_LEN + 1), "2"),
    ];

    let err = store.upsert(&entries, Some(&scope)).await.unwrap_err();
    assert!(err.is_validation_error());
    assert!(store.get_all(Some(&scope)).await.unwrap().is_empty());
}

pub async fn empty_value_round_trips(store: &dyn ConfigStore, ns: &str) {
    let scope = format!("{ns}-empty-value");
    let key = format!("{ns}.nothing");
    store
        .upsert(&[ConfigEntry::new(&key, "")], Some(&scope))
        .await
        .unwrap();

    let entry = store.get(&key, Some(&scope)).await.unwrap().unwrap();
    assert_eq!(entry.value(), "");
}
