//! Event routing tests
//!
//! Covers both subscription modes: per-address channels on the explorer
//! push transport, and the bulk stream of a full node (or of an explorer
//! in secure / all-transactions mode).

mod common;

use common::{init_logging, transaction, FakeChain, Harness};
use digiassets::chain::channels;
use digiassets::{ScanProgress, Settings, Subscription, Transaction};
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

type Inbox = Arc<Mutex<Vec<String>>>;

fn collector() -> (Inbox, Arc<dyn Fn(&Transaction) + Send + Sync>) {
    let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));
    let sink = inbox.clone();
    (
        inbox,
        Arc::new(move |tx: &Transaction| sink.lock().unwrap().push(tx.txid.clone())),
    )
}

fn wrapped(tx: &Transaction) -> Value {
    json!({ "transaction": tx })
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_init_imports_and_tracks_discovered_addresses() {
    init_logging();
    let mut settings = Settings::default();
    settings.reindex = true;
    let h = Harness::new(
        settings,
        common::FakeKeys::new(&["D1", "D2"]),
        FakeChain::explorer(),
    );

    h.client.init().await.unwrap();
    assert_eq!(h.keys.init_count.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.addresses(), vec!["D1", "D2"]);
    assert_eq!(
        h.chain.imports.lock().unwrap()[0],
        (vec!["D1".to_string(), "D2".to_string()], true)
    );
    assert_eq!(h.chain.call_count("on_connect"), 1);

    h.keys.register("D3");
    h.keys.register("D1");
    while h.chain.imports.lock().unwrap().len() < 2 {
        tokio::task::yield_now().await;
    }

    assert_eq!(h.client.addresses(), vec!["D1", "D2", "D3"]);
    let imports = h.chain.imports.lock().unwrap().clone();
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[1], (vec!["D3".to_string()], false));
}

#[tokio::test]
async fn test_events_disabled_subscribes_nothing() {
    let h = Harness::explorer(&["D1"]);
    h.client.init().await.unwrap();

    let (_, listener) = collector();
    assert!(!h.client.subscribe(Subscription::NewTransaction(listener.clone())));
    assert!(!h.client.subscribe(Subscription::NewDaTransaction(listener.clone())));
    assert!(!h.client.subscribe(Subscription::RevertedTransaction(listener.clone())));
    assert!(!h.client.subscribe(Subscription::RevertedDaTransaction(listener)));
    assert!(!h
        .client
        .subscribe(Subscription::ScanProgress(Arc::new(|_: &ScanProgress| {}))));

    assert!(h.push.joined_channels().is_empty());
    assert!(h.chain.hub.joined_channels().is_empty());
}

// ============================================================================
// Per-address mode
// ============================================================================

#[tokio::test]
async fn test_per_address_delivers_each_transaction_once() {
    init_logging();
    let h = Harness::with_events(&["D1", "D2"], FakeChain::explorer(), false, false);
    h.client.init().await.unwrap();
    assert!(!h.client.event_router().bulk_mode());

    let (inbox, listener) = collector();
    assert!(h.client.subscribe(Subscription::NewTransaction(listener)));
    assert_eq!(h.push.joined_channels(), vec!["address/D1", "address/D2"]);

    let tx = transaction("t1", &["D1"], &["D2"]);
    h.push.publish(&channels::address("D1"), &wrapped(&tx));
    h.push.publish(&channels::address("D2"), &wrapped(&tx));
    h.push.publish(&channels::address("D1"), &wrapped(&tx));

    assert_eq!(*inbox.lock().unwrap(), vec!["t1"]);
    // discovery runs on every delivery, even a duplicate one
    assert_eq!(h.keys.discover_count.load(Ordering::SeqCst), 3);
    assert!(h.chain.hub.joined_channels().is_empty());
}

#[tokio::test]
async fn test_discovered_address_gets_its_own_channel() {
    let h = Harness::with_events(&["D1"], FakeChain::explorer(), false, false);
    h.client.init().await.unwrap();

    let (inbox, listener) = collector();
    h.client.subscribe(Subscription::NewTransaction(listener));
    assert!(!h.push.is_joined("address/D9"));

    // a payment to D1 reveals D9
    h.keys.queue_discovery("D9");
    h.push.publish(&channels::address("D1"), &wrapped(&transaction("t1", &["X"], &["D1"])));
    assert!(h.push.is_joined("address/D9"));
    assert_eq!(h.push.handler_count("address/D9"), 1);

    h.push.publish(&channels::address("D9"), &wrapped(&transaction("t2", &["X"], &["D9"])));
    assert_eq!(*inbox.lock().unwrap(), vec!["t1", "t2"]);
}

#[tokio::test]
async fn test_separate_registrations_deduplicate_independently() {
    let h = Harness::with_events(&["D1"], FakeChain::explorer(), false, false);
    h.client.init().await.unwrap();

    let (first, listener_a) = collector();
    let (second, listener_b) = collector();
    h.client.subscribe(Subscription::NewTransaction(listener_a));
    h.client.subscribe(Subscription::NewTransaction(listener_b));
    assert_eq!(h.push.handler_count("address/D1"), 2);

    let tx = transaction("t1", &["D1"], &[]);
    h.push.publish(&channels::address("D1"), &wrapped(&tx));
    h.push.publish(&channels::address("D1"), &wrapped(&tx));

    assert_eq!(*first.lock().unwrap(), vec!["t1"]);
    assert_eq!(*second.lock().unwrap(), vec!["t1"]);
}

#[tokio::test]
async fn test_per_address_colored_filter() {
    let h = Harness::with_events(&["D1"], FakeChain::explorer(), false, false);
    h.client.init().await.unwrap();

    let (inbox, listener) = collector();
    assert!(h.client.subscribe(Subscription::NewDaTransaction(listener)));

    let plain = transaction("plain", &["D1"], &[]);
    let mut colored = transaction("colored", &["D1"], &[]);
    colored.colored = true;
    h.push.publish(&channels::address("D1"), &wrapped(&plain));
    h.push.publish(&channels::address("D1"), &wrapped(&colored));

    assert_eq!(*inbox.lock().unwrap(), vec!["colored"]);
}

#[tokio::test]
async fn test_unparseable_payload_is_skipped() {
    let h = Harness::with_events(&["D1"], FakeChain::explorer(), false, false);
    h.client.init().await.unwrap();

    let (inbox, listener) = collector();
    h.client.subscribe(Subscription::NewTransaction(listener));
    h.push.publish(&channels::address("D1"), &json!({"transaction": {"vin": 5}}));

    assert!(inbox.lock().unwrap().is_empty());
}

// ============================================================================
// Bulk mode
// ============================================================================

#[tokio::test]
async fn test_full_node_stream_keeps_local_transactions() {
    init_logging();
    let h = Harness::with_events(&["D1"], FakeChain::full_node(), false, false);
    h.client.init().await.unwrap();
    assert!(h.client.event_router().bulk_mode());

    let (inbox, listener) = collector();
    assert!(h.client.subscribe(Subscription::NewTransaction(listener)));
    assert!(h.chain.hub.is_joined(channels::NEW_TRANSACTION));
    assert!(h.push.joined_channels().is_empty());

    let local = transaction("local", &["X"], &["D1"]);
    let foreign = transaction("foreign", &["X"], &["Y"]);
    h.chain.hub.publish(channels::NEW_TRANSACTION, &serde_json::to_value(&local).unwrap());
    h.chain.hub.publish(channels::NEW_TRANSACTION, &serde_json::to_value(&foreign).unwrap());

    assert_eq!(*inbox.lock().unwrap(), vec!["local"]);
    assert_eq!(h.keys.discover_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_all_transactions_delivers_foreign_without_discovery() {
    let h = Harness::with_events(&["D1"], FakeChain::explorer(), false, true);
    h.client.init().await.unwrap();
    assert!(h.client.event_router().bulk_mode());

    let (inbox, listener) = collector();
    h.client.subscribe(Subscription::NewTransaction(listener));

    let foreign = transaction("foreign", &["X"], &["Y"]);
    h.chain.hub.publish(channels::NEW_TRANSACTION, &serde_json::to_value(&foreign).unwrap());

    assert_eq!(*inbox.lock().unwrap(), vec!["foreign"]);
    assert_eq!(h.keys.discover_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_secure_mode_uses_distinct_colored_stream() {
    let h = Harness::with_events(&["D1"], FakeChain::explorer(), true, false);
    h.client.init().await.unwrap();

    let (inbox, listener) = collector();
    h.client.subscribe(Subscription::NewDaTransaction(listener));
    assert!(h.chain.hub.is_joined(channels::NEW_DA_TRANSACTION));
    assert!(!h.chain.hub.is_joined(channels::NEW_TRANSACTION));

    let mut local = transaction("da", &["D1"], &[]);
    local.colored = true;
    h.chain.hub.publish(channels::NEW_DA_TRANSACTION, &serde_json::to_value(&local).unwrap());
    h.chain.hub.publish(channels::NEW_TRANSACTION, &serde_json::to_value(&local).unwrap());

    assert_eq!(*inbox.lock().unwrap(), vec!["da"]);
}

#[tokio::test]
async fn test_reverted_transactions_are_not_filtered() {
    let h = Harness::with_events(&["D1"], FakeChain::full_node(), false, false);
    h.client.init().await.unwrap();

    let (reverted, listener) = collector();
    let (reverted_da, da_listener) = collector();
    assert!(h.client.subscribe(Subscription::RevertedTransaction(listener)));
    assert!(h.client.subscribe(Subscription::RevertedDaTransaction(da_listener)));

    let foreign = serde_json::to_value(transaction("gone", &["X"], &["Y"])).unwrap();
    h.chain.hub.publish(channels::REVERTED_TRANSACTION, &foreign);
    h.chain.hub.publish(channels::REVERTED_DA_TRANSACTION, &foreign);

    assert_eq!(*reverted.lock().unwrap(), vec!["gone"]);
    assert_eq!(*reverted_da.lock().unwrap(), vec!["gone"]);
}

// ============================================================================
// Progress and raw channels
// ============================================================================

#[tokio::test]
async fn test_scan_progress_and_raw_channels() {
    let h = Harness::with_events(&["D1"], FakeChain::explorer(), false, false);
    h.client.init().await.unwrap();

    let ticks = Arc::new(Mutex::new(Vec::new()));
    let sink = ticks.clone();
    assert!(h.client.subscribe(Subscription::ScanProgress(Arc::new(
        move |p: &ScanProgress| sink.lock().unwrap().push(p.progress)
    ))));
    h.chain
        .hub
        .publish(channels::SCAN_PROGRESS, &json!({"progress": 0.5, "blocks": 10}));
    assert_eq!(*ticks.lock().unwrap(), vec![0.5]);

    let raw = Arc::new(Mutex::new(Vec::new()));
    let sink = raw.clone();
    assert!(h.client.subscribe(Subscription::Raw {
        channel: "custom".to_string(),
        handler: Arc::new(move |v: &Value| sink.lock().unwrap().push(v.clone())),
    }));
    assert!(h.push.is_joined("custom"));
    h.push.publish("custom", &json!({"n": 1}));
    assert_eq!(*raw.lock().unwrap(), vec![json!({"n": 1})]);
}
