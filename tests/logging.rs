//! The log hook is process-wide, so this file holds a single test.

use std::sync::{Arc, Mutex};

use glass_fruit_shorts::candidate::{Candidate, CATALOG_HEADER};
use glass_fruit_shorts::cycle::AutomationCycle;
use glass_fruit_shorts::ledger::{Ledger, LEDGER_HEADER};
use glass_fruit_shorts::producer::PlaceholderProducer;
use glass_fruit_shorts::publisher::PlaceholderPublisher;
use glass_fruit_shorts::retry::RetryPolicy;
use glass_fruit_shorts::store::{MemoryTable, Table};
use glass_fruit_shorts::{set_log_hook, LogHook};

#[tokio::test]
async fn swallowed_ledger_failure_is_reported_once() {
    let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    let hook: LogHook = Arc::new(Mutex::new(move |line: &str| {
        sink.lock().unwrap().push(line.to_string());
    }));
    set_log_hook(Some(hook));

    let tracker = MemoryTable::with_header("tracker", LEDGER_HEADER);
    tracker.set_fail_writes(true);
    let ledger = Ledger::new(Arc::new(tracker), 20).with_retry(RetryPolicy::none());

    let catalog = MemoryTable::missing("catalog");
    let candidate = Candidate::new("Cherry", "Stone", 8);
    catalog.replace(Table::new(
        CATALOG_HEADER.iter().map(|h| h.to_string()).collect(),
        vec![vec![candidate.name, candidate.category, candidate.appeal_score.to_string()]],
    ));
    let publisher = PlaceholderPublisher::new("offline");

    let report = AutomationCycle::new(&ledger, &catalog, &PlaceholderProducer, &publisher)
        .run()
        .await;
    set_log_hook(None);

    assert!(!report.logged);
    let lines = lines.lock().unwrap();
    let failures: Vec<&String> = lines
        .iter()
        .filter(|l| l.starts_with("[ERROR] Ledger write failed"))
        .collect();
    assert_eq!(failures.len(), 1, "captured: {:?}", *lines);
    assert!(failures[0].contains("Glass Cherry"));
    assert!(lines.iter().any(|l| l.starts_with("[INFO] Selected subject: Cherry")));
}
