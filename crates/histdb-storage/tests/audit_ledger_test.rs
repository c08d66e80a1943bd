//! Audit ledger: exactly-once recording, unprocessed filtering, ordering, purges.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use histdb_core::models::{SourceItem, SourceKind};
use histdb_core::time::parse_ts;
use histdb_core::traits::IAuditLedger;
use histdb_core::HistError;
use histdb_storage::{AuditLedger, StorageEngine};
use tempfile::TempDir;

fn setup() -> (TempDir, AuditLedger) {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(StorageEngine::open(&dir.path().join("audit.db")).unwrap());
    (dir, AuditLedger::new(storage))
}

fn t(s: &str) -> DateTime<Utc> {
    parse_ts(s).unwrap()
}

fn file(locator: &str, at: &str) -> SourceItem {
    SourceItem::new(SourceKind::File, locator, t(at))
}

#[test]
fn record_is_exactly_once() {
    let (_dir, ledger) = setup();
    let item = file("/data/a.json", "2024-01-01T00:00:00Z");
    assert!(ledger.record("prices", &item).unwrap());
    assert!(!ledger.record("prices", &item).unwrap());
    // Same locator on another table is independent.
    assert!(ledger.record("rates", &item).unwrap());
    // Same locator with a different source time is a distinct item.
    let touched = file("/data/a.json", "2024-01-02T00:00:00Z");
    assert!(ledger.record("prices", &touched).unwrap());
    assert_eq!(ledger.entries("prices").unwrap().len(), 2);
}

#[test]
fn oversized_locator_is_rejected() {
    let (_dir, ledger) = setup();
    let item = file(&"p".repeat(1024), "2024-01-01T00:00:00Z");
    assert!(matches!(
        ledger.record("prices", &item),
        Err(HistError::ValidationFailure(_))
    ));
}

#[test]
fn filter_unprocessed_preserves_order_and_dedupes() {
    let (_dir, ledger) = setup();
    ledger
        .record("prices", &file("b", "2024-01-01T00:00:00Z"))
        .unwrap();
    let candidates: Vec<String> = ["c", "b", "a", "c", "d"].iter().map(|s| s.to_string()).collect();
    let remaining = ledger.filter_unprocessed("prices", &candidates).unwrap();
    assert_eq!(remaining, vec!["c", "a", "d"]);
    // Other tables' entries do not count.
    let remaining = ledger.filter_unprocessed("rates", &candidates).unwrap();
    assert_eq!(remaining, vec!["c", "b", "a", "d"]);
}

#[test]
fn latest_entry_respects_kind_and_as_of() {
    let (_dir, ledger) = setup();
    ledger.record("prices", &file("a", "2024-01-01T00:00:00Z")).unwrap();
    ledger.record("prices", &file("b", "2024-01-03T00:00:00Z")).unwrap();
    ledger
        .record(
            "prices",
            &SourceItem::new(SourceKind::Stream, "m-1", t("2024-01-05T00:00:00Z")),
        )
        .unwrap();

    let latest = ledger.latest_entry("prices", SourceKind::File, None).unwrap().unwrap();
    assert_eq!(latest.locator, "b");

    let as_of = ledger
        .latest_entry("prices", SourceKind::File, Some(t("2024-01-02T00:00:00Z")))
        .unwrap()
        .unwrap();
    assert_eq!(as_of.locator, "a");

    assert!(ledger
        .latest_entry("prices", SourceKind::File, Some(t("2023-12-31T00:00:00Z")))
        .unwrap()
        .is_none());
    assert!(ledger.latest_entry("rates", SourceKind::File, None).unwrap().is_none());
}

#[test]
fn enforce_monotonic_fails_on_equal_or_older() {
    let (_dir, ledger) = setup();
    let base = t("2024-01-10T00:00:00Z");
    ledger
        .record("prices", &SourceItem::new(SourceKind::File, "x", base))
        .unwrap();

    let newer = SourceItem::new(SourceKind::File, "y", base + Duration::seconds(1));
    ledger.enforce_monotonic("prices", &[newer.clone()]).unwrap();

    let equal = SourceItem::new(SourceKind::File, "z", base);
    let err = ledger.enforce_monotonic("prices", &[newer.clone(), equal]).unwrap_err();
    match err {
        HistError::OrderingViolation { locator, latest, .. } => {
            assert_eq!(locator, "z");
            assert_eq!(latest, base);
        }
        other => panic!("expected OrderingViolation, got {other:?}"),
    }

    let older = SourceItem::new(SourceKind::File, "w", base - Duration::days(1));
    assert!(ledger.enforce_monotonic("prices", &[older]).is_err());
    // Empty ledger accepts anything.
    ledger
        .enforce_monotonic("rates", &[SourceItem::new(SourceKind::File, "w", base)])
        .unwrap();
}

#[test]
fn purges_honour_inclusivity() {
    let (_dir, ledger) = setup();
    for (loc, at) in [
        ("a", "2024-01-01T00:00:00Z"),
        ("b", "2024-01-02T00:00:00Z"),
        ("c", "2024-01-03T00:00:00Z"),
        ("d", "2024-01-04T00:00:00Z"),
    ] {
        ledger.record("prices", &file(loc, at)).unwrap();
    }

    assert_eq!(ledger.purge_before("prices", t("2024-01-02T00:00:00Z"), false).unwrap(), 1);
    assert_eq!(ledger.purge_before("prices", t("2024-01-02T00:00:00Z"), true).unwrap(), 1);
    assert_eq!(ledger.purge_after("prices", t("2024-01-03T00:00:00Z"), false).unwrap(), 1);
    assert_eq!(ledger.purge_after("prices", t("2024-01-03T00:00:00Z"), true).unwrap(), 1);
    assert!(ledger.entries("prices").unwrap().is_empty());

    ledger.record("prices", &file("e", "2024-02-01T00:00:00Z")).unwrap();
    assert_eq!(ledger.purge("prices").unwrap(), 1);
}
