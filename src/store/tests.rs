use super::sqlite::next_date_updated;
use super::*;
use crate::model::TestsFailed;

fn record(tag: &str, customer: &str, date_created: &str) -> CanonicalRecord {
    CanonicalRecord {
        metrc_tag: tag.to_string(),
        metrc_tag_full: format!("{tag} Premium Flower"),
        apex_invoice_note: format!("{tag} Premium Flower"),
        customer: customer.to_string(),
        invoice_weight: 15.5,
        compliance_status: "Pending".to_string(),
        date_created: date_created.to_string(),
        date_updated: date_created.to_string(),
        ..CanonicalRecord::default()
    }
}

fn store() -> SqliteRecordStore {
    SqliteRecordStore::open_in_memory().expect("in-memory store should open")
}

#[test]
fn insert_assigns_ids_and_round_trips_fields() {
    let mut store = store();
    let mut original = record("1A40D03000005DD1", "Theory Wellness", "2024-01-15");
    original.tests_failed = TestsFailed::Description("Total Yeast & Mold".to_string());

    let id = store.insert(&original).expect("insert should succeed");
    let loaded = store
        .find_by_id(id)
        .expect("lookup should succeed")
        .expect("record should exist");

    assert_eq!(loaded.id, Some(id));
    assert_eq!(loaded.metrc_tag, original.metrc_tag);
    assert_eq!(loaded.apex_invoice_note, original.apex_invoice_note);
    assert_eq!(loaded.invoice_weight, 15.5);
    assert_eq!(
        loaded.tests_failed,
        TestsFailed::Description("Total Yeast & Mold".to_string())
    );
    assert!(store.find_by_id(id + 100).expect("lookup").is_none());
}

#[test]
fn insert_rejects_records_without_customer_or_with_bad_tag() {
    let mut store = store();
    let missing_customer = record("1A40D03000005DD1", "  ", "2024-01-15");
    assert!(matches!(
        store.insert(&missing_customer),
        Err(StoreError::InvalidRecord(_))
    ));

    let bad_tag = record("short", "Curaleaf", "2024-01-15");
    assert!(matches!(store.insert(&bad_tag), Err(StoreError::InvalidRecord(_))));

    let untagged = record("", "Curaleaf", "2024-01-15");
    assert!(store.insert(&untagged).is_ok());
}

#[test]
fn find_all_filters_and_orders_newest_first() {
    let mut store = store();
    let first = store
        .insert(&record("1A40D03000005DD1", "Theory Wellness", "2024-01-15"))
        .expect("insert");
    let second = store
        .insert(&record("1A40D03000005DD2", "Green Thumb Industries", "2024-01-16"))
        .expect("insert");
    let third = store
        .insert(&record("1A40D03000005DD3", "Theory Wellness", "2024-01-16"))
        .expect("insert");

    let all = store.find_all(&RecordFilters::default()).expect("find_all");
    let ids: Vec<i64> = all.iter().filter_map(|r| r.id).collect();
    assert_eq!(ids, vec![third, second, first]);

    let theory = store
        .find_all(&RecordFilters {
            customer: Some("theory".to_string()),
            ..RecordFilters::default()
        })
        .expect("customer filter");
    assert_eq!(theory.len(), 2);

    let by_tag = store
        .find_all(&RecordFilters {
            metrc_tag: Some("5DD2".to_string()),
            ..RecordFilters::default()
        })
        .expect("tag filter");
    assert_eq!(by_tag.len(), 1);
    assert_eq!(by_tag[0].id, Some(second));

    let dated = store
        .find_all(&RecordFilters {
            date_from: Some("2024-01-16".to_string()),
            date_to: Some("2024-01-16".to_string()),
            ..RecordFilters::default()
        })
        .expect("date filter");
    assert_eq!(dated.len(), 2);

    let none = store
        .find_all(&RecordFilters {
            compliance_status: Some("Passed".to_string()),
            ..RecordFilters::default()
        })
        .expect("status filter");
    assert!(none.is_empty());
}

#[test]
fn substring_filters_treat_wildcards_literally() {
    let mut store = store();
    store
        .insert(&record("1A40D03000005DD1", "100% Organic", "2024-01-15"))
        .expect("insert");
    store
        .insert(&record("1A40D03000005DD2", "Plain Farms", "2024-01-15"))
        .expect("insert");

    let matches = store
        .find_all(&RecordFilters {
            customer: Some("%".to_string()),
            ..RecordFilters::default()
        })
        .expect("find_all");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].customer, "100% Organic");
}

#[test]
fn update_applies_patch_and_keeps_date_order() {
    let mut store = store();
    let id = store
        .insert(&record("1A40D03000005DD1", "Curaleaf", "2024-01-17"))
        .expect("insert");

    let patch = RecordPatch {
        paid_date: Some("2024-01-20".to_string()),
        compliance_status: Some("Passed".to_string()),
        tests_failed: Some(TestsFailed::Count(1)),
        ..RecordPatch::default()
    };
    assert!(store.update(id, &patch).expect("update"));
    assert!(!store.update(id + 1, &patch).expect("update of missing id"));

    let updated = store.find_by_id(id).expect("lookup").expect("record");
    assert_eq!(updated.paid_date, "2024-01-20");
    assert_eq!(updated.compliance_status, "Passed");
    assert_eq!(updated.tests_failed, TestsFailed::Count(1));
    assert_eq!(updated.customer, "Curaleaf");
    assert!(updated.date_updated >= updated.date_created);
}

#[test]
fn update_refuses_invalid_values() {
    let mut store = store();
    let id = store
        .insert(&record("1A40D03000005DD1", "Curaleaf", "2024-01-17"))
        .expect("insert");

    let patch = RecordPatch {
        customer: Some(String::new()),
        ..RecordPatch::default()
    };
    assert!(matches!(
        store.update(id, &patch),
        Err(StoreError::InvalidRecord(_))
    ));
}

#[test]
fn date_updated_never_precedes_date_created() {
    assert_eq!(next_date_updated("2024-01-17", "2024-02-01"), "2024-02-01");
    assert_eq!(next_date_updated("2030-01-01", "2024-02-01"), "2030-01-01");
}

#[test]
fn delete_reports_whether_a_row_was_removed() {
    let mut store = store();
    let id = store
        .insert(&record("1A40D03000005DD1", "Curaleaf", "2024-01-17"))
        .expect("insert");
    assert!(store.delete(id).expect("delete"));
    assert!(!store.delete(id).expect("second delete"));
}

#[test]
fn stats_count_pending_passed_and_payment_state() {
    let mut store = store();

    let unpaid_clean = record("1A40D03000005DD1", "Theory Wellness", "2024-01-15");
    let mut paid_clean = record("1A40D03000005DD2", "Green Thumb Industries", "2024-01-16");
    paid_clean.paid_date = "2024-01-20".to_string();
    let mut failed = record("1A40D03000005DD3", "Curaleaf", "2024-01-17");
    failed.tests_failed = TestsFailed::Count(1);
    let mut described = record("1A40D03000005DD4", "Curaleaf", "2024-01-17");
    described.tests_failed = TestsFailed::Description("Pesticide residue".to_string());

    for item in [&unpaid_clean, &paid_clean, &failed, &described] {
        store.insert(item).expect("insert");
    }

    let stats = store.stats().expect("stats");
    assert_eq!(
        stats,
        RecordStats {
            total: 4,
            pending: 1,
            passed: 2,
            paid: 1,
            unpaid: 3,
        }
    );
}

#[test]
fn find_by_metrc_tag_matches_exact_tags_only() {
    let mut store = store();
    store
        .insert(&record("1A40D03000005DD1", "Theory Wellness", "2024-01-15"))
        .expect("insert");

    assert_eq!(
        store
            .find_by_metrc_tag("1A40D03000005DD1")
            .expect("lookup")
            .len(),
        1
    );
    assert!(store.find_by_metrc_tag("5DD1").expect("lookup").is_empty());
}

#[test]
fn upload_log_lists_newest_first() {
    let store = store();
    for name in ["first.xlsx", "second.xlsx"] {
        store
            .log_upload(&NewUpload {
                filename: name.to_string(),
                file_path: format!("uploads/{name}"),
                file_size: 2048,
                sha256: "abc123".to_string(),
                sheet_name: "Sheet1".to_string(),
                rows_accepted: 3,
                records_imported: 3,
                records_failed: 0,
            })
            .expect("log upload");
    }

    let uploads = store.list_uploads(50).expect("list uploads");
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].filename, "second.xlsx");
    assert_eq!(store.list_uploads(1).expect("limited").len(), 1);
}
