// ==========================================
// ImportSession 集成测试
// ==========================================
// 测试目标: 四阶段流转、门控、整批提交、失败恢复
// ==========================================


use chrono::NaiveDate;
use data_import_engine::config::ImportSettings;
use data_import_engine::domain::{FieldIssue, ImportOutcome, ImportStage, RowStatus};
use data_import_engine::importer::{
    CustomKinds, ExistingKeySet, ImportError, ImportSession, SchemaRegistry,
};
use data_import_engine::logging;
use serde_json::json;
use std::time::Duration;
use test_helpers::{cells, parsed_file, FlakyCommitter, RecordingCommitter, SlowCommitter};

const PRODUCT_HEADERS: &[&str] = &["Product Name", "Product Code", "Price", "Stock"];

fn products_session() -> ImportSession {
    ImportSession::new(&SchemaRegistry::builtin(), "products", ImportSettings::default())
        .expect("products target should exist")
}

/// 载入 + 校验，停在 validation 阶段
fn validated_products(rows: &[Vec<String>], existing: &ExistingKeySet) -> ImportSession {
    let mut session = products_session();
    session
        .load_file(parsed_file("products.csv", PRODUCT_HEADERS, rows))
        .unwrap();
    session.validate(existing).unwrap();
    session
}

fn ten_valid_rows() -> Vec<Vec<String>> {
    (0..10)
        .map(|i| {
            let sku = format!("SKU-{}", i);
            cells(&["Item", &sku, "9.50", "3"])
        })
        .collect()
}

#[test]
fn test_product_code_header_maps_to_sku() {
    let mut session = products_session();

    let mapping = session
        .load_file(parsed_file("products.csv", PRODUCT_HEADERS, &[]))
        .unwrap();

    assert_eq!(mapping.header_for("sku"), Some("Product Code"));
    assert_eq!(mapping.header_for("stock_quantity"), Some("Stock"));
    assert!(session.mapping_gaps().is_empty());
}

#[test]
fn test_missing_name_single_error_excluded_from_valid() {
    let session = validated_products(
        &[
            cells(&["", "A1", "10", "1"]),
            cells(&["Widget", "A2", "10", "1"]),
        ],
        &ExistingKeySet::default(),
    );

    let first = &session.parsed_rows()[0];
    assert_eq!(
        first.errors,
        vec![FieldIssue::new("name", "Product Name is required")]
    );
    assert_eq!(session.stats().valid, 1);
    assert_eq!(session.stats().errors, 1);
    assert_eq!(session.row_status(2), Some(RowStatus::Error));
    assert_eq!(session.row_status(3), Some(RowStatus::Valid));
}

#[test]
fn test_currency_value_transformed() {
    let session = validated_products(
        &[cells(&["Widget", "A1", "$29.99", "4"])],
        &ExistingKeySet::default(),
    );

    let mapped = &session.parsed_rows()[0].mapped;
    assert_eq!(mapped.get("sell_price"), Some(&json!(29.99)));
    assert_eq!(mapped.get("stock_quantity"), Some(&json!(4)));
    assert_eq!(mapped.get("cost_price"), Some(&json!(0)));
    assert_eq!(mapped.get("unit"), Some(&json!("each")));
    assert_eq!(mapped.get("description"), Some(&json!("")));
}

#[test]
fn test_duplicate_detection_and_skip_toggle() {
    let existing = ExistingKeySet::from_raw(["sku123"]);
    let mut session = validated_products(
        &[
            cells(&["Widget", "SKU123", "10", "1"]),
            cells(&["Gadget", "SKU124", "10", "1"]),
        ],
        &existing,
    );

    let stats = session.stats();
    assert!(session.parsed_rows()[0].is_duplicate);
    assert_eq!(session.parsed_rows()[0].warnings.len(), 1);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.valid, 1);
    assert_eq!(stats.skipped, 1);

    let stats = session.set_skip_duplicates(false).unwrap();
    assert_eq!(stats.valid, 2);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(session.row_status(2), Some(RowStatus::Duplicate));
}

#[test]
fn test_skip_toggle_locked_once_import_stage_entered() {
    // === 准备 ===
    let existing = ExistingKeySet::from_raw(["sku123"]);
    let mut session = validated_products(&[cells(&["Widget", "SKU123", "10", "1"])], &existing);
    session.set_skip_duplicates(false).unwrap();
    session.proceed_to_import().unwrap();

    // === 执行 ===
    let err = session.set_skip_duplicates(true).unwrap_err();

    // === 验证 ===
    assert!(matches!(err, ImportError::InvalidStageTransition { .. }));
    assert_eq!(session.stats().valid, 1);
    assert!(!session.skip_duplicates());

    // 回到 validation 后可切换，门控重新生效
    session.navigate_to(ImportStage::Validation).unwrap();
    assert_eq!(session.set_skip_duplicates(true).unwrap().valid, 0);
    assert!(matches!(session.proceed_to_import(), Err(ImportError::NoValidRows)));
}

#[test]
fn test_revalidation_is_idempotent() {
    let existing = ExistingKeySet::from_raw(["sku-3"]);
    let mut rows = ten_valid_rows();
    rows.push(cells(&["", "SKU-X", "abc", "-1"]));
    let mut session = validated_products(&rows, &existing);
    let first = session.parsed_rows().to_vec();
    let first_stats = session.stats();

    let second_stats = session.validate(&existing).unwrap();

    assert_eq!(session.parsed_rows(), first.as_slice());
    assert_eq!(second_stats, first_stats);
    assert_eq!(first_stats.errors, 1);
    assert_eq!(first_stats.duplicates, 1);
}

#[tokio::test]
async fn test_dry_run_never_calls_committer() {
    logging::init_test();

    let mut session = validated_products(&ten_valid_rows(), &ExistingKeySet::default());
    session.set_dry_run(true).unwrap();
    session.proceed_to_import().unwrap();

    let committer = RecordingCommitter::default();
    let imported = session.commit(&committer, None).await.unwrap();

    assert_eq!(imported, 0);
    assert_eq!(committer.calls(), 0);
    assert_eq!(session.outcome(), &ImportOutcome::Complete { imported: 0 });
    assert_eq!(session.stats().valid, 10);
    assert_eq!(session.stats().imported, 0);
}

#[tokio::test]
async fn test_commit_sends_exactly_valid_rows_once() {
    let existing = ExistingKeySet::from_raw(["dup-1"]);
    let mut session = validated_products(
        &[
            cells(&["A", "OK-1", "1", "1"]),
            cells(&["", "BAD-1", "1", "1"]),
            cells(&["B", "DUP-1", "1", "1"]),
            cells(&["C", "OK-2", "2", "2"]),
        ],
        &existing,
    );
    session.proceed_to_import().unwrap();

    let committer = RecordingCommitter::default();
    let imported = session.commit(&committer, Some(Duration::from_secs(5))).await.unwrap();

    assert_eq!(imported, 2);
    assert_eq!(committer.calls(), 1);
    let batch = committer.last_batch().unwrap();
    assert_eq!(batch.target, "products");
    assert_eq!(batch.unique_key, "sku");
    assert_eq!(batch.file_name, "products.csv");
    let skus: Vec<_> = batch.rows.iter().filter_map(|r| r.text("sku")).collect();
    assert_eq!(skus, vec!["OK-1", "OK-2"]);

    let report = session.report();
    assert_eq!(report.stats.imported, 2);
    assert!(report.finished_at.is_some());
}

#[tokio::test]
async fn test_commit_failure_returns_to_validation_and_retry_succeeds() {
    logging::init_test();

    let mut session = validated_products(&ten_valid_rows(), &ExistingKeySet::default());
    session.proceed_to_import().unwrap();
    let committer = FlakyCommitter::failing(1);

    let err = session.commit(&committer, None).await.unwrap_err();

    assert!(matches!(err, ImportError::PersistenceError(ref m) if m.contains("storage unavailable")));
    assert_eq!(session.stage(), ImportStage::Validation);
    assert!(matches!(session.outcome(), ImportOutcome::Failed { .. }));
    assert!(session.last_error().is_some());
    assert_eq!(session.parsed_rows().len(), 10);

    // 无需重新上传或映射
    session.proceed_to_import().unwrap();
    let imported = session.commit(&committer, None).await.unwrap();

    assert_eq!(imported, 10);
    assert_eq!(committer.inner.calls(), 1);
    assert!(session.last_error().is_none());
}

#[tokio::test]
async fn test_commit_timeout_is_recoverable() {
    let mut session = validated_products(&ten_valid_rows(), &ExistingKeySet::default());
    session.proceed_to_import().unwrap();

    let err = session
        .commit(&SlowCommitter(Duration::from_secs(5)), Some(Duration::from_millis(20)))
        .await
        .unwrap_err();

    assert!(matches!(err, ImportError::CommitTimeout(20)));
    assert_eq!(session.stage(), ImportStage::Validation);
}

#[tokio::test]
async fn test_completed_session_is_closed() {
    let mut session = validated_products(&ten_valid_rows(), &ExistingKeySet::default());
    session.proceed_to_import().unwrap();
    let committer = RecordingCommitter::default();
    session.commit(&committer, None).await.unwrap();

    assert!(session.is_complete());
    assert!(matches!(
        session.commit(&committer, None).await,
        Err(ImportError::SessionClosed)
    ));
    assert!(matches!(
        session.navigate_to(ImportStage::Mapping),
        Err(ImportError::SessionClosed)
    ));
    assert_eq!(committer.calls(), 1);
}

#[test]
fn test_backward_navigation_keeps_state() {
    let mut session = validated_products(
        &[cells(&["Widget", "A1", "10", "1"])],
        &ExistingKeySet::default(),
    );

    session.navigate_to(ImportStage::Mapping).unwrap();
    assert_eq!(session.stage(), ImportStage::Mapping);
    assert_eq!(session.mapping().header_for("sku"), Some("Product Code"));

    // 不能跳过校验直接前进
    assert!(matches!(
        session.navigate_to(ImportStage::Import),
        Err(ImportError::InvalidStageTransition { .. })
    ));

    session.unbind_column("stock_quantity").unwrap();
    let stats = session.validate(&ExistingKeySet::default()).unwrap();
    assert_eq!(stats.valid, 1);
    assert_eq!(session.parsed_rows()[0].mapped.get("stock_quantity"), Some(&json!(0)));
}

#[test]
fn test_bind_rejects_header_claimed_by_other_field() {
    let mut session = products_session();
    session
        .load_file(parsed_file("products.csv", PRODUCT_HEADERS, &[]))
        .unwrap();

    let err = session.bind_column("description", "Product Code").unwrap_err();

    assert!(matches!(err, ImportError::HeaderAlreadyMapped { ref field, .. } if field == "sku"));
}

#[test]
fn test_cancel_before_commit_produces_report() {
    let session = validated_products(&ten_valid_rows(), &ExistingKeySet::default());
    let session_id = session.session_id().to_string();

    let report = session.cancel();

    assert_eq!(report.session_id, session_id);
    assert_eq!(report.outcome, ImportOutcome::Pending);
    assert_eq!(report.rows.len(), 10);
    assert!(report.finished_at.is_some());
}

#[test]
fn test_employees_dates_and_defaults() {
    let today = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
    let mut session =
        ImportSession::new(&SchemaRegistry::builtin(), "employees", ImportSettings::default())
            .unwrap()
            .with_today(today);
    session
        .load_file(parsed_file(
            "staff.csv",
            &["Employee Name", "Work Email", "Hire Date", "Status"],
            &[
                cells(&["Ann Lee", "Ann@Example.com", "03/15/2024", "On Leave"]),
                cells(&["Bo Chan", "bo@example.com", "", ""]),
                cells(&["Cy Day", "not-an-email", "2024-01-01", "active"]),
            ],
        ))
        .unwrap();

    let stats = session.validate(&ExistingKeySet::from_raw(["ann@example.com"])).unwrap();

    let rows = session.parsed_rows();
    assert_eq!(rows[0].mapped.get("start_date"), Some(&json!("2024-03-15")));
    assert_eq!(rows[0].mapped.get("status"), Some(&json!("on_leave")));
    assert!(rows[0].is_duplicate);
    assert_eq!(rows[1].mapped.get("start_date"), Some(&json!("2026-10-14")));
    assert_eq!(rows[1].mapped.get("status"), Some(&json!("active")));
    assert_eq!(rows[1].mapped.get("department"), Some(&json!("General")));
    assert_eq!(
        rows[2].errors,
        vec![FieldIssue::new("email", "Invalid email format")]
    );
    assert_eq!(stats.valid, 1);
    assert_eq!(stats.valid + stats.skipped, stats.total);
}

#[test]
fn test_custom_validator_kind() {
    let mut registry_json: serde_json::Value =
        serde_json::from_str(&SchemaRegistry::builtin().to_json().unwrap()).unwrap();
    registry_json["products"]["fields"][2]["validator"] =
        json!({"kind": "custom", "name": "no_lorem"});
    let registry = SchemaRegistry::from_json(&registry_json.to_string()).unwrap();

    let custom = CustomKinds::new().validator("no_lorem", |raw| {
        raw.to_lowercase()
            .contains("lorem")
            .then(|| "Placeholder text is not allowed".to_string())
    });
    let mut session = ImportSession::new(&registry, "products", ImportSettings::default())
        .unwrap()
        .with_custom_kinds(custom);
    session
        .load_file(parsed_file(
            "products.csv",
            &["Product Name", "SKU", "Description", "Price"],
            &[cells(&["Widget", "W1", "Lorem ipsum", "3"])],
        ))
        .unwrap();

    session.validate(&ExistingKeySet::default()).unwrap();

    assert_eq!(
        session.parsed_rows()[0].errors,
        vec![FieldIssue::new("description", "Placeholder text is not allowed")]
    );
}

#[test]
fn test_unregistered_custom_kind_is_schema_error() {
    let mut registry_json: serde_json::Value =
        serde_json::from_str(&SchemaRegistry::builtin().to_json().unwrap()).unwrap();
    registry_json["products"]["fields"][2]["transformer"] =
        json!({"kind": "custom", "name": "slugify"});
    let registry = SchemaRegistry::from_json(&registry_json.to_string()).unwrap();

    let mut session = ImportSession::new(&registry, "products", ImportSettings::default()).unwrap();
    session
        .load_file(parsed_file("products.csv", &["Product Name", "SKU", "Price"], &[]))
        .unwrap();

    assert!(matches!(
        session.validate(&ExistingKeySet::default()),
        Err(ImportError::InvalidSchema { .. })
    ));
}
