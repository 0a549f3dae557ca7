//! Inventory export against sqlite files

mod common;

use common::{create_inventory_db, run_date, INVENTORY};
use salesflow_common::types::SourceKind;
use salesflow_common::EtlError;
use salesflow_etl::config::EtlConfig;
use salesflow_etl::context::RunContext;
use salesflow_etl::extract::{DatabaseDumpAdapter, SourceAdapter};
use salesflow_etl::transform::normalize_bytes;

fn context(dir: &std::path::Path) -> RunContext {
    let mut config = EtlConfig::default();
    config.data_dir = dir.join("data");
    let ctx = RunContext::new(config, run_date());
    ctx.ensure_dirs().unwrap();
    ctx
}

#[tokio::test]
async fn test_table_is_dumped_as_tab_delimited_export() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("inventory.db");
    let url = create_inventory_db(&db, "store_inventory", INVENTORY).await;
    let ctx = context(dir.path());

    let adapter = DatabaseDumpAdapter::new(url, "store_inventory");
    let raw = adapter.extract(&ctx).await.expect("export should succeed");

    assert_eq!(raw, ctx.raw_path(SourceKind::Inventory));
    let text = std::fs::read_to_string(&raw).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "id\tproduct\tcategory\tprice\tquantity");
    assert_eq!(lines[1], "10\tMilk\tDairy\t1.25\t3");
    assert_eq!(lines.len(), 4);
}

#[tokio::test]
async fn test_export_normalizes_with_inventory_source() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("inventory.db");
    let url = create_inventory_db(&db, "store_inventory", INVENTORY).await;
    let ctx = context(dir.path());

    let raw = DatabaseDumpAdapter::new(url, "store_inventory")
        .extract(&ctx)
        .await
        .unwrap();
    let normalized = normalize_bytes(&std::fs::read(raw).unwrap(), SourceKind::Inventory).unwrap();

    // Flour has quantity 0 and is dropped
    let products: Vec<&str> = normalized.rows.iter().map(|r| r.product.as_str()).collect();
    assert_eq!(products, vec!["Milk", "Sugar"]);
    assert!(normalized
        .rows
        .iter()
        .all(|r| r.source == SourceKind::Inventory));
}

#[tokio::test]
async fn test_date_and_decimal_columns_are_exported_as_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.db");
    let pool = sqlx::SqlitePool::connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE store_inventory (id INT, product VARCHAR(50), category VARCHAR(50), \
         price DECIMAL(10,2), quantity INT, updated DATETIME)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO store_inventory VALUES \
         (1, 'Milk', 'Dairy', 1.25, 3, '2024-01-02 08:30:00'), \
         (2, 'Sugar', 'Pantry', 4.00, 10, NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;
    let ctx = context(dir.path());

    let raw = DatabaseDumpAdapter::new(format!("sqlite://{}", path.display()), "store_inventory")
        .extract(&ctx)
        .await
        .expect("tables with DATETIME columns should export");

    let text = std::fs::read_to_string(&raw).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "id\tproduct\tcategory\tprice\tquantity\tupdated");
    assert_eq!(lines[1], "1\tMilk\tDairy\t1.25\t3\t2024-01-02 08:30:00");
    assert!(lines[2].starts_with("2\tSugar\tPantry\t4"));
    assert!(lines[2].ends_with("\t10\t"));

    let normalized = normalize_bytes(text.as_bytes(), SourceKind::Inventory).unwrap();
    let totals: Vec<(&str, f64)> = normalized
        .rows
        .iter()
        .map(|r| (r.product.as_str(), r.total_sales))
        .collect();
    assert_eq!(totals, vec![("Milk", 3.75), ("Sugar", 40.0)]);
}

#[tokio::test]
async fn test_empty_table_gives_empty_export() {
    let dir = tempfile::tempdir().unwrap();
    let url = create_inventory_db(&dir.path().join("inventory.db"), "store_inventory", &[]).await;
    let ctx = context(dir.path());

    let raw = DatabaseDumpAdapter::new(url, "store_inventory")
        .extract(&ctx)
        .await
        .unwrap();

    let bytes = std::fs::read(raw).unwrap();
    assert!(bytes.is_empty());
    assert!(normalize_bytes(&bytes, SourceKind::Inventory)
        .unwrap()
        .rows
        .is_empty());
}

#[tokio::test]
async fn test_unreachable_database_is_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    // Without mode=rwc sqlite refuses to create the file
    let url = format!("sqlite://{}", dir.path().join("absent.db").display());

    let err = DatabaseDumpAdapter::new(url, "store_inventory")
        .extract(&ctx)
        .await
        .unwrap_err();

    match err {
        EtlError::Extraction { source_name, .. } => {
            assert_eq!(source_name, "inventory (store_inventory)")
        },
        other => panic!("expected extraction error, got {:?}", other),
    }
    assert!(!ctx.raw_path(SourceKind::Inventory).exists());
}
