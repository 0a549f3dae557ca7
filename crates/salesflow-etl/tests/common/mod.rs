//! Shared fixtures for integration tests

#![allow(dead_code)]

use chrono::NaiveDate;
use salesflow_common::logging::LogConfig;
use salesflow_etl::config::EtlConfig;
use salesflow_etl::context::RunContext;
use std::path::{Path, PathBuf};

pub const ONLINE_SALES: &str = r#"[
    {"id": "O-1", "product": "Latte", "category": "Drinks", "price": 4.0, "quantity": 2},
    {"id": "O-2", "product": "Cup", "category": "Merch", "price": 0, "quantity": 1},
    {"id": "O-3", "product": "Scone", "category": "Bakery", "price": "2.50", "quantity": 4}
]"#;

pub const INSTORE_SALES: &str = "id,product,category,price,quantity\n\
                                 S-1,Latte,Drinks,4,1\n\
                                 S-2,Bun,Bakery,1.5,2\n\
                                 S-3,Mug,Merch,9,-1\n";

/// (id, product, category, price, quantity)
pub const INVENTORY: &[(i64, &str, &str, f64, i64)] = &[
    (10, "Milk", "Dairy", 1.25, 3),
    (11, "Sugar", "Pantry", 0.8, 10),
    (12, "Flour", "Pantry", 1.1, 0),
];

pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).expect("valid date")
}

/// Create a sqlite inventory database holding `rows`
pub async fn create_inventory_db(
    path: &Path,
    table: &str,
    rows: &[(i64, &str, &str, f64, i64)],
) -> String {
    let pool = sqlx::SqlitePool::connect(&format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .expect("Failed to create sqlite database");

    sqlx::query(&format!(
        "CREATE TABLE {} (id INTEGER PRIMARY KEY, product TEXT NOT NULL, category TEXT NOT NULL, \
         price REAL NOT NULL, quantity INTEGER NOT NULL)",
        table
    ))
    .execute(&pool)
    .await
    .expect("Failed to create inventory table");

    for &(id, product, category, price, quantity) in rows {
        sqlx::query(&format!(
            "INSERT INTO {} (id, product, category, price, quantity) VALUES (?, ?, ?, ?, ?)",
            table
        ))
        .bind(id)
        .bind(product)
        .bind(category)
        .bind(price)
        .bind(quantity)
        .execute(&pool)
        .await
        .expect("Failed to insert inventory row");
    }

    pool.close().await;
    format!("sqlite://{}", path.display())
}

/// Scratch layout with both file sources and an inventory database
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub config: EtlConfig,
}

impl Workspace {
    pub async fn new(
        online: &str,
        instore: &str,
        inventory: &[(i64, &str, &str, f64, i64)],
    ) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let input = dir.path().join("input");
        std::fs::create_dir_all(&input).expect("Failed to create input dir");

        std::fs::write(input.join("online_sales.json"), online).expect("write online");
        std::fs::write(input.join("instore_sales.csv"), instore).expect("write instore");
        let url =
            create_inventory_db(&input.join("inventory.db"), "store_inventory", inventory).await;

        let mut config = EtlConfig::default();
        config.data_dir = dir.path().join("data");
        config.sources.online = input.join("online_sales.json");
        config.sources.instore = input.join("instore_sales.csv");
        config.database.url = url;

        Self { dir, config }
    }

    pub fn context(&self) -> RunContext {
        let logging = LogConfig::builder().log_dir(self.log_dir()).build();
        RunContext::new(self.config.clone(), run_date()).with_logging(logging)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }
}
