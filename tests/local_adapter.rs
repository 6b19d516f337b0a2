mod common;

use common::record;
use scck_erp_store::{
    AggregateOp, BackendKind, Conditions, LocalAdapter, OrderBy, QueryOptions, RawOutcome, StoreError,
    TableStore,
};
use serde_json::json;
use tempfile::TempDir;

async fn open() -> (TempDir, LocalAdapter) {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalAdapter::initialize(dir.path().join("data").join("erp.db"))
        .await
        .unwrap();
    (dir, adapter)
}

async fn seed_producers(db: &LocalAdapter) {
    for (id, nom, zone, superficie) in [
        ("PROD-0001", "Kouassi", "Soubre", json!(10.0)),
        ("PROD-0002", "Yao", "Daloa", json!(20.0)),
        ("PROD-0003", "Konan", "Soubre", json!(null)),
        ("PROD-0004", "Traore", "Soubre", json!(30.0)),
    ] {
        db.insert(
            "producers",
            record(json!({ "id": id, "nom": nom, "zone": zone, "superficie": superficie })),
        )
        .await
        .unwrap();
    }
}

#[tokio::test]
async fn initialize_creates_file_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("erp.db");

    let first = LocalAdapter::initialize(&path).await.unwrap();
    assert!(path.exists());
    first
        .insert("producers", record(json!({ "id": "PROD-0001", "nom": "Kouassi", "zone": "Soubre" })))
        .await
        .unwrap();
    first.close().await;

    let second = LocalAdapter::initialize(&path).await.unwrap();
    let tables = second
        .all(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )
        .await
        .unwrap();
    let names: Vec<_> = tables.iter().map(|r| r["name"].as_str().unwrap().to_string()).collect();
    assert_eq!(
        names,
        [
            "collections",
            "customers",
            "employees",
            "inventory",
            "producers",
            "projects",
            "suppliers",
            "transactions",
            "users"
        ]
    );
    assert_eq!(second.count("producers", &Conditions::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn inserted_row_reads_back() {
    let (_dir, db) = open().await;
    let out = db
        .insert(
            "producers",
            record(json!({ "id": "PROD-0001", "nom": "Kouassi", "zone": "Soubre", "superficie": 4.5 })),
        )
        .await
        .unwrap();
    assert_eq!(out.last_insert_id, Some(json!("PROD-0001")));
    assert_eq!(out.record["statut"], json!("Active"));

    let row = db.find_one("producers", "PROD-0001".into(), "*").await.unwrap().unwrap();
    assert_eq!(row["nom"], json!("Kouassi"));
    assert_eq!(row["superficie"], json!(4.5));

    assert!(db.find_one("producers", "PROD-9999".into(), "*").await.unwrap().is_none());
}

#[tokio::test]
async fn find_one_by_conditions_with_projection() {
    let (_dir, db) = open().await;
    seed_producers(&db).await;
    let row = db
        .find_one("producers", Conditions::new().eq("nom", "Yao").into(), "id,zone")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row, record(json!({ "id": "PROD-0002", "zone": "Daloa" })));
}

#[tokio::test]
async fn find_all_filters_orders_and_pages() {
    let (_dir, db) = open().await;
    seed_producers(&db).await;

    let soubre = Conditions::new().eq("zone", "Soubre").eq("statut", json!(null));
    let rows = db
        .find_all("producers", &soubre, &QueryOptions::new().order(OrderBy::desc("id")))
        .await
        .unwrap();
    let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, [json!("PROD-0004"), json!("PROD-0003"), json!("PROD-0001")]);

    let page = db
        .find_all(
            "producers",
            &Conditions::new(),
            &QueryOptions::new().order_str("id ASC").unwrap().limit(2).offset(1),
        )
        .await
        .unwrap();
    let ids: Vec<_> = page.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, [json!("PROD-0002"), json!("PROD-0003")]);

    let tail = db
        .find_all("producers", &Conditions::new(), &QueryOptions::new().offset(3))
        .await
        .unwrap();
    assert_eq!(tail.len(), 1);

    let none = db
        .find_all("producers", &Conditions::new().eq("zone", "Abidjan"), &QueryOptions::new())
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn update_stamps_updated_at_and_ignores_id() {
    let (_dir, db) = open().await;
    db.insert(
        "producers",
        record(json!({
            "id": "PROD-0001",
            "nom": "Kouassi",
            "zone": "Soubre",
            "updated_at": "2024-01-01 00:00:00"
        })),
    )
    .await
    .unwrap();

    let row = db
        .update(
            "producers",
            &json!("PROD-0001"),
            record(json!({ "id": "PROD-9999", "statut": "Inactive" })),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["id"], json!("PROD-0001"));
    assert_eq!(row["statut"], json!("Inactive"));
    let stamped = row["updated_at"].as_str().unwrap();
    assert!(stamped > "2024-01-01 00:00:00", "updated_at not refreshed: {}", stamped);

    let missing = db
        .update("producers", &json!("PROD-0404"), record(json!({ "statut": "Inactive" })))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn ledger_update_does_not_touch_missing_column() {
    let (_dir, db) = open().await;
    seed_producers(&db).await;
    db.insert(
        "collections",
        record(json!({ "id": "COLL-00001", "producer_id": "PROD-0001", "date": "2024-03-01", "quantite": 120.0 })),
    )
    .await
    .unwrap();
    let row = db
        .update("collections", &json!("COLL-00001"), record(json!({ "statut": "Validated" })))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["statut"], json!("Validated"));
    assert!(!row.contains_key("updated_at"));
}

#[tokio::test]
async fn delete_reports_changes_and_tolerates_missing() {
    let (_dir, db) = open().await;
    seed_producers(&db).await;
    let out = db.delete("producers", &json!("PROD-0002")).await.unwrap();
    assert!(out.success);
    assert_eq!(out.changes, Some(1));

    let again = db.delete("producers", &json!("PROD-0002")).await.unwrap();
    assert!(again.success);
    assert_eq!(again.changes, Some(0));
    assert_eq!(db.count("producers", &Conditions::new()).await.unwrap(), 3);
}

#[tokio::test]
async fn count_and_native_aggregates() {
    let (_dir, db) = open().await;
    seed_producers(&db).await;
    let all = Conditions::new();
    let soubre = Conditions::new().eq("zone", "Soubre");

    assert_eq!(db.count("producers", &all).await.unwrap(), 4);
    assert_eq!(db.count("producers", &soubre).await.unwrap(), 3);

    for (op, expected) in [
        (AggregateOp::Sum, 60.0),
        (AggregateOp::Avg, 20.0),
        (AggregateOp::Min, 10.0),
        (AggregateOp::Max, 30.0),
        (AggregateOp::Count, 3.0),
    ] {
        let value = db.aggregate("producers", "superficie", op, &all).await.unwrap();
        assert_eq!(value, Some(expected), "{}", op);
    }

    let nowhere = Conditions::new().eq("zone", "Abidjan");
    assert_eq!(
        db.aggregate("producers", "superficie", AggregateOp::Sum, &nowhere)
            .await
            .unwrap(),
        None
    );
}

#[tokio::test]
async fn sql_family_binds_parameters() {
    let (_dir, db) = open().await;
    let run = db
        .run(
            "INSERT INTO users (email, password_hash, name, role) VALUES (?, ?, ?, ?)",
            &[json!("admin@scck.ci"), json!("x"), json!("Admin"), json!("admin")],
        )
        .await
        .unwrap();
    assert_eq!(run.changes, 1);
    assert_eq!(run.last_insert_id, 1);

    let user = db
        .get("SELECT id, role FROM users WHERE email = ?", &[json!("admin@scck.ci")])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user, record(json!({ "id": 1, "role": "admin" })));

    assert!(db
        .get("SELECT * FROM users WHERE email = ?", &[json!("nobody@scck.ci")])
        .await
        .unwrap()
        .is_none());
    assert!(db.all("SELECT * FROM users WHERE id > ?", &[json!(1)]).await.unwrap().is_empty());
}

#[tokio::test]
async fn bulk_insert_and_upsert() {
    let (_dir, db) = open().await;
    let rows = db
        .bulk_insert(
            "inventory",
            vec![
                record(json!({ "id": "INV-0001", "nom": "Feves", "quantite": 100.0 })),
                record(json!({ "id": "INV-0002", "nom": "Sacs", "quantite": 50.0 })),
            ],
        )
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let merged = db
        .upsert(
            "inventory",
            vec![
                record(json!({ "id": "INV-0002", "nom": "Sacs", "quantite": 75.0 })),
                record(json!({ "id": "INV-0003", "nom": "Engrais", "quantite": 10.0 })),
            ],
            "id",
        )
        .await
        .unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0]["quantite"], json!(75.0));
    assert_eq!(db.count("inventory", &Conditions::new()).await.unwrap(), 3);
}

#[tokio::test]
async fn bulk_insert_is_all_or_nothing() {
    let (_dir, db) = open().await;
    let err = db
        .bulk_insert(
            "inventory",
            vec![
                record(json!({ "id": "INV-0001", "nom": "Feves", "quantite": 100.0 })),
                record(json!({ "id": "INV-0001", "nom": "Doublon", "quantite": 1.0 })),
            ],
        )
        .await
        .unwrap_err();
    assert!(err.is_storage());
    assert_eq!(db.count("inventory", &Conditions::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn raw_returns_rows_and_ping_answers() {
    let (_dir, db) = open().await;
    assert_eq!(db.kind(), BackendKind::Local);
    seed_producers(&db).await;
    match db.raw("SELECT COUNT(*) AS n FROM producers").await.unwrap() {
        RawOutcome::Rows(rows) => assert_eq!(rows[0]["n"], json!(4)),
        RawOutcome::Unsupported => panic!("local engine runs raw sql"),
    }
    db.ping().await.unwrap();
}

#[tokio::test]
async fn malformed_identifiers_and_bad_sql_are_storage_errors() {
    let (_dir, db) = open().await;
    let err = db
        .find_all("producers; DROP TABLE users", &Conditions::new(), &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));

    let err = db.all("SELECT * FROM nowhere", &[]).await.unwrap_err();
    assert!(err.is_storage());
}

#[tokio::test]
async fn closed_adapter_fails_fast() {
    let (_dir, db) = open().await;
    db.close().await;
    let err = db.count("producers", &Conditions::new()).await.unwrap_err();
    assert!(err.is_storage());
}
