#![forbid(unsafe_code)]

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use stockroom_contracts::parse_wire_datetime;
use stockroom_contracts::product::{ProductDraft, ProductId};
use stockroom_contracts::RecordStatus;
use stockroom_storage::repo::ProductRepo;
use stockroom_storage::store::{InventoryStore, StorageError};

fn at(raw: &str) -> NaiveDateTime {
    parse_wire_datetime(raw).unwrap()
}

fn draft(name: &str, sku: &str, category: &str) -> ProductDraft {
    ProductDraft {
        name: name.to_string(),
        sku: sku.to_string(),
        description: None,
        price: Decimal::new(1999, 2),
        category: category.to_string(),
        status: None,
    }
}

#[test]
fn at_products_db_01_ids_are_sequential_and_status_defaults_active() {
    let mut s = InventoryStore::new_in_memory();
    let a = s
        .product_create_row(at("2024-05-01T10:00"), draft("Cemento", "CEM-01", "Obra"))
        .unwrap();
    let b = s
        .product_create_row(at("2024-05-01T10:01"), draft("Arena fina", "ARE-01", "Obra"))
        .unwrap();
    assert_eq!(a.id, ProductId(1));
    assert_eq!(b.id, ProductId(2));
    assert_eq!(a.status, RecordStatus::Active);
    assert_eq!(a.created_at, a.updated_at);

    s.product_delete_row(b.id).unwrap();
    let c = s
        .product_create_row(at("2024-05-01T10:02"), draft("Grava", "GRA-01", "Obra"))
        .unwrap();
    assert_eq!(c.id, ProductId(3));
}

#[test]
fn at_products_db_02_sku_and_name_are_unique_ignoring_case() {
    let mut s = InventoryStore::new_in_memory();
    s.product_create_row(at("2024-05-01T10:00"), draft("Cemento", "CEM-01", "Obra"))
        .unwrap();

    let err = s
        .product_create_row(at("2024-05-01T10:00"), draft("Otro", "cem-01", "Obra"))
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { field: "sku", .. }));

    let err = s
        .product_create_row(at("2024-05-01T10:00"), draft(" cemento ", "CEM-02", "Obra"))
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { field: "nombre", .. }));
    assert_eq!(s.product_rows().len(), 1);
}

#[test]
fn at_products_db_03_update_keeps_own_keys_and_creation_time() {
    let mut s = InventoryStore::new_in_memory();
    let p = s
        .product_create_row(at("2024-05-01T10:00"), draft("Cemento", "CEM-01", "Obra"))
        .unwrap();
    let other = s
        .product_create_row(at("2024-05-01T10:00"), draft("Arena", "ARE-01", "Obra"))
        .unwrap();

    let mut edit = draft("Cemento", "CEM-01", "Construccion");
    edit.price = Decimal::new(2500, 2);
    let updated = s
        .product_update_row(at("2024-05-02T09:00"), p.id, edit)
        .unwrap();
    assert_eq!(updated.category, "Construccion");
    assert_eq!(updated.created_at, p.created_at);
    assert_eq!(updated.updated_at, at("2024-05-02T09:00"));

    let err = s
        .product_update_row(at("2024-05-02T09:00"), other.id, draft("Arena", "CEM-01", "Obra"))
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { field: "sku", .. }));

    let err = s
        .product_update_row(at("2024-05-02T09:00"), ProductId(99), draft("X12", "X12", "Obra"))
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[test]
fn at_products_db_04_filters_and_search_only_active() {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-01T10:00");
    let a = s
        .product_create_row(now, draft("Tubo PVC 1/2", "PVC-12", "Plomeria"))
        .unwrap();
    s.product_create_row(now, draft("Tubo PVC 3/4", "PVC-34", "plomeria"))
        .unwrap();
    s.product_create_row(now, draft("Cable 12", "CAB-12", "Electrico"))
        .unwrap();
    s.product_set_status_row(now, a.id, RecordStatus::Inactive)
        .unwrap();

    assert_eq!(s.product_rows_by_category("PLOMERIA").len(), 2);
    assert_eq!(s.product_rows_by_status(RecordStatus::Inactive).len(), 1);
    let found: Vec<_> = s
        .product_search_rows("pvc")
        .into_iter()
        .map(|p| p.sku.clone())
        .collect();
    assert_eq!(found, vec!["PVC-34".to_string()]);
    assert_eq!(s.product_by_sku_row("cab-12").map(|p| p.id), Some(ProductId(3)));
}

#[test]
fn at_products_db_05_invalid_drafts_never_reach_the_table() {
    let mut s = InventoryStore::new_in_memory();
    let mut bad = draft("Cemento", "CEM 01", "Obra");
    let err = s
        .product_create_row(at("2024-05-01T10:00"), bad.clone())
        .unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(ref v) if v.field() == "sku"));

    bad.sku = "CEM-01".to_string();
    bad.price = Decimal::new(-1, 0);
    assert!(s.product_create_row(at("2024-05-01T10:00"), bad).is_err());
    assert!(s.product_rows().is_empty());
}
