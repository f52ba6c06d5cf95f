#![forbid(unsafe_code)]

use chrono::NaiveDateTime;
use stockroom_contracts::parse_wire_datetime;
use stockroom_contracts::product::ProductId;
use stockroom_contracts::stock::{StockAdjustment, StockDraft};
use stockroom_contracts::warehouse::{WarehouseDraft, WarehouseId};
use stockroom_contracts::RecordStatus;
use stockroom_storage::repo::{StockRepo, WarehouseRepo};
use stockroom_storage::store::{InventoryStore, StorageError};

fn at(raw: &str) -> NaiveDateTime {
    parse_wire_datetime(raw).unwrap()
}

fn warehouse(name: &str) -> WarehouseDraft {
    WarehouseDraft {
        name: name.to_string(),
        address: "Km 5 via a la costa".to_string(),
        capacity: 1000,
        status: None,
    }
}

fn stock(product: u64, warehouse: u64, quantity: i64, min: i64) -> StockDraft {
    StockDraft {
        product_id: ProductId(product),
        warehouse_id: WarehouseId(warehouse),
        quantity,
        min_quantity: min,
    }
}

fn seeded() -> InventoryStore {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-01T10:00");
    s.warehouse_create_row(now, warehouse("Central")).unwrap();
    s.warehouse_create_row(now, warehouse("Norte")).unwrap();
    s
}

#[test]
fn at_inventory_db_01_warehouse_names_unique_and_delete_blocked_by_stock() {
    let mut s = seeded();
    let now = at("2024-05-01T10:00");
    let err = s
        .warehouse_create_row(now, warehouse("central"))
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { field: "nombre", .. }));

    let rec = s.stock_create_row(now, stock(7, 2, 5, 10)).unwrap();
    let err = s.warehouse_delete_row(WarehouseId(2)).unwrap_err();
    assert!(matches!(err, StorageError::ForeignKeyViolation { .. }));

    s.stock_delete_row(rec.id).unwrap();
    s.warehouse_delete_row(WarehouseId(2)).unwrap();
    assert_eq!(s.warehouse_rows().len(), 1);
}

#[test]
fn at_inventory_db_02_stock_pair_unique_and_warehouse_must_exist() {
    let mut s = seeded();
    let now = at("2024-05-01T10:00");
    s.stock_create_row(now, stock(7, 1, 50, 10)).unwrap();

    let err = s.stock_create_row(now, stock(7, 1, 1, 1)).unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { .. }));

    let err = s.stock_create_row(now, stock(7, 9, 1, 1)).unwrap_err();
    assert!(matches!(err, StorageError::ForeignKeyViolation { .. }));

    s.stock_create_row(now, stock(7, 2, 3, 10)).unwrap();
    assert_eq!(s.stock_rows_by_product(ProductId(7)).len(), 2);
    assert_eq!(s.stock_rows_by_warehouse(WarehouseId(1)).len(), 1);
}

#[test]
fn at_inventory_db_03_adjustments_never_go_negative() {
    let mut s = seeded();
    let now = at("2024-05-01T10:00");
    s.stock_create_row(now, stock(7, 1, 20, 10)).unwrap();

    let rec = s
        .stock_adjust_row(now, ProductId(7), WarehouseId(1), StockAdjustment::Reduce(15))
        .unwrap();
    assert_eq!(rec.quantity, 5);

    let err = s
        .stock_adjust_row(now, ProductId(7), WarehouseId(1), StockAdjustment::Reduce(6))
        .unwrap_err();
    assert_eq!(
        err,
        StorageError::InsufficientStock {
            product_id: ProductId(7),
            warehouse_id: WarehouseId(1),
            available: 5,
            requested: 6,
        }
    );

    let rec = s
        .stock_adjust_row(now, ProductId(7), WarehouseId(1), StockAdjustment::Add(10))
        .unwrap();
    assert_eq!(rec.quantity, 15);
    let rec = s
        .stock_adjust_row(now, ProductId(7), WarehouseId(1), StockAdjustment::Set(0))
        .unwrap();
    assert_eq!(rec.quantity, 0);

    let err = s
        .stock_adjust_row(now, ProductId(8), WarehouseId(1), StockAdjustment::Add(1))
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[test]
fn at_inventory_db_04_critical_stock_is_at_or_below_minimum() {
    let mut s = seeded();
    let now = at("2024-05-01T10:00");
    s.stock_create_row(now, stock(1, 1, 10, 10)).unwrap();
    s.stock_create_row(now, stock(2, 1, 11, 10)).unwrap();
    s.stock_create_row(now, stock(3, 2, 0, 5)).unwrap();

    assert_eq!(s.stock_critical_rows(None).len(), 2);
    let in_central: Vec<_> = s
        .stock_critical_rows(Some(WarehouseId(1)))
        .into_iter()
        .map(|r| r.product_id)
        .collect();
    assert_eq!(in_central, vec![ProductId(1)]);
}

#[test]
fn at_inventory_db_05_stock_update_can_move_pair() {
    let mut s = seeded();
    let now = at("2024-05-01T10:00");
    let rec = s.stock_create_row(now, stock(1, 1, 10, 10)).unwrap();
    s.stock_create_row(now, stock(2, 2, 10, 10)).unwrap();

    let moved = s
        .stock_update_row(at("2024-05-02T10:00"), rec.id, stock(1, 2, 12, 4))
        .unwrap();
    assert_eq!(moved.warehouse_id, WarehouseId(2));
    assert!(s.stock_pair_row(ProductId(1), WarehouseId(1)).is_none());
    assert_eq!(
        s.stock_pair_row(ProductId(1), WarehouseId(2)).map(|r| r.id),
        Some(rec.id)
    );

    let err = s
        .stock_update_row(now, rec.id, stock(2, 2, 1, 1))
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { .. }));
}

#[test]
fn at_inventory_db_06_warehouse_status_and_search() {
    let mut s = seeded();
    let now = at("2024-05-01T10:00");
    s.warehouse_set_status_row(now, WarehouseId(2), RecordStatus::Inactive)
        .unwrap();
    assert_eq!(s.warehouse_rows_by_status(RecordStatus::Active).len(), 1);
    assert!(s.warehouse_search_rows("nor").is_empty());
    assert_eq!(s.warehouse_search_rows("CEN").len(), 1);

    let mut edit = warehouse("Central");
    edit.capacity = 2500;
    let updated = s
        .warehouse_update_row(now, WarehouseId(1), edit)
        .unwrap();
    assert_eq!(updated.capacity, 2500);
}
