#![forbid(unsafe_code)]

use chrono::NaiveDateTime;
use stockroom_contracts::parse_wire_datetime;
use stockroom_contracts::supplier::{SupplierDraft, SupplierId};
use stockroom_contracts::RecordStatus;
use stockroom_storage::repo::SupplierRepo;
use stockroom_storage::store::{InventoryStore, StorageError};

fn at(raw: &str) -> NaiveDateTime {
    parse_wire_datetime(raw).unwrap()
}

fn draft(name: &str, tax_id: &str, email: &str) -> SupplierDraft {
    SupplierDraft {
        name: name.to_string(),
        tax_id: tax_id.to_string(),
        contact: "Ana Perez".to_string(),
        email: email.to_string(),
        phone: Some("0998887766".to_string()),
        address: "Av. Amazonas 100".to_string(),
        status: None,
        notes: None,
    }
}

#[test]
fn at_suppliers_db_01_tax_id_and_email_are_unique() {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-01T10:00");
    s.supplier_create_row(now, draft("Acme", "1790012345001", "ventas@acme.com"))
        .unwrap();

    let err = s
        .supplier_create_row(now, draft("Beta", "1790012345001", "beta@beta.com"))
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { field: "nitRuc", .. }));

    let err = s
        .supplier_create_row(now, draft("Beta", "1790099999001", "VENTAS@acme.com"))
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { field: "email", .. }));
    assert_eq!(
        err.to_string(),
        "email 'VENTAS@acme.com' already exists"
    );
}

#[test]
fn at_suppliers_db_02_update_status_and_delete() {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-01T10:00");
    let a = s
        .supplier_create_row(now, draft("Acme", "1790012345001", "ventas@acme.com"))
        .unwrap();

    let mut edit = a.as_draft();
    edit.status = None;
    edit.contact = "Luis Mora".to_string();
    let updated = s
        .supplier_update_row(at("2024-05-03T08:00"), a.id, edit)
        .unwrap();
    assert_eq!(updated.contact, "Luis Mora");
    assert_eq!(updated.status, RecordStatus::Active);

    s.supplier_set_status_row(now, a.id, RecordStatus::Inactive)
        .unwrap();
    assert!(s.supplier_search_rows("acme").is_empty());
    assert_eq!(s.supplier_rows_by_status(RecordStatus::Inactive).len(), 1);
    assert_eq!(
        s.supplier_by_tax_id_row("1790012345001").map(|r| r.id),
        Some(a.id)
    );

    s.supplier_delete_row(a.id).unwrap();
    assert!(s.supplier_row(a.id).is_none());
    assert!(matches!(
        s.supplier_delete_row(SupplierId(1)),
        Err(StorageError::NotFound { .. })
    ));
}
