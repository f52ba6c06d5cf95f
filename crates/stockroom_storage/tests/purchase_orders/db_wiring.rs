#![forbid(unsafe_code)]

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use stockroom_contracts::parse_wire_datetime;
use stockroom_contracts::product::ProductId;
use stockroom_contracts::purchase_order::{
    OrderLineDraft, OrderLineId, OrderStatus, PurchaseOrderDraft, PurchaseOrderHeader,
};
use stockroom_contracts::supplier::SupplierId;
use stockroom_contracts::ReasonCodeId;
use stockroom_storage::repo::PurchaseOrderRepo;
use stockroom_storage::store::{InventoryStore, StorageError};

const CREATED: ReasonCodeId = ReasonCodeId(0x5000_0001);
const MOVED: ReasonCodeId = ReasonCodeId(0x5000_0002);

fn at(raw: &str) -> NaiveDateTime {
    parse_wire_datetime(raw).unwrap()
}

fn line(product: u64, qty: i64, cents: i64) -> OrderLineDraft {
    OrderLineDraft {
        product_id: ProductId(product),
        product_name: format!("Producto {product}"),
        quantity: qty,
        unit_price: Decimal::new(cents, 2),
        discount_pct: Decimal::ZERO,
    }
}

fn header(invoice: &str, supplier: u64, issued: &str) -> PurchaseOrderHeader {
    PurchaseOrderHeader {
        supplier_id: SupplierId(supplier),
        invoice_number: invoice.to_string(),
        issued_at: at(issued),
        delivery_at: None,
        notes: None,
    }
}

fn order(invoice: &str, supplier: u64, issued: &str) -> PurchaseOrderDraft {
    PurchaseOrderDraft {
        header: header(invoice, supplier, issued),
        lines: vec![line(1, 10, 250), line(2, 1, 1000)],
    }
}

#[test]
fn at_orders_db_01_create_forces_pending_and_computes_totals() {
    let mut s = InventoryStore::new_in_memory();
    let rec = s
        .order_create_row(at("2024-05-01T10:00"), order("FAC-1", 1, "2024-05-01"), CREATED)
        .unwrap();
    assert_eq!(rec.status, OrderStatus::Pending);
    assert_eq!(rec.subtotal, Decimal::new(3500, 2));
    assert_eq!(rec.tax, Decimal::new(420, 2));
    assert_eq!(rec.total, Decimal::new(3920, 2));
    assert_eq!(rec.lines[0].id, OrderLineId(1));
    assert_eq!(rec.lines[1].id, OrderLineId(2));

    let events = s.order_status_event_rows(rec.id);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].from_status, None);
    assert_eq!(events[0].to_status, OrderStatus::Pending);
    assert_eq!(events[0].reason_code, CREATED);
}

#[test]
fn at_orders_db_02_invoice_number_unique() {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-01T10:00");
    s.order_create_row(now, order("FAC-1", 1, "2024-05-01"), CREATED)
        .unwrap();
    assert!(s.invoice_number_exists_row("FAC-1"));
    assert!(!s.invoice_number_exists_row("FAC-2"));

    let err = s
        .order_create_row(now, order(" FAC-1 ", 2, "2024-05-01"), CREATED)
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { field: "numeroFactura", .. }));
    assert_eq!(s.order_rows().len(), 1);

    let second = s
        .order_create_row(now, order("FAC-2", 2, "2024-05-01"), CREATED)
        .unwrap();
    assert_eq!(second.lines[0].id, OrderLineId(3));
}

#[test]
fn at_orders_db_03_transition_graph_enforced_and_logged() {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-01T10:00");
    let rec = s
        .order_create_row(now, order("FAC-1", 1, "2024-05-01"), CREATED)
        .unwrap();

    assert!(!s.order_can_transition_row(rec.id, OrderStatus::Completed).unwrap());
    let err = s
        .order_change_status_row(now, rec.id, OrderStatus::Completed, MOVED)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot change purchase order status from PENDIENTE to COMPLETADA: move the order to EN_PROCESO first"
    );
    assert_eq!(s.order_row(rec.id).unwrap().status, OrderStatus::Pending);

    s.order_change_status_row(now, rec.id, OrderStatus::InProgress, MOVED)
        .unwrap();
    let done = s
        .order_change_status_row(at("2024-05-02T10:00"), rec.id, OrderStatus::Completed, MOVED)
        .unwrap();
    assert_eq!(done.status, OrderStatus::Completed);
    assert_eq!(done.updated_at, at("2024-05-02T10:00"));

    let err = s
        .order_change_status_row(now, rec.id, OrderStatus::Cancelled, MOVED)
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidTransition(_)));

    let trail: Vec<_> = s
        .order_status_event_rows(rec.id)
        .into_iter()
        .map(|e| (e.from_status, e.to_status))
        .collect();
    assert_eq!(
        trail,
        vec![
            (None, OrderStatus::Pending),
            (Some(OrderStatus::Pending), OrderStatus::InProgress),
            (Some(OrderStatus::InProgress), OrderStatus::Completed),
        ]
    );
}

#[test]
fn at_orders_db_04_lines_lock_outside_pending_but_header_stays_editable() {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-01T10:00");
    let rec = s
        .order_create_row(now, order("FAC-1", 1, "2024-05-01"), CREATED)
        .unwrap();

    let with_line = s
        .order_add_line_row(now, rec.id, line(3, 2, 500))
        .unwrap();
    assert_eq!(with_line.lines.len(), 3);
    assert_eq!(with_line.subtotal, Decimal::new(4500, 2));
    assert_eq!(with_line.total, Decimal::new(5040, 2));

    let edited = s
        .order_update_line_row(now, rec.id, OrderLineId(1), line(1, 1, 250))
        .unwrap();
    assert_eq!(edited.subtotal, Decimal::new(2250, 2));

    let trimmed = s
        .order_remove_line_row(now, rec.id, OrderLineId(2))
        .unwrap();
    assert_eq!(trimmed.lines.len(), 2);

    let mut h = header("FAC-1B", 4, "2024-05-03");
    h.notes = Some("entregar en bodega norte".to_string());
    let updated = s.order_update_header_row(now, rec.id, h).unwrap();
    assert_eq!(updated.invoice_number, "FAC-1B");
    assert_eq!(updated.status, OrderStatus::Pending);

    s.order_change_status_row(now, rec.id, OrderStatus::Cancelled, MOVED)
        .unwrap();
    let locked = StorageError::OrderLocked {
        order_id: rec.id,
        status: OrderStatus::Cancelled,
    };
    assert_eq!(
        s.order_add_line_row(now, rec.id, line(9, 1, 100)).unwrap_err(),
        locked
    );
    assert_eq!(s.order_delete_row(rec.id).unwrap_err(), locked);

    let late = s
        .order_update_header_row(now, rec.id, header("FAC-9", 1, "2024-05-01"))
        .unwrap();
    assert_eq!(late.invoice_number, "FAC-9");
    assert_eq!(late.status, OrderStatus::Cancelled);
    assert_eq!(late.lines.len(), 2);
}

#[test]
fn at_orders_db_05_last_line_cannot_be_removed() {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-01T10:00");
    let rec = s
        .order_create_row(
            now,
            PurchaseOrderDraft {
                header: header("FAC-1", 1, "2024-05-01"),
                lines: vec![line(1, 1, 100)],
            },
            CREATED,
        )
        .unwrap();
    let err = s
        .order_remove_line_row(now, rec.id, OrderLineId(1))
        .unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(ref v) if v.field() == "detalles"));
    let err = s
        .order_remove_line_row(now, rec.id, OrderLineId(77))
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[test]
fn at_orders_db_06_reporting_queries() {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-20T10:00");
    let a = s
        .order_create_row(now, order("FAC-A1", 1, "2024-04-28"), CREATED)
        .unwrap();
    let b = s
        .order_create_row(now, order("FAC-A2", 1, "2024-05-02"), CREATED)
        .unwrap();
    s.order_create_row(now, order("FAC-B1", 2, "2024-05-10"), CREATED)
        .unwrap();
    s.order_change_status_row(now, b.id, OrderStatus::InProgress, MOVED)
        .unwrap();

    assert_eq!(s.order_rows_by_supplier(SupplierId(1)).len(), 2);
    assert_eq!(
        s.order_total_by_supplier_row(SupplierId(1)).unwrap(),
        a.total + b.total
    );
    assert_eq!(s.order_rows_by_status(OrderStatus::Pending).len(), 2);
    assert_eq!(s.order_count_by_status_row(OrderStatus::InProgress), 1);
    assert_eq!(s.order_rows_by_invoice_fragment("fac-a").len(), 2);

    let month_start = at("2024-05-01");
    assert_eq!(s.order_rows_issued_between(month_start, now).len(), 2);
    let summary = s.order_status_summary_row(month_start, now).unwrap();
    assert_eq!(summary.pending, 2);
    assert_eq!(summary.in_progress, 1);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.month_total, Decimal::new(7840, 2));
}

#[test]
fn at_orders_db_07_delete_pending_keeps_status_history() {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-01T10:00");
    let rec = s
        .order_create_row(now, order("FAC-1", 1, "2024-05-01"), CREATED)
        .unwrap();
    s.order_delete_row(rec.id).unwrap();
    assert!(s.order_row(rec.id).is_none());
    assert!(!s.invoice_number_exists_row("FAC-1"));
    assert_eq!(s.order_status_event_rows(rec.id).len(), 1);
    assert!(matches!(
        s.order_can_transition_row(rec.id, OrderStatus::InProgress),
        Err(StorageError::NotFound { .. })
    ));
}

// Two of these fit in an order subtotal, but not once tax is added.
fn big_line(product: u64) -> OrderLineDraft {
    OrderLineDraft {
        unit_price: Decimal::new(4_900_000_000_000, 0),
        ..line(product, 1, 100)
    }
}

#[test]
fn at_orders_db_08_line_add_that_overflows_total_leaves_order_untouched() {
    let mut s = InventoryStore::new_in_memory();
    let now = at("2024-05-01T10:00");
    let rec = s
        .order_create_row(
            now,
            PurchaseOrderDraft {
                header: header("FAC-BIG", 1, "2024-05-01"),
                lines: vec![big_line(1)],
            },
            CREATED,
        )
        .unwrap();

    let err = s
        .order_add_line_row(at("2024-05-02T10:00"), rec.id, big_line(2))
        .unwrap_err();
    assert!(matches!(err, StorageError::ContractViolation(ref v) if v.field() == "total"));
    assert_eq!(s.order_row(rec.id), Some(&rec));

    let small = s
        .order_create_row(now, order("FAC-2", 1, "2024-05-01"), CREATED)
        .unwrap();
    let grown = s
        .order_add_line_row(now, small.id, line(4, 1, 100))
        .unwrap();
    assert_eq!(grown.lines.last().unwrap().id, OrderLineId(4));
}
