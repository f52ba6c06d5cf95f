#![forbid(unsafe_code)]

use std::fmt;

use tracing::{info, warn};

use stockroom_contracts::product::ProductId;
use stockroom_contracts::purchase_order::{OrderStatus, PurchaseOrderId, PurchaseOrderRecord};
use stockroom_contracts::warehouse::WarehouseId;

/// The slice of the inventory service the completion effect needs.
pub trait StockLedger {
    /// Warehouse ids as listed by the inventory service.
    fn warehouse_ids(&self) -> Result<Vec<WarehouseId>, String>;

    fn reduce_stock(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
    ) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEffect {
    pub product_id: ProductId,
    pub quantity: i64,
    pub outcome: Result<(), String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub order_id: PurchaseOrderId,
    pub warehouse_id: Option<WarehouseId>,
    pub lines: Vec<LineEffect>,
}

impl CompletionReport {
    pub fn applied(&self) -> impl Iterator<Item = &LineEffect> {
        self.lines.iter().filter(|l| l.outcome.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &LineEffect> {
        self.lines.iter().filter(|l| l.outcome.is_err())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    /// `product <id>: <message>` for every line that could not be applied.
    pub fn failure_messages(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|l| match &l.outcome {
                Err(msg) => Some(format!("product {}: {msg}", l.product_id)),
                Ok(()) => None,
            })
            .collect()
    }
}

impl fmt::Display for CompletionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(warehouse_id) = self.warehouse_id else {
            return write!(f, "order {} has no lines; stock unchanged", self.order_id);
        };
        let applied = self.applied().count();
        write!(
            f,
            "stock reduced for {applied} of {} lines in warehouse {warehouse_id}",
            self.lines.len()
        )?;
        for msg in self.failure_messages() {
            write!(f, "\n  {msg}")?;
        }
        Ok(())
    }
}

/// Reduces stock for every line of a completed order, in the lowest-id warehouse.
///
/// Line failures are collected and do not stop the remaining lines. The order status is
/// not touched here.
pub fn apply_completion_stock_effect<L: StockLedger + ?Sized>(
    ledger: &L,
    order: &PurchaseOrderRecord,
) -> Result<CompletionReport, String> {
    if order.status != OrderStatus::Completed {
        return Err(format!(
            "purchase order {} is {}; stock is only reduced for {} orders",
            order.id,
            order.status,
            OrderStatus::Completed
        ));
    }
    if order.lines.is_empty() {
        return Ok(CompletionReport {
            order_id: order.id,
            warehouse_id: None,
            lines: Vec::new(),
        });
    }

    let warehouse_id = ledger
        .warehouse_ids()
        .map_err(|e| format!("could not list warehouses: {e}"))?
        .into_iter()
        .min()
        .ok_or_else(|| "no warehouses available to reduce stock".to_string())?;

    let mut lines = Vec::with_capacity(order.lines.len());
    for line in &order.lines {
        let outcome = ledger.reduce_stock(line.product_id, warehouse_id, line.quantity);
        if let Err(msg) = &outcome {
            warn!(
                order_id = order.id.0,
                product_id = line.product_id.0,
                warehouse_id = warehouse_id.0,
                quantity = line.quantity,
                error = %msg,
                "completion stock reduction failed"
            );
        }
        lines.push(LineEffect {
            product_id: line.product_id,
            quantity: line.quantity,
            outcome,
        });
    }

    let report = CompletionReport {
        order_id: order.id,
        warehouse_id: Some(warehouse_id),
        lines,
    };
    info!(
        order_id = order.id.0,
        warehouse_id = warehouse_id.0,
        applied = report.applied().count(),
        failed = report.failures().count(),
        "completion stock effect applied"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;
    use stockroom_contracts::parse_wire_datetime;
    use stockroom_contracts::purchase_order::{
        OrderLine, OrderLineDraft, OrderLineId, PurchaseOrderHeader, DEFAULT_TAX_RATE,
    };
    use stockroom_contracts::supplier::SupplierId;

    struct FakeLedger {
        warehouses: Vec<WarehouseId>,
        stock: RefCell<BTreeMap<(ProductId, WarehouseId), i64>>,
    }

    impl StockLedger for FakeLedger {
        fn warehouse_ids(&self) -> Result<Vec<WarehouseId>, String> {
            Ok(self.warehouses.clone())
        }

        fn reduce_stock(
            &self,
            product_id: ProductId,
            warehouse_id: WarehouseId,
            quantity: i64,
        ) -> Result<(), String> {
            let mut stock = self.stock.borrow_mut();
            let Some(on_hand) = stock.get_mut(&(product_id, warehouse_id)) else {
                return Err("stock record not found".to_string());
            };
            if *on_hand < quantity {
                return Err(format!("insufficient stock: available {on_hand}"));
            }
            *on_hand -= quantity;
            Ok(())
        }
    }

    fn order(status: OrderStatus, lines: &[(u64, i64)]) -> PurchaseOrderRecord {
        let now = parse_wire_datetime("2024-05-01T10:00").unwrap();
        let lines = lines
            .iter()
            .enumerate()
            .map(|(i, (product, qty))| {
                OrderLine::v1(
                    OrderLineId(i as u64 + 1),
                    OrderLineDraft {
                        product_id: ProductId(*product),
                        product_name: format!("Producto {product}"),
                        quantity: *qty,
                        unit_price: Decimal::ONE,
                        discount_pct: Decimal::ZERO,
                    },
                )
                .unwrap()
            })
            .collect();
        let mut rec = PurchaseOrderRecord::v1(
            PurchaseOrderId(9),
            PurchaseOrderHeader {
                supplier_id: SupplierId(1),
                invoice_number: "FAC-9".to_string(),
                issued_at: now,
                delivery_at: None,
                notes: None,
            },
            lines,
            DEFAULT_TAX_RATE,
            now,
        )
        .unwrap();
        rec.status = status;
        rec
    }

    #[test]
    fn at_completion_01_uses_lowest_warehouse_and_keeps_going_after_failure() {
        let ledger = FakeLedger {
            warehouses: vec![WarehouseId(3), WarehouseId(2)],
            stock: RefCell::new(BTreeMap::from([
                ((ProductId(1), WarehouseId(2)), 10),
                ((ProductId(2), WarehouseId(2)), 1),
                ((ProductId(3), WarehouseId(2)), 7),
                ((ProductId(1), WarehouseId(3)), 99),
            ])),
        };
        let report = apply_completion_stock_effect(
            &ledger,
            &order(OrderStatus::Completed, &[(1, 4), (2, 5), (3, 7)]),
        )
        .unwrap();

        assert_eq!(report.warehouse_id, Some(WarehouseId(2)));
        assert_eq!(report.applied().count(), 2);
        assert_eq!(
            report.failure_messages(),
            vec!["product 2: insufficient stock: available 1".to_string()]
        );
        let stock = ledger.stock.borrow();
        assert_eq!(stock[&(ProductId(1), WarehouseId(2))], 6);
        assert_eq!(stock[&(ProductId(3), WarehouseId(2))], 0);
        assert_eq!(stock[&(ProductId(1), WarehouseId(3))], 99);
    }

    #[test]
    fn at_completion_02_no_lines_means_no_warehouse_lookup() {
        let ledger = FakeLedger {
            warehouses: Vec::new(),
            stock: RefCell::new(BTreeMap::new()),
        };
        let report =
            apply_completion_stock_effect(&ledger, &order(OrderStatus::Completed, &[])).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.warehouse_id, None);
    }

    #[test]
    fn at_completion_03_missing_warehouses_and_wrong_status_are_errors() {
        let ledger = FakeLedger {
            warehouses: Vec::new(),
            stock: RefCell::new(BTreeMap::new()),
        };
        let err = apply_completion_stock_effect(&ledger, &order(OrderStatus::Completed, &[(1, 1)]))
            .unwrap_err();
        assert_eq!(err, "no warehouses available to reduce stock");

        let err =
            apply_completion_stock_effect(&ledger, &order(OrderStatus::InProgress, &[(1, 1)]))
                .unwrap_err();
        assert!(err.contains("EN_PROCESO"));
    }
}
