#![forbid(unsafe_code)]

use tracing::warn;

use stockroom_contracts::dashboard::DashboardSummary;
use stockroom_contracts::product::ProductRecord;
use stockroom_contracts::purchase_order::{OrderStatus, PurchaseOrderRecord};
use stockroom_contracts::stock::StockRecord;
use stockroom_contracts::supplier::SupplierRecord;
use stockroom_contracts::warehouse::WarehouseRecord;
use stockroom_contracts::RecordStatus;

use crate::console::{BackendError, ConsoleBackend};

/// Dashboard counters plus the services that could not be reached while collecting them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DashboardSnapshot {
    pub summary: DashboardSummary,
    pub errors: Vec<String>,
}

pub fn summarize(
    products: &[ProductRecord],
    suppliers: &[SupplierRecord],
    warehouses: &[WarehouseRecord],
    orders: &[PurchaseOrderRecord],
    critical_stock: &[StockRecord],
) -> DashboardSummary {
    DashboardSummary {
        total_products: products.len() as u64,
        total_suppliers: suppliers.len() as u64,
        total_warehouses: warehouses.len() as u64,
        total_orders: orders.len() as u64,
        critical_stock: critical_stock.len() as u64,
        pending_orders: orders
            .iter()
            .filter(|o| o.status == OrderStatus::Pending)
            .count() as u64,
        active_products: products
            .iter()
            .filter(|p| p.status == RecordStatus::Active)
            .count() as u64,
        active_suppliers: suppliers
            .iter()
            .filter(|s| s.status == RecordStatus::Active)
            .count() as u64,
        active_warehouses: warehouses
            .iter()
            .filter(|w| w.status == RecordStatus::Active)
            .count() as u64,
    }
}

fn or_empty<T>(
    errors: &mut Vec<String>,
    service: &str,
    res: Result<Vec<T>, BackendError>,
) -> Vec<T> {
    match res {
        Ok(v) => v,
        Err(e) => {
            warn!(service, error = %e, "dashboard source unavailable");
            errors.push(format!("{service}: {e}"));
            Vec::new()
        }
    }
}

/// Collects the summary from each service's list routes. A service that fails counts as empty.
pub fn collect_dashboard<B: ConsoleBackend + ?Sized>(backend: &B) -> DashboardSnapshot {
    let mut errors = Vec::new();
    let products = or_empty(&mut errors, "products", backend.list_products());
    let suppliers = or_empty(&mut errors, "suppliers", backend.list_suppliers());
    let warehouses = or_empty(&mut errors, "warehouses", backend.list_warehouses());
    let orders = or_empty(&mut errors, "purchase orders", backend.list_orders());
    let critical = or_empty(&mut errors, "stock", backend.critical_stock(None));
    DashboardSnapshot {
        summary: summarize(&products, &suppliers, &warehouses, &orders, &critical),
        errors,
    }
}
