#![forbid(unsafe_code)]

use std::path::PathBuf;

use stockroom_contracts::product::{ProductDraft, ProductId, ProductRecord};
use stockroom_contracts::purchase_order::{
    OrderLineDraft, OrderLineId, OrderStatus, OrderStatusSummary, PurchaseOrderDraft,
    PurchaseOrderHeader, PurchaseOrderId, PurchaseOrderRecord,
};
use stockroom_contracts::stock::{StockAdjustment, StockDraft, StockRecord, StockRecordId};
use stockroom_contracts::supplier::{SupplierDraft, SupplierId, SupplierRecord};
use stockroom_contracts::warehouse::{WarehouseDraft, WarehouseId, WarehouseRecord};
use stockroom_contracts::RecordStatus;
use stockroom_os::console::{BackendError, ConsoleBackend};
use stockroom_storage::repo::{
    ProductRepo, PurchaseOrderRepo, StockRepo, SupplierRepo, WarehouseRepo,
};
use stockroom_storage::store::{InventoryStore, StorageError};

use crate::api::{self, ApiError};
use crate::{local_now, month_start, CommandOutcome, InventoryRuntime, RuntimeError, StoreCommand};

/// Console backend over an in-process runtime, optionally journaled to disk.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    runtime: InventoryRuntime,
}

impl From<ApiError> for BackendError {
    fn from(err: ApiError) -> Self {
        BackendError {
            status: Some(err.status.as_u16()),
            message: err.message,
            errors: err.errors,
        }
    }
}

fn backend_err(err: impl Into<ApiError>) -> BackendError {
    let err: ApiError = err.into();
    err.into()
}

impl LocalBackend {
    pub fn new(runtime: InventoryRuntime) -> Self {
        Self { runtime }
    }

    pub fn open(tax_rate: rust_decimal::Decimal, journal_path: PathBuf) -> Result<Self, String> {
        InventoryRuntime::new_with_persistence(tax_rate, journal_path).map(Self::new)
    }

    pub fn runtime(&self) -> &InventoryRuntime {
        &self.runtime
    }

    fn rows<T: Clone>(
        &self,
        f: impl FnOnce(&InventoryStore) -> Vec<&T>,
    ) -> Result<Vec<T>, BackendError> {
        self.runtime
            .read(|s| f(s).into_iter().cloned().collect())
            .map_err(backend_err)
    }

    fn row<T: Clone>(
        &self,
        table: &'static str,
        key: impl ToString,
        f: impl FnOnce(&InventoryStore) -> Option<&T>,
    ) -> Result<T, BackendError> {
        self.runtime
            .read(|s| f(s).cloned())
            .map_err(backend_err)?
            .ok_or_else(|| {
                backend_err(StorageError::NotFound {
                    table,
                    key: key.to_string(),
                })
            })
    }

    fn run<T>(&self, command: StoreCommand) -> Result<T, BackendError>
    where
        T: TryFrom<CommandOutcome, Error = RuntimeError>,
    {
        let outcome = api::execute(&self.runtime, command)?;
        T::try_from(outcome).map_err(backend_err)
    }

    fn remove(&self, command: StoreCommand) -> Result<(), BackendError> {
        api::execute(&self.runtime, command)?;
        Ok(())
    }
}

impl ConsoleBackend for LocalBackend {
    fn list_products(&self) -> Result<Vec<ProductRecord>, BackendError> {
        self.rows(|s| s.product_rows())
    }

    fn get_product(&self, id: ProductId) -> Result<ProductRecord, BackendError> {
        self.row("products.id", id, |s| s.product_row(id))
    }

    fn search_products(&self, name: &str) -> Result<Vec<ProductRecord>, BackendError> {
        self.rows(|s| s.product_search_rows(name))
    }

    fn create_product(&self, draft: &ProductDraft) -> Result<ProductRecord, BackendError> {
        self.run(StoreCommand::ProductCreate {
            draft: draft.clone(),
        })
    }

    fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<ProductRecord, BackendError> {
        self.run(StoreCommand::ProductUpdate {
            id,
            draft: draft.clone(),
        })
    }

    fn set_product_status(
        &self,
        id: ProductId,
        status: RecordStatus,
    ) -> Result<ProductRecord, BackendError> {
        self.run(StoreCommand::ProductSetStatus { id, status })
    }

    fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
        self.remove(StoreCommand::ProductDelete { id })
    }

    fn list_suppliers(&self) -> Result<Vec<SupplierRecord>, BackendError> {
        self.rows(|s| s.supplier_rows())
    }

    fn get_supplier(&self, id: SupplierId) -> Result<SupplierRecord, BackendError> {
        self.row("suppliers.id", id, |s| s.supplier_row(id))
    }

    fn create_supplier(&self, draft: &SupplierDraft) -> Result<SupplierRecord, BackendError> {
        self.run(StoreCommand::SupplierCreate {
            draft: draft.clone(),
        })
    }

    fn update_supplier(
        &self,
        id: SupplierId,
        draft: &SupplierDraft,
    ) -> Result<SupplierRecord, BackendError> {
        self.run(StoreCommand::SupplierUpdate {
            id,
            draft: draft.clone(),
        })
    }

    fn set_supplier_status(
        &self,
        id: SupplierId,
        status: RecordStatus,
    ) -> Result<SupplierRecord, BackendError> {
        self.run(StoreCommand::SupplierSetStatus { id, status })
    }

    fn delete_supplier(&self, id: SupplierId) -> Result<(), BackendError> {
        self.remove(StoreCommand::SupplierDelete { id })
    }

    fn list_warehouses(&self) -> Result<Vec<WarehouseRecord>, BackendError> {
        self.rows(|s| s.warehouse_rows())
    }

    fn get_warehouse(&self, id: WarehouseId) -> Result<WarehouseRecord, BackendError> {
        self.row("warehouses.id", id, |s| s.warehouse_row(id))
    }

    fn create_warehouse(&self, draft: &WarehouseDraft) -> Result<WarehouseRecord, BackendError> {
        self.run(StoreCommand::WarehouseCreate {
            draft: draft.clone(),
        })
    }

    fn update_warehouse(
        &self,
        id: WarehouseId,
        draft: &WarehouseDraft,
    ) -> Result<WarehouseRecord, BackendError> {
        self.run(StoreCommand::WarehouseUpdate {
            id,
            draft: draft.clone(),
        })
    }

    fn set_warehouse_status(
        &self,
        id: WarehouseId,
        status: RecordStatus,
    ) -> Result<WarehouseRecord, BackendError> {
        self.run(StoreCommand::WarehouseSetStatus { id, status })
    }

    fn delete_warehouse(&self, id: WarehouseId) -> Result<(), BackendError> {
        self.remove(StoreCommand::WarehouseDelete { id })
    }

    fn list_stock(&self) -> Result<Vec<StockRecord>, BackendError> {
        self.rows(|s| s.stock_rows())
    }

    fn stock_by_warehouse(&self, id: WarehouseId) -> Result<Vec<StockRecord>, BackendError> {
        self.rows(|s| s.stock_rows_by_warehouse(id))
    }

    fn critical_stock(
        &self,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<StockRecord>, BackendError> {
        self.rows(|s| s.stock_critical_rows(warehouse_id))
    }

    fn create_stock(&self, draft: &StockDraft) -> Result<StockRecord, BackendError> {
        self.run(StoreCommand::StockCreate {
            draft: draft.clone(),
        })
    }

    fn update_stock(
        &self,
        id: StockRecordId,
        draft: &StockDraft,
    ) -> Result<StockRecord, BackendError> {
        self.run(StoreCommand::StockUpdate {
            id,
            draft: draft.clone(),
        })
    }

    fn adjust_stock(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        adjustment: StockAdjustment,
    ) -> Result<StockRecord, BackendError> {
        self.run(StoreCommand::StockAdjust {
            product_id,
            warehouse_id,
            adjustment,
        })
    }

    fn delete_stock(&self, id: StockRecordId) -> Result<(), BackendError> {
        self.remove(StoreCommand::StockDelete { id })
    }

    fn list_orders(&self) -> Result<Vec<PurchaseOrderRecord>, BackendError> {
        self.rows(|s| s.order_rows())
    }

    fn orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<PurchaseOrderRecord>, BackendError> {
        self.rows(|s| s.order_rows_by_status(status))
    }

    fn get_order(&self, id: PurchaseOrderId) -> Result<PurchaseOrderRecord, BackendError> {
        self.row("purchase_orders.id", id, |s| s.order_row(id))
    }

    fn create_order(
        &self,
        draft: &PurchaseOrderDraft,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.run(StoreCommand::OrderCreate {
            draft: draft.clone(),
        })
    }

    fn update_order(
        &self,
        id: PurchaseOrderId,
        header: &PurchaseOrderHeader,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.run(StoreCommand::OrderUpdate {
            id,
            header: header.clone(),
        })
    }

    fn delete_order(&self, id: PurchaseOrderId) -> Result<(), BackendError> {
        self.remove(StoreCommand::OrderDelete { id })
    }

    fn change_order_status(
        &self,
        id: PurchaseOrderId,
        to: OrderStatus,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.run(StoreCommand::OrderChangeStatus { id, to })
    }

    fn add_order_line(
        &self,
        id: PurchaseOrderId,
        line: &OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.run(StoreCommand::OrderLineAdd {
            id,
            line: line.clone(),
        })
    }

    fn update_order_line(
        &self,
        id: PurchaseOrderId,
        line_id: OrderLineId,
        line: &OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.run(StoreCommand::OrderLineUpdate {
            id,
            line_id,
            line: line.clone(),
        })
    }

    fn remove_order_line(
        &self,
        id: PurchaseOrderId,
        line_id: OrderLineId,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.run(StoreCommand::OrderLineRemove { id, line_id })
    }

    fn order_summary(&self) -> Result<OrderStatusSummary, BackendError> {
        let now = local_now();
        self.runtime
            .read(|s| s.order_status_summary_row(month_start(now), now))
            .map_err(backend_err)?
            .map_err(backend_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use stockroom_contracts::purchase_order::DEFAULT_TAX_RATE;
    use stockroom_os::console::ConsoleRuntime;

    fn backend() -> LocalBackend {
        LocalBackend::new(InventoryRuntime::new_in_memory(DEFAULT_TAX_RATE))
    }

    fn product(sku: &str) -> ProductDraft {
        ProductDraft {
            name: "Cemento gris".to_string(),
            sku: sku.to_string(),
            description: None,
            price: Decimal::new(850, 2),
            category: "Obra".to_string(),
            status: None,
        }
    }

    #[test]
    fn at_local_01_errors_carry_http_status_and_fields() {
        let b = backend();
        b.create_product(&product("CEM-1")).unwrap();
        let dup = b.create_product(&product("cem-1")).unwrap_err();
        assert_eq!(dup.status, Some(409));
        assert_eq!(dup.errors.get("sku").map(String::as_str), Some("already exists"));

        let missing = b.get_product(ProductId(42)).unwrap_err();
        assert!(missing.is_not_found());
    }

    #[test]
    fn at_local_02_console_completion_reduces_stock_through_local_backend() {
        let console = ConsoleRuntime::new(backend());
        let b = console.backend();
        let w = b
            .create_warehouse(&WarehouseDraft {
                name: "Central".to_string(),
                address: "Av. 1".to_string(),
                capacity: 500,
                status: None,
            })
            .unwrap();
        let p = b.create_product(&product("CEM-1")).unwrap();
        b.create_stock(&StockDraft {
            product_id: p.id,
            warehouse_id: w.id,
            quantity: 20,
            min_quantity: 5,
        })
        .unwrap();
        let order = b
            .create_order(&PurchaseOrderDraft {
                header: PurchaseOrderHeader {
                    supplier_id: SupplierId(1),
                    invoice_number: "FAC-1".to_string(),
                    issued_at: local_now(),
                    delivery_at: None,
                    notes: None,
                },
                lines: vec![OrderLineDraft {
                    product_id: p.id,
                    product_name: p.name.clone(),
                    quantity: 6,
                    unit_price: p.price,
                    discount_pct: Decimal::ZERO,
                }],
            })
            .unwrap();

        console
            .change_order_status(order.id, OrderStatus::InProgress)
            .unwrap();
        let change = console
            .change_order_status(order.id, OrderStatus::Completed)
            .unwrap();
        let report = change.completion.unwrap().unwrap();
        assert!(report.is_clean());
        let stock = b.list_stock().unwrap();
        assert_eq!(stock[0].quantity, 14);
    }
}
