#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use tracing::{info, warn};

use stockroom_contracts::product::{ProductDraft, ProductId, ProductRecord};
use stockroom_contracts::purchase_order::{
    OrderLineDraft, OrderLineId, OrderStatus, OrderStatusSummary, PurchaseOrderDraft,
    PurchaseOrderHeader, PurchaseOrderId, PurchaseOrderRecord, StatusTransitionError,
};
use stockroom_contracts::stock::{StockAdjustment, StockDraft, StockRecord, StockRecordId};
use stockroom_contracts::supplier::{SupplierDraft, SupplierId, SupplierRecord};
use stockroom_contracts::warehouse::{WarehouseDraft, WarehouseId, WarehouseRecord};
use stockroom_contracts::{field_errors, ContractViolation, RecordStatus, Validate};

use crate::completion::{apply_completion_stock_effect, CompletionReport, StockLedger};

/// Error reported by a backend service, or by the transport in front of it (`status: None`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub status: Option<u16>,
    pub message: String,
    pub errors: BTreeMap<String, String>,
}

impl BackendError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            errors: BTreeMap::new(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            errors: BTreeMap::new(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "[{code}] {}", self.message)?,
            None => write!(f, "{}", self.message)?,
        }
        for (field, msg) in &self.errors {
            write!(f, "\n  {field}: {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BackendError {}

/// The REST surface the console consumes, one method per backend route it uses.
pub trait ConsoleBackend {
    fn list_products(&self) -> Result<Vec<ProductRecord>, BackendError>;
    fn get_product(&self, id: ProductId) -> Result<ProductRecord, BackendError>;
    fn search_products(&self, name: &str) -> Result<Vec<ProductRecord>, BackendError>;
    fn create_product(&self, draft: &ProductDraft) -> Result<ProductRecord, BackendError>;
    fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<ProductRecord, BackendError>;
    fn set_product_status(
        &self,
        id: ProductId,
        status: RecordStatus,
    ) -> Result<ProductRecord, BackendError>;
    fn delete_product(&self, id: ProductId) -> Result<(), BackendError>;

    fn list_suppliers(&self) -> Result<Vec<SupplierRecord>, BackendError>;
    fn get_supplier(&self, id: SupplierId) -> Result<SupplierRecord, BackendError>;
    fn create_supplier(&self, draft: &SupplierDraft) -> Result<SupplierRecord, BackendError>;
    fn update_supplier(
        &self,
        id: SupplierId,
        draft: &SupplierDraft,
    ) -> Result<SupplierRecord, BackendError>;
    fn set_supplier_status(
        &self,
        id: SupplierId,
        status: RecordStatus,
    ) -> Result<SupplierRecord, BackendError>;
    fn delete_supplier(&self, id: SupplierId) -> Result<(), BackendError>;

    fn list_warehouses(&self) -> Result<Vec<WarehouseRecord>, BackendError>;
    fn get_warehouse(&self, id: WarehouseId) -> Result<WarehouseRecord, BackendError>;
    fn create_warehouse(&self, draft: &WarehouseDraft) -> Result<WarehouseRecord, BackendError>;
    fn update_warehouse(
        &self,
        id: WarehouseId,
        draft: &WarehouseDraft,
    ) -> Result<WarehouseRecord, BackendError>;
    fn set_warehouse_status(
        &self,
        id: WarehouseId,
        status: RecordStatus,
    ) -> Result<WarehouseRecord, BackendError>;
    fn delete_warehouse(&self, id: WarehouseId) -> Result<(), BackendError>;

    fn list_stock(&self) -> Result<Vec<StockRecord>, BackendError>;
    fn stock_by_warehouse(&self, id: WarehouseId) -> Result<Vec<StockRecord>, BackendError>;
    fn critical_stock(
        &self,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<StockRecord>, BackendError>;
    fn create_stock(&self, draft: &StockDraft) -> Result<StockRecord, BackendError>;
    fn update_stock(
        &self,
        id: StockRecordId,
        draft: &StockDraft,
    ) -> Result<StockRecord, BackendError>;
    fn adjust_stock(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        adjustment: StockAdjustment,
    ) -> Result<StockRecord, BackendError>;
    fn delete_stock(&self, id: StockRecordId) -> Result<(), BackendError>;

    fn list_orders(&self) -> Result<Vec<PurchaseOrderRecord>, BackendError>;
    fn orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<PurchaseOrderRecord>, BackendError>;
    fn get_order(&self, id: PurchaseOrderId) -> Result<PurchaseOrderRecord, BackendError>;
    fn create_order(&self, draft: &PurchaseOrderDraft)
        -> Result<PurchaseOrderRecord, BackendError>;
    fn update_order(
        &self,
        id: PurchaseOrderId,
        header: &PurchaseOrderHeader,
    ) -> Result<PurchaseOrderRecord, BackendError>;
    fn delete_order(&self, id: PurchaseOrderId) -> Result<(), BackendError>;
    fn change_order_status(
        &self,
        id: PurchaseOrderId,
        to: OrderStatus,
    ) -> Result<PurchaseOrderRecord, BackendError>;
    fn add_order_line(
        &self,
        id: PurchaseOrderId,
        line: &OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, BackendError>;
    fn update_order_line(
        &self,
        id: PurchaseOrderId,
        line_id: OrderLineId,
        line: &OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, BackendError>;
    fn remove_order_line(
        &self,
        id: PurchaseOrderId,
        line_id: OrderLineId,
    ) -> Result<PurchaseOrderRecord, BackendError>;
    fn order_summary(&self) -> Result<OrderStatusSummary, BackendError>;
}

/// Drives the completion effect through the inventory routes of a backend.
pub struct BackendStockLedger<'a, B: ?Sized>(pub &'a B);

impl<B: ConsoleBackend + ?Sized> StockLedger for BackendStockLedger<'_, B> {
    fn warehouse_ids(&self) -> Result<Vec<WarehouseId>, String> {
        self.0
            .list_warehouses()
            .map(|ws| ws.into_iter().map(|w| w.id).collect())
            .map_err(|e| e.to_string())
    }

    fn reduce_stock(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
    ) -> Result<(), String> {
        self.0
            .adjust_stock(product_id, warehouse_id, StockAdjustment::Reduce(quantity))
            .map(|_| ())
            .map_err(|e| e.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleError {
    /// Client-side validation failed; nothing was sent.
    Form(BTreeMap<String, String>),
    Transition(StatusTransitionError),
    Backend(BackendError),
}

impl From<BackendError> for ConsoleError {
    fn from(v: BackendError) -> Self {
        ConsoleError::Backend(v)
    }
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Form(errors) => {
                write!(f, "form has {} invalid field(s)", errors.len())?;
                for (field, msg) in errors {
                    write!(f, "\n  {field}: {msg}")?;
                }
                Ok(())
            }
            ConsoleError::Transition(e) => write!(f, "{e}"),
            ConsoleError::Backend(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ConsoleError {}

/// Result of a successful submit: the saved row and the refetched list.
#[derive(Debug, Clone, PartialEq)]
pub struct Submitted<T> {
    pub saved: T,
    pub list: Vec<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub order: PurchaseOrderRecord,
    pub from: OrderStatus,
    /// Present only when the order moved to COMPLETADA.
    pub completion: Option<Result<CompletionReport, String>>,
    /// The refetched list. A failed refetch does not undo the change or hide the report.
    pub orders: Result<Vec<PurchaseOrderRecord>, BackendError>,
}

fn check_form(violations: Vec<ContractViolation>) -> Result<(), ConsoleError> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ConsoleError::Form(field_errors(&violations)))
    }
}

/// Console page flows over any backend: validate, submit, refetch.
pub struct ConsoleRuntime<B> {
    backend: B,
}

impl<B: ConsoleBackend> ConsoleRuntime<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn save_product(
        &self,
        id: Option<ProductId>,
        draft: ProductDraft,
    ) -> Result<Submitted<ProductRecord>, ConsoleError> {
        let draft = draft.normalized();
        check_form(draft.violations())?;
        let saved = match id {
            Some(id) => self.backend.update_product(id, &draft)?,
            None => self.backend.create_product(&draft)?,
        };
        info!(product_id = saved.id.0, sku = %saved.sku, "product saved");
        Ok(Submitted {
            saved,
            list: self.backend.list_products()?,
        })
    }

    pub fn save_supplier(
        &self,
        id: Option<SupplierId>,
        draft: SupplierDraft,
    ) -> Result<Submitted<SupplierRecord>, ConsoleError> {
        let draft = draft.normalized();
        check_form(draft.violations())?;
        let saved = match id {
            Some(id) => self.backend.update_supplier(id, &draft)?,
            None => self.backend.create_supplier(&draft)?,
        };
        info!(supplier_id = saved.id.0, "supplier saved");
        Ok(Submitted {
            saved,
            list: self.backend.list_suppliers()?,
        })
    }

    pub fn save_warehouse(
        &self,
        id: Option<WarehouseId>,
        draft: WarehouseDraft,
    ) -> Result<Submitted<WarehouseRecord>, ConsoleError> {
        let draft = draft.normalized();
        check_form(draft.violations())?;
        let saved = match id {
            Some(id) => self.backend.update_warehouse(id, &draft)?,
            None => self.backend.create_warehouse(&draft)?,
        };
        info!(warehouse_id = saved.id.0, "warehouse saved");
        Ok(Submitted {
            saved,
            list: self.backend.list_warehouses()?,
        })
    }

    pub fn save_stock(
        &self,
        id: Option<StockRecordId>,
        draft: StockDraft,
    ) -> Result<Submitted<StockRecord>, ConsoleError> {
        check_form(draft.violations())?;
        let saved = match id {
            Some(id) => self.backend.update_stock(id, &draft)?,
            None => self.backend.create_stock(&draft)?,
        };
        info!(stock_id = saved.id.0, "stock record saved");
        Ok(Submitted {
            saved,
            list: self.backend.list_stock()?,
        })
    }

    pub fn adjust_stock(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        adjustment: StockAdjustment,
    ) -> Result<Submitted<StockRecord>, ConsoleError> {
        if let Err(v) = adjustment.validate() {
            return Err(ConsoleError::Form(field_errors(&[v])));
        }
        let saved = self
            .backend
            .adjust_stock(product_id, warehouse_id, adjustment)?;
        Ok(Submitted {
            saved,
            list: self.backend.list_stock()?,
        })
    }

    pub fn create_order(
        &self,
        draft: PurchaseOrderDraft,
    ) -> Result<Submitted<PurchaseOrderRecord>, ConsoleError> {
        check_form(draft.violations())?;
        let saved = self.backend.create_order(&draft)?;
        info!(
            order_id = saved.id.0,
            invoice = %saved.invoice_number,
            total = %saved.total,
            "purchase order created"
        );
        Ok(Submitted {
            saved,
            list: self.backend.list_orders()?,
        })
    }

    pub fn update_order(
        &self,
        id: PurchaseOrderId,
        header: PurchaseOrderHeader,
    ) -> Result<Submitted<PurchaseOrderRecord>, ConsoleError> {
        let header = header.normalized();
        check_form(header.violations())?;
        let saved = self.backend.update_order(id, &header)?;
        Ok(Submitted {
            saved,
            list: self.backend.list_orders()?,
        })
    }

    pub fn add_order_line(
        &self,
        id: PurchaseOrderId,
        line: OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, ConsoleError> {
        check_form(line.violations())?;
        Ok(self.backend.add_order_line(id, &line)?)
    }

    pub fn update_order_line(
        &self,
        id: PurchaseOrderId,
        line_id: OrderLineId,
        line: OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, ConsoleError> {
        check_form(line.violations())?;
        Ok(self.backend.update_order_line(id, line_id, &line)?)
    }

    pub fn remove_order_line(
        &self,
        id: PurchaseOrderId,
        line_id: OrderLineId,
    ) -> Result<PurchaseOrderRecord, ConsoleError> {
        Ok(self.backend.remove_order_line(id, line_id)?)
    }

    /// Moves an order along the state machine. The transition is checked locally before any
    /// request is sent; a move to COMPLETADA then reduces stock through the inventory service.
    pub fn change_order_status(
        &self,
        id: PurchaseOrderId,
        to: OrderStatus,
    ) -> Result<StatusChange, ConsoleError> {
        let current = self.backend.get_order(id)?;
        let from = current.status;
        if let Err(e) = from.transition_to(to) {
            warn!(
                order_id = id.0,
                from = from.as_str(),
                to = to.as_str(),
                "status change refused locally"
            );
            return Err(ConsoleError::Transition(e));
        }
        let order = self.backend.change_order_status(id, to)?;
        let completion = (to == OrderStatus::Completed)
            .then(|| apply_completion_stock_effect(&BackendStockLedger(&self.backend), &order));
        let orders = self.backend.list_orders();
        if let Err(e) = &orders {
            warn!(order_id = id.0, error = %e, "order list refetch failed after status change");
        }
        Ok(StatusChange {
            order,
            from,
            completion,
            orders,
        })
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::{Cell, RefCell};

    use chrono::NaiveDateTime;
    use stockroom_contracts::parse_wire_datetime;
    use stockroom_storage::repo::{
        ProductRepo, PurchaseOrderRepo, StockRepo, SupplierRepo, WarehouseRepo,
    };
    use stockroom_storage::store::{InventoryStore, StorageError};

    use super::*;
    use crate::purchasing::{PurchaseOrderOutcome, PurchaseOrderRequest, PurchaseOrderRuntime};

    /// In-process backend for runtime tests. Counts requests so tests can assert none were sent.
    #[derive(Default)]
    pub struct FakeBackend {
        pub store: RefCell<InventoryStore>,
        pub requests: RefCell<usize>,
        pub fail_list_orders: Cell<bool>,
    }

    fn now() -> NaiveDateTime {
        parse_wire_datetime("2024-05-15T12:00").unwrap_or_default()
    }

    fn err(e: StorageError) -> BackendError {
        let status = match e {
            StorageError::NotFound { .. } => 404,
            StorageError::DuplicateKey { .. } | StorageError::ForeignKeyViolation { .. } => 409,
            _ => 400,
        };
        BackendError::status(status, e.to_string())
    }

    fn missing(what: &str) -> BackendError {
        BackendError::status(404, format!("{what} not found"))
    }

    impl FakeBackend {
        fn tick(&self) {
            *self.requests.borrow_mut() += 1;
        }

        fn order(&self, req: PurchaseOrderRequest) -> Result<PurchaseOrderRecord, BackendError> {
            self.tick();
            match PurchaseOrderRuntime.run(&mut self.store.borrow_mut(), now(), req) {
                Ok(PurchaseOrderOutcome::Saved { order, .. }) => Ok(order),
                Ok(PurchaseOrderOutcome::Deleted { order_id, .. }) => {
                    Err(missing(&format!("order {order_id}")))
                }
                Err(e) => Err(err(e)),
            }
        }
    }

    impl ConsoleBackend for FakeBackend {
        fn list_products(&self) -> Result<Vec<ProductRecord>, BackendError> {
            self.tick();
            Ok(self.store.borrow().product_rows().into_iter().cloned().collect())
        }
        fn get_product(&self, id: ProductId) -> Result<ProductRecord, BackendError> {
            self.tick();
            self.store.borrow().product_row(id).cloned().ok_or_else(|| missing("product"))
        }
        fn search_products(&self, name: &str) -> Result<Vec<ProductRecord>, BackendError> {
            self.tick();
            Ok(self.store.borrow().product_search_rows(name).into_iter().cloned().collect())
        }
        fn create_product(&self, draft: &ProductDraft) -> Result<ProductRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().product_create_row(now(), draft.clone()).map_err(err)
        }
        fn update_product(
            &self,
            id: ProductId,
            draft: &ProductDraft,
        ) -> Result<ProductRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().product_update_row(now(), id, draft.clone()).map_err(err)
        }
        fn set_product_status(
            &self,
            id: ProductId,
            status: RecordStatus,
        ) -> Result<ProductRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().product_set_status_row(now(), id, status).map_err(err)
        }
        fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
            self.tick();
            self.store.borrow_mut().product_delete_row(id).map(|_| ()).map_err(err)
        }

        fn list_suppliers(&self) -> Result<Vec<SupplierRecord>, BackendError> {
            self.tick();
            Ok(self.store.borrow().supplier_rows().into_iter().cloned().collect())
        }
        fn get_supplier(&self, id: SupplierId) -> Result<SupplierRecord, BackendError> {
            self.tick();
            self.store.borrow().supplier_row(id).cloned().ok_or_else(|| missing("supplier"))
        }
        fn create_supplier(&self, draft: &SupplierDraft) -> Result<SupplierRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().supplier_create_row(now(), draft.clone()).map_err(err)
        }
        fn update_supplier(
            &self,
            id: SupplierId,
            draft: &SupplierDraft,
        ) -> Result<SupplierRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().supplier_update_row(now(), id, draft.clone()).map_err(err)
        }
        fn set_supplier_status(
            &self,
            id: SupplierId,
            status: RecordStatus,
        ) -> Result<SupplierRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().supplier_set_status_row(now(), id, status).map_err(err)
        }
        fn delete_supplier(&self, id: SupplierId) -> Result<(), BackendError> {
            self.tick();
            self.store.borrow_mut().supplier_delete_row(id).map(|_| ()).map_err(err)
        }

        fn list_warehouses(&self) -> Result<Vec<WarehouseRecord>, BackendError> {
            self.tick();
            Ok(self.store.borrow().warehouse_rows().into_iter().cloned().collect())
        }
        fn get_warehouse(&self, id: WarehouseId) -> Result<WarehouseRecord, BackendError> {
            self.tick();
            self.store.borrow().warehouse_row(id).cloned().ok_or_else(|| missing("warehouse"))
        }
        fn create_warehouse(
            &self,
            draft: &WarehouseDraft,
        ) -> Result<WarehouseRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().warehouse_create_row(now(), draft.clone()).map_err(err)
        }
        fn update_warehouse(
            &self,
            id: WarehouseId,
            draft: &WarehouseDraft,
        ) -> Result<WarehouseRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().warehouse_update_row(now(), id, draft.clone()).map_err(err)
        }
        fn set_warehouse_status(
            &self,
            id: WarehouseId,
            status: RecordStatus,
        ) -> Result<WarehouseRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().warehouse_set_status_row(now(), id, status).map_err(err)
        }
        fn delete_warehouse(&self, id: WarehouseId) -> Result<(), BackendError> {
            self.tick();
            self.store.borrow_mut().warehouse_delete_row(id).map(|_| ()).map_err(err)
        }

        fn list_stock(&self) -> Result<Vec<StockRecord>, BackendError> {
            self.tick();
            Ok(self.store.borrow().stock_rows().into_iter().cloned().collect())
        }
        fn stock_by_warehouse(&self, id: WarehouseId) -> Result<Vec<StockRecord>, BackendError> {
            self.tick();
            Ok(self.store.borrow().stock_rows_by_warehouse(id).into_iter().cloned().collect())
        }
        fn critical_stock(
            &self,
            warehouse_id: Option<WarehouseId>,
        ) -> Result<Vec<StockRecord>, BackendError> {
            self.tick();
            Ok(self
                .store
                .borrow()
                .stock_critical_rows(warehouse_id)
                .into_iter()
                .cloned()
                .collect())
        }
        fn create_stock(&self, draft: &StockDraft) -> Result<StockRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().stock_create_row(now(), draft.clone()).map_err(err)
        }
        fn update_stock(
            &self,
            id: StockRecordId,
            draft: &StockDraft,
        ) -> Result<StockRecord, BackendError> {
            self.tick();
            self.store.borrow_mut().stock_update_row(now(), id, draft.clone()).map_err(err)
        }
        fn adjust_stock(
            &self,
            product_id: ProductId,
            warehouse_id: WarehouseId,
            adjustment: StockAdjustment,
        ) -> Result<StockRecord, BackendError> {
            self.tick();
            self.store
                .borrow_mut()
                .stock_adjust_row(now(), product_id, warehouse_id, adjustment)
                .map_err(err)
        }
        fn delete_stock(&self, id: StockRecordId) -> Result<(), BackendError> {
            self.tick();
            self.store.borrow_mut().stock_delete_row(id).map(|_| ()).map_err(err)
        }

        fn list_orders(&self) -> Result<Vec<PurchaseOrderRecord>, BackendError> {
            self.tick();
            if self.fail_list_orders.get() {
                return Err(BackendError::transport("connection reset"));
            }
            Ok(self.store.borrow().order_rows().into_iter().cloned().collect())
        }
        fn orders_by_status(
            &self,
            status: OrderStatus,
        ) -> Result<Vec<PurchaseOrderRecord>, BackendError> {
            self.tick();
            Ok(self.store.borrow().order_rows_by_status(status).into_iter().cloned().collect())
        }
        fn get_order(&self, id: PurchaseOrderId) -> Result<PurchaseOrderRecord, BackendError> {
            self.tick();
            self.store.borrow().order_row(id).cloned().ok_or_else(|| missing("order"))
        }
        fn create_order(
            &self,
            draft: &PurchaseOrderDraft,
        ) -> Result<PurchaseOrderRecord, BackendError> {
            self.order(PurchaseOrderRequest::Create(draft.clone()))
        }
        fn update_order(
            &self,
            id: PurchaseOrderId,
            header: &PurchaseOrderHeader,
        ) -> Result<PurchaseOrderRecord, BackendError> {
            self.order(PurchaseOrderRequest::UpdateHeader {
                order_id: id,
                header: header.clone(),
            })
        }
        fn delete_order(&self, id: PurchaseOrderId) -> Result<(), BackendError> {
            self.tick();
            self.store.borrow_mut().order_delete_row(id).map(|_| ()).map_err(err)
        }
        fn change_order_status(
            &self,
            id: PurchaseOrderId,
            to: OrderStatus,
        ) -> Result<PurchaseOrderRecord, BackendError> {
            self.order(PurchaseOrderRequest::ChangeStatus { order_id: id, to })
        }
        fn add_order_line(
            &self,
            id: PurchaseOrderId,
            line: &OrderLineDraft,
        ) -> Result<PurchaseOrderRecord, BackendError> {
            self.order(PurchaseOrderRequest::AddLine {
                order_id: id,
                line: line.clone(),
            })
        }
        fn update_order_line(
            &self,
            id: PurchaseOrderId,
            line_id: OrderLineId,
            line: &OrderLineDraft,
        ) -> Result<PurchaseOrderRecord, BackendError> {
            self.order(PurchaseOrderRequest::UpdateLine {
                order_id: id,
                line_id,
                line: line.clone(),
            })
        }
        fn remove_order_line(
            &self,
            id: PurchaseOrderId,
            line_id: OrderLineId,
        ) -> Result<PurchaseOrderRecord, BackendError> {
            self.order(PurchaseOrderRequest::RemoveLine {
                order_id: id,
                line_id,
            })
        }
        fn order_summary(&self) -> Result<OrderStatusSummary, BackendError> {
            self.tick();
            let month_start = parse_wire_datetime("2024-05-01").unwrap_or_default();
            self.store.borrow().order_status_summary_row(month_start, now()).map_err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeBackend;
    use super::*;
    use rust_decimal::Decimal;
    use stockroom_contracts::parse_wire_datetime;

    fn product(name: &str, sku: &str) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            sku: sku.to_string(),
            description: None,
            price: Decimal::new(450, 2),
            category: "Obra".to_string(),
            status: None,
        }
    }

    fn seeded() -> ConsoleRuntime<FakeBackend> {
        let console = ConsoleRuntime::new(FakeBackend::default());
        for name in ["Bodega Sur", "Bodega Central"] {
            console
                .save_warehouse(
                    None,
                    WarehouseDraft {
                        name: name.to_string(),
                        address: "Av. 1".to_string(),
                        capacity: 100,
                        status: None,
                    },
                )
                .unwrap();
        }
        for (p, w, q) in [(1, 1, 20), (2, 1, 3), (1, 2, 50)] {
            console
                .save_stock(
                    None,
                    StockDraft {
                        product_id: ProductId(p),
                        warehouse_id: WarehouseId(w),
                        quantity: q,
                        min_quantity: 5,
                    },
                )
                .unwrap();
        }
        console
    }

    fn order_draft(lines: &[(u64, i64)]) -> PurchaseOrderDraft {
        PurchaseOrderDraft {
            header: PurchaseOrderHeader {
                supplier_id: SupplierId(1),
                invoice_number: "FAC-100".to_string(),
                issued_at: parse_wire_datetime("2024-05-10").unwrap(),
                delivery_at: None,
                notes: None,
            },
            lines: lines
                .iter()
                .map(|(p, q)| OrderLineDraft {
                    product_id: ProductId(*p),
                    product_name: format!("Producto {p}"),
                    quantity: *q,
                    unit_price: Decimal::new(1000, 2),
                    discount_pct: Decimal::ZERO,
                })
                .collect(),
        }
    }

    #[test]
    fn at_console_01_invalid_form_sends_nothing() {
        let console = ConsoleRuntime::new(FakeBackend::default());
        let err = console
            .save_product(None, product("ab", "bad sku"))
            .unwrap_err();
        let ConsoleError::Form(errors) = err else {
            panic!("expected form errors");
        };
        assert!(errors.contains_key("nombre"));
        assert!(errors.contains_key("sku"));
        assert_eq!(*console.backend().requests.borrow(), 0);
    }

    #[test]
    fn at_console_02_submit_refetches_list() {
        let console = ConsoleRuntime::new(FakeBackend::default());
        let first = console
            .save_product(None, product("Cemento", "CEM-01"))
            .unwrap();
        assert_eq!(first.list.len(), 1);
        let second = console
            .save_product(None, product("Arena", "ARE-01"))
            .unwrap();
        assert_eq!(second.list.len(), 2);

        let err = console
            .save_product(None, product("Grava", "cem-01"))
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Backend(ref e) if e.status == Some(409)));
    }

    #[test]
    fn at_console_03_local_precheck_blocks_illegal_transition() {
        let console = seeded();
        let order = console.create_order(order_draft(&[(1, 2)])).unwrap().saved;
        let before = *console.backend().requests.borrow();

        let err = console
            .change_order_status(order.id, OrderStatus::Completed)
            .unwrap_err();
        let ConsoleError::Transition(e) = err else {
            panic!("expected transition error");
        };
        assert_eq!((e.from, e.to), (OrderStatus::Pending, OrderStatus::Completed));
        // Only the get_order lookup went out.
        assert_eq!(*console.backend().requests.borrow(), before + 1);
    }

    #[test]
    fn at_console_04_completion_reduces_stock_in_first_warehouse() {
        let console = seeded();
        let order = console
            .create_order(order_draft(&[(1, 5), (2, 4)]))
            .unwrap()
            .saved;
        let started = console
            .change_order_status(order.id, OrderStatus::InProgress)
            .unwrap();
        assert!(started.completion.is_none());

        let done = console
            .change_order_status(order.id, OrderStatus::Completed)
            .unwrap();
        assert_eq!(done.order.status, OrderStatus::Completed);
        assert_eq!(done.from, OrderStatus::InProgress);
        let report = done.completion.unwrap().unwrap();
        assert_eq!(report.warehouse_id, Some(WarehouseId(1)));
        assert_eq!(report.failure_messages().len(), 1);
        assert!(report.failure_messages()[0].starts_with("product 2: insufficient stock"));

        let stock = console.backend().list_stock().unwrap();
        let qty = |p: u64, w: u64| {
            stock
                .iter()
                .find(|s| s.product_id == ProductId(p) && s.warehouse_id == WarehouseId(w))
                .map(|s| s.quantity)
        };
        assert_eq!(qty(1, 1), Some(15));
        assert_eq!(qty(2, 1), Some(3));
        assert_eq!(qty(1, 2), Some(50));
    }

    #[test]
    fn at_console_05_adjustment_amount_checked_before_submit() {
        let console = seeded();
        let before = *console.backend().requests.borrow();
        let err = console
            .adjust_stock(ProductId(1), WarehouseId(1), StockAdjustment::Add(0))
            .unwrap_err();
        assert!(matches!(err, ConsoleError::Form(ref e) if e.contains_key("cantidad")));
        assert_eq!(*console.backend().requests.borrow(), before);
    }

    #[test]
    fn at_console_06_failed_refetch_keeps_completion_report() {
        let console = seeded();
        let order = console.create_order(order_draft(&[(1, 5)])).unwrap().saved;
        let started = console
            .change_order_status(order.id, OrderStatus::InProgress)
            .unwrap();
        assert_eq!(started.orders.unwrap().len(), 1);

        console.backend().fail_list_orders.set(true);
        let done = console
            .change_order_status(order.id, OrderStatus::Completed)
            .unwrap();
        assert_eq!(done.order.status, OrderStatus::Completed);
        let report = done.completion.unwrap().unwrap();
        assert_eq!(report.warehouse_id, Some(WarehouseId(1)));
        assert!(report.failure_messages().is_empty());
        assert!(matches!(done.orders, Err(ref e) if e.status.is_none()));

        console.backend().fail_list_orders.set(false);
        let stock = console.backend().stock_by_warehouse(WarehouseId(1)).unwrap();
        let cement = stock.iter().find(|s| s.product_id == ProductId(1)).unwrap();
        assert_eq!(cement.quantity, 15);
    }
}
