#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use stockroom_contracts::product::{ProductDraft, ProductId, ProductRecord};
use stockroom_contracts::purchase_order::{
    checked_sum, OrderLine, OrderLineDraft, OrderLineId, OrderStatus, OrderStatusSummary,
    PurchaseOrderDraft, PurchaseOrderHeader, PurchaseOrderId, PurchaseOrderRecord,
    StatusTransitionError, DEFAULT_TAX_RATE,
};
use stockroom_contracts::stock::{StockAdjustment, StockDraft, StockRecord, StockRecordId};
use stockroom_contracts::supplier::{SupplierDraft, SupplierId, SupplierRecord};
use stockroom_contracts::warehouse::{WarehouseDraft, WarehouseId, WarehouseRecord};
use stockroom_contracts::{
    ContractViolation, ReasonCodeId, RecordStatus, SchemaVersion, Validate,
};

pub const ORDER_STATUS_EVENT_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    NotFound {
        table: &'static str,
        key: String,
    },
    ForeignKeyViolation {
        table: &'static str,
        key: String,
    },
    DuplicateKey {
        table: &'static str,
        field: &'static str,
        key: String,
    },
    InvalidTransition(StatusTransitionError),
    OrderLocked {
        order_id: PurchaseOrderId,
        status: OrderStatus,
    },
    InsufficientStock {
        product_id: ProductId,
        warehouse_id: WarehouseId,
        available: i64,
        requested: i64,
    },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

impl From<StatusTransitionError> for StorageError {
    fn from(v: StatusTransitionError) -> Self {
        StorageError::InvalidTransition(v)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound { table, key } => write!(f, "{table} not found: {key}"),
            StorageError::ForeignKeyViolation { table, key } => {
                write!(f, "reference violation on {table}: {key}")
            }
            StorageError::DuplicateKey { field, key, .. } => {
                write!(f, "{field} '{key}' already exists")
            }
            StorageError::InvalidTransition(err) => write!(f, "{err}"),
            StorageError::OrderLocked { order_id, status } => write!(
                f,
                "purchase order {order_id} is {status}; only {} orders can be modified",
                OrderStatus::Pending
            ),
            StorageError::InsufficientStock {
                product_id,
                warehouse_id,
                available,
                requested,
            } => write!(
                f,
                "insufficient stock for product {product_id} in warehouse {warehouse_id}: available {available}, requested {requested}"
            ),
            StorageError::ContractViolation(v) => write!(f, "{v}"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStatusEventRecord {
    pub schema_version: SchemaVersion,
    pub event_id: u64,
    pub order_id: PurchaseOrderId,
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub reason_code: ReasonCodeId,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct InventoryStore {
    products: BTreeMap<ProductId, ProductRecord>,
    next_product_id: u64,

    suppliers: BTreeMap<SupplierId, SupplierRecord>,
    next_supplier_id: u64,

    warehouses: BTreeMap<WarehouseId, WarehouseRecord>,
    next_warehouse_id: u64,

    stock_records: BTreeMap<StockRecordId, StockRecord>,
    // (product_id, warehouse_id) -> stock record; one record per pair.
    stock_pair_index: BTreeMap<(ProductId, WarehouseId), StockRecordId>,
    next_stock_record_id: u64,

    purchase_orders: BTreeMap<PurchaseOrderId, PurchaseOrderRecord>,
    next_purchase_order_id: u64,
    next_order_line_id: u64,

    // Append-only status history for purchase orders.
    order_status_events: Vec<OrderStatusEventRecord>,
    next_order_status_event_id: u64,

    tax_rate: Decimal,
}

impl Default for InventoryStore {
    fn default() -> Self {
        Self::new_in_memory()
    }
}

fn eq_ci(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(&needle.trim().to_lowercase())
}

impl InventoryStore {
    pub fn new_in_memory() -> Self {
        Self::with_tax_rate(DEFAULT_TAX_RATE)
    }

    pub fn with_tax_rate(tax_rate: Decimal) -> Self {
        Self {
            products: BTreeMap::new(),
            next_product_id: 1,
            suppliers: BTreeMap::new(),
            next_supplier_id: 1,
            warehouses: BTreeMap::new(),
            next_warehouse_id: 1,
            stock_records: BTreeMap::new(),
            stock_pair_index: BTreeMap::new(),
            next_stock_record_id: 1,
            purchase_orders: BTreeMap::new(),
            next_purchase_order_id: 1,
            next_order_line_id: 1,
            order_status_events: Vec::new(),
            next_order_status_event_id: 1,
            tax_rate,
        }
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    // ------------------------------------------------------------------
    // Products
    // ------------------------------------------------------------------

    fn ensure_product_unique(
        &self,
        draft: &ProductDraft,
        exclude: Option<ProductId>,
    ) -> Result<(), StorageError> {
        for p in self.products.values() {
            if Some(p.id) == exclude {
                continue;
            }
            if eq_ci(&p.sku, &draft.sku) {
                return Err(StorageError::DuplicateKey {
                    table: "products.sku",
                    field: "sku",
                    key: draft.sku.trim().to_string(),
                });
            }
            if eq_ci(&p.name, &draft.name) {
                return Err(StorageError::DuplicateKey {
                    table: "products.name",
                    field: "nombre",
                    key: draft.name.trim().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn product_create(
        &mut self,
        now: NaiveDateTime,
        draft: ProductDraft,
    ) -> Result<ProductRecord, StorageError> {
        draft.validate()?;
        self.ensure_product_unique(&draft, None)?;
        let id = ProductId::new(self.next_product_id)?;
        let rec = ProductRecord::v1(id, draft, now)?;
        self.products.insert(id, rec.clone());
        self.next_product_id += 1;
        Ok(rec)
    }

    pub fn product_get(&self, id: ProductId) -> Option<&ProductRecord> {
        self.products.get(&id)
    }

    fn product_required(&self, id: ProductId) -> Result<&ProductRecord, StorageError> {
        self.products.get(&id).ok_or(StorageError::NotFound {
            table: "products.id",
            key: id.to_string(),
        })
    }

    pub fn product_by_sku(&self, sku: &str) -> Option<&ProductRecord> {
        self.products.values().find(|p| eq_ci(&p.sku, sku))
    }

    pub fn products(&self) -> Vec<&ProductRecord> {
        self.products.values().collect()
    }

    pub fn products_by_category(&self, category: &str) -> Vec<&ProductRecord> {
        self.products
            .values()
            .filter(|p| eq_ci(&p.category, category))
            .collect()
    }

    pub fn products_by_status(&self, status: RecordStatus) -> Vec<&ProductRecord> {
        self.products
            .values()
            .filter(|p| p.status == status)
            .collect()
    }

    /// Case-insensitive name search over active products only.
    pub fn products_search(&self, name: &str) -> Vec<&ProductRecord> {
        self.products
            .values()
            .filter(|p| p.status == RecordStatus::Active && contains_ci(&p.name, name))
            .collect()
    }

    pub fn product_update(
        &mut self,
        now: NaiveDateTime,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<ProductRecord, StorageError> {
        draft.validate()?;
        let updated = self.product_required(id)?.with_update(draft.clone(), now)?;
        self.ensure_product_unique(&draft, Some(id))?;
        self.products.insert(id, updated.clone());
        Ok(updated)
    }

    pub fn product_set_status(
        &mut self,
        now: NaiveDateTime,
        id: ProductId,
        status: RecordStatus,
    ) -> Result<ProductRecord, StorageError> {
        let rec = self.products.get_mut(&id).ok_or(StorageError::NotFound {
            table: "products.id",
            key: id.to_string(),
        })?;
        rec.status = status;
        rec.updated_at = now.max(rec.created_at);
        Ok(rec.clone())
    }

    pub fn product_delete(&mut self, id: ProductId) -> Result<ProductRecord, StorageError> {
        self.products.remove(&id).ok_or(StorageError::NotFound {
            table: "products.id",
            key: id.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Suppliers
    // ------------------------------------------------------------------

    fn ensure_supplier_unique(
        &self,
        draft: &SupplierDraft,
        exclude: Option<SupplierId>,
    ) -> Result<(), StorageError> {
        for s in self.suppliers.values() {
            if Some(s.id) == exclude {
                continue;
            }
            if eq_ci(&s.tax_id, &draft.tax_id) {
                return Err(StorageError::DuplicateKey {
                    table: "suppliers.tax_id",
                    field: "nitRuc",
                    key: draft.tax_id.trim().to_string(),
                });
            }
            if eq_ci(&s.email, &draft.email) {
                return Err(StorageError::DuplicateKey {
                    table: "suppliers.email",
                    field: "email",
                    key: draft.email.trim().to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn supplier_create(
        &mut self,
        now: NaiveDateTime,
        draft: SupplierDraft,
    ) -> Result<SupplierRecord, StorageError> {
        draft.validate()?;
        self.ensure_supplier_unique(&draft, None)?;
        let id = SupplierId::new(self.next_supplier_id)?;
        let rec = SupplierRecord::v1(id, draft, now)?;
        self.suppliers.insert(id, rec.clone());
        self.next_supplier_id += 1;
        Ok(rec)
    }

    pub fn supplier_get(&self, id: SupplierId) -> Option<&SupplierRecord> {
        self.suppliers.get(&id)
    }

    pub fn supplier_by_tax_id(&self, tax_id: &str) -> Option<&SupplierRecord> {
        self.suppliers.values().find(|s| eq_ci(&s.tax_id, tax_id))
    }

    pub fn suppliers(&self) -> Vec<&SupplierRecord> {
        self.suppliers.values().collect()
    }

    pub fn suppliers_by_status(&self, status: RecordStatus) -> Vec<&SupplierRecord> {
        self.suppliers
            .values()
            .filter(|s| s.status == status)
            .collect()
    }

    pub fn suppliers_search(&self, name: &str) -> Vec<&SupplierRecord> {
        self.suppliers
            .values()
            .filter(|s| s.status == RecordStatus::Active && contains_ci(&s.name, name))
            .collect()
    }

    pub fn supplier_update(
        &mut self,
        now: NaiveDateTime,
        id: SupplierId,
        draft: SupplierDraft,
    ) -> Result<SupplierRecord, StorageError> {
        draft.validate()?;
        let current = self.suppliers.get(&id).ok_or(StorageError::NotFound {
            table: "suppliers.id",
            key: id.to_string(),
        })?;
        let updated = current.with_update(draft.clone(), now)?;
        self.ensure_supplier_unique(&draft, Some(id))?;
        self.suppliers.insert(id, updated.clone());
        Ok(updated)
    }

    pub fn supplier_set_status(
        &mut self,
        now: NaiveDateTime,
        id: SupplierId,
        status: RecordStatus,
    ) -> Result<SupplierRecord, StorageError> {
        let rec = self.suppliers.get_mut(&id).ok_or(StorageError::NotFound {
            table: "suppliers.id",
            key: id.to_string(),
        })?;
        rec.status = status;
        rec.updated_at = now.max(rec.created_at);
        Ok(rec.clone())
    }

    pub fn supplier_delete(&mut self, id: SupplierId) -> Result<SupplierRecord, StorageError> {
        self.suppliers.remove(&id).ok_or(StorageError::NotFound {
            table: "suppliers.id",
            key: id.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Warehouses
    // ------------------------------------------------------------------

    fn ensure_warehouse_unique(
        &self,
        draft: &WarehouseDraft,
        exclude: Option<WarehouseId>,
    ) -> Result<(), StorageError> {
        if self
            .warehouses
            .values()
            .any(|w| Some(w.id) != exclude && eq_ci(&w.name, &draft.name))
        {
            return Err(StorageError::DuplicateKey {
                table: "warehouses.name",
                field: "nombre",
                key: draft.name.trim().to_string(),
            });
        }
        Ok(())
    }

    pub fn warehouse_create(
        &mut self,
        now: NaiveDateTime,
        draft: WarehouseDraft,
    ) -> Result<WarehouseRecord, StorageError> {
        draft.validate()?;
        self.ensure_warehouse_unique(&draft, None)?;
        let id = WarehouseId::new(self.next_warehouse_id)?;
        let rec = WarehouseRecord::v1(id, draft, now)?;
        self.warehouses.insert(id, rec.clone());
        self.next_warehouse_id += 1;
        Ok(rec)
    }

    pub fn warehouse_get(&self, id: WarehouseId) -> Option<&WarehouseRecord> {
        self.warehouses.get(&id)
    }

    /// All warehouses in id order; the first entry is the default target for completions.
    pub fn warehouses(&self) -> Vec<&WarehouseRecord> {
        self.warehouses.values().collect()
    }

    pub fn warehouses_by_status(&self, status: RecordStatus) -> Vec<&WarehouseRecord> {
        self.warehouses
            .values()
            .filter(|w| w.status == status)
            .collect()
    }

    pub fn warehouses_search(&self, name: &str) -> Vec<&WarehouseRecord> {
        self.warehouses
            .values()
            .filter(|w| w.status == RecordStatus::Active && contains_ci(&w.name, name))
            .collect()
    }

    pub fn warehouse_update(
        &mut self,
        now: NaiveDateTime,
        id: WarehouseId,
        draft: WarehouseDraft,
    ) -> Result<WarehouseRecord, StorageError> {
        draft.validate()?;
        let current = self.warehouses.get(&id).ok_or(StorageError::NotFound {
            table: "warehouses.id",
            key: id.to_string(),
        })?;
        let updated = current.with_update(draft.clone(), now)?;
        self.ensure_warehouse_unique(&draft, Some(id))?;
        self.warehouses.insert(id, updated.clone());
        Ok(updated)
    }

    pub fn warehouse_set_status(
        &mut self,
        now: NaiveDateTime,
        id: WarehouseId,
        status: RecordStatus,
    ) -> Result<WarehouseRecord, StorageError> {
        let rec = self.warehouses.get_mut(&id).ok_or(StorageError::NotFound {
            table: "warehouses.id",
            key: id.to_string(),
        })?;
        rec.status = status;
        rec.updated_at = now.max(rec.created_at);
        Ok(rec.clone())
    }

    pub fn warehouse_delete(&mut self, id: WarehouseId) -> Result<WarehouseRecord, StorageError> {
        if !self.warehouses.contains_key(&id) {
            return Err(StorageError::NotFound {
                table: "warehouses.id",
                key: id.to_string(),
            });
        }
        if let Some(stock) = self.stock_records.values().find(|s| s.warehouse_id == id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "stock_records.warehouse_id",
                key: format!("warehouse {id} is referenced by stock record {}", stock.id),
            });
        }
        self.warehouses.remove(&id).ok_or(StorageError::NotFound {
            table: "warehouses.id",
            key: id.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Stock records
    // ------------------------------------------------------------------

    fn ensure_stock_refs(
        &self,
        draft: &StockDraft,
        exclude: Option<StockRecordId>,
    ) -> Result<(), StorageError> {
        if !self.warehouses.contains_key(&draft.warehouse_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "stock_records.warehouse_id",
                key: draft.warehouse_id.to_string(),
            });
        }
        if let Some(existing) = self
            .stock_pair_index
            .get(&(draft.product_id, draft.warehouse_id))
        {
            if Some(*existing) != exclude {
                return Err(StorageError::DuplicateKey {
                    table: "stock_records(product_id,warehouse_id)",
                    field: "productoId",
                    key: format!("{}:{}", draft.product_id, draft.warehouse_id),
                });
            }
        }
        Ok(())
    }

    pub fn stock_create(
        &mut self,
        now: NaiveDateTime,
        draft: StockDraft,
    ) -> Result<StockRecord, StorageError> {
        draft.validate()?;
        self.ensure_stock_refs(&draft, None)?;
        let id = StockRecordId::new(self.next_stock_record_id)?;
        let rec = StockRecord::v1(id, draft, now)?;
        self.stock_pair_index
            .insert((rec.product_id, rec.warehouse_id), id);
        self.stock_records.insert(id, rec.clone());
        self.next_stock_record_id += 1;
        Ok(rec)
    }

    pub fn stock_get(&self, id: StockRecordId) -> Option<&StockRecord> {
        self.stock_records.get(&id)
    }

    pub fn stock_for_pair(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Option<&StockRecord> {
        self.stock_pair_index
            .get(&(product_id, warehouse_id))
            .and_then(|id| self.stock_records.get(id))
    }

    pub fn stock_records(&self) -> Vec<&StockRecord> {
        self.stock_records.values().collect()
    }

    pub fn stock_by_warehouse(&self, warehouse_id: WarehouseId) -> Vec<&StockRecord> {
        self.stock_records
            .values()
            .filter(|s| s.warehouse_id == warehouse_id)
            .collect()
    }

    pub fn stock_by_product(&self, product_id: ProductId) -> Vec<&StockRecord> {
        self.stock_records
            .values()
            .filter(|s| s.product_id == product_id)
            .collect()
    }

    pub fn stock_critical(&self, warehouse_id: Option<WarehouseId>) -> Vec<&StockRecord> {
        self.stock_records
            .values()
            .filter(|s| s.is_critical())
            .filter(|s| warehouse_id.map_or(true, |w| s.warehouse_id == w))
            .collect()
    }

    pub fn stock_update(
        &mut self,
        now: NaiveDateTime,
        id: StockRecordId,
        draft: StockDraft,
    ) -> Result<StockRecord, StorageError> {
        draft.validate()?;
        let current = self
            .stock_records
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound {
                table: "stock_records.id",
                key: id.to_string(),
            })?;
        self.ensure_stock_refs(&draft, Some(id))?;
        let updated = StockRecord {
            id,
            product_id: draft.product_id,
            warehouse_id: draft.warehouse_id,
            quantity: draft.quantity,
            min_quantity: draft.min_quantity,
            created_at: current.created_at,
            updated_at: now.max(current.created_at),
        };
        updated.validate()?;
        self.stock_pair_index
            .remove(&(current.product_id, current.warehouse_id));
        self.stock_pair_index
            .insert((updated.product_id, updated.warehouse_id), id);
        self.stock_records.insert(id, updated.clone());
        Ok(updated)
    }

    pub fn stock_adjust(
        &mut self,
        now: NaiveDateTime,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        adjustment: StockAdjustment,
    ) -> Result<StockRecord, StorageError> {
        adjustment.validate()?;
        let id = *self
            .stock_pair_index
            .get(&(product_id, warehouse_id))
            .ok_or(StorageError::NotFound {
                table: "stock_records(product_id,warehouse_id)",
                key: format!("{product_id}:{warehouse_id}"),
            })?;
        let rec = self
            .stock_records
            .get_mut(&id)
            .ok_or(StorageError::NotFound {
                table: "stock_records.id",
                key: id.to_string(),
            })?;
        let quantity =
            adjustment
                .resulting_quantity(rec.quantity)
                .ok_or(StorageError::InsufficientStock {
                    product_id,
                    warehouse_id,
                    available: rec.quantity,
                    requested: adjustment.amount(),
                })?;
        rec.quantity = quantity;
        rec.updated_at = now.max(rec.created_at);
        Ok(rec.clone())
    }

    pub fn stock_delete(&mut self, id: StockRecordId) -> Result<StockRecord, StorageError> {
        let rec = self.stock_records.remove(&id).ok_or(StorageError::NotFound {
            table: "stock_records.id",
            key: id.to_string(),
        })?;
        self.stock_pair_index
            .remove(&(rec.product_id, rec.warehouse_id));
        Ok(rec)
    }

    // ------------------------------------------------------------------
    // Purchase orders
    // ------------------------------------------------------------------

    fn ensure_invoice_unique(
        &self,
        invoice_number: &str,
        exclude: Option<PurchaseOrderId>,
    ) -> Result<(), StorageError> {
        let invoice_number = invoice_number.trim();
        if self
            .purchase_orders
            .values()
            .any(|o| Some(o.id) != exclude && o.invoice_number == invoice_number)
        {
            return Err(StorageError::DuplicateKey {
                table: "purchase_orders.invoice_number",
                field: "numeroFactura",
                key: invoice_number.to_string(),
            });
        }
        Ok(())
    }

    fn next_order_line(&mut self, draft: OrderLineDraft) -> Result<OrderLine, StorageError> {
        let line = OrderLine::v1(OrderLineId(self.next_order_line_id), draft)?;
        self.next_order_line_id += 1;
        Ok(line)
    }

    fn order_required(&self, id: PurchaseOrderId) -> Result<&PurchaseOrderRecord, StorageError> {
        self.purchase_orders.get(&id).ok_or(StorageError::NotFound {
            table: "purchase_orders.id",
            key: id.to_string(),
        })
    }

    fn order_editable_mut(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<&mut PurchaseOrderRecord, StorageError> {
        let rec = self
            .purchase_orders
            .get_mut(&id)
            .ok_or(StorageError::NotFound {
                table: "purchase_orders.id",
                key: id.to_string(),
            })?;
        if !rec.is_editable() {
            return Err(StorageError::OrderLocked {
                order_id: id,
                status: rec.status,
            });
        }
        Ok(rec)
    }

    fn append_order_status_event(
        &mut self,
        now: NaiveDateTime,
        order_id: PurchaseOrderId,
        from_status: Option<OrderStatus>,
        to_status: OrderStatus,
        reason_code: ReasonCodeId,
    ) -> u64 {
        let event_id = self.next_order_status_event_id;
        self.order_status_events.push(OrderStatusEventRecord {
            schema_version: ORDER_STATUS_EVENT_VERSION,
            event_id,
            order_id,
            from_status,
            to_status,
            reason_code,
            created_at: now,
        });
        self.next_order_status_event_id += 1;
        event_id
    }

    pub fn order_create(
        &mut self,
        now: NaiveDateTime,
        draft: PurchaseOrderDraft,
        reason_code: ReasonCodeId,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        draft.validate()?;
        self.ensure_invoice_unique(&draft.header.invoice_number, None)?;
        let id = PurchaseOrderId::new(self.next_purchase_order_id)?;

        let first_line_id = self.next_order_line_id;
        let mut lines = Vec::with_capacity(draft.lines.len());
        for line in draft.lines {
            match self.next_order_line(line) {
                Ok(l) => lines.push(l),
                Err(err) => {
                    self.next_order_line_id = first_line_id;
                    return Err(err);
                }
            }
        }
        let rec = match PurchaseOrderRecord::v1(id, draft.header, lines, self.tax_rate, now) {
            Ok(rec) => rec,
            Err(err) => {
                self.next_order_line_id = first_line_id;
                return Err(err.into());
            }
        };

        self.purchase_orders.insert(id, rec.clone());
        self.next_purchase_order_id += 1;
        self.append_order_status_event(now, id, None, OrderStatus::Pending, reason_code);
        Ok(rec)
    }

    pub fn order_get(&self, id: PurchaseOrderId) -> Option<&PurchaseOrderRecord> {
        self.purchase_orders.get(&id)
    }

    pub fn orders(&self) -> Vec<&PurchaseOrderRecord> {
        self.purchase_orders.values().collect()
    }

    pub fn orders_by_status(&self, status: OrderStatus) -> Vec<&PurchaseOrderRecord> {
        self.purchase_orders
            .values()
            .filter(|o| o.status == status)
            .collect()
    }

    pub fn orders_by_supplier(&self, supplier_id: SupplierId) -> Vec<&PurchaseOrderRecord> {
        self.purchase_orders
            .values()
            .filter(|o| o.supplier_id == supplier_id)
            .collect()
    }

    /// Orders whose issue date falls in `[from, to]`.
    pub fn orders_issued_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Vec<&PurchaseOrderRecord> {
        self.purchase_orders
            .values()
            .filter(|o| o.issued_at >= from && o.issued_at <= to)
            .collect()
    }

    pub fn orders_by_invoice_fragment(&self, fragment: &str) -> Vec<&PurchaseOrderRecord> {
        self.purchase_orders
            .values()
            .filter(|o| contains_ci(&o.invoice_number, fragment))
            .collect()
    }

    pub fn order_count_by_status(&self, status: OrderStatus) -> u64 {
        self.purchase_orders
            .values()
            .filter(|o| o.status == status)
            .count() as u64
    }

    pub fn order_total_by_supplier(
        &self,
        supplier_id: SupplierId,
    ) -> Result<Decimal, StorageError> {
        let totals = self.orders_by_supplier(supplier_id).into_iter().map(|o| o.total);
        Ok(checked_sum(totals)?)
    }

    pub fn order_total_issued_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Decimal, StorageError> {
        let totals = self.orders_issued_between(from, to).into_iter().map(|o| o.total);
        Ok(checked_sum(totals)?)
    }

    pub fn invoice_number_exists(&self, invoice_number: &str) -> bool {
        let invoice_number = invoice_number.trim();
        self.purchase_orders
            .values()
            .any(|o| o.invoice_number == invoice_number)
    }

    pub fn order_can_transition(
        &self,
        id: PurchaseOrderId,
        to: OrderStatus,
    ) -> Result<bool, StorageError> {
        Ok(self.order_required(id)?.status.can_transition_to(to))
    }

    pub fn order_status_summary(
        &self,
        month_start: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<OrderStatusSummary, StorageError> {
        Ok(OrderStatusSummary {
            pending: self.order_count_by_status(OrderStatus::Pending),
            in_progress: self.order_count_by_status(OrderStatus::InProgress),
            completed: self.order_count_by_status(OrderStatus::Completed),
            cancelled: self.order_count_by_status(OrderStatus::Cancelled),
            month_total: self.order_total_issued_between(month_start, now)?,
        })
    }

    pub fn order_update_header(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        header: PurchaseOrderHeader,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        let header = header.normalized();
        header.validate()?;
        self.order_required(id)?;
        self.ensure_invoice_unique(&header.invoice_number, Some(id))?;
        // Header fields stay editable in every status; only lines and delete lock.
        let rec = self
            .purchase_orders
            .get_mut(&id)
            .ok_or(StorageError::NotFound {
                table: "purchase_orders.id",
                key: id.to_string(),
            })?;
        rec.supplier_id = header.supplier_id;
        rec.invoice_number = header.invoice_number;
        rec.issued_at = header.issued_at;
        rec.delivery_at = header.delivery_at;
        rec.notes = header.notes;
        rec.updated_at = now.max(rec.created_at);
        Ok(rec.clone())
    }

    pub fn order_delete(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        self.order_editable_mut(id)?;
        self.purchase_orders
            .remove(&id)
            .ok_or(StorageError::NotFound {
                table: "purchase_orders.id",
                key: id.to_string(),
            })
    }

    pub fn order_change_status(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        to: OrderStatus,
        reason_code: ReasonCodeId,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        let rec = self
            .purchase_orders
            .get_mut(&id)
            .ok_or(StorageError::NotFound {
                table: "purchase_orders.id",
                key: id.to_string(),
            })?;
        let from = rec.status;
        rec.status = from.transition_to(to)?;
        rec.updated_at = now.max(rec.created_at);
        let out = rec.clone();
        self.append_order_status_event(now, id, Some(from), to, reason_code);
        Ok(out)
    }

    pub fn order_add_line(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        draft: OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        draft.validate()?;
        let line = OrderLine::v1(OrderLineId(self.next_order_line_id), draft)?;
        let tax_rate = self.tax_rate;
        let rec = self.order_editable_mut(id)?;
        let mut lines = rec.lines.clone();
        lines.push(line);
        rec.replace_lines(lines, tax_rate)?;
        rec.updated_at = now.max(rec.created_at);
        let out = rec.clone();
        self.next_order_line_id += 1;
        Ok(out)
    }

    pub fn order_update_line(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        line_id: OrderLineId,
        draft: OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        let replacement = OrderLine::v1(line_id, draft)?;
        let tax_rate = self.tax_rate;
        let rec = self.order_editable_mut(id)?;
        let mut lines = rec.lines.clone();
        let slot = lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or(StorageError::NotFound {
                table: "purchase_orders.lines",
                key: format!("order {id} line {line_id}"),
            })?;
        *slot = replacement;
        rec.replace_lines(lines, tax_rate)?;
        rec.updated_at = now.max(rec.created_at);
        Ok(rec.clone())
    }

    pub fn order_remove_line(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        line_id: OrderLineId,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        let tax_rate = self.tax_rate;
        let rec = self.order_editable_mut(id)?;
        let Some(pos) = rec.lines.iter().position(|l| l.id == line_id) else {
            return Err(StorageError::NotFound {
                table: "purchase_orders.lines",
                key: format!("order {id} line {line_id}"),
            });
        };
        if rec.lines.len() == 1 {
            return Err(StorageError::ContractViolation(
                ContractViolation::InvalidValue {
                    field: "detalles",
                    reason: "an order must keep at least one line",
                },
            ));
        }
        let mut lines = rec.lines.clone();
        lines.remove(pos);
        rec.replace_lines(lines, tax_rate)?;
        rec.updated_at = now.max(rec.created_at);
        Ok(rec.clone())
    }

    pub fn order_status_events(&self) -> &[OrderStatusEventRecord] {
        &self.order_status_events
    }

    pub fn order_status_events_for(&self, id: PurchaseOrderId) -> Vec<&OrderStatusEventRecord> {
        self.order_status_events
            .iter()
            .filter(|e| e.order_id == id)
            .collect()
    }
}
