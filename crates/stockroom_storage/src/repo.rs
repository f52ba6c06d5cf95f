#![forbid(unsafe_code)]

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use stockroom_contracts::product::{ProductDraft, ProductId, ProductRecord};
use stockroom_contracts::purchase_order::{
    OrderLineDraft, OrderLineId, OrderStatus, OrderStatusSummary, PurchaseOrderDraft,
    PurchaseOrderHeader, PurchaseOrderId, PurchaseOrderRecord,
};
use stockroom_contracts::stock::{StockAdjustment, StockDraft, StockRecord, StockRecordId};
use stockroom_contracts::supplier::{SupplierDraft, SupplierId, SupplierRecord};
use stockroom_contracts::warehouse::{WarehouseDraft, WarehouseId, WarehouseRecord};
use stockroom_contracts::{ReasonCodeId, RecordStatus};

use crate::store::{InventoryStore, OrderStatusEventRecord, StorageError};

/// Typed repository interface for the product catalog.
pub trait ProductRepo {
    fn product_create_row(
        &mut self,
        now: NaiveDateTime,
        draft: ProductDraft,
    ) -> Result<ProductRecord, StorageError>;
    fn product_row(&self, id: ProductId) -> Option<&ProductRecord>;
    fn product_by_sku_row(&self, sku: &str) -> Option<&ProductRecord>;
    fn product_rows(&self) -> Vec<&ProductRecord>;
    fn product_rows_by_category(&self, category: &str) -> Vec<&ProductRecord>;
    fn product_rows_by_status(&self, status: RecordStatus) -> Vec<&ProductRecord>;
    fn product_search_rows(&self, name: &str) -> Vec<&ProductRecord>;
    fn product_update_row(
        &mut self,
        now: NaiveDateTime,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<ProductRecord, StorageError>;
    fn product_set_status_row(
        &mut self,
        now: NaiveDateTime,
        id: ProductId,
        status: RecordStatus,
    ) -> Result<ProductRecord, StorageError>;
    fn product_delete_row(&mut self, id: ProductId) -> Result<ProductRecord, StorageError>;
}

/// Typed repository interface for suppliers.
pub trait SupplierRepo {
    fn supplier_create_row(
        &mut self,
        now: NaiveDateTime,
        draft: SupplierDraft,
    ) -> Result<SupplierRecord, StorageError>;
    fn supplier_row(&self, id: SupplierId) -> Option<&SupplierRecord>;
    fn supplier_by_tax_id_row(&self, tax_id: &str) -> Option<&SupplierRecord>;
    fn supplier_rows(&self) -> Vec<&SupplierRecord>;
    fn supplier_rows_by_status(&self, status: RecordStatus) -> Vec<&SupplierRecord>;
    fn supplier_search_rows(&self, name: &str) -> Vec<&SupplierRecord>;
    fn supplier_update_row(
        &mut self,
        now: NaiveDateTime,
        id: SupplierId,
        draft: SupplierDraft,
    ) -> Result<SupplierRecord, StorageError>;
    fn supplier_set_status_row(
        &mut self,
        now: NaiveDateTime,
        id: SupplierId,
        status: RecordStatus,
    ) -> Result<SupplierRecord, StorageError>;
    fn supplier_delete_row(&mut self, id: SupplierId) -> Result<SupplierRecord, StorageError>;
}

/// Typed repository interface for warehouses.
pub trait WarehouseRepo {
    fn warehouse_create_row(
        &mut self,
        now: NaiveDateTime,
        draft: WarehouseDraft,
    ) -> Result<WarehouseRecord, StorageError>;
    fn warehouse_row(&self, id: WarehouseId) -> Option<&WarehouseRecord>;
    fn warehouse_rows(&self) -> Vec<&WarehouseRecord>;
    fn warehouse_rows_by_status(&self, status: RecordStatus) -> Vec<&WarehouseRecord>;
    fn warehouse_search_rows(&self, name: &str) -> Vec<&WarehouseRecord>;
    fn warehouse_update_row(
        &mut self,
        now: NaiveDateTime,
        id: WarehouseId,
        draft: WarehouseDraft,
    ) -> Result<WarehouseRecord, StorageError>;
    fn warehouse_set_status_row(
        &mut self,
        now: NaiveDateTime,
        id: WarehouseId,
        status: RecordStatus,
    ) -> Result<WarehouseRecord, StorageError>;
    fn warehouse_delete_row(&mut self, id: WarehouseId) -> Result<WarehouseRecord, StorageError>;
}

/// Typed repository interface for per-warehouse stock levels.
pub trait StockRepo {
    fn stock_create_row(
        &mut self,
        now: NaiveDateTime,
        draft: StockDraft,
    ) -> Result<StockRecord, StorageError>;
    fn stock_row(&self, id: StockRecordId) -> Option<&StockRecord>;
    fn stock_pair_row(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Option<&StockRecord>;
    fn stock_rows(&self) -> Vec<&StockRecord>;
    fn stock_rows_by_warehouse(&self, warehouse_id: WarehouseId) -> Vec<&StockRecord>;
    fn stock_rows_by_product(&self, product_id: ProductId) -> Vec<&StockRecord>;
    fn stock_critical_rows(&self, warehouse_id: Option<WarehouseId>) -> Vec<&StockRecord>;
    fn stock_update_row(
        &mut self,
        now: NaiveDateTime,
        id: StockRecordId,
        draft: StockDraft,
    ) -> Result<StockRecord, StorageError>;
    fn stock_adjust_row(
        &mut self,
        now: NaiveDateTime,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        adjustment: StockAdjustment,
    ) -> Result<StockRecord, StorageError>;
    fn stock_delete_row(&mut self, id: StockRecordId) -> Result<StockRecord, StorageError>;
}

/// Typed repository interface for purchase orders and their status ledger.
pub trait PurchaseOrderRepo {
    fn order_create_row(
        &mut self,
        now: NaiveDateTime,
        draft: PurchaseOrderDraft,
        reason_code: ReasonCodeId,
    ) -> Result<PurchaseOrderRecord, StorageError>;
    fn order_row(&self, id: PurchaseOrderId) -> Option<&PurchaseOrderRecord>;
    fn order_rows(&self) -> Vec<&PurchaseOrderRecord>;
    fn order_rows_by_status(&self, status: OrderStatus) -> Vec<&PurchaseOrderRecord>;
    fn order_rows_by_supplier(&self, supplier_id: SupplierId) -> Vec<&PurchaseOrderRecord>;
    fn order_rows_issued_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Vec<&PurchaseOrderRecord>;
    fn order_rows_by_invoice_fragment(&self, fragment: &str) -> Vec<&PurchaseOrderRecord>;
    fn order_count_by_status_row(&self, status: OrderStatus) -> u64;
    fn order_total_by_supplier_row(&self, supplier_id: SupplierId) -> Result<Decimal, StorageError>;
    fn order_total_issued_between_row(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Decimal, StorageError>;
    fn invoice_number_exists_row(&self, invoice_number: &str) -> bool;
    fn order_can_transition_row(
        &self,
        id: PurchaseOrderId,
        to: OrderStatus,
    ) -> Result<bool, StorageError>;
    fn order_status_summary_row(
        &self,
        month_start: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<OrderStatusSummary, StorageError>;
    fn order_update_header_row(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        header: PurchaseOrderHeader,
    ) -> Result<PurchaseOrderRecord, StorageError>;
    fn order_delete_row(&mut self, id: PurchaseOrderId)
        -> Result<PurchaseOrderRecord, StorageError>;
    fn order_change_status_row(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        to: OrderStatus,
        reason_code: ReasonCodeId,
    ) -> Result<PurchaseOrderRecord, StorageError>;
    fn order_add_line_row(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        draft: OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, StorageError>;
    fn order_update_line_row(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        line_id: OrderLineId,
        draft: OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, StorageError>;
    fn order_remove_line_row(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        line_id: OrderLineId,
    ) -> Result<PurchaseOrderRecord, StorageError>;
    fn order_status_event_rows(&self, id: PurchaseOrderId) -> Vec<&OrderStatusEventRecord>;
}

impl ProductRepo for InventoryStore {
    fn product_create_row(
        &mut self,
        now: NaiveDateTime,
        draft: ProductDraft,
    ) -> Result<ProductRecord, StorageError> {
        self.product_create(now, draft)
    }

    fn product_row(&self, id: ProductId) -> Option<&ProductRecord> {
        self.product_get(id)
    }

    fn product_by_sku_row(&self, sku: &str) -> Option<&ProductRecord> {
        self.product_by_sku(sku)
    }

    fn product_rows(&self) -> Vec<&ProductRecord> {
        self.products()
    }

    fn product_rows_by_category(&self, category: &str) -> Vec<&ProductRecord> {
        self.products_by_category(category)
    }

    fn product_rows_by_status(&self, status: RecordStatus) -> Vec<&ProductRecord> {
        self.products_by_status(status)
    }

    fn product_search_rows(&self, name: &str) -> Vec<&ProductRecord> {
        self.products_search(name)
    }

    fn product_update_row(
        &mut self,
        now: NaiveDateTime,
        id: ProductId,
        draft: ProductDraft,
    ) -> Result<ProductRecord, StorageError> {
        self.product_update(now, id, draft)
    }

    fn product_set_status_row(
        &mut self,
        now: NaiveDateTime,
        id: ProductId,
        status: RecordStatus,
    ) -> Result<ProductRecord, StorageError> {
        self.product_set_status(now, id, status)
    }

    fn product_delete_row(&mut self, id: ProductId) -> Result<ProductRecord, StorageError> {
        self.product_delete(id)
    }
}

impl SupplierRepo for InventoryStore {
    fn supplier_create_row(
        &mut self,
        now: NaiveDateTime,
        draft: SupplierDraft,
    ) -> Result<SupplierRecord, StorageError> {
        self.supplier_create(now, draft)
    }

    fn supplier_row(&self, id: SupplierId) -> Option<&SupplierRecord> {
        self.supplier_get(id)
    }

    fn supplier_by_tax_id_row(&self, tax_id: &str) -> Option<&SupplierRecord> {
        self.supplier_by_tax_id(tax_id)
    }

    fn supplier_rows(&self) -> Vec<&SupplierRecord> {
        self.suppliers()
    }

    fn supplier_rows_by_status(&self, status: RecordStatus) -> Vec<&SupplierRecord> {
        self.suppliers_by_status(status)
    }

    fn supplier_search_rows(&self, name: &str) -> Vec<&SupplierRecord> {
        self.suppliers_search(name)
    }

    fn supplier_update_row(
        &mut self,
        now: NaiveDateTime,
        id: SupplierId,
        draft: SupplierDraft,
    ) -> Result<SupplierRecord, StorageError> {
        self.supplier_update(now, id, draft)
    }

    fn supplier_set_status_row(
        &mut self,
        now: NaiveDateTime,
        id: SupplierId,
        status: RecordStatus,
    ) -> Result<SupplierRecord, StorageError> {
        self.supplier_set_status(now, id, status)
    }

    fn supplier_delete_row(&mut self, id: SupplierId) -> Result<SupplierRecord, StorageError> {
        self.supplier_delete(id)
    }
}

impl WarehouseRepo for InventoryStore {
    fn warehouse_create_row(
        &mut self,
        now: NaiveDateTime,
        draft: WarehouseDraft,
    ) -> Result<WarehouseRecord, StorageError> {
        self.warehouse_create(now, draft)
    }

    fn warehouse_row(&self, id: WarehouseId) -> Option<&WarehouseRecord> {
        self.warehouse_get(id)
    }

    fn warehouse_rows(&self) -> Vec<&WarehouseRecord> {
        self.warehouses()
    }

    fn warehouse_rows_by_status(&self, status: RecordStatus) -> Vec<&WarehouseRecord> {
        self.warehouses_by_status(status)
    }

    fn warehouse_search_rows(&self, name: &str) -> Vec<&WarehouseRecord> {
        self.warehouses_search(name)
    }

    fn warehouse_update_row(
        &mut self,
        now: NaiveDateTime,
        id: WarehouseId,
        draft: WarehouseDraft,
    ) -> Result<WarehouseRecord, StorageError> {
        self.warehouse_update(now, id, draft)
    }

    fn warehouse_set_status_row(
        &mut self,
        now: NaiveDateTime,
        id: WarehouseId,
        status: RecordStatus,
    ) -> Result<WarehouseRecord, StorageError> {
        self.warehouse_set_status(now, id, status)
    }

    fn warehouse_delete_row(&mut self, id: WarehouseId) -> Result<WarehouseRecord, StorageError> {
        self.warehouse_delete(id)
    }
}

impl StockRepo for InventoryStore {
    fn stock_create_row(
        &mut self,
        now: NaiveDateTime,
        draft: StockDraft,
    ) -> Result<StockRecord, StorageError> {
        self.stock_create(now, draft)
    }

    fn stock_row(&self, id: StockRecordId) -> Option<&StockRecord> {
        self.stock_get(id)
    }

    fn stock_pair_row(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> Option<&StockRecord> {
        self.stock_for_pair(product_id, warehouse_id)
    }

    fn stock_rows(&self) -> Vec<&StockRecord> {
        self.stock_records()
    }

    fn stock_rows_by_warehouse(&self, warehouse_id: WarehouseId) -> Vec<&StockRecord> {
        self.stock_by_warehouse(warehouse_id)
    }

    fn stock_rows_by_product(&self, product_id: ProductId) -> Vec<&StockRecord> {
        self.stock_by_product(product_id)
    }

    fn stock_critical_rows(&self, warehouse_id: Option<WarehouseId>) -> Vec<&StockRecord> {
        self.stock_critical(warehouse_id)
    }

    fn stock_update_row(
        &mut self,
        now: NaiveDateTime,
        id: StockRecordId,
        draft: StockDraft,
    ) -> Result<StockRecord, StorageError> {
        self.stock_update(now, id, draft)
    }

    fn stock_adjust_row(
        &mut self,
        now: NaiveDateTime,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        adjustment: StockAdjustment,
    ) -> Result<StockRecord, StorageError> {
        self.stock_adjust(now, product_id, warehouse_id, adjustment)
    }

    fn stock_delete_row(&mut self, id: StockRecordId) -> Result<StockRecord, StorageError> {
        self.stock_delete(id)
    }
}

impl PurchaseOrderRepo for InventoryStore {
    fn order_create_row(
        &mut self,
        now: NaiveDateTime,
        draft: PurchaseOrderDraft,
        reason_code: ReasonCodeId,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        self.order_create(now, draft, reason_code)
    }

    fn order_row(&self, id: PurchaseOrderId) -> Option<&PurchaseOrderRecord> {
        self.order_get(id)
    }

    fn order_rows(&self) -> Vec<&PurchaseOrderRecord> {
        self.orders()
    }

    fn order_rows_by_status(&self, status: OrderStatus) -> Vec<&PurchaseOrderRecord> {
        self.orders_by_status(status)
    }

    fn order_rows_by_supplier(&self, supplier_id: SupplierId) -> Vec<&PurchaseOrderRecord> {
        self.orders_by_supplier(supplier_id)
    }

    fn order_rows_issued_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Vec<&PurchaseOrderRecord> {
        self.orders_issued_between(from, to)
    }

    fn order_rows_by_invoice_fragment(&self, fragment: &str) -> Vec<&PurchaseOrderRecord> {
        self.orders_by_invoice_fragment(fragment)
    }

    fn order_count_by_status_row(&self, status: OrderStatus) -> u64 {
        self.order_count_by_status(status)
    }

    fn order_total_by_supplier_row(
        &self,
        supplier_id: SupplierId,
    ) -> Result<Decimal, StorageError> {
        self.order_total_by_supplier(supplier_id)
    }

    fn order_total_issued_between_row(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Decimal, StorageError> {
        self.order_total_issued_between(from, to)
    }

    fn invoice_number_exists_row(&self, invoice_number: &str) -> bool {
        self.invoice_number_exists(invoice_number)
    }

    fn order_can_transition_row(
        &self,
        id: PurchaseOrderId,
        to: OrderStatus,
    ) -> Result<bool, StorageError> {
        self.order_can_transition(id, to)
    }

    fn order_status_summary_row(
        &self,
        month_start: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Result<OrderStatusSummary, StorageError> {
        self.order_status_summary(month_start, now)
    }

    fn order_update_header_row(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        header: PurchaseOrderHeader,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        self.order_update_header(now, id, header)
    }

    fn order_delete_row(
        &mut self,
        id: PurchaseOrderId,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        self.order_delete(id)
    }

    fn order_change_status_row(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        to: OrderStatus,
        reason_code: ReasonCodeId,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        self.order_change_status(now, id, to, reason_code)
    }

    fn order_add_line_row(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        draft: OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        self.order_add_line(now, id, draft)
    }

    fn order_update_line_row(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        line_id: OrderLineId,
        draft: OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        self.order_update_line(now, id, line_id, draft)
    }

    fn order_remove_line_row(
        &mut self,
        now: NaiveDateTime,
        id: PurchaseOrderId,
        line_id: OrderLineId,
    ) -> Result<PurchaseOrderRecord, StorageError> {
        self.order_remove_line(now, id, line_id)
    }

    fn order_status_event_rows(&self, id: PurchaseOrderId) -> Vec<&OrderStatusEventRecord> {
        self.order_status_events_for(id)
    }
}
