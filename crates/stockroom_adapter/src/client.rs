#![forbid(unsafe_code)]

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

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

use crate::api::ErrorResponse;
use crate::config::{ConsoleConfig, ServiceUrls};
use crate::http::{ORDERS_BASE, PRODUCTS_BASE, STOCK_BASE, SUPPLIERS_BASE, WAREHOUSES_BASE};

/// Console backend that talks to the REST services over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    agent: ureq::Agent,
    urls: ServiceUrls,
}

type Query<'a> = &'a [(&'a str, String)];

impl HttpBackend {
    pub fn new(urls: ServiceUrls, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self { agent, urls }
    }

    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self::new(config.urls.clone(), config.timeout)
    }

    pub fn urls(&self) -> &ServiceUrls {
        &self.urls
    }

    fn url(base: &Url, prefix: &str, path: &str) -> String {
        format!("{}{prefix}{path}", base.as_str().trim_end_matches('/'))
    }

    fn products(&self, path: &str) -> String {
        Self::url(&self.urls.products, PRODUCTS_BASE, path)
    }

    fn suppliers(&self, path: &str) -> String {
        Self::url(&self.urls.suppliers, SUPPLIERS_BASE, path)
    }

    fn warehouses(&self, path: &str) -> String {
        Self::url(&self.urls.inventory, WAREHOUSES_BASE, path)
    }

    fn stock(&self, path: &str) -> String {
        Self::url(&self.urls.inventory, STOCK_BASE, path)
    }

    fn orders(&self, path: &str) -> String {
        Self::url(&self.urls.purchasing, ORDERS_BASE, path)
    }

    fn request(&self, method: &str, url: &str, query: Query<'_>) -> ureq::Request {
        let mut req = self
            .agent
            .request(method, url)
            .set("accept", "application/json");
        for (key, value) in query {
            req = req.query(key, value);
        }
        req
    }

    fn dispatch(
        method: &str,
        url: &str,
        result: Result<ureq::Response, ureq::Error>,
    ) -> Result<ureq::Response, BackendError> {
        debug!(method, url, "backend request");
        match result {
            Ok(resp) => Ok(resp),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(match serde_json::from_str::<ErrorResponse>(&body) {
                    Ok(envelope) => BackendError {
                        status: Some(code),
                        message: envelope.message,
                        errors: envelope.errors,
                    },
                    Err(_) => BackendError::status(
                        code,
                        format!("{method} {url} failed with http status {code}"),
                    ),
                })
            }
            Err(ureq::Error::Transport(err)) => Err(BackendError::transport(format!(
                "{method} {url} transport error: {err}"
            ))),
        }
    }

    fn decode<T: DeserializeOwned>(url: &str, resp: ureq::Response) -> Result<T, BackendError> {
        resp.into_json::<T>()
            .map_err(|err| BackendError::transport(format!("invalid response from {url}: {err}")))
    }

    fn get<T: DeserializeOwned>(&self, url: &str, query: Query<'_>) -> Result<T, BackendError> {
        let resp = Self::dispatch("GET", url, self.request("GET", url, query).call())?;
        Self::decode(url, resp)
    }

    fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: &str,
        url: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let resp = Self::dispatch(method, url, self.request(method, url, &[]).send_json(body))?;
        Self::decode(url, resp)
    }

    fn send_query<T: DeserializeOwned>(
        &self,
        method: &str,
        url: &str,
        query: Query<'_>,
    ) -> Result<T, BackendError> {
        let resp = Self::dispatch(method, url, self.request(method, url, query).call())?;
        Self::decode(url, resp)
    }

    fn delete(&self, url: &str) -> Result<(), BackendError> {
        Self::dispatch("DELETE", url, self.request("DELETE", url, &[]).call())?;
        Ok(())
    }
}

fn adjustment_route(adjustment: StockAdjustment) -> (&'static str, &'static str) {
    match adjustment {
        StockAdjustment::Set(_) => ("actualizar-stock", "nuevaCantidad"),
        StockAdjustment::Add(_) => ("agregar-stock", "cantidad"),
        StockAdjustment::Reduce(_) => ("reducir-stock", "cantidad"),
    }
}

impl ConsoleBackend for HttpBackend {
    fn list_products(&self) -> Result<Vec<ProductRecord>, BackendError> {
        self.get(&self.products(""), &[])
    }

    fn get_product(&self, id: ProductId) -> Result<ProductRecord, BackendError> {
        self.get(&self.products(&format!("/{id}")), &[])
    }

    fn search_products(&self, name: &str) -> Result<Vec<ProductRecord>, BackendError> {
        self.get(&self.products("/buscar"), &[("nombre", name.to_string())])
    }

    fn create_product(&self, draft: &ProductDraft) -> Result<ProductRecord, BackendError> {
        self.send("POST", &self.products(""), draft)
    }

    fn update_product(
        &self,
        id: ProductId,
        draft: &ProductDraft,
    ) -> Result<ProductRecord, BackendError> {
        self.send("PUT", &self.products(&format!("/{id}")), draft)
    }

    fn set_product_status(
        &self,
        id: ProductId,
        status: RecordStatus,
    ) -> Result<ProductRecord, BackendError> {
        self.send_query(
            "PATCH",
            &self.products(&format!("/{id}/estado")),
            &[("estado", status.as_str().to_string())],
        )
    }

    fn delete_product(&self, id: ProductId) -> Result<(), BackendError> {
        self.delete(&self.products(&format!("/{id}")))
    }

    fn list_suppliers(&self) -> Result<Vec<SupplierRecord>, BackendError> {
        self.get(&self.suppliers(""), &[])
    }

    fn get_supplier(&self, id: SupplierId) -> Result<SupplierRecord, BackendError> {
        self.get(&self.suppliers(&format!("/{id}")), &[])
    }

    fn create_supplier(&self, draft: &SupplierDraft) -> Result<SupplierRecord, BackendError> {
        self.send("POST", &self.suppliers(""), draft)
    }

    fn update_supplier(
        &self,
        id: SupplierId,
        draft: &SupplierDraft,
    ) -> Result<SupplierRecord, BackendError> {
        self.send("PUT", &self.suppliers(&format!("/{id}")), draft)
    }

    fn set_supplier_status(
        &self,
        id: SupplierId,
        status: RecordStatus,
    ) -> Result<SupplierRecord, BackendError> {
        self.send_query(
            "PATCH",
            &self.suppliers(&format!("/{id}/estado")),
            &[("estado", status.as_str().to_string())],
        )
    }

    fn delete_supplier(&self, id: SupplierId) -> Result<(), BackendError> {
        self.delete(&self.suppliers(&format!("/{id}")))
    }

    fn list_warehouses(&self) -> Result<Vec<WarehouseRecord>, BackendError> {
        self.get(&self.warehouses(""), &[])
    }

    fn get_warehouse(&self, id: WarehouseId) -> Result<WarehouseRecord, BackendError> {
        self.get(&self.warehouses(&format!("/{id}")), &[])
    }

    fn create_warehouse(&self, draft: &WarehouseDraft) -> Result<WarehouseRecord, BackendError> {
        self.send("POST", &self.warehouses(""), draft)
    }

    fn update_warehouse(
        &self,
        id: WarehouseId,
        draft: &WarehouseDraft,
    ) -> Result<WarehouseRecord, BackendError> {
        self.send("PUT", &self.warehouses(&format!("/{id}")), draft)
    }

    fn set_warehouse_status(
        &self,
        id: WarehouseId,
        status: RecordStatus,
    ) -> Result<WarehouseRecord, BackendError> {
        self.send_query(
            "PATCH",
            &self.warehouses(&format!("/{id}/estado")),
            &[("estado", status.as_str().to_string())],
        )
    }

    fn delete_warehouse(&self, id: WarehouseId) -> Result<(), BackendError> {
        self.delete(&self.warehouses(&format!("/{id}")))
    }

    fn list_stock(&self) -> Result<Vec<StockRecord>, BackendError> {
        self.get(&self.stock(""), &[])
    }

    fn stock_by_warehouse(&self, id: WarehouseId) -> Result<Vec<StockRecord>, BackendError> {
        self.get(&self.stock(&format!("/bodega/{id}")), &[])
    }

    fn critical_stock(
        &self,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<StockRecord>, BackendError> {
        let path = match warehouse_id {
            Some(id) => format!("/stock-critico/bodega/{id}"),
            None => "/stock-critico".to_string(),
        };
        self.get(&self.stock(&path), &[])
    }

    fn create_stock(&self, draft: &StockDraft) -> Result<StockRecord, BackendError> {
        self.send("POST", &self.stock(""), draft)
    }

    fn update_stock(
        &self,
        id: StockRecordId,
        draft: &StockDraft,
    ) -> Result<StockRecord, BackendError> {
        self.send("PUT", &self.stock(&format!("/{id}")), draft)
    }

    fn adjust_stock(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        adjustment: StockAdjustment,
    ) -> Result<StockRecord, BackendError> {
        let (action, param) = adjustment_route(adjustment);
        self.send_query(
            "PATCH",
            &self.stock(&format!("/producto/{product_id}/bodega/{warehouse_id}/{action}")),
            &[(param, adjustment.amount().to_string())],
        )
    }

    fn delete_stock(&self, id: StockRecordId) -> Result<(), BackendError> {
        self.delete(&self.stock(&format!("/{id}")))
    }

    fn list_orders(&self) -> Result<Vec<PurchaseOrderRecord>, BackendError> {
        self.get(&self.orders(""), &[])
    }

    fn orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<PurchaseOrderRecord>, BackendError> {
        self.get(&self.orders(&format!("/estado/{status}")), &[])
    }

    fn get_order(&self, id: PurchaseOrderId) -> Result<PurchaseOrderRecord, BackendError> {
        self.get(&self.orders(&format!("/{id}")), &[])
    }

    fn create_order(
        &self,
        draft: &PurchaseOrderDraft,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.send("POST", &self.orders(""), draft)
    }

    fn update_order(
        &self,
        id: PurchaseOrderId,
        header: &PurchaseOrderHeader,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.send("PUT", &self.orders(&format!("/{id}")), header)
    }

    fn delete_order(&self, id: PurchaseOrderId) -> Result<(), BackendError> {
        self.delete(&self.orders(&format!("/{id}")))
    }

    fn change_order_status(
        &self,
        id: PurchaseOrderId,
        to: OrderStatus,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.send_query(
            "PUT",
            &self.orders(&format!("/{id}/estado")),
            &[("nuevoEstado", to.as_str().to_string())],
        )
    }

    fn add_order_line(
        &self,
        id: PurchaseOrderId,
        line: &OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.send("POST", &self.orders(&format!("/{id}/detalles")), line)
    }

    fn update_order_line(
        &self,
        id: PurchaseOrderId,
        line_id: OrderLineId,
        line: &OrderLineDraft,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.send(
            "PUT",
            &self.orders(&format!("/{id}/detalles/{line_id}")),
            line,
        )
    }

    fn remove_order_line(
        &self,
        id: PurchaseOrderId,
        line_id: OrderLineId,
    ) -> Result<PurchaseOrderRecord, BackendError> {
        self.send_query(
            "DELETE",
            &self.orders(&format!("/{id}/detalles/{line_id}")),
            &[],
        )
    }

    fn order_summary(&self) -> Result<OrderStatusSummary, BackendError> {
        self.get(&self.orders("/resumen"), &[])
    }
}
