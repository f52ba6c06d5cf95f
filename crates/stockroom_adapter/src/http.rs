#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockroom_contracts::product::{ProductDraft, ProductId, ProductRecord};
use stockroom_contracts::purchase_order::{
    OrderLineDraft, OrderLineId, OrderStatus, OrderStatusSummary, PurchaseOrderDraft,
    PurchaseOrderHeader, PurchaseOrderId, PurchaseOrderRecord,
};
use stockroom_contracts::stock::{StockAdjustment, StockDraft, StockRecord, StockRecordId};
use stockroom_contracts::supplier::{SupplierDraft, SupplierId, SupplierRecord};
use stockroom_contracts::warehouse::{WarehouseDraft, WarehouseId, WarehouseRecord};
use stockroom_contracts::{parse_wire_datetime, RecordStatus};
use stockroom_storage::repo::{
    ProductRepo, PurchaseOrderRepo, StockRepo, SupplierRepo, WarehouseRepo,
};
use stockroom_storage::store::StorageError;

use crate::api::{self, ApiError, ApiJson, ApiPath, ApiQuery};
use crate::config::ServiceRoles;
use crate::{local_now, month_start, CommandOutcome, InventoryRuntime, RuntimeError, StoreCommand};

pub const PRODUCTS_BASE: &str = "/api/productos";
pub const SUPPLIERS_BASE: &str = "/api/proveedores";
pub const WAREHOUSES_BASE: &str = "/api/bodegas";
pub const STOCK_BASE: &str = "/api/inventario";
pub const ORDERS_BASE: &str = "/api/ordenes-compra";

type ApiResult<T> = Result<Json<T>, ApiError>;
type Created<T> = Result<(StatusCode, Json<T>), ApiError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub services: Vec<String>,
    pub persistence: bool,
}

/// Mounts the routes of every enabled service plus `/healthz`.
pub fn router(runtime: InventoryRuntime, roles: ServiceRoles) -> Router {
    let mut app = Router::new().route(
        "/healthz",
        get(move |State(rt): State<InventoryRuntime>| async move { healthz(&rt, roles) }),
    );
    if roles.products {
        app = app.nest(PRODUCTS_BASE, product_routes());
    }
    if roles.suppliers {
        app = app.nest(SUPPLIERS_BASE, supplier_routes());
    }
    if roles.inventory {
        app = app
            .nest(WAREHOUSES_BASE, warehouse_routes())
            .nest(STOCK_BASE, stock_routes());
    }
    if roles.purchasing {
        app = app.nest(ORDERS_BASE, order_routes());
    }
    app.with_state(runtime)
}

fn healthz(rt: &InventoryRuntime, roles: ServiceRoles) -> (StatusCode, Json<HealthResponse>) {
    let mut services = Vec::new();
    for (enabled, name) in [
        (roles.products, "products"),
        (roles.suppliers, "suppliers"),
        (roles.inventory, "inventory"),
        (roles.purchasing, "purchasing"),
    ] {
        if enabled {
            services.push(name.to_string());
        }
    }
    let status = match rt.read(|_| ()) {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "runtime lock poisoned"),
    };
    (
        status.0,
        Json(HealthResponse {
            status: status.1.to_string(),
            services,
            persistence: rt.journal_path().is_some(),
        }),
    )
}

fn product_routes() -> Router<InventoryRuntime> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:id/estado", patch(set_product_status))
        .route("/sku/:sku", get(product_by_sku))
        .route("/categoria/:categoria", get(products_by_category))
        .route("/estado/:estado", get(products_by_status))
        .route("/buscar", get(search_products))
}

fn supplier_routes() -> Router<InventoryRuntime> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/:id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
        .route("/:id/estado", patch(set_supplier_status))
        .route("/nit/:nit", get(supplier_by_tax_id))
        .route("/estado/:estado", get(suppliers_by_status))
        .route("/buscar", get(search_suppliers))
}

fn warehouse_routes() -> Router<InventoryRuntime> {
    Router::new()
        .route("/", get(list_warehouses).post(create_warehouse))
        .route(
            "/:id",
            get(get_warehouse)
                .put(update_warehouse)
                .delete(delete_warehouse),
        )
        .route("/:id/estado", patch(set_warehouse_status))
        .route("/estado/:estado", get(warehouses_by_status))
        .route("/buscar", get(search_warehouses))
}

fn stock_routes() -> Router<InventoryRuntime> {
    Router::new()
        .route("/", get(list_stock).post(create_stock))
        .route("/:id", get(get_stock).put(update_stock).delete(delete_stock))
        .route("/producto/:product_id", get(stock_by_product))
        .route(
            "/producto/:product_id/bodega/:warehouse_id",
            get(stock_for_pair),
        )
        .route(
            "/producto/:product_id/bodega/:warehouse_id/actualizar-stock",
            patch(set_stock),
        )
        .route(
            "/producto/:product_id/bodega/:warehouse_id/agregar-stock",
            patch(add_stock),
        )
        .route(
            "/producto/:product_id/bodega/:warehouse_id/reducir-stock",
            patch(reduce_stock),
        )
        .route("/bodega/:warehouse_id", get(stock_by_warehouse))
        .route("/stock-critico", get(critical_stock))
        .route("/stock-critico/bodega/:warehouse_id", get(critical_stock_in))
}

fn order_routes() -> Router<InventoryRuntime> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order).put(update_order).delete(delete_order))
        .route("/:id/estado", put(change_order_status))
        .route("/:id/detalles", post(add_order_line))
        .route(
            "/:id/detalles/:line_id",
            put(update_order_line).delete(remove_order_line),
        )
        .route("/:id/validar/cambio-estado", get(validate_transition))
        .route("/estado/:estado", get(orders_by_status))
        .route("/proveedor/:supplier_id", get(orders_by_supplier))
        .route("/rango-fechas", get(orders_in_range))
        .route("/factura", get(orders_by_invoice))
        .route("/pendientes", get(pending_orders))
        .route("/en-proceso", get(in_progress_orders))
        .route("/completadas", get(completed_orders))
        .route("/canceladas", get(cancelled_orders))
        .route("/estadisticas/contar-por-estado", get(count_orders_by_status))
        .route(
            "/estadisticas/total-por-proveedor/:supplier_id",
            get(total_by_supplier),
        )
        .route("/estadisticas/total-por-rango-fechas", get(total_in_range))
        .route("/validar/numero-factura", get(invoice_exists))
        .route("/resumen", get(order_summary))
}

#[derive(Debug, Deserialize)]
struct NameQuery {
    nombre: String,
}

#[derive(Debug, Deserialize)]
struct RecordStatusQuery {
    estado: String,
}

#[derive(Debug, Deserialize)]
struct AmountQuery {
    cantidad: i64,
}

#[derive(Debug, Deserialize)]
struct SetQuantityQuery {
    #[serde(rename = "nuevaCantidad")]
    new_quantity: i64,
}

#[derive(Debug, Deserialize)]
struct DateRangeQuery {
    #[serde(rename = "fechaInicio")]
    from: String,
    #[serde(rename = "fechaFin")]
    to: String,
}

#[derive(Debug, Deserialize)]
struct InvoiceQuery {
    #[serde(rename = "numeroFactura")]
    invoice_number: String,
}

#[derive(Debug, Deserialize)]
struct OrderStatusQuery {
    estado: String,
}

#[derive(Debug, Deserialize)]
struct TargetStatusQuery {
    #[serde(rename = "nuevoEstado")]
    to: String,
}

fn owned<T: Clone>(rows: Vec<&T>) -> Vec<T> {
    rows.into_iter().cloned().collect()
}

fn found<T>(row: Option<T>, table: &'static str, key: impl ToString) -> Result<T, ApiError> {
    row.ok_or_else(|| {
        StorageError::NotFound {
            table,
            key: key.to_string(),
        }
        .into()
    })
}

fn saved<T>(rt: &InventoryRuntime, command: StoreCommand) -> Result<T, ApiError>
where
    T: TryFrom<CommandOutcome, Error = RuntimeError>,
{
    let outcome = api::execute(rt, command)?;
    Ok(T::try_from(outcome)?)
}

fn created<T>(rt: &InventoryRuntime, command: StoreCommand) -> Created<T>
where
    T: TryFrom<CommandOutcome, Error = RuntimeError>,
{
    Ok((StatusCode::CREATED, Json(saved(rt, command)?)))
}

fn removed(rt: &InventoryRuntime, command: StoreCommand) -> Result<StatusCode, ApiError> {
    api::execute(rt, command)?;
    Ok(StatusCode::NO_CONTENT)
}

fn invalid_param(field: &str, message: String) -> ApiError {
    ApiError {
        errors: BTreeMap::from([(field.to_string(), message.clone())]),
        ..ApiError::bad_request(message)
    }
}

fn record_status(field: &str, raw: &str) -> Result<RecordStatus, ApiError> {
    RecordStatus::parse(raw).ok_or_else(|| {
        invalid_param(
            field,
            format!("'{raw}' is not a valid status; expected ACTIVO or INACTIVO"),
        )
    })
}

fn order_status(field: &str, raw: &str) -> Result<OrderStatus, ApiError> {
    OrderStatus::parse(raw).ok_or_else(|| {
        let expected = OrderStatus::ALL
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        invalid_param(
            field,
            format!("'{raw}' is not a valid order status; expected one of {expected}"),
        )
    })
}

fn date_param(field: &str, raw: &str) -> Result<NaiveDateTime, ApiError> {
    parse_wire_datetime(raw)
        .ok_or_else(|| invalid_param(field, format!("'{raw}' is not a valid date-time")))
}

fn date_range(q: &DateRangeQuery) -> Result<(NaiveDateTime, NaiveDateTime), ApiError> {
    Ok((
        date_param("fechaInicio", &q.from)?,
        date_param("fechaFin", &q.to)?,
    ))
}

// products

async fn list_products(State(rt): State<InventoryRuntime>) -> ApiResult<Vec<ProductRecord>> {
    Ok(Json(rt.read(|s| owned(s.product_rows()))?))
}

async fn get_product(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<ProductRecord> {
    let row = rt.read(|s| s.product_row(ProductId(id)).cloned())?;
    Ok(Json(found(row, "products.id", id)?))
}

async fn product_by_sku(
    State(rt): State<InventoryRuntime>,
    ApiPath(sku): ApiPath<String>,
) -> ApiResult<ProductRecord> {
    let row = rt.read(|s| s.product_by_sku_row(&sku).cloned())?;
    Ok(Json(found(row, "products.sku", &sku)?))
}

async fn products_by_category(
    State(rt): State<InventoryRuntime>,
    ApiPath(category): ApiPath<String>,
) -> ApiResult<Vec<ProductRecord>> {
    Ok(Json(rt.read(|s| owned(s.product_rows_by_category(&category)))?))
}

async fn products_by_status(
    State(rt): State<InventoryRuntime>,
    ApiPath(raw): ApiPath<String>,
) -> ApiResult<Vec<ProductRecord>> {
    let status = record_status("estado", &raw)?;
    Ok(Json(rt.read(|s| owned(s.product_rows_by_status(status)))?))
}

async fn search_products(
    State(rt): State<InventoryRuntime>,
    ApiQuery(q): ApiQuery<NameQuery>,
) -> ApiResult<Vec<ProductRecord>> {
    Ok(Json(rt.read(|s| owned(s.product_search_rows(&q.nombre)))?))
}

async fn create_product(
    State(rt): State<InventoryRuntime>,
    ApiJson(draft): ApiJson<ProductDraft>,
) -> Created<ProductRecord> {
    created(&rt, StoreCommand::ProductCreate { draft })
}

async fn update_product(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(draft): ApiJson<ProductDraft>,
) -> ApiResult<ProductRecord> {
    let id = ProductId(id);
    Ok(Json(saved(&rt, StoreCommand::ProductUpdate { id, draft })?))
}

async fn set_product_status(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(q): ApiQuery<RecordStatusQuery>,
) -> ApiResult<ProductRecord> {
    let status = record_status("estado", &q.estado)?;
    let id = ProductId(id);
    Ok(Json(saved(&rt, StoreCommand::ProductSetStatus { id, status })?))
}

async fn delete_product(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    removed(&rt, StoreCommand::ProductDelete { id: ProductId(id) })
}

// suppliers

async fn list_suppliers(State(rt): State<InventoryRuntime>) -> ApiResult<Vec<SupplierRecord>> {
    Ok(Json(rt.read(|s| owned(s.supplier_rows()))?))
}

async fn get_supplier(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<SupplierRecord> {
    let row = rt.read(|s| s.supplier_row(SupplierId(id)).cloned())?;
    Ok(Json(found(row, "suppliers.id", id)?))
}

async fn supplier_by_tax_id(
    State(rt): State<InventoryRuntime>,
    ApiPath(tax_id): ApiPath<String>,
) -> ApiResult<SupplierRecord> {
    let row = rt.read(|s| s.supplier_by_tax_id_row(&tax_id).cloned())?;
    Ok(Json(found(row, "suppliers.tax_id", &tax_id)?))
}

async fn suppliers_by_status(
    State(rt): State<InventoryRuntime>,
    ApiPath(raw): ApiPath<String>,
) -> ApiResult<Vec<SupplierRecord>> {
    let status = record_status("estado", &raw)?;
    Ok(Json(rt.read(|s| owned(s.supplier_rows_by_status(status)))?))
}

async fn search_suppliers(
    State(rt): State<InventoryRuntime>,
    ApiQuery(q): ApiQuery<NameQuery>,
) -> ApiResult<Vec<SupplierRecord>> {
    Ok(Json(rt.read(|s| owned(s.supplier_search_rows(&q.nombre)))?))
}

async fn create_supplier(
    State(rt): State<InventoryRuntime>,
    ApiJson(draft): ApiJson<SupplierDraft>,
) -> Created<SupplierRecord> {
    created(&rt, StoreCommand::SupplierCreate { draft })
}

async fn update_supplier(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(draft): ApiJson<SupplierDraft>,
) -> ApiResult<SupplierRecord> {
    let id = SupplierId(id);
    Ok(Json(saved(&rt, StoreCommand::SupplierUpdate { id, draft })?))
}

async fn set_supplier_status(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(q): ApiQuery<RecordStatusQuery>,
) -> ApiResult<SupplierRecord> {
    let status = record_status("estado", &q.estado)?;
    let id = SupplierId(id);
    Ok(Json(saved(&rt, StoreCommand::SupplierSetStatus { id, status })?))
}

async fn delete_supplier(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    removed(&rt, StoreCommand::SupplierDelete { id: SupplierId(id) })
}

// warehouses

async fn list_warehouses(State(rt): State<InventoryRuntime>) -> ApiResult<Vec<WarehouseRecord>> {
    Ok(Json(rt.read(|s| owned(s.warehouse_rows()))?))
}

async fn get_warehouse(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<WarehouseRecord> {
    let row = rt.read(|s| s.warehouse_row(WarehouseId(id)).cloned())?;
    Ok(Json(found(row, "warehouses.id", id)?))
}

async fn warehouses_by_status(
    State(rt): State<InventoryRuntime>,
    ApiPath(raw): ApiPath<String>,
) -> ApiResult<Vec<WarehouseRecord>> {
    let status = record_status("estado", &raw)?;
    Ok(Json(rt.read(|s| owned(s.warehouse_rows_by_status(status)))?))
}

async fn search_warehouses(
    State(rt): State<InventoryRuntime>,
    ApiQuery(q): ApiQuery<NameQuery>,
) -> ApiResult<Vec<WarehouseRecord>> {
    Ok(Json(rt.read(|s| owned(s.warehouse_search_rows(&q.nombre)))?))
}

async fn create_warehouse(
    State(rt): State<InventoryRuntime>,
    ApiJson(draft): ApiJson<WarehouseDraft>,
) -> Created<WarehouseRecord> {
    created(&rt, StoreCommand::WarehouseCreate { draft })
}

async fn update_warehouse(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(draft): ApiJson<WarehouseDraft>,
) -> ApiResult<WarehouseRecord> {
    let id = WarehouseId(id);
    Ok(Json(saved(&rt, StoreCommand::WarehouseUpdate { id, draft })?))
}

async fn set_warehouse_status(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(q): ApiQuery<RecordStatusQuery>,
) -> ApiResult<WarehouseRecord> {
    let status = record_status("estado", &q.estado)?;
    let id = WarehouseId(id);
    Ok(Json(saved(&rt, StoreCommand::WarehouseSetStatus { id, status })?))
}

async fn delete_warehouse(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    removed(&rt, StoreCommand::WarehouseDelete { id: WarehouseId(id) })
}

// stock

async fn list_stock(State(rt): State<InventoryRuntime>) -> ApiResult<Vec<StockRecord>> {
    Ok(Json(rt.read(|s| owned(s.stock_rows()))?))
}

async fn get_stock(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<StockRecord> {
    let row = rt.read(|s| s.stock_row(StockRecordId(id)).cloned())?;
    Ok(Json(found(row, "stock_records.id", id)?))
}

async fn stock_for_pair(
    State(rt): State<InventoryRuntime>,
    ApiPath((product_id, warehouse_id)): ApiPath<(u64, u64)>,
) -> ApiResult<StockRecord> {
    let row = rt.read(|s| {
        s.stock_pair_row(ProductId(product_id), WarehouseId(warehouse_id))
            .cloned()
    })?;
    Ok(Json(found(
        row,
        "stock_records(product_id,warehouse_id)",
        format!("({product_id},{warehouse_id})"),
    )?))
}

async fn stock_by_warehouse(
    State(rt): State<InventoryRuntime>,
    ApiPath(warehouse_id): ApiPath<u64>,
) -> ApiResult<Vec<StockRecord>> {
    Ok(Json(rt.read(|s| {
        owned(s.stock_rows_by_warehouse(WarehouseId(warehouse_id)))
    })?))
}

async fn stock_by_product(
    State(rt): State<InventoryRuntime>,
    ApiPath(product_id): ApiPath<u64>,
) -> ApiResult<Vec<StockRecord>> {
    Ok(Json(rt.read(|s| owned(s.stock_rows_by_product(ProductId(product_id))))?))
}

async fn critical_stock(State(rt): State<InventoryRuntime>) -> ApiResult<Vec<StockRecord>> {
    Ok(Json(rt.read(|s| owned(s.stock_critical_rows(None)))?))
}

async fn critical_stock_in(
    State(rt): State<InventoryRuntime>,
    ApiPath(warehouse_id): ApiPath<u64>,
) -> ApiResult<Vec<StockRecord>> {
    Ok(Json(rt.read(|s| {
        owned(s.stock_critical_rows(Some(WarehouseId(warehouse_id))))
    })?))
}

async fn create_stock(
    State(rt): State<InventoryRuntime>,
    ApiJson(draft): ApiJson<StockDraft>,
) -> Created<StockRecord> {
    created(&rt, StoreCommand::StockCreate { draft })
}

async fn update_stock(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(draft): ApiJson<StockDraft>,
) -> ApiResult<StockRecord> {
    let id = StockRecordId(id);
    Ok(Json(saved(&rt, StoreCommand::StockUpdate { id, draft })?))
}

fn adjust(
    rt: &InventoryRuntime,
    (product_id, warehouse_id): (u64, u64),
    adjustment: StockAdjustment,
) -> ApiResult<StockRecord> {
    Ok(Json(saved(
        rt,
        StoreCommand::StockAdjust {
            product_id: ProductId(product_id),
            warehouse_id: WarehouseId(warehouse_id),
            adjustment,
        },
    )?))
}

async fn set_stock(
    State(rt): State<InventoryRuntime>,
    ApiPath(pair): ApiPath<(u64, u64)>,
    ApiQuery(q): ApiQuery<SetQuantityQuery>,
) -> ApiResult<StockRecord> {
    adjust(&rt, pair, StockAdjustment::Set(q.new_quantity))
}

async fn add_stock(
    State(rt): State<InventoryRuntime>,
    ApiPath(pair): ApiPath<(u64, u64)>,
    ApiQuery(q): ApiQuery<AmountQuery>,
) -> ApiResult<StockRecord> {
    adjust(&rt, pair, StockAdjustment::Add(q.cantidad))
}

async fn reduce_stock(
    State(rt): State<InventoryRuntime>,
    ApiPath(pair): ApiPath<(u64, u64)>,
    ApiQuery(q): ApiQuery<AmountQuery>,
) -> ApiResult<StockRecord> {
    adjust(&rt, pair, StockAdjustment::Reduce(q.cantidad))
}

async fn delete_stock(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    removed(&rt, StoreCommand::StockDelete { id: StockRecordId(id) })
}

// purchase orders

async fn list_orders(State(rt): State<InventoryRuntime>) -> ApiResult<Vec<PurchaseOrderRecord>> {
    Ok(Json(rt.read(|s| owned(s.order_rows()))?))
}

async fn get_order(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<PurchaseOrderRecord> {
    let row = rt.read(|s| s.order_row(PurchaseOrderId(id)).cloned())?;
    Ok(Json(found(row, "purchase_orders.id", id)?))
}

async fn create_order(
    State(rt): State<InventoryRuntime>,
    ApiJson(draft): ApiJson<PurchaseOrderDraft>,
) -> Created<PurchaseOrderRecord> {
    created(&rt, StoreCommand::OrderCreate { draft })
}

async fn update_order(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(header): ApiJson<PurchaseOrderHeader>,
) -> ApiResult<PurchaseOrderRecord> {
    let id = PurchaseOrderId(id);
    Ok(Json(saved(&rt, StoreCommand::OrderUpdate { id, header })?))
}

async fn delete_order(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
) -> Result<StatusCode, ApiError> {
    removed(&rt, StoreCommand::OrderDelete { id: PurchaseOrderId(id) })
}

async fn change_order_status(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(q): ApiQuery<TargetStatusQuery>,
) -> ApiResult<PurchaseOrderRecord> {
    let to = order_status("nuevoEstado", &q.to)?;
    let id = PurchaseOrderId(id);
    Ok(Json(saved(&rt, StoreCommand::OrderChangeStatus { id, to })?))
}

async fn add_order_line(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(line): ApiJson<OrderLineDraft>,
) -> Created<PurchaseOrderRecord> {
    let id = PurchaseOrderId(id);
    created(&rt, StoreCommand::OrderLineAdd { id, line })
}

async fn update_order_line(
    State(rt): State<InventoryRuntime>,
    ApiPath((id, line_id)): ApiPath<(u64, u64)>,
    ApiJson(line): ApiJson<OrderLineDraft>,
) -> ApiResult<PurchaseOrderRecord> {
    Ok(Json(saved(
        &rt,
        StoreCommand::OrderLineUpdate {
            id: PurchaseOrderId(id),
            line_id: OrderLineId(line_id),
            line,
        },
    )?))
}

async fn remove_order_line(
    State(rt): State<InventoryRuntime>,
    ApiPath((id, line_id)): ApiPath<(u64, u64)>,
) -> ApiResult<PurchaseOrderRecord> {
    Ok(Json(saved(
        &rt,
        StoreCommand::OrderLineRemove {
            id: PurchaseOrderId(id),
            line_id: OrderLineId(line_id),
        },
    )?))
}

async fn validate_transition(
    State(rt): State<InventoryRuntime>,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(q): ApiQuery<TargetStatusQuery>,
) -> ApiResult<bool> {
    let to = order_status("nuevoEstado", &q.to)?;
    Ok(Json(rt.read(|s| {
        s.order_can_transition_row(PurchaseOrderId(id), to)
    })??))
}

fn with_status(rt: &InventoryRuntime, status: OrderStatus) -> ApiResult<Vec<PurchaseOrderRecord>> {
    Ok(Json(rt.read(|s| owned(s.order_rows_by_status(status)))?))
}

async fn orders_by_status(
    State(rt): State<InventoryRuntime>,
    ApiPath(raw): ApiPath<String>,
) -> ApiResult<Vec<PurchaseOrderRecord>> {
    with_status(&rt, order_status("estado", &raw)?)
}

async fn pending_orders(State(rt): State<InventoryRuntime>) -> ApiResult<Vec<PurchaseOrderRecord>> {
    with_status(&rt, OrderStatus::Pending)
}

async fn in_progress_orders(
    State(rt): State<InventoryRuntime>,
) -> ApiResult<Vec<PurchaseOrderRecord>> {
    with_status(&rt, OrderStatus::InProgress)
}

async fn completed_orders(
    State(rt): State<InventoryRuntime>,
) -> ApiResult<Vec<PurchaseOrderRecord>> {
    with_status(&rt, OrderStatus::Completed)
}

async fn cancelled_orders(
    State(rt): State<InventoryRuntime>,
) -> ApiResult<Vec<PurchaseOrderRecord>> {
    with_status(&rt, OrderStatus::Cancelled)
}

async fn orders_by_supplier(
    State(rt): State<InventoryRuntime>,
    ApiPath(supplier_id): ApiPath<u64>,
) -> ApiResult<Vec<PurchaseOrderRecord>> {
    Ok(Json(rt.read(|s| owned(s.order_rows_by_supplier(SupplierId(supplier_id))))?))
}

async fn orders_in_range(
    State(rt): State<InventoryRuntime>,
    ApiQuery(q): ApiQuery<DateRangeQuery>,
) -> ApiResult<Vec<PurchaseOrderRecord>> {
    let (from, to) = date_range(&q)?;
    Ok(Json(rt.read(|s| owned(s.order_rows_issued_between(from, to)))?))
}

async fn orders_by_invoice(
    State(rt): State<InventoryRuntime>,
    ApiQuery(q): ApiQuery<InvoiceQuery>,
) -> ApiResult<Vec<PurchaseOrderRecord>> {
    Ok(Json(rt.read(|s| {
        owned(s.order_rows_by_invoice_fragment(&q.invoice_number))
    })?))
}

async fn count_orders_by_status(
    State(rt): State<InventoryRuntime>,
    ApiQuery(q): ApiQuery<OrderStatusQuery>,
) -> ApiResult<u64> {
    let status = order_status("estado", &q.estado)?;
    Ok(Json(rt.read(|s| s.order_count_by_status_row(status))?))
}

async fn total_by_supplier(
    State(rt): State<InventoryRuntime>,
    ApiPath(supplier_id): ApiPath<u64>,
) -> ApiResult<Decimal> {
    let total = rt.read(|s| s.order_total_by_supplier_row(SupplierId(supplier_id)))??;
    Ok(Json(total))
}

async fn total_in_range(
    State(rt): State<InventoryRuntime>,
    ApiQuery(q): ApiQuery<DateRangeQuery>,
) -> ApiResult<Decimal> {
    let (from, to) = date_range(&q)?;
    Ok(Json(rt.read(|s| s.order_total_issued_between_row(from, to))??))
}

async fn invoice_exists(
    State(rt): State<InventoryRuntime>,
    ApiQuery(q): ApiQuery<InvoiceQuery>,
) -> ApiResult<bool> {
    Ok(Json(rt.read(|s| s.invoice_number_exists_row(&q.invoice_number))?))
}

async fn order_summary(State(rt): State<InventoryRuntime>) -> ApiResult<OrderStatusSummary> {
    let now = local_now();
    Ok(Json(rt.read(|s| s.order_status_summary_row(month_start(now), now))??))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use stockroom_contracts::purchase_order::DEFAULT_TAX_RATE;
    use stockroom_os::console::{ConsoleBackend, ConsoleRuntime};

    use crate::api::ErrorResponse;
    use crate::client::HttpBackend;
    use crate::config::ServiceUrls;

    fn spawn_server(runtime: InventoryRuntime, roles: ServiceRoles) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener.set_nonblocking(true).unwrap();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, router(runtime, roles)).await.unwrap();
            });
        });
        format!("http://{addr}")
    }

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(ServiceUrls::single(base).unwrap(), Duration::from_secs(5))
    }

    fn error_body(err: ureq::Error) -> (u16, ErrorResponse) {
        match err {
            ureq::Error::Status(code, resp) => (code, resp.into_json().unwrap()),
            other => panic!("expected http status error, got {other}"),
        }
    }

    fn product(name: &str, sku: &str) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            sku: sku.to_string(),
            description: Some("saco 50kg".to_string()),
            price: Decimal::new(850, 2),
            category: "Obra".to_string(),
            status: None,
        }
    }

    fn warehouse(name: &str) -> WarehouseDraft {
        WarehouseDraft {
            name: name.to_string(),
            address: "Av. Amazonas 100".to_string(),
            capacity: 1_000,
            status: None,
        }
    }

    fn order(product: &ProductRecord, quantity: i64, invoice: &str) -> PurchaseOrderDraft {
        PurchaseOrderDraft {
            header: PurchaseOrderHeader {
                supplier_id: SupplierId(1),
                invoice_number: invoice.to_string(),
                issued_at: parse_wire_datetime("2024-05-10T09:30").unwrap(),
                delivery_at: None,
                notes: None,
            },
            lines: vec![OrderLineDraft {
                product_id: product.id,
                product_name: product.name.clone(),
                quantity,
                unit_price: Decimal::new(1000, 2),
                discount_pct: Decimal::ZERO,
            }],
        }
    }

    #[test]
    fn at_http_01_product_routes_and_error_envelope() {
        let base = spawn_server(
            InventoryRuntime::new_in_memory(DEFAULT_TAX_RATE),
            ServiceRoles::all(),
        );
        let b = backend(&base);

        let created = b.create_product(&product("Cemento gris", "CEM-01")).unwrap();
        assert_eq!(created.status, RecordStatus::Active);
        assert_eq!(b.get_product(created.id).unwrap(), created);

        let dup = b.create_product(&product("Otro cemento", "cem-01")).unwrap_err();
        assert_eq!(dup.status, Some(409));
        assert!(dup.errors.contains_key("sku"));

        let invalid = b.create_product(&product("x", "C")).unwrap_err();
        assert_eq!(invalid.status, Some(400));
        assert!(invalid.errors.contains_key("nombre"));
        assert!(invalid.errors.contains_key("sku"));

        let by_sku: ProductRecord = ureq::get(&format!("{base}/api/productos/sku/CEM-01"))
            .call()
            .unwrap()
            .into_json()
            .unwrap();
        assert_eq!(by_sku.id, created.id);

        let (code, body) = error_body(
            ureq::get(&format!("{base}/api/productos/estado/BORRADO"))
                .call()
                .unwrap_err(),
        );
        assert_eq!(code, 400);
        assert_eq!(body.status, 400);
        assert!(body.errors.contains_key("estado"));

        let inactive = b
            .set_product_status(created.id, RecordStatus::Inactive)
            .unwrap();
        assert_eq!(inactive.status, RecordStatus::Inactive);
        assert_eq!(b.search_products("gris").unwrap().len(), 1);

        b.delete_product(created.id).unwrap();
        assert!(b.get_product(created.id).unwrap_err().is_not_found());
    }

    #[test]
    fn at_http_02_order_state_machine_over_rest() {
        let base = spawn_server(
            InventoryRuntime::new_in_memory(DEFAULT_TAX_RATE),
            ServiceRoles::all(),
        );
        let b = backend(&base);
        let p = b.create_product(&product("Cemento gris", "CEM-01")).unwrap();
        let created = b.create_order(&order(&p, 3, "FAC-100")).unwrap();
        assert_eq!(created.status, OrderStatus::Pending);
        assert_eq!(created.subtotal, Decimal::new(3000, 2));
        assert_eq!(created.total, created.subtotal + created.tax);

        let (code, body) = error_body(
            ureq::put(&format!("{base}/api/ordenes-compra/{}/estado", created.id))
                .query("nuevoEstado", "COMPLETADA")
                .call()
                .unwrap_err(),
        );
        assert_eq!(code, 400);
        assert!(body.message.contains("PENDIENTE"));
        assert!(body.message.contains("COMPLETADA"));

        let can: bool = ureq::get(&format!(
            "{base}/api/ordenes-compra/{}/validar/cambio-estado",
            created.id
        ))
        .query("nuevoEstado", "EN_PROCESO")
        .call()
        .unwrap()
        .into_json()
        .unwrap();
        assert!(can);

        let started = b
            .change_order_status(created.id, OrderStatus::InProgress)
            .unwrap();
        assert_eq!(started.status, OrderStatus::InProgress);
        let locked = b
            .add_order_line(created.id, &order(&p, 1, "FAC-100").lines[0])
            .unwrap_err();
        assert_eq!(locked.status, Some(400));

        let in_progress: Vec<PurchaseOrderRecord> =
            ureq::get(&format!("{base}/api/ordenes-compra/en-proceso"))
                .call()
                .unwrap()
                .into_json()
                .unwrap();
        assert_eq!(in_progress.len(), 1);

        let count: u64 = ureq::get(&format!(
            "{base}/api/ordenes-compra/estadisticas/contar-por-estado"
        ))
        .query("estado", "EN_PROCESO")
        .call()
        .unwrap()
        .into_json()
        .unwrap();
        assert_eq!(count, 1);

        let exists: bool = ureq::get(&format!("{base}/api/ordenes-compra/validar/numero-factura"))
            .query("numeroFactura", "FAC-100")
            .call()
            .unwrap()
            .into_json()
            .unwrap();
        assert!(exists);

        let in_range: Vec<PurchaseOrderRecord> =
            ureq::get(&format!("{base}/api/ordenes-compra/rango-fechas"))
                .query("fechaInicio", "2024-05-01")
                .query("fechaFin", "2024-05-31T23:59:59")
                .call()
                .unwrap()
                .into_json()
                .unwrap();
        assert_eq!(in_range.len(), 1);

        let summary = b.order_summary().unwrap();
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.pending, 0);
    }

    #[test]
    fn at_http_03_roles_limit_mounted_services() {
        let roles = ServiceRoles {
            products: true,
            ..ServiceRoles::none()
        };
        let base = spawn_server(InventoryRuntime::new_in_memory(DEFAULT_TAX_RATE), roles);
        let health: HealthResponse = ureq::get(&format!("{base}/healthz"))
            .call()
            .unwrap()
            .into_json()
            .unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.services, vec!["products".to_string()]);
        assert!(!health.persistence);

        match ureq::get(&format!("{base}/api/ordenes-compra")).call() {
            Err(ureq::Error::Status(code, _)) => assert_eq!(code, 404),
            other => panic!("expected 404, got {other:?}"),
        }
    }

    #[test]
    fn at_http_04_console_completion_through_inventory_routes() {
        let base = spawn_server(
            InventoryRuntime::new_in_memory(DEFAULT_TAX_RATE),
            ServiceRoles::all(),
        );
        let console = ConsoleRuntime::new(backend(&base));
        let b = console.backend();
        let first = b.create_warehouse(&warehouse("Central")).unwrap();
        b.create_warehouse(&warehouse("Norte")).unwrap();
        let cement = b.create_product(&product("Cemento gris", "CEM-01")).unwrap();
        let sand = b.create_product(&product("Arena fina", "ARE-01")).unwrap();
        b.create_stock(&StockDraft {
            product_id: cement.id,
            warehouse_id: first.id,
            quantity: 10,
            min_quantity: 2,
        })
        .unwrap();

        let mut draft = order(&cement, 4, "FAC-200");
        draft.lines.extend(order(&sand, 1, "FAC-200").lines);
        let created = b.create_order(&draft).unwrap();
        console
            .change_order_status(created.id, OrderStatus::InProgress)
            .unwrap();
        let change = console
            .change_order_status(created.id, OrderStatus::Completed)
            .unwrap();

        assert_eq!(change.order.status, OrderStatus::Completed);
        let report = change.completion.unwrap().unwrap();
        assert_eq!(report.warehouse_id, Some(first.id));
        assert_eq!(report.applied().count(), 1);
        assert_eq!(report.failures().count(), 1);
        let stock = b.stock_by_warehouse(first.id).unwrap();
        assert_eq!(stock[0].quantity, 6);

        let refused = console
            .change_order_status(created.id, OrderStatus::Cancelled)
            .unwrap_err();
        assert!(refused.to_string().contains("COMPLETADA"));
    }
}
