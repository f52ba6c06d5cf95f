#![forbid(unsafe_code)]

use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use stockroom_contracts::dashboard::DashboardSummary;
use stockroom_contracts::product::{ProductDraft, ProductId};
use stockroom_contracts::purchase_order::{
    suggest_invoice_number, OrderLineDraft, OrderLineId, OrderStatus, PurchaseOrderDraft,
    PurchaseOrderHeader, PurchaseOrderId, PurchaseOrderRecord,
};
use stockroom_contracts::stock::{StockAdjustment, StockDraft, StockRecordId};
use stockroom_contracts::supplier::{SupplierDraft, SupplierId};
use stockroom_contracts::warehouse::{WarehouseDraft, WarehouseId};
use stockroom_contracts::{format_wire_datetime, parse_wire_datetime, RecordStatus};
use stockroom_os::console::{ConsoleBackend, ConsoleRuntime, StatusChange};
use stockroom_os::dashboard::{collect_dashboard, DashboardSnapshot};

use crate::grid;

const DEFAULT_MIN_QUANTITY: i64 = 10;

#[derive(Debug, Clone, Parser)]
#[command(name = "stockroom", about = "Inventory admin console")]
pub struct Cli {
    /// Use an in-process store persisted to this journal instead of the REST services.
    #[arg(long, value_name = "JOURNAL", global = true)]
    pub local: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    #[command(subcommand)]
    Products(ProductCommand),
    #[command(subcommand)]
    Suppliers(SupplierCommand),
    #[command(subcommand)]
    Warehouses(WarehouseCommand),
    #[command(subcommand)]
    Stock(StockCommand),
    #[command(subcommand)]
    Orders(OrderCommand),
    /// Totals across every service.
    Dashboard {
        /// Keep refreshing every STOCKROOM_DASHBOARD_REFRESH_SECS seconds.
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ProductCommand {
    List {
        /// Case-insensitive name filter.
        #[arg(long)]
        search: Option<String>,
    },
    Show {
        id: u64,
    },
    Create(ProductFields),
    Update {
        id: u64,
        #[command(flatten)]
        fields: ProductFields,
    },
    Status {
        id: u64,
        #[arg(value_parser = parse_record_status)]
        status: RecordStatus,
    },
    Delete {
        id: u64,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct ProductFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub sku: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, value_parser = parse_decimal)]
    pub price: Option<Decimal>,
    #[arg(long)]
    pub category: Option<String>,
}

impl ProductFields {
    fn apply(&self, mut draft: ProductDraft) -> ProductDraft {
        if let Some(v) = &self.name {
            draft.name = v.clone();
        }
        if let Some(v) = &self.sku {
            draft.sku = v.clone();
        }
        if let Some(v) = &self.description {
            draft.description = Some(v.clone());
        }
        if let Some(v) = self.price {
            draft.price = v;
        }
        if let Some(v) = &self.category {
            draft.category = v.clone();
        }
        draft
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum SupplierCommand {
    List,
    Show {
        id: u64,
    },
    Create(SupplierFields),
    Update {
        id: u64,
        #[command(flatten)]
        fields: SupplierFields,
    },
    Status {
        id: u64,
        #[arg(value_parser = parse_record_status)]
        status: RecordStatus,
    },
    Delete {
        id: u64,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct SupplierFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long = "tax-id")]
    pub tax_id: Option<String>,
    #[arg(long)]
    pub contact: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

impl SupplierFields {
    fn apply(&self, mut draft: SupplierDraft) -> SupplierDraft {
        if let Some(v) = &self.name {
            draft.name = v.clone();
        }
        if let Some(v) = &self.tax_id {
            draft.tax_id = v.clone();
        }
        if let Some(v) = &self.contact {
            draft.contact = v.clone();
        }
        if let Some(v) = &self.email {
            draft.email = v.clone();
        }
        if let Some(v) = &self.phone {
            draft.phone = Some(v.clone());
        }
        if let Some(v) = &self.address {
            draft.address = v.clone();
        }
        if let Some(v) = &self.notes {
            draft.notes = Some(v.clone());
        }
        draft
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum WarehouseCommand {
    List,
    Show {
        id: u64,
    },
    Create(WarehouseFields),
    Update {
        id: u64,
        #[command(flatten)]
        fields: WarehouseFields,
    },
    Status {
        id: u64,
        #[arg(value_parser = parse_record_status)]
        status: RecordStatus,
    },
    Delete {
        id: u64,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct WarehouseFields {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub capacity: Option<i64>,
}

impl WarehouseFields {
    fn apply(&self, mut draft: WarehouseDraft) -> WarehouseDraft {
        if let Some(v) = &self.name {
            draft.name = v.clone();
        }
        if let Some(v) = &self.address {
            draft.address = v.clone();
        }
        if let Some(v) = self.capacity {
            draft.capacity = v;
        }
        draft
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum StockCommand {
    List {
        #[arg(long)]
        warehouse: Option<u64>,
        /// Only records at or below their minimum.
        #[arg(long)]
        critical: bool,
    },
    Create {
        #[arg(long)]
        product: u64,
        #[arg(long)]
        warehouse: u64,
        #[arg(long)]
        quantity: i64,
        #[arg(long = "min", default_value_t = DEFAULT_MIN_QUANTITY)]
        min_quantity: i64,
    },
    Update {
        id: u64,
        #[arg(long)]
        quantity: Option<i64>,
        #[arg(long = "min")]
        min_quantity: Option<i64>,
    },
    /// Overwrite the on-hand quantity.
    Set {
        #[command(flatten)]
        target: StockTarget,
        amount: i64,
    },
    Add {
        #[command(flatten)]
        target: StockTarget,
        amount: i64,
    },
    Reduce {
        #[command(flatten)]
        target: StockTarget,
        amount: i64,
    },
    Delete {
        id: u64,
    },
}

#[derive(Debug, Clone, Copy, Args)]
pub struct StockTarget {
    #[arg(long)]
    pub product: u64,
    #[arg(long)]
    pub warehouse: u64,
}

#[derive(Debug, Clone, Subcommand)]
pub enum OrderCommand {
    List {
        #[arg(long, value_parser = parse_order_status)]
        status: Option<OrderStatus>,
    },
    Show {
        id: u64,
    },
    Create {
        #[arg(long)]
        supplier: u64,
        /// Suggested from the current time when omitted.
        #[arg(long)]
        invoice: Option<String>,
        #[arg(long, value_parser = parse_datetime)]
        issued: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_datetime)]
        delivery: Option<NaiveDateTime>,
        #[arg(long)]
        notes: Option<String>,
        /// `product_id:quantity[:unit_price[:discount_pct]]`; price defaults to the product's.
        #[arg(long = "line", value_parser = parse_line_spec)]
        lines: Vec<LineSpec>,
    },
    Update {
        id: u64,
        #[arg(long)]
        supplier: Option<u64>,
        #[arg(long)]
        invoice: Option<String>,
        #[arg(long, value_parser = parse_datetime)]
        issued: Option<NaiveDateTime>,
        #[arg(long, value_parser = parse_datetime)]
        delivery: Option<NaiveDateTime>,
        #[arg(long)]
        notes: Option<String>,
    },
    Status {
        id: u64,
        #[arg(value_parser = parse_order_status)]
        status: OrderStatus,
    },
    Delete {
        id: u64,
    },
    AddLine {
        id: u64,
        #[arg(value_parser = parse_line_spec)]
        line: LineSpec,
    },
    UpdateLine {
        id: u64,
        line_id: u64,
        #[arg(value_parser = parse_line_spec)]
        line: LineSpec,
    },
    RemoveLine {
        id: u64,
        line_id: u64,
    },
    /// Count per status and the total issued this month.
    Summary,
}

/// An order line as typed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpec {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Option<Decimal>,
    pub discount_pct: Decimal,
}

pub fn parse_line_spec(raw: &str) -> Result<LineSpec, String> {
    let parts: Vec<&str> = raw.split(':').map(str::trim).collect();
    if !(2..=4).contains(&parts.len()) {
        return Err(format!(
            "invalid line '{raw}'. expected product_id:quantity[:unit_price[:discount_pct]]"
        ));
    }
    let product_id = parts[0]
        .parse::<u64>()
        .map_err(|_| format!("invalid product id '{}' in line '{raw}'", parts[0]))?;
    let quantity = parts[1]
        .parse::<i64>()
        .map_err(|_| format!("invalid quantity '{}' in line '{raw}'", parts[1]))?;
    let decimal = |s: &str, what: &str| {
        s.parse::<Decimal>()
            .map_err(|_| format!("invalid {what} '{s}' in line '{raw}'"))
    };
    let unit_price = match parts.get(2) {
        Some(s) if !s.is_empty() => Some(decimal(s, "unit price")?),
        _ => None,
    };
    let discount_pct = match parts.get(3) {
        Some(s) => decimal(s, "discount")?,
        None => Decimal::ZERO,
    };
    Ok(LineSpec {
        product_id: ProductId(product_id),
        quantity,
        unit_price,
        discount_pct,
    })
}

pub fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    raw.trim()
        .parse::<Decimal>()
        .map_err(|_| format!("invalid amount '{raw}'"))
}

pub fn parse_record_status(raw: &str) -> Result<RecordStatus, String> {
    RecordStatus::parse(raw)
        .ok_or_else(|| format!("unknown status '{raw}'. expected one of: ACTIVO, INACTIVO"))
}

pub fn parse_order_status(raw: &str) -> Result<OrderStatus, String> {
    OrderStatus::parse(raw).ok_or_else(|| {
        let allowed: Vec<&str> = OrderStatus::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown order status '{raw}'. expected one of: {}", allowed.join(", "))
    })
}

pub fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    parse_wire_datetime(raw)
        .ok_or_else(|| format!("invalid date '{raw}'. expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]"))
}

/// Runs one console command and returns what should be printed.
pub fn execute_console_command<B: ConsoleBackend>(
    console: &ConsoleRuntime<B>,
    command: &Command,
    now: NaiveDateTime,
) -> Result<String, String> {
    match command {
        Command::Products(cmd) => products(console, cmd),
        Command::Suppliers(cmd) => suppliers(console, cmd),
        Command::Warehouses(cmd) => warehouses(console, cmd),
        Command::Stock(cmd) => stock(console, cmd),
        Command::Orders(cmd) => orders(console, cmd, now),
        Command::Dashboard { .. } => Ok(render_dashboard(&collect_dashboard(console.backend()))),
    }
}

fn products<B: ConsoleBackend>(
    console: &ConsoleRuntime<B>,
    cmd: &ProductCommand,
) -> Result<String, String> {
    let backend = console.backend();
    match cmd {
        ProductCommand::List { search } => {
            let rows = match search {
                Some(name) => backend.search_products(name),
                None => backend.list_products(),
            }
            .map_err(|e| format!("failed to list products: {e}"))?;
            Ok(grid::products(&rows).render())
        }
        ProductCommand::Show { id } => {
            let p = backend
                .get_product(ProductId(*id))
                .map_err(|e| format!("failed to load product {id}: {e}"))?;
            let mut out = grid::products(std::slice::from_ref(&p)).render();
            if let Some(description) = &p.description {
                out.push_str(&format!("\n\n{description}"));
            }
            Ok(out)
        }
        ProductCommand::Create(fields) => {
            let draft = fields.apply(ProductDraft {
                name: String::new(),
                sku: String::new(),
                description: None,
                price: fields.price.ok_or_else(|| "missing --price".to_string())?,
                category: String::new(),
                status: None,
            });
            let done = console
                .save_product(None, draft)
                .map_err(|e| format!("failed to create product: {e}"))?;
            Ok(format!(
                "created product {} ({})\n\n{}",
                done.saved.id,
                done.saved.sku,
                grid::products(&done.list).render()
            ))
        }
        ProductCommand::Update { id, fields } => {
            let id = ProductId(*id);
            let current = backend
                .get_product(id)
                .map_err(|e| format!("failed to load product {id}: {e}"))?;
            let done = console
                .save_product(Some(id), fields.apply(current.as_draft()))
                .map_err(|e| format!("failed to update product {id}: {e}"))?;
            Ok(format!(
                "updated product {}\n\n{}",
                done.saved.id,
                grid::products(&done.list).render()
            ))
        }
        ProductCommand::Status { id, status } => {
            let p = backend
                .set_product_status(ProductId(*id), *status)
                .map_err(|e| format!("failed to change product status: {e}"))?;
            Ok(format!("product {} is now {}", p.id, p.status.as_str()))
        }
        ProductCommand::Delete { id } => {
            backend
                .delete_product(ProductId(*id))
                .map_err(|e| format!("failed to delete product {id}: {e}"))?;
            Ok(format!("deleted product {id}"))
        }
    }
}

fn suppliers<B: ConsoleBackend>(
    console: &ConsoleRuntime<B>,
    cmd: &SupplierCommand,
) -> Result<String, String> {
    let backend = console.backend();
    match cmd {
        SupplierCommand::List => {
            let rows = backend
                .list_suppliers()
                .map_err(|e| format!("failed to list suppliers: {e}"))?;
            Ok(grid::suppliers(&rows).render())
        }
        SupplierCommand::Show { id } => {
            let s = backend
                .get_supplier(SupplierId(*id))
                .map_err(|e| format!("failed to load supplier {id}: {e}"))?;
            let mut out = grid::suppliers(std::slice::from_ref(&s)).render();
            out.push_str(&format!("\n\n{}", s.address));
            if let Some(notes) = &s.notes {
                out.push_str(&format!("\n{notes}"));
            }
            Ok(out)
        }
        SupplierCommand::Create(fields) => {
            let draft = fields.apply(SupplierDraft {
                name: String::new(),
                tax_id: String::new(),
                contact: String::new(),
                email: String::new(),
                phone: None,
                address: String::new(),
                status: None,
                notes: None,
            });
            let done = console
                .save_supplier(None, draft)
                .map_err(|e| format!("failed to create supplier: {e}"))?;
            Ok(format!(
                "created supplier {} ({})\n\n{}",
                done.saved.id,
                done.saved.tax_id,
                grid::suppliers(&done.list).render()
            ))
        }
        SupplierCommand::Update { id, fields } => {
            let id = SupplierId(*id);
            let current = backend
                .get_supplier(id)
                .map_err(|e| format!("failed to load supplier {id}: {e}"))?;
            let done = console
                .save_supplier(Some(id), fields.apply(current.as_draft()))
                .map_err(|e| format!("failed to update supplier {id}: {e}"))?;
            Ok(format!(
                "updated supplier {}\n\n{}",
                done.saved.id,
                grid::suppliers(&done.list).render()
            ))
        }
        SupplierCommand::Status { id, status } => {
            let s = backend
                .set_supplier_status(SupplierId(*id), *status)
                .map_err(|e| format!("failed to change supplier status: {e}"))?;
            Ok(format!("supplier {} is now {}", s.id, s.status.as_str()))
        }
        SupplierCommand::Delete { id } => {
            backend
                .delete_supplier(SupplierId(*id))
                .map_err(|e| format!("failed to delete supplier {id}: {e}"))?;
            Ok(format!("deleted supplier {id}"))
        }
    }
}

fn warehouses<B: ConsoleBackend>(
    console: &ConsoleRuntime<B>,
    cmd: &WarehouseCommand,
) -> Result<String, String> {
    let backend = console.backend();
    match cmd {
        WarehouseCommand::List => {
            let rows = backend
                .list_warehouses()
                .map_err(|e| format!("failed to list warehouses: {e}"))?;
            Ok(grid::warehouses(&rows).render())
        }
        WarehouseCommand::Show { id } => {
            let w = backend
                .get_warehouse(WarehouseId(*id))
                .map_err(|e| format!("failed to load warehouse {id}: {e}"))?;
            let stock = backend
                .stock_by_warehouse(w.id)
                .map_err(|e| format!("failed to load stock for warehouse {id}: {e}"))?;
            Ok(format!(
                "{}\n\n{}",
                grid::warehouses(std::slice::from_ref(&w)).render(),
                grid::stock(&stock).render()
            ))
        }
        WarehouseCommand::Create(fields) => {
            let draft = fields.apply(WarehouseDraft {
                name: String::new(),
                address: String::new(),
                capacity: 0,
                status: None,
            });
            let done = console
                .save_warehouse(None, draft)
                .map_err(|e| format!("failed to create warehouse: {e}"))?;
            Ok(format!(
                "created warehouse {}\n\n{}",
                done.saved.id,
                grid::warehouses(&done.list).render()
            ))
        }
        WarehouseCommand::Update { id, fields } => {
            let id = WarehouseId(*id);
            let current = backend
                .get_warehouse(id)
                .map_err(|e| format!("failed to load warehouse {id}: {e}"))?;
            let draft = fields.apply(WarehouseDraft {
                name: current.name,
                address: current.address,
                capacity: current.capacity,
                status: Some(current.status),
            });
            let done = console
                .save_warehouse(Some(id), draft)
                .map_err(|e| format!("failed to update warehouse {id}: {e}"))?;
            Ok(format!(
                "updated warehouse {}\n\n{}",
                done.saved.id,
                grid::warehouses(&done.list).render()
            ))
        }
        WarehouseCommand::Status { id, status } => {
            let w = backend
                .set_warehouse_status(WarehouseId(*id), *status)
                .map_err(|e| format!("failed to change warehouse status: {e}"))?;
            Ok(format!("warehouse {} is now {}", w.id, w.status.as_str()))
        }
        WarehouseCommand::Delete { id } => {
            backend
                .delete_warehouse(WarehouseId(*id))
                .map_err(|e| format!("failed to delete warehouse {id}: {e}"))?;
            Ok(format!("deleted warehouse {id}"))
        }
    }
}

fn stock<B: ConsoleBackend>(
    console: &ConsoleRuntime<B>,
    cmd: &StockCommand,
) -> Result<String, String> {
    let backend = console.backend();
    let adjust = |target: &StockTarget, adjustment: StockAdjustment| -> Result<String, String> {
        let done = console
            .adjust_stock(
                ProductId(target.product),
                WarehouseId(target.warehouse),
                adjustment,
            )
            .map_err(|e| format!("failed to adjust stock: {e}"))?;
        Ok(format!(
            "product {} in warehouse {} now has {}",
            done.saved.product_id, done.saved.warehouse_id, done.saved.quantity
        ))
    };
    match cmd {
        StockCommand::List {
            warehouse,
            critical,
        } => {
            let warehouse = warehouse.map(WarehouseId);
            let rows = match (warehouse, *critical) {
                (w, true) => backend.critical_stock(w),
                (Some(w), false) => backend.stock_by_warehouse(w),
                (None, false) => backend.list_stock(),
            }
            .map_err(|e| format!("failed to list stock: {e}"))?;
            Ok(grid::stock(&rows).render())
        }
        StockCommand::Create {
            product,
            warehouse,
            quantity,
            min_quantity,
        } => {
            let done = console
                .save_stock(
                    None,
                    StockDraft {
                        product_id: ProductId(*product),
                        warehouse_id: WarehouseId(*warehouse),
                        quantity: *quantity,
                        min_quantity: *min_quantity,
                    },
                )
                .map_err(|e| format!("failed to create stock record: {e}"))?;
            Ok(format!(
                "created stock record {}\n\n{}",
                done.saved.id,
                grid::stock(&done.list).render()
            ))
        }
        StockCommand::Update {
            id,
            quantity,
            min_quantity,
        } => {
            let id = StockRecordId(*id);
            let current = backend
                .list_stock()
                .map_err(|e| format!("failed to list stock: {e}"))?
                .into_iter()
                .find(|r| r.id == id)
                .ok_or_else(|| format!("stock record {id} not found"))?;
            let draft = StockDraft {
                product_id: current.product_id,
                warehouse_id: current.warehouse_id,
                quantity: quantity.unwrap_or(current.quantity),
                min_quantity: min_quantity.unwrap_or(current.min_quantity),
            };
            let done = console
                .save_stock(Some(id), draft)
                .map_err(|e| format!("failed to update stock record {id}: {e}"))?;
            Ok(format!(
                "updated stock record {}\n\n{}",
                done.saved.id,
                grid::stock(&done.list).render()
            ))
        }
        StockCommand::Set { target, amount } => adjust(target, StockAdjustment::Set(*amount)),
        StockCommand::Add { target, amount } => adjust(target, StockAdjustment::Add(*amount)),
        StockCommand::Reduce { target, amount } => {
            adjust(target, StockAdjustment::Reduce(*amount))
        }
        StockCommand::Delete { id } => {
            backend
                .delete_stock(StockRecordId(*id))
                .map_err(|e| format!("failed to delete stock record {id}: {e}"))?;
            Ok(format!("deleted stock record {id}"))
        }
    }
}

/// Fills the product name, and the price when omitted, from the products service.
fn resolve_line<B: ConsoleBackend>(backend: &B, spec: &LineSpec) -> Result<OrderLineDraft, String> {
    let product = backend
        .get_product(spec.product_id)
        .map_err(|e| format!("failed to load product {} for order line: {e}", spec.product_id))?;
    Ok(OrderLineDraft {
        product_id: product.id,
        product_name: product.name,
        quantity: spec.quantity,
        unit_price: spec.unit_price.unwrap_or(product.price),
        discount_pct: spec.discount_pct,
    })
}

fn render_order(order: &PurchaseOrderRecord) -> String {
    let mut out = format!(
        "{}\n\n{}",
        grid::orders(std::slice::from_ref(order)).render(),
        grid::order_lines(&order.lines).render()
    );
    if let Some(delivery) = &order.delivery_at {
        out.push_str(&format!("\n\nentrega: {}", format_wire_datetime(delivery)));
    }
    if let Some(notes) = &order.notes {
        out.push_str(&format!("\nobservaciones: {notes}"));
    }
    out
}

fn render_status_change(change: &StatusChange) -> String {
    let mut out = format!(
        "order {}: {} -> {}",
        change.order.id, change.from, change.order.status
    );
    match &change.completion {
        Some(Ok(report)) => out.push_str(&format!("\n{report}")),
        Some(Err(msg)) => out.push_str(&format!("\nstock not updated: {msg}")),
        None => {}
    }
    if let Err(e) = &change.orders {
        out.push_str(&format!("\norder list not refreshed: {e}"));
    }
    out
}

fn orders<B: ConsoleBackend>(
    console: &ConsoleRuntime<B>,
    cmd: &OrderCommand,
    now: NaiveDateTime,
) -> Result<String, String> {
    let backend = console.backend();
    match cmd {
        OrderCommand::List { status } => {
            let rows = match status {
                Some(s) => backend.orders_by_status(*s),
                None => backend.list_orders(),
            }
            .map_err(|e| format!("failed to list purchase orders: {e}"))?;
            Ok(grid::orders(&rows).render())
        }
        OrderCommand::Show { id } => {
            let order = backend
                .get_order(PurchaseOrderId(*id))
                .map_err(|e| format!("failed to load purchase order {id}: {e}"))?;
            Ok(render_order(&order))
        }
        OrderCommand::Create {
            supplier,
            invoice,
            issued,
            delivery,
            notes,
            lines,
        } => {
            let lines = lines
                .iter()
                .map(|spec| resolve_line(backend, spec))
                .collect::<Result<Vec<_>, _>>()?;
            let draft = PurchaseOrderDraft {
                header: PurchaseOrderHeader {
                    supplier_id: SupplierId(*supplier),
                    invoice_number: invoice
                        .clone()
                        .unwrap_or_else(|| suggest_invoice_number(now)),
                    issued_at: issued.unwrap_or(now),
                    delivery_at: *delivery,
                    notes: notes.clone(),
                },
                lines,
            };
            let done = console
                .create_order(draft)
                .map_err(|e| format!("failed to create purchase order: {e}"))?;
            Ok(format!(
                "created purchase order {} ({})\n\n{}",
                done.saved.id,
                done.saved.invoice_number,
                render_order(&done.saved)
            ))
        }
        OrderCommand::Update {
            id,
            supplier,
            invoice,
            issued,
            delivery,
            notes,
        } => {
            let id = PurchaseOrderId(*id);
            let mut header = backend
                .get_order(id)
                .map_err(|e| format!("failed to load purchase order {id}: {e}"))?
                .header();
            if let Some(v) = supplier {
                header.supplier_id = SupplierId(*v);
            }
            if let Some(v) = invoice {
                header.invoice_number = v.clone();
            }
            if let Some(v) = issued {
                header.issued_at = *v;
            }
            if delivery.is_some() {
                header.delivery_at = *delivery;
            }
            if notes.is_some() {
                header.notes = notes.clone();
            }
            let done = console
                .update_order(id, header)
                .map_err(|e| format!("failed to update purchase order {id}: {e}"))?;
            Ok(format!(
                "updated purchase order {}\n\n{}",
                done.saved.id,
                grid::orders(&done.list).render()
            ))
        }
        OrderCommand::Status { id, status } => {
            let change = console
                .change_order_status(PurchaseOrderId(*id), *status)
                .map_err(|e| format!("failed to change purchase order status: {e}"))?;
            Ok(render_status_change(&change))
        }
        OrderCommand::Delete { id } => {
            backend
                .delete_order(PurchaseOrderId(*id))
                .map_err(|e| format!("failed to delete purchase order {id}: {e}"))?;
            Ok(format!("deleted purchase order {id}"))
        }
        OrderCommand::AddLine { id, line } => {
            let line = resolve_line(backend, line)?;
            let order = console
                .add_order_line(PurchaseOrderId(*id), line)
                .map_err(|e| format!("failed to add order line: {e}"))?;
            Ok(render_order(&order))
        }
        OrderCommand::UpdateLine { id, line_id, line } => {
            let line = resolve_line(backend, line)?;
            let order = console
                .update_order_line(PurchaseOrderId(*id), OrderLineId(*line_id), line)
                .map_err(|e| format!("failed to update order line {line_id}: {e}"))?;
            Ok(render_order(&order))
        }
        OrderCommand::RemoveLine { id, line_id } => {
            let order = console
                .remove_order_line(PurchaseOrderId(*id), OrderLineId(*line_id))
                .map_err(|e| format!("failed to remove order line {line_id}: {e}"))?;
            Ok(render_order(&order))
        }
        OrderCommand::Summary => {
            let s = backend
                .order_summary()
                .map_err(|e| format!("failed to load purchase order summary: {e}"))?;
            Ok(format!(
                "{:<12}{}\n{:<12}{}\n{:<12}{}\n{:<12}{}\n{:<12}{}",
                OrderStatus::Pending.as_str(),
                s.pending,
                OrderStatus::InProgress.as_str(),
                s.in_progress,
                OrderStatus::Completed.as_str(),
                s.completed,
                OrderStatus::Cancelled.as_str(),
                s.cancelled,
                "total mes",
                s.month_total
            ))
        }
    }
}

pub fn render_dashboard(snapshot: &DashboardSnapshot) -> String {
    let DashboardSummary {
        total_products,
        total_suppliers,
        total_warehouses,
        total_orders,
        critical_stock,
        pending_orders,
        active_products,
        active_suppliers,
        active_warehouses,
    } = snapshot.summary;
    let mut out = format!(
        "productos      {total_products:>6}  activos {active_products}\n\
         proveedores    {total_suppliers:>6}  activos {active_suppliers}\n\
         bodegas        {total_warehouses:>6}  activas {active_warehouses}\n\
         ordenes        {total_orders:>6}  pendientes {pending_orders}\n\
         stock critico  {critical_stock:>6}"
    );
    for err in &snapshot.errors {
        out.push_str(&format!("\nunavailable: {err}"));
    }
    out
}
