#![forbid(unsafe_code)]

use std::fmt;
use std::fmt::Write as _;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use tracing::{debug, error, info, warn};

use stockroom_contracts::common::wire_datetime;
use stockroom_contracts::product::{ProductDraft, ProductId, ProductRecord};
use stockroom_contracts::purchase_order::{
    OrderLineDraft, OrderLineId, OrderStatus, PurchaseOrderDraft, PurchaseOrderHeader,
    PurchaseOrderId, PurchaseOrderRecord,
};
use stockroom_contracts::stock::{StockAdjustment, StockDraft, StockRecord, StockRecordId};
use stockroom_contracts::supplier::{SupplierDraft, SupplierId, SupplierRecord};
use stockroom_contracts::warehouse::{WarehouseDraft, WarehouseId, WarehouseRecord};
use stockroom_contracts::RecordStatus;
use stockroom_os::purchasing::{PurchaseOrderOutcome, PurchaseOrderRequest, PurchaseOrderRuntime};
use stockroom_storage::repo::{ProductRepo, StockRepo, SupplierRepo, WarehouseRepo};
use stockroom_storage::store::{InventoryStore, StorageError};

pub mod api;
pub mod client;
pub mod config;
pub mod http;
pub mod local;
pub mod telemetry;

pub const JOURNAL_SCHEMA_VERSION: u8 = 1;

/// One mutation of the inventory store, as recorded in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreCommand {
    ProductCreate {
        draft: ProductDraft,
    },
    ProductUpdate {
        id: ProductId,
        draft: ProductDraft,
    },
    ProductSetStatus {
        id: ProductId,
        status: RecordStatus,
    },
    ProductDelete {
        id: ProductId,
    },
    SupplierCreate {
        draft: SupplierDraft,
    },
    SupplierUpdate {
        id: SupplierId,
        draft: SupplierDraft,
    },
    SupplierSetStatus {
        id: SupplierId,
        status: RecordStatus,
    },
    SupplierDelete {
        id: SupplierId,
    },
    WarehouseCreate {
        draft: WarehouseDraft,
    },
    WarehouseUpdate {
        id: WarehouseId,
        draft: WarehouseDraft,
    },
    WarehouseSetStatus {
        id: WarehouseId,
        status: RecordStatus,
    },
    WarehouseDelete {
        id: WarehouseId,
    },
    StockCreate {
        draft: StockDraft,
    },
    StockUpdate {
        id: StockRecordId,
        draft: StockDraft,
    },
    StockAdjust {
        product_id: ProductId,
        warehouse_id: WarehouseId,
        adjustment: StockAdjustment,
    },
    StockDelete {
        id: StockRecordId,
    },
    OrderCreate {
        draft: PurchaseOrderDraft,
    },
    OrderUpdate {
        id: PurchaseOrderId,
        header: PurchaseOrderHeader,
    },
    OrderDelete {
        id: PurchaseOrderId,
    },
    OrderChangeStatus {
        id: PurchaseOrderId,
        to: OrderStatus,
    },
    OrderLineAdd {
        id: PurchaseOrderId,
        line: OrderLineDraft,
    },
    OrderLineUpdate {
        id: PurchaseOrderId,
        line_id: OrderLineId,
        line: OrderLineDraft,
    },
    OrderLineRemove {
        id: PurchaseOrderId,
        line_id: OrderLineId,
    },
}

impl StoreCommand {
    pub fn op_name(&self) -> &'static str {
        match self {
            StoreCommand::ProductCreate { .. } => "product_create",
            StoreCommand::ProductUpdate { .. } => "product_update",
            StoreCommand::ProductSetStatus { .. } => "product_set_status",
            StoreCommand::ProductDelete { .. } => "product_delete",
            StoreCommand::SupplierCreate { .. } => "supplier_create",
            StoreCommand::SupplierUpdate { .. } => "supplier_update",
            StoreCommand::SupplierSetStatus { .. } => "supplier_set_status",
            StoreCommand::SupplierDelete { .. } => "supplier_delete",
            StoreCommand::WarehouseCreate { .. } => "warehouse_create",
            StoreCommand::WarehouseUpdate { .. } => "warehouse_update",
            StoreCommand::WarehouseSetStatus { .. } => "warehouse_set_status",
            StoreCommand::WarehouseDelete { .. } => "warehouse_delete",
            StoreCommand::StockCreate { .. } => "stock_create",
            StoreCommand::StockUpdate { .. } => "stock_update",
            StoreCommand::StockAdjust { .. } => "stock_adjust",
            StoreCommand::StockDelete { .. } => "stock_delete",
            StoreCommand::OrderCreate { .. } => "order_create",
            StoreCommand::OrderUpdate { .. } => "order_update",
            StoreCommand::OrderDelete { .. } => "order_delete",
            StoreCommand::OrderChangeStatus { .. } => "order_change_status",
            StoreCommand::OrderLineAdd { .. } => "order_line_add",
            StoreCommand::OrderLineUpdate { .. } => "order_line_update",
            StoreCommand::OrderLineRemove { .. } => "order_line_remove",
        }
    }
}

/// Row returned by a command; serializes as the bare record, or `null` after a delete.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandOutcome {
    Product(ProductRecord),
    Supplier(SupplierRecord),
    Warehouse(WarehouseRecord),
    Stock(StockRecord),
    Order(PurchaseOrderRecord),
    Removed,
}

impl CommandOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandOutcome::Product(_) => "product",
            CommandOutcome::Supplier(_) => "supplier",
            CommandOutcome::Warehouse(_) => "warehouse",
            CommandOutcome::Stock(_) => "stock",
            CommandOutcome::Order(_) => "purchase_order",
            CommandOutcome::Removed => "removed",
        }
    }
}

impl TryFrom<CommandOutcome> for ProductRecord {
    type Error = RuntimeError;
    fn try_from(v: CommandOutcome) -> Result<Self, Self::Error> {
        match v {
            CommandOutcome::Product(r) => Ok(r),
            other => Err(RuntimeError::UnexpectedOutcome(other.kind())),
        }
    }
}

impl TryFrom<CommandOutcome> for SupplierRecord {
    type Error = RuntimeError;
    fn try_from(v: CommandOutcome) -> Result<Self, Self::Error> {
        match v {
            CommandOutcome::Supplier(r) => Ok(r),
            other => Err(RuntimeError::UnexpectedOutcome(other.kind())),
        }
    }
}

impl TryFrom<CommandOutcome> for WarehouseRecord {
    type Error = RuntimeError;
    fn try_from(v: CommandOutcome) -> Result<Self, Self::Error> {
        match v {
            CommandOutcome::Warehouse(r) => Ok(r),
            other => Err(RuntimeError::UnexpectedOutcome(other.kind())),
        }
    }
}

impl TryFrom<CommandOutcome> for StockRecord {
    type Error = RuntimeError;
    fn try_from(v: CommandOutcome) -> Result<Self, Self::Error> {
        match v {
            CommandOutcome::Stock(r) => Ok(r),
            other => Err(RuntimeError::UnexpectedOutcome(other.kind())),
        }
    }
}

impl TryFrom<CommandOutcome> for PurchaseOrderRecord {
    type Error = RuntimeError;
    fn try_from(v: CommandOutcome) -> Result<Self, Self::Error> {
        match v {
            CommandOutcome::Order(r) => Ok(r),
            other => Err(RuntimeError::UnexpectedOutcome(other.kind())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    Storage(StorageError),
    LockPoisoned,
    Journal(String),
    UnexpectedOutcome(&'static str),
}

impl From<StorageError> for RuntimeError {
    fn from(v: StorageError) -> Self {
        RuntimeError::Storage(v)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::Storage(e) => write!(f, "{e}"),
            RuntimeError::LockPoisoned => f.write_str("inventory runtime lock poisoned"),
            RuntimeError::Journal(e) => f.write_str(e),
            RuntimeError::UnexpectedOutcome(kind) => {
                write!(f, "command produced an unexpected {kind} outcome")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

#[derive(Debug, Clone)]
struct PersistenceConfig {
    journal_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalEntry {
    schema_version: u8,
    #[serde(with = "wire_datetime")]
    at: NaiveDateTime,
    command: serde_json::Value,
    sha256: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = sha2::Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

impl JournalEntry {
    fn v1(at: NaiveDateTime, command: &StoreCommand) -> Result<Self, String> {
        let command = serde_json::to_value(command)
            .map_err(|err| format!("failed to encode journal command: {err}"))?;
        let sha256 = sha256_hex(command.to_string().as_bytes());
        Ok(Self {
            schema_version: JOURNAL_SCHEMA_VERSION,
            at,
            command,
            sha256,
        })
    }

    /// One newline-terminated JSONL record.
    fn encode_line(at: NaiveDateTime, command: &StoreCommand) -> Result<String, String> {
        let mut line = serde_json::to_string(&Self::v1(at, command)?)
            .map_err(|err| format!("failed to encode journal entry: {err}"))?;
        line.push('\n');
        Ok(line)
    }
}

/// A journal record that is on disk but whose command has not been applied yet.
struct PendingAppend {
    file: File,
    path: PathBuf,
    start_len: u64,
}

impl PendingAppend {
    fn write(path: &Path, line: &str) -> Result<Self, String> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|err| {
                format!(
                    "failed opening store journal '{}' for append: {}",
                    path.display(),
                    err
                )
            })?;
        let start_len = file
            .metadata()
            .map_err(|err| format!("failed to stat store journal '{}': {}", path.display(), err))?
            .len();
        let mut pending = Self {
            file,
            path: path.to_path_buf(),
            start_len,
        };
        if let Err(err) = pending
            .file
            .write_all(line.as_bytes())
            .and_then(|_| pending.file.sync_data())
        {
            // A torn record would fail its checksum on the next replay.
            let _ = pending.revert();
            return Err(format!(
                "failed writing store journal '{}': {}",
                path.display(),
                err
            ));
        }
        Ok(pending)
    }

    /// Cuts the journal back to its length before this record.
    fn revert(&mut self) -> Result<(), String> {
        self.file
            .set_len(self.start_len)
            .and_then(|_| self.file.sync_data())
            .map_err(|err| {
                format!(
                    "failed truncating store journal '{}': {}",
                    self.path.display(),
                    err
                )
            })
    }
}

/// Shared inventory state behind the REST services and the local console backend.
#[derive(Debug, Clone)]
pub struct InventoryRuntime {
    store: Arc<Mutex<InventoryStore>>,
    orders: PurchaseOrderRuntime,
    persistence: Option<PersistenceConfig>,
}

impl InventoryRuntime {
    pub fn new_in_memory(tax_rate: Decimal) -> Self {
        Self {
            store: Arc::new(Mutex::new(InventoryStore::with_tax_rate(tax_rate))),
            orders: PurchaseOrderRuntime,
            persistence: None,
        }
    }

    pub fn new_with_persistence(tax_rate: Decimal, journal_path: PathBuf) -> Result<Self, String> {
        let runtime = Self {
            persistence: Some(PersistenceConfig { journal_path }),
            ..Self::new_in_memory(tax_rate)
        };
        runtime.ensure_persistence_ready()?;
        runtime.replay_journal_into_store()?;
        Ok(runtime)
    }

    pub fn from_config(config: &config::ServerConfig) -> Result<Self, String> {
        if config.persistence_enabled {
            Self::new_with_persistence(config.tax_rate, config.store_path.clone())
        } else {
            Ok(Self::new_in_memory(config.tax_rate))
        }
    }

    pub fn journal_path(&self) -> Option<&Path> {
        self.persistence.as_ref().map(|p| p.journal_path.as_path())
    }

    fn lock(&self) -> Result<MutexGuard<'_, InventoryStore>, RuntimeError> {
        self.store.lock().map_err(|_| RuntimeError::LockPoisoned)
    }

    /// Runs a read-only query against the store.
    pub fn read<T>(&self, f: impl FnOnce(&InventoryStore) -> T) -> Result<T, RuntimeError> {
        let store = self.lock()?;
        Ok(f(&store))
    }

    pub fn execute(&self, command: StoreCommand) -> Result<CommandOutcome, RuntimeError> {
        self.execute_at(local_now(), command)
    }

    /// Journals a command, then applies it. The store is only touched once the record is
    /// durable; a command the store rejects has its record cut from the journal again.
    pub fn execute_at(
        &self,
        now: NaiveDateTime,
        command: StoreCommand,
    ) -> Result<CommandOutcome, RuntimeError> {
        let mut store = self.lock()?;
        let op = command.op_name();
        let pending = match self.persistence.as_ref() {
            Some(persistence) => {
                let appended = JournalEntry::encode_line(now, &command)
                    .and_then(|line| PendingAppend::write(&persistence.journal_path, &line));
                match appended {
                    Ok(pending) => Some(pending),
                    Err(err) => {
                        error!(op, error = %err, "journal append failed; command not applied");
                        return Err(RuntimeError::Journal(err));
                    }
                }
            }
            None => None,
        };
        match self.apply(&mut store, now, command) {
            Ok(outcome) => {
                info!(op, outcome = outcome.kind(), "store command applied");
                Ok(outcome)
            }
            Err(err) => {
                if let Some(mut pending) = pending {
                    if let Err(undo) = pending.revert() {
                        error!(
                            op,
                            error = %undo,
                            "rejected command left in journal; replay will skip it"
                        );
                    }
                }
                Err(err.into())
            }
        }
    }

    fn apply(
        &self,
        store: &mut InventoryStore,
        now: NaiveDateTime,
        command: StoreCommand,
    ) -> Result<CommandOutcome, StorageError> {
        let outcome = match command {
            StoreCommand::ProductCreate { draft } => {
                CommandOutcome::Product(store.product_create_row(now, draft)?)
            }
            StoreCommand::ProductUpdate { id, draft } => {
                CommandOutcome::Product(store.product_update_row(now, id, draft)?)
            }
            StoreCommand::ProductSetStatus { id, status } => {
                CommandOutcome::Product(store.product_set_status_row(now, id, status)?)
            }
            StoreCommand::ProductDelete { id } => {
                store.product_delete_row(id)?;
                CommandOutcome::Removed
            }
            StoreCommand::SupplierCreate { draft } => {
                CommandOutcome::Supplier(store.supplier_create_row(now, draft)?)
            }
            StoreCommand::SupplierUpdate { id, draft } => {
                CommandOutcome::Supplier(store.supplier_update_row(now, id, draft)?)
            }
            StoreCommand::SupplierSetStatus { id, status } => {
                CommandOutcome::Supplier(store.supplier_set_status_row(now, id, status)?)
            }
            StoreCommand::SupplierDelete { id } => {
                store.supplier_delete_row(id)?;
                CommandOutcome::Removed
            }
            StoreCommand::WarehouseCreate { draft } => {
                CommandOutcome::Warehouse(store.warehouse_create_row(now, draft)?)
            }
            StoreCommand::WarehouseUpdate { id, draft } => {
                CommandOutcome::Warehouse(store.warehouse_update_row(now, id, draft)?)
            }
            StoreCommand::WarehouseSetStatus { id, status } => {
                CommandOutcome::Warehouse(store.warehouse_set_status_row(now, id, status)?)
            }
            StoreCommand::WarehouseDelete { id } => {
                store.warehouse_delete_row(id)?;
                CommandOutcome::Removed
            }
            StoreCommand::StockCreate { draft } => {
                CommandOutcome::Stock(store.stock_create_row(now, draft)?)
            }
            StoreCommand::StockUpdate { id, draft } => {
                CommandOutcome::Stock(store.stock_update_row(now, id, draft)?)
            }
            StoreCommand::StockAdjust {
                product_id,
                warehouse_id,
                adjustment,
            } => CommandOutcome::Stock(store.stock_adjust_row(
                now,
                product_id,
                warehouse_id,
                adjustment,
            )?),
            StoreCommand::StockDelete { id } => {
                store.stock_delete_row(id)?;
                CommandOutcome::Removed
            }
            StoreCommand::OrderCreate { draft } => {
                self.run_order(store, now, PurchaseOrderRequest::Create(draft))?
            }
            StoreCommand::OrderUpdate { id, header } => self.run_order(
                store,
                now,
                PurchaseOrderRequest::UpdateHeader {
                    order_id: id,
                    header,
                },
            )?,
            StoreCommand::OrderDelete { id } => {
                self.run_order(store, now, PurchaseOrderRequest::Delete { order_id: id })?
            }
            StoreCommand::OrderChangeStatus { id, to } => self.run_order(
                store,
                now,
                PurchaseOrderRequest::ChangeStatus { order_id: id, to },
            )?,
            StoreCommand::OrderLineAdd { id, line } => self.run_order(
                store,
                now,
                PurchaseOrderRequest::AddLine { order_id: id, line },
            )?,
            StoreCommand::OrderLineUpdate { id, line_id, line } => self.run_order(
                store,
                now,
                PurchaseOrderRequest::UpdateLine {
                    order_id: id,
                    line_id,
                    line,
                },
            )?,
            StoreCommand::OrderLineRemove { id, line_id } => self.run_order(
                store,
                now,
                PurchaseOrderRequest::RemoveLine {
                    order_id: id,
                    line_id,
                },
            )?,
        };
        Ok(outcome)
    }

    fn run_order(
        &self,
        store: &mut InventoryStore,
        now: NaiveDateTime,
        req: PurchaseOrderRequest,
    ) -> Result<CommandOutcome, StorageError> {
        Ok(match self.orders.run(store, now, req)? {
            PurchaseOrderOutcome::Saved { order, .. } => CommandOutcome::Order(order),
            PurchaseOrderOutcome::Deleted { .. } => CommandOutcome::Removed,
        })
    }

    fn ensure_persistence_ready(&self) -> Result<(), String> {
        let Some(persistence) = self.persistence.as_ref() else {
            return Ok(());
        };
        let path = &persistence.journal_path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "failed to create store directory '{}': {}",
                    parent.display(),
                    err
                )
            })?;
        }
        if !path.exists() {
            File::create(path).map_err(|err| {
                format!(
                    "failed to create store journal '{}': {}",
                    path.display(),
                    err
                )
            })?;
        }
        Ok(())
    }

    fn replay_journal_into_store(&self) -> Result<(), String> {
        let Some(persistence) = self.persistence.as_ref() else {
            return Ok(());
        };
        let path = &persistence.journal_path;
        let file = File::open(path).map_err(|err| {
            format!("failed to open store journal '{}': {}", path.display(), err)
        })?;
        let mut store = self
            .store
            .lock()
            .map_err(|_| "inventory runtime lock poisoned".to_string())?;
        let mut replayed = 0usize;
        let mut skipped = 0usize;
        for (line_no, line_result) in BufReader::new(file).lines().enumerate() {
            let line_no = line_no + 1;
            let line = line_result.map_err(|err| {
                format!(
                    "failed reading store journal '{}' at line {}: {}",
                    path.display(),
                    line_no,
                    err
                )
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: JournalEntry = serde_json::from_str(&line).map_err(|err| {
                format!(
                    "failed parsing store journal '{}' at line {}: {}",
                    path.display(),
                    line_no,
                    err
                )
            })?;
            if entry.schema_version != JOURNAL_SCHEMA_VERSION {
                return Err(format!(
                    "unsupported store journal schema_version={} at line {}",
                    entry.schema_version, line_no
                ));
            }
            if sha256_hex(entry.command.to_string().as_bytes()) != entry.sha256 {
                return Err(format!("store journal checksum mismatch at line {line_no}"));
            }
            let command: StoreCommand = serde_json::from_value(entry.command).map_err(|err| {
                format!("failed decoding journal command at line {line_no}: {err}")
            })?;
            let op = command.op_name();
            debug!(line = line_no, op, "replaying journal entry");
            // Replay is deterministic, so a record the store rejects was rejected live too.
            match self.apply(&mut store, entry.at, command) {
                Ok(_) => replayed += 1,
                Err(err) => {
                    warn!(line = line_no, op, error = %err, "skipping rejected journal entry");
                    skipped += 1;
                }
            }
        }
        info!(path = %path.display(), replayed, skipped, "store journal replayed");
        Ok(())
    }
}

pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

/// Midnight on the first day of `now`'s month.
pub fn month_start(now: NaiveDateTime) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(now)
}

pub fn default_store_path() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        let home = home.trim();
        if !home.is_empty() {
            return PathBuf::from(home).join(".stockroom/store/journal.jsonl");
        }
    }
    PathBuf::from(".stockroom/store/journal.jsonl")
}
