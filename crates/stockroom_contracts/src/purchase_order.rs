#![forbid(unsafe_code)]

use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::{
    decimal_to_f64, first_violation, push_amount, push_int_range, push_optional_text,
    push_required_text, trimmed, trimmed_opt, wire_datetime, wire_datetime_opt, MAX_AMOUNT,
};
use crate::product::ProductId;
use crate::supplier::SupplierId;
use crate::{ContractViolation, Validate};

/// IVA applied on top of the order subtotal unless a deployment overrides it.
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(12, 0, 0, false, 2);

pub const INVOICE_NUMBER_MAX: usize = 50;
pub const ORDER_NOTES_MAX: usize = 500;
pub const LINE_PRODUCT_NAME_MAX: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub u64);

impl PurchaseOrderId {
    pub fn new(id: u64) -> Result<Self, ContractViolation> {
        let v = Self(id);
        v.validate()?;
        Ok(v)
    }
}

impl Validate for PurchaseOrderId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderLineId(pub u64);

impl fmt::Display for OrderLineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[serde(rename = "PENDIENTE")]
    Pending,
    #[serde(rename = "EN_PROCESO")]
    InProgress,
    #[serde(rename = "COMPLETADA")]
    Completed,
    #[serde(rename = "CANCELADA")]
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDIENTE",
            OrderStatus::InProgress => "EN_PROCESO",
            OrderStatus::Completed => "COMPLETADA",
            OrderStatus::Cancelled => "CANCELADA",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == normalized)
    }

    pub fn allowed_targets(self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::InProgress, OrderStatus::Cancelled],
            OrderStatus::InProgress => &[OrderStatus::Completed, OrderStatus::Cancelled],
            OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        self.allowed_targets().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    pub fn transition_to(self, to: OrderStatus) -> Result<OrderStatus, StatusTransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(StatusTransitionError { from: self, to })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTransitionError {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl StatusTransitionError {
    pub fn hint(&self) -> String {
        if self.from.is_terminal() {
            return format!("orders in {} are final", self.from);
        }
        if self.from == OrderStatus::Pending && self.to == OrderStatus::Completed {
            return format!("move the order to {} first", OrderStatus::InProgress);
        }
        let targets = self
            .from
            .allowed_targets()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" or ");
        format!("from {} the order can only move to {}", self.from, targets)
    }
}

impl fmt::Display for StatusTransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot change purchase order status from {} to {}: {}",
            self.from,
            self.to,
            self.hint()
        )
    }
}

impl std::error::Error for StatusTransitionError {}

fn zero() -> Decimal {
    Decimal::ZERO
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineDraft {
    #[serde(rename = "productoId")]
    pub product_id: ProductId,
    #[serde(rename = "nombreProducto")]
    pub product_name: String,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(rename = "precioUnitario")]
    pub unit_price: Decimal,
    #[serde(rename = "descuento", default = "zero")]
    pub discount_pct: Decimal,
}

impl OrderLineDraft {
    pub fn violations(&self) -> Vec<ContractViolation> {
        let mut out = Vec::new();
        if self.product_id.validate().is_err() {
            out.push(ContractViolation::InvalidValue {
                field: "detalles.productoId",
                reason: "must be > 0",
            });
        }
        push_required_text(
            &mut out,
            "detalles.nombreProducto",
            &self.product_name,
            1,
            LINE_PRODUCT_NAME_MAX,
        );
        push_int_range(&mut out, "detalles.cantidad", self.quantity, 1, i64::MAX);
        push_amount(
            &mut out,
            "detalles.precioUnitario",
            self.unit_price,
            Decimal::ZERO,
            false,
        );
        let hundred = Decimal::ONE_HUNDRED;
        if self.discount_pct < Decimal::ZERO || self.discount_pct > hundred {
            out.push(ContractViolation::InvalidRange {
                field: "detalles.descuento",
                min: 0.0,
                max: 100.0,
                got: decimal_to_f64(self.discount_pct),
            });
        }
        let subtotal = line_subtotal(self.unit_price.round_dp(2), self.quantity, self.discount_pct);
        if out.is_empty() && subtotal.is_none() {
            out.push(LINE_AMOUNT_TOO_LARGE);
        }
        out
    }
}

impl Validate for OrderLineDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        first_violation(self.violations())
    }
}

pub const LINE_AMOUNT_TOO_LARGE: ContractViolation = ContractViolation::InvalidValue {
    field: "detalles.cantidad",
    reason: "cantidad x precioUnitario exceeds the largest supported amount",
};

pub const ORDER_TOTAL_TOO_LARGE: ContractViolation = ContractViolation::InvalidValue {
    field: "total",
    reason: "exceeds the largest supported amount",
};

/// `unit_price * quantity * (1 - discount/100)`, two decimal places.
/// `None` when the amount is above `MAX_AMOUNT`.
pub fn line_subtotal(
    unit_price: Decimal,
    quantity: i64,
    discount_pct: Decimal,
) -> Option<Decimal> {
    let gross = unit_price.checked_mul(Decimal::from(quantity))?;
    let factor = Decimal::ONE_HUNDRED
        .checked_sub(discount_pct)?
        .checked_div(Decimal::ONE_HUNDRED)?;
    Some(gross.checked_mul(factor)?.round_dp(2)).filter(|v| *v <= MAX_AMOUNT)
}

/// Sum of amounts, or `ORDER_TOTAL_TOO_LARGE` when it passes `MAX_AMOUNT`.
pub fn checked_sum(
    amounts: impl IntoIterator<Item = Decimal>,
) -> Result<Decimal, ContractViolation> {
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
        .filter(|v| *v <= MAX_AMOUNT)
        .ok_or(ORDER_TOTAL_TOO_LARGE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    #[serde(rename = "productoId")]
    pub product_id: ProductId,
    #[serde(rename = "nombreProducto")]
    pub product_name: String,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(rename = "precioUnitario")]
    pub unit_price: Decimal,
    #[serde(rename = "descuento")]
    pub discount_pct: Decimal,
    pub subtotal: Decimal,
}

impl OrderLine {
    pub fn v1(id: OrderLineId, draft: OrderLineDraft) -> Result<Self, ContractViolation> {
        draft.validate()?;
        let unit_price = draft.unit_price.round_dp(2);
        Ok(Self {
            id,
            product_id: draft.product_id,
            product_name: trimmed(&draft.product_name),
            quantity: draft.quantity,
            unit_price,
            discount_pct: draft.discount_pct,
            subtotal: line_subtotal(unit_price, draft.quantity, draft.discount_pct)
                .ok_or(LINE_AMOUNT_TOO_LARGE)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    #[serde(rename = "iva")]
    pub tax: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    fn from_subtotal(subtotal: Decimal, tax_rate: Decimal) -> Result<Self, ContractViolation> {
        let tax = subtotal
            .checked_mul(tax_rate)
            .ok_or(ORDER_TOTAL_TOO_LARGE)?
            .round_dp(2);
        Ok(Self {
            subtotal,
            tax,
            total: checked_sum([subtotal, tax])?,
        })
    }

    pub fn compute(lines: &[OrderLine], tax_rate: Decimal) -> Result<Self, ContractViolation> {
        Self::from_subtotal(checked_sum(lines.iter().map(|l| l.subtotal))?, tax_rate)
    }

    /// Same arithmetic over unsaved drafts, for previews before submit.
    pub fn preview(
        lines: &[OrderLineDraft],
        tax_rate: Decimal,
    ) -> Result<Self, ContractViolation> {
        let subtotals = lines
            .iter()
            .map(|l| {
                line_subtotal(l.unit_price.round_dp(2), l.quantity, l.discount_pct)
                    .ok_or(LINE_AMOUNT_TOO_LARGE)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_subtotal(checked_sum(subtotals)?, tax_rate)
    }
}

/// Header fields shared by create and update. Status is never taken from input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderHeader {
    #[serde(rename = "proveedorId")]
    pub supplier_id: SupplierId,
    #[serde(rename = "numeroFactura")]
    pub invoice_number: String,
    #[serde(rename = "fechaEmision", with = "wire_datetime")]
    pub issued_at: NaiveDateTime,
    #[serde(rename = "fechaEntrega", default, with = "wire_datetime_opt")]
    pub delivery_at: Option<NaiveDateTime>,
    #[serde(rename = "observaciones", default)]
    pub notes: Option<String>,
}

impl PurchaseOrderHeader {
    pub fn normalized(self) -> Self {
        Self {
            supplier_id: self.supplier_id,
            invoice_number: trimmed(&self.invoice_number),
            issued_at: self.issued_at,
            delivery_at: self.delivery_at,
            notes: trimmed_opt(self.notes),
        }
    }

    pub fn violations(&self) -> Vec<ContractViolation> {
        let mut out = Vec::new();
        if let Err(v) = self.supplier_id.validate() {
            out.push(v);
        }
        push_required_text(
            &mut out,
            "numeroFactura",
            &self.invoice_number,
            1,
            INVOICE_NUMBER_MAX,
        );
        push_optional_text(&mut out, "observaciones", self.notes.as_deref(), ORDER_NOTES_MAX);
        out
    }
}

impl Validate for PurchaseOrderHeader {
    fn validate(&self) -> Result<(), ContractViolation> {
        first_violation(self.violations())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderDraft {
    #[serde(flatten)]
    pub header: PurchaseOrderHeader,
    #[serde(rename = "detalles", default)]
    pub lines: Vec<OrderLineDraft>,
}

impl PurchaseOrderDraft {
    pub fn violations(&self) -> Vec<ContractViolation> {
        let mut out = self.header.violations();
        if self.lines.is_empty() {
            out.push(ContractViolation::InvalidValue {
                field: "detalles",
                reason: "must contain at least one line",
            });
        }
        let before_lines = out.len();
        for line in &self.lines {
            out.extend(line.violations());
        }
        // Tax rates are capped at 1, so this bounds the stored total.
        if out.len() == before_lines {
            if let Err(v) = OrderTotals::preview(&self.lines, Decimal::ONE) {
                out.push(v);
            }
        }
        out
    }
}

impl Validate for PurchaseOrderDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        first_violation(self.violations())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderRecord {
    pub id: PurchaseOrderId,
    #[serde(rename = "proveedorId")]
    pub supplier_id: SupplierId,
    #[serde(rename = "numeroFactura")]
    pub invoice_number: String,
    #[serde(rename = "fechaEmision", with = "wire_datetime")]
    pub issued_at: NaiveDateTime,
    #[serde(rename = "fechaEntrega", default, with = "wire_datetime_opt")]
    pub delivery_at: Option<NaiveDateTime>,
    pub subtotal: Decimal,
    #[serde(rename = "iva")]
    pub tax: Decimal,
    pub total: Decimal,
    #[serde(rename = "estado")]
    pub status: OrderStatus,
    #[serde(rename = "observaciones", default)]
    pub notes: Option<String>,
    #[serde(rename = "fechaCreacion", with = "wire_datetime")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "fechaActualizacion", with = "wire_datetime")]
    pub updated_at: NaiveDateTime,
    #[serde(rename = "detalles", default)]
    pub lines: Vec<OrderLine>,
}

impl PurchaseOrderRecord {
    pub fn v1(
        id: PurchaseOrderId,
        header: PurchaseOrderHeader,
        lines: Vec<OrderLine>,
        tax_rate: Decimal,
        now: NaiveDateTime,
    ) -> Result<Self, ContractViolation> {
        let header = header.normalized();
        let totals = OrderTotals::compute(&lines, tax_rate)?;
        let r = Self {
            id,
            supplier_id: header.supplier_id,
            invoice_number: header.invoice_number,
            issued_at: header.issued_at,
            delivery_at: header.delivery_at,
            subtotal: totals.subtotal,
            tax: totals.tax,
            total: totals.total,
            status: OrderStatus::Pending,
            notes: header.notes,
            created_at: now,
            updated_at: now,
            lines,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn header(&self) -> PurchaseOrderHeader {
        PurchaseOrderHeader {
            supplier_id: self.supplier_id,
            invoice_number: self.invoice_number.clone(),
            issued_at: self.issued_at,
            delivery_at: self.delivery_at,
            notes: self.notes.clone(),
        }
    }

    pub fn totals(&self) -> OrderTotals {
        OrderTotals {
            subtotal: self.subtotal,
            tax: self.tax,
            total: self.total,
        }
    }

    /// Swaps in a new line set and its totals. Leaves the order untouched when the totals
    /// pass `MAX_AMOUNT`.
    pub fn replace_lines(
        &mut self,
        lines: Vec<OrderLine>,
        tax_rate: Decimal,
    ) -> Result<(), ContractViolation> {
        let totals = OrderTotals::compute(&lines, tax_rate)?;
        self.lines = lines;
        self.subtotal = totals.subtotal;
        self.tax = totals.tax;
        self.total = totals.total;
        Ok(())
    }

    /// Lines can only change, and the order can only be deleted, while it is still pending.
    pub fn is_editable(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    pub fn line(&self, line_id: OrderLineId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }
}

impl Validate for PurchaseOrderRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.header().validate()?;
        if self.subtotal.checked_add(self.tax) != Some(self.total) {
            return Err(ContractViolation::InvalidValue {
                field: "total",
                reason: "must equal subtotal + iva",
            });
        }
        if self.updated_at < self.created_at {
            return Err(ContractViolation::InvalidValue {
                field: "fechaActualizacion",
                reason: "must be >= fechaCreacion",
            });
        }
        Ok(())
    }
}

/// Invoice number offered by the create form, e.g. `FAC-20240501-101530123`.
pub fn suggest_invoice_number(now: NaiveDateTime) -> String {
    format!("FAC-{}", now.format("%Y%m%d-%H%M%S%3f"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderStatusSummary {
    #[serde(rename = "pendientes")]
    pub pending: u64,
    #[serde(rename = "enProceso")]
    pub in_progress: u64,
    #[serde(rename = "completadas")]
    pub completed: u64,
    #[serde(rename = "canceladas")]
    pub cancelled: u64,
    #[serde(rename = "totalMes")]
    pub month_total: Decimal,
}
