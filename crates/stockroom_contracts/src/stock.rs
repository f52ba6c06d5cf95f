#![forbid(unsafe_code)]

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::common::{first_violation, push_int_range, wire_datetime};
use crate::product::ProductId;
use crate::warehouse::WarehouseId;
use crate::{ContractViolation, Validate};

pub const DEFAULT_MIN_QUANTITY: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockRecordId(pub u64);

impl StockRecordId {
    pub fn new(id: u64) -> Result<Self, ContractViolation> {
        let v = Self(id);
        v.validate()?;
        Ok(v)
    }
}

impl Validate for StockRecordId {
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

impl fmt::Display for StockRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_min_quantity() -> i64 {
    DEFAULT_MIN_QUANTITY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDraft {
    #[serde(rename = "productoId")]
    pub product_id: ProductId,
    #[serde(rename = "bodegaId")]
    pub warehouse_id: WarehouseId,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(rename = "cantidadMinima", default = "default_min_quantity")]
    pub min_quantity: i64,
}

impl StockDraft {
    pub fn violations(&self) -> Vec<ContractViolation> {
        let mut out = Vec::new();
        if let Err(v) = self.product_id.validate() {
            out.push(v);
        }
        if let Err(v) = self.warehouse_id.validate() {
            out.push(v);
        }
        push_int_range(&mut out, "cantidad", self.quantity, 0, i64::MAX);
        push_int_range(&mut out, "cantidadMinima", self.min_quantity, 0, i64::MAX);
        out
    }
}

impl Validate for StockDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        first_violation(self.violations())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub id: StockRecordId,
    #[serde(rename = "productoId")]
    pub product_id: ProductId,
    #[serde(rename = "bodegaId")]
    pub warehouse_id: WarehouseId,
    #[serde(rename = "cantidad")]
    pub quantity: i64,
    #[serde(rename = "cantidadMinima")]
    pub min_quantity: i64,
    #[serde(rename = "fechaCreacion", with = "wire_datetime")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "fechaActualizacion", with = "wire_datetime")]
    pub updated_at: NaiveDateTime,
}

impl StockRecord {
    pub fn v1(
        id: StockRecordId,
        draft: StockDraft,
        now: NaiveDateTime,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            product_id: draft.product_id,
            warehouse_id: draft.warehouse_id,
            quantity: draft.quantity,
            min_quantity: draft.min_quantity,
            created_at: now,
            updated_at: now,
        };
        r.validate()?;
        Ok(r)
    }

    /// Critical stock: on hand at or below the configured minimum.
    pub fn is_critical(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

impl Validate for StockRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        StockDraft {
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
            quantity: self.quantity,
            min_quantity: self.min_quantity,
        }
        .validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum StockAdjustment {
    Set(i64),
    Add(i64),
    Reduce(i64),
}

impl StockAdjustment {
    pub fn amount(self) -> i64 {
        match self {
            StockAdjustment::Set(v) | StockAdjustment::Add(v) | StockAdjustment::Reduce(v) => v,
        }
    }

    /// New on-hand quantity, or `None` when a reduction exceeds what is available.
    pub fn resulting_quantity(self, current: i64) -> Option<i64> {
        match self {
            StockAdjustment::Set(v) => Some(v),
            StockAdjustment::Add(v) => current.checked_add(v),
            StockAdjustment::Reduce(v) if v <= current => Some(current - v),
            StockAdjustment::Reduce(_) => None,
        }
    }
}

impl Validate for StockAdjustment {
    fn validate(&self) -> Result<(), ContractViolation> {
        let mut out = Vec::new();
        match *self {
            StockAdjustment::Set(v) => push_int_range(&mut out, "nuevaCantidad", v, 0, i64::MAX),
            StockAdjustment::Add(v) | StockAdjustment::Reduce(v) => {
                push_int_range(&mut out, "cantidad", v, 1, i64::MAX)
            }
        }
        first_violation(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::parse_wire_datetime;

    #[test]
    fn critical_includes_the_minimum_itself() {
        let now = parse_wire_datetime("2024-01-01").unwrap();
        let mut rec = StockRecord::v1(
            StockRecordId(1),
            StockDraft {
                product_id: ProductId(1),
                warehouse_id: WarehouseId(1),
                quantity: 10,
                min_quantity: DEFAULT_MIN_QUANTITY,
            },
            now,
        )
        .unwrap();
        assert!(rec.is_critical());
        rec.quantity = 11;
        assert!(!rec.is_critical());
    }

    #[test]
    fn reduce_never_goes_negative() {
        assert_eq!(StockAdjustment::Reduce(4).resulting_quantity(10), Some(6));
        assert_eq!(StockAdjustment::Reduce(10).resulting_quantity(10), Some(0));
        assert_eq!(StockAdjustment::Reduce(11).resulting_quantity(10), None);
        assert_eq!(StockAdjustment::Set(0).resulting_quantity(10), Some(0));
        assert!(StockAdjustment::Add(0).validate().is_err());
        assert!(StockAdjustment::Set(-1).validate().is_err());
    }

    #[test]
    fn min_quantity_defaults_when_omitted() {
        let draft: StockDraft =
            serde_json::from_str(r#"{"productoId":4,"bodegaId":2,"cantidad":30}"#).unwrap();
        assert_eq!(draft.min_quantity, DEFAULT_MIN_QUANTITY);
    }
}
