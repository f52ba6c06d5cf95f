#![forbid(unsafe_code)]

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::common::{first_violation, push_int_range, push_required_text, trimmed, wire_datetime};
use crate::{ContractViolation, RecordStatus, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseId(pub u64);

impl WarehouseId {
    pub fn new(id: u64) -> Result<Self, ContractViolation> {
        let v = Self(id);
        v.validate()?;
        Ok(v)
    }
}

impl Validate for WarehouseId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "bodegaId",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for WarehouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseDraft {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "capacidad")]
    pub capacity: i64,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
}

impl WarehouseDraft {
    pub fn normalized(self) -> Self {
        Self {
            name: trimmed(&self.name),
            address: trimmed(&self.address),
            capacity: self.capacity,
            status: self.status,
        }
    }

    pub fn violations(&self) -> Vec<ContractViolation> {
        let mut out = Vec::new();
        push_required_text(&mut out, "nombre", &self.name, 1, 100);
        push_required_text(&mut out, "direccion", &self.address, 1, 200);
        push_int_range(&mut out, "capacidad", self.capacity, 1, i64::MAX);
        out
    }
}

impl Validate for WarehouseDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        first_violation(self.violations())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseRecord {
    pub id: WarehouseId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "capacidad")]
    pub capacity: i64,
    #[serde(rename = "estado")]
    pub status: RecordStatus,
    #[serde(rename = "fechaCreacion", with = "wire_datetime")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "fechaActualizacion", with = "wire_datetime")]
    pub updated_at: NaiveDateTime,
}

impl WarehouseRecord {
    pub fn v1(
        id: WarehouseId,
        draft: WarehouseDraft,
        now: NaiveDateTime,
    ) -> Result<Self, ContractViolation> {
        let draft = draft.normalized();
        let r = Self {
            id,
            name: draft.name,
            address: draft.address,
            capacity: draft.capacity,
            status: draft.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn with_update(
        &self,
        draft: WarehouseDraft,
        now: NaiveDateTime,
    ) -> Result<Self, ContractViolation> {
        let draft = draft.normalized();
        let r = Self {
            id: self.id,
            name: draft.name,
            address: draft.address,
            capacity: draft.capacity,
            status: draft.status.unwrap_or(self.status),
            created_at: self.created_at,
            updated_at: now.max(self.created_at),
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for WarehouseRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        WarehouseDraft {
            name: self.name.clone(),
            address: self.address.clone(),
            capacity: self.capacity,
            status: Some(self.status),
        }
        .validate()
    }
}
