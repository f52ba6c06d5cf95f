#![forbid(unsafe_code)]

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::common::{
    first_violation, push_optional_text, push_required_text, trimmed, trimmed_opt, wire_datetime,
};
use crate::{ContractViolation, RecordStatus, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub u64);

impl SupplierId {
    pub fn new(id: u64) -> Result<Self, ContractViolation> {
        let v = Self(id);
        v.validate()?;
        Ok(v)
    }
}

impl Validate for SupplierId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "proveedorId",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for SupplierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierDraft {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "nitRuc")]
    pub tax_id: String,
    #[serde(rename = "contacto")]
    pub contact: String,
    pub email: String,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    #[serde(rename = "observaciones", default)]
    pub notes: Option<String>,
}

impl SupplierDraft {
    pub fn normalized(self) -> Self {
        Self {
            name: trimmed(&self.name),
            tax_id: trimmed(&self.tax_id),
            contact: trimmed(&self.contact),
            email: trimmed(&self.email),
            phone: trimmed_opt(self.phone),
            address: trimmed(&self.address),
            status: self.status,
            notes: trimmed_opt(self.notes),
        }
    }

    pub fn violations(&self) -> Vec<ContractViolation> {
        let mut out = Vec::new();
        push_required_text(&mut out, "nombre", &self.name, 1, 100);
        push_required_text(&mut out, "nitRuc", &self.tax_id, 1, 20);
        push_required_text(&mut out, "contacto", &self.contact, 1, 100);
        push_required_text(&mut out, "email", &self.email, 1, 100);
        if !self.email.trim().is_empty() && !is_valid_email(self.email.trim()) {
            out.push(ContractViolation::InvalidValue {
                field: "email",
                reason: "must look like name@domain.tld",
            });
        }
        if let Some(phone) = self.phone.as_deref().map(str::trim) {
            if !phone.is_empty() && !is_valid_phone(phone) {
                out.push(ContractViolation::InvalidValue {
                    field: "telefono",
                    reason: "must be 7 to 15 digits",
                });
            }
        }
        push_required_text(&mut out, "direccion", &self.address, 1, 200);
        push_optional_text(&mut out, "observaciones", self.notes.as_deref(), 500);
        out
    }
}

impl Validate for SupplierDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        first_violation(self.violations())
    }
}

/// `local@domain.tld` with no whitespace and a dot after the `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub fn is_valid_phone(phone: &str) -> bool {
    (7..=15).contains(&phone.len()) && phone.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierRecord {
    pub id: SupplierId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "nitRuc")]
    pub tax_id: String,
    #[serde(rename = "contacto")]
    pub contact: String,
    pub email: String,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "estado")]
    pub status: RecordStatus,
    #[serde(rename = "observaciones", default)]
    pub notes: Option<String>,
    #[serde(rename = "fechaCreacion", with = "wire_datetime")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "fechaActualizacion", with = "wire_datetime")]
    pub updated_at: NaiveDateTime,
}

impl SupplierRecord {
    pub fn v1(
        id: SupplierId,
        draft: SupplierDraft,
        now: NaiveDateTime,
    ) -> Result<Self, ContractViolation> {
        let draft = draft.normalized();
        let r = Self {
            id,
            name: draft.name,
            tax_id: draft.tax_id,
            contact: draft.contact,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
            status: draft.status.unwrap_or_default(),
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        r.validate()?;
        Ok(r)
    }

    pub fn with_update(
        &self,
        draft: SupplierDraft,
        now: NaiveDateTime,
    ) -> Result<Self, ContractViolation> {
        let draft = draft.normalized();
        let r = Self {
            id: self.id,
            name: draft.name,
            tax_id: draft.tax_id,
            contact: draft.contact,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
            status: draft.status.unwrap_or(self.status),
            notes: draft.notes,
            created_at: self.created_at,
            updated_at: now.max(self.created_at),
        };
        r.validate()?;
        Ok(r)
    }

    pub fn as_draft(&self) -> SupplierDraft {
        SupplierDraft {
            name: self.name.clone(),
            tax_id: self.tax_id.clone(),
            contact: self.contact.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            status: Some(self.status),
            notes: self.notes.clone(),
        }
    }
}

impl Validate for SupplierRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.as_draft().validate()
    }
}
