#![forbid(unsafe_code)]

use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::{
    first_violation, push_amount, push_optional_text, push_required_text, trimmed,
    trimmed_opt, wire_datetime,
};
use crate::{ContractViolation, RecordStatus, Validate};

pub const PRODUCT_NAME_MIN: usize = 3;
pub const PRODUCT_NAME_MAX: usize = 100;
pub const PRODUCT_SKU_MIN: usize = 3;
pub const PRODUCT_SKU_MAX: usize = 50;
pub const PRODUCT_CATEGORY_MAX: usize = 50;
pub const PRODUCT_DESCRIPTION_MAX: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u64);

impl ProductId {
    pub fn new(id: u64) -> Result<Self, ContractViolation> {
        let v = Self(id);
        v.validate()?;
        Ok(v)
    }
}

impl Validate for ProductId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "productoId",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Editable product fields, as submitted by a create or update form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    #[serde(rename = "nombre")]
    pub name: String,
    pub sku: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "precio")]
    pub price: Decimal,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "estado", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
}

impl ProductDraft {
    pub fn normalized(self) -> Self {
        Self {
            name: trimmed(&self.name),
            sku: trimmed(&self.sku),
            description: trimmed_opt(self.description),
            price: self.price,
            category: trimmed(&self.category),
            status: self.status,
        }
    }

    pub fn violations(&self) -> Vec<ContractViolation> {
        let mut out = Vec::new();
        push_required_text(
            &mut out,
            "nombre",
            &self.name,
            PRODUCT_NAME_MIN,
            PRODUCT_NAME_MAX,
        );
        push_required_text(&mut out, "sku", &self.sku, PRODUCT_SKU_MIN, PRODUCT_SKU_MAX);
        if !self.sku.trim().is_empty() && !is_valid_sku(self.sku.trim()) {
            out.push(ContractViolation::InvalidValue {
                field: "sku",
                reason: "may only contain letters, digits, '-' and '_'",
            });
        }
        push_optional_text(
            &mut out,
            "descripcion",
            self.description.as_deref(),
            PRODUCT_DESCRIPTION_MAX,
        );
        push_amount(&mut out, "precio", self.price, Decimal::ZERO, true);
        push_required_text(
            &mut out,
            "categoria",
            &self.category,
            1,
            PRODUCT_CATEGORY_MAX,
        );
        out
    }
}

impl Validate for ProductDraft {
    fn validate(&self) -> Result<(), ContractViolation> {
        first_violation(self.violations())
    }
}

pub fn is_valid_sku(sku: &str) -> bool {
    !sku.is_empty()
        && sku
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    #[serde(rename = "nombre")]
    pub name: String,
    pub sku: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "precio")]
    pub price: Decimal,
    #[serde(rename = "categoria")]
    pub category: String,
    #[serde(rename = "estado")]
    pub status: RecordStatus,
    #[serde(rename = "fechaCreacion", with = "wire_datetime")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "fechaActualizacion", with = "wire_datetime")]
    pub updated_at: NaiveDateTime,
}

impl ProductRecord {
    pub fn v1(
        id: ProductId,
        draft: ProductDraft,
        now: NaiveDateTime,
    ) -> Result<Self, ContractViolation> {
        let draft = draft.normalized();
        let r = Self {
            id,
            name: draft.name,
            sku: draft.sku,
            description: draft.description,
            price: draft.price.round_dp(2),
            category: draft.category,
            status: draft.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        r.validate()?;
        Ok(r)
    }

    /// Replaces the editable fields. A draft without a status keeps the current one.
    pub fn with_update(
        &self,
        draft: ProductDraft,
        now: NaiveDateTime,
    ) -> Result<Self, ContractViolation> {
        let draft = draft.normalized();
        let r = Self {
            id: self.id,
            name: draft.name,
            sku: draft.sku,
            description: draft.description,
            price: draft.price.round_dp(2),
            category: draft.category,
            status: draft.status.unwrap_or(self.status),
            created_at: self.created_at,
            updated_at: now.max(self.created_at),
        };
        r.validate()?;
        Ok(r)
    }

    pub fn as_draft(&self) -> ProductDraft {
        ProductDraft {
            name: self.name.clone(),
            sku: self.sku.clone(),
            description: self.description.clone(),
            price: self.price,
            category: self.category.clone(),
            status: Some(self.status),
        }
    }
}

impl Validate for ProductRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.as_draft().validate()?;
        if self.updated_at < self.created_at {
            return Err(ContractViolation::InvalidValue {
                field: "fechaActualizacion",
                reason: "must be >= fechaCreacion",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{field_errors, parse_wire_datetime};

    fn now() -> NaiveDateTime {
        parse_wire_datetime("2024-03-01T09:00:00").unwrap()
    }

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "  Tornillo hexagonal ".to_string(),
            sku: "TOR-001".to_string(),
            description: Some("   ".to_string()),
            price: Decimal::new(1999, 3),
            category: "Ferreteria".to_string(),
            status: None,
        }
    }

    #[test]
    fn record_normalizes_text_and_defaults_to_active() {
        let rec = ProductRecord::v1(ProductId(1), draft(), now()).unwrap();
        assert_eq!(rec.name, "Tornillo hexagonal");
        assert_eq!(rec.description, None);
        assert_eq!(rec.price, Decimal::new(200, 2));
        assert_eq!(rec.status, RecordStatus::Active);
    }

    #[test]
    fn draft_reports_every_invalid_field() {
        let bad = ProductDraft {
            name: "ab".to_string(),
            sku: "BAD SKU".to_string(),
            description: None,
            price: Decimal::new(-5, 0),
            category: " ".to_string(),
            status: None,
        };
        let errors = field_errors(&bad.violations());
        assert_eq!(
            errors.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["categoria", "nombre", "precio", "sku"]
        );
        assert!(bad.validate().is_err());
    }

    #[test]
    fn update_keeps_identity_and_creation_time() {
        let rec = ProductRecord::v1(ProductId(7), draft(), now()).unwrap();
        let mut changed = draft();
        changed.price = Decimal::new(250, 2);
        changed.status = Some(RecordStatus::Inactive);
        let later = parse_wire_datetime("2024-03-02T09:00:00").unwrap();
        let updated = rec.with_update(changed, later).unwrap();
        assert_eq!(updated.id, ProductId(7));
        assert_eq!(updated.created_at, now());
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.status, RecordStatus::Inactive);
    }

    #[test]
    fn wire_shape_uses_console_field_names() {
        let rec = ProductRecord::v1(ProductId(3), draft(), now()).unwrap();
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["nombre"], "Tornillo hexagonal");
        assert_eq!(json["precio"], 2.0);
        assert_eq!(json["estado"], "ACTIVO");
        assert_eq!(json["fechaCreacion"], "2024-03-01T09:00:00");
    }
}
