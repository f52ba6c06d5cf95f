#![forbid(unsafe_code)]

pub mod common;
pub mod dashboard;
pub mod product;
pub mod purchase_order;
pub mod stock;
pub mod supplier;
pub mod warehouse;

pub use common::{
    field_errors, format_wire_datetime, parse_wire_datetime, ContractViolation, ReasonCodeId,
    RecordStatus, SchemaVersion, Validate, MAX_AMOUNT,
};
