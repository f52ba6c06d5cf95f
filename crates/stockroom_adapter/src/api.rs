#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use stockroom_contracts::{field_errors, format_wire_datetime, ContractViolation, Validate};
use stockroom_storage::store::StorageError;

use crate::{local_now, CommandOutcome, InventoryRuntime, RuntimeError, StoreCommand};

/// Error body returned by every route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub timestamp: String,
    pub status: u16,
    pub message: String,
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub errors: BTreeMap<String, String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: BTreeMap::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn validation(violations: &[ContractViolation]) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "validation failed".to_string(),
            errors: field_errors(violations),
        }
    }

    pub fn body(&self) -> ErrorResponse {
        ErrorResponse {
            timestamp: format_wire_datetime(&local_now()),
            status: self.status.as_u16(),
            message: self.message.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err {
            StorageError::NotFound { .. } => ApiError::not_found(message),
            StorageError::DuplicateKey { field, .. } => ApiError {
                status: StatusCode::CONFLICT,
                message,
                errors: BTreeMap::from([(field.to_string(), "already exists".to_string())]),
            },
            StorageError::ForeignKeyViolation { .. } => {
                ApiError::new(StatusCode::CONFLICT, message)
            }
            StorageError::ContractViolation(v) => ApiError::validation(&[v]),
            StorageError::InvalidTransition(_)
            | StorageError::OrderLocked { .. }
            | StorageError::InsufficientStock { .. } => ApiError::bad_request(message),
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Storage(e) => e.into(),
            other => {
                error!(error = %other, "inventory runtime failure");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            warn!(status = self.status.as_u16(), message = %self.message, "request rejected");
        }
        (self.status, Json(self.body())).into_response()
    }
}

/// Collects every field error of a command's payload so the envelope lists all of them.
pub fn precheck(command: &StoreCommand) -> Result<(), ApiError> {
    let violations = match command {
        StoreCommand::ProductCreate { draft } | StoreCommand::ProductUpdate { draft, .. } => {
            draft.violations()
        }
        StoreCommand::SupplierCreate { draft } | StoreCommand::SupplierUpdate { draft, .. } => {
            draft.violations()
        }
        StoreCommand::WarehouseCreate { draft } | StoreCommand::WarehouseUpdate { draft, .. } => {
            draft.violations()
        }
        StoreCommand::StockCreate { draft } | StoreCommand::StockUpdate { draft, .. } => {
            draft.violations()
        }
        StoreCommand::StockAdjust { adjustment, .. } => {
            adjustment.validate().err().into_iter().collect()
        }
        StoreCommand::OrderCreate { draft } => draft.violations(),
        StoreCommand::OrderUpdate { header, .. } => header.violations(),
        StoreCommand::OrderLineAdd { line, .. } | StoreCommand::OrderLineUpdate { line, .. } => {
            line.violations()
        }
        _ => Vec::new(),
    };
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(&violations))
    }
}

/// Validates and applies a command. Shared by the HTTP handlers and the local console backend.
pub fn execute(
    runtime: &InventoryRuntime,
    command: StoreCommand,
) -> Result<CommandOutcome, ApiError> {
    precheck(&command)?;
    Ok(runtime.execute(command)?)
}

/// `Json` whose rejection uses the error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// `Path` whose rejection uses the error envelope.
#[derive(Debug, Clone, Copy)]
pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}

/// `Query` whose rejection uses the error envelope.
#[derive(Debug, Clone, Copy)]
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError::bad_request(rejection.body_text())),
        }
    }
}
