#![forbid(unsafe_code)]

use chrono::NaiveDateTime;
use tracing::{info, warn};

use stockroom_contracts::purchase_order::{
    OrderLineDraft, OrderLineId, OrderStatus, PurchaseOrderDraft, PurchaseOrderHeader,
    PurchaseOrderId, PurchaseOrderRecord,
};
use stockroom_contracts::ReasonCodeId;
use stockroom_storage::repo::PurchaseOrderRepo;
use stockroom_storage::store::{InventoryStore, StorageError};

pub mod reason_codes {
    use stockroom_contracts::ReasonCodeId;

    // Purchasing reason-code namespace.
    pub const ORDER_OK_CREATE: ReasonCodeId = ReasonCodeId(0x5000_0001);
    pub const ORDER_OK_UPDATE_HEADER: ReasonCodeId = ReasonCodeId(0x5000_0002);
    pub const ORDER_OK_DELETE: ReasonCodeId = ReasonCodeId(0x5000_0003);
    pub const ORDER_OK_START: ReasonCodeId = ReasonCodeId(0x5000_0004);
    pub const ORDER_OK_COMPLETE: ReasonCodeId = ReasonCodeId(0x5000_0005);
    pub const ORDER_OK_CANCEL: ReasonCodeId = ReasonCodeId(0x5000_0006);
    pub const ORDER_OK_LINE_ADD: ReasonCodeId = ReasonCodeId(0x5000_0007);
    pub const ORDER_OK_LINE_UPDATE: ReasonCodeId = ReasonCodeId(0x5000_0008);
    pub const ORDER_OK_LINE_REMOVE: ReasonCodeId = ReasonCodeId(0x5000_0009);
    pub const ORDER_FAIL_TRANSITION: ReasonCodeId = ReasonCodeId(0x5000_00F1);
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOrderRequest {
    Create(PurchaseOrderDraft),
    UpdateHeader {
        order_id: PurchaseOrderId,
        header: PurchaseOrderHeader,
    },
    Delete {
        order_id: PurchaseOrderId,
    },
    ChangeStatus {
        order_id: PurchaseOrderId,
        to: OrderStatus,
    },
    AddLine {
        order_id: PurchaseOrderId,
        line: OrderLineDraft,
    },
    UpdateLine {
        order_id: PurchaseOrderId,
        line_id: OrderLineId,
        line: OrderLineDraft,
    },
    RemoveLine {
        order_id: PurchaseOrderId,
        line_id: OrderLineId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseOrderOutcome {
    Saved {
        order: PurchaseOrderRecord,
        reason_code: ReasonCodeId,
    },
    Deleted {
        order_id: PurchaseOrderId,
        reason_code: ReasonCodeId,
    },
}

impl PurchaseOrderOutcome {
    pub fn reason_code(&self) -> ReasonCodeId {
        match self {
            PurchaseOrderOutcome::Saved { reason_code, .. }
            | PurchaseOrderOutcome::Deleted { reason_code, .. } => *reason_code,
        }
    }
}

fn status_reason_code(to: OrderStatus) -> ReasonCodeId {
    match to {
        OrderStatus::InProgress => reason_codes::ORDER_OK_START,
        OrderStatus::Completed => reason_codes::ORDER_OK_COMPLETE,
        OrderStatus::Cancelled => reason_codes::ORDER_OK_CANCEL,
        // Never an accepted target; the store rejects it before this code is recorded.
        OrderStatus::Pending => reason_codes::ORDER_FAIL_TRANSITION,
    }
}

/// Purchase-order write path: every mutation of an order goes through here.
#[derive(Debug, Default, Clone)]
pub struct PurchaseOrderRuntime;

impl PurchaseOrderRuntime {
    pub fn run(
        &self,
        store: &mut InventoryStore,
        now: NaiveDateTime,
        req: PurchaseOrderRequest,
    ) -> Result<PurchaseOrderOutcome, StorageError> {
        match req {
            PurchaseOrderRequest::Create(draft) => {
                let reason_code = reason_codes::ORDER_OK_CREATE;
                let order = store.order_create_row(now, draft, reason_code)?;
                self.audit_transition(order.id, "NONE", order.status.as_str(), reason_code);
                Ok(PurchaseOrderOutcome::Saved { order, reason_code })
            }
            PurchaseOrderRequest::UpdateHeader { order_id, header } => {
                let reason_code = reason_codes::ORDER_OK_UPDATE_HEADER;
                let order = store.order_update_header_row(now, order_id, header)?;
                info!(
                    order_id = order_id.0,
                    status = order.status.as_str(),
                    invoice = %order.invoice_number,
                    "purchase order header updated"
                );
                Ok(PurchaseOrderOutcome::Saved { order, reason_code })
            }
            PurchaseOrderRequest::Delete { order_id } => {
                let reason_code = reason_codes::ORDER_OK_DELETE;
                let removed = store.order_delete_row(order_id)?;
                self.audit_transition(order_id, removed.status.as_str(), "DELETED", reason_code);
                Ok(PurchaseOrderOutcome::Deleted {
                    order_id,
                    reason_code,
                })
            }
            PurchaseOrderRequest::ChangeStatus { order_id, to } => {
                let reason_code = status_reason_code(to);
                let from = store
                    .order_row(order_id)
                    .map(|o| o.status)
                    .ok_or(StorageError::NotFound {
                        table: "purchase_orders.id",
                        key: order_id.to_string(),
                    })?;
                let order = match store.order_change_status_row(now, order_id, to, reason_code) {
                    Ok(order) => order,
                    Err(err) => {
                        warn!(
                            order_id = order_id.0,
                            from = from.as_str(),
                            to = to.as_str(),
                            reason_code = reason_codes::ORDER_FAIL_TRANSITION.0,
                            "purchase order status change rejected"
                        );
                        return Err(err);
                    }
                };
                self.audit_transition(order_id, from.as_str(), to.as_str(), reason_code);
                Ok(PurchaseOrderOutcome::Saved { order, reason_code })
            }
            PurchaseOrderRequest::AddLine { order_id, line } => {
                let reason_code = reason_codes::ORDER_OK_LINE_ADD;
                let order = store.order_add_line_row(now, order_id, line)?;
                info!(
                    order_id = order_id.0,
                    lines = order.lines.len(),
                    total = %order.total,
                    "purchase order line added"
                );
                Ok(PurchaseOrderOutcome::Saved { order, reason_code })
            }
            PurchaseOrderRequest::UpdateLine {
                order_id,
                line_id,
                line,
            } => {
                let reason_code = reason_codes::ORDER_OK_LINE_UPDATE;
                let order = store.order_update_line_row(now, order_id, line_id, line)?;
                info!(
                    order_id = order_id.0,
                    line_id = line_id.0,
                    total = %order.total,
                    "purchase order line updated"
                );
                Ok(PurchaseOrderOutcome::Saved { order, reason_code })
            }
            PurchaseOrderRequest::RemoveLine { order_id, line_id } => {
                let reason_code = reason_codes::ORDER_OK_LINE_REMOVE;
                let order = store.order_remove_line_row(now, order_id, line_id)?;
                info!(
                    order_id = order_id.0,
                    line_id = line_id.0,
                    total = %order.total,
                    "purchase order line removed"
                );
                Ok(PurchaseOrderOutcome::Saved { order, reason_code })
            }
        }
    }

    fn audit_transition(
        &self,
        order_id: PurchaseOrderId,
        state_from: &str,
        state_to: &str,
        reason_code: ReasonCodeId,
    ) {
        info!(
            order_id = order_id.0,
            state_from,
            state_to,
            reason_code = reason_code.0,
            "purchase order transition"
        );
    }
}
