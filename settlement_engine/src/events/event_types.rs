use mps_common::Cents;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Order, OrderId, OrderStatusType},
    settlement_api::ledger::LedgerOutcome,
};

/// What happened to an order, from the point of view of a client watching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Authorized,
    Accepted,
    Expired,
    Cancelled,
}

impl OrderEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderEventKind::Authorized => "authorized",
            OrderEventKind::Accepted => "accepted",
            OrderEventKind::Expired => "expired",
            OrderEventKind::Cancelled => "cancelled",
        }
    }
}

/// The payload pushed to realtime subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub order_id: OrderId,
    pub event: OrderEventKind,
    pub status: OrderStatusType,
    #[serde(default, with = "mps_common::decimal_amount::optional", skip_serializing_if = "Option::is_none")]
    pub amount: Option<Cents>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

impl OrderStatusEvent {
    pub fn new(event: OrderEventKind, order: &Order) -> Self {
        Self {
            order_id: order.order_id.clone(),
            event,
            status: order.status,
            amount: Some(order.amount_local),
            identity: Some(order.payer_identity.clone()),
        }
    }

    pub fn authorized(order: &Order) -> Self {
        Self::new(OrderEventKind::Authorized, order)
    }

    pub fn accepted(order: &Order) -> Self {
        Self::new(OrderEventKind::Accepted, order)
    }

    pub fn expired(order: &Order) -> Self {
        Self { amount: None, identity: None, ..Self::new(OrderEventKind::Expired, order) }
    }

    pub fn cancelled(order: &Order) -> Self {
        Self { amount: None, identity: None, ..Self::new(OrderEventKind::Cancelled, order) }
    }
}

/// The route by which money reached the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementPath {
    SynchronousCharge,
    Reconciliation,
}

/// Emitted once per order, after the ledger has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSettledEvent {
    pub order: Order,
    pub path: SettlementPath,
    pub reference: Option<String>,
    pub ledger: LedgerOutcome,
}

impl OrderSettledEvent {
    pub fn new(order: Order, path: SettlementPath, reference: Option<String>, ledger: LedgerOutcome) -> Self {
        Self { order, path, reference, ledger }
    }
}
