use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
pub use mps_common::Cents;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        StoreId        ---------------------------------------------------------
/// The marketplace store that sold the goods and receives the net proceeds of an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct StoreId(pub String);

impl From<String> for StoreId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for StoreId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl StoreId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order has been created, but the customer has not reached the payment step.
    Pending,
    /// The customer is paying. The expiration timer is running.
    PendingPayment,
    /// The gateway has seen a matching transfer, but has not settled it yet.
    Authorized,
    /// Money has moved and the ledger has been credited.
    Accepted,
    /// The payment window closed before the order was paid.
    Expired,
    /// The order was cancelled before it was paid.
    Cancelled,
}

impl OrderStatusType {
    /// The states from which an order may expire.
    pub const EXPIRABLE: [OrderStatusType; 2] = [OrderStatusType::Pending, OrderStatusType::PendingPayment];
    /// The states from which an order may be cancelled.
    pub const CANCELLABLE: [OrderStatusType; 3] =
        [OrderStatusType::Pending, OrderStatusType::PendingPayment, OrderStatusType::Authorized];

    /// The lifecycle graph. Anything not listed here is an illegal transition.
    ///
    /// `PendingPayment -> Accepted` is the synchronous charge path, where the debit confirmation is both the
    /// authorization and the capture.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (Pending, PendingPayment)
                | (PendingPayment, Authorized)
                | (PendingPayment, Accepted)
                | (Authorized, Accepted)
                | (Pending | PendingPayment, Expired)
                | (Pending | PendingPayment | Authorized, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Accepted | OrderStatusType::Expired | OrderStatusType::Cancelled)
    }

    pub fn is_expirable(&self) -> bool {
        Self::EXPIRABLE.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatusType::Pending => "pending",
            OrderStatusType::PendingPayment => "pending_payment",
            OrderStatusType::Authorized => "authorized",
            OrderStatusType::Accepted => "accepted",
            OrderStatusType::Expired => "expired",
            OrderStatusType::Cancelled => "cancelled",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "pending_payment" => Ok(Self::PendingPayment),
            "authorized" => Ok(Self::Authorized),
            "accepted" => Ok(Self::Accepted),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Customer-initiated mobile transfer. Settled asynchronously through the gateway webhooks.
    MobileTransfer,
    /// OTP-confirmed direct debit. Settled synchronously by the charge flow.
    DirectDebit,
    Cash,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::MobileTransfer => write!(f, "mobile_transfer"),
            PaymentMethod::DirectDebit => write!(f, "direct_debit"),
            PaymentMethod::Cash => write!(f, "cash"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_transfer" => Ok(Self::MobileTransfer),
            "direct_debit" => Ok(Self::DirectDebit),
            "cash" => Ok(Self::Cash),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub status: OrderStatusType,
    pub payment_method: PaymentMethod,
    /// The national identity document of the payer. Reconciliation matches on this value.
    pub payer_identity: String,
    /// The exact amount, in local currency, that the gateway must observe. Never changes after insertion.
    pub amount_local: Cents,
    pub amount_reference: Cents,
    /// The gateway reference of the settling transaction. Only set once the order is accepted.
    pub payment_reference: Option<String>,
    pub payer_bank: Option<String>,
    pub payer_phone: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub payment_method: PaymentMethod,
    pub payer_identity: String,
    /// The amount the customer pays, in local currency
    pub amount_local: Cents,
    /// The same amount, in the reference currency, at the rate in force when the order was priced
    pub amount_reference: Cents,
}

impl NewOrder {
    pub fn new(
        order_id: OrderId,
        store_id: StoreId,
        payment_method: PaymentMethod,
        payer_identity: &str,
        amount_local: Cents,
    ) -> Self {
        Self {
            order_id,
            store_id,
            payment_method,
            payer_identity: payer_identity.to_string(),
            amount_local,
            amount_reference: Cents::default(),
        }
    }

    pub fn with_reference_amount(mut self, amount: Cents) -> Self {
        self.amount_reference = amount;
        self
    }
}

//--------------------------------------   SettlementDetails   ---------------------------------------------------------
/// Metadata persisted on an order once money has moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementDetails {
    pub reference: String,
    pub paid_at: DateTime<Utc>,
    pub payer_bank: Option<String>,
    pub payer_phone: Option<String>,
}

impl SettlementDetails {
    pub fn new<S: Into<String>>(reference: S) -> Self {
        Self { reference: reference.into(), paid_at: Utc::now(), payer_bank: None, payer_phone: None }
    }

    pub fn with_payer_bank(mut self, bank: Option<String>) -> Self {
        self.payer_bank = bank;
        self
    }

    pub fn with_payer_phone(mut self, phone: Option<String>) -> Self {
        self.payer_phone = phone;
        self
    }

    pub fn with_paid_at(mut self, paid_at: DateTime<Utc>) -> Self {
        self.paid_at = paid_at;
        self
    }
}

//--------------------------------------   PaymentTransaction  ---------------------------------------------------------
/// The append-only audit record written by the ledger for every settled order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: i64,
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub reference: Option<String>,
    pub gross: Cents,
    pub fee_rate_bps: i64,
    pub fee: Cents,
    pub net: Cents,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentTransaction {
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub reference: Option<String>,
    pub gross: Cents,
    pub fee_rate_bps: i64,
    pub fee: Cents,
    pub net: Cents,
}

//--------------------------------------     StoreBalance      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StoreBalance {
    pub store_id: StoreId,
    pub balance: Cents,
    pub bank_account: Option<String>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   PlatformAccount     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlatformAccount {
    /// Fee revenue
    Available,
    /// Net proceeds owed to stores, awaiting dispersal
    Accounting,
}

impl Display for PlatformAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformAccount::Available => write!(f, "available"),
            PlatformAccount::Accounting => write!(f, "accounting"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformBalances {
    #[serde(with = "mps_common::decimal_amount")]
    pub available: Cents,
    #[serde(with = "mps_common::decimal_amount")]
    pub accounting: Cents,
}

//--------------------------------------      Dispersals       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DispersalStatus {
    Pending,
    Success,
    Failed,
}

impl Display for DispersalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispersalStatus::Pending => write!(f, "pending"),
            DispersalStatus::Success => write!(f, "success"),
            DispersalStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Dispersal {
    pub id: i64,
    pub reference: String,
    pub status: DispersalStatus,
    pub total: Cents,
    pub store_count: i64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single payout line. The amount is frozen when the dispersal is created and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DispersalItem {
    pub id: i64,
    pub dispersal_id: i64,
    pub store_id: StoreId,
    pub bank_account: String,
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDispersalItem {
    pub store_id: StoreId,
    pub bank_account: String,
    pub amount: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispersalBatch {
    pub dispersal: Dispersal,
    pub items: Vec<DispersalItem>,
}
