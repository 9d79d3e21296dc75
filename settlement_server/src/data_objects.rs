use serde::{Deserialize, Serialize};
use settlement_engine::db_types::{Cents, NewOrder, OrderId, PaymentMethod, StoreId};

/// A new order from the storefront. Either `amount` (local currency) or `reference_amount` must be given. When only
/// the reference amount is supplied, the local amount is priced at the gateway's current reference rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub payment_method: PaymentMethod,
    pub payer_identity: String,
    #[serde(default, with = "mps_common::decimal_amount::optional")]
    pub amount: Option<Cents>,
    #[serde(default, with = "mps_common::decimal_amount::optional")]
    pub reference_amount: Option<Cents>,
}

impl NewOrderRequest {
    pub fn into_new_order(self, amount_local: Cents, amount_reference: Cents) -> NewOrder {
        NewOrder::new(self.order_id, self.store_id, self.payment_method, &self.payer_identity, amount_local)
            .with_reference_amount(amount_reference)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispersalRequest {
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountRequest {
    pub account: String,
}
