//! Synchronous (OTP-confirmed) debits.
//!
//! The payer asks their bank for a one-time password ([`ChargeFlowApi::request_otp`]) and then submits it with the
//! debit ([`ChargeFlowApi::charge`]). Everything that can be validated is validated before the gateway is called.
//!
//! Once the gateway reports that the debit succeeded, the money has left the payer's account and the flow can no
//! longer fail. Every subsequent step (disarming the timer, accepting the order, recording the reference, crediting
//! the ledger, notifying watchers) is attempted, failures are logged with the order id and gateway reference, and the
//! payer is always told that the payment succeeded.
use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{Cents, Order, OrderId, OrderStatusType, SettlementDetails},
    events::{EventProducers, OrderSettledEvent, OrderStatusEvent, SettlementPath},
    expiration::ExpirationScheduler,
    settlement_api::{
        errors::ChargeError,
        ledger::LedgerAccountant,
        order_objects::{ChargeDetails, GatewayResult, OtpDetails},
    },
    traits::{ChargeGateway, ChargeRequest, LedgerManagement, OrderManagement, OtpRequest},
};

/// The largest difference between the amount the payer submits and the stored order amount that is still accepted.
pub const AMOUNT_TOLERANCE: Cents = Cents::new(1);

pub struct ChargeFlowApi<B, G> {
    db: Arc<B>,
    gateway: Arc<G>,
    scheduler: ExpirationScheduler<B>,
    ledger: LedgerAccountant<B>,
    producers: EventProducers,
}

impl<B, G> Debug for ChargeFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChargeFlowApi")
    }
}

impl<B, G> Clone for ChargeFlowApi<B, G> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            gateway: Arc::clone(&self.gateway),
            scheduler: self.scheduler.clone(),
            ledger: self.ledger.clone(),
            producers: self.producers.clone(),
        }
    }
}

impl<B, G> ChargeFlowApi<B, G> {
    pub fn new(
        db: Arc<B>,
        gateway: Arc<G>,
        scheduler: ExpirationScheduler<B>,
        ledger: LedgerAccountant<B>,
        producers: EventProducers,
    ) -> Self {
        Self { db, gateway, scheduler, ledger, producers }
    }
}

impl<B, G> ChargeFlowApi<B, G>
where
    B: OrderManagement + LedgerManagement + 'static,
    G: ChargeGateway,
{
    /// Asks the gateway to send the payer a one-time password for this order.
    pub async fn request_otp(&self, order_id: &OrderId, details: OtpDetails) -> Result<GatewayResult, ChargeError> {
        let order = self.payable_order(order_id, details.amount).await?;
        let request = OtpRequest {
            order_id: order_id.clone(),
            identity: details.identity,
            bank_code: details.bank_code,
            phone: details.phone,
            amount: order.amount_local,
        };
        let response = self.gateway.request_otp(&request).await?;
        if response.is_success() {
            debug!("💳️ OTP sent for order {order_id}");
        } else {
            info!("💳️ OTP request for order {order_id} rejected with code {}", response.code);
        }
        Ok(GatewayResult::from_response(&response))
    }

    /// Debits the payer for this order.
    ///
    /// Validation failures and gateway transport errors are returned as errors, and the order is left untouched. A
    /// gateway rejection is an `Ok` result with `success: false`. A gateway approval always produces
    /// `success: true`, whatever happens afterwards.
    pub async fn charge(&self, order_id: &OrderId, details: ChargeDetails) -> Result<GatewayResult, ChargeError> {
        if details.otp.trim().is_empty() {
            return Err(ChargeError::MissingDetails("otp".into()));
        }
        let order = self.payable_order(order_id, details.amount).await?;
        let request = ChargeRequest {
            order_id: order_id.clone(),
            identity: details.identity,
            bank_code: details.bank_code,
            phone: details.phone.clone(),
            otp: details.otp,
            amount: order.amount_local,
        };
        let response = self.gateway.synchronous_charge(&request).await?;
        if !response.is_success() {
            info!("💳️ Charge for order {order_id} rejected with code {}", response.code);
            return Ok(GatewayResult::rejected(&response.code));
        }
        let reference = response.reference.clone();
        if reference.is_none() {
            warn!("💳️ The gateway approved the charge for order {order_id} without a reference");
        }
        let details = SettlementDetails::new(reference.clone().unwrap_or_default())
            .with_payer_bank(Some(request.bank_code.clone()))
            .with_payer_phone(Some(details.phone));
        self.complete_confirmed_charge(order, details).await;
        Ok(GatewayResult::success(reference))
    }

    /// Validates that the order can be charged `amount`, and returns it.
    async fn payable_order(&self, order_id: &OrderId, amount: Cents) -> Result<Order, ChargeError> {
        let order = self.db.fetch_order(order_id).await?.ok_or_else(|| ChargeError::OrderNotFound(order_id.clone()))?;
        if order.status != OrderStatusType::PendingPayment {
            return Err(ChargeError::NotAwaitingPayment { order_id: order_id.clone(), status: order.status });
        }
        if !amount.is_positive() || order.amount_local.abs_diff(amount) > AMOUNT_TOLERANCE {
            return Err(ChargeError::AmountMismatch { expected: order.amount_local, supplied: amount });
        }
        Ok(order)
    }

    /// Everything that happens after the gateway has taken the payer's money. Nothing in here may fail the request.
    async fn complete_confirmed_charge(&self, order: Order, details: SettlementDetails) {
        let order_id = &order.order_id;
        let reference = details.reference.as_str();
        self.scheduler.disarm(order_id);
        let accepted = match self
            .db
            .transition_order_status(order_id, &[OrderStatusType::PendingPayment], OrderStatusType::Accepted)
            .await
        {
            Ok(Some(order)) => order,
            Ok(None) => {
                error!(
                    "💳️ PAYMENT NOT APPLIED. The gateway confirmed debit {reference} for order {order_id}, but the \
                     order is no longer pending payment. The ledger has not been credited. Manual reconciliation is \
                     required."
                );
                return;
            },
            Err(e) => {
                error!(
                    "💳️ PAYMENT NOT APPLIED. The gateway confirmed debit {reference} for order {order_id}, but the \
                     order could not be accepted. The ledger has not been credited. Manual reconciliation is \
                     required. {e}"
                );
                return;
            },
        };
        let accepted = match self.db.record_settlement(order_id, &details).await {
            Ok(order) => order,
            Err(e) => {
                error!("💳️ Could not record payment reference {reference} on order {order_id}. {e}");
                accepted
            },
        };
        let reference = (!reference.is_empty()).then(|| reference.to_string());
        let ledger = self
            .ledger
            .apply_settlement(order_id, &accepted.store_id, accepted.amount_local, reference.as_deref())
            .await;
        let notifier = self.scheduler.notifier();
        notifier.publish(order_id, OrderStatusEvent::accepted(&accepted));
        notifier.close(order_id);
        info!("💳️ Order {order_id} paid by direct debit");
        let event = OrderSettledEvent::new(accepted, SettlementPath::SynchronousCharge, reference, ledger);
        self.producers.publish_order_settled(event).await;
    }
}
