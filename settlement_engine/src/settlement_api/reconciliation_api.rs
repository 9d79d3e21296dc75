//! Matching gateway webhooks to orders.
//!
//! Mobile transfers are initiated by the payer from their banking app, so the gateway cannot tell us which order a
//! transfer is for. It tells us *who* paid (the payer's identity document) and *how much*. A claim matches an order
//! when the order
//!
//! * is in the state the webhook expects (`pending_payment` for authorize, `authorized` for settle),
//! * is paid by mobile transfer,
//! * belongs to the same payer, and
//! * has exactly the same amount, to the cent.
//!
//! Candidates are examined oldest first, and the first match wins. If more than one order matches, the ambiguity is
//! logged.
//!
//! Gateways retry webhooks. Once an order has left the expected state it is no longer a candidate, so a retried
//! webhook is acknowledged negatively instead of being applied twice.
use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{Order, OrderStatusType, PaymentMethod},
    events::{EventProducers, OrderSettledEvent, OrderStatusEvent, SettlementPath},
    expiration::ExpirationScheduler,
    settlement_api::{
        ledger::LedgerAccountant,
        order_objects::{PaymentClaim, ReconciliationAck},
    },
    traits::{LedgerManagement, OrderManagement},
};

pub struct ReconciliationApi<B> {
    db: Arc<B>,
    scheduler: ExpirationScheduler<B>,
    ledger: LedgerAccountant<B>,
    producers: EventProducers,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi")
    }
}

impl<B> Clone for ReconciliationApi<B> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            scheduler: self.scheduler.clone(),
            ledger: self.ledger.clone(),
            producers: self.producers.clone(),
        }
    }
}

impl<B> ReconciliationApi<B> {
    pub fn new(
        db: Arc<B>,
        scheduler: ExpirationScheduler<B>,
        ledger: LedgerAccountant<B>,
        producers: EventProducers,
    ) -> Self {
        Self { db, scheduler, ledger, producers }
    }
}

impl<B> ReconciliationApi<B>
where B: OrderManagement + LedgerManagement + 'static
{
    /// The gateway has seen a transfer that matches a pending order. The order stops expiring and moves to
    /// `authorized`. The ledger is not touched until the transfer settles.
    pub async fn authorize(&self, claim: PaymentClaim) -> ReconciliationAck {
        let Some(order) = self.find_match(OrderStatusType::PendingPayment, &claim).await else {
            return ReconciliationAck::rejected("No order awaiting payment matches this transfer");
        };
        let order_id = &order.order_id;
        let result = self
            .db
            .transition_order_status(order_id, &[OrderStatusType::PendingPayment], OrderStatusType::Authorized)
            .await;
        match result {
            Ok(Some(authorized)) => {
                self.scheduler.disarm(order_id);
                self.scheduler.notifier().publish(order_id, OrderStatusEvent::authorized(&authorized));
                info!("🧾️ Order {order_id} authorized for {} by {}", claim.amount, claim.identity);
                ReconciliationAck::matched(order_id, "Order authorized")
            },
            Ok(None) => {
                info!("🧾️ Order {order_id} changed state before it could be authorized");
                ReconciliationAck::rejected("The matching order is no longer awaiting payment")
            },
            Err(e) => {
                error!("🧾️ Could not authorize order {order_id}. {e}");
                ReconciliationAck::rejected("The order could not be updated")
            },
        }
    }

    /// The gateway has settled an authorized transfer. The order is accepted, the settlement details are stored and
    /// the ledger is credited.
    pub async fn settle(&self, claim: PaymentClaim) -> ReconciliationAck {
        let Some(order) = self.find_match(OrderStatusType::Authorized, &claim).await else {
            return ReconciliationAck::rejected("No authorized order matches this settlement");
        };
        let order_id = &order.order_id;
        let result = self
            .db
            .transition_order_status(order_id, &[OrderStatusType::Authorized], OrderStatusType::Accepted)
            .await;
        let accepted = match result {
            Ok(Some(order)) => order,
            Ok(None) => {
                info!("🧾️ Order {order_id} changed state before it could be settled");
                return ReconciliationAck::rejected("The matching order is no longer authorized");
            },
            Err(e) => {
                error!("🧾️ Could not settle order {order_id}. {e}");
                return ReconciliationAck::rejected("The order could not be updated");
            },
        };
        // From here on the order is settled, and every failure is logged rather than reported.
        let details = claim.settlement_details();
        let reference = claim.reference.as_deref().unwrap_or("<none>");
        let accepted = match self.db.record_settlement(order_id, &details).await {
            Ok(order) => order,
            Err(e) => {
                error!("🧾️ Could not record settlement {reference} on order {order_id}. {e}");
                accepted
            },
        };
        let ledger = self
            .ledger
            .apply_settlement(order_id, &accepted.store_id, accepted.amount_local, claim.reference.as_deref())
            .await;
        let notifier = self.scheduler.notifier();
        notifier.publish(order_id, OrderStatusEvent::accepted(&accepted));
        notifier.close(order_id);
        info!("🧾️ Order {order_id} settled (ref {reference})");
        let event = OrderSettledEvent::new(accepted, SettlementPath::Reconciliation, claim.reference.clone(), ledger);
        self.producers.publish_order_settled(event).await;
        ReconciliationAck::matched(order_id, "Order settled")
    }

    /// The oldest order in `status` that matches the claim.
    async fn find_match(&self, status: OrderStatusType, claim: &PaymentClaim) -> Option<Order> {
        let identity = claim.identity.trim();
        if identity.is_empty() || !claim.amount.is_positive() {
            info!("🧾️ Ignoring claim with missing identity or non-positive amount ({claim:?})");
            return None;
        }
        let candidates = match self
            .db
            .fetch_reconciliation_candidates(status, PaymentMethod::MobileTransfer, identity)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                error!("🧾️ Could not fetch {status} orders for {identity}. {e}");
                return None;
            },
        };
        let mut matches = candidates.into_iter().filter(|o| o.amount_local == claim.amount);
        let first = matches.next();
        match &first {
            Some(order) => {
                let others = matches.map(|o| o.order_id.to_string()).collect::<Vec<_>>();
                if !others.is_empty() {
                    warn!(
                        "🧾️ AMBIGUOUS MATCH. {} {status} orders from {identity} are for {}. Using the oldest, {}. \
                         Also matching: {}",
                        others.len() + 1,
                        claim.amount,
                        order.order_id,
                        others.join(", ")
                    );
                }
            },
            None => debug!("🧾️ No {status} order from {identity} for {}", claim.amount),
        }
        first
    }
}
