use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    events::OrderStatusEvent,
    expiration::ExpirationScheduler,
    settlement_api::errors::OrderFlowError,
    traits::OrderManagement,
};

/// `OrderFlowApi` drives an order through the parts of its lifecycle that the customer controls: creation, starting
/// the payment and cancellation.
///
/// Settlement (the move to `authorized` and `accepted`) belongs to
/// [`ChargeFlowApi`](crate::ChargeFlowApi) and [`ReconciliationApi`](crate::ReconciliationApi).
pub struct OrderFlowApi<B> {
    db: Arc<B>,
    scheduler: ExpirationScheduler<B>,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> Clone for OrderFlowApi<B> {
    fn clone(&self) -> Self {
        Self { db: Arc::clone(&self.db), scheduler: self.scheduler.clone() }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: Arc<B>, scheduler: ExpirationScheduler<B>) -> Self {
        Self { db, scheduler }
    }

    pub fn db(&self) -> &B {
        self.db.as_ref()
    }

    pub fn scheduler(&self) -> &ExpirationScheduler<B> {
        &self.scheduler
    }
}

impl<B> OrderFlowApi<B>
where B: OrderManagement + 'static
{
    /// Stores a brand-new order in the `pending` state.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        if !order.amount_local.is_positive() {
            let msg = format!("The order amount must be positive, not {}", order.amount_local);
            return Err(OrderFlowError::InvalidOrder(msg));
        }
        if order.payer_identity.trim().is_empty() {
            return Err(OrderFlowError::InvalidOrder("The payer identity is required".into()));
        }
        if order.order_id.as_str().trim().is_empty() || order.store_id.as_str().trim().is_empty() {
            return Err(OrderFlowError::InvalidOrder("Order and store ids are required".into()));
        }
        let order = self.db.insert_order(order).await?;
        info!("🔄️📦️ Order {} created for store {} ({})", order.order_id, order.store_id, order.amount_local);
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        Ok(self.db.fetch_order(order_id).await?)
    }

    /// The customer has reached the payment step. The order moves to `pending_payment` and its payment window starts.
    pub async fn begin_payment(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self.transition(order_id, &[OrderStatusType::Pending], OrderStatusType::PendingPayment).await?;
        self.scheduler.arm(order_id);
        info!("🔄️💳️ Payment window opened for order {order_id}");
        Ok(order)
    }

    /// Cancels an order that has not been accepted yet, stops its payment window and tells its watchers.
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        let order = self.transition(order_id, &OrderStatusType::CANCELLABLE, OrderStatusType::Cancelled).await?;
        self.scheduler.disarm(order_id);
        let notifier = self.scheduler.notifier();
        notifier.publish(order_id, OrderStatusEvent::cancelled(&order));
        notifier.close(order_id);
        info!("🔄️❌️ Order {order_id} cancelled");
        Ok(order)
    }

    /// Moves the order to `to` if, and only if, it is currently in one of the `from` states.
    ///
    /// Every `from -> to` pair must be an edge of the order lifecycle. If the order is in some other state, nothing is
    /// written and [`OrderFlowError::InvalidTransition`] is returned.
    pub async fn transition(
        &self,
        order_id: &OrderId,
        from: &[OrderStatusType],
        to: OrderStatusType,
    ) -> Result<Order, OrderFlowError> {
        if let Some(bad) = from.iter().find(|s| !s.can_transition_to(to)) {
            return Err(OrderFlowError::InvalidTransition { order_id: order_id.clone(), from: *bad, to });
        }
        match self.db.transition_order_status(order_id, from, to).await? {
            Some(order) => {
                debug!("🔄️ Order {order_id} is now {to}");
                Ok(order)
            },
            None => {
                let current = self
                    .db
                    .fetch_order(order_id)
                    .await?
                    .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
                debug!("🔄️ Order {order_id} is {}. Refusing to move it to {to}", current.status);
                Err(OrderFlowError::InvalidTransition { order_id: order_id.clone(), from: current.status, to })
            },
        }
    }
}
