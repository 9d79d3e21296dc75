//! Payment-window timers.
//!
//! When an order enters `pending_payment` the [`ExpirationScheduler`] arms a single-shot timer for it. If nothing
//! settles the order before the timer fires, the order is moved to `expired`, an `expired` event is pushed to its
//! watchers and its realtime channel is closed.
//!
//! Timers live in memory only. They are lost if the process restarts; see
//! [`ExpirationScheduler::sweep_stale_orders`] for the opt-in recovery pass.
//!
//! Every armed timer carries a generation number. A timer that fires only acts if its generation is still the one in
//! the registry, so a stale firing can never remove or pre-empt a newer timer for the same order.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::Utc;
use log::*;
use tokio::task::JoinHandle;

use crate::{
    db_types::{Order, OrderId, OrderStatusType},
    events::OrderStatusEvent,
    notifier::RealtimeNotifier,
    traits::{OrderManagement, SettlementDatabaseError},
};

/// The default payment window: five minutes.
pub const DEFAULT_PAYMENT_WINDOW: Duration = Duration::from_secs(300);

struct TimerEntry {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TimerRegistry {
    next_generation: u64,
    timers: HashMap<OrderId, TimerEntry>,
}

impl TimerRegistry {
    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Removes the entry for `order_id` if it still belongs to `generation`.
    fn release(&mut self, order_id: &OrderId, generation: u64) -> bool {
        match self.timers.get(order_id) {
            Some(entry) if entry.generation == generation => {
                self.timers.remove(order_id);
                true
            },
            _ => false,
        }
    }
}

pub struct ExpirationScheduler<B> {
    db: Arc<B>,
    notifier: RealtimeNotifier,
    window: Duration,
    registry: Arc<Mutex<TimerRegistry>>,
}

impl<B> Clone for ExpirationScheduler<B> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            notifier: self.notifier.clone(),
            window: self.window,
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<B> std::fmt::Debug for ExpirationScheduler<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExpirationScheduler(window: {:?}, armed: {})", self.window, self.armed_count())
    }
}

impl<B> ExpirationScheduler<B> {
    pub fn new(db: Arc<B>, notifier: RealtimeNotifier, window: Duration) -> Self {
        Self { db, notifier, window, registry: Arc::new(Mutex::new(TimerRegistry::default())) }
    }

    fn registry(&self) -> MutexGuard<'_, TimerRegistry> {
        lock_registry(&self.registry)
    }

    pub fn notifier(&self) -> &RealtimeNotifier {
        &self.notifier
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Cancels the timer for `order_id`. Returns `false` if no timer was armed (it may already have fired).
    pub fn disarm(&self, order_id: &OrderId) -> bool {
        match self.registry().timers.remove(order_id) {
            Some(entry) => {
                entry.handle.abort();
                debug!("🕰️ Timer for order {order_id} disarmed");
                true
            },
            None => {
                trace!("🕰️ No timer to disarm for order {order_id}");
                false
            },
        }
    }

    pub fn is_armed(&self, order_id: &OrderId) -> bool {
        self.registry().timers.contains_key(order_id)
    }

    pub fn armed_count(&self) -> usize {
        self.registry().timers.len()
    }

    /// Cancels every armed timer. Orders are left in whatever state they are in.
    pub fn shutdown(&self) {
        let timers = std::mem::take(&mut self.registry().timers);
        let n = timers.len();
        for (_, entry) in timers {
            entry.handle.abort();
        }
        info!("🕰️ Expiration scheduler shut down. {n} timer(s) cancelled");
    }
}

impl<B> ExpirationScheduler<B>
where B: OrderManagement + 'static
{
    /// Starts the payment window for `order_id`. If a timer is already armed for the order it is replaced, and the
    /// window restarts.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&self, order_id: &OrderId) {
        let mut registry = self.registry();
        let generation = registry.next_generation();
        let scheduler = self.clone();
        let oid = order_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(scheduler.window).await;
            let current = lock_registry(&scheduler.registry).release(&oid, generation);
            if !current {
                trace!("🕰️ Timer generation {generation} for order {oid} is stale. Ignoring");
                return;
            }
            if let Err(e) = scheduler.expire_if_unpaid(&oid).await {
                error!("🕰️ Could not expire order {oid}. It may remain pending until it is cancelled. {e}");
            }
        });
        if let Some(previous) = registry.timers.insert(order_id.clone(), TimerEntry { generation, handle }) {
            previous.handle.abort();
            debug!("🕰️ Timer for order {order_id} re-armed");
        } else {
            debug!("🕰️ Timer for order {order_id} armed for {:?}", self.window);
        }
    }

    /// Expires the order if it is still waiting for payment.
    ///
    /// The status is re-read first, and the update itself is guarded, so an order that was authorized, accepted or
    /// cancelled in the meantime is never touched. Returns the expired order, or `None` if there was nothing to do.
    pub async fn expire_if_unpaid(&self, order_id: &OrderId) -> Result<Option<Order>, SettlementDatabaseError> {
        let Some(order) = self.db.fetch_order(order_id).await? else {
            warn!("🕰️ Timer fired for order {order_id}, but the order does not exist");
            return Ok(None);
        };
        if !order.status.is_expirable() {
            debug!("🕰️ Timer fired for order {order_id}, but it is already {}. Nothing to do", order.status);
            return Ok(None);
        }
        let expired =
            self.db.transition_order_status(order_id, &OrderStatusType::EXPIRABLE, OrderStatusType::Expired).await?;
        match expired {
            Some(order) => {
                info!("🕰️ Order {order_id} expired after its payment window closed");
                self.notifier.publish(order_id, OrderStatusEvent::expired(&order));
                self.notifier.close(order_id);
                Ok(Some(order))
            },
            None => {
                info!("🕰️ Order {order_id} changed state while it was being expired. Leaving it alone");
                Ok(None)
            },
        }
    }

    /// Expires `pending_payment` orders whose window closed while no timer was running, e.g. because the service was
    /// restarted. Returns the orders that were expired.
    pub async fn sweep_stale_orders(&self) -> Result<Vec<Order>, SettlementDatabaseError> {
        let window = chrono::Duration::from_std(self.window).unwrap_or_else(|_| chrono::Duration::minutes(5));
        let cutoff = Utc::now() - window;
        let stale = self.db.fetch_stale_orders(OrderStatusType::PendingPayment, cutoff).await?;
        debug!("🕰️ {} stale order(s) found", stale.len());
        let mut expired = Vec::with_capacity(stale.len());
        for order in stale {
            if self.is_armed(&order.order_id) {
                continue;
            }
            if let Some(order) = self.expire_if_unpaid(&order.order_id).await? {
                expired.push(order);
            }
        }
        info!("🕰️ Stale order sweep complete. {} order(s) expired", expired.len());
        Ok(expired)
    }
}

fn lock_registry(registry: &Mutex<TimerRegistry>) -> MutexGuard<'_, TimerRegistry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
