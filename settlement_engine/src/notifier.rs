//! Per-order realtime notifications.
//!
//! Clients watching an order (typically a checkout page holding a server-sent-events connection) subscribe to that
//! order's channel. Delivery is at-most-once: an event published while nobody is listening is dropped, and late
//! subscribers do not see earlier events. Publishing never waits on subscribers.
//!
//! Closing a channel (which happens when an order reaches a terminal state) ends every subscriber's stream once it
//! has drained the events already delivered to it. A channel whose last subscriber goes away is removed as well.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
        MutexGuard,
    },
};

use futures_util::Stream;
use log::*;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{db_types::OrderId, events::OrderStatusEvent};

const DEFAULT_CHANNEL_CAPACITY: usize = 16;

struct Channel {
    /// Distinguishes a reopened channel from an earlier one for the same order.
    generation: u64,
    sender: broadcast::Sender<OrderStatusEvent>,
}

type Channels = HashMap<OrderId, Channel>;

#[derive(Clone)]
pub struct RealtimeNotifier {
    channels: Arc<Mutex<Channels>>,
    next_generation: Arc<AtomicU64>,
    capacity: usize,
}

impl Default for RealtimeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl std::fmt::Debug for RealtimeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RealtimeNotifier({} open channels)", self.channels().len())
    }
}

impl RealtimeNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
            capacity: capacity.max(1),
        }
    }

    fn channels(&self) -> MutexGuard<'_, Channels> {
        lock_channels(&self.channels)
    }

    /// Opens (or joins) the channel for `order_id`.
    pub fn subscribe(&self, order_id: &OrderId) -> OrderEventStream {
        let mut channels = self.channels();
        let channel = channels.entry(order_id.clone()).or_insert_with(|| {
            trace!("📡️ Opening event channel for order {order_id}");
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            Channel { generation, sender: broadcast::channel(self.capacity).0 }
        });
        OrderEventStream {
            order_id: order_id.clone(),
            generation: channel.generation,
            receiver: channel.sender.subscribe(),
            channels: Arc::clone(&self.channels),
        }
    }

    /// Delivers `event` to the current subscribers of `order_id`. Returns the number of subscribers that received it.
    pub fn publish(&self, order_id: &OrderId, event: OrderStatusEvent) -> usize {
        let mut channels = self.channels();
        let Some(channel) = channels.get(order_id) else {
            trace!("📡️ No channel for order {order_id}. Event dropped");
            return 0;
        };
        match channel.sender.send(event) {
            Ok(n) => {
                debug!("📡️ Delivered event for order {order_id} to {n} subscriber(s)");
                n
            },
            Err(_) => {
                trace!("📡️ Nobody is listening to order {order_id}. Event dropped");
                channels.remove(order_id);
                0
            },
        }
    }

    /// Ends the channel for `order_id`. Returns `false` if there was no open channel.
    pub fn close(&self, order_id: &OrderId) -> bool {
        let closed = self.channels().remove(order_id).is_some();
        if closed {
            debug!("📡️ Closed event channel for order {order_id}");
        }
        closed
    }

    pub fn subscriber_count(&self, order_id: &OrderId) -> usize {
        self.channels().get(order_id).map(|c| c.sender.receiver_count()).unwrap_or(0)
    }

    pub fn open_channels(&self) -> usize {
        self.channels().len()
    }
}

fn lock_channels(channels: &Mutex<Channels>) -> MutexGuard<'_, Channels> {
    channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct OrderEventStream {
    order_id: OrderId,
    generation: u64,
    receiver: broadcast::Receiver<OrderStatusEvent>,
    channels: Arc<Mutex<Channels>>,
}

impl Drop for OrderEventStream {
    fn drop(&mut self) {
        let mut channels = lock_channels(&self.channels);
        let last_subscriber = channels
            .get(&self.order_id)
            .is_some_and(|c| c.generation == self.generation && c.sender.receiver_count() <= 1);
        if last_subscriber {
            channels.remove(&self.order_id);
            trace!("📡️ Last subscriber to order {} left. Channel removed", self.order_id);
        }
    }
}

impl OrderEventStream {
    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// The next event, or `None` once the channel has been closed.
    pub async fn next_event(&mut self) -> Option<OrderStatusEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => {
                    warn!("📡️ Subscriber to order {} fell behind and missed {n} event(s)", self.order_id);
                },
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = OrderStatusEvent> {
        futures_util::stream::unfold(self, |mut s| async move { s.next_event().await.map(|ev| (ev, s)) })
    }
}
