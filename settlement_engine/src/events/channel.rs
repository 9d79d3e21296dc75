//! Stateless pub-sub hooks for settlement events
//!
//! Components that have finished a unit of work (e.g. the ledger has been credited for an order) push an event into
//! an [`EventProducer`]. A single [`EventHandler`] per hook drains the channel and runs the user-supplied async
//! handler for each event in its own task. Handlers only see the event itself, never engine internals.
use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size.max(1));
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handler jobs to finish.
    pub async fn start_handler(mut self) {
        debug!("🪝️ Starting event handler");
        // Only producers may keep the channel open
        drop(self.sender);
        let jobs = Arc::new(AtomicI64::new(0));
        while let Some(ev) = self.listener.recv().await {
            let handler = Arc::clone(&self.handler);
            jobs.fetch_add(1, Ordering::SeqCst);
            let job = Arc::clone(&jobs);
            tokio::spawn(async move {
                (handler)(ev).await;
                job.fetch_sub(1, Ordering::SeqCst);
                trace!("🪝️ Event handled");
            });
        }
        while jobs.load(Ordering::SeqCst) > 0 {
            trace!("🪝️ Waiting for {} hook jobs to complete", jobs.load(Ordering::SeqCst));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        debug!("🪝️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Queues the event for the handler. Returns `false` if the handler has shut down.
    pub async fn publish_event(&self, event: E) -> bool {
        match self.sender.send(event).await {
            Ok(()) => true,
            Err(e) => {
                error!("🪝️ Failed to send event: {e}");
                false
            },
        }
    }
}
