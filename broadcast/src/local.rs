//! In-memory implementation of a [Channel](crate::Channel).
//!
//! Every subscription owns a bounded queue. Sending a message clones it into the queue of every
//! live subscription concurrently and waits until each queue has accepted it, so a slow subscriber
//! applies back-pressure to senders rather than causing unbounded buffering.
//!
//! # Example
//!
//! ```rust
//! use relay_broadcast::{local::{Channel, Config}, Channel as _, Message};
//! use futures::StreamExt;
//! use prometheus_client::registry::Registry;
//! use std::sync::{Arc, Mutex};
//!
//! futures::executor::block_on(async {
//!     let channel = Channel::<u64, String>::new(Config {
//!         name: "example".into(),
//!         mailbox_size: 16,
//!         registry: Arc::new(Mutex::new(Registry::default())),
//!     });
//!     let mut subscription = channel.subscribe();
//!     channel.send(Message::broadcast(1, "hello".to_string())).await.unwrap();
//!     assert_eq!(subscription.next().await.unwrap().payload, "hello");
//! });
//! ```

use crate::{Error, Message};
use futures::{channel::mpsc, future::join_all, SinkExt};
use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use tracing::{debug, trace};

/// Configuration for a local [Channel].
pub struct Config {
    /// Name of the channel (also used to prefix its metrics).
    pub name: String,

    /// Maximum number of undelivered messages queued for each subscription before
    /// senders must wait.
    pub mailbox_size: usize,

    /// Registry for metrics.
    pub registry: Arc<Mutex<Registry>>,
}

struct Inner<I, P> {
    name: String,
    mailbox_size: usize,
    subscribers: Mutex<Vec<mpsc::Sender<Message<I, P>>>>,
    closed: AtomicBool,

    messages_sent: Counter,
    messages_delivered: Counter,
    subscriptions: Gauge,
}

/// An in-memory channel shared by every participant in the same process.
///
/// Cloning the channel returns a handle to the same set of subscriptions.
pub struct Channel<I, P> {
    inner: Arc<Inner<I, P>>,
}

impl<I, P> Clone for Channel<I, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<I, P> Channel<I, P>
where
    I: Clone + PartialEq + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    /// Creates a new channel with no subscriptions.
    pub fn new(cfg: Config) -> Self {
        let messages_sent = Counter::default();
        let messages_delivered = Counter::default();
        let subscriptions = Gauge::default();
        {
            let mut registry = cfg.registry.lock().unwrap();
            let registry = registry.sub_registry_with_prefix(&cfg.name);
            registry.register("messages_sent", "messages sent", messages_sent.clone());
            registry.register(
                "messages_delivered",
                "messages delivered to subscriptions",
                messages_delivered.clone(),
            );
            registry.register(
                "subscribers",
                "live subscriptions",
                subscriptions.clone(),
            );
        }

        Self {
            inner: Arc::new(Inner {
                name: cfg.name,
                mailbox_size: cfg.mailbox_size,
                subscribers: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
                messages_sent,
                messages_delivered,
                subscriptions,
            }),
        }
    }

    /// Closes the channel for every handle.
    ///
    /// Subscriptions end once messages already queued are consumed, later sends return
    /// [Error::Closed], and later subscriptions end immediately.
    pub fn close(&self) {
        let mut subscribers = self.inner.subscribers.lock().unwrap();
        self.inner.closed.store(true, Ordering::Release);
        subscribers.clear();
        self.inner.subscriptions.set(0);
        debug!(channel = %self.inner.name, "closed channel");
    }
}

impl<I, P> crate::Channel for Channel<I, P>
where
    I: Clone + PartialEq + Send + Sync + 'static,
    P: Clone + Send + Sync + 'static,
{
    type Identity = I;
    type Payload = P;
    type Subscription = mpsc::Receiver<Message<I, P>>;

    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn send(&self, message: Message<I, P>) -> Result<(), Error> {
        // Snapshot live subscriptions (pruning any that were dropped)
        let mut subscribers = {
            let mut subscribers = self.inner.subscribers.lock().unwrap();
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(Error::Closed);
            }
            subscribers.retain(|subscriber| !subscriber.is_closed());
            self.inner.subscriptions.set(subscribers.len() as i64);
            subscribers.clone()
        };
        self.inner.messages_sent.inc();

        // Deliver to all subscriptions concurrently
        let deliveries = subscribers.iter_mut().map(|subscriber| {
            let message = message.clone();
            async move { subscriber.send(message).await.is_ok() }
        });
        let delivered = join_all(deliveries)
            .await
            .into_iter()
            .filter(|delivered| *delivered)
            .count();
        self.inner.messages_delivered.inc_by(delivered as u64);
        trace!(channel = %self.inner.name, delivered, "sent message");
        Ok(())
    }

    fn subscribe(&self) -> Self::Subscription {
        let (sender, receiver) = mpsc::channel(self.inner.mailbox_size);
        let mut subscribers = self.inner.subscribers.lock().unwrap();
        if self.inner.closed.load(Ordering::Acquire) {
            return receiver;
        }
        subscribers.push(sender);
        self.inner.subscriptions.set(subscribers.len() as i64);
        receiver
    }
}
