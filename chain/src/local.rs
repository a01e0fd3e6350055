//! In-memory [BlockCounter](crate::BlockCounter) that produces a block at a fixed interval.
//!
//! The counter is driven by a background task on the current `tokio` runtime. The task holds
//! only a weak reference to the counter: once every handle is dropped (or [BlockCounter::stop]
//! is called), it exits and any pending waiter resolves to [Error::Stopped].

use crate::Error;
use futures::channel::oneshot;
use prometheus_client::{metrics::gauge::Gauge, registry::Registry};
use std::{
    collections::BTreeMap,
    future::Future,
    mem,
    pin::Pin,
    sync::{Arc, Mutex, Weak},
    task::{Context, Poll},
    time::Duration,
};
use tokio::time::{interval_at, Instant};
use tracing::{debug, trace};

/// Configuration for a local [BlockCounter].
#[derive(Clone)]
pub struct Config {
    /// Time between blocks.
    pub block_time: Duration,

    /// Height of the chain when the counter starts.
    pub start_height: u64,

    /// Registry for metrics (if any).
    pub registry: Option<Arc<Mutex<Registry>>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_time: Duration::from_millis(500),
            start_height: 0,
            registry: None,
        }
    }
}

struct State {
    height: u64,
    stopped: bool,
    waiters: BTreeMap<u64, Vec<oneshot::Sender<u64>>>,
}

struct Inner {
    state: Mutex<State>,
    block_height: Gauge,
}

impl Inner {
    /// Advances the height and notifies every waiter at or below it.
    ///
    /// Returns `false` if the counter was stopped.
    fn tick(&self) -> bool {
        let (height, ready) = {
            let mut guard = self.state.lock().unwrap();
            let state = &mut *guard;
            if state.stopped {
                return false;
            }
            state.height += 1;
            let pending = state.waiters.split_off(&(state.height + 1));
            (state.height, mem::replace(&mut state.waiters, pending))
        };
        self.block_height.set(height as i64);

        let mut notified = 0;
        for sender in ready.into_values().flatten() {
            if sender.send(height).is_ok() {
                notified += 1;
            }
        }
        trace!(height, notified, "new block");
        true
    }
}

/// A block counter that produces a block every [Config::block_time].
///
/// Cloning the counter returns a handle to the same chain.
#[derive(Clone)]
pub struct BlockCounter {
    inner: Arc<Inner>,
}

impl BlockCounter {
    /// Starts producing blocks on the current `tokio` runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a `tokio` runtime.
    pub fn start(cfg: Config) -> Self {
        let block_height = Gauge::default();
        block_height.set(cfg.start_height as i64);
        if let Some(registry) = &cfg.registry {
            registry.lock().unwrap().register(
                "block_height",
                "height of the chain",
                block_height.clone(),
            );
        }
        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                height: cfg.start_height,
                stopped: false,
                waiters: BTreeMap::new(),
            }),
            block_height,
        });

        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let block_time = cfg.block_time;
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + block_time, block_time);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("block counter dropped");
                    return;
                };
                if !inner.tick() {
                    debug!("block counter stopped");
                    return;
                }
            }
        });
        Self { inner }
    }

    /// Stops producing blocks.
    ///
    /// Pending (and future) waiters resolve to [Error::Stopped].
    pub fn stop(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.stopped = true;
        state.waiters.clear();
    }
}

impl crate::BlockCounter for BlockCounter {
    type Waiter = Waiter;

    fn current_block(&self) -> u64 {
        self.inner.state.lock().unwrap().height
    }

    fn block_waiter(&self, blocks: u64) -> Waiter {
        let mut state = self.inner.state.lock().unwrap();
        if state.stopped {
            return Waiter::Ready(Some(Err(Error::Stopped)));
        }
        if blocks == 0 {
            return Waiter::Ready(Some(Ok(state.height)));
        }
        let (sender, receiver) = oneshot::channel();
        let target = state.height + blocks;
        state.waiters.entry(target).or_default().push(sender);
        Waiter::Pending(receiver)
    }
}

/// Resolves once the requested height is reached.
pub enum Waiter {
    Ready(Option<Result<u64, Error>>),
    Pending(oneshot::Receiver<u64>),
}

impl Future for Waiter {
    type Output = Result<u64, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.get_mut() {
            Waiter::Ready(result) => Poll::Ready(result.take().unwrap_or(Err(Error::Stopped))),
            Waiter::Pending(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|result| result.map_err(|_| Error::Stopped)),
        }
    }
}
