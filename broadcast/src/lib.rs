//! Deliver typed messages to every participant subscribed to a named channel.
//!
//! # Status
//!
//! `relay-broadcast` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.
//!
//! # Privacy
//!
//! Messages with a receiver are delivered to every subscriber (like any other message) and rely on
//! subscribers to ignore messages not addressed to them. Payloads are not encrypted. Implementations
//! that carry messages outside of a single process must provide confidentiality themselves.

use futures::Stream;
use std::future::Future;
use thiserror::Error;

pub mod local;

/// Errors that can occur when interacting with a channel.
#[derive(Error, Debug)]
pub enum Error {
    #[error("channel closed")]
    Closed,
}

/// A message sent over a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message<I, P> {
    /// Identity of the participant that sent the message.
    pub sender: I,

    /// Participant the message is intended for (`None` if intended for everyone).
    pub receiver: Option<I>,

    /// Content of the message.
    pub payload: P,
}

impl<I: PartialEq, P> Message<I, P> {
    /// Creates a message intended for every subscriber.
    pub fn broadcast(sender: I, payload: P) -> Self {
        Self {
            sender,
            receiver: None,
            payload,
        }
    }

    /// Creates a message intended for a single participant.
    pub fn private(sender: I, receiver: I, payload: P) -> Self {
        Self {
            sender,
            receiver: Some(receiver),
            payload,
        }
    }

    /// Returns `true` if `participant` should process the message.
    pub fn is_for(&self, participant: &I) -> bool {
        match &self.receiver {
            Some(receiver) => receiver == participant,
            None => true,
        }
    }
}

/// Interface for sending messages to (and receiving messages from) all participants
/// of a named channel.
pub trait Channel: Clone + Send + Sync + 'static {
    /// Identity used to tag the sender (and optional receiver) of a message.
    type Identity: Clone + PartialEq + Send + Sync + 'static;

    /// Content carried by a message.
    type Payload: Clone + Send + Sync + 'static;

    /// Stream of every message sent after the subscription was created.
    type Subscription: Stream<Item = Message<Self::Identity, Self::Payload>> + Send + Unpin + 'static;

    /// Returns the name of the channel.
    fn name(&self) -> &str;

    /// Delivers a message to every subscription that exists when the message is sent.
    ///
    /// Delivery is best-effort: subscriptions that are dropped before the message is
    /// delivered are skipped.
    ///
    /// Returns [Error::Closed] if the channel no longer accepts messages.
    fn send(
        &self,
        message: Message<Self::Identity, Self::Payload>,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Creates a new, independent subscription.
    fn subscribe(&self) -> Self::Subscription;
}
