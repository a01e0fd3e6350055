//! Per-phase delivery of key generation messages.

use super::{wire, Error, Phase};
use futures::{Stream, StreamExt};
use relay_broadcast::Message;
use relay_cryptography::bls12381::thresholdgroup::Id;
use std::{
    cmp::Ordering,
    collections::{BTreeMap, VecDeque},
};
use tracing::trace;

/// Delivers the messages of the current phase.
///
/// Messages for a later phase are held until that phase is entered. Messages for an
/// earlier phase, messages sent by this member, and messages addressed to someone else
/// are dropped.
pub(super) struct Inbox<S> {
    me: Id,
    subscription: S,
    phase: Phase,
    pending: BTreeMap<Phase, VecDeque<Message<Id, wire::Dkg>>>,
}

impl<S: Stream<Item = Message<Id, wire::Dkg>> + Unpin> Inbox<S> {
    pub(super) fn new(me: Id, subscription: S) -> Self {
        Self {
            me,
            subscription,
            phase: Phase::Join,
            pending: BTreeMap::new(),
        }
    }

    /// Starts delivering messages for `phase` (and discards anything held for earlier ones).
    pub(super) fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.pending = self.pending.split_off(&phase);
    }

    /// Returns the next message for the current phase.
    ///
    /// Cancelling the returned future does not lose messages.
    pub(super) async fn next(&mut self) -> Result<Message<Id, wire::Dkg>, Error> {
        loop {
            if let Some(message) = self
                .pending
                .get_mut(&self.phase)
                .and_then(|queue| queue.pop_front())
            {
                return Ok(message);
            }
            self.pull().await?;
        }
    }

    /// Reads one message from the subscription and holds it until its phase is entered.
    ///
    /// Keeps the subscription drained while this member is busy sending or waiting for a
    /// phase to end. Cancelling the returned future does not lose messages.
    pub(super) async fn pull(&mut self) -> Result<(), Error> {
        let message = self.subscription.next().await.ok_or(Error::ChannelClosed)?;
        if message.sender == self.me || !message.is_for(&self.me) {
            return Ok(());
        }
        let phase = message.payload.phase();
        match phase.cmp(&self.phase) {
            Ordering::Less => {
                trace!(?phase, current = ?self.phase, sender = %message.sender, "dropping stale message");
                return Ok(());
            }
            Ordering::Equal => {}
            Ordering::Greater => {
                trace!(?phase, current = ?self.phase, sender = %message.sender, "holding early message");
            }
        }
        self.pending.entry(phase).or_default().push_back(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{channel::mpsc, executor::block_on, SinkExt};
    use relay_cryptography::bls12381::primitives::group::Scalar;

    fn id(i: u64) -> Id {
        Id::from_u64(i).unwrap()
    }

    fn join(sender: u64) -> Message<Id, wire::Dkg> {
        Message::broadcast(id(sender), wire::Dkg::Join(wire::JoinMessage))
    }

    fn accusations(sender: u64) -> Message<Id, wire::Dkg> {
        Message::broadcast(
            id(sender),
            wire::Dkg::Accusations(wire::AccusationsMessage {
                accused_ids: vec![id(1)],
            }),
        )
    }

    #[test]
    fn test_early_messages_held() {
        block_on(async {
            let (mut sender, receiver) = mpsc::unbounded();
            let mut inbox = Inbox::new(id(1), receiver);
            sender.send(accusations(2)).await.unwrap();
            sender.send(join(3)).await.unwrap();
            sender.send(accusations(4)).await.unwrap();

            // The accusations are skipped over (but kept) while joining
            let message = inbox.next().await.unwrap();
            assert_eq!(message, join(3));

            // Once accusations are accepted, held messages are delivered in arrival order
            inbox.enter(Phase::Accusation);
            assert_eq!(inbox.next().await.unwrap(), accusations(2));
            assert_eq!(inbox.next().await.unwrap(), accusations(4));
        });
    }

    #[test]
    fn test_stale_and_foreign_messages_dropped() {
        block_on(async {
            let (mut sender, receiver) = mpsc::unbounded();
            let mut inbox = Inbox::new(id(1), receiver);
            inbox.enter(Phase::Share);

            let share = |to: u64| {
                Message::private(
                    id(2),
                    id(to),
                    wire::Dkg::Share(wire::MemberShareMessage {
                        share: Scalar::from_u64(7),
                    }),
                )
            };
            sender.send(join(2)).await.unwrap();
            sender.send(share(3)).await.unwrap();
            sender.send(accusations(1)).await.unwrap();
            sender.send(accusations(2)).await.unwrap();
            sender.send(share(1)).await.unwrap();
            assert_eq!(inbox.next().await.unwrap(), share(1));

            // Skipping a phase discards what was held for it
            inbox.enter(Phase::Justification);
            drop(sender);
            assert!(matches!(inbox.next().await, Err(Error::ChannelClosed)));
        });
    }

    #[test]
    fn test_pulled_messages_delivered() {
        block_on(async {
            let (mut sender, receiver) = mpsc::unbounded();
            let mut inbox = Inbox::new(id(1), receiver);
            sender.send(join(2)).await.unwrap();
            sender.send(accusations(3)).await.unwrap();
            sender.send(join(4)).await.unwrap();
            for _ in 0..3 {
                inbox.pull().await.unwrap();
            }

            // Nothing is left on the subscription once everything was pulled
            drop(sender);
            assert_eq!(inbox.next().await.unwrap(), join(2));
            assert_eq!(inbox.next().await.unwrap(), join(4));
            inbox.enter(Phase::Accusation);
            assert_eq!(inbox.next().await.unwrap(), accusations(3));
            assert!(matches!(inbox.pull().await, Err(Error::ChannelClosed)));
        });
    }
}
