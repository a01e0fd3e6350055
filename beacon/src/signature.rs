//! Produce a group signature with the members of a threshold group.
//!
//! Every member broadcasts its partial signature over the message, collects the partial
//! signatures of the other qualified members (verifying each against the group public
//! polynomial), and interpolates the group signature once collection ends.

use crate::dkg::hex;
use bytes::Bytes;
use futures::StreamExt;
use relay_broadcast::{Channel, Message};
use relay_chain::BlockCounter;
use relay_cryptography::bls12381::{
    primitives::group::{self, Element},
    thresholdgroup::{self, Final, Id},
};
use std::{collections::BTreeMap, pin::pin};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while producing a group signature.
#[derive(Error, Debug)]
pub enum Error {
    #[error("member: {0}")]
    Member(#[from] thresholdgroup::Error),
    #[error("broadcast: {0}")]
    Broadcast(#[from] relay_broadcast::Error),
    #[error("block counter: {0}")]
    BlockCounter(#[from] relay_chain::Error),
    #[error("channel closed")]
    ChannelClosed,
    #[error("insufficient shares: {0}/{1}")]
    InsufficientShares(usize, u32),
}

/// A member's partial signature (a compressed G2 point).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSignatureShareMessage {
    pub share: Bytes,
}

/// Configuration for [execute].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Number of blocks to wait for partial signatures.
    pub budget: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self { budget: 10 }
    }
}

/// Signs `message` with the group.
///
/// `subscription` must be created (with [Channel::subscribe]) before any member of the group
/// can start signing, typically before key generation completes, so that partial signatures
/// from members that finish key generation earlier are not missed.
///
/// Partial signatures are collected until every other qualified member has responded or the
/// budget elapses. Returns [Error::InsufficientShares] if fewer than `threshold` valid partial
/// signatures (including this member's own) were collected.
pub async fn execute<B, C>(
    member: &Final,
    message: &[u8],
    block_counter: &B,
    channel: &C,
    mut subscription: C::Subscription,
    config: Config,
) -> Result<group::Signature, Error>
where
    B: BlockCounter,
    C: Channel<Identity = Id, Payload = GroupSignatureShareMessage>,
{
    let me = member.id();
    let mut waiter = block_counter.block_waiter(config.budget);
    debug!(member = %me, height = block_counter.current_block(), "starting group signature");

    // Keep collecting while the partial signature is delivered
    let partial = member.sign(message);
    let mut sending = pin!(channel.send(Message::broadcast(
        me,
        GroupSignatureShareMessage {
            share: Bytes::from(partial.serialize()),
        },
    )));
    let mut sent = false;
    let mut partials = BTreeMap::from([(me, partial)]);
    let expected = member.qualified_members().len();
    while !sent || partials.len() < expected {
        tokio::select! {
            result = &mut sending, if !sent => {
                result?;
                sent = true;
            },
            result = &mut waiter => {
                let height = result?;
                warn!(member = %me, height, sent, received = partials.len(), expected, "signature timed out");
                break;
            },
            next = subscription.next() => {
                let Some(msg) = next else {
                    return Err(Error::ChannelClosed);
                };
                if msg.sender == me || partials.contains_key(&msg.sender) {
                    continue;
                }
                let Some(partial) = group::Signature::deserialize(&msg.payload.share) else {
                    warn!(member = %me, sender = %msg.sender, "received malformed partial signature");
                    continue;
                };
                if let Err(err) = member.partial_verify(msg.sender, message, &partial) {
                    warn!(member = %me, sender = %msg.sender, ?err, "received invalid partial signature");
                    continue;
                }
                debug!(member = %me, sender = %msg.sender, "received partial signature");
                partials.insert(msg.sender, partial);
            },
        }
    }

    let threshold = member.threshold();
    if partials.len() < threshold as usize {
        return Err(Error::InsufficientShares(partials.len(), threshold));
    }
    let partials = partials.into_iter().collect::<Vec<_>>();
    let signature = member.aggregate(&partials)?;
    member.verify(message, &signature)?;
    info!(
        member = %me,
        partials = partials.len(),
        signature = hex(&signature.serialize()),
        "produced group signature"
    );
    Ok(signature)
}
