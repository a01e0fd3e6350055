//! Generate a threshold group key with every participant of a broadcast channel.
//!
//! # Protocol
//!
//! Each participant runs [execute] against the same [Channel] and [BlockCounter]. The
//! protocol proceeds through five phases, each bounded by a number of blocks (see [Budgets]):
//!
//! 1. **Join**: announce participation and learn who else joined.
//! 2. **Commitment**: publish commitments to a fresh secret polynomial.
//! 3. **Share**: privately send every peer its share and verify the shares received.
//! 4. **Accusation**: publish the peers from which no valid share was received.
//! 5. **Justification**: reveal the shares dealt to accusers and check the shares others revealed.
//!
//! A phase ends when its block budget elapses. Only the justification phase ends as soon as every
//! peer has responded: the remaining phases always wait out their budget so that all participants
//! move between phases at the same heights.
//!
//! Sending may wait for room in the subscriptions of slower peers. While sending (or waiting for
//! a phase to end), a participant keeps draining its own subscription so that no participant
//! blocks another past the end of a phase.
//!
//! # Faults
//!
//! Invalid or missing shares are not errors: they are handled in-band through accusations and
//! justifications, and only shrink the set of members that contribute to the group key. A phase
//! that expires before every peer responded is recorded as a [Timeout] in the [Output] (and the
//! protocol continues with whatever was collected).
//!
//! Shares are sent as receiver-tagged messages on the shared channel. They are not encrypted.

mod inbox;
pub mod wire;

use futures::Stream;
use inbox::Inbox;
use rand::rngs::OsRng;
use relay_broadcast::{Channel, Message};
use relay_chain::BlockCounter;
use relay_cryptography::bls12381::{
    primitives::group::{Element, Scalar},
    thresholdgroup::{self, Final, Id, Local},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter},
    future::Future,
    pin::pin,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur during key generation.
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
    #[error("insufficient members: {0}/{1}")]
    InsufficientMembers(u32, u32),
}

/// A phase of key generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Join,
    Commitment,
    Share,
    Accusation,
    Justification,
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Join => write!(f, "join"),
            Phase::Commitment => write!(f, "commitment"),
            Phase::Share => write!(f, "share"),
            Phase::Accusation => write!(f, "accusation"),
            Phase::Justification => write!(f, "justification"),
        }
    }
}

/// Number of blocks each phase may take.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Budgets {
    pub join: u64,
    pub commitment: u64,
    pub share: u64,
    pub accusation: u64,
    pub justification: u64,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            join: 5,
            commitment: 3,
            share: 5,
            accusation: 3,
            justification: 3,
        }
    }
}

impl Budgets {
    /// Returns the budget of `phase`.
    pub fn get(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Join => self.join,
            Phase::Commitment => self.commitment,
            Phase::Share => self.share,
            Phase::Accusation => self.accusation,
            Phase::Justification => self.justification,
        }
    }
}

/// How a participant deviates from the protocol (for testing how others respond).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Deviation {
    /// Follow the protocol.
    #[default]
    Honest,

    /// Never send shares or justifications (but follow every other step).
    Silent,

    /// Send random shares (but justify honestly when accused).
    Corrupt,
}

/// Configuration for [execute].
#[derive(Clone, Debug)]
pub struct Config {
    /// Hex-encoded identifier of this member.
    pub member_id: String,

    /// Number of participants expected to join (including this member).
    pub group_size: u32,

    /// Number of members required to produce a group signature.
    pub threshold: u32,

    /// Number of blocks each phase may take.
    pub budgets: Budgets,

    /// Deviation from the protocol.
    pub deviation: Deviation,
}

/// A phase that ended before every peer responded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeout {
    pub phase: Phase,
    pub received: usize,
    pub expected: usize,
}

/// Result of key generation.
pub struct Output {
    /// This member's view of the group.
    pub member: Final,

    /// Phases that expired before every peer responded.
    pub timeouts: Vec<Timeout>,
}

/// Messages collected before a phase ended.
struct Progress {
    received: usize,
    expired: bool,
}

/// Feeds messages of the current phase to `handle` until it reports `expected` responses
/// or `waiter` resolves.
async fn collect<S, W, F>(
    inbox: &mut Inbox<S>,
    waiter: &mut W,
    expected: usize,
    mut handle: F,
) -> Result<Progress, Error>
where
    S: Stream<Item = Message<Id, wire::Dkg>> + Unpin,
    W: Future<Output = Result<u64, relay_chain::Error>> + Unpin,
    F: FnMut(Message<Id, wire::Dkg>) -> usize,
{
    let mut received = 0;
    while received < expected {
        tokio::select! {
            result = &mut *waiter => {
                result?;
                return Ok(Progress { received, expired: true });
            },
            message = inbox.next() => {
                received = handle(message?);
            },
        }
    }
    Ok(Progress {
        received,
        expired: false,
    })
}

/// Sends `message` while holding any messages that arrive in the meantime.
async fn send<S, C>(
    inbox: &mut Inbox<S>,
    channel: &C,
    message: Message<Id, wire::Dkg>,
) -> Result<(), Error>
where
    S: Stream<Item = Message<Id, wire::Dkg>> + Unpin,
    C: Channel<Identity = Id, Payload = wire::Dkg>,
{
    let mut sending = pin!(channel.send(message));
    loop {
        tokio::select! {
            result = &mut sending => {
                result?;
                return Ok(());
            },
            result = inbox.pull() => {
                result?;
            },
        }
    }
}

/// Records an expired phase (or, if the phase finished early and `wait_out` is set, waits
/// for its budget to elapse while holding any messages that arrive in the meantime).
async fn finish<S, W>(
    inbox: &mut Inbox<S>,
    phase: Phase,
    progress: Progress,
    expected: usize,
    waiter: W,
    wait_out: bool,
    timeouts: &mut Vec<Timeout>,
) -> Result<(), Error>
where
    S: Stream<Item = Message<Id, wire::Dkg>> + Unpin,
    W: Future<Output = Result<u64, relay_chain::Error>> + Unpin,
{
    if progress.expired {
        warn!(%phase, received = progress.received, expected, "phase timed out");
        timeouts.push(Timeout {
            phase,
            received: progress.received,
            expected,
        });
        return Ok(());
    }
    if wait_out {
        let height = wait(inbox, waiter).await?;
        debug!(%phase, height, "phase complete");
    }
    Ok(())
}

/// Waits for `waiter` to resolve while holding any messages that arrive in the meantime.
async fn wait<S, W>(inbox: &mut Inbox<S>, mut waiter: W) -> Result<u64, Error>
where
    S: Stream<Item = Message<Id, wire::Dkg>> + Unpin,
    W: Future<Output = Result<u64, relay_chain::Error>> + Unpin,
{
    loop {
        tokio::select! {
            result = &mut waiter => {
                return Ok(result?);
            },
            result = inbox.pull() => {
                result?;
            },
        }
    }
}

/// Runs key generation to completion.
///
/// The member identifier and threshold are validated before anything is sent.
pub async fn execute<B, C>(block_counter: &B, channel: &C, config: Config) -> Result<Output, Error>
where
    B: BlockCounter,
    C: Channel<Identity = Id, Payload = wire::Dkg>,
{
    let local = Local::new(&config.member_id, config.threshold)?;
    let me = local.id();
    let budgets = config.budgets;
    let mut timeouts = Vec::new();

    // Subscribe before anyone joins and start at the next block
    let mut inbox = Inbox::new(me, channel.subscribe());
    let start = wait(&mut inbox, block_counter.block_waiter(1)).await?;
    info!(member = %me, height = start, channel = channel.name(), "starting key generation");

    // Join
    inbox.enter(Phase::Join);
    let mut waiter = block_counter.block_waiter(budgets.get(Phase::Join));
    send(
        &mut inbox,
        channel,
        Message::broadcast(me, wire::Dkg::Join(wire::JoinMessage)),
    )
    .await?;
    let expected = config.group_size.saturating_sub(1) as usize;
    let mut peers = Vec::new();
    let progress = collect(&mut inbox, &mut waiter, expected, |message| {
        if !peers.contains(&message.sender) {
            debug!(member = %me, sender = %message.sender, "received join");
            peers.push(message.sender);
        }
        peers.len()
    })
    .await?;
    finish(
        &mut inbox,
        Phase::Join,
        progress,
        expected,
        waiter,
        true,
        &mut timeouts,
    )
    .await?;
    let members = peers.len() as u32 + 1;
    if members < config.threshold {
        return Err(Error::InsufficientMembers(members, config.threshold));
    }

    // Commitment
    inbox.enter(Phase::Commitment);
    let mut waiter = block_counter.block_waiter(budgets.get(Phase::Commitment));
    let mut sharing = local.initialize_sharing(peers.iter().copied());
    let expected = peers.len();
    send(
        &mut inbox,
        channel,
        Message::broadcast(
            me,
            wire::Dkg::Commitments(wire::MemberCommitmentsMessage {
                commitments: sharing.commitments().to_vec(),
            }),
        ),
    )
    .await?;
    let mut committed = BTreeSet::new();
    let progress = collect(&mut inbox, &mut waiter, expected, |message| {
        let wire::Dkg::Commitments(msg) = message.payload else {
            return committed.len();
        };
        match sharing.add_commitments_from_id(message.sender, msg.commitments) {
            Ok(()) => {
                debug!(member = %me, sender = %message.sender, "received commitments");
                committed.insert(message.sender);
            }
            Err(err) => {
                warn!(member = %me, sender = %message.sender, ?err, "rejected commitments");
            }
        }
        committed.len()
    })
    .await?;
    finish(
        &mut inbox,
        Phase::Commitment,
        progress,
        expected,
        waiter,
        true,
        &mut timeouts,
    )
    .await?;

    // Share
    inbox.enter(Phase::Share);
    let mut waiter = block_counter.block_waiter(budgets.get(Phase::Share));
    for peer in &peers {
        let share = match config.deviation {
            Deviation::Silent => {
                warn!(member = %me, peer = %peer, "withholding share");
                continue;
            }
            Deviation::Corrupt => {
                warn!(member = %me, peer = %peer, "sending corrupt share");
                Scalar::rand(&mut OsRng)
            }
            Deviation::Honest => match sharing.secret_share_for_id(*peer) {
                Some(share) => share,
                None => continue,
            },
        };
        send(
            &mut inbox,
            channel,
            Message::private(me, *peer, wire::Dkg::Share(wire::MemberShareMessage { share })),
        )
        .await?;
    }
    let progress = collect(&mut inbox, &mut waiter, expected, |message| {
        if let wire::Dkg::Share(msg) = message.payload {
            if sharing.add_share_from_id(message.sender, msg.share) {
                debug!(member = %me, sender = %message.sender, "received share");
            } else {
                warn!(member = %me, sender = %message.sender, "received invalid share");
            }
        }
        sharing.received_shares().len() - 1
    })
    .await?;
    finish(
        &mut inbox,
        Phase::Share,
        progress,
        expected,
        waiter,
        true,
        &mut timeouts,
    )
    .await?;

    // Accusation
    inbox.enter(Phase::Accusation);
    let mut waiter = block_counter.block_waiter(budgets.get(Phase::Accusation));
    let accused_ids = sharing.accused_ids();
    if !accused_ids.is_empty() {
        info!(member = %me, accused = ?accused_ids, "accusing members");
    }
    let mut justifying = sharing.initialize_justification();
    for accused in &accused_ids {
        justifying.add_accusation_from_id(me, *accused);
    }
    send(
        &mut inbox,
        channel,
        Message::broadcast(
            me,
            wire::Dkg::Accusations(wire::AccusationsMessage { accused_ids }),
        ),
    )
    .await?;
    let mut accusers = BTreeSet::new();
    let progress = collect(&mut inbox, &mut waiter, expected, |message| {
        let wire::Dkg::Accusations(msg) = message.payload else {
            return accusers.len();
        };
        if !justifying.is_member(&message.sender) || !accusers.insert(message.sender) {
            return accusers.len();
        }
        for accused in msg.accused_ids {
            justifying.add_accusation_from_id(message.sender, accused);
        }
        accusers.len()
    })
    .await?;
    finish(
        &mut inbox,
        Phase::Accusation,
        progress,
        expected,
        waiter,
        true,
        &mut timeouts,
    )
    .await?;

    // Justification
    inbox.enter(Phase::Justification);
    let mut waiter = block_counter.block_waiter(budgets.get(Phase::Justification));
    let accuser_ids = justifying.accuser_ids();
    let justifications = match config.deviation {
        Deviation::Silent => {
            if !accuser_ids.is_empty() {
                warn!(member = %me, accusers = ?accuser_ids, "withholding justifications");
            }
            BTreeMap::new()
        }
        Deviation::Honest | Deviation::Corrupt => {
            if !accuser_ids.is_empty() {
                info!(member = %me, accusers = ?accuser_ids, "justifying shares");
            }
            justifying.justifications()
        }
    };
    send(
        &mut inbox,
        channel,
        Message::broadcast(
            me,
            wire::Dkg::Justifications(wire::JustificationsMessage { justifications }),
        ),
    )
    .await?;
    let mut justified = BTreeSet::new();
    let progress = collect(&mut inbox, &mut waiter, expected, |message| {
        let wire::Dkg::Justifications(msg) = message.payload else {
            return justified.len();
        };
        if !justifying.is_member(&message.sender) || !justified.insert(message.sender) {
            return justified.len();
        }
        for (accuser, share) in msg.justifications {
            if justifying.record_justification_from_id(message.sender, accuser, share) {
                debug!(member = %me, accused = %message.sender, accuser = %accuser, "accepted justification");
            } else {
                warn!(member = %me, accused = %message.sender, accuser = %accuser, "rejected justification");
            }
        }
        justified.len()
    })
    .await?;
    finish(
        &mut inbox,
        Phase::Justification,
        progress,
        expected,
        waiter,
        false,
        &mut timeouts,
    )
    .await?;
    let unanswered = justifying.pending_justification_ids();
    if !unanswered.is_empty() {
        warn!(member = %me, accused = ?unanswered, "accusations left unanswered");
    }

    // Finalize
    let member = justifying.finalize();
    info!(
        member = %me,
        qualified = member.qualified_members().len(),
        public = hex(&member.group_public_key().serialize()),
        timeouts = timeouts.len(),
        "finished key generation"
    );
    Ok(Output { member, timeouts })
}

/// Encodes bytes as a hex string.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
