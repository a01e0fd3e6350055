//! Messages exchanged during key generation.

use super::Phase;
use relay_cryptography::bls12381::{primitives::group, thresholdgroup::Id};
use std::collections::BTreeMap;

/// Announces that the sender is participating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinMessage;

/// Commitments to the coefficients of the sender's secret polynomial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberCommitmentsMessage {
    pub commitments: Vec<group::Public>,
}

/// The share the sender dealt to the receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberShareMessage {
    pub share: group::Private,
}

/// Members from which the sender did not retain a valid share.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccusationsMessage {
    pub accused_ids: Vec<Id>,
}

/// Shares the sender reveals in response to accusations, keyed by accuser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JustificationsMessage {
    pub justifications: BTreeMap<Id, group::Private>,
}

/// Any message sent on the key generation channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dkg {
    Join(JoinMessage),
    Commitments(MemberCommitmentsMessage),
    Share(MemberShareMessage),
    Accusations(AccusationsMessage),
    Justifications(JustificationsMessage),
}

impl Dkg {
    /// Returns the phase in which the message is processed.
    pub fn phase(&self) -> Phase {
        match self {
            Dkg::Join(_) => Phase::Join,
            Dkg::Commitments(_) => Phase::Commitment,
            Dkg::Share(_) => Phase::Share,
            Dkg::Accusations(_) => Phase::Accusation,
            Dkg::Justifications(_) => Phase::Justification,
        }
    }
}
