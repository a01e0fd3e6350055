//! Verifiable secret sharing for a threshold group, following the "Joint-Feldman"
//! construction with complaints from "Secure Distributed Key Generation for
//! Discrete-Log Based Cryptosystems" (GJKR99).
//!
//! # Overview
//!
//! Every member of the group is both a dealer and a recipient. A member deals a random
//! polynomial of degree `threshold - 1`, publishes a commitment to each coefficient, and
//! privately hands every member (itself included) the evaluation of that polynomial at
//! the recipient's [Id]. Recipients check each share against the dealer's commitments.
//! Dealers whose share fails the check (or never arrives) are accused, and must publicly
//! reveal the disputed share. A revealed share that still fails the check removes the
//! dealer from the group; one that passes settles the dispute.
//!
//! A member's usable share of the group secret is the sum of every share it retained and
//! the group public key is the sum of the retained dealers' constant-term commitments.
//!
//! # State Machine
//!
//! Each phase of the protocol is a distinct type. Every transition consumes the previous
//! phase by value, so bookkeeping from a finished phase can never be mutated afterwards:
//!
//! ```txt
//! Local --initialize_sharing--> Sharing --initialize_justification--> Justifying --finalize--> Final
//! ```
//!
//! The state machine performs no I/O. Moving commitments, shares, accusations, and
//! justifications between members is the responsibility of the caller.
//!
//! # Disqualification
//!
//! The qualified set is derived solely from retained shares. A member only evicts a dealer
//! whose public justification fails; an accusation that is never answered only affects
//! the members that raised it (see [Justifying::pending_justification_ids]).

mod finalized;
mod justifying;
mod local;
mod sharing;

pub use finalized::Final;
pub use justifying::Justifying;
pub use local::Local;
pub use sharing::Sharing;

use crate::bls12381::primitives::{
    self,
    group::{Element, Scalar, SCALAR_LENGTH},
};
use std::{
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};
use thiserror::Error;

/// Errors that can occur when operating a threshold group member.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid member id: {0}")]
    InvalidId(String),
    #[error("threshold must be at least 1")]
    InvalidThreshold,
    #[error("unknown member: {0}")]
    UnknownMember(Id),
    #[error("commitment has wrong degree: expected {expected} coefficients, found {found}")]
    CommitmentWrongDegree { expected: usize, found: usize },
    #[error("duplicate commitment from {0}")]
    DuplicateCommitment(Id),
    #[error("primitive: {0}")]
    Primitive(#[from] primitives::Error),
}

/// A member's cryptographic identifier: the non-zero scalar at which every dealer
/// evaluates its polynomial for that member.
///
/// Identifiers are parsed from hexadecimal member ids (an optional `0x` prefix is
/// accepted). Two member ids refer to the same member iff they parse to the same
/// scalar, so `"0x01"` and `"1"` are equal.
#[derive(Clone, Copy)]
pub struct Id {
    bytes: [u8; SCALAR_LENGTH],
    scalar: Scalar,
}

impl Id {
    /// Parses a member id.
    pub fn parse(member_id: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidId(member_id.to_string());
        let trimmed = member_id.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || !digits.is_ascii() {
            return Err(invalid());
        }

        // Decode (left-padding odd-length input) and drop leading zero bytes
        let padded = if digits.len() % 2 == 1 {
            format!("0{digits}")
        } else {
            digits.to_string()
        };
        let decoded = (0..padded.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&padded[i..i + 2], 16).ok())
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(invalid)?;
        let significant = match decoded.iter().position(|b| *b != 0) {
            Some(start) => &decoded[start..],
            None => return Err(invalid()),
        };
        if significant.len() > SCALAR_LENGTH {
            return Err(invalid());
        }
        let mut bytes = [0u8; SCALAR_LENGTH];
        bytes[SCALAR_LENGTH - significant.len()..].copy_from_slice(significant);

        let scalar = Scalar::deserialize(&bytes).ok_or_else(invalid)?;
        Ok(Self { bytes, scalar })
    }

    /// Returns the identifier for a small integer (useful for tests and simulations).
    ///
    /// Returns `None` for zero.
    pub fn from_u64(i: u64) -> Option<Self> {
        if i == 0 {
            return None;
        }
        let scalar = Scalar::from_u64(i);
        let mut bytes = [0u8; SCALAR_LENGTH];
        bytes.copy_from_slice(&scalar.serialize());
        Some(Self { bytes, scalar })
    }

    /// Returns the evaluation point of this member.
    pub fn scalar(&self) -> &Scalar {
        &self.scalar
    }

    /// Returns the canonical big-endian encoding of the identifier.
    pub fn as_bytes(&self) -> &[u8; SCALAR_LENGTH] {
        &self.bytes
    }
}

impl PartialEq for Id {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Id {}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bytes.cmp(&other.bytes)
    }
}

impl Hash for Id {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // Print the integer without leading zeros
        let start = self.bytes.iter().position(|b| *b != 0).unwrap_or(0);
        let mut digits = String::with_capacity(2 * (SCALAR_LENGTH - start));
        for byte in &self.bytes[start..] {
            digits.push_str(&format!("{byte:02x}"));
        }
        write!(f, "0x{}", digits.trim_start_matches('0'))
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls12381::primitives::{
        group::{Private, G1},
        ops::compute_public,
        poly::{Eval, Poly},
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::{BTreeMap, BTreeSet};

    fn ids(n: u64) -> Vec<Id> {
        (1..=n).map(|i| Id::from_u64(i).unwrap()).collect()
    }

    /// Creates `n` members (ids `0x1..=n`) and starts sharing for all of them.
    fn sharing_group(n: u64, threshold: u32, rng: &mut StdRng) -> Vec<Sharing> {
        let ids = ids(n);
        ids.iter()
            .map(|me| {
                let local = Local::new_from(&me.to_string(), threshold, rng).unwrap();
                let peers = ids.iter().filter(|id| *id != me).copied();
                local.initialize_sharing(peers)
            })
            .collect()
    }

    /// Exchanges commitments between every pair of members.
    fn exchange_commitments(members: &mut [Sharing]) {
        let published = members
            .iter()
            .map(|m| (m.id(), m.commitments().to_vec()))
            .collect::<Vec<_>>();
        for member in members.iter_mut() {
            for (sender, commitments) in &published {
                if *sender != member.id() {
                    member
                        .add_commitments_from_id(*sender, commitments.clone())
                        .unwrap();
                }
            }
        }
    }

    #[test]
    fn test_parse_id() {
        let a = Id::parse("0x01").unwrap();
        let b = Id::parse("1").unwrap();
        let c = Id::parse(" 0X0001 ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a, Id::from_u64(1).unwrap());
        assert_eq!(a.to_string(), "0x1");
        assert_eq!(Id::parse("abc").unwrap().to_string(), "0xabc");
        assert_eq!("0x10".parse::<Id>().unwrap(), Id::from_u64(16).unwrap());
    }

    #[test]
    fn test_parse_malformed_id() {
        let oversized = "f".repeat(65);
        for bad in ["", "0x", "xyz", "0x00", "0", "é1", oversized.as_str()] {
            assert!(
                matches!(Id::parse(bad), Err(Error::InvalidId(_))),
                "{bad} should be rejected"
            );
        }

        // Larger than the field modulus
        assert!(Id::parse(&"f".repeat(64)).is_err());
        assert!(Id::from_u64(0).is_none());
    }

    #[test]
    fn test_invalid_threshold() {
        assert!(matches!(
            Local::new("0x1", 0),
            Err(Error::InvalidThreshold)
        ));
        assert!(matches!(Local::new("zz", 3), Err(Error::InvalidId(_))));
    }

    #[test]
    fn test_share_commitment_round_trip() {
        let mut rng = StdRng::seed_from_u64(0);
        for threshold in 1..=5 {
            let local = Local::new_from("0x42", threshold, &mut rng).unwrap();
            assert_eq!(local.commitments().len(), threshold as usize);
            let commitments = Poly::from(local.commitments().to_vec());
            let peers = (0..8)
                .map(|_| Id::from_u64(rng.gen_range(1..u64::MAX)).unwrap())
                .collect::<Vec<_>>();
            let sharing = local.initialize_sharing(peers.clone());
            for peer in peers {
                let share = sharing.secret_share_for_id(peer).unwrap();
                assert_eq!(
                    compute_public(&share),
                    commitments.evaluate(peer.scalar()).value
                );
            }
        }
    }

    #[test]
    fn test_initialize_sharing_roster_order() {
        let mut rng = StdRng::seed_from_u64(1);
        let local = Local::new_from("0x3", 2, &mut rng).unwrap();
        let me = local.id();
        let peers = vec![
            Id::from_u64(5).unwrap(),
            Id::from_u64(1).unwrap(),
            me,
            Id::from_u64(5).unwrap(),
            Id::from_u64(4).unwrap(),
        ];
        let sharing = local.initialize_sharing(peers);

        // Peers in given order (self and duplicates skipped), then self
        let expected = vec![
            Id::from_u64(5).unwrap(),
            Id::from_u64(1).unwrap(),
            Id::from_u64(4).unwrap(),
            me,
        ];
        assert_eq!(sharing.member_ids(), expected.as_slice());

        // A share exists for every member, including self, and only self is retained
        for id in &expected {
            assert!(sharing.secret_share_for_id(*id).is_some());
        }
        assert_eq!(
            sharing.received_shares().keys().copied().collect::<Vec<_>>(),
            vec![me]
        );
        assert!(!sharing.commitments_complete());
        assert!(!sharing.shares_complete());
    }

    #[test]
    fn test_add_commitments_rejections() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut members = sharing_group(3, 2, &mut rng);
        let good = members[1].commitments().to_vec();
        let other = members[2].commitments().to_vec();
        let sender = members[1].id();
        let member = &mut members[0];

        // Unknown sender
        let stranger = Id::from_u64(99).unwrap();
        assert!(matches!(
            member.add_commitments_from_id(stranger, good.clone()),
            Err(Error::UnknownMember(id)) if id == stranger
        ));

        // Wrong number of coefficients
        assert!(matches!(
            member.add_commitments_from_id(sender, good[..1].to_vec()),
            Err(Error::CommitmentWrongDegree {
                expected: 2,
                found: 1
            })
        ));

        // Accepted, repeated verbatim, then equivocated
        member.add_commitments_from_id(sender, good.clone()).unwrap();
        member.add_commitments_from_id(sender, good).unwrap();
        assert!(matches!(
            member.add_commitments_from_id(sender, other),
            Err(Error::DuplicateCommitment(id)) if id == sender
        ));
    }

    #[test]
    fn test_accusation_completeness() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 5;

        // Every peer independently sends a valid share, an invalid share, or nothing
        for trial in 0..32u32 {
            let mut members = sharing_group(n, 3, &mut rng);
            exchange_commitments(&mut members);
            let recipient = members[0].id();
            let outgoing = members
                .iter()
                .skip(1)
                .map(|m| (m.id(), m.secret_share_for_id(recipient).unwrap()))
                .collect::<Vec<_>>();

            let mut expected_retained = BTreeSet::from([recipient]);
            for (i, (sender, share)) in outgoing.into_iter().enumerate() {
                match (trial >> (2 * i)) & 0b11 {
                    0 => {
                        assert!(members[0].add_share_from_id(sender, share));
                        expected_retained.insert(sender);
                    }
                    1 => {
                        assert!(!members[0].add_share_from_id(sender, Private::rand(&mut rng)));
                    }
                    _ => {}
                }
            }

            let retained = members[0]
                .received_shares()
                .keys()
                .copied()
                .collect::<BTreeSet<_>>();
            assert_eq!(retained, expected_retained);
            let expected_accused = members[0]
                .member_ids()
                .iter()
                .filter(|id| !expected_retained.contains(id))
                .copied()
                .collect::<Vec<_>>();
            assert_eq!(members[0].accused_ids(), expected_accused);
            assert_eq!(
                members[0].shares_complete(),
                expected_accused.is_empty()
            );
        }
    }

    #[test]
    fn test_share_without_commitment_rejected() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut members = sharing_group(2, 2, &mut rng);
        let recipient = members[0].id();
        let sender = members[1].id();
        let share = members[1].secret_share_for_id(recipient).unwrap();
        assert!(!members[0].add_share_from_id(sender, share));
        assert_eq!(members[0].accused_ids(), vec![sender]);
    }

    #[test]
    fn test_justification_evicts_on_failure() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut members = sharing_group(3, 2, &mut rng);
        exchange_commitments(&mut members);
        let me = members[0].id();
        let dealer = members[1].id();
        let accuser = members[2].id();
        let share = members[1].secret_share_for_id(me).unwrap();
        assert!(members[0].add_share_from_id(dealer, share));

        let mut justifying = members.remove(0).initialize_justification();
        justifying.add_accusation_from_id(accuser, dealer);
        assert_eq!(justifying.pending_justification_ids(), vec![dealer]);

        // A revealed share that does not match the dealer's commitments evicts the dealer
        assert!(!justifying.record_justification_from_id(
            dealer,
            accuser,
            Private::rand(&mut rng)
        ));
        assert!(!justifying.received_shares().contains_key(&dealer));
        assert!(justifying.pending_justification_ids().is_empty());

        let member = justifying.finalize();
        assert_eq!(member.qualified_members(), &[me]);
    }

    #[test]
    fn test_justification_retains_valid_reveal() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut members = sharing_group(3, 2, &mut rng);
        exchange_commitments(&mut members);
        let me = members[0].id();
        let dealer = members[1].id();
        let other = members[2].id();

        // The dealer's share never reached me, so I accuse it
        assert_eq!(members[0].accused_ids(), vec![dealer, other]);
        let mut dealer_state = members.remove(1).initialize_justification();
        let mut justifying = members.remove(0).initialize_justification();
        justifying.add_accusation_from_id(me, dealer);
        dealer_state.add_accusation_from_id(me, dealer);
        assert_eq!(dealer_state.accuser_ids(), vec![me]);

        // The dealer reveals the share it computed for me
        let justifications = dealer_state.justifications();
        assert_eq!(justifications.len(), 1);
        let revealed = justifications[&me];
        assert!(justifying.record_justification_from_id(dealer, me, revealed));
        assert!(justifying.received_shares().contains_key(&dealer));

        // A reveal that does not match the named dealer's commitments is rejected
        let other_share = dealer_state.justifications()[&me];
        assert!(!justifying.record_justification_from_id(other, me, other_share));
        assert!(!justifying.received_shares().contains_key(&other));
    }

    #[test]
    fn test_justification_to_other_accuser_keeps_share() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut members = sharing_group(3, 2, &mut rng);
        exchange_commitments(&mut members);
        let me = members[0].id();
        let dealer = members[1].id();
        let accuser = members[2].id();
        let mine = members[1].secret_share_for_id(me).unwrap();
        let theirs = members[1].secret_share_for_id(accuser).unwrap();
        assert!(members[0].add_share_from_id(dealer, mine));

        let mut justifying = members.remove(0).initialize_justification();
        justifying.add_accusation_from_id(accuser, dealer);
        assert!(justifying.record_justification_from_id(dealer, accuser, theirs));
        assert_eq!(justifying.received_shares()[&dealer], mine);
    }

    #[test]
    fn test_accusations_against_self() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut members = sharing_group(4, 2, &mut rng);
        let me = members[0].id();
        let a = members[1].id();
        let b = members[2].id();
        let mut justifying = members.remove(0).initialize_justification();
        assert!(justifying.justifications().is_empty());

        justifying.add_accusation_from_id(a, me);
        justifying.add_accusation_from_id(b, me);
        justifying.add_accusation_from_id(b, me);
        justifying.add_accusation_from_id(Id::from_u64(99).unwrap(), me);
        assert_eq!(justifying.accuser_ids(), vec![a, b]);

        // Justifications reveal exactly the shares computed during sharing
        let justifications = justifying.justifications();
        assert_eq!(
            justifications,
            BTreeMap::from([
                (a, justifying.secret_share_for_id(a).unwrap()),
                (b, justifying.secret_share_for_id(b).unwrap()),
            ])
        );
        assert_eq!(justifying.justifications(), justifications);
    }

    #[test]
    fn test_idempotent_accessors() {
        let mut rng = StdRng::seed_from_u64(9);
        let local = Local::new_from("0x7", 3, &mut rng).unwrap();
        assert_eq!(local.commitments(), local.commitments());
        let mut members = sharing_group(4, 3, &mut rng);
        exchange_commitments(&mut members);
        assert_eq!(members[0].accused_ids(), members[0].accused_ids());
        let mut justifying = members.remove(0).initialize_justification();
        justifying.add_accusation_from_id(members[0].id(), justifying.id());
        assert_eq!(justifying.justifications(), justifying.justifications());
    }

    #[test]
    fn test_finalize_aggregation_order_independent() {
        let mut rng = StdRng::seed_from_u64(10);
        let n = 5;
        let members = sharing_group(n, 3, &mut rng);
        let recipient = members[0].id();
        let published = members
            .iter()
            .map(|m| {
                (
                    m.id(),
                    m.commitments().to_vec(),
                    m.secret_share_for_id(recipient).unwrap(),
                )
            })
            .collect::<Vec<_>>();
        let mut expected = Private::zero();
        for (_, _, share) in &published {
            expected.add(share);
        }

        let mut keys = Vec::new();
        for order in [vec![1, 2, 3, 4], vec![4, 2, 1, 3]] {
            let mut member = members[0].clone();
            for i in order {
                let (sender, commitments, share) = &published[i];
                member
                    .add_commitments_from_id(*sender, commitments.clone())
                    .unwrap();
                assert!(member.add_share_from_id(*sender, *share));
            }
            let member = member.initialize_justification().finalize();
            assert_eq!(member.group_secret_key_share(), &expected);
            keys.push(*member.group_public_key());
        }
        assert_eq!(keys[0], keys[1]);
    }

    #[test]
    fn test_full_exchange_produces_threshold_group() {
        let mut rng = StdRng::seed_from_u64(11);
        let (n, threshold) = (5, 3);
        let mut members = sharing_group(n, threshold, &mut rng);
        exchange_commitments(&mut members);

        // Deliver every share
        let deliveries = members
            .iter()
            .flat_map(|dealer| {
                members
                    .iter()
                    .filter(move |m| m.id() != dealer.id())
                    .map(move |m| {
                        (dealer.id(), m.id(), dealer.secret_share_for_id(m.id()).unwrap())
                    })
            })
            .collect::<Vec<_>>();
        for (dealer, recipient, share) in deliveries {
            let member = members.iter_mut().find(|m| m.id() == recipient).unwrap();
            assert!(member.add_share_from_id(dealer, share));
        }
        let finals = members
            .into_iter()
            .map(|m| {
                assert!(m.accused_ids().is_empty());
                m.initialize_justification().finalize()
            })
            .collect::<Vec<_>>();

        // Same group key and roster everywhere
        let roster = ids(n);
        for member in &finals {
            assert_eq!(member.group_public_key(), finals[0].group_public_key());
            assert_eq!(member.qualified_members(), roster.as_slice());
        }

        // Any `threshold` key shares interpolate to the group secret
        let evals = finals
            .iter()
            .map(|m| Eval {
                x: *m.id().scalar(),
                value: *m.group_secret_key_share(),
            })
            .collect::<Vec<_>>();
        let secret = Poly::<Private>::recover(threshold, &evals[2..]).unwrap();
        let mut public = G1::one();
        public.mul(&secret);
        assert_eq!(&public, finals[0].group_public_key());

        // Group signatures aggregate and verify
        let message = b"entry";
        let partials = finals
            .iter()
            .take(threshold as usize)
            .map(|m| (m.id(), m.sign(message)))
            .collect::<Vec<_>>();
        for (signer, partial) in &partials {
            finals[4].partial_verify(*signer, message, partial).unwrap();
        }
        let signature = finals[4].aggregate(&partials).unwrap();
        finals[0].verify(message, &signature).unwrap();
    }
}
