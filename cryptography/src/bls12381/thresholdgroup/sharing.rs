use super::{Error, Id, Justifying, Local};
use crate::bls12381::primitives::{group, ops::compute_public, poly};
use std::collections::BTreeMap;
use zeroize::Zeroize;

/// A member exchanging commitments and private shares with the rest of the roster.
#[derive(Clone)]
pub struct Sharing {
    pub(super) local: Local,
    pub(super) member_ids: Vec<Id>,
    pub(super) member_shares: BTreeMap<Id, group::Private>,
    pub(super) commitments: BTreeMap<Id, poly::Public>,
    pub(super) received_shares: BTreeMap<Id, group::Private>,
}

impl Sharing {
    pub(super) fn new(local: Local, member_ids: Vec<Id>) -> Self {
        let member_shares = member_ids
            .iter()
            .map(|id| (*id, local.secret.evaluate(id.scalar()).value))
            .collect::<BTreeMap<_, _>>();
        let own = local.secret.evaluate(local.id.scalar()).value;
        let commitments = BTreeMap::from([(local.id, local.commitments.clone())]);
        let received_shares = BTreeMap::from([(local.id, own)]);
        Self {
            local,
            member_ids,
            member_shares,
            commitments,
            received_shares,
        }
    }

    /// Returns the identifier of this member.
    pub fn id(&self) -> Id {
        self.local.id
    }

    /// Returns the number of members required to produce a group signature.
    pub fn threshold(&self) -> u32 {
        self.local.threshold
    }

    /// Returns this member's commitments.
    pub fn commitments(&self) -> &[group::Public] {
        self.local.commitments()
    }

    /// Returns the roster (peers in join order followed by this member).
    pub fn member_ids(&self) -> &[Id] {
        &self.member_ids
    }

    /// Returns `true` if `id` is part of the roster.
    pub fn is_member(&self, id: &Id) -> bool {
        self.member_ids.contains(id)
    }

    /// Returns the share this member dealt to `id`, if `id` is in the roster.
    pub fn secret_share_for_id(&self, id: Id) -> Option<group::Private> {
        self.member_shares.get(&id).copied()
    }

    /// Records the commitments published by `sender`.
    ///
    /// Repeating identical commitments is a no-op. Once a member's commitments are
    /// recorded, different commitments from that member are rejected (the first
    /// are kept).
    pub fn add_commitments_from_id(
        &mut self,
        sender: Id,
        commitments: Vec<group::Public>,
    ) -> Result<(), Error> {
        if !self.is_member(&sender) {
            return Err(Error::UnknownMember(sender));
        }
        let expected = self.local.threshold as usize;
        if commitments.len() != expected {
            return Err(Error::CommitmentWrongDegree {
                expected,
                found: commitments.len(),
            });
        }
        let commitments = poly::Public::from(commitments);
        if let Some(existing) = self.commitments.get(&sender) {
            if *existing != commitments {
                return Err(Error::DuplicateCommitment(sender));
            }
            return Ok(());
        }
        self.commitments.insert(sender, commitments);
        Ok(())
    }

    /// Returns `true` once commitments from every member of the roster are known.
    pub fn commitments_complete(&self) -> bool {
        self.member_ids
            .iter()
            .all(|id| self.commitments.contains_key(id))
    }

    /// Checks that `share` is the evaluation, at `recipient`, of the polynomial
    /// `dealer` committed to.
    ///
    /// Returns `false` if the dealer's commitments are unknown.
    pub(super) fn verify_share(&self, dealer: Id, recipient: Id, share: &group::Private) -> bool {
        let Some(commitments) = self.commitments.get(&dealer) else {
            return false;
        };
        let expected = commitments.evaluate(recipient.scalar()).value;
        compute_public(share) == expected
    }

    /// Records the share `sender` dealt to this member.
    ///
    /// Returns `true` if the share matched the sender's commitments (and was
    /// retained). A share that does not match is discarded, so the sender will be
    /// accused.
    pub fn add_share_from_id(&mut self, sender: Id, share: group::Private) -> bool {
        if !self.is_member(&sender) || sender == self.local.id {
            return false;
        }
        if !self.verify_share(sender, self.local.id, &share) {
            return false;
        }
        self.received_shares.insert(sender, share);
        true
    }

    /// Returns the shares retained so far, keyed by dealer.
    pub fn received_shares(&self) -> &BTreeMap<Id, group::Private> {
        &self.received_shares
    }

    /// Returns `true` once a valid share has been retained from every member.
    pub fn shares_complete(&self) -> bool {
        self.member_ids
            .iter()
            .all(|id| self.received_shares.contains_key(id))
    }

    /// Returns every member (in roster order) from which no valid share has been
    /// retained.
    pub fn accused_ids(&self) -> Vec<Id> {
        self.member_ids
            .iter()
            .filter(|id| !self.received_shares.contains_key(id))
            .copied()
            .collect()
    }

    /// Stops accepting shares and begins resolving accusations.
    pub fn initialize_justification(self) -> Justifying {
        Justifying::new(self)
    }
}

impl Drop for Sharing {
    fn drop(&mut self) {
        self.member_shares.values_mut().for_each(|s| s.zeroize());
        self.received_shares.values_mut().for_each(|s| s.zeroize());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls12381::primitives::group::{Element, Scalar};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_own_share_retained() {
        let mut rng = StdRng::seed_from_u64(0);
        let local = Local::new_from("0x5", 2, &mut rng).unwrap();
        let sharing = local.initialize_sharing([Id::from_u64(6).unwrap()]);
        let me = sharing.id();
        assert_eq!(
            sharing.received_shares()[&me],
            sharing.secret_share_for_id(me).unwrap()
        );
        assert!(sharing.verify_share(me, me, &sharing.secret_share_for_id(me).unwrap()));
        assert!(!sharing.verify_share(me, me, &Scalar::one()));
        assert!(sharing.secret_share_for_id(Id::from_u64(7).unwrap()).is_none());
    }

    #[test]
    fn test_share_from_self_ignored() {
        let mut rng = StdRng::seed_from_u64(1);
        let local = Local::new_from("0x5", 2, &mut rng).unwrap();
        let mut sharing = local.initialize_sharing(Vec::new());
        let me = sharing.id();
        let own = sharing.secret_share_for_id(me).unwrap();
        assert!(!sharing.add_share_from_id(me, own));
        assert!(sharing.shares_complete());
        assert!(sharing.commitments_complete());
        assert!(sharing.accused_ids().is_empty());
    }
}
