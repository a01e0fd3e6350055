use super::{Final, Id, Sharing};
use crate::bls12381::primitives::group;
use std::collections::{BTreeMap, BTreeSet};

/// A member resolving accusations raised at the end of sharing.
///
/// Accusations against this member are answered by revealing the share it dealt
/// to each accuser (see [Justifying::justifications]). Accusations against other
/// members are tracked until the accused member publishes a justification.
pub struct Justifying {
    pub(super) sharing: Sharing,
    accuser_ids: BTreeSet<Id>,
    pending_justifications: BTreeMap<Id, BTreeSet<Id>>,
}

impl Justifying {
    pub(super) fn new(sharing: Sharing) -> Self {
        Self {
            sharing,
            accuser_ids: BTreeSet::new(),
            pending_justifications: BTreeMap::new(),
        }
    }

    /// Returns the identifier of this member.
    pub fn id(&self) -> Id {
        self.sharing.id()
    }

    /// Returns the number of members required to produce a group signature.
    pub fn threshold(&self) -> u32 {
        self.sharing.threshold()
    }

    /// Returns the roster.
    pub fn member_ids(&self) -> &[Id] {
        self.sharing.member_ids()
    }

    /// Returns `true` if `id` is part of the roster.
    pub fn is_member(&self, id: &Id) -> bool {
        self.sharing.is_member(id)
    }

    /// Returns the share this member dealt to `id`, if `id` is in the roster.
    pub fn secret_share_for_id(&self, id: Id) -> Option<group::Private> {
        self.sharing.secret_share_for_id(id)
    }

    /// Returns the shares retained so far, keyed by dealer.
    pub fn received_shares(&self) -> &BTreeMap<Id, group::Private> {
        self.sharing.received_shares()
    }

    /// Records that `accuser` reported no valid share from `accused`.
    ///
    /// Accusations involving members outside of the roster (or members accusing
    /// themselves) are ignored.
    pub fn add_accusation_from_id(&mut self, accuser: Id, accused: Id) {
        if accuser == accused || !self.is_member(&accuser) || !self.is_member(&accused) {
            return;
        }
        if accused == self.id() {
            self.accuser_ids.insert(accuser);
            return;
        }
        self.pending_justifications
            .entry(accused)
            .or_default()
            .insert(accuser);
    }

    /// Returns every member that accused this member.
    pub fn accuser_ids(&self) -> Vec<Id> {
        self.accuser_ids.iter().copied().collect()
    }

    /// Returns the shares this member must reveal: for every accuser, the share
    /// dealt to it during sharing.
    pub fn justifications(&self) -> BTreeMap<Id, group::Private> {
        self.accuser_ids
            .iter()
            .filter_map(|accuser| {
                self.sharing
                    .secret_share_for_id(*accuser)
                    .map(|share| (*accuser, share))
            })
            .collect()
    }

    /// Returns every accused member that has not yet justified all accusations
    /// against it.
    pub fn pending_justification_ids(&self) -> Vec<Id> {
        self.pending_justifications.keys().copied().collect()
    }

    /// Records the share `accused` revealed for `accuser`.
    ///
    /// If the revealed share does not match the accused member's commitments, the
    /// accused member's share is discarded (disqualifying it from this member's
    /// view of the group) and `false` is returned. If it matches and this member is
    /// the accuser, the revealed share is retained in place of the missing one.
    pub fn record_justification_from_id(
        &mut self,
        accused: Id,
        accuser: Id,
        share: group::Private,
    ) -> bool {
        let me = self.id();
        if accused == me || !self.is_member(&accused) || !self.is_member(&accuser) {
            return false;
        }
        if let Some(accusers) = self.pending_justifications.get_mut(&accused) {
            accusers.remove(&accuser);
            if accusers.is_empty() {
                self.pending_justifications.remove(&accused);
            }
        }

        if !self.sharing.verify_share(accused, accuser, &share) {
            self.sharing.received_shares.remove(&accused);
            return false;
        }
        if accuser == me {
            self.sharing.received_shares.insert(accused, share);
        }
        true
    }

    /// Derives this member's share of the group secret and the group public
    /// polynomial from every dealer whose share was retained.
    pub fn finalize(self) -> Final {
        Final::new(self)
    }
}
