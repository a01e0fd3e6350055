use super::{Error, Id, Sharing};
use crate::bls12381::primitives::{group, poly};
use rand::{rngs::OsRng, CryptoRng, RngCore};
use zeroize::Zeroize;

/// A member that has chosen its secret polynomial but has not yet learned who
/// else is participating.
#[derive(Clone)]
pub struct Local {
    pub(super) id: Id,
    pub(super) threshold: u32,
    pub(super) secret: poly::Private,
    pub(super) commitments: poly::Public,
}

impl Local {
    /// Creates a member with a secret polynomial sampled from the operating
    /// system's randomness.
    pub fn new(member_id: &str, threshold: u32) -> Result<Self, Error> {
        Self::new_from(member_id, threshold, &mut OsRng)
    }

    /// Creates a member with a secret polynomial sampled from `rng`.
    ///
    /// The polynomial has `threshold` coefficients, so any `threshold` members
    /// can later interpolate the group secret and no fewer can.
    pub fn new_from<R: RngCore + CryptoRng>(
        member_id: &str,
        threshold: u32,
        rng: &mut R,
    ) -> Result<Self, Error> {
        let id = Id::parse(member_id)?;
        if threshold == 0 {
            return Err(Error::InvalidThreshold);
        }
        let secret = poly::new_from(threshold - 1, rng);
        let commitments = poly::Public::commit(&secret);
        Ok(Self {
            id,
            threshold,
            secret,
            commitments,
        })
    }

    /// Returns the identifier of this member.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the number of members required to produce a group signature.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Returns the public commitment to each coefficient of the secret polynomial
    /// (constant term first).
    pub fn commitments(&self) -> &[group::Public] {
        self.commitments.coefficients()
    }

    /// Starts sharing with the provided peers.
    ///
    /// The roster is `peer_ids` in the order given (skipping this member and any
    /// repeats) followed by this member. A share is computed for every member of
    /// the roster and this member's own share (and commitments) are retained
    /// immediately.
    pub fn initialize_sharing(self, peer_ids: impl IntoIterator<Item = Id>) -> Sharing {
        let mut member_ids = Vec::new();
        for peer in peer_ids {
            if peer == self.id || member_ids.contains(&peer) {
                continue;
            }
            member_ids.push(peer);
        }
        member_ids.push(self.id);
        Sharing::new(self, member_ids)
    }
}

impl Drop for Local {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}
