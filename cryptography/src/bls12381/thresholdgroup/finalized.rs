use super::{Error, Id, Justifying};
use crate::bls12381::primitives::{
    group::{self, Element},
    ops::{partial_verify_message, sign_message, threshold_signature_recover, verify_message},
    poly::{self, Eval},
};
use zeroize::Zeroize;

/// A member holding its share of the group secret.
pub struct Final {
    justifying: Justifying,
    group_secret_key_share: group::Private,
    group_public_polynomial: poly::Public,
    qualified_members: Vec<Id>,
}

impl Final {
    pub(super) fn new(justifying: Justifying) -> Self {
        let sharing = &justifying.sharing;
        let mut group_secret_key_share = group::Private::zero();
        let mut group_public_polynomial = poly::Public::zero();
        for (dealer, share) in sharing.received_shares.iter() {
            group_secret_key_share.add(share);
            if let Some(commitments) = sharing.commitments.get(dealer) {
                group_public_polynomial.add(commitments);
            }
        }
        let qualified_members = sharing.received_shares.keys().copied().collect();
        Self {
            justifying,
            group_secret_key_share,
            group_public_polynomial,
            qualified_members,
        }
    }

    /// Returns the identifier of this member.
    pub fn id(&self) -> Id {
        self.justifying.id()
    }

    /// Returns the number of partial signatures required to produce a group signature.
    pub fn threshold(&self) -> u32 {
        self.justifying.threshold()
    }

    /// Returns the roster from sharing (including members that were not qualified).
    pub fn member_ids(&self) -> &[Id] {
        self.justifying.member_ids()
    }

    /// Returns this member's share of the group secret.
    pub fn group_secret_key_share(&self) -> &group::Private {
        &self.group_secret_key_share
    }

    /// Returns the sum of every qualified member's public polynomial.
    pub fn group_public_polynomial(&self) -> &poly::Public {
        &self.group_public_polynomial
    }

    /// Returns the group public key (the constant term of the group public polynomial).
    pub fn group_public_key(&self) -> &group::Public {
        poly::public(&self.group_public_polynomial)
    }

    /// Returns the members whose shares contributed to this member's key share
    /// (sorted by identifier).
    pub fn qualified_members(&self) -> &[Id] {
        &self.qualified_members
    }

    /// Returns `true` if `id` contributed to this member's key share.
    pub fn is_qualified(&self, id: &Id) -> bool {
        self.qualified_members.binary_search(id).is_ok()
    }

    /// Signs `message` with this member's key share.
    pub fn sign(&self, message: &[u8]) -> group::Signature {
        sign_message(&self.group_secret_key_share, message)
    }

    /// Verifies a partial signature over `message` produced by `signer`.
    pub fn partial_verify(
        &self,
        signer: Id,
        message: &[u8],
        partial: &group::Signature,
    ) -> Result<(), Error> {
        if !self.is_qualified(&signer) {
            return Err(Error::UnknownMember(signer));
        }
        partial_verify_message(
            &self.group_public_polynomial,
            signer.scalar(),
            message,
            partial,
        )?;
        Ok(())
    }

    /// Interpolates a group signature from at least `threshold` partial signatures
    /// (produced by distinct signers).
    pub fn aggregate(&self, partials: &[(Id, group::Signature)]) -> Result<group::Signature, Error> {
        let evals = partials
            .iter()
            .map(|(signer, partial)| Eval {
                x: *signer.scalar(),
                value: *partial,
            })
            .collect::<Vec<_>>();
        Ok(threshold_signature_recover(self.threshold(), &evals)?)
    }

    /// Verifies a group signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &group::Signature) -> Result<(), Error> {
        verify_message(self.group_public_key(), message, signature)?;
        Ok(())
    }
}

impl Drop for Final {
    fn drop(&mut self) {
        self.group_secret_key_share.zeroize();
    }
}
