//! Digital signatures over the BLS12-381 curve using G1 as the Public Key (48 bytes)
//! and G2 as the Signature (96 bytes).
//!
//! Threshold signatures are produced by having each member of a group sign with
//! its share of the group secret (a "partial signature"). Any `threshold` valid
//! partial signatures can be interpolated into a signature that verifies under
//! the group public key.

use super::{
    group::{self, Element, Scalar},
    poly::{self, Eval},
    Error,
};

/// Computes the public key from the private key.
pub fn compute_public(private: &group::Private) -> group::Public {
    let mut public = group::Public::one();
    public.mul(private);
    public
}

/// Hashes the provided message to G2.
pub fn hash_message(message: &[u8]) -> group::Signature {
    group::Signature::map(message)
}

/// Signs the provided message with the private key.
///
/// Signatures produced by this function are deterministic.
pub fn sign_message(private: &group::Private, message: &[u8]) -> group::Signature {
    let mut hm = hash_message(message);
    hm.mul(private);
    hm
}

/// Verifies the signature with the provided public key.
pub fn verify_message(
    public: &group::Public,
    message: &[u8],
    signature: &group::Signature,
) -> Result<(), Error> {
    let hm = hash_message(message);
    if !group::equal(public, signature, &hm) {
        return Err(Error::InvalidSignature);
    }
    Ok(())
}

/// Verifies a partial signature produced by the member whose identifier is `x`
/// against the group's public polynomial.
pub fn partial_verify_message(
    public: &poly::Public,
    x: &Scalar,
    message: &[u8],
    partial: &group::Signature,
) -> Result<(), Error> {
    let public_share = public.evaluate(x).value;
    verify_message(&public_share, message, partial)
}

/// Recovers a threshold signature from at least `threshold` partial signatures
/// (each tagged with its signer's identifier).
pub fn threshold_signature_recover<'a, I>(
    threshold: u32,
    partials: I,
) -> Result<group::Signature, Error>
where
    I: IntoIterator<Item = &'a Eval<group::Signature>>,
{
    poly::Poly::<group::Signature>::recover(threshold, partials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bls12381::primitives::poly::{new_from, public, Public};
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_sign_verify() {
        let mut rng = StdRng::seed_from_u64(0);
        let private = Scalar::rand(&mut rng);
        let public = compute_public(&private);
        let signature = sign_message(&private, b"hello");
        verify_message(&public, b"hello", &signature).unwrap();
        assert!(matches!(
            verify_message(&public, b"goodbye", &signature),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn test_threshold_signature() {
        let mut rng = StdRng::seed_from_u64(1);
        let (n, t) = (5u64, 3u32);
        let private = new_from(t - 1, &mut rng);
        let commitment = Public::commit(&private);

        // Partial signatures from every member, each verifiable on its own
        let message = b"beacon entry";
        let partials = (1..=n)
            .map(|i| {
                let x = Scalar::from_u64(i * 101);
                let share = private.evaluate(&x).value;
                Eval {
                    x,
                    value: sign_message(&share, message),
                }
            })
            .collect::<Vec<_>>();
        for partial in &partials {
            partial_verify_message(&commitment, &partial.x, message, &partial.value).unwrap();
        }

        // Any t of them recover the group signature
        let signature = threshold_signature_recover(t, &partials[1..4]).unwrap();
        verify_message(public(&commitment), message, &signature).unwrap();
        assert_eq!(signature, sign_message(private.constant(), message));
    }

    #[test]
    fn test_partial_verify_wrong_signer() {
        let mut rng = StdRng::seed_from_u64(2);
        let private = new_from(1, &mut rng);
        let commitment = Public::commit(&private);
        let share = private.evaluate(&Scalar::from_u64(1)).value;
        let partial = sign_message(&share, b"msg");
        assert!(matches!(
            partial_verify_message(&commitment, &Scalar::from_u64(2), b"msg", &partial),
            Err(Error::InvalidSignature)
        ));
    }
}
