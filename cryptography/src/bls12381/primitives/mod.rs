//! Operations over the BLS12-381 curve and its scalar field.
//!
//! # Acknowledgements
//!
//! _The following crates were used as a reference when implementing this module. If code is very similar
//! to the reference, it is accompanied by a comment and link._
//!
//! * <https://github.com/celo-org/celo-threshold-bls-rs>: Operations over the BLS12-381 scalar field and GJKR99.
//! * <https://github.com/filecoin-project/blstrs> + <https://github.com/MystenLabs/fastcrypto>: Implementing operations over
//!   the BLS12-381 scalar field with <https://github.com/supranational/blst>.
//!
//! # Example
//!
//! ```rust
//! use relay_cryptography::bls12381::primitives::{
//!     group::Scalar,
//!     ops::{partial_verify_message, sign_message, threshold_signature_recover, verify_message},
//!     poly::{self, public, Eval, Public},
//! };
//! use rand::rngs::OsRng;
//!
//! // Deal a degree-2 polynomial (threshold 3)
//! let private = poly::new_from(2, &mut OsRng);
//! let commitment = Public::commit(&private);
//!
//! // Partial signatures from five members identified by non-zero scalars
//! let message = b"hello world";
//! let partials: Vec<_> = (1..=5)
//!     .map(|i| {
//!         let x = Scalar::from_u64(i);
//!         let share = private.evaluate(&x).value;
//!         Eval { x, value: sign_message(&share, message) }
//!     })
//!     .collect();
//! for p in &partials {
//!     partial_verify_message(&commitment, &p.x, message, &p.value).expect("signature should be valid");
//! }
//!
//! // Any three recover the group signature
//! let signature = threshold_signature_recover(3, &partials).unwrap();
//! verify_message(public(&commitment), message, &signature).expect("signature should be valid");
//! ```

pub mod group;
pub mod ops;
pub mod poly;

use thiserror::Error;

/// Errors that can occur when working with BLS12-381 primitives.
#[derive(Error, Debug)]
pub enum Error {
    #[error("not enough evaluations: {0}/{1}")]
    NotEnoughEvaluations(u32, u32),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("no inverse")]
    NoInverse,
    #[error("duplicate polynomial evaluation point")]
    DuplicateEval,
}
