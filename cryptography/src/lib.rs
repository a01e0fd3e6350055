//! Generate, verify, and combine threshold BLS12-381 key shares for a random beacon group.
//!
//! # Status
//!
//! `relay-cryptography` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

pub mod bls12381;
