//! Distributed Key Generation (DKG) and Threshold Signatures over the BLS12-381 curve.
//!
//! # Features
//!
//! This crate has the following features:
//!
//! - `portable`: Enables `portable` feature on `blst` (<https://github.com/supranational/blst?tab=readme-ov-file#platform-and-language-compatibility>).
//!
//! # Benchmarks
//!
//! ```bash
//! cargo bench -p relay-cryptography
//! ```
//!
//! Benchmarks cover a member finalizing its key share after receiving every share
//! (`thresholdgroup`), recovering a threshold signature (`threshold_recover`),
//! verifying a signature (`signature_verification`), and evaluating a public
//! polynomial at a member identifier (`evaluate_point`).

pub mod primitives;
pub mod thresholdgroup;
