//! Generate a threshold group key and produce group signatures over a broadcast channel.
//!
//! # Status
//!
//! `relay-beacon` is **ALPHA** software and is not yet recommended for production use. Developers
//! should expect breaking changes and occasional instability.
//!
//! # Overview
//!
//! Participants first run [dkg::execute] to agree on a group public key (each learning a share
//! of the matching secret key) and then run [signature::execute] to sign messages with the group.
//! Both drivers are generic over a [relay_broadcast::Channel] and a [relay_chain::BlockCounter]
//! and measure their timeouts in blocks.
//!
//! [simulation] wires a group of in-process participants together (and is what the
//! `relay-beacon` binary runs).

pub mod dkg;
pub mod signature;
pub mod simulation;
