//! Count blocks and wait for future block heights.
//!
//! A block counter is a coarse, monotonically increasing logical clock shared by every
//! participant. Protocol phases are bounded by a number of blocks rather than by wall-clock
//! time, so all participants observing the same chain agree on when a phase ends.
//!
//! # Status
//!
//! `relay-chain` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

use std::future::Future;
use thiserror::Error;

pub mod local;

/// Errors that can occur when waiting for blocks.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("block counter stopped")]
    Stopped,
}

/// Interface for observing the height of a chain.
pub trait BlockCounter: Clone + Send + Sync + 'static {
    /// Resolves to the height at which the awaited block was observed.
    type Waiter: Future<Output = Result<u64, Error>> + Send + Unpin + 'static;

    /// Returns the current height.
    fn current_block(&self) -> u64;

    /// Registers interest in the block `blocks` after the current height and returns
    /// without blocking.
    ///
    /// If `blocks` is zero, the waiter resolves immediately to the current height. Waiters
    /// resolve at (or after) the requested height.
    fn block_waiter(&self, blocks: u64) -> Self::Waiter;

    /// Waits until `blocks` further blocks have been observed.
    fn wait_for_blocks(&self, blocks: u64) -> impl Future<Output = Result<u64, Error>> + Send {
        self.block_waiter(blocks)
    }
}
