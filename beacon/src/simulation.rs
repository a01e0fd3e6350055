//! Run a threshold group of in-process participants.
//!
//! All participants share one [local](relay_chain::local) block counter and two
//! [local](relay_broadcast::local) channels (one for key generation and one for partial
//! signatures). Each participant runs on its own task.

use crate::{
    dkg::{self, Budgets, Deviation},
    signature::{self, GroupSignatureShareMessage},
};
use futures::future::join_all;
use prometheus_client::registry::Registry;
use relay_broadcast::{
    local::{Channel, Config as ChannelConfig},
    Channel as _,
};
use relay_chain::local::{BlockCounter, Config as BlockCounterConfig};
use relay_cryptography::bls12381::{primitives::group, thresholdgroup::Id};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::error;

/// Name of the key generation channel.
pub const DKG_CHANNEL: &str = "dkg";

/// Name of the partial signature channel.
pub const SIGNATURE_CHANNEL: &str = "signature";

/// Configuration for [run].
#[derive(Clone)]
pub struct Config {
    /// Number of participants.
    pub participants: u32,

    /// Number of members required to produce a group signature.
    pub threshold: u32,

    /// Time between blocks.
    pub block_time: Duration,

    /// Number of blocks each key generation phase may take.
    pub budgets: Budgets,

    /// Configuration for producing a group signature.
    pub signature: signature::Config,

    /// Participants (by index) that deviate from the protocol.
    pub deviations: BTreeMap<u32, Deviation>,

    /// Message to sign with the group once key generation completes (if any).
    pub message: Option<Vec<u8>>,

    /// Maximum number of undelivered messages queued for each subscription.
    pub mailbox_size: usize,

    /// Registry for metrics.
    pub registry: Arc<Mutex<Registry>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            participants: 5,
            threshold: 3,
            block_time: Duration::from_secs(1),
            budgets: Budgets::default(),
            signature: signature::Config::default(),
            deviations: BTreeMap::new(),
            message: None,
            mailbox_size: 1024,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }
}

/// What a single participant produced.
pub struct Outcome {
    /// Index of the participant.
    pub index: u32,

    /// Identifier of the participant.
    pub id: Id,

    /// Result of key generation.
    pub dkg: Result<dkg::Output, dkg::Error>,

    /// Result of producing a group signature (if a message was provided and key generation
    /// succeeded).
    pub signature: Option<Result<group::Signature, signature::Error>>,
}

/// Returns the hex-encoded identifier of the participant at `index`.
pub fn member_id(index: u32) -> String {
    format!("0x{:x}", index as u64 + 1)
}

/// Creates the key generation channel.
pub fn dkg_channel(cfg: &Config) -> Channel<Id, dkg::wire::Dkg> {
    Channel::new(ChannelConfig {
        name: DKG_CHANNEL.into(),
        mailbox_size: cfg.mailbox_size,
        registry: cfg.registry.clone(),
    })
}

/// Creates the partial signature channel.
pub fn signature_channel(cfg: &Config) -> Channel<Id, GroupSignatureShareMessage> {
    Channel::new(ChannelConfig {
        name: SIGNATURE_CHANNEL.into(),
        mailbox_size: cfg.mailbox_size,
        registry: cfg.registry.clone(),
    })
}

/// Starts a block counter.
pub fn block_counter(cfg: &Config) -> BlockCounter {
    BlockCounter::start(BlockCounterConfig {
        block_time: cfg.block_time,
        start_height: 0,
        registry: None,
    })
}

/// Runs every participant to completion and returns their outcomes (ordered by index).
///
/// Must be called from within a `tokio` runtime.
pub async fn run(cfg: Config) -> Vec<Outcome> {
    let block_counter = BlockCounter::start(BlockCounterConfig {
        block_time: cfg.block_time,
        start_height: 0,
        registry: Some(cfg.registry.clone()),
    });
    let dkg_channel = dkg_channel(&cfg);
    let signature_channel = signature_channel(&cfg);

    let mut handles = Vec::with_capacity(cfg.participants as usize);
    for index in 0..cfg.participants {
        let member_id = member_id(index);
        let Ok(id) = Id::parse(&member_id) else {
            continue;
        };
        let config = dkg::Config {
            member_id,
            group_size: cfg.participants,
            threshold: cfg.threshold,
            budgets: cfg.budgets,
            deviation: cfg.deviations.get(&index).copied().unwrap_or_default(),
        };
        let block_counter = block_counter.clone();
        let dkg_channel = dkg_channel.clone();
        let signature_channel = signature_channel.clone();
        let signing = cfg
            .message
            .clone()
            .map(|message| (message, signature_channel.subscribe()));
        let signature_config = cfg.signature;
        handles.push(tokio::spawn(async move {
            let dkg = dkg::execute(&block_counter, &dkg_channel, config).await;
            let signature = match (&dkg, signing) {
                (Ok(output), Some((message, subscription))) => Some(
                    signature::execute(
                        &output.member,
                        &message,
                        &block_counter,
                        &signature_channel,
                        subscription,
                        signature_config,
                    )
                    .await,
                ),
                _ => None,
            };
            Outcome {
                index,
                id,
                dkg,
                signature,
            }
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for result in join_all(handles).await {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => error!(?err, "participant task failed"),
        }
    }
    outcomes
}
