//! Simulate a threshold group: generate a group key and sign a message with it.

use clap::Parser;
use relay_beacon::{
    dkg::{hex, Deviation},
    simulation,
};
use relay_cryptography::bls12381::primitives::group::Element;
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};
use tracing::{error, info, Level};

/// Threshold group simulator.
#[derive(Parser)]
pub struct App {
    /// The number of participants in the group.
    #[arg(long, default_value_t = 5)]
    participants: u32,

    /// The number of members required to produce a group signature.
    #[arg(long, default_value_t = 3)]
    threshold: u32,

    /// The time between blocks (in milliseconds).
    #[arg(long, default_value_t = 500)]
    block_time_ms: u64,

    /// Participants (by index) that never send shares or justifications.
    #[arg(long, value_delimiter = ',')]
    silent: Vec<u32>,

    /// Participants (by index) that send random shares.
    #[arg(long, value_delimiter = ',')]
    corrupt: Vec<u32>,

    /// The message to sign once the group key is generated.
    #[arg(long, default_value = "relay beacon entry")]
    message: String,

    /// The maximum number of undelivered messages queued for each subscription.
    #[arg(long, default_value_t = 1024)]
    mailbox_size: usize,

    /// The log level for traces. opts: (error, debug, info, warn, trace)
    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,

    /// The number of worker threads for the runtime to use
    #[arg(long, default_value_t = 3)]
    worker_threads: usize,
}

fn main() {
    let app = App::parse();
    tracing_subscriber::fmt()
        .with_max_level(app.log_level)
        .with_line_number(true)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(app.worker_threads)
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(?err, "failed to start runtime");
            return;
        }
    };

    let mut deviations = app
        .silent
        .iter()
        .map(|index| (*index, Deviation::Silent))
        .collect::<BTreeMap<_, _>>();
    deviations.extend(app.corrupt.iter().map(|index| (*index, Deviation::Corrupt)));

    let config = simulation::Config {
        participants: app.participants,
        threshold: app.threshold,
        block_time: Duration::from_millis(app.block_time_ms),
        deviations,
        message: Some(app.message.into_bytes()),
        mailbox_size: app.mailbox_size,
        ..Default::default()
    };
    let registry = config.registry.clone();
    let outcomes = runtime.block_on(simulation::run(config));

    let mut public_keys = BTreeSet::new();
    let mut signatures = BTreeSet::new();
    for outcome in &outcomes {
        match &outcome.dkg {
            Ok(output) => {
                public_keys.insert(hex(&output.member.group_public_key().serialize()));
            }
            Err(err) => error!(member = %outcome.id, ?err, "key generation failed"),
        }
        match &outcome.signature {
            Some(Ok(signature)) => {
                signatures.insert(hex(&signature.serialize()));
            }
            Some(Err(err)) => error!(member = %outcome.id, ?err, "group signature failed"),
            None => {}
        }
    }
    info!(
        participants = outcomes.len(),
        public_keys = public_keys.len(),
        signatures = signatures.len(),
        "simulation complete"
    );
    for public_key in &public_keys {
        info!(%public_key, "group public key");
    }
    for signature in &signatures {
        info!(%signature, "group signature");
    }

    let mut encoded = String::new();
    let registry = registry.lock().unwrap();
    if prometheus_client::encoding::text::encode(&mut encoded, &registry).is_ok() {
        info!(metrics = %encoded, "final metrics");
    }
}
