//! `reconcile` and `watermarks`.

use std::{path::PathBuf, sync::Arc};

use alloy::{primitives::Address, rpc::types::Log};
use clap::{Parser, ValueEnum};

use super::{CommandError, open_repository, print_json};
use crate::{
    abi::EventDecoder,
    alarms::{AlarmService, contract_descriptors_for},
    config::AppConfig,
    engine::ReconciliationEngine,
    http_client::HttpClientPool,
    models::ChainEvent,
    notification::NotificationService,
    sync::SyncTracker,
};

/// Shape of the batch file.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchFormat {
    /// A JSON array of already decoded events.
    #[default]
    Events,
    /// A JSON array of raw RPC logs, decoded with the stored alarm ABIs.
    Logs,
}

#[derive(Parser, Debug)]
pub struct ReconcileArgs {
    /// JSON batch file.
    #[arg(long)]
    input: PathBuf,
    /// How to read the batch file.
    #[arg(long, value_enum, default_value_t = BatchFormat::Events)]
    format: BatchFormat,
    /// Current chain head.
    #[arg(long)]
    head: u64,
}

#[derive(Parser, Debug)]
pub struct WatermarksArgs {
    /// Address to report; repeat for several.
    #[arg(long = "address", required = true)]
    addresses: Vec<Address>,
    /// Height assumed for alarms that never synced.
    #[arg(long, default_value_t = 0)]
    default: u64,
}

pub async fn execute(config: AppConfig, args: ReconcileArgs) -> Result<(), CommandError> {
    let repository = open_repository(&config).await?;
    let raw = std::fs::read_to_string(&args.input)?;

    let events: Vec<ChainEvent> = match args.format {
        BatchFormat::Events => serde_json::from_str(&raw)?,
        BatchFormat::Logs => {
            let logs: Vec<Log> = serde_json::from_str(&raw)?;
            let mut addresses: Vec<Address> = logs.iter().map(Log::address).collect();
            addresses.sort();
            addresses.dedup();

            let alarms = AlarmService::new(repository.clone());
            let mapping = alarms.map_addresses_to_alarms(&addresses).await?;
            let decoder = EventDecoder::new(&contract_descriptors_for(&mapping));
            let events = decoder.decode_all(&logs);
            tracing::info!(logs = logs.len(), decoded = events.len(), "Decoded log batch.");
            events
        }
    };

    let client_pool = Arc::new(HttpClientPool::with_base_config(config.http_base_config.clone()));
    let dispatcher = Arc::new(NotificationService::from_config(&config, client_pool));
    let engine = ReconciliationEngine::from_config(repository, dispatcher, Arc::new(config));

    let report = engine.reconcile(events, args.head).await?;
    print_json(&report)
}

pub async fn watermarks(config: AppConfig, args: WatermarksArgs) -> Result<(), CommandError> {
    let repository = open_repository(&config).await?;
    let heights = SyncTracker::new(repository)
        .latest_synced_height_per_address(&args.addresses, args.default)
        .await?;
    let mut rows: Vec<(Address, u64)> = heights.into_iter().collect();
    rows.sort();
    print_json(&rows)
}
