//! `add-alarm` and `list-alarms`.

use std::{path::PathBuf, sync::Arc};

use alloy::primitives::Address;
use clap::Parser;
use serde::Serialize;

use super::{CommandError, open_repository, print_json};
use crate::{
    abi::AbiFetcher,
    alarms::AlarmService,
    config::AppConfig,
    engine::ReceiptLedger,
    http_client::HttpClientPool,
    models::{Alarm, AlarmFilter, NewAlarm, Receipt},
    persistence::{
        error::PersistenceError,
        traits::{AlarmRepository, ReceiptRepository},
    },
};

#[derive(Parser, Debug)]
pub struct AddAlarmArgs {
    /// JSON file holding the whole alarm description. Flags override its
    /// fields.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Contract address to watch.
    #[arg(long)]
    address: Option<String>,
    /// File holding the contract ABI (JSON array).
    #[arg(long)]
    abi_file: Option<PathBuf>,
    /// Event to watch; repeat for several.
    #[arg(long = "event")]
    events: Vec<String>,
    /// Email recipient.
    #[arg(long)]
    email: Option<String>,
    /// Webhook URL.
    #[arg(long)]
    webhook: Option<String>,
    /// Confirmations required before notifying.
    #[arg(long)]
    confirmations: Option<u64>,
    /// Look the ABI up remotely when none is given.
    #[arg(long)]
    fetch_abi: bool,
}

#[derive(Parser, Debug)]
pub struct ListAlarmsArgs {
    /// Only the alarm with this id.
    #[arg(long)]
    id: Option<i64>,
    /// Only alarms on this address; repeat for several.
    #[arg(long = "address")]
    addresses: Vec<Address>,
    /// Include the transactions each alarm was notified about.
    #[arg(long)]
    receipts: bool,
}

/// One row of `list-alarms` output.
#[derive(Debug, Serialize)]
struct AlarmListing {
    #[serde(flatten)]
    alarm: Alarm,
    #[serde(skip_serializing_if = "Option::is_none")]
    receipts: Option<Vec<Receipt>>,
}

async fn alarm_listings<R>(
    repository: Arc<R>,
    filter: &AlarmFilter,
    with_receipts: bool,
) -> Result<Vec<AlarmListing>, PersistenceError>
where
    R: AlarmRepository + ReceiptRepository,
{
    let alarms = AlarmService::new(repository.clone()).list_alarms(filter).await?;
    let ledger = ReceiptLedger::new(repository);

    let mut listings = Vec::with_capacity(alarms.len());
    for alarm in alarms {
        let receipts =
            if with_receipts { Some(ledger.receipts_for(alarm.id).await?) } else { None };
        listings.push(AlarmListing { alarm, receipts });
    }
    Ok(listings)
}

/// Merges the description file with the flags; flags win.
fn build_description(args: &AddAlarmArgs) -> Result<NewAlarm, CommandError> {
    let mut description = match &args.file {
        Some(path) => serde_json::from_str::<NewAlarm>(&std::fs::read_to_string(path)?)?,
        None => NewAlarm::default(),
    };
    if let Some(address) = &args.address {
        description.address = Some(address.clone());
    }
    if let Some(path) = &args.abi_file {
        description.abi = Some(serde_json::from_str(&std::fs::read_to_string(path)?)?);
    }
    if !args.events.is_empty() {
        description.event_names = args.events.clone();
    }
    if args.email.is_some() {
        description.email = args.email.clone();
    }
    if args.webhook.is_some() {
        description.webhook = args.webhook.clone();
    }
    if args.confirmations.is_some() {
        description.block_confirmations = args.confirmations;
    }
    Ok(description)
}

pub async fn add(config: AppConfig, args: AddAlarmArgs) -> Result<(), CommandError> {
    let mut description = build_description(&args)?;

    if description.abi.is_none() && args.fetch_abi {
        let raw_address = description.address.as_deref().ok_or_else(|| {
            CommandError::InvalidArgument("--fetch-abi needs an address".to_string())
        })?;
        let address: Address = raw_address
            .trim()
            .parse()
            .map_err(|e| CommandError::InvalidArgument(format!("address: {e}")))?;

        let pool = HttpClientPool::with_base_config(config.http_base_config.clone());
        let client = pool.get_or_create(&config.http_retry_config).await?;
        match AbiFetcher::new(client, config.abi_lookup.clone()).fetch(address).await? {
            Some(abi) => description.abi = Some(serde_json::to_value(abi)?),
            None => tracing::warn!(%address, "No ABI found remotely; validation will reject."),
        }
    }

    let repository = open_repository(&config).await?;
    let alarm = AlarmService::new(repository).create_alarm(description).await?;
    tracing::info!(alarm_id = alarm.id, "Alarm created.");
    print_json(&alarm)
}

pub async fn list(config: AppConfig, args: ListAlarmsArgs) -> Result<(), CommandError> {
    let repository = open_repository(&config).await?;
    let filter = AlarmFilter { id: args.id, addresses: args.addresses };
    print_json(&alarm_listings(repository, &filter, args.receipts).await?)
}
