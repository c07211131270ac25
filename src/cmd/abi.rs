//! `fetch-abi`: resolve a contract ABI from the configured lookup service.

use alloy::primitives::Address;
use clap::Parser;

use super::{CommandError, print_json};
use crate::{abi::AbiFetcher, config::AppConfig, http_client::HttpClientPool};

#[derive(Parser, Debug)]
pub struct FetchAbiArgs {
    /// Contract address to look up.
    address: Address,
}

pub async fn execute(config: AppConfig, args: FetchAbiArgs) -> Result<(), CommandError> {
    let pool = HttpClientPool::with_base_config(config.http_base_config.clone());
    let client = pool.get_or_create(&config.http_retry_config).await?;
    let fetcher = AbiFetcher::new(client, config.abi_lookup.clone());

    match fetcher.fetch(args.address).await? {
        Some(abi) => print_json(&abi),
        None => {
            eprintln!("No verified ABI found for {}", args.address);
            Ok(())
        }
    }
}
