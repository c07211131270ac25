//! Query and creation layer over the alarm repository.

use std::{collections::HashMap, sync::Arc};

use alloy::primitives::Address;
use thiserror::Error;

use super::validator::{ValidationError, validate_new_alarm};
use crate::{
    models::{Alarm, AlarmFilter, ContractDescriptor, NewAlarm},
    persistence::{error::PersistenceError, traits::AlarmRepository},
};

/// Errors returned when creating an alarm.
#[derive(Debug, Error)]
pub enum AlarmServiceError {
    /// The description was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The alarm could not be stored.
    #[error("Alarm store error: {0}")]
    Store(#[from] PersistenceError),
}

/// Reads and creates alarms.
pub struct AlarmService<R: AlarmRepository> {
    repository: Arc<R>,
}

impl<R: AlarmRepository> AlarmService<R> {
    /// Creates a new `AlarmService` backed by `repository`.
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Lists the alarms matching `filter`, ordered by id.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn list_alarms(&self, filter: &AlarmFilter) -> Result<Vec<Alarm>, PersistenceError> {
        self.repository.get_alarms(filter).await
    }

    /// Validates `description` and stores it.
    #[tracing::instrument(skip(self, description), level = "debug")]
    pub async fn create_alarm(&self, description: NewAlarm) -> Result<Alarm, AlarmServiceError> {
        let draft = validate_new_alarm(description).inspect_err(|error| {
            tracing::info!(problems = ?error.problems, "Rejected alarm description.");
        })?;
        Ok(self.repository.insert_alarm(&draft).await?)
    }

    /// Groups the alarms watching `addresses` by address.
    ///
    /// Addresses without alarms are absent from the map. An empty input yields
    /// an empty map.
    #[tracing::instrument(
        skip(self, addresses),
        fields(address_count = addresses.len()),
        level = "debug"
    )]
    pub async fn map_addresses_to_alarms(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, Vec<Alarm>>, PersistenceError> {
        if addresses.is_empty() {
            return Ok(HashMap::new());
        }

        let alarms = self
            .repository
            .get_alarms(&AlarmFilter::by_addresses(addresses.iter().copied()))
            .await?;

        let mut mapping: HashMap<Address, Vec<Alarm>> = HashMap::new();
        for alarm in alarms {
            mapping.entry(alarm.address).or_default().push(alarm);
        }

        tracing::debug!(matched_addresses = mapping.len(), "Resolved alarms for addresses.");
        Ok(mapping)
    }
}

/// One decoding descriptor per address, using the ABI of the address's
/// lowest-id alarm. Sorted by address.
pub fn contract_descriptors_for(mapping: &HashMap<Address, Vec<Alarm>>) -> Vec<ContractDescriptor> {
    let mut descriptors: Vec<ContractDescriptor> = mapping
        .iter()
        .filter_map(|(address, alarms)| {
            alarms.iter().min_by_key(|alarm| alarm.id).map(|alarm| ContractDescriptor {
                address: *address,
                abi: alarm.abi.clone(),
            })
        })
        .collect();
    descriptors.sort_by_key(|descriptor| descriptor.address);
    descriptors
}
