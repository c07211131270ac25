//! A dispatcher that records what it was asked to deliver.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use alloy::primitives::B256;
use async_trait::async_trait;

use crate::{
    models::{Alarm, EventGroup},
    notification::{DispatchError, Dispatcher},
};

/// Records every `(alarm_id, tx_hash)` it delivers. Alarms registered with
/// [`RecordingDispatcher::fail_for`] are rejected with HTTP 500 instead.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    delivered: Arc<Mutex<Vec<(i64, B256)>>>,
    failing: Arc<Mutex<HashSet<i64>>>,
}

impl RecordingDispatcher {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every dispatch for `alarm_id` fail from now on.
    pub fn fail_for(&self, alarm_id: i64) {
        self.failing.lock().unwrap().insert(alarm_id);
    }

    /// Lets dispatches for `alarm_id` succeed again.
    pub fn recover(&self, alarm_id: i64) {
        self.failing.lock().unwrap().remove(&alarm_id);
    }

    /// Every delivered unit, in delivery order.
    pub fn delivered(&self) -> Vec<(i64, B256)> {
        self.delivered.lock().unwrap().clone()
    }

    /// Number of deliveries for `alarm_id`.
    pub fn count_for(&self, alarm_id: i64) -> usize {
        self.delivered.lock().unwrap().iter().filter(|(id, _)| *id == alarm_id).count()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, alarm: &Alarm, group: &EventGroup) -> Result<(), DispatchError> {
        if self.failing.lock().unwrap().contains(&alarm.id) {
            return Err(DispatchError::Rejected(500));
        }
        self.delivered.lock().unwrap().push((alarm.id, group.tx_hash));
        Ok(())
    }
}
