//! The reconciliation pass: chain events in, at most one notification per
//! (alarm, transaction) out.
//!
//! For every unit of a batch the engine:
//!
//! 1. defers it while its block is above the alarm's safe height;
//! 2. skips it when a receipt shows it was already notified;
//! 3. otherwise dispatches it, then records the receipt.
//!
//! A failed or timed-out dispatch leaves no trace, so the unit is offered
//! again on the next pass. Units are processed concurrently; passes racing on
//! the same unit are serialised by an in-process lock.
//!
//! Sync cursors move once per pass, after every unit has settled. An alarm's
//! cursor advances to the highest delivered height that lies below all of its
//! failed or deferred units, so resuming from the cursor never skips a unit
//! still owed a notification.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use alloy::primitives::{Address, B256};
use dashmap::DashMap;
use futures::{StreamExt, future::join_all, stream};
use serde::Serialize;
use tokio::sync::Mutex;

use super::{receipts::ReceiptLedger, reorg::ReorgPolicy};
use crate::{
    alarms::AlarmService,
    config::AppConfig,
    models::{Alarm, ChainEvent, EventGroup},
    notification::{DispatchError, Dispatcher},
    persistence::{
        error::PersistenceError,
        traits::{AlarmRepository, ReceiptRepository, SyncStateRepository},
    },
    sync::SyncTracker,
};

const DEFAULT_CONCURRENCY: usize = 8;
const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// What happened to one (alarm, transaction) unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    /// Delivered and receipt written.
    Dispatched,
    /// A receipt already existed; nothing was sent.
    AlreadyNotified,
    /// The block is not final yet for this alarm.
    Deferred {
        /// Highest final block at this chain head, if any.
        safe_height: Option<u64>,
    },
    /// Delivery or bookkeeping failed; the unit will be retried.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

/// Outcome of one unit together with what identifies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    /// Alarm the unit belongs to.
    pub alarm_id: i64,
    /// Transaction the unit covers.
    pub tx_hash: B256,
    /// Block of the transaction.
    pub block_height: u64,
    /// Number of events delivered (or to be delivered).
    pub event_count: usize,
    /// What happened.
    pub outcome: UnitOutcome,
}

impl UnitOutcome {
    /// True when the unit needs no further delivery.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Dispatched | Self::AlreadyNotified)
    }
}

/// Cursor movement of one alarm at the end of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CursorAdvance {
    pub alarm_id: i64,
    /// Height the cursor was moved to.
    pub height: u64,
    /// Set when the cursor write failed; the next pass repeats it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Chain head the pass was evaluated against.
    pub chain_head: u64,
    /// One entry per unit, in batch order.
    pub units: Vec<UnitReport>,
    /// Events that no alarm watches.
    pub unmatched_events: usize,
    /// Cursors moved by this pass, ordered by alarm.
    pub cursors: Vec<CursorAdvance>,
}

impl ReconciliationReport {
    fn count(&self, matches: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|unit| matches(&unit.outcome)).count()
    }

    /// Units delivered during this pass.
    pub fn dispatched(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Dispatched))
    }

    /// Units skipped because of an existing receipt.
    pub fn already_notified(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::AlreadyNotified))
    }

    /// Units not final yet.
    pub fn deferred(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Deferred { .. }))
    }

    /// Units to retry.
    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, UnitOutcome::Failed { .. }))
    }

    /// Where the pass left the cursor of `alarm_id`, if it moved it.
    pub fn cursor_for(&self, alarm_id: i64) -> Option<u64> {
        self.cursors
            .iter()
            .find(|cursor| cursor.alarm_id == alarm_id && cursor.error.is_none())
            .map(|cursor| cursor.height)
    }

    /// The outcome of a given unit, if it was part of the pass.
    pub fn outcome_for(&self, alarm_id: i64, tx_hash: &B256) -> Option<&UnitOutcome> {
        self.units
            .iter()
            .find(|unit| unit.alarm_id == alarm_id && unit.tx_hash == *tx_hash)
            .map(|unit| &unit.outcome)
    }
}

/// Matches chain events against alarms and dispatches final, unseen units.
pub struct ReconciliationEngine<R>
where
    R: AlarmRepository + SyncStateRepository + ReceiptRepository,
{
    alarms: AlarmService<R>,
    sync: SyncTracker<R>,
    receipts: ReceiptLedger<R>,
    dispatcher: Arc<dyn Dispatcher>,
    reorg: ReorgPolicy,
    concurrency: usize,
    dispatch_timeout: Duration,
    /// One lock per unit currently being delivered.
    unit_locks: DashMap<(i64, B256), Arc<Mutex<()>>>,
}

impl<R> ReconciliationEngine<R>
where
    R: AlarmRepository + SyncStateRepository + ReceiptRepository,
{
    /// Creates an engine with the default concurrency and dispatch timeout.
    pub fn new(repository: Arc<R>, dispatcher: Arc<dyn Dispatcher>, reorg: ReorgPolicy) -> Self {
        Self {
            alarms: AlarmService::new(repository.clone()),
            sync: SyncTracker::new(repository.clone()),
            receipts: ReceiptLedger::new(repository),
            dispatcher,
            reorg,
            concurrency: DEFAULT_CONCURRENCY,
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            unit_locks: DashMap::new(),
        }
    }

    /// Creates an engine tuned by the application configuration.
    pub fn from_config(
        repository: Arc<R>,
        dispatcher: Arc<dyn Dispatcher>,
        config: Arc<AppConfig>,
    ) -> Self {
        let concurrency = config.engine_concurrency;
        let dispatch_timeout = config.dispatch_timeout;
        Self::new(repository, dispatcher, ReorgPolicy::new(config))
            .with_concurrency(concurrency)
            .with_dispatch_timeout(dispatch_timeout)
    }

    /// Sets how many units are processed at once. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the upper bound for a single dispatch.
    pub fn with_dispatch_timeout(mut self, dispatch_timeout: Duration) -> Self {
        self.dispatch_timeout = dispatch_timeout;
        self
    }

    /// Runs one reconciliation pass over `events` at `chain_head`.
    ///
    /// Only a failure to resolve the batch's alarms aborts the pass; every
    /// per-unit problem is reported in the returned report.
    #[tracing::instrument(skip(self, events), fields(event_count = events.len()))]
    pub async fn reconcile(
        &self,
        events: Vec<ChainEvent>,
        chain_head: u64,
    ) -> Result<ReconciliationReport, PersistenceError> {
        let groups = EventGroup::group_by_transaction(events);

        let mut addresses: Vec<Address> = Vec::new();
        for address in groups.iter().flat_map(EventGroup::addresses) {
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
        let alarms_by_address = self.alarms.map_addresses_to_alarms(&addresses).await?;

        let mut units: Vec<(&Alarm, EventGroup)> = Vec::new();
        let mut unmatched_events = 0;
        for group in &groups {
            unmatched_events += count_unmatched(group, &alarms_by_address);
            for address in group.addresses() {
                let Some(alarms) = alarms_by_address.get(&address) else {
                    continue;
                };
                for alarm in alarms {
                    if let Some(selected) = group.select(address, |name| alarm.watches(name)) {
                        units.push((alarm, selected));
                    }
                }
            }
        }

        let mut reports: Vec<(usize, UnitReport)> = stream::iter(units.into_iter().enumerate())
            .map(|(position, (alarm, group))| async move {
                (position, self.reconcile_unit(alarm, group, chain_head).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        reports.sort_by_key(|(position, _)| *position);
        let units: Vec<UnitReport> = reports.into_iter().map(|(_, report)| report).collect();

        let cursors = self.advance_cursors(&units).await;
        let report = ReconciliationReport { chain_head, units, unmatched_events, cursors };

        tracing::info!(
            chain_head,
            units = report.units.len(),
            dispatched = report.dispatched(),
            already_notified = report.already_notified(),
            deferred = report.deferred(),
            failed = report.failed(),
            unmatched_events,
            "Reconciliation pass complete."
        );
        Ok(report)
    }

    /// Per-address watermarks the poller resumes from. Alarms that never
    /// synced count as `default_height`.
    pub async fn fetch_start_heights(
        &self,
        addresses: &[Address],
        default_height: u64,
    ) -> Result<HashMap<Address, u64>, PersistenceError> {
        self.sync.latest_synced_height_per_address(addresses, default_height).await
    }

    async fn advance_cursors(&self, units: &[UnitReport]) -> Vec<CursorAdvance> {
        join_all(cursor_targets(units).into_iter().map(|(alarm_id, height)| async move {
            let error = match self.sync.record_sync_height(alarm_id, height).await {
                Ok(_) => None,
                Err(error) => {
                    tracing::warn!(
                        alarm_id,
                        height,
                        %error,
                        "Sync cursor not advanced, will retry on next pass."
                    );
                    Some(error.to_string())
                }
            };
            CursorAdvance { alarm_id, height, error }
        }))
        .await
    }

    async fn reconcile_unit(
        &self,
        alarm: &Alarm,
        group: EventGroup,
        chain_head: u64,
    ) -> UnitReport {
        let block_height = group.block_height();

        let outcome = if self.reorg.is_final(block_height, chain_head, alarm) {
            self.deliver_once(alarm, &group).await
        } else {
            let safe_height = self.reorg.effective_safe_height(chain_head, alarm);
            tracing::debug!(
                alarm_id = alarm.id,
                tx_hash = %group.tx_hash,
                block_height,
                ?safe_height,
                "Unit not final yet, deferring."
            );
            UnitOutcome::Deferred { safe_height }
        };

        UnitReport {
            alarm_id: alarm.id,
            tx_hash: group.tx_hash,
            block_height,
            event_count: group.events.len(),
            outcome,
        }
    }

    /// Gets or creates the lock of a unit.
    fn get_unit_lock(&self, key: (i64, B256)) -> Arc<Mutex<()>> {
        self.unit_locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    async fn deliver_once(&self, alarm: &Alarm, group: &EventGroup) -> UnitOutcome {
        let key = (alarm.id, group.tx_hash);
        let lock = self.get_unit_lock(key);
        let outcome = {
            let _guard = lock.lock().await;
            self.deliver(alarm, group).await
        };
        drop(lock);
        self.unit_locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        outcome
    }

    async fn deliver(&self, alarm: &Alarm, group: &EventGroup) -> UnitOutcome {
        let tx_hash = group.tx_hash;

        match self.receipts.has_receipt(alarm.id, &tx_hash).await {
            Ok(true) => {
                tracing::debug!(alarm_id = alarm.id, %tx_hash, "Unit already notified.");
                return UnitOutcome::AlreadyNotified;
            }
            Ok(false) => {}
            Err(error) => return failed(alarm.id, &tx_hash, format!("receipt lookup: {error}")),
        }

        let dispatched =
            tokio::time::timeout(self.dispatch_timeout, self.dispatcher.dispatch(alarm, group))
                .await
                .unwrap_or(Err(DispatchError::Timeout(self.dispatch_timeout)));
        if let Err(error) = dispatched {
            return failed(alarm.id, &tx_hash, format!("dispatch: {error}"));
        }

        if let Err(error) = self.receipts.record_receipt(alarm.id, &tx_hash).await {
            return failed(alarm.id, &tx_hash, format!("receipt write after dispatch: {error}"));
        }

        tracing::info!(alarm_id = alarm.id, %tx_hash, "Unit dispatched.");
        UnitOutcome::Dispatched
    }
}

fn failed(alarm_id: i64, tx_hash: &B256, reason: String) -> UnitOutcome {
    tracing::warn!(alarm_id, %tx_hash, reason = %reason, "Unit failed, will retry on next pass.");
    UnitOutcome::Failed { reason }
}

/// Per alarm, the highest settled height below its lowest unsettled one.
fn cursor_targets(units: &[UnitReport]) -> BTreeMap<i64, u64> {
    let mut blocked: HashMap<i64, u64> = HashMap::new();
    for unit in units.iter().filter(|unit| !unit.outcome.is_settled()) {
        blocked
            .entry(unit.alarm_id)
            .and_modify(|lowest| *lowest = (*lowest).min(unit.block_height))
            .or_insert(unit.block_height);
    }

    let mut targets: BTreeMap<i64, u64> = BTreeMap::new();
    for unit in units.iter().filter(|unit| unit.outcome.is_settled()) {
        if blocked.get(&unit.alarm_id).is_some_and(|lowest| unit.block_height >= *lowest) {
            continue;
        }
        targets
            .entry(unit.alarm_id)
            .and_modify(|highest| *highest = (*highest).max(unit.block_height))
            .or_insert(unit.block_height);
    }
    targets
}

/// Events of `group` that no alarm on their address watches.
fn count_unmatched(
    group: &EventGroup,
    alarms_by_address: &HashMap<Address, Vec<Alarm>>,
) -> usize {
    group
        .events
        .iter()
        .filter(|event| {
            !alarms_by_address
                .get(&event.address)
                .is_some_and(|alarms| alarms.iter().any(|alarm| alarm.watches(&event.event_name)))
        })
        .count()
}
