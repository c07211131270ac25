//! This module contains the data models for the Alarmist application.

pub mod alarm;
pub mod event;
pub mod receipt;
pub mod sync_state;

pub use alarm::{
    Alarm, AlarmDraft, AlarmFilter, ContractDescriptor, NewAlarm, NotificationTarget,
};
pub use event::{ChainEvent, EventGroup};
pub use receipt::Receipt;
pub use sync_state::{AlarmCursor, SyncOutcome, SyncRecord, SyncState};
