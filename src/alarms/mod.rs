//! Alarm registration and lookup.

mod service;
pub mod validator;

pub use service::{AlarmService, AlarmServiceError, contract_descriptors_for};
pub use validator::{ValidationError, validate_new_alarm};
