#![warn(missing_docs)]
//! Alarmist watches smart-contract events on behalf of users and notifies
//! them, once per alarm and transaction, when matching events become final.

pub mod abi;
pub mod alarms;
#[allow(missing_docs)]
pub mod cmd;
pub mod config;
pub mod engine;
pub mod http_client;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod sync;
pub mod test_helpers;
