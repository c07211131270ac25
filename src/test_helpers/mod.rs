//! A set of helpers for testing

mod abi;
mod alarm;
mod database;
mod dispatcher;
mod event;
mod http_client;
mod log;

pub use abi::{erc20_abi, erc20_abi_json};
pub use alarm::AlarmDraftBuilder;
pub use database::setup_test_db;
pub use dispatcher::RecordingDispatcher;
pub use event::ChainEventBuilder;
pub use http_client::create_test_http_client;
pub use log::LogBuilder;
