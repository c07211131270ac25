//! Contract ABIs: remote lookup and runtime log decoding.

pub mod decoder;
pub mod fetcher;
mod json;

pub use decoder::{DecodeError, EventDecoder};
pub use fetcher::{AbiFetchError, AbiFetcher};
pub use json::dyn_sol_value_to_json;
