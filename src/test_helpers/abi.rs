//! Test helpers for ABI-related functionality.

use alloy::json_abi::JsonAbi;

/// A simple ABI JSON for testing purposes.
pub fn erc20_abi_json() -> &'static str {
    // get abi from abis/erc20.json
    include_str!("../../abis/erc20.json")
}

/// The ERC-20 test ABI, parsed.
pub fn erc20_abi() -> JsonAbi {
    serde_json::from_str(erc20_abi_json()).expect("abis/erc20.json is a valid ABI")
}
