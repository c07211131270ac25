//! Conversion of decoded Solidity values into JSON.

use alloy::dyn_abi::DynSolValue;
use serde_json::Value;

/// Converts a `DynSolValue` to a `serde_json::Value`.
///
/// Integers outside the `i64` range become decimal strings to preserve
/// precision.
pub fn dyn_sol_value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(a) => Value::String(a.to_checksum(None)),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        DynSolValue::FixedBytes(fb, _) => Value::String(format!("0x{}", hex::encode(fb))),
        DynSolValue::Int(i, _) => integer_to_json(i.to_string()),
        DynSolValue::Uint(u, _) => integer_to_json(u.to_string()),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Array(arr) | DynSolValue::FixedArray(arr) | DynSolValue::Tuple(arr) => {
            Value::Array(arr.iter().map(dyn_sol_value_to_json).collect())
        }
        _ => Value::Null,
    }
}

fn integer_to_json(decimal: String) -> Value {
    match decimal.parse::<i64>() {
        Ok(val) => Value::Number(serde_json::Number::from(val)),
        Err(_) => Value::String(decimal),
    }
}
