use serde_json::Value;

/// Read an unsigned 64-bit integer that the ledger may encode either as a
/// JSON number or as a decimal string.
pub fn u64_from_json(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
