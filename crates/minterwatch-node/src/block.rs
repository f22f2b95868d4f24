//! Block normalizer: raw node JSON to [`Block`].
//!
//! Numeric fields arrive either as JSON numbers or decimal strings. Unknown
//! transaction codes and event types normalize to an untyped action instead
//! of failing the block.

use chrono::{DateTime, Utc};
use serde_json::Value;

use minterwatch_core::error::WatchError;
use minterwatch_core::types::{Action, Block, BlockInfo, Validator};

/// Tag for a numeric transaction type code.
pub fn transaction_type(code: u64) -> Option<&'static str> {
    let tag = match code {
        1 => "Send",
        2 => "SellCoin",
        3 => "SellAllCoin",
        4 => "BuyCoin",
        5 => "CreateCoin",
        6 => "DeclareCandidacy",
        7 => "Delegate",
        8 => "Unbond",
        9 => "RedeemCheck",
        10 => "SetCandidateOnline",
        11 => "SetCandidateOffline",
        12 => "CreateMultisig",
        13 => "Multisend",
        14 => "EditCandidate",
        _ => return None,
    };
    Some(tag)
}

/// Tag for a node event type.
pub fn event_type(node_type: &str) -> Option<&'static str> {
    match node_type {
        "minter/RewardEvent" => Some("Reward"),
        "minter/SlashEvent" => Some("Slash"),
        _ => None,
    }
}

/// Build a [`Block`] from the `result` of `GET block` and the event list of
/// `GET events` for the same height.
pub fn block_from_json(raw: &Value, events: &[Value]) -> Result<Block, WatchError> {
    let block_info = BlockInfo {
        block_hash: str_field(raw, "hash")?,
        block_height: u64_field(raw, "height")?,
        time: time_field(raw, "time")?,
        num_txs: u64_field(raw, "num_txs")?,
        total_txs: u64_field(raw, "total_txs")?,
        block_reward: u128_field(raw, "block_reward")?,
        size: u64_field(raw, "size")?,
        proposer: raw["proposer"].as_str().unwrap_or_default().to_string(),
        validators: validators(&raw["validators"]),
    };

    let transactions = raw["transactions"].as_array().map(Vec::as_slice).unwrap_or(&[]);
    let mut actions = Vec::with_capacity(transactions.len() + events.len());
    actions.extend(transactions.iter().map(transaction_action));
    actions.extend(events.iter().map(event_action));

    Ok(Block {
        block_info,
        actions,
    })
}

fn transaction_action(tx: &Value) -> Action {
    let action_type = tx
        .get("type")
        .and_then(lenient_u64)
        .and_then(transaction_type)
        .map(str::to_string);

    let payload = match tx {
        Value::Object(fields) => {
            let mut fields = fields.clone();
            fields.remove("type");
            Value::Object(fields)
        }
        other => other.clone(),
    };

    Action {
        action_type,
        payload,
    }
}

fn event_action(event: &Value) -> Action {
    Action {
        action_type: event["type"].as_str().and_then(event_type).map(str::to_string),
        payload: event.get("value").cloned().unwrap_or(Value::Null),
    }
}

fn validators(raw: &Value) -> Vec<Validator> {
    raw.as_array()
        .map(|list| {
            list.iter()
                .map(|v| Validator {
                    pub_key: v["pub_key"]
                        .as_str()
                        .or_else(|| v["pubkey"].as_str())
                        .unwrap_or_default()
                        .to_string(),
                    signed: v["signed"].as_bool().unwrap_or(false),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Accepts a JSON number or a decimal string.
pub(crate) fn lenient_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_u128(v: &Value) -> Option<u128> {
    match v {
        Value::Number(n) => n.as_u64().map(u128::from),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn str_field(raw: &Value, field: &str) -> Result<String, WatchError> {
    raw[field]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| WatchError::Decode(format!("block field '{field}' missing or not a string")))
}

fn u64_field(raw: &Value, field: &str) -> Result<u64, WatchError> {
    lenient_u64(&raw[field])
        .ok_or_else(|| WatchError::Decode(format!("block field '{field}' is not an integer: {}", raw[field])))
}

fn u128_field(raw: &Value, field: &str) -> Result<u128, WatchError> {
    lenient_u128(&raw[field])
        .ok_or_else(|| WatchError::Decode(format!("block field '{field}' is not an integer: {}", raw[field])))
}

fn time_field(raw: &Value, field: &str) -> Result<DateTime<Utc>, WatchError> {
    let s = raw[field]
        .as_str()
        .ok_or_else(|| WatchError::Decode(format!("block field '{field}' missing or not a string")))?;
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| WatchError::Decode(format!("block field '{field}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_block() -> Value {
        json!({
            "hash": "Mh3b8ff1",
            "height": "12",
            "time": "2019-05-17T12:45:02.152342398Z",
            "num_txs": "2",
            "total_txs": 4031,
            "transactions": [
                { "hash": "Mt01", "type": 1, "data": { "coin": "BIP", "value": "10" } },
                { "hash": "Mt02", "type": 99, "data": {} }
            ],
            "block_reward": "333000000000000000000",
            "size": "1207",
            "proposer": "Mp8f05",
            "validators": [
                { "pub_key": "Mp8f05", "signed": true },
                { "pub_key": "Mp6d11", "signed": false }
            ]
        })
    }

    #[test]
    fn transaction_codes() {
        assert_eq!(transaction_type(1), Some("Send"));
        assert_eq!(transaction_type(7), Some("Delegate"));
        assert_eq!(transaction_type(14), Some("EditCandidate"));
        assert_eq!(transaction_type(0), None);
        assert_eq!(transaction_type(15), None);
    }

    #[test]
    fn event_types() {
        assert_eq!(event_type("minter/RewardEvent"), Some("Reward"));
        assert_eq!(event_type("minter/SlashEvent"), Some("Slash"));
        assert_eq!(event_type("minter/UnbondEvent"), None);
    }

    #[test]
    fn normalizes_header_fields() {
        let block = block_from_json(&raw_block(), &[]).unwrap();
        let info = &block.block_info;
        assert_eq!(info.block_hash, "Mh3b8ff1");
        assert_eq!(info.block_height, 12);
        assert_eq!(info.num_txs, 2);
        assert_eq!(info.total_txs, 4031);
        assert_eq!(info.block_reward, 333_000_000_000_000_000_000);
        assert_eq!(info.size, 1207);
        assert_eq!(info.proposer, "Mp8f05");
        assert_eq!(info.time.timestamp(), 1_558_097_102);
        assert_eq!(info.validators.len(), 2);
        assert!(info.validators[0].signed);
        assert!(!info.validators[1].signed);
    }

    #[test]
    fn transactions_then_events_in_source_order() {
        let events = vec![
            json!({ "type": "minter/RewardEvent", "value": { "role": "Validator", "amount": "5" } }),
            json!({ "type": "minter/UnbondEvent", "value": { "amount": "1" } }),
            json!({ "type": "minter/SlashEvent", "value": { "amount": "2" } }),
        ];
        let block = block_from_json(&raw_block(), &events).unwrap();
        let tags: Vec<_> = block.actions.iter().map(|a| a.action_type.as_deref()).collect();
        assert_eq!(
            tags,
            vec![Some("Send"), None, Some("Reward"), None, Some("Slash")]
        );

        // Transaction payload is the raw object without its type code.
        let send = &block.actions[0].payload;
        assert_eq!(send["hash"], "Mt01");
        assert!(send.get("type").is_none());

        // Event payload is the event value.
        assert_eq!(block.actions[2].payload["role"], "Validator");
    }

    #[test]
    fn missing_transactions_and_validators_are_empty() {
        let raw = json!({
            "hash": "Mh00",
            "height": 1,
            "time": "2019-05-17T12:45:02Z",
            "num_txs": 0,
            "total_txs": 0,
            "block_reward": 0,
            "size": 100,
            "proposer": "Mp00",
            "transactions": null
        });
        let block = block_from_json(&raw, &[]).unwrap();
        assert!(block.actions.is_empty());
        assert!(block.block_info.validators.is_empty());
    }

    #[test]
    fn malformed_height_is_a_decode_error() {
        let mut raw = raw_block();
        raw["height"] = json!("twelve");
        let err = block_from_json(&raw, &[]).unwrap_err();
        assert!(matches!(err, WatchError::Decode(_)));
    }

    #[test]
    fn lenient_numbers() {
        assert_eq!(lenient_u64(&json!(5)), Some(5));
        assert_eq!(lenient_u64(&json!("5")), Some(5));
        assert_eq!(lenient_u64(&json!("-5")), None);
        assert_eq!(lenient_u64(&json!(null)), None);
    }
}
