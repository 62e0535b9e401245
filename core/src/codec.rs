//! The state codec: the only module that knows how a `ConversationRecord` is
//! laid out on the wire. The record is serialized to deterministic JSON,
//! base64-encoded (URL-safe, unpadded) and embedded as the `data` query
//! parameter of the conversation's bookmark link. The link prefix up to
//! `data=` doubles as the existence check the store uses to find its
//! bookmark.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::record::{ConversationRecord, MAX_WEIGHT, Restaurant, now_ms};

pub const CONVERSATION_PARAM: &str = "conversation";
pub const DATA_PARAM: &str = "data";

/// Name substituted by `repair` when an entry has lost its own.
const SENTINEL_NAME: &str = "(unnamed restaurant)";

/// A brand-new, empty record for a conversation seen for the first time.
pub fn initialize(conversation_id: &str) -> ConversationRecord {
    ConversationRecord {
        conversation_id: conversation_id.to_string(),
        ts: now_ms(),
        list: Vec::new(),
    }
}

/// Structural validation of a decoded candidate record. A failure here is a
/// recoverable condition (see [`repair`]), never a panic.
pub fn validate(conversation_id: &str, candidate: &Value) -> bool {
    let conversation_ok =
        candidate.get("conversation_id").and_then(Value::as_str) == Some(conversation_id);
    let ts_ok = candidate
        .get("ts")
        .and_then(Value::as_i64)
        .is_some_and(|ts| ts > 0 && ts <= now_ms());
    let list_ok = candidate
        .get("list")
        .and_then(Value::as_array)
        .is_some_and(|list| {
            list.iter().all(|entry| {
                entry.get("id").is_some_and(Value::is_string)
                    && entry.get("name").is_some_and(Value::is_string)
            })
        });
    conversation_ok && ts_ok && list_ok
}

/// Best-effort reconstruction of a record that parsed but failed
/// [`validate`]: keeps `ts` when plausible, regenerates missing ids,
/// substitutes a sentinel name, and drops entries that are not record-shaped.
/// Only input that cannot be interpreted as a record at all is an error.
pub fn repair(conversation_id: &str, candidate: Value) -> Result<ConversationRecord, Error> {
    let Value::Object(candidate) = candidate else {
        return Err(Error::Validation(
            "payload is not record-shaped".to_string(),
        ));
    };

    let ts = candidate
        .get("ts")
        .and_then(Value::as_i64)
        .filter(|ts| *ts > 0 && *ts <= now_ms())
        .unwrap_or_else(now_ms);

    let mut list = Vec::new();
    for entry in candidate
        .get("list")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
    {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        let id = entry
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| SENTINEL_NAME.to_string());
        // Oversized weights are capped into the accepted range; negatives
        // keep their draw-time meaning of weight 1.
        let weight = entry
            .get("weight")
            .and_then(Value::as_i64)
            .map(|w| w.min(MAX_WEIGHT));
        list.push(Restaurant {
            id,
            name,
            weight,
            shown_count: entry.get("shown_count").and_then(Value::as_u64).unwrap_or(0),
            win_count: entry.get("win_count").and_then(Value::as_u64).unwrap_or(0),
        });
    }

    Ok(ConversationRecord {
        conversation_id: conversation_id.to_string(),
        ts,
        list,
    })
}

/// Serializes a record to its transport form. Deterministic: the same record
/// always encodes to the same string.
pub fn encode(record: &ConversationRecord) -> Result<String, Error> {
    let json = serde_json::to_vec(record)
        .map_err(|err| Error::Validation(format!("record failed to serialize: {err}")))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Reverses [`encode`] up to the JSON value; validation and repair are the
/// caller's next step (see [`decode_record`]).
pub fn decode(encoded: &str) -> Result<Value, Error> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|err| Error::Validation(format!("data parameter is not base64: {err}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| Error::Validation(format!("data parameter is not JSON: {err}")))
}

/// Validate → typed decode → (repair if needed) over an already-decoded
/// value. [`validate`] only inspects structure, so a candidate can pass it
/// and still fail the typed decode (e.g. a negative count); that case is
/// repairable too, never an error.
pub fn record_from_value(
    conversation_id: &str,
    candidate: Value,
) -> Result<ConversationRecord, Error> {
    if validate(conversation_id, &candidate) {
        if let Ok(record) = serde_json::from_value(candidate.clone()) {
            return Ok(record);
        }
    }
    repair(conversation_id, candidate)
}

/// Decode → validate → (repair if needed) in one step.
pub fn decode_record(conversation_id: &str, encoded: &str) -> Result<ConversationRecord, Error> {
    record_from_value(conversation_id, decode(encoded)?)
}

/// The full bookmark link for a record.
pub fn record_link(endpoint: &str, record: &ConversationRecord) -> Result<String, Error> {
    Ok(format!(
        "{endpoint}/?{CONVERSATION_PARAM}={}&{DATA_PARAM}={}",
        record.conversation_id,
        encode(record)?
    ))
}

/// The prefix shared by every version of a conversation's bookmark link; the
/// store matches on this to locate its bookmark.
pub fn link_prefix(endpoint: &str, conversation_id: &str) -> String {
    format!("{endpoint}/?{CONVERSATION_PARAM}={conversation_id}&{DATA_PARAM}=")
}

/// Extracts and decodes the record embedded in a bookmark link.
pub fn record_from_link(conversation_id: &str, link: &str) -> Result<ConversationRecord, Error> {
    let url = Url::parse(link)
        .map_err(|err| Error::Validation(format!("bookmark link is not a URL: {err}")))?;
    let encoded = url
        .query_pairs()
        .find(|(key, _)| key == DATA_PARAM)
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| Error::Validation("bookmark link has no data parameter".to_string()))?;
    decode_record(conversation_id, &encoded)
}
