use std::cmp::Reverse;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Current time as epoch milliseconds. All `ts` fields in the picker use this
/// resolution; the optimistic concurrency check compares these values.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Largest weight the add/edit modals accept. Also the cap the sampler
/// relies on: with every effective weight at most this, a cumulative sum
/// over any realistic list cannot overflow.
pub const MAX_WEIGHT: i64 = 99;

/// One entry in a conversation's restaurant list.
///
/// `weight` is lenient on purpose: the record travels through an external
/// bookmark URL and may come back with a missing or garbage weight. A
/// non-numeric or negative weight acts as weight 1 at draw time; weight 0 is
/// a valid, deliberately zero-probability weight, not an exclusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient_int")]
    pub weight: Option<i64>,
    #[serde(default)]
    pub shown_count: u64,
    #[serde(default)]
    pub win_count: u64,
}

impl Restaurant {
    pub fn new(name: impl Into<String>, weight: i64) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            weight: Some(weight),
            shown_count: 0,
            win_count: 0,
        }
    }

    /// The weight the sampler actually uses: non-numeric or negative → 1,
    /// anything above [`MAX_WEIGHT`] capped there.
    pub fn effective_weight(&self) -> u64 {
        match self.weight {
            Some(w) if w >= 0 => (w as u64).min(MAX_WEIGHT as u64),
            _ => 1,
        }
    }

    /// Win rate in whole percent, 0 when never shown.
    pub fn win_rate_percent(&self) -> u64 {
        if self.shown_count == 0 {
            0
        } else {
            (self.win_count * 100 + self.shown_count / 2) / self.shown_count
        }
    }
}

/// Accepts any JSON value where an integer is expected: integers pass
/// through, floats are floored, everything else becomes `None`.
fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        _ => None,
    })
}

/// The durable per-conversation record, serialized into a bookmark URL.
///
/// `conversation_id` is immutable once set. `ts` is the last-write time and
/// must never move backwards past a value a writer has observed; it is the
/// only concurrency control in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub ts: i64,
    pub list: Vec<Restaurant>,
}

impl ConversationRecord {
    pub fn find(&self, restaurant_id: &str) -> Option<&Restaurant> {
        self.list.iter().find(|r| r.id == restaurant_id)
    }

    pub fn find_mut(&mut self, restaurant_id: &str) -> Option<&mut Restaurant> {
        self.list.iter_mut().find(|r| r.id == restaurant_id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.list.iter().any(|r| r.name == name)
    }

    /// Removes the restaurant with the given id. Returns false when it was
    /// already gone (a no-op, not an error).
    pub fn remove(&mut self, restaurant_id: &str) -> bool {
        let before = self.list.len();
        self.list.retain(|r| r.id != restaurant_id);
        self.list.len() != before
    }

    /// The display order of the results view and the list modal: win count
    /// descending, then shown count ascending, then weight descending.
    pub fn ranked(&self) -> Vec<&Restaurant> {
        let mut entries: Vec<&Restaurant> = self.list.iter().collect();
        entries.sort_by_key(|r| {
            (
                Reverse(r.win_count),
                r.shown_count,
                Reverse(r.effective_weight()),
            )
        });
        entries
    }
}
