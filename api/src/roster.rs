//! Restaurant list management: add, edit, remove. Edits carry the `ts` the
//! editor observed when the list modal was opened and are rejected as
//! conflicts once the record has moved past it.

use picker_core::error::Error;
use picker_core::record::{MAX_WEIGHT, Restaurant};

use crate::store::{BookmarkApi, RecordStore, check_conflict};

/// Name constraints the add/edit modals enforce client-side, re-checked
/// here.
pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 30;
pub const WEIGHT_MAX: i64 = MAX_WEIGHT;

#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// Names are unique within a list; the modal shows this as a field
    /// error.
    DuplicateName,
}

#[derive(Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Updated,
    /// The restaurant was removed by another user between open and submit.
    Missing,
}

fn validate_name_and_weight(name: &str, weight: i64) -> Result<(), Error> {
    let length = name.chars().count();
    if !(NAME_MIN..=NAME_MAX).contains(&length) {
        return Err(Error::Validation(format!(
            "name must be {NAME_MIN}-{NAME_MAX} characters"
        )));
    }
    if !(0..=WEIGHT_MAX).contains(&weight) {
        return Err(Error::Validation(format!(
            "weight must be between 0 and {WEIGHT_MAX}"
        )));
    }
    Ok(())
}

pub async fn add_restaurant<B: BookmarkApi>(
    store: &RecordStore<B>,
    conversation: &str,
    name: &str,
    weight: i64,
) -> Result<AddOutcome, Error> {
    validate_name_and_weight(name, weight)?;
    let (mut record, handle) = store.get_or_create(conversation).await?;

    if record.contains_name(name) {
        return Ok(AddOutcome::DuplicateName);
    }

    record.list.push(Restaurant::new(name, weight));
    if !store.update(conversation, &handle, &mut record).await {
        return Err(Error::External {
            context: "record update after add was not committed".to_string(),
        });
    }
    Ok(AddOutcome::Added)
}

/// Applies an edit started when the record's `ts` was `observed_ts`. A
/// record that has advanced past that is a conflict: the caller surfaces it
/// as a field-level error, never retries.
pub async fn edit_restaurant<B: BookmarkApi>(
    store: &RecordStore<B>,
    conversation: &str,
    restaurant_id: &str,
    observed_ts: i64,
    name: &str,
    weight: i64,
) -> Result<EditOutcome, Error> {
    validate_name_and_weight(name, weight)?;
    let (mut record, handle) = store.get_or_create(conversation).await?;

    check_conflict(observed_ts, &record)?;

    let Some(restaurant) = record.find_mut(restaurant_id) else {
        return Ok(EditOutcome::Missing);
    };
    restaurant.name = name.to_string();
    restaurant.weight = Some(weight);

    if !store.update(conversation, &handle, &mut record).await {
        return Err(Error::External {
            context: "record update after edit was not committed".to_string(),
        });
    }
    Ok(EditOutcome::Updated)
}

/// Removes a restaurant; removing one that is already gone is a no-op.
pub async fn remove_restaurant<B: BookmarkApi>(
    store: &RecordStore<B>,
    conversation: &str,
    restaurant_id: &str,
) -> Result<(), Error> {
    let (mut record, handle) = store.get_or_create(conversation).await?;
    if !record.remove(restaurant_id) {
        return Ok(());
    }
    if !store.update(conversation, &handle, &mut record).await {
        return Err(Error::External {
            context: "record update after remove was not committed".to_string(),
        });
    }
    Ok(())
}
