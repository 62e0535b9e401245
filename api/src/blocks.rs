//! Block Kit payload construction. Everything the platform renders —
//! messages, modals, the workflow-step configuration view — is built here as
//! `serde_json` values; no other module hand-writes block JSON.

use picker_core::error::Error;
use picker_core::record::ConversationRecord;
use picker_core::session::PickSession;
use picker_core::tally;
use serde_json::{Value, json};

use crate::sessions::PICK_EVENT_TYPE;

// Interactive component ids. The interaction webhook dispatches on these.
pub const ACTION_VOTE: &str = "pick_restaurant_pick_vote-action";
pub const ACTION_ADD_CHOICE: &str = "pick_restaurant_pick_add_choice-action";
pub const ACTION_END_VOTE: &str = "pick_restaurant_pick_end-action";
pub const ACTION_LIST_OVERFLOW: &str = "pick_restaurant_list-action";

pub const CALLBACK_WORKFLOW: &str = "pick_restaurant";
pub const CALLBACK_NEW: &str = "pick_restaurant-new";
pub const CALLBACK_EDIT: &str = "pick_restaurant-edit";
pub const CALLBACK_LIST: &str = "pick_restaurant-list";
pub const CALLBACK_PICK_END: &str = "pick_restaurant-pick_end";
pub const CALLBACK_PICK_OVERWRITE: &str = "pick_restaurant-pick_overwrite";

pub const BLOCK_NAME: &str = "restaurant_name-block";
pub const ACTION_NAME: &str = "restaurant_name-action";
pub const BLOCK_WEIGHT: &str = "restaurant_weight-block";
pub const ACTION_WEIGHT: &str = "restaurant_weight-action";
pub const BLOCK_CONVERSATION: &str = "conversations_select-block";
pub const ACTION_CONVERSATION: &str = "conversations_select-action";
pub const BLOCK_NUMBER: &str = "number_input-block";
pub const ACTION_NUMBER: &str = "number_input-action";

fn section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": { "type": "mrkdwn", "text": text },
    })
}

fn plain(text: &str) -> Value {
    json!({ "type": "plain_text", "text": text, "emoji": true })
}

pub fn help_text() -> String {
    "Available _*Slash Commands*_:\n\
     *`/restaurant_picker list`*: :ledger: Lists all the added restaurants in a modal\n\
     *`/restaurant_picker new`*: :memo: Opens a modal for adding new restaurants\n\
     *`/restaurant_picker pick <N>`*: :game_die: Picks *N* items _(if exists)_ and let everyone vote _(anonymously)_\n\
     *`/restaurant_picker help`*: :information_source: Shows this message _(just for you :smirk:)_"
        .to_string()
}

pub fn help_block() -> Value {
    section(&help_text())
}

/// The welcome message posted when a conversation is first initialized (or
/// when a pick is attempted against an empty list).
pub fn welcome_message(channel: &str) -> Value {
    let welcome_text = "Welcome to the *Restaurant Picker*!\n\n\
        Looks like you haven't added any restaurant, maybe let's do that first? :wink:\n\n\
        You can then manually initiate the pick or configure a scheduled workflow to \
        automatically run the pick.";
    json!({
        "channel": channel,
        "text": format!("{welcome_text}\n\n{}", help_text()),
        "blocks": [section(welcome_text), help_block()],
    })
}

/// A one-user ephemeral message, optionally with extra blocks.
pub fn ephemeral(channel: &str, user_id: &str, text: &str, extra_blocks: Option<Value>) -> Value {
    let mut blocks = vec![section(text)];
    if let Some(extra) = extra_blocks {
        blocks.push(extra);
    }
    json!({
        "channel": channel,
        "user": user_id,
        "text": text,
        "blocks": blocks,
    })
}

/// The pick message: revealed choices with vote buttons while the vote is
/// open; winner check marks and per-choice counts once ended. The session is
/// carried verbatim as the message metadata.
pub fn pick_message(session: &PickSession) -> Result<Value, Error> {
    let revealed = session.revealed();
    let result = tally::tally(revealed);

    let fallback_text = format!(
        "Pick a restaurant from one of [{}]",
        revealed
            .iter()
            .map(|c| format!("\"{}\"", c.restaurant.name))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut blocks = vec![section("Hey, I have picked these restaurants for you!")];
    if session.is_ended {
        let ender = session
            .ended_by
            .as_deref()
            .map(|user| format!("<@{user}>"))
            .unwrap_or_else(|| "an unknown user".to_string());
        blocks.push(section(&format!(
            "Vote ended by {ender}! There are *{}* votes in total. Check the results below.",
            result.total_votes
        )));
    } else {
        let mut voting = section(&format!(
            "Vote for your restaurant! *Current Votes: {}*\n\
             _Note: Result breakdown will be shown after ending the vote._",
            result.total_votes
        ));
        voting["accessory"] = json!({
            "type": "button",
            "style": "danger",
            "text": plain("End Vote"),
            "action_id": ACTION_END_VOTE,
            "value": "end_vote",
        });
        blocks.push(voting);
    }
    blocks.push(json!({ "type": "divider" }));

    for choice in revealed {
        let is_winner = session.is_ended && result.winners.contains(&choice.restaurant.id);
        let mut entry = json!({
            "block_id": format!("restaurant_{}-block", choice.restaurant.id),
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!(
                    "{}:knife_fork_plate: *{}*",
                    if is_winner { ":white_check_mark: " } else { "" },
                    choice.restaurant.name
                ),
            },
        });
        if !session.is_ended {
            entry["accessory"] = json!({
                "type": "button",
                "style": "primary",
                "text": plain("Vote"),
                "action_id": ACTION_VOTE,
                "value": choice.restaurant.id,
            });
        }
        blocks.push(entry);
        if session.is_ended {
            blocks.push(json!({
                "block_id": format!("votes_{}-block", choice.restaurant.id),
                "type": "context",
                "elements": [plain(&format!("Vote: {}", choice.votes.len()))],
            }));
        }
    }
    blocks.push(json!({ "type": "divider" }));

    if !session.is_ended {
        blocks.push(json!({
            "type": "actions",
            "elements": [{
                "type": "button",
                "text": plain("Add 1 more choice :see_no_evil:"),
                "action_id": ACTION_ADD_CHOICE,
                "value": "add_choice",
            }],
        }));
    }

    let event_payload = serde_json::to_value(session)
        .map_err(|err| Error::Validation(format!("session failed to serialize: {err}")))?;
    Ok(json!({
        "channel": session.conversation,
        "metadata": {
            "event_type": PICK_EVENT_TYPE,
            "event_payload": event_payload,
        },
        "text": fallback_text,
        "blocks": blocks,
    }))
}

/// The restaurant-list modal, ranked like the results page, with an overflow
/// menu (edit / remove behind a confirmation) per entry.
pub fn list_modal(conversation: &str, record: &ConversationRecord) -> Value {
    let mut blocks = Vec::new();
    for restaurant in record.ranked() {
        blocks.push(json!({
            "block_id": restaurant.id,
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!(":knife_fork_plate: *{}*", restaurant.name),
            },
            "accessory": {
                "type": "overflow",
                "action_id": ACTION_LIST_OVERFLOW,
                "confirm": {
                    "title": plain("Are you sure?"),
                    "text": {
                        "type": "plain_text",
                        "text": format!(
                            "You are going to edit/remove *{}*!\nPlease confirm the action.",
                            restaurant.name
                        ),
                        "emoji": true,
                    },
                    "confirm": plain("Continue"),
                    "deny": plain("Cancel"),
                    "style": "danger",
                },
                "options": [
                    { "text": plain(":pencil2:    Edit"), "value": "edit" },
                    { "text": plain(":x:    Remove"), "value": "remove" },
                ],
            },
        }));
        blocks.push(json!({
            "block_id": format!("context_{}", restaurant.id),
            "type": "context",
            "elements": [
                { "type": "mrkdwn", "text": format!(":anchor: Weight: *{}*", restaurant.effective_weight()) },
                { "type": "mrkdwn", "text": format!(":bulb: Shown Count: *{}*", restaurant.shown_count) },
                { "type": "mrkdwn", "text": format!(":100: Win Rate: *{}%*", restaurant.win_rate_percent()) },
            ],
        }));
    }

    json!({
        "type": "modal",
        "callback_id": CALLBACK_LIST,
        "title": plain("Restaurant List"),
        "close": plain("Close"),
        "submit": plain("Done"),
        "private_metadata": json!({ "conversation": conversation }).to_string(),
        "blocks": blocks,
    })
}

/// The add-restaurant modal: 2–30 character name, 0–99 integer weight.
pub fn add_modal(conversation: &str) -> Value {
    json!({
        "type": "modal",
        "callback_id": CALLBACK_NEW,
        "title": plain("Add New Restaurant"),
        "close": plain("Cancel"),
        "submit": plain("Save"),
        "private_metadata": json!({ "conversation": conversation }).to_string(),
        "blocks": [
            {
                "block_id": BLOCK_NAME,
                "type": "input",
                "element": {
                    "type": "plain_text_input",
                    "action_id": ACTION_NAME,
                    "placeholder": plain("Name of Restaurant"),
                    "min_length": 2,
                    "max_length": 30,
                    "focus_on_load": true,
                },
                "label": plain("Name"),
            },
            {
                "block_id": BLOCK_WEIGHT,
                "type": "input",
                "element": {
                    "type": "number_input",
                    "action_id": ACTION_WEIGHT,
                    "is_decimal_allowed": false,
                    "placeholder": plain("Weight (0 [disabled] - 99)"),
                    "initial_value": "50",
                    "min_value": "0",
                    "max_value": "99",
                },
                "label": plain("Weight"),
            },
        ],
    })
}

/// The edit modal, pushed from the list modal. Its private metadata carries
/// the `ts` the editor observed, which the submission re-checks for
/// conflicts.
pub fn edit_modal(
    conversation: &str,
    list_view_id: &str,
    observed_ts: i64,
    restaurant_id: &str,
    name: &str,
    weight: u64,
) -> Value {
    json!({
        "type": "modal",
        "callback_id": CALLBACK_EDIT,
        "title": plain("Edit Restaurant"),
        "close": plain("Cancel"),
        "submit": plain("Save"),
        "private_metadata": json!({
            "conversation": conversation,
            "list_view": list_view_id,
            "data_ts": observed_ts,
            "restaurant_id": restaurant_id,
        }).to_string(),
        "blocks": [
            {
                "block_id": BLOCK_NAME,
                "type": "input",
                "element": {
                    "type": "plain_text_input",
                    "action_id": ACTION_NAME,
                    "placeholder": plain("Name of Restaurant"),
                    "initial_value": name,
                    "min_length": 2,
                    "max_length": 30,
                },
                "label": plain("Name"),
            },
            {
                "block_id": BLOCK_WEIGHT,
                "type": "input",
                "element": {
                    "type": "number_input",
                    "action_id": ACTION_WEIGHT,
                    "is_decimal_allowed": false,
                    "placeholder": plain("Weight (0 [disabled] - 99)"),
                    "initial_value": weight.to_string(),
                    "min_value": "0",
                    "max_value": "99",
                    "focus_on_load": true,
                },
                "label": plain("Weight"),
            },
        ],
    })
}

/// Confirmation before ending a vote; carries everything the submission
/// needs to find the session again.
pub fn end_confirm_modal(conversation: &str, message_ts: &str, user_id: &str) -> Value {
    json!({
        "type": "modal",
        "callback_id": CALLBACK_PICK_END,
        "title": plain("End Vote"),
        "close": plain("No"),
        "submit": plain("Yes"),
        "private_metadata": json!({
            "conversation": conversation,
            "message_ts": message_ts,
            "user_id": user_id,
        }).to_string(),
        "blocks": [section(
            "Are you sure you want to end the vote now?\n\n*This action is irreversible!*"
        )],
    })
}

/// Confirmation before overwriting an existing vote.
pub fn overwrite_confirm_modal(
    conversation: &str,
    message_ts: &str,
    user_id: &str,
    restaurant_id: &str,
) -> Value {
    json!({
        "type": "modal",
        "callback_id": CALLBACK_PICK_OVERWRITE,
        "title": plain("Duplicated Vote"),
        "close": plain("No"),
        "submit": plain("Yes"),
        "private_metadata": json!({
            "conversation": conversation,
            "message_ts": message_ts,
            "user_id": user_id,
            "restaurant_id": restaurant_id,
        }).to_string(),
        "blocks": [section(
            "*You have already voted!*\n\nDo you want to *overwrite* your previous vote?"
        )],
    })
}

/// The workflow-step configuration view: destination conversation plus the
/// number of choices to pick.
pub fn workflow_config_view(
    callback_id: &str,
    initial_conversation: Option<&str>,
    initial_number: Option<i64>,
) -> Value {
    let mut select = json!({
        "type": "conversations_select",
        "action_id": ACTION_CONVERSATION,
        "filter": {
            "include": ["public", "private"],
            "exclude_external_shared_channels": true,
            "exclude_bot_users": true,
        },
        "placeholder": plain("Select a channel"),
        "focus_on_load": true,
    });
    if let Some(conversation) = initial_conversation {
        select["initial_conversation"] = json!(conversation);
    }

    json!({
        "type": "workflow_step",
        "callback_id": callback_id,
        "submit_disabled": false,
        "blocks": [
            {
                "block_id": BLOCK_CONVERSATION,
                "type": "input",
                "element": select,
                "label": plain("Message Destination"),
            },
            section("> :exclamation: For *private* channels, please first integrate this app."),
            {
                "block_id": BLOCK_NUMBER,
                "type": "input",
                "element": {
                    "type": "number_input",
                    "action_id": ACTION_NUMBER,
                    "is_decimal_allowed": false,
                    "placeholder": plain("Enter a number between 1-9"),
                    "min_value": "1",
                    "max_value": "9",
                    "focus_on_load": false,
                    "initial_value": initial_number.unwrap_or(1).to_string(),
                },
                "label": plain("Number of Choices To Pick"),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use picker_core::codec;
    use picker_core::record::Restaurant;
    use picker_core::session::PickSession;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn sample_session(ended: bool) -> PickSession {
        let mut record = codec::initialize("C1");
        record.list.push(Restaurant::new("Ramen-ya", 10));
        record.list.push(Restaurant::new("Bistro", 5));
        let mut rng = StdRng::seed_from_u64(21);
        let mut session = PickSession::start(&mut rng, &record, 2);
        if ended {
            session.end("u1");
        }
        session
    }

    #[test]
    fn open_pick_message_has_vote_buttons_and_metadata() {
        let session = sample_session(false);
        let payload = pick_message(&session).expect("payload builds");

        assert_eq!(payload["channel"], "C1");
        assert_eq!(payload["metadata"]["event_type"], PICK_EVENT_TYPE);
        let blocks = payload["blocks"].as_array().expect("blocks");
        let rendered = serde_json::to_string(&blocks).expect("serializes");
        assert!(rendered.contains(ACTION_VOTE));
        assert!(rendered.contains(ACTION_ADD_CHOICE));
        assert!(rendered.contains(ACTION_END_VOTE));

        let restored: PickSession =
            serde_json::from_value(payload["metadata"]["event_payload"].clone())
                .expect("metadata restores");
        assert_eq!(restored, session);
    }

    #[test]
    fn ended_pick_message_shows_counts_and_no_buttons() {
        let session = sample_session(true);
        let payload = pick_message(&session).expect("payload builds");
        let rendered = serde_json::to_string(&payload["blocks"]).expect("serializes");
        assert!(!rendered.contains(ACTION_VOTE));
        assert!(!rendered.contains(ACTION_ADD_CHOICE));
        assert!(rendered.contains("Vote: 0"));
        // Zero votes everywhere: every revealed choice is a winner.
        assert_eq!(rendered.matches(":white_check_mark:").count(), 2);
    }

    #[test]
    fn list_modal_ranks_and_carries_conversation() {
        let mut record = codec::initialize("C1");
        record.list.push(Restaurant::new("Low", 1));
        let mut winner = Restaurant::new("High", 1);
        winner.win_count = 3;
        winner.shown_count = 3;
        record.list.push(winner);

        let modal = list_modal("C1", &record);
        assert_eq!(modal["callback_id"], CALLBACK_LIST);
        let blocks = modal["blocks"].as_array().expect("blocks");
        assert!(
            blocks[0]["text"]["text"]
                .as_str()
                .expect("text")
                .contains("High")
        );
        let pm: Value =
            serde_json::from_str(modal["private_metadata"].as_str().expect("pm")).expect("json");
        assert_eq!(pm["conversation"], "C1");
    }

    #[test]
    fn edit_modal_carries_the_observed_ts() {
        let modal = edit_modal("C1", "V1", 1234, "r1", "Ramen-ya", 30);
        let pm: Value =
            serde_json::from_str(modal["private_metadata"].as_str().expect("pm")).expect("json");
        assert_eq!(pm["data_ts"], 1234);
        assert_eq!(pm["restaurant_id"], "r1");
        assert_eq!(pm["list_view"], "V1");
    }
}
