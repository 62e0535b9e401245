//! The interactivity webhook. The platform posts a form with a single
//! `payload` field holding a JSON document tagged by `type`; everything
//! interactive — vote buttons, modal submissions, the workflow-step editor —
//! arrives here and is dispatched on `action_id` / `callback_id`.

use axum::Router;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Form;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{AppError, view_errors};
use crate::roster::{AddOutcome, EditOutcome};
use crate::state::AppState;
use crate::{blocks, picks, roster};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/interact", post(handle_interaction))
}

#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionPayload {
    BlockActions(BlockActions),
    ViewSubmission(ViewSubmission),
    WorkflowStepEdit(WorkflowStepEdit),
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct BlockActions {
    pub user: Identified,
    #[serde(default)]
    pub trigger_id: String,
    #[serde(default)]
    pub channel: Option<Identified>,
    #[serde(default)]
    pub message: Option<MessageRef>,
    #[serde(default)]
    pub view: Option<ViewRef>,
    pub actions: Vec<BlockAction>,
}

#[derive(Debug, Deserialize)]
pub struct Identified {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageRef {
    pub ts: String,
}

#[derive(Debug, Deserialize)]
pub struct ViewRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub callback_id: String,
    #[serde(default)]
    pub private_metadata: String,
    #[serde(default)]
    pub state: Value,
}

#[derive(Debug, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub block_id: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub selected_option: Option<SelectedOption>,
}

#[derive(Debug, Deserialize)]
pub struct SelectedOption {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ViewSubmission {
    pub view: ViewRef,
    #[serde(default)]
    pub workflow_step: Option<WorkflowStepRef>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowStepRef {
    #[serde(default)]
    pub workflow_step_edit_id: String,
    #[serde(default)]
    pub inputs: Value,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowStepEdit {
    pub trigger_id: String,
    pub callback_id: String,
    #[serde(default)]
    pub workflow_step: Option<WorkflowStepRef>,
}

pub async fn handle_interaction(
    State(state): State<AppState>,
    Form(form): Form<InteractionForm>,
) -> Result<Response, AppError> {
    let payload: InteractionPayload =
        serde_json::from_str(&form.payload).map_err(|err| AppError::Validation {
            message: format!("interaction payload is not valid JSON: {err}"),
        })?;

    match payload {
        InteractionPayload::BlockActions(actions) => handle_block_actions(state, actions).await,
        InteractionPayload::ViewSubmission(submission) => {
            handle_view_submission(state, submission).await
        }
        InteractionPayload::WorkflowStepEdit(edit) => handle_workflow_edit(state, edit).await,
        InteractionPayload::Unknown => Err(AppError::Validation {
            message: "unknown interaction payload type".to_string(),
        }),
    }
}

fn missing(what: &str) -> AppError {
    AppError::Validation {
        message: format!("interaction payload is missing {what}"),
    }
}

async fn handle_block_actions(state: AppState, payload: BlockActions) -> Result<Response, AppError> {
    let action = payload.actions.first().ok_or_else(|| missing("actions"))?;
    let user_id = &payload.user.id;
    tracing::info!(user = user_id, action = action.action_id, "block action received");

    match action.action_id.as_str() {
        blocks::ACTION_VOTE => {
            let channel = payload.channel.as_ref().ok_or_else(|| missing("channel"))?;
            let message = payload.message.as_ref().ok_or_else(|| missing("message"))?;
            let restaurant_id = action.value.as_deref().ok_or_else(|| missing("value"))?;

            let outcome = picks::cast_vote(
                &state.session_store(),
                &channel.id,
                &message.ts,
                user_id,
                restaurant_id,
                false,
            )
            .await?;
            if outcome == picks::VoteAction::NeedsConfirmation {
                state
                    .slack
                    .views_open(
                        &payload.trigger_id,
                        blocks::overwrite_confirm_modal(
                            &channel.id,
                            &message.ts,
                            user_id,
                            restaurant_id,
                        ),
                    )
                    .await?;
            }
            Ok(().into_response())
        }
        blocks::ACTION_ADD_CHOICE => {
            let channel = payload.channel.as_ref().ok_or_else(|| missing("channel"))?;
            let message = payload.message.as_ref().ok_or_else(|| missing("message"))?;
            picks::add_choice(
                &state.record_store(),
                &state.session_store(),
                &channel.id,
                &message.ts,
                user_id,
            )
            .await?;
            Ok(().into_response())
        }
        blocks::ACTION_END_VOTE => {
            let channel = payload.channel.as_ref().ok_or_else(|| missing("channel"))?;
            let message = payload.message.as_ref().ok_or_else(|| missing("message"))?;
            state
                .slack
                .views_open(
                    &payload.trigger_id,
                    blocks::end_confirm_modal(&channel.id, &message.ts, user_id),
                )
                .await?;
            Ok(().into_response())
        }
        blocks::ACTION_LIST_OVERFLOW => {
            let view = payload.view.as_ref().ok_or_else(|| missing("view"))?;
            let metadata = parse_private_metadata(view)?;
            let conversation = metadata_str(&metadata, "conversation")?;
            let restaurant_id = &action.block_id;
            let choice = action
                .selected_option
                .as_ref()
                .ok_or_else(|| missing("selected_option"))?;

            let store = state.record_store();
            match choice.value.as_str() {
                "edit" => {
                    let (record, _) = store.get_or_create(&conversation).await?;
                    let restaurant = record
                        .find(restaurant_id)
                        .ok_or_else(|| AppError::NotFound {
                            message: "restaurant not found in list".to_string(),
                        })?;
                    state
                        .slack
                        .views_push(
                            &payload.trigger_id,
                            blocks::edit_modal(
                                &conversation,
                                &view.id,
                                record.ts,
                                restaurant_id,
                                &restaurant.name,
                                restaurant.effective_weight(),
                            ),
                        )
                        .await?;
                }
                "remove" => {
                    roster::remove_restaurant(&store, &conversation, restaurant_id).await?;
                    let (record, _) = store.get_or_create(&conversation).await?;
                    state
                        .slack
                        .views_update(&view.id, blocks::list_modal(&conversation, &record))
                        .await?;
                }
                other => {
                    return Err(AppError::Validation {
                        message: format!("unknown overflow option `{other}`"),
                    });
                }
            }
            Ok(().into_response())
        }
        other => Err(AppError::Validation {
            message: format!("unknown action id `{other}`"),
        }),
    }
}

async fn handle_view_submission(
    state: AppState,
    payload: ViewSubmission,
) -> Result<Response, AppError> {
    let view = &payload.view;
    tracing::info!(callback_id = view.callback_id, "view submission received");

    match view.callback_id.as_str() {
        blocks::CALLBACK_NEW => {
            let metadata = parse_private_metadata(view)?;
            let conversation = metadata_str(&metadata, "conversation")?;
            let Some(name) = input_str(view, blocks::BLOCK_NAME, blocks::ACTION_NAME) else {
                return Ok(view_errors(blocks::BLOCK_NAME, "Name is invalid!"));
            };
            let Some(weight) = input_int(view, blocks::BLOCK_WEIGHT, blocks::ACTION_WEIGHT) else {
                return Ok(view_errors(
                    blocks::BLOCK_WEIGHT,
                    "Please enter a positive integer!",
                ));
            };

            let store = state.record_store();
            match roster::add_restaurant(&store, &conversation, &name, weight).await {
                Ok(AddOutcome::Added) => Ok(().into_response()),
                Ok(AddOutcome::DuplicateName) => Ok(view_errors(
                    blocks::BLOCK_NAME,
                    "This restaurant has been added!",
                )),
                Err(err) => Ok(roster_error_to_view(err)?),
            }
        }
        blocks::CALLBACK_EDIT => {
            let metadata = parse_private_metadata(view)?;
            let conversation = metadata_str(&metadata, "conversation")?;
            let list_view = metadata_str(&metadata, "list_view")?;
            let restaurant_id = metadata_str(&metadata, "restaurant_id")?;
            let observed_ts = metadata
                .get("data_ts")
                .and_then(Value::as_i64)
                .ok_or_else(|| missing("data_ts"))?;
            let Some(name) = input_str(view, blocks::BLOCK_NAME, blocks::ACTION_NAME) else {
                return Ok(view_errors(blocks::BLOCK_NAME, "Name is invalid!"));
            };
            let Some(weight) = input_int(view, blocks::BLOCK_WEIGHT, blocks::ACTION_WEIGHT) else {
                return Ok(view_errors(
                    blocks::BLOCK_WEIGHT,
                    "Please enter a positive integer!",
                ));
            };

            let store = state.record_store();
            match roster::edit_restaurant(
                &store,
                &conversation,
                &restaurant_id,
                observed_ts,
                &name,
                weight,
            )
            .await
            {
                Ok(EditOutcome::Updated) => {
                    let (record, _) = store.get_or_create(&conversation).await?;
                    state
                        .slack
                        .views_update(&list_view, blocks::list_modal(&conversation, &record))
                        .await?;
                    Ok(().into_response())
                }
                Ok(EditOutcome::Missing) => Ok(view_errors(
                    blocks::BLOCK_NAME,
                    "This restaurant has been removed by another user!",
                )),
                Err(picker_core::Error::Conflict { .. }) => Ok(view_errors(
                    blocks::BLOCK_NAME,
                    "Data has been modified by another user!",
                )),
                Err(err) => Ok(roster_error_to_view(err)?),
            }
        }
        blocks::CALLBACK_LIST => Ok(().into_response()),
        blocks::CALLBACK_PICK_END => {
            let metadata = parse_private_metadata(view)?;
            let conversation = metadata_str(&metadata, "conversation")?;
            let message_ts = metadata_str(&metadata, "message_ts")?;
            let user_id = metadata_str(&metadata, "user_id")?;
            picks::end_pick(
                &state.record_store(),
                &state.session_store(),
                &conversation,
                &message_ts,
                &user_id,
            )
            .await?;
            Ok(().into_response())
        }
        blocks::CALLBACK_PICK_OVERWRITE => {
            let metadata = parse_private_metadata(view)?;
            let conversation = metadata_str(&metadata, "conversation")?;
            let message_ts = metadata_str(&metadata, "message_ts")?;
            let user_id = metadata_str(&metadata, "user_id")?;
            let restaurant_id = metadata_str(&metadata, "restaurant_id")?;
            picks::cast_vote(
                &state.session_store(),
                &conversation,
                &message_ts,
                &user_id,
                &restaurant_id,
                true,
            )
            .await?;
            Ok(().into_response())
        }
        blocks::CALLBACK_WORKFLOW => {
            let step = payload
                .workflow_step
                .as_ref()
                .ok_or_else(|| missing("workflow_step"))?;
            let selected = view
                .state
                .pointer(&format!(
                    "/values/{}/{}/selected_conversation",
                    blocks::BLOCK_CONVERSATION,
                    blocks::ACTION_CONVERSATION
                ))
                .and_then(Value::as_str);
            let Some(conversation) = selected else {
                return Ok(view_errors(
                    blocks::BLOCK_CONVERSATION,
                    "Please select a channel!",
                ));
            };
            let Some(number_of_choices) =
                input_int(view, blocks::BLOCK_NUMBER, blocks::ACTION_NUMBER)
                    .filter(|n| *n > 0)
            else {
                return Ok(view_errors(
                    blocks::BLOCK_NUMBER,
                    "Please enter a positive integer!",
                ));
            };

            state
                .slack
                .workflows_update_step(
                    &step.workflow_step_edit_id,
                    json!({
                        "selected_conversation": {
                            "type": "plain_text",
                            "value": conversation,
                        },
                        "number_of_choices": {
                            "type": "number",
                            "value": number_of_choices,
                        },
                    }),
                )
                .await?;
            Ok(().into_response())
        }
        other => Err(AppError::Validation {
            message: format!("unknown view callback id `{other}`"),
        }),
    }
}

async fn handle_workflow_edit(
    state: AppState,
    payload: WorkflowStepEdit,
) -> Result<Response, AppError> {
    let inputs = payload
        .workflow_step
        .as_ref()
        .map(|step| &step.inputs);
    let initial_conversation = inputs
        .and_then(|i| i.pointer("/selected_conversation/value"))
        .and_then(Value::as_str);
    let initial_number = inputs
        .and_then(|i| i.pointer("/number_of_choices/value"))
        .and_then(Value::as_i64);

    state
        .slack
        .views_open(
            &payload.trigger_id,
            blocks::workflow_config_view(&payload.callback_id, initial_conversation, initial_number),
        )
        .await?;
    Ok(().into_response())
}

/// Field-level view errors stay 200; everything else propagates normally.
fn roster_error_to_view(err: picker_core::Error) -> Result<Response, AppError> {
    match err {
        picker_core::Error::Validation(message) => {
            let block = if message.starts_with("weight") {
                blocks::BLOCK_WEIGHT
            } else {
                blocks::BLOCK_NAME
            };
            Ok(view_errors(block, &message))
        }
        other => Err(other.into()),
    }
}

fn parse_private_metadata(view: &ViewRef) -> Result<Value, AppError> {
    serde_json::from_str(&view.private_metadata).map_err(|err| AppError::Validation {
        message: format!("view private metadata is not valid JSON: {err}"),
    })
}

fn metadata_str(metadata: &Value, key: &str) -> Result<String, AppError> {
    metadata
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing(key))
}

/// Text input value from `view.state.values[block][action].value`.
fn input_str(view: &ViewRef, block: &str, action: &str) -> Option<String> {
    view.state
        .pointer(&format!("/values/{block}/{action}/value"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Number inputs arrive as strings; parse them into an integer.
fn input_int(view: &ViewRef, block: &str, action: &str) -> Option<i64> {
    input_str(view, block, action)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payloads_parse_by_type_tag() {
        let vote = json!({
            "type": "block_actions",
            "user": { "id": "U1" },
            "trigger_id": "T1",
            "channel": { "id": "C1" },
            "message": { "ts": "1700000000.000001" },
            "actions": [{ "action_id": blocks::ACTION_VOTE, "value": "r1" }],
        });
        let parsed: InteractionPayload = serde_json::from_value(vote).expect("parses");
        let InteractionPayload::BlockActions(actions) = parsed else {
            panic!("expected block actions");
        };
        assert_eq!(actions.actions[0].value.as_deref(), Some("r1"));

        let unknown: InteractionPayload =
            serde_json::from_value(json!({ "type": "shortcut" })).expect("parses");
        assert!(matches!(unknown, InteractionPayload::Unknown));
    }

    #[test]
    fn view_state_inputs_are_extracted() {
        let view = ViewRef {
            id: "V1".to_string(),
            callback_id: blocks::CALLBACK_NEW.to_string(),
            private_metadata: json!({ "conversation": "C1" }).to_string(),
            state: json!({
                "values": {
                    blocks::BLOCK_NAME: {
                        blocks::ACTION_NAME: { "type": "plain_text_input", "value": "Ramen-ya" },
                    },
                    blocks::BLOCK_WEIGHT: {
                        blocks::ACTION_WEIGHT: { "type": "number_input", "value": "50" },
                    },
                },
            }),
        };
        assert_eq!(
            input_str(&view, blocks::BLOCK_NAME, blocks::ACTION_NAME).as_deref(),
            Some("Ramen-ya")
        );
        assert_eq!(
            input_int(&view, blocks::BLOCK_WEIGHT, blocks::ACTION_WEIGHT),
            Some(50)
        );
        let metadata = parse_private_metadata(&view).expect("metadata parses");
        assert_eq!(metadata_str(&metadata, "conversation").expect("key"), "C1");
    }
}
