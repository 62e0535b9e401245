//! The event-callback webhook: the URL-verification handshake and the
//! scheduled `workflow_step_execute` event. Workflow execution runs detached
//! so the webhook can acknowledge within the platform's deadline; the
//! outcome is reported back through `workflows.stepCompleted` /
//! `workflows.stepFailed`.

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::blocks;
use crate::error::AppError;
use crate::picks;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/event", post(handle_event))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event: Value,
    },
    #[serde(other)]
    Unknown,
}

pub async fn handle_event(
    State(state): State<AppState>,
    Json(envelope): Json<EventEnvelope>,
) -> Result<Response, AppError> {
    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            Ok(Json(json!({ "challenge": challenge })).into_response())
        }
        EventEnvelope::EventCallback { event } => {
            let event_type = event.get("type").and_then(Value::as_str);
            let callback_id = event.get("callback_id").and_then(Value::as_str);
            if event_type == Some("workflow_step_execute")
                && callback_id == Some(blocks::CALLBACK_WORKFLOW)
            {
                tokio::spawn(execute_workflow_step(state, event));
            } else {
                tracing::debug!(?event_type, ?callback_id, "ignoring event callback");
            }
            Ok(().into_response())
        }
        EventEnvelope::Unknown => Err(AppError::Validation {
            message: "unknown event envelope type".to_string(),
        }),
    }
}

/// Runs the configured pick and reports the step outcome. Every failure path
/// ends in `workflows.stepFailed` so the workflow does not hang.
async fn execute_workflow_step(state: AppState, event: Value) {
    let Some(execute_id) = event
        .pointer("/workflow_step/workflow_step_execute_id")
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        tracing::error!("workflow_step_execute event has no execute id");
        return;
    };

    let result = run_configured_pick(&state, &event).await;
    let report = match result {
        Ok(()) => state.slack.workflows_step_completed(&execute_id).await,
        Err(message) => {
            tracing::error!(execute_id, "workflow pick failed: {message}");
            state
                .slack
                .workflows_step_failed(&execute_id, &message)
                .await
        }
    };
    if let Err(err) = report {
        tracing::error!(execute_id, "failed reporting workflow step outcome: {err}");
    }
}

async fn run_configured_pick(state: &AppState, event: &Value) -> Result<(), String> {
    let conversation = event
        .pointer("/workflow_step/inputs/selected_conversation/value")
        .and_then(Value::as_str)
        .ok_or("No conversation is selected, please reconfigure the workflow step.")?;
    let number_of_choices = event
        .pointer("/workflow_step/inputs/number_of_choices/value")
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .ok_or("Missing number of choices, please reconfigure the workflow step.")?;

    picks::start_pick(
        &state.record_store(),
        &state.session_store(),
        conversation,
        number_of_choices as usize,
    )
    .await
    .map(|_| ())
    .map_err(|err| err.to_string())
}
