//! The slash-command webhook. Subcommands: `help`, `list`, `new`,
//! `pick <N>`. Anything else gets the usage text back, visible only to the
//! caller.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::state::AppState;
use crate::{blocks, picks};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/command", post(handle_command))
}

#[derive(Debug, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub text: String,
    pub trigger_id: String,
    pub channel_id: String,
    pub user_id: String,
}

/// In-band ephemeral reply to the slash command itself.
fn ephemeral_reply(text: &str) -> Response {
    Json(json!({
        "response_type": "ephemeral",
        "text": text,
        "blocks": [blocks::help_block()],
    }))
    .into_response()
}

pub async fn handle_command(
    State(state): State<AppState>,
    Form(command): Form<SlashCommand>,
) -> Result<Response, AppError> {
    let mut words = command.text.split_whitespace();
    let subcommand = words.next().unwrap_or("help").to_lowercase();
    tracing::info!(
        channel = command.channel_id,
        user = command.user_id,
        subcommand,
        "slash command received"
    );

    match subcommand.as_str() {
        "help" => Ok(ephemeral_reply(&blocks::help_text())),
        "list" => {
            let store = state.record_store();
            let (record, _) = store.get_or_create(&command.channel_id).await?;
            state
                .slack
                .views_open(
                    &command.trigger_id,
                    blocks::list_modal(&command.channel_id, &record),
                )
                .await?;
            Ok(().into_response())
        }
        "new" => {
            state
                .slack
                .views_open(&command.trigger_id, blocks::add_modal(&command.channel_id))
                .await?;
            Ok(().into_response())
        }
        "pick" => {
            let number_of_choices = match words.next() {
                None => 1,
                Some(raw) => match raw.parse::<usize>() {
                    Ok(n) if n >= 1 => n,
                    _ => {
                        return Ok(ephemeral_reply(
                            "The number of choices must be a positive integer.",
                        ));
                    }
                },
            };
            picks::start_pick(
                &state.record_store(),
                &state.session_store(),
                &command.channel_id,
                number_of_choices,
            )
            .await?;
            Ok(().into_response())
        }
        unknown => {
            tracing::debug!(unknown, "unknown subcommand");
            Ok(ephemeral_reply(&format!(
                "Unknown command `{unknown}`. Here is what I can do:"
            )))
        }
    }
}
