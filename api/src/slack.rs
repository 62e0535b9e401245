//! Thin client for the platform Web API. Every call resolves to either an
//! ok envelope or a [`picker_core::Error::External`]; failed calls log the
//! response body. Nothing here retries.

use picker_core::Error;
use serde_json::{Value, json};

use crate::config::AppConfig;
use crate::sessions::MessageApi;
use crate::store::{Bookmark, BookmarkApi};

#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    token: String,
    api_root: String,
}

impl SlackClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: config.bot_token.clone(),
            api_root: config.api_root.clone(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, Error> {
        let url = format!("{}{}", self.api_root, path);
        tracing::debug!(%url, "platform api call");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|err| Error::External {
                context: format!("{path}: {err}"),
            })?;
        self.check_envelope(path, response).await
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, Error> {
        let url = format!("{}{}", self.api_root, path);
        tracing::debug!(%url, "platform api call");
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|err| Error::External {
                context: format!("{path}: {err}"),
            })?;
        self.check_envelope(path, response).await
    }

    async fn check_envelope(
        &self,
        path: &str,
        response: reqwest::Response,
    ) -> Result<Value, Error> {
        let status = response.status();
        let data: Value = response.json().await.map_err(|err| Error::External {
            context: format!("{path}: unreadable response: {err}"),
        })?;
        if !status.is_success() || data.get("ok").and_then(Value::as_bool) != Some(true) {
            tracing::error!(path, %status, body = %data, "platform api call failed");
            return Err(Error::External {
                context: format!("{path} returned a non-ok envelope"),
            });
        }
        Ok(data)
    }

    pub async fn views_open(&self, trigger_id: &str, view: Value) -> Result<(), Error> {
        self.post("/views.open", json!({ "trigger_id": trigger_id, "view": view }))
            .await
            .map(|_| ())
    }

    pub async fn views_push(&self, trigger_id: &str, view: Value) -> Result<(), Error> {
        self.post("/views.push", json!({ "trigger_id": trigger_id, "view": view }))
            .await
            .map(|_| ())
    }

    pub async fn views_update(&self, view_id: &str, view: Value) -> Result<(), Error> {
        self.post("/views.update", json!({ "view_id": view_id, "view": view }))
            .await
            .map(|_| ())
    }

    pub async fn workflows_update_step(
        &self,
        workflow_step_edit_id: &str,
        inputs: Value,
    ) -> Result<(), Error> {
        self.post(
            "/workflows.updateStep",
            json!({ "workflow_step_edit_id": workflow_step_edit_id, "inputs": inputs }),
        )
        .await
        .map(|_| ())
    }

    pub async fn workflows_step_completed(
        &self,
        workflow_step_execute_id: &str,
    ) -> Result<(), Error> {
        self.post(
            "/workflows.stepCompleted",
            json!({ "workflow_step_execute_id": workflow_step_execute_id }),
        )
        .await
        .map(|_| ())
    }

    pub async fn workflows_step_failed(
        &self,
        workflow_step_execute_id: &str,
        message: &str,
    ) -> Result<(), Error> {
        self.post(
            "/workflows.stepFailed",
            json!({
                "workflow_step_execute_id": workflow_step_execute_id,
                "error": { "message": message },
            }),
        )
        .await
        .map(|_| ())
    }
}

impl BookmarkApi for SlackClient {
    async fn list_bookmarks(&self, conversation: &str) -> Result<Vec<Bookmark>, Error> {
        let data = self
            .post("/bookmarks.list", json!({ "channel_id": conversation }))
            .await?;
        let bookmarks = data
            .get("bookmarks")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                tracing::error!(body = %data, "bookmark list response has no bookmarks array");
                Error::External {
                    context: "/bookmarks.list returned no bookmarks array".to_string(),
                }
            })?;
        Ok(bookmarks
            .iter()
            .filter_map(|b| {
                Some(Bookmark {
                    id: b.get("id")?.as_str()?.to_string(),
                    title: b.get("title")?.as_str()?.to_string(),
                    kind: b.get("type")?.as_str()?.to_string(),
                    link: b
                        .get("link")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                })
            })
            .collect())
    }

    async fn add_bookmark(
        &self,
        conversation: &str,
        title: &str,
        link: &str,
    ) -> Result<(), Error> {
        self.post(
            "/bookmarks.add",
            json!({
                "channel_id": conversation,
                "type": "link",
                "title": title,
                "link": link,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn edit_bookmark(
        &self,
        conversation: &str,
        bookmark_id: &str,
        link: &str,
    ) -> Result<(), Error> {
        self.post(
            "/bookmarks.edit",
            json!({
                "channel_id": conversation,
                "bookmark_id": bookmark_id,
                "link": link,
            }),
        )
        .await
        .map(|_| ())
    }
}

impl MessageApi for SlackClient {
    async fn fetch_message(&self, channel: &str, ts: &str) -> Result<Option<Value>, Error> {
        let data = self
            .get(
                "/conversations.history",
                &[
                    ("channel", channel.to_string()),
                    ("oldest", ts.to_string()),
                    ("inclusive", "true".to_string()),
                    ("limit", "1".to_string()),
                    ("include_all_metadata", "true".to_string()),
                ],
            )
            .await?;
        let messages = data.get("messages").and_then(Value::as_array);
        Ok(match messages {
            Some(messages) if messages.len() == 1 => Some(messages[0].clone()),
            _ => None,
        })
    }

    async fn post_message(&self, payload: &Value) -> Result<Value, Error> {
        self.post("/chat.postMessage", payload.clone()).await
    }

    async fn update_message(&self, ts: &str, payload: &Value) -> Result<(), Error> {
        let mut body = payload.clone();
        if let Some(obj) = body.as_object_mut() {
            obj.insert("ts".to_string(), json!(ts));
        }
        self.post("/chat.update", body).await.map(|_| ())
    }

    async fn post_ephemeral(&self, payload: &Value) -> Result<(), Error> {
        self.post("/chat.postEphemeral", payload.clone())
            .await
            .map(|_| ())
    }
}
