//! The read-only results page. Bookmark links point here; the whole record
//! travels in the `data` query parameter, so rendering needs no platform
//! call at all.

use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use picker_core::codec;
use picker_core::record::ConversationRecord;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(results_page))
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    pub conversation: String,
    pub data: String,
}

pub async fn results_page(Query(query): Query<ResultsQuery>) -> Result<Response, AppError> {
    let candidate = codec::decode(&query.data)?;
    if candidate.get("conversation_id").and_then(Value::as_str) != Some(&query.conversation) {
        return Ok((
            StatusCode::UNAUTHORIZED,
            "The data does not belong to this conversation.",
        )
            .into_response());
    }
    let record = codec::record_from_value(&query.conversation, candidate)?;
    Ok(Html(render_results(&record)).into_response())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn render_results(record: &ConversationRecord) -> String {
    let mut rows = String::new();
    for (rank, restaurant) in record.ranked().iter().enumerate() {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}%</td><td>{}</td></tr>\n",
            rank + 1,
            escape(&restaurant.name),
            restaurant.win_count,
            restaurant.shown_count,
            restaurant.win_rate_percent(),
            restaurant.effective_weight(),
        ));
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Restaurant Picker Results</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; }}
th, td {{ border: 1px solid #ccc; padding: 0.4rem 0.8rem; text-align: left; }}
th {{ background: #f2f2f2; }}
</style>
</head>
<body>
<h1>Restaurant Picker Results</h1>
<p>Conversation: <code>{}</code></p>
<table>
<tr><th>Rank</th><th>Restaurant</th><th>Wins</th><th>Shown</th><th>Win Rate</th><th>Weight</th></tr>
{}</table>
</body>
</html>
"#,
        escape(&record.conversation_id),
        rows
    )
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use picker_core::record::{Restaurant, now_ms};
    use serde_json::json;

    use super::*;

    fn encoded(value: &serde_json::Value) -> String {
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(value).expect("serializes"))
    }

    #[tokio::test]
    async fn mismatched_conversation_is_rejected() {
        let record = codec::initialize("C1");
        let data = codec::encode(&record).expect("encodes");
        let response = results_page(Query(ResultsQuery {
            conversation: "C2".to_string(),
            data,
        }))
        .await
        .expect("handler runs");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn corrupted_data_is_repaired_and_rendered() {
        // Structurally valid entry with an untypeable count: the page must
        // render the repaired record rather than erroring out.
        let raw = json!({
            "conversation_id": "C1",
            "ts": now_ms() - 1,
            "list": [{"id": "r1", "name": "Survivor", "shown_count": -1}],
        });
        let response = results_page(Query(ResultsQuery {
            conversation: "C1".to_string(),
            data: encoded(&raw),
        }))
        .await
        .expect("handler runs");
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        let page = String::from_utf8(body.to_vec()).expect("utf8");
        assert!(page.contains("Survivor"));
    }

    #[test]
    fn rendered_page_ranks_and_escapes() {
        let mut record = codec::initialize("C1");
        let mut champion = Restaurant::new("Fish & Chips", 10);
        champion.shown_count = 4;
        champion.win_count = 2;
        record.list.push(Restaurant::new("Noodles", 5));
        record.list.push(champion);

        let page = render_results(&record);
        assert!(page.contains("Fish &amp; Chips"));
        assert!(page.contains("50%"));
        let champion_at = page.find("Fish &amp; Chips").expect("champion rendered");
        let noodles_at = page.find("Noodles").expect("noodles rendered");
        assert!(champion_at < noodles_at);
    }
}
