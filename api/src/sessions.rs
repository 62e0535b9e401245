//! Session transport: a pick session lives entirely inside its message's
//! metadata payload. The message timestamp doubles as the session key; a
//! session whose message is gone cannot be reconstructed.

use picker_core::error::Error;
use picker_core::session::PickSession;
use serde_json::Value;

use crate::blocks;

/// Metadata event type stamped on every pick message.
pub const PICK_EVENT_TYPE: &str = "restaurant_picker-pick";

/// The message boundary the session store needs. Implemented by the real
/// client and by in-memory fakes in tests.
pub trait MessageApi {
    /// Fetch one message (with metadata) by its exact timestamp.
    async fn fetch_message(&self, channel: &str, ts: &str) -> Result<Option<Value>, Error>;
    async fn post_message(&self, payload: &Value) -> Result<Value, Error>;
    async fn update_message(&self, ts: &str, payload: &Value) -> Result<(), Error>;
    async fn post_ephemeral(&self, payload: &Value) -> Result<(), Error>;
}

pub struct SessionStore<M> {
    messages: M,
}

impl<M: MessageApi> SessionStore<M> {
    pub fn new(messages: M) -> Self {
        Self { messages }
    }

    /// Reconstructs the session from the message's metadata. A missing
    /// message is a hard not-found: there is nowhere else the session lives.
    pub async fn fetch(&self, channel: &str, message_ts: &str) -> Result<PickSession, Error> {
        let Some(message) = self.messages.fetch_message(channel, message_ts).await? else {
            return Err(Error::NotFound("pick message"));
        };
        let payload = message
            .pointer("/metadata/event_payload")
            .cloned()
            .ok_or(Error::NotFound("pick session metadata"))?;
        serde_json::from_value(payload)
            .map_err(|err| Error::Validation(format!("malformed session metadata: {err}")))
    }

    /// Posts the pick message with the session as metadata; returns the
    /// message timestamp that keys the session from now on.
    pub async fn post(&self, session: &PickSession) -> Result<String, Error> {
        let payload = blocks::pick_message(session)?;
        let data = self.messages.post_message(&payload).await?;
        data.get("ts")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::External {
                context: "chat.postMessage returned no ts".to_string(),
            })
    }

    /// Re-renders the pick message from the session and overwrites both the
    /// blocks and the metadata.
    pub async fn update(&self, message_ts: &str, session: &PickSession) -> Result<(), Error> {
        let payload = blocks::pick_message(session)?;
        self.messages.update_message(message_ts, &payload).await
    }

    /// Posts a plain (non-pick) message to the conversation, e.g. the
    /// welcome message.
    pub async fn announce(&self, payload: &Value) -> Result<(), Error> {
        self.messages.post_message(payload).await.map(|_| ())
    }

    /// One ephemeral message to one user.
    pub async fn whisper(
        &self,
        channel: &str,
        user_id: &str,
        text: &str,
        extra_blocks: Option<Value>,
    ) -> Result<(), Error> {
        self.messages
            .post_ephemeral(&blocks::ephemeral(channel, user_id, text, extra_blocks))
            .await
    }
}


#[cfg(test)]
mod tests {
    use picker_core::codec;
    use picker_core::record::Restaurant;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::testing::FakeMessages;
    use super::*;

    fn sample_session() -> PickSession {
        let mut record = codec::initialize("C1");
        record.list.push(Restaurant::new("Ramen-ya", 10));
        record.list.push(Restaurant::new("Bistro", 5));
        let mut rng = StdRng::seed_from_u64(11);
        PickSession::start(&mut rng, &record, 1)
    }

    #[tokio::test]
    async fn post_then_fetch_round_trips_the_session() {
        let fake = FakeMessages::default();
        let store = SessionStore::new(&fake);
        let session = sample_session();

        let ts = store.post(&session).await.expect("post succeeds");
        let fetched = store.fetch("C1", &ts).await.expect("fetch succeeds");
        assert_eq!(fetched, session);
    }

    #[tokio::test]
    async fn fetch_of_missing_message_is_a_hard_not_found() {
        let fake = FakeMessages::default();
        let store = SessionStore::new(&fake);
        assert!(matches!(
            store.fetch("C1", "1700000000.000001").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_rewrites_blocks_and_metadata() {
        let fake = FakeMessages::default();
        let store = SessionStore::new(&fake);
        let mut session = sample_session();
        let ts = store.post(&session).await.expect("post succeeds");

        let choice = session.revealed()[0].restaurant.id.clone();
        session.vote("u1", &choice, false).expect("vote");
        store.update(&ts, &session).await.expect("update succeeds");

        let fetched = store.fetch("C1", &ts).await.expect("fetch succeeds");
        assert_eq!(fetched.choices[0].votes.len(), 1);

        let message = fake.message(&ts).expect("message stored");
        assert_eq!(
            message.pointer("/metadata/event_type").and_then(Value::as_str),
            Some(PICK_EVENT_TYPE)
        );
    }
}
