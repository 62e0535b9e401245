//! Pick lifecycle orchestration: draw, vote, reveal-one-more, end. Each
//! function is one webhook-triggered workflow, generic over the bookmark and
//! message boundaries so tests run against in-memory fakes.
//!
//! Write ordering follows the session-first rule: the message (the session's
//! single source of truth) is updated first, then the durable record. Record
//! write-backs after a successful message update are best-effort — a failure
//! loses statistics, never votes.

use picker_core::error::Error;
use picker_core::session::{PickSession, RevealOutcome, VoteOutcome};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::blocks;
use crate::sessions::{MessageApi, SessionStore};
use crate::store::{BookmarkApi, RecordStore};

#[derive(Debug, PartialEq, Eq)]
pub enum PickStart {
    Started { message_ts: String },
    /// The conversation had no record yet; it was initialized and welcomed
    /// instead of drawing.
    Initialized,
    /// A record exists but holds no restaurants; the welcome message was
    /// (re-)posted instead of drawing.
    EmptyList,
}

#[derive(Debug, PartialEq, Eq)]
pub enum VoteAction {
    Voted { restaurant_name: String },
    /// The user already has a live vote; the caller must open the overwrite
    /// confirmation. Nothing was mutated.
    NeedsConfirmation,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RevealAction {
    Revealed,
    Exhausted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum EndAction {
    Ended { winners: Vec<String> },
    /// A retried end request: the session was already terminal, so no
    /// statistics were applied again.
    AlreadyEnded,
}

/// Starts a pick with a freshly seeded RNG. `StdRng` rather than the
/// thread-local one: the RNG lives across await points, and spawned
/// workflow executions need the future to stay `Send`.
pub async fn start_pick<B: BookmarkApi, M: MessageApi>(
    store: &RecordStore<B>,
    sessions: &SessionStore<M>,
    conversation: &str,
    number_of_choices: usize,
) -> Result<PickStart, Error> {
    let mut rng = StdRng::from_entropy();
    start_pick_with(&mut rng, store, sessions, conversation, number_of_choices).await
}

pub async fn start_pick_with<R: Rng + ?Sized, B: BookmarkApi, M: MessageApi>(
    rng: &mut R,
    store: &RecordStore<B>,
    sessions: &SessionStore<M>,
    conversation: &str,
    number_of_choices: usize,
) -> Result<PickStart, Error> {
    let Some((mut record, handle)) = store.get(conversation).await? else {
        store.create(conversation).await?;
        sessions
            .announce(&blocks::welcome_message(conversation))
            .await?;
        return Ok(PickStart::Initialized);
    };

    if record.list.is_empty() {
        sessions
            .announce(&blocks::welcome_message(conversation))
            .await?;
        return Ok(PickStart::EmptyList);
    }

    let session = PickSession::start(rng, &record, number_of_choices);
    let message_ts = sessions.post(&session).await?;

    for choice in session.revealed() {
        if let Some(restaurant) = record.find_mut(&choice.restaurant.id) {
            restaurant.shown_count += 1;
        }
    }
    if !store.update(conversation, &handle, &mut record).await {
        return Err(Error::External {
            context: "record update after pick was not committed".to_string(),
        });
    }

    Ok(PickStart::Started { message_ts })
}

/// Applies one user's vote to the session behind `message_ts`.
pub async fn cast_vote<M: MessageApi>(
    sessions: &SessionStore<M>,
    channel: &str,
    message_ts: &str,
    user_id: &str,
    restaurant_id: &str,
    allow_overwrite: bool,
) -> Result<VoteAction, Error> {
    let mut session = sessions.fetch(channel, message_ts).await?;
    match session.vote(user_id, restaurant_id, allow_overwrite)? {
        VoteOutcome::RequiresConfirmation => Ok(VoteAction::NeedsConfirmation),
        VoteOutcome::Voted { restaurant_name } => {
            sessions.update(message_ts, &session).await?;
            let text = format!("<@{user_id}> You have voted for {restaurant_name}!");
            if let Err(err) = sessions.whisper(channel, user_id, &text, None).await {
                tracing::warn!(channel, user_id, "vote confirmation not delivered: {err}");
            }
            Ok(VoteAction::Voted { restaurant_name })
        }
    }
}

/// Reveals the next drawn choice and mirrors the exposure into the record.
pub async fn add_choice<B: BookmarkApi, M: MessageApi>(
    store: &RecordStore<B>,
    sessions: &SessionStore<M>,
    channel: &str,
    message_ts: &str,
    user_id: &str,
) -> Result<RevealAction, Error> {
    let mut session = sessions.fetch(channel, message_ts).await?;
    match session.reveal_next()? {
        RevealOutcome::Exhausted => {
            sessions
                .whisper(
                    channel,
                    user_id,
                    "*There are no more restaurants to pick.*\n\n\
                     Please add new ones and start another pick!",
                    None,
                )
                .await?;
            Ok(RevealAction::Exhausted)
        }
        RevealOutcome::Revealed { restaurant_id } => {
            sessions.update(message_ts, &session).await?;

            match store.get(channel).await {
                Ok(Some((mut record, handle))) => {
                    if let Some(restaurant) = record.find_mut(&restaurant_id) {
                        restaurant.shown_count += 1;
                    }
                    store.update(channel, &handle, &mut record).await;
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(channel, "shown count not written back after reveal: {err}");
                }
            }

            notify_voters(
                sessions,
                &session,
                channel,
                "A new choice has been added! You may consider changing your vote.",
            )
            .await;
            Ok(RevealAction::Revealed)
        }
    }
}

/// Ends the vote, fixes the winner set and applies win statistics exactly
/// once, guarded against retried end requests.
pub async fn end_pick<B: BookmarkApi, M: MessageApi>(
    store: &RecordStore<B>,
    sessions: &SessionStore<M>,
    channel: &str,
    message_ts: &str,
    user_id: &str,
) -> Result<EndAction, Error> {
    let mut session = sessions.fetch(channel, message_ts).await?;
    let outcome = session.end(user_id);
    if !outcome.newly_ended {
        return Ok(EndAction::AlreadyEnded);
    }

    sessions.update(message_ts, &session).await?;

    match store.get(channel).await {
        Ok(Some((mut record, handle))) => {
            for winner in &outcome.winners {
                if let Some(restaurant) = record.find_mut(winner) {
                    restaurant.win_count += 1;
                }
            }
            store.update(channel, &handle, &mut record).await;
        }
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(channel, "win counts not written back after end: {err}");
        }
    }

    notify_voters(
        sessions,
        &session,
        channel,
        "Vote has ended! You may check the result.",
    )
    .await;
    Ok(EndAction::Ended {
        winners: outcome.winners,
    })
}

/// Ephemeral heads-up to everyone who has voted; delivery failures are
/// logged, never fatal.
async fn notify_voters<M: MessageApi>(
    sessions: &SessionStore<M>,
    session: &PickSession,
    channel: &str,
    message: &str,
) {
    for user in session.voters() {
        let text = format!("<@{user}> {message}");
        if let Err(err) = sessions.whisper(channel, &user, &text, None).await {
            tracing::warn!(channel, user, "voter notification not delivered: {err}");
        }
    }
}
