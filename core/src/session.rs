//! The pick session: one active draw with its votes, persisted verbatim as a
//! message's metadata payload. Observable states are `Voting` and `Ended`;
//! `Ended` is terminal.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::record::{ConversationRecord, Restaurant, now_ms};
use crate::sampler;
use crate::tally;

/// A single user's vote on a choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub user_id: String,
    pub ts: i64,
}

/// A drawn restaurant plus the votes it has collected. Serialized flat so
/// the metadata payload carries the restaurant fields at the top level of
/// each choice, the way older sessions already stored them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    #[serde(default)]
    pub votes: Vec<Vote>,
}

/// Outcome of a vote attempt that did not violate the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    /// The vote was applied; carries the display name for the confirmation.
    Voted { restaurant_name: String },
    /// The user already has a live vote and overwrite was not allowed; state
    /// is unchanged and the caller must ask for confirmation.
    RequiresConfirmation,
}

/// Outcome of revealing one more choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealOutcome {
    Revealed { restaurant_id: String },
    /// Every drawn choice is already revealed; state is unchanged.
    Exhausted,
}

/// Outcome of ending a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOutcome {
    /// False when the session was already ended — the caller must not apply
    /// win statistics again in that case.
    pub newly_ended: bool,
    pub winners: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickSession {
    pub conversation: String,
    /// The full weighted draw; only the first `number_of_choices` are
    /// revealed and votable.
    pub choices: Vec<Choice>,
    pub number_of_choices: usize,
    /// Recomputed on every mutation; never authoritative on its own.
    #[serde(default)]
    pub winners: Vec<String>,
    #[serde(default)]
    pub is_ended: bool,
    #[serde(default)]
    pub ended_by: Option<String>,
    pub ts: i64,
}

impl PickSession {
    /// Draws a full weighted ordering of the record's list and reveals the
    /// first `n` choices (all of them when fewer exist). Revealed choices get
    /// their `shown_count` bumped in the session's own copies; the caller is
    /// responsible for the matching increments in the durable record.
    pub fn start<R: Rng + ?Sized>(rng: &mut R, record: &ConversationRecord, n: usize) -> Self {
        let drawn = sampler::draw_with(rng, &record.list, record.list.len());
        let number_of_choices = n.min(drawn.len());
        let mut session = Self {
            conversation: record.conversation_id.clone(),
            choices: drawn
                .into_iter()
                .map(|restaurant| Choice {
                    restaurant,
                    votes: Vec::new(),
                })
                .collect(),
            number_of_choices,
            winners: Vec::new(),
            is_ended: false,
            ended_by: None,
            ts: now_ms(),
        };
        for choice in &mut session.choices[..number_of_choices] {
            choice.restaurant.shown_count += 1;
        }
        session.refresh_winners();
        session
    }

    /// The currently revealed (votable) choices.
    pub fn revealed(&self) -> &[Choice] {
        &self.choices[..self.number_of_choices.min(self.choices.len())]
    }

    /// Every user with at least one vote, deduplicated in first-vote order.
    /// Used for change notifications.
    pub fn voters(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for choice in &self.choices {
            for vote in &choice.votes {
                if !seen.contains(&vote.user_id) {
                    seen.push(vote.user_id.clone());
                }
            }
        }
        seen
    }

    /// Applies a vote. At most one live vote per user: any prior vote by the
    /// same user is removed first, but only once `allow_overwrite` says the
    /// user has confirmed. Voting on an ended session is a terminal-state
    /// violation.
    pub fn vote(
        &mut self,
        user_id: &str,
        restaurant_id: &str,
        allow_overwrite: bool,
    ) -> Result<VoteOutcome, Error> {
        if self.is_ended {
            return Err(Error::SessionEnded);
        }

        let already_voted = self
            .choices
            .iter()
            .any(|c| c.votes.iter().any(|v| v.user_id == user_id));
        if already_voted && !allow_overwrite {
            return Ok(VoteOutcome::RequiresConfirmation);
        }

        let restaurant_name = self
            .revealed()
            .iter()
            .find(|c| c.restaurant.id == restaurant_id)
            .map(|c| c.restaurant.name.clone())
            .ok_or(Error::NotFound("revealed choice"))?;

        for choice in &mut self.choices {
            choice.votes.retain(|v| v.user_id != user_id);
        }
        let ts = now_ms();
        for choice in &mut self.choices {
            if choice.restaurant.id == restaurant_id {
                choice.votes.push(Vote {
                    user_id: user_id.to_string(),
                    ts,
                });
            }
        }
        self.ts = ts;
        self.refresh_winners();
        Ok(VoteOutcome::Voted { restaurant_name })
    }

    /// Reveals the next drawn-but-hidden choice, bumping its session-local
    /// `shown_count`. The caller must mirror the increment into the durable
    /// record. Running out of choices is a no-op, not an error.
    pub fn reveal_next(&mut self) -> Result<RevealOutcome, Error> {
        if self.is_ended {
            return Err(Error::SessionEnded);
        }
        if self.number_of_choices >= self.choices.len() {
            return Ok(RevealOutcome::Exhausted);
        }

        let next = &mut self.choices[self.number_of_choices];
        next.restaurant.shown_count += 1;
        let restaurant_id = next.restaurant.id.clone();
        self.number_of_choices += 1;
        self.ts = now_ms();
        self.refresh_winners();
        Ok(RevealOutcome::Revealed { restaurant_id })
    }

    /// Ends the session and fixes the winner set. Idempotent: ending an
    /// already-ended session reports `newly_ended: false` so win statistics
    /// are applied exactly once even when a request is retried.
    pub fn end(&mut self, ended_by: &str) -> EndOutcome {
        if self.is_ended {
            return EndOutcome {
                newly_ended: false,
                winners: self.winners.clone(),
            };
        }
        self.is_ended = true;
        self.ended_by = Some(ended_by.to_string());
        self.ts = now_ms();
        self.refresh_winners();
        EndOutcome {
            newly_ended: true,
            winners: self.winners.clone(),
        }
    }

    fn refresh_winners(&mut self) {
        self.winners = tally::tally(self.revealed()).winners;
    }
}
