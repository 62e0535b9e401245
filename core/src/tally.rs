//! Pure vote aggregation over a session's revealed choices.

use crate::session::Choice;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    /// Sum of vote counts across revealed choices.
    pub total_votes: usize,
    /// Highest single-choice vote count, 0 when nobody has voted.
    pub max_votes: usize,
    /// Ids of every revealed choice whose count equals `max_votes`. Ties
    /// produce multiple winners; with zero votes everywhere, every revealed
    /// choice wins. That degenerate case is deliberate and relied upon.
    pub winners: Vec<String>,
}

pub fn tally(revealed: &[Choice]) -> Tally {
    let total_votes = revealed.iter().map(|c| c.votes.len()).sum();
    let max_votes = revealed.iter().map(|c| c.votes.len()).max().unwrap_or(0);
    let winners = revealed
        .iter()
        .filter(|c| c.votes.len() == max_votes)
        .map(|c| c.restaurant.id.clone())
        .collect();
    Tally {
        total_votes,
        max_votes,
        winners,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Restaurant;
    use crate::record::now_ms;
    use crate::session::Vote;

    fn choice(name: &str, voters: &[&str]) -> Choice {
        Choice {
            restaurant: Restaurant::new(name, 1),
            votes: voters
                .iter()
                .map(|user| Vote {
                    user_id: user.to_string(),
                    ts: now_ms(),
                })
                .collect(),
        }
    }

    #[test]
    fn tie_produces_multiple_winners() {
        let choices = vec![
            choice("a", &["u1", "u2"]),
            choice("b", &["u3", "u4"]),
            choice("c", &["u5"]),
        ];
        let result = tally(&choices);
        assert_eq!(result.total_votes, 5);
        assert_eq!(result.max_votes, 2);
        assert_eq!(
            result.winners,
            vec![
                choices[0].restaurant.id.clone(),
                choices[1].restaurant.id.clone()
            ]
        );
    }

    #[test]
    fn zero_votes_everywhere_makes_every_choice_a_winner() {
        let choices = vec![choice("a", &[]), choice("b", &[]), choice("c", &[])];
        let result = tally(&choices);
        assert_eq!(result.total_votes, 0);
        assert_eq!(result.max_votes, 0);
        assert_eq!(result.winners.len(), 3);
    }

    #[test]
    fn no_choices_means_no_winners() {
        let result = tally(&[]);
        assert_eq!(result.max_votes, 0);
        assert!(result.winners.is_empty());
    }
}
