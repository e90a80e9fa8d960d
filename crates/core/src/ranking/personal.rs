use serde::Serialize;

use crate::domain::game::ResolvedVote;
use crate::errors::DomainError;
use crate::ranking::VoteTally;
use crate::stats::{p_value, Performance};

/// One voter's record against random guessing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersonalStats {
    pub tally: VoteTally,
    pub p_value: f64,
    pub performance: Performance,
}

impl PersonalStats {
    /// `None` when the voter has not voted on any resolved statement.
    pub fn for_voter<'a, I>(voter_id: &str, votes: I) -> Result<Option<Self>, DomainError>
    where
        I: IntoIterator<Item = ResolvedVote<'a>>,
    {
        let (correct, total) = votes
            .into_iter()
            .filter(|vote| vote.voter_id == voter_id)
            .fold((0u32, 0u32), |(correct, total), vote| {
                (correct + u32::from(vote.found_lie), total + 1)
            });

        if total == 0 {
            return Ok(None);
        }

        let tally = VoteTally::new(correct, total)?;
        let p_value = p_value(correct, total)?;
        Ok(Some(Self { tally, p_value, performance: Performance::classify(p_value) }))
    }
}
