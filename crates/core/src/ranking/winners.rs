use rand::Rng;
use serde::Serialize;

use crate::domain::game::PlayerId;
use crate::ranking::{first_by, Standing, VoteTally};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerCategory {
    Shrewdest,
    MostCredulous,
    MostProlific,
    BestLiar,
    MostHonest,
}

impl WinnerCategory {
    pub const ALL: [WinnerCategory; 5] = [
        WinnerCategory::Shrewdest,
        WinnerCategory::MostCredulous,
        WinnerCategory::MostProlific,
        WinnerCategory::BestLiar,
        WinnerCategory::MostHonest,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Shrewdest => "Shrewdest",
            Self::MostCredulous => "Most credulous",
            Self::MostProlific => "Most prolific",
            Self::BestLiar => "Best liar",
            Self::MostHonest => "Most honest",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Contestant {
    /// Slack user id of someone who voted.
    Voter(String),
    Teller(PlayerId),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Winner {
    pub category: WinnerCategory,
    pub contestant: Contestant,
    pub tally: VoteTally,
}

/// One winner per category, in `WinnerCategory::ALL` order.
///
/// Voter categories draw from `voters`, liar/honest from `tellers`. A category
/// whose population is empty is left out.
pub fn pick_winners<R>(
    voters: &[Standing<String>],
    tellers: &[Standing<PlayerId>],
    rng: &mut R,
) -> Vec<Winner>
where
    R: Rng + ?Sized,
{
    let mut winners = Vec::with_capacity(WinnerCategory::ALL.len());

    for category in WinnerCategory::ALL {
        let winner = match category {
            WinnerCategory::Shrewdest => {
                first_by(voters, |standing| standing.score.lower_bound, rng).map(voter_winner)
            }
            WinnerCategory::MostCredulous => {
                first_by(voters, |standing| -standing.score.upper_bound, rng).map(voter_winner)
            }
            WinnerCategory::MostProlific => {
                first_by(voters, |standing| f64::from(standing.tally.total()), rng)
                    .map(voter_winner)
            }
            WinnerCategory::BestLiar => {
                first_by(tellers, |standing| -standing.score.upper_bound, rng).map(teller_winner)
            }
            WinnerCategory::MostHonest => {
                first_by(tellers, |standing| standing.score.upper_bound, rng).map(teller_winner)
            }
        };

        if let Some((contestant, tally)) = winner {
            winners.push(Winner { category, contestant, tally });
        }
    }

    winners
}

fn voter_winner(standing: &Standing<String>) -> (Contestant, VoteTally) {
    (Contestant::Voter(standing.subject.clone()), standing.tally)
}

fn teller_winner(standing: &Standing<PlayerId>) -> (Contestant, VoteTally) {
    (Contestant::Teller(standing.subject), standing.tally)
}
