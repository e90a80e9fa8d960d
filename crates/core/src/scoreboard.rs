//! Read-side queries over a [`GameLedger`]: leaderboard, winners and personal stats.

use rand::Rng;
use serde::Serialize;

use crate::config::RankingConfig;
use crate::domain::game::{GameLedger, PlayerId};
use crate::domain::scope::YearScope;
use crate::errors::DomainError;
use crate::ranking::{
    pick_winners, tally_tellers, tally_voters, Contestant, PersonalStats, RankingEngine, VoteTally,
    WinnerCategory,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based.
    pub rank: usize,
    pub name: String,
    pub tally: VoteTally,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WinnerEntry {
    pub category: WinnerCategory,
    pub name: String,
    pub tally: VoteTally,
}

pub struct Scoreboard<'a> {
    ledger: &'a GameLedger,
    ranking: &'a RankingConfig,
    engine: RankingEngine,
}

impl<'a> Scoreboard<'a> {
    pub fn new(ledger: &'a GameLedger, ranking: &'a RankingConfig) -> Self {
        Self { ledger, ranking, engine: RankingEngine::new(ranking.confidence) }
    }

    pub fn leaderboard<R>(
        &self,
        scope: YearScope,
        rng: &mut R,
    ) -> Result<Vec<LeaderboardEntry>, DomainError>
    where
        R: Rng + ?Sized,
    {
        let tallies = tally_voters(self.ledger.resolved_votes(scope))?;
        let ranked = self.engine.rank(tallies, self.ranking.leaderboard_min_votes, rng)?;

        Ok(ranked
            .into_iter()
            .take(self.ranking.leaderboard_size)
            .enumerate()
            .map(|(index, standing)| LeaderboardEntry {
                rank: index + 1,
                name: voter_mention(&standing.subject),
                tally: standing.tally,
            })
            .collect())
    }

    pub fn winners<R>(&self, scope: YearScope, rng: &mut R) -> Result<Vec<WinnerEntry>, DomainError>
    where
        R: Rng + ?Sized,
    {
        let voters = self.engine.score(
            tally_voters(self.ledger.resolved_votes(scope))?,
            self.ranking.leaderboard_min_votes,
        )?;
        let tellers = self.engine.score(
            tally_tellers(self.ledger.resolved_votes(scope))?,
            self.ranking.teller_min_votes,
        )?;

        Ok(pick_winners(&voters, &tellers, rng)
            .into_iter()
            .map(|winner| WinnerEntry {
                category: winner.category,
                name: self.display_name(&winner.contestant),
                tally: winner.tally,
            })
            .collect())
    }

    pub fn personal(
        &self,
        voter_id: &str,
        scope: YearScope,
    ) -> Result<Option<PersonalStats>, DomainError> {
        PersonalStats::for_voter(voter_id, self.ledger.resolved_votes(scope))
    }

    pub fn display_name(&self, contestant: &Contestant) -> String {
        match contestant {
            Contestant::Voter(user_id) => voter_mention(user_id),
            Contestant::Teller(player_id) => self.teller_name(*player_id),
        }
    }

    fn teller_name(&self, player_id: PlayerId) -> String {
        self.ledger
            .player(player_id)
            .map(|player| player.name.clone())
            .unwrap_or_else(|| format!("player #{}", player_id.0))
    }
}

fn voter_mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}
