//! Turns resolved votes into per-player tallies and orders them by the
//! Wilson lower bound.

pub mod personal;
pub mod winners;

use std::collections::BTreeMap;

use rand::Rng;
use serde::Serialize;

use crate::domain::game::{PlayerId, ResolvedVote};
use crate::errors::DomainError;
use crate::stats::{wilson_interval, Confidence, RankedScore, StatsError};

pub use personal::PersonalStats;
pub use winners::{pick_winners, Contestant, Winner, WinnerCategory};

/// How often a player got it right. Always has at least one vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    correct: u32,
    total: u32,
}

impl VoteTally {
    pub fn new(correct: u32, total: u32) -> Result<Self, DomainError> {
        if total == 0 {
            return Err(StatsError::EmptySample.into());
        }
        if correct > total {
            return Err(StatsError::CorrectExceedsTotal { correct, total }.into());
        }
        Ok(Self { correct, total })
    }

    pub fn correct(&self) -> u32 {
        self.correct
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn percent(&self) -> f64 {
        100.0 * f64::from(self.correct) / f64::from(self.total)
    }

    /// `"80% (4/5)"`
    pub fn describe(&self) -> String {
        format!("{:.0}% ({}/{})", self.percent(), self.correct, self.total)
    }

    pub fn score(&self, confidence: Confidence) -> Result<RankedScore, StatsError> {
        wilson_interval(self.correct, self.total, confidence)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Counter {
    correct: u32,
    total: u32,
}

impl Counter {
    fn add(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }

    fn into_tally(self) -> Result<VoteTally, DomainError> {
        VoteTally::new(self.correct, self.total)
    }
}

/// Per voter: how often they picked the lie.
pub fn tally_voters<'a, I>(votes: I) -> Result<BTreeMap<String, VoteTally>, DomainError>
where
    I: IntoIterator<Item = ResolvedVote<'a>>,
{
    let mut counters: BTreeMap<String, Counter> = BTreeMap::new();
    for vote in votes {
        counters.entry(vote.voter_id.to_owned()).or_default().add(vote.found_lie);
    }
    counters.into_iter().map(|(voter, counter)| Ok((voter, counter.into_tally()?))).collect()
}

/// Per teller: how often the room saw through their lie.
pub fn tally_tellers<'a, I>(votes: I) -> Result<BTreeMap<PlayerId, VoteTally>, DomainError>
where
    I: IntoIterator<Item = ResolvedVote<'a>>,
{
    let mut counters: BTreeMap<PlayerId, Counter> = BTreeMap::new();
    for vote in votes {
        counters.entry(vote.teller_id).or_default().add(vote.found_lie);
    }
    counters.into_iter().map(|(teller, counter)| Ok((teller, counter.into_tally()?))).collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Standing<K> {
    pub subject: K,
    pub tally: VoteTally,
    pub score: RankedScore,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RankingEngine {
    confidence: Confidence,
}

impl RankingEngine {
    pub fn new(confidence: Confidence) -> Self {
        Self { confidence }
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    /// Scores every tally with at least `min_total` votes, in key order.
    pub fn score<K>(
        &self,
        tallies: BTreeMap<K, VoteTally>,
        min_total: u32,
    ) -> Result<Vec<Standing<K>>, StatsError> {
        tallies
            .into_iter()
            .filter(|(_, tally)| tally.total() >= min_total)
            .map(|(subject, tally)| {
                Ok(Standing { subject, tally, score: tally.score(self.confidence)? })
            })
            .collect()
    }

    /// Best first by Wilson lower bound; exact ties land in random order.
    pub fn rank<K, R>(
        &self,
        tallies: BTreeMap<K, VoteTally>,
        min_total: u32,
        rng: &mut R,
    ) -> Result<Vec<Standing<K>>, StatsError>
    where
        R: Rng + ?Sized,
    {
        let standings = self.score(tallies, min_total)?;
        Ok(sort_by_key_desc(standings, |standing| standing.score.lower_bound, rng))
    }
}

/// The standing with the largest `key`, ties broken at random.
pub fn first_by<'a, K, F, R>(
    standings: &'a [Standing<K>],
    key: F,
    rng: &mut R,
) -> Option<&'a Standing<K>>
where
    F: Fn(&Standing<K>) -> f64,
    R: Rng + ?Sized,
{
    standings
        .iter()
        .map(|standing| (key(standing), rng.gen::<f64>(), standing))
        .max_by(|left, right| left.0.total_cmp(&right.0).then(left.1.total_cmp(&right.1)))
        .map(|(_, _, standing)| standing)
}

fn sort_by_key_desc<T, F, R>(items: Vec<T>, key: F, rng: &mut R) -> Vec<T>
where
    F: Fn(&T) -> f64,
    R: Rng + ?Sized,
{
    let mut keyed: Vec<(f64, f64, T)> =
        items.into_iter().map(|item| (key(&item), rng.gen::<f64>(), item)).collect();
    keyed.sort_by(|left, right| right.0.total_cmp(&left.0).then(right.1.total_cmp(&left.1)));
    keyed.into_iter().map(|(_, _, item)| item).collect()
}
