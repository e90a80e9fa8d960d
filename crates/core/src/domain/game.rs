use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::poll::{close_announcement, Choice, Poll, PollId, Submission};
use crate::domain::scope::YearScope;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatementId(pub u64);

/// Someone who submitted statements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementId,
    pub teller_id: PlayerId,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
    /// `None` until the poll closes; `Some(false)` marks the lie.
    pub veracity: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// Slack user id of the voter.
    pub voter_id: String,
    pub statement_id: StatementId,
}

/// A vote joined with the statement it was cast on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedVote<'a> {
    pub voter_id: &'a str,
    pub teller_id: PlayerId,
    pub found_lie: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollOutcome {
    pub poll_id: PollId,
    pub lie: Choice,
    pub votes_recorded: usize,
    pub announcement: String,
}

/// Everything the game has recorded: players, their statements, votes and polls.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GameLedger {
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub statements: Vec<Statement>,
    #[serde(default)]
    pub votes: Vec<Vote>,
    #[serde(default)]
    pub polls: Vec<Poll>,
    #[serde(default)]
    next_id: u64,
}

impl GameLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn statement(&self, id: StatementId) -> Option<&Statement> {
        self.statements.iter().find(|statement| statement.id == id)
    }

    pub fn open_poll(&self) -> Option<&Poll> {
        self.polls.iter().find(|poll| !poll.closed)
    }

    /// Records a new player with their three statements and opens a poll on them.
    pub fn submit(
        &mut self,
        submission: &Submission,
        channel_id: &str,
        message_ts: &str,
        now: DateTime<Utc>,
    ) -> Result<&Poll, DomainError> {
        if let Some(open) = self.open_poll() {
            return Err(DomainError::PollAlreadyOpen { poll_id: open.id.0 });
        }

        let teller_id = PlayerId(self.allocate_id());
        self.players.push(Player { id: teller_id, name: submission.name.clone() });

        let mut statement_ids = Vec::with_capacity(submission.statements.len());
        for text in &submission.statements {
            let id = StatementId(self.allocate_id());
            self.statements.push(Statement {
                id,
                teller_id,
                text: text.clone(),
                submitted_at: now,
                veracity: None,
            });
            statement_ids.push(id);
        }

        let poll_id = PollId(self.allocate_id());
        self.polls.push(Poll {
            id: poll_id,
            teller_id,
            statement_ids,
            channel_id: channel_id.to_owned(),
            message_ts: message_ts.to_owned(),
            closed: false,
            opened_at: now,
            reactions: Vec::new(),
        });

        let index = self.polls.len() - 1;
        Ok(&self.polls[index])
    }

    pub fn record_reaction(&mut self, emoji: &str, user_id: &str) -> Result<PollId, DomainError> {
        let poll = self.polls.iter_mut().find(|poll| !poll.closed).ok_or(DomainError::NoOpenPoll)?;
        poll.record_reaction(emoji, user_id);
        Ok(poll.id)
    }

    /// `Ok(false)` when `user_id` had no such reaction on the open poll.
    pub fn remove_reaction(&mut self, emoji: &str, user_id: &str) -> Result<bool, DomainError> {
        let poll = self.polls.iter_mut().find(|poll| !poll.closed).ok_or(DomainError::NoOpenPoll)?;
        Ok(poll.remove_reaction(emoji, user_id))
    }

    /// Closes the open poll: marks the lie, then turns reactions into votes.
    pub fn close_open_poll(
        &mut self,
        lie: Choice,
        bot_user_id: Option<&str>,
    ) -> Result<PollOutcome, DomainError> {
        let index =
            self.polls.iter().position(|poll| !poll.closed).ok_or(DomainError::NoOpenPoll)?;
        let poll = self.polls[index].clone();

        let mut verdicts = Vec::with_capacity(Choice::ALL.len());
        for choice in Choice::ALL {
            verdicts.push((poll.statement_for(choice)?, choice != lie));
        }
        for (statement_id, truthful) in verdicts {
            let statement = self
                .statements
                .iter_mut()
                .find(|statement| statement.id == statement_id)
                .ok_or_else(|| {
                    DomainError::InvariantViolation(format!(
                        "poll {} references unknown statement {}",
                        poll.id.0, statement_id.0
                    ))
                })?;
            statement.veracity = Some(truthful);
        }

        let mut votes_recorded = 0;
        for (choice, voter_id) in poll.ballots(bot_user_id) {
            self.votes.push(Vote { voter_id, statement_id: poll.statement_for(choice)? });
            votes_recorded += 1;
        }
        self.polls[index].closed = true;

        Ok(PollOutcome {
            poll_id: poll.id,
            lie,
            votes_recorded,
            announcement: close_announcement(lie),
        })
    }

    /// Votes on statements whose truth is known, within `scope`.
    pub fn resolved_votes(&self, scope: YearScope) -> impl Iterator<Item = ResolvedVote<'_>> + '_ {
        self.votes.iter().filter_map(move |vote| {
            let statement = self.statement(vote.statement_id)?;
            let veracity = statement.veracity?;
            if !scope.contains(statement.submitted_at) {
                return None;
            }
            Some(ResolvedVote {
                voter_id: vote.voter_id.as_str(),
                teller_id: statement.teller_id,
                found_lie: !veracity,
            })
        })
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}
