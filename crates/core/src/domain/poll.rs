use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::game::{PlayerId, StatementId};
use crate::errors::DomainError;

pub const STATEMENTS_PER_SUBMISSION: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PollId(pub u64);

/// Reaction emoji a voter uses to pick the lie, in statement order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    One,
    Two,
    Three,
}

impl Choice {
    pub const ALL: [Choice; STATEMENTS_PER_SUBMISSION] = [Choice::One, Choice::Two, Choice::Three];

    pub fn emoji(self) -> &'static str {
        match self {
            Self::One => "one",
            Self::Two => "two",
            Self::Three => "three",
        }
    }

    pub fn position(self) -> usize {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Three => 2,
        }
    }

    pub fn from_emoji(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|choice| choice.emoji() == name)
    }
}

impl FromStr for Choice {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = value.trim().trim_matches(':');
        Self::from_emoji(name).ok_or_else(|| DomainError::UnknownChoice(value.trim().to_owned()))
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}:", self.emoji())
    }
}

/// A player's three statements as typed into the submission form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub name: String,
    pub statements: [String; STATEMENTS_PER_SUBMISSION],
}

impl Submission {
    /// Splits the multi-line form field into statements, one per line.
    pub fn parse(name: &str, raw_statements: &str) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidSubmission("a name is required".to_owned()));
        }

        let lines: Vec<String> =
            raw_statements.trim().split('\n').map(|line| line.trim().to_owned()).collect();
        let count = lines.len();
        let statements: [String; STATEMENTS_PER_SUBMISSION] =
            lines.try_into().map_err(|_| {
                DomainError::InvalidSubmission(format!(
                    "need {STATEMENTS_PER_SUBMISSION} statements, got {count}"
                ))
            })?;

        Ok(Self { name: name.to_owned(), statements })
    }

    /// Channel message asking everyone to vote.
    pub fn announcement(&self) -> String {
        let lines = Choice::ALL
            .iter()
            .zip(&self.statements)
            .map(|(choice, statement)| format!("{choice} {statement}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "Time to vote on {}'s three statements!  React with the number of the lie.\n{lines}",
            self.name
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub name: String,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: PollId,
    pub teller_id: PlayerId,
    pub statement_ids: Vec<StatementId>,
    pub channel_id: String,
    pub message_ts: String,
    pub closed: bool,
    pub opened_at: DateTime<Utc>,
    /// Latest snapshot of reactions on the poll message.
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Poll {
    pub fn record_reaction(&mut self, emoji: &str, user_id: &str) {
        let emoji = emoji.trim().trim_matches(':');
        let index = match self.reactions.iter().position(|reaction| reaction.name == emoji) {
            Some(index) => index,
            None => {
                self.reactions.push(Reaction { name: emoji.to_owned(), users: Vec::new() });
                self.reactions.len() - 1
            }
        };

        let users = &mut self.reactions[index].users;
        if !users.iter().any(|existing| existing == user_id) {
            users.push(user_id.to_owned());
        }
    }

    /// Takes `user_id` off `emoji`; the emoji goes once nobody is left on it.
    pub fn remove_reaction(&mut self, emoji: &str, user_id: &str) -> bool {
        let emoji = emoji.trim().trim_matches(':');
        let Some(index) = self.reactions.iter().position(|reaction| reaction.name == emoji) else {
            return false;
        };

        let users = &mut self.reactions[index].users;
        let before = users.len();
        users.retain(|existing| existing != user_id);
        let removed = users.len() != before;
        if users.is_empty() {
            self.reactions.remove(index);
        }
        removed
    }

    /// Votes cast through the choice emoji, skipping the bot's own seed reactions.
    ///
    /// A user reacting with several numbers votes for each of them.
    pub fn ballots(&self, bot_user_id: Option<&str>) -> Vec<(Choice, String)> {
        self.reactions
            .iter()
            .filter_map(|reaction| Some((Choice::from_emoji(&reaction.name)?, reaction)))
            .flat_map(|(choice, reaction)| {
                reaction
                    .users
                    .iter()
                    .filter(move |user| Some(user.as_str()) != bot_user_id)
                    .map(move |user| (choice, user.clone()))
            })
            .collect()
    }

    pub fn statement_for(&self, choice: Choice) -> Result<StatementId, DomainError> {
        if self.statement_ids.len() != STATEMENTS_PER_SUBMISSION {
            return Err(DomainError::PollStatementsMissing { poll_id: self.id.0 });
        }
        Ok(self.statement_ids[choice.position()])
    }
}

pub fn close_announcement(lie: Choice) -> String {
    format!("The lie was {lie}!  Thanks for playing.")
}
