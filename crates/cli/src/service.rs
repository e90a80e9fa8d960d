use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use twotruths_core::config::RankingConfig;
use twotruths_core::{AppConfig, Choice, GameLedger, Scoreboard, Submission, YearScope};
use twotruths_slack::blocks::{self, MessageTemplate};
use twotruths_slack::commands::{CommandEnvelope, CommandRouteError, TwoTruthsService};

/// Game service over an in-memory ledger the CLI loads and persists around each command.
pub struct LocalGameService {
    ledger: Mutex<GameLedger>,
    ranking: RankingConfig,
    bot_user_id: Option<String>,
}

impl LocalGameService {
    pub fn new(ledger: GameLedger, config: &AppConfig) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            ranking: config.ranking.clone(),
            bot_user_id: config.slack.bot_user_id.clone(),
        }
    }

    pub fn snapshot(&self) -> Result<GameLedger, CommandRouteError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, GameLedger>, CommandRouteError> {
        self.ledger
            .lock()
            .map_err(|_| CommandRouteError::Service("game ledger lock poisoned".to_owned()))
    }
}

/// Slack-style `seconds.micros` message timestamp.
fn message_ts(now: DateTime<Utc>) -> String {
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

#[async_trait]
impl TwoTruthsService for LocalGameService {
    async fn submit(
        &self,
        submission: Submission,
        channel_id: &str,
        request_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let now = Utc::now();
        let mut ledger = self.lock()?;
        let poll = ledger.submit(&submission, channel_id, &message_ts(now), now)?;

        info!(
            event_name = "game.poll.submitted",
            request_id = %request_id,
            poll_id = poll.id.0,
            channel_id = %channel_id,
            teller = %submission.name,
            "recorded submission as open poll"
        );
        Ok(blocks::poll_announcement(&submission))
    }

    async fn record_reaction(
        &self,
        message_ts: &str,
        emoji: &str,
        user_id: &str,
    ) -> Result<bool, CommandRouteError> {
        let mut ledger = self.lock()?;
        let on_open_poll = ledger.open_poll().is_some_and(|poll| poll.message_ts == message_ts);
        if !on_open_poll {
            debug!(
                event_name = "game.reaction.ignored",
                message_ts = %message_ts,
                emoji = %emoji,
                "reaction is not on the open poll"
            );
            return Ok(false);
        }

        let poll_id = ledger.record_reaction(emoji, user_id)?;
        debug!(
            event_name = "game.reaction.recorded",
            poll_id = poll_id.0,
            emoji = %emoji,
            user_id = %user_id,
            "recorded reaction on open poll"
        );
        Ok(true)
    }

    async fn remove_reaction(
        &self,
        message_ts: &str,
        emoji: &str,
        user_id: &str,
    ) -> Result<bool, CommandRouteError> {
        let mut ledger = self.lock()?;
        let on_open_poll = ledger.open_poll().is_some_and(|poll| poll.message_ts == message_ts);
        if !on_open_poll {
            debug!(
                event_name = "game.reaction.ignored",
                message_ts = %message_ts,
                emoji = %emoji,
                "reaction removal is not on the open poll"
            );
            return Ok(false);
        }

        let removed = ledger.remove_reaction(emoji, user_id)?;
        debug!(
            event_name = "game.reaction.removed",
            emoji = %emoji,
            user_id = %user_id,
            removed,
            "reaction removed from open poll"
        );
        Ok(removed)
    }

    async fn close_poll(
        &self,
        lie: Choice,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let mut ledger = self.lock()?;
        let outcome = ledger.close_open_poll(lie, self.bot_user_id.as_deref())?;

        info!(
            event_name = "game.poll.closed",
            request_id = %envelope.request_id,
            poll_id = outcome.poll_id.0,
            lie = %lie,
            votes_recorded = outcome.votes_recorded,
            closed_by = %envelope.user_id,
            "closed poll"
        );
        Ok(blocks::poll_closed_message(&outcome))
    }

    async fn leaderboard(
        &self,
        scope: YearScope,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let ledger = self.lock()?;
        let entries =
            Scoreboard::new(&ledger, &self.ranking).leaderboard(scope, &mut rand::thread_rng())?;
        Ok(blocks::leaderboard_message(scope, &entries))
    }

    async fn winners(
        &self,
        scope: YearScope,
        _envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let ledger = self.lock()?;
        let winners =
            Scoreboard::new(&ledger, &self.ranking).winners(scope, &mut rand::thread_rng())?;
        Ok(blocks::winners_message(scope, &winners))
    }

    async fn my_stats(
        &self,
        scope: YearScope,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let ledger = self.lock()?;
        let stats = Scoreboard::new(&ledger, &self.ranking).personal(&envelope.user_id, scope)?;
        Ok(blocks::my_stats_message(scope, stats.as_ref()))
    }
}
