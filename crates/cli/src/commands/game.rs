//! Game commands. Each one loads the ledger, feeds a single Slack event through the same
//! dispatcher the bot uses, and writes the ledger back if the event changed it.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::info;
use twotruths_core::{ApplicationError, AppConfig, GameLedger};
use twotruths_slack::blocks::NEW_SUBMISSION_ACTION;
use twotruths_slack::commands::{SlashCommandPayload, SLASH_COMMAND};
use twotruths_slack::events::{
    game_dispatcher, parse_interaction_payload, DispatchError, EventContext, EventDispatcher,
    HandlerResult, ReactionEvent, SlackEnvelope, SlackEvent, ViewSubmissionEvent,
};
use uuid::Uuid;

use super::{block_on, CommandResult, EXIT_PERSISTENCE, EXIT_REJECTED, EXIT_RUNTIME};
use crate::service::LocalGameService;
use crate::store::LedgerStore;

/// Acting user for commands that do not name one.
pub const OPERATOR_USER: &str = "UOPERATOR";
pub const CLI_CHANNEL: &str = "CCLI";

pub fn leaderboard(config: &AppConfig, year: Option<&str>) -> CommandResult {
    slash(config, &with_year("leaderboard", year), OPERATOR_USER, CLI_CHANNEL)
}

pub fn winners(config: &AppConfig, year: Option<&str>) -> CommandResult {
    slash(config, &with_year("winners", year), OPERATOR_USER, CLI_CHANNEL)
}

pub fn mystats(config: &AppConfig, user_id: &str, year: Option<&str>) -> CommandResult {
    slash(config, &with_year("mystats", year), user_id, CLI_CHANNEL)
}

pub fn close(config: &AppConfig, lie: &str) -> CommandResult {
    slash(config, &format!("close {lie}"), OPERATOR_USER, CLI_CHANNEL)
}

/// Routes raw `/twotruths` text as `user_id` would send it from `channel_id`.
pub fn slash(config: &AppConfig, text: &str, user_id: &str, channel_id: &str) -> CommandResult {
    let token = config.slack.verification_token.expose_secret().to_owned();
    let event = SlackEvent::SlashCommand(SlashCommandPayload {
        command: SLASH_COMMAND.to_owned(),
        text: text.to_owned(),
        token,
        channel_id: channel_id.to_owned(),
        user_id: user_id.to_owned(),
        trigger_ts: Uuid::new_v4().to_string(),
        request_id: Uuid::new_v4().to_string(),
    });

    run_event("slash", config, |_| Ok(event))
}

/// Submits statements the way the "new" form does; `statements` holds one per line.
pub fn submit(config: &AppConfig, name: &str, statements: &str, channel_id: &str) -> CommandResult {
    let event = SlackEvent::ViewSubmission(ViewSubmissionEvent {
        callback_id: NEW_SUBMISSION_ACTION.to_owned(),
        channel_id: channel_id.to_owned(),
        user_id: OPERATOR_USER.to_owned(),
        name: Some(name.to_owned()),
        statements: Some(statements.to_owned()),
    });

    run_event("submit", config, |_| Ok(event))
}

/// Adds `user_id`'s reaction to the open poll, or takes it back when `remove` is set.
pub fn react(config: &AppConfig, emoji: &str, user_id: &str, remove: bool) -> CommandResult {
    run_event("react", config, |ledger| {
        let Some(poll) = ledger.open_poll() else {
            return Err(CommandResult::failure(
                "react",
                "no_open_poll",
                "There's no vote open!",
                EXIT_REJECTED,
            ));
        };
        let reaction = ReactionEvent {
            channel_id: poll.channel_id.clone(),
            message_ts: poll.message_ts.clone(),
            user_id: user_id.to_owned(),
            reaction: emoji.trim().trim_matches(':').to_owned(),
        };
        Ok(if remove {
            SlackEvent::ReactionRemoved(reaction)
        } else {
            SlackEvent::ReactionAdded(reaction)
        })
    })
}

/// Replays an interactivity or Events API body.
pub fn interact(config: &AppConfig, payload: &str) -> CommandResult {
    let event = match parse_interaction_payload(payload) {
        Ok(event) => event,
        Err(error) => {
            return CommandResult::failure(
                "interact",
                "invalid_payload",
                error.to_string(),
                EXIT_REJECTED,
            )
        }
    };

    run_event("interact", config, |_| Ok(event))
}

fn with_year(verb: &str, year: Option<&str>) -> String {
    match year.map(str::trim).filter(|year| !year.is_empty()) {
        Some(year) => format!("{verb} {year}"),
        None => verb.to_owned(),
    }
}

fn run_event<F>(command: &str, config: &AppConfig, build_event: F) -> CommandResult
where
    F: FnOnce(&GameLedger) -> Result<SlackEvent, CommandResult>,
{
    let session = match GameSession::open(config) {
        Ok(session) => session,
        Err(error) => return persistence_failure(command, error),
    };
    let event = match build_event(&session.loaded) {
        Ok(event) => event,
        Err(rejection) => return rejection,
    };

    let outcome = match block_on(session.dispatch(event)) {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(error)) => {
            return CommandResult::failure(command, "dispatch", error.to_string(), EXIT_RUNTIME)
        }
        Err(error) => {
            return CommandResult::failure(command, "runtime", format!("{error:#}"), EXIT_RUNTIME)
        }
    };

    if let Err(error) = session.persist() {
        return persistence_failure(command, error);
    }

    render(command, outcome)
}

fn render(command: &str, outcome: HandlerResult) -> CommandResult {
    match outcome {
        HandlerResult::Responded(message) => CommandResult::text(message.fallback_text),
        HandlerResult::OpenView(view) => match serde_json::to_string_pretty(&view) {
            Ok(view) => CommandResult::text(view),
            Err(error) => {
                CommandResult::failure(command, "serialization", error.to_string(), EXIT_RUNTIME)
            }
        },
        HandlerResult::ValidationErrors(errors) => {
            let message = errors
                .iter()
                .map(|(field, message)| format!("{field}: {message}"))
                .collect::<Vec<_>>()
                .join("; ");
            CommandResult::failure(command, "validation", message, EXIT_REJECTED)
        }
        HandlerResult::Processed => CommandResult::success(command, "event processed"),
        HandlerResult::Ignored => {
            CommandResult::failure(command, "ignored", "event was ignored", EXIT_REJECTED)
        }
    }
}

fn persistence_failure(command: &str, error: ApplicationError) -> CommandResult {
    CommandResult::failure(command, "persistence", error.to_string(), EXIT_PERSISTENCE)
}

struct GameSession {
    store: LedgerStore,
    loaded: GameLedger,
    service: Arc<LocalGameService>,
    dispatcher: EventDispatcher,
}

impl GameSession {
    fn open(config: &AppConfig) -> Result<Self, ApplicationError> {
        let store = LedgerStore::new(&config.game.ledger_path);
        let loaded = store.load()?;
        let service = Arc::new(LocalGameService::new(loaded.clone(), config));
        let verification_token: SecretString = config.slack.verification_token.clone();
        let dispatcher = game_dispatcher(Arc::clone(&service), verification_token);

        Ok(Self { store, loaded, service, dispatcher })
    }

    async fn dispatch(&self, event: SlackEvent) -> Result<HandlerResult, DispatchError> {
        let envelope = SlackEnvelope { envelope_id: Uuid::new_v4().to_string(), event };
        let ctx = EventContext { correlation_id: Uuid::new_v4().to_string() };
        self.dispatcher.dispatch(&envelope, &ctx).await
    }

    /// Saves only when the event changed the ledger.
    fn persist(&self) -> Result<(), ApplicationError> {
        let current = self
            .service
            .snapshot()
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        if current == self.loaded {
            return Ok(());
        }

        self.store.save(&current)?;
        info!(
            event_name = "game.ledger.saved",
            path = %self.store.path().display(),
            polls = current.polls.len(),
            votes = current.votes.len(),
            "persisted game ledger"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use twotruths_core::AppConfig;

    use super::{close, leaderboard, mystats, react, slash, submit, with_year, OPERATOR_USER};
    use crate::store::LedgerStore;

    fn config_in(dir: &tempfile::TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.game.ledger_path = dir.path().join("ledger.json");
        config.ranking.leaderboard_min_votes = 1;
        config
    }

    #[test]
    fn year_argument_is_appended_only_when_present() {
        assert_eq!(with_year("winners", None), "winners");
        assert_eq!(with_year("winners", Some(" ")), "winners");
        assert_eq!(with_year("winners", Some("2019-2020")), "winners 2019-2020");
    }

    #[test]
    fn full_round_is_persisted_between_commands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(&dir);

        let opened = submit(&config, "Ada", "I sail\nI sing\nI skate", "C1");
        assert_eq!(opened.exit_code, 0, "{}", opened.output);
        assert!(opened.output.contains("Time to vote on Ada's three statements!"));

        assert_eq!(react(&config, ":one:", "U1", false).exit_code, 0);
        assert_eq!(react(&config, ":two:", "U1", false).exit_code, 0);
        assert_eq!(react(&config, "one", "U1", true).exit_code, 0);
        assert_eq!(react(&config, "three", "U2", false).exit_code, 0);
        assert_eq!(react(&config, "one", "U3", false).exit_code, 0);
        assert_eq!(react(&config, "one", "U3", true).exit_code, 0);

        let never_added = react(&config, "two", "U3", true);
        assert_eq!(never_added.exit_code, 4);
        assert!(never_added.output.contains("ignored"), "{}", never_added.output);

        let closed = close(&config, ":two:");
        assert_eq!(closed.exit_code, 0);
        assert!(closed.output.contains("The lie was :two:!"), "{}", closed.output);

        let ledger = LedgerStore::new(&config.game.ledger_path).load().expect("load");
        assert_eq!(ledger.votes.len(), 2);
        assert!(ledger.open_poll().is_none());

        let board = leaderboard(&config, None);
        assert!(board.output.starts_with("All Time Leaderboard:"), "{}", board.output);
        assert!(board.output.contains("<@U1> with 100% (1/1)"), "{}", board.output);

        let stats = mystats(&config, "U2", Some("2000"));
        assert!(stats.output.contains("No votes recorded for you yet!"), "{}", stats.output);
    }

    #[test]
    fn read_only_commands_do_not_create_a_ledger_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config_in(&dir);

        let help = slash(&config, "help", OPERATOR_USER, "C1");
        assert!(help.output.contains("/twotruths leaderboard [year]"));
        assert!(!config.game.ledger_path.exists());
    }

    #[test]
    fn reacting_without_an_open_poll_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = react(&config_in(&dir), "one", "U1", false);

        assert_eq!(result.exit_code, 4);
        assert!(result.output.contains("no_open_poll"));
    }

    #[test]
    fn invalid_submissions_report_the_failing_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = submit(&config_in(&dir), "Ada", "only one", "C1");

        assert_eq!(result.exit_code, 4);
        let expected = "statements: need 3 statements, got 1";
        assert!(result.output.contains(expected), "{}", result.output);
    }

    #[test]
    fn bad_year_is_answered_in_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = leaderboard(&config_in(&dir), Some("99999"));

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, "99999 doesn't seem like a valid year to me!");
    }
}
