use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, warn};
use twotruths_core::{ApplicationError, Choice, DomainError, Submission, YearScope};

use crate::blocks::{self, MessageTemplate};

pub const SLASH_COMMAND: &str = "/twotruths";
const IMPERSONATION_MARKER: &str = "__as";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    /// Verification token Slack sends with every request.
    pub token: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_ts: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub verb: String,
    pub args: String,
    pub channel_id: String,
    /// Acting user, after any `__as` impersonation.
    pub user_id: String,
    /// The real caller when `user_id` was impersonated.
    pub impersonated_by: Option<String>,
    pub trigger_ts: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TwoTruthsCommand {
    New,
    /// `None` when the argument is not a single choice emoji.
    Close { lie: Option<Choice> },
    Leaderboard { scope: YearScope },
    Winners { scope: YearScope },
    MyStats { scope: YearScope },
    Help,
    AdminHelp,
    DebugHelp,
    Version,
    WhoAmI,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("request verification token did not match")]
    Unauthorized,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    /// Shown to the caller as-is.
    #[error("{0}")]
    Rejected(String),
    #[error("command service failed: {0}")]
    Service(String),
}

impl From<DomainError> for CommandRouteError {
    fn from(error: DomainError) -> Self {
        Self::Rejected(error.to_string())
    }
}

impl From<ApplicationError> for CommandRouteError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(error) => error.into(),
            other => Self::Service(other.to_string()),
        }
    }
}

pub fn normalize_command(
    payload: SlashCommandPayload,
    verification_token: &SecretString,
) -> Result<CommandEnvelope, CommandParseError> {
    if payload.token != verification_token.expose_secret() {
        return Err(CommandParseError::Unauthorized);
    }
    if payload.command != SLASH_COMMAND {
        return Err(CommandParseError::UnsupportedCommand(payload.command));
    }

    let (text, impersonated) = split_impersonation(&payload.text);
    let (verb, args) = match text.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (text, ""),
    };

    let (user_id, impersonated_by) = match impersonated {
        Some(user_id) => (user_id, Some(payload.user_id)),
        None => (payload.user_id, None),
    };

    Ok(CommandEnvelope {
        verb: verb.to_ascii_lowercase(),
        args: args.to_owned(),
        channel_id: payload.channel_id,
        user_id,
        impersonated_by,
        trigger_ts: payload.trigger_ts,
        request_id: payload.request_id,
    })
}

/// `"leaderboard 2019 __as <@U123|ada>"` becomes `("leaderboard 2019", Some("U123"))`.
fn split_impersonation(text: &str) -> (&str, Option<String>) {
    let text = text.trim();
    let Some((command, mention)) = text.split_once(IMPERSONATION_MARKER) else {
        return (text, None);
    };

    let mention = mention.trim().trim_matches(|ch: char| matches!(ch, ' ' | '<' | '@' | '>'));
    let user_id = mention.split('|').next().unwrap_or_default().trim();
    if user_id.is_empty() {
        return (command.trim_end(), None);
    }
    (command.trim_end(), Some(user_id.to_owned()))
}

/// Unknown and empty verbs fall back to help.
pub fn parse_command(verb: &str, args: &str) -> Result<TwoTruthsCommand, DomainError> {
    let command = match verb {
        "new" => TwoTruthsCommand::New,
        "close" => TwoTruthsCommand::Close { lie: parse_lie(args) },
        "leaderboard" => TwoTruthsCommand::Leaderboard { scope: YearScope::parse(args)? },
        "winners" => TwoTruthsCommand::Winners { scope: YearScope::parse(args)? },
        "mystats" => TwoTruthsCommand::MyStats { scope: YearScope::parse(args)? },
        "adminhelp" => TwoTruthsCommand::AdminHelp,
        "debughelp" => TwoTruthsCommand::DebugHelp,
        "__version" => TwoTruthsCommand::Version,
        "__whoami" => TwoTruthsCommand::WhoAmI,
        _ => TwoTruthsCommand::Help,
    };
    Ok(command)
}

fn parse_lie(args: &str) -> Option<Choice> {
    let args = args.trim();
    if args.contains(char::is_whitespace) {
        return None;
    }
    args.parse().ok()
}

#[async_trait]
pub trait TwoTruthsService: Send + Sync {
    /// Records the submission as the open poll and returns its channel announcement.
    async fn submit(
        &self,
        submission: Submission,
        channel_id: &str,
        request_id: &str,
    ) -> Result<MessageTemplate, CommandRouteError>;

    /// `Ok(false)` when the reaction is not on the open poll's message.
    async fn record_reaction(
        &self,
        message_ts: &str,
        emoji: &str,
        user_id: &str,
    ) -> Result<bool, CommandRouteError>;

    /// `Ok(false)` when the reaction is not on the open poll's message or was never recorded.
    async fn remove_reaction(
        &self,
        message_ts: &str,
        emoji: &str,
        user_id: &str,
    ) -> Result<bool, CommandRouteError>;

    async fn close_poll(
        &self,
        lie: Choice,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn leaderboard(
        &self,
        scope: YearScope,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn winners(
        &self,
        scope: YearScope,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;

    async fn my_stats(
        &self,
        scope: YearScope,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError>;
}

pub struct CommandRouter<S> {
    service: Arc<S>,
    verification_token: SecretString,
}

impl<S> CommandRouter<S>
where
    S: TwoTruthsService,
{
    pub fn new(service: Arc<S>, verification_token: SecretString) -> Self {
        Self { service, verification_token }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Answers a raw slash command. Failures become reply messages.
    pub async fn handle(&self, payload: SlashCommandPayload) -> MessageTemplate {
        let request_id = payload.request_id.clone();
        let envelope = match normalize_command(payload, &self.verification_token) {
            Ok(envelope) => envelope,
            Err(CommandParseError::Unauthorized) => {
                warn!(
                    event_name = "slack.command.unauthorized",
                    request_id = %request_id,
                    "rejected slash command with a bad verification token"
                );
                return blocks::unauthorized_message();
            }
            Err(error) => return blocks::notice_message(&error.to_string()),
        };

        info!(
            event_name = "slack.command.routed",
            request_id = %envelope.request_id,
            verb = %envelope.verb,
            user_id = %envelope.user_id,
            impersonated_by = envelope.impersonated_by.as_deref().unwrap_or("none"),
            "routing slash command"
        );

        match self.route(&envelope).await {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    event_name = "slack.command.failed",
                    request_id = %envelope.request_id,
                    verb = %envelope.verb,
                    error = %error,
                    "slash command failed"
                );
                blocks::error_message(&error.to_string(), &envelope.request_id)
            }
        }
    }

    pub async fn route(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<MessageTemplate, CommandRouteError> {
        let command = match parse_command(&envelope.verb, &envelope.args) {
            Ok(command) => command,
            Err(error) => return Ok(blocks::notice_message(&error.to_string())),
        };

        let routed = match command {
            TwoTruthsCommand::New => Ok(blocks::new_poll_prompt()),
            TwoTruthsCommand::Close { lie: None } => Ok(blocks::close_usage_message()),
            TwoTruthsCommand::Close { lie: Some(lie) } => {
                self.service.close_poll(lie, envelope).await
            }
            TwoTruthsCommand::Leaderboard { scope } => {
                self.service.leaderboard(scope, envelope).await
            }
            TwoTruthsCommand::Winners { scope } => self.service.winners(scope, envelope).await,
            TwoTruthsCommand::MyStats { scope } => self.service.my_stats(scope, envelope).await,
            TwoTruthsCommand::Help => Ok(blocks::help_message()),
            TwoTruthsCommand::AdminHelp => Ok(blocks::admin_help_message()),
            TwoTruthsCommand::DebugHelp => Ok(blocks::debug_help_message()),
            TwoTruthsCommand::Version => Ok(blocks::notice_message(env!("CARGO_PKG_VERSION"))),
            TwoTruthsCommand::WhoAmI => {
                Ok(blocks::notice_message(&format!("Hello, <@{}>!", envelope.user_id)))
            }
        };

        match routed {
            Err(CommandRouteError::Rejected(message)) => Ok(blocks::notice_message(&message)),
            other => other,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use secrecy::SecretString;
    use twotruths_core::{Choice, DomainError, Submission, YearScope};

    use super::{
        normalize_command, parse_command, CommandEnvelope, CommandParseError, CommandRouteError,
        CommandRouter, SlashCommandPayload, TwoTruthsCommand, TwoTruthsService,
    };
    use crate::blocks::{self, MessageTemplate};

    pub(crate) const TOKEN: &str = "verify-me";

    /// Records which entrypoints were hit and with what.
    #[derive(Default)]
    pub(crate) struct RecordingService {
        pub(crate) calls: Mutex<Vec<String>>,
        pub(crate) fail_with: Option<CommandRouteError>,
    }

    impl RecordingService {
        fn record(&self, call: String) -> Result<MessageTemplate, CommandRouteError> {
            self.calls.lock().expect("lock").push(call.clone());
            match &self.fail_with {
                Some(error) => Err(error.clone()),
                None => Ok(blocks::notice_message(&call)),
            }
        }
    }

    #[async_trait]
    impl TwoTruthsService for RecordingService {
        async fn submit(
            &self,
            submission: Submission,
            channel_id: &str,
            _request_id: &str,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.record(format!("submit {} {channel_id}", submission.name))
        }

        async fn record_reaction(
            &self,
            message_ts: &str,
            emoji: &str,
            user_id: &str,
        ) -> Result<bool, CommandRouteError> {
            self.record(format!("react {message_ts} {emoji} {user_id}"))?;
            Ok(message_ts == "open")
        }

        async fn remove_reaction(
            &self,
            message_ts: &str,
            emoji: &str,
            user_id: &str,
        ) -> Result<bool, CommandRouteError> {
            self.record(format!("unreact {message_ts} {emoji} {user_id}"))?;
            Ok(message_ts == "open")
        }

        async fn close_poll(
            &self,
            lie: Choice,
            _envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.record(format!("close {lie}"))
        }

        async fn leaderboard(
            &self,
            scope: YearScope,
            envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.record(format!("leaderboard {} {}", scope.label(), envelope.user_id))
        }

        async fn winners(
            &self,
            scope: YearScope,
            _envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.record(format!("winners {}", scope.label()))
        }

        async fn my_stats(
            &self,
            scope: YearScope,
            envelope: &CommandEnvelope,
        ) -> Result<MessageTemplate, CommandRouteError> {
            self.record(format!("mystats {} {}", scope.label(), envelope.user_id))
        }
    }

    pub(crate) fn payload(text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: "/twotruths".to_owned(),
            text: text.to_owned(),
            token: TOKEN.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U_CALLER".to_owned(),
            trigger_ts: "1700000000.1".to_owned(),
            request_id: "req-1".to_owned(),
        }
    }

    fn router(service: RecordingService) -> CommandRouter<RecordingService> {
        CommandRouter::new(Arc::new(service), SecretString::from(TOKEN.to_owned()))
    }

    #[test]
    fn normalize_splits_verb_and_arguments() {
        let token = SecretString::from(TOKEN.to_owned());
        let envelope = normalize_command(payload("Leaderboard 2019"), &token).expect("normalized");

        assert_eq!(envelope.verb, "leaderboard");
        assert_eq!(envelope.args, "2019");
        assert_eq!(envelope.user_id, "U_CALLER");
        assert_eq!(envelope.impersonated_by, None);

        let bare = normalize_command(payload(""), &token).expect("normalized");
        assert_eq!(bare.verb, "");
        assert_eq!(bare.args, "");
    }

    #[test]
    fn normalize_applies_impersonation() {
        let token = SecretString::from(TOKEN.to_owned());
        let envelope = normalize_command(payload("mystats 2020 __as <@U123|ada>"), &token)
            .expect("normalized");

        assert_eq!(envelope.verb, "mystats");
        assert_eq!(envelope.args, "2020");
        assert_eq!(envelope.user_id, "U123");
        assert_eq!(envelope.impersonated_by.as_deref(), Some("U_CALLER"));

        let plain = normalize_command(payload("__whoami __as <@U9>"), &token).expect("normalized");
        assert_eq!(plain.verb, "__whoami");
        assert_eq!(plain.user_id, "U9");
    }

    #[test]
    fn normalize_rejects_bad_token_and_foreign_commands() {
        let token = SecretString::from(TOKEN.to_owned());
        let mut forged = payload("leaderboard");
        forged.token = "nope".to_owned();
        assert_eq!(normalize_command(forged, &token), Err(CommandParseError::Unauthorized));

        let mut other = payload("leaderboard");
        other.command = "/quote".to_owned();
        assert_eq!(
            normalize_command(other, &token),
            Err(CommandParseError::UnsupportedCommand("/quote".to_owned()))
        );
    }

    #[test]
    fn parse_command_covers_every_verb() {
        assert_eq!(parse_command("new", ""), Ok(TwoTruthsCommand::New));
        assert_eq!(
            parse_command("close", ":two:"),
            Ok(TwoTruthsCommand::Close { lie: Some(Choice::Two) })
        );
        assert_eq!(parse_command("close", "two three"), Ok(TwoTruthsCommand::Close { lie: None }));
        assert_eq!(parse_command("close", ":four:"), Ok(TwoTruthsCommand::Close { lie: None }));
        assert_eq!(
            parse_command("leaderboard", ""),
            Ok(TwoTruthsCommand::Leaderboard { scope: YearScope::AllTime })
        );
        assert_eq!(
            parse_command("winners", "2019"),
            Ok(TwoTruthsCommand::Winners { scope: YearScope::year(2019).expect("year") })
        );
        assert_eq!(
            parse_command("mystats", "0"),
            Err(DomainError::InvalidYear("0".to_owned()))
        );
        assert_eq!(parse_command("adminhelp", ""), Ok(TwoTruthsCommand::AdminHelp));
        assert_eq!(parse_command("debughelp", ""), Ok(TwoTruthsCommand::DebugHelp));
        assert_eq!(parse_command("__version", ""), Ok(TwoTruthsCommand::Version));
        assert_eq!(parse_command("__whoami", ""), Ok(TwoTruthsCommand::WhoAmI));
        assert_eq!(parse_command("stats", ""), Ok(TwoTruthsCommand::Help));
        assert_eq!(parse_command("", ""), Ok(TwoTruthsCommand::Help));
    }

    #[tokio::test]
    async fn router_calls_service_entrypoints() {
        let router = router(RecordingService::default());
        for text in ["close :one:", "leaderboard 2019", "winners", "mystats __as <@U7>"] {
            router.handle(payload(text)).await;
        }

        let calls = router.service().calls.lock().expect("lock").clone();
        assert_eq!(
            calls,
            vec![
                "close :one:".to_owned(),
                "leaderboard 2019 U_CALLER".to_owned(),
                "winners All Time".to_owned(),
                "mystats All Time U7".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn router_answers_local_verbs_without_the_service() {
        let router = router(RecordingService::default());

        let whoami = router.handle(payload("__whoami")).await;
        assert_eq!(whoami.fallback_text, "Hello, <@U_CALLER>!");

        let help = router.handle(payload("what")).await;
        assert!(help.fallback_text.contains("/twotruths leaderboard [year]"));

        let usage = router.handle(payload("close two three")).await;
        assert_eq!(usage.fallback_text, "usage: close :<lie>:");

        let version = router.handle(payload("__version")).await;
        assert_eq!(version.fallback_text, env!("CARGO_PKG_VERSION"));

        let new = router.handle(payload("new")).await;
        assert_eq!(new.blocks.len(), 1);

        assert!(router.service().calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn router_reports_invalid_years_and_bad_tokens() {
        let router = router(RecordingService::default());

        let invalid = router.handle(payload("leaderboard 99999")).await;
        assert_eq!(invalid.fallback_text, "99999 doesn't seem like a valid year to me!");

        let mut forged = payload("leaderboard");
        forged.token = "wrong".to_owned();
        let unauthorized = router.handle(forged).await;
        assert_eq!(unauthorized.fallback_text, "unauthorized :(");
        assert!(router.service().calls.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn rejected_service_calls_become_notices_and_failures_errors() {
        let rejecting = router(RecordingService {
            fail_with: Some(DomainError::NoOpenPoll.into()),
            ..RecordingService::default()
        });
        let reply = rejecting.handle(payload("close :three:")).await;
        assert_eq!(reply.fallback_text, "There's no vote open!");

        let failing = router(RecordingService {
            fail_with: Some(CommandRouteError::Service("disk full".to_owned())),
            ..RecordingService::default()
        });
        let reply = failing.handle(payload("winners")).await;
        assert!(reply.fallback_text.starts_with("Something went very wrong"));
        assert!(reply.fallback_text.contains("disk full"));
    }
}
