use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use twotruths_core::Submission;

use crate::{
    blocks::{self, MessageTemplate, ModalView, NAME_INPUT, NEW_SUBMISSION_ACTION, STATEMENTS_INPUT},
    commands::{CommandRouteError, CommandRouter, SlashCommandPayload, TwoTruthsService},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    BlockAction(BlockActionEvent),
    ViewSubmission(ViewSubmissionEvent),
    ReactionAdded(ReactionEvent),
    ReactionRemoved(ReactionEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::ViewSubmission(_) => SlackEventType::ViewSubmission,
            Self::ReactionAdded(_) => SlackEventType::ReactionAdded,
            Self::ReactionRemoved(_) => SlackEventType::ReactionRemoved,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    BlockAction,
    ViewSubmission,
    ReactionAdded,
    ReactionRemoved,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub channel_id: String,
    pub user_id: String,
    pub trigger_id: String,
    pub action_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewSubmissionEvent {
    pub callback_id: String,
    /// Channel the poll should be posted to.
    pub channel_id: String,
    pub user_id: String,
    pub name: Option<String>,
    pub statements: Option<String>,
}

/// A `reaction_added` or `reaction_removed` on a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionEvent {
    pub channel_id: String,
    pub message_ts: String,
    pub user_id: String,
    pub reaction: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    OpenView(ModalView),
    /// Per-input errors shown inline on the submission form.
    ValidationErrors(BTreeMap<String, String>),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("interaction payload is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("interaction payload of type `{kind}` is malformed: {reason}")]
    Malformed { kind: String, reason: String },
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            debug!(
                event_name = "slack.event.ignored",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                "no handler registered for slack event"
            );
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Every handler the game needs, sharing one service.
pub fn game_dispatcher<S>(service: Arc<S>, verification_token: SecretString) -> EventDispatcher
where
    S: TwoTruthsService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(Arc::clone(&service), verification_token));
    dispatcher.register(BlockActionHandler);
    dispatcher.register(ViewSubmissionHandler::new(Arc::clone(&service)));
    dispatcher.register(ReactionAddedHandler::new(Arc::clone(&service)));
    dispatcher.register(ReactionRemovedHandler::new(service));
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: TwoTruthsService,
{
    pub fn new(service: Arc<S>, verification_token: SecretString) -> Self {
        Self { router: CommandRouter::new(service, verification_token) }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: TwoTruthsService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        Ok(HandlerResult::Responded(self.router.handle(payload.clone()).await))
    }
}

/// Opens the submission form for the "click me" button.
pub struct BlockActionHandler;

#[async_trait]
impl EventHandler for BlockActionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        if event.action_id != NEW_SUBMISSION_ACTION {
            warn!(
                event_name = "slack.action.unknown",
                envelope_id = %envelope.envelope_id,
                action_id = %event.action_id,
                "ignoring unknown block action"
            );
            return Ok(HandlerResult::Ignored);
        }

        Ok(HandlerResult::OpenView(blocks::submission_form(&event.channel_id)))
    }
}

pub struct ViewSubmissionHandler<S> {
    service: Arc<S>,
}

impl<S> ViewSubmissionHandler<S>
where
    S: TwoTruthsService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ViewSubmissionHandler<S>
where
    S: TwoTruthsService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ViewSubmission
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.callback_id != NEW_SUBMISSION_ACTION {
            return Ok(HandlerResult::Ignored);
        }

        let name = event.name.as_deref().unwrap_or_default();
        if name.trim().is_empty() {
            return Ok(field_error(NAME_INPUT, "a name is required"));
        }
        let submission =
            match Submission::parse(name, event.statements.as_deref().unwrap_or_default()) {
                Ok(submission) => submission,
                Err(error) => return Ok(field_error(STATEMENTS_INPUT, &error.to_string())),
            };

        match self.service.submit(submission, &event.channel_id, &ctx.correlation_id).await {
            Ok(announcement) => {
                info!(
                    event_name = "game.poll.opened",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    submitted_by = %event.user_id,
                    "opened poll from submission form"
                );
                Ok(HandlerResult::Responded(announcement))
            }
            Err(CommandRouteError::Rejected(message)) => {
                Ok(field_error(STATEMENTS_INPUT, &message))
            }
            Err(error) => Err(error.into()),
        }
    }
}

fn field_error(field: &str, message: &str) -> HandlerResult {
    HandlerResult::ValidationErrors(BTreeMap::from([(field.to_owned(), message.to_owned())]))
}

pub struct ReactionAddedHandler<S> {
    service: Arc<S>,
}

impl<S> ReactionAddedHandler<S>
where
    S: TwoTruthsService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ReactionAddedHandler<S>
where
    S: TwoTruthsService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ReactionAdded
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ReactionAdded(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let recorded = match self
            .service
            .record_reaction(&event.message_ts, &event.reaction, &event.user_id)
            .await
        {
            Ok(recorded) => recorded,
            Err(CommandRouteError::Rejected(_)) => false,
            Err(error) => return Err(error.into()),
        };

        Ok(if recorded { HandlerResult::Processed } else { HandlerResult::Ignored })
    }
}

pub struct ReactionRemovedHandler<S> {
    service: Arc<S>,
}

impl<S> ReactionRemovedHandler<S>
where
    S: TwoTruthsService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ReactionRemovedHandler<S>
where
    S: TwoTruthsService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ReactionRemoved
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ReactionRemoved(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let removed = match self
            .service
            .remove_reaction(&event.message_ts, &event.reaction, &event.user_id)
            .await
        {
            Ok(removed) => removed,
            Err(CommandRouteError::Rejected(_)) => false,
            Err(error) => return Err(error.into()),
        };

        Ok(if removed { HandlerResult::Processed } else { HandlerResult::Ignored })
    }
}

/// Reads an interactivity or Events API body as Slack posts it.
pub fn parse_interaction_payload(raw: &str) -> Result<SlackEvent, EventParseError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|error| EventParseError::InvalidJson(error.to_string()))?;
    let kind = value.get("type").and_then(serde_json::Value::as_str).unwrap_or_default().to_owned();

    let malformed = |error: serde_json::Error| EventParseError::Malformed {
        kind: kind.clone(),
        reason: error.to_string(),
    };

    match kind.as_str() {
        "block_actions" | "interactive_message" => {
            let raw: RawBlockActions = serde_json::from_value(value).map_err(malformed)?;
            let action = raw.actions.into_iter().next().ok_or_else(|| {
                EventParseError::Malformed { kind: kind.clone(), reason: "no actions".to_owned() }
            })?;
            Ok(SlackEvent::BlockAction(BlockActionEvent {
                channel_id: raw.channel.map(|channel| channel.id).unwrap_or_default(),
                user_id: raw.user.id,
                trigger_id: raw.trigger_id,
                action_id: action.action_id,
            }))
        }
        "view_submission" => {
            let raw: RawViewSubmission = serde_json::from_value(value).map_err(malformed)?;
            let input = |block: &str| {
                raw.view
                    .state
                    .values
                    .get(block)
                    .and_then(|actions| actions.get(block))
                    .and_then(|input| input.value.clone())
            };
            Ok(SlackEvent::ViewSubmission(ViewSubmissionEvent {
                name: input(NAME_INPUT),
                statements: input(STATEMENTS_INPUT),
                callback_id: raw.view.callback_id.clone(),
                channel_id: raw.view.private_metadata.clone(),
                user_id: raw.user.id.clone(),
            }))
        }
        "event_callback" => {
            let raw: RawEventCallback = serde_json::from_value(value).map_err(malformed)?;
            let event = raw.event;
            let reaction = ReactionEvent {
                channel_id: event.item.channel,
                message_ts: event.item.ts,
                user_id: event.user,
                reaction: event.reaction,
            };
            match event.kind.as_str() {
                "reaction_added" => Ok(SlackEvent::ReactionAdded(reaction)),
                "reaction_removed" => Ok(SlackEvent::ReactionRemoved(reaction)),
                other => Ok(SlackEvent::Unsupported { event_type: other.to_owned() }),
            }
        }
        _ => Ok(SlackEvent::Unsupported { event_type: kind.clone() }),
    }
}

#[derive(Deserialize)]
struct RawUser {
    id: String,
}

#[derive(Deserialize)]
struct RawChannel {
    id: String,
}

#[derive(Deserialize)]
struct RawAction {
    action_id: String,
}

#[derive(Deserialize)]
struct RawBlockActions {
    #[serde(default)]
    trigger_id: String,
    user: RawUser,
    channel: Option<RawChannel>,
    actions: Vec<RawAction>,
}

#[derive(Deserialize)]
struct RawViewSubmission {
    user: RawUser,
    view: RawView,
}

#[derive(Deserialize)]
struct RawView {
    callback_id: String,
    #[serde(default)]
    private_metadata: String,
    #[serde(default)]
    state: RawViewState,
}

#[derive(Default, Deserialize)]
struct RawViewState {
    #[serde(default)]
    values: HashMap<String, HashMap<String, RawInputValue>>,
}

#[derive(Deserialize)]
struct RawInputValue {
    value: Option<String>,
}

#[derive(Deserialize)]
struct RawEventCallback {
    event: RawEvent,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    user: String,
    #[serde(default)]
    reaction: String,
    #[serde(default)]
    item: RawItem,
}

#[derive(Default, Deserialize)]
struct RawItem {
    #[serde(default)]
    channel: String,
    #[serde(default)]
    ts: String,
}
