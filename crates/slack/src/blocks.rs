use serde::Serialize;
use twotruths_core::domain::poll::{Choice, Submission};
use twotruths_core::ranking::PersonalStats;
use twotruths_core::scoreboard::{LeaderboardEntry, WinnerEntry};
use twotruths_core::{PollOutcome, YearScope};

/// `action_id` of the button that opens the submission form, and `callback_id` of the form.
pub const NEW_SUBMISSION_ACTION: &str = "new";
pub const NAME_INPUT: &str = "name";
pub const STATEMENTS_INPUT: &str = "statements";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Context { block_id: String, elements: Vec<TextObject> },
}

/// Who sees a slash command reply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    #[default]
    Ephemeral,
    InChannel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub response_type: ResponseType,
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    response_type: ResponseType,
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Ephemeral,
            fallback_text: fallback_text.into(),
            blocks: Vec::new(),
        }
    }

    pub fn in_channel(mut self) -> Self {
        self.response_type = ResponseType::InChannel;
        self
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate {
            response_type: self.response_type,
            fallback_text: self.fallback_text,
            blocks: self.blocks,
        }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Modal the "click me" button opens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModalView {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub callback_id: String,
    pub title: TextObject,
    pub submit: TextObject,
    /// Channel the poll will be posted to.
    pub private_metadata: String,
    pub blocks: Vec<InputBlock>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InputBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub block_id: String,
    pub label: TextObject,
    pub element: PlainTextInput,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlainTextInput {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub action_id: String,
    pub multiline: bool,
}

impl InputBlock {
    fn text(id: &str, label: &str, multiline: bool) -> Self {
        Self {
            kind: "input",
            block_id: id.to_owned(),
            label: TextObject::plain(label),
            element: PlainTextInput {
                kind: "plain_text_input",
                action_id: id.to_owned(),
                multiline,
            },
        }
    }
}

pub fn submission_form(channel_id: &str) -> ModalView {
    ModalView {
        kind: "modal",
        callback_id: NEW_SUBMISSION_ACTION.to_owned(),
        title: TextObject::plain("New Two Truths and a Lie"),
        submit: TextObject::plain("Submit"),
        private_metadata: channel_id.to_owned(),
        blocks: vec![
            InputBlock::text(NAME_INPUT, "Name", false),
            InputBlock::text(STATEMENTS_INPUT, "Statements (one per line)", true),
        ],
    }
}

/// A bare text reply.
pub fn notice_message(text: &str) -> MessageTemplate {
    MessageBuilder::new(text)
        .section("twotruths.notice.v1", |section| {
            section.mrkdwn(text);
        })
        .build()
}

pub fn new_poll_prompt() -> MessageTemplate {
    MessageBuilder::new("Click the button to enter three statements.")
        .actions("twotruths.new.actions.v1", |actions| {
            actions.button(
                ButtonElement::new(NEW_SUBMISSION_ACTION, "click me").style(ButtonStyle::Primary),
            );
        })
        .build()
}

pub fn poll_announcement(submission: &Submission) -> MessageTemplate {
    let text = submission.announcement();
    MessageBuilder::new(text.clone())
        .in_channel()
        .section("twotruths.poll.announcement.v1", |section| {
            section.mrkdwn(text);
        })
        .context("twotruths.poll.choices.v1", |context| {
            let emoji = Choice::ALL.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ");
            context.mrkdwn(format!("Vote with {emoji}"));
        })
        .build()
}

pub fn poll_closed_message(outcome: &PollOutcome) -> MessageTemplate {
    MessageBuilder::new(outcome.announcement.clone())
        .in_channel()
        .section("twotruths.poll.closed.v1", |section| {
            section.mrkdwn(outcome.announcement.clone());
        })
        .context("twotruths.poll.votes.v1", |context| {
            context.plain(format!("{} votes recorded", outcome.votes_recorded));
        })
        .build()
}

pub fn close_usage_message() -> MessageTemplate {
    notice_message("usage: close :<lie>:")
}

pub fn leaderboard_message(scope: YearScope, entries: &[LeaderboardEntry]) -> MessageTemplate {
    let heading = format!("{} Leaderboard", scope.label());
    let lines = entries
        .iter()
        .map(|entry| format!("{}. {} with {}", entry.rank, entry.name, entry.tally.describe()))
        .collect::<Vec<_>>()
        .join("\n");

    ranked_message("twotruths.leaderboard", &heading, &lines)
}

pub fn winners_message(scope: YearScope, winners: &[WinnerEntry]) -> MessageTemplate {
    let heading = format!("{} Winners", scope.label());
    let lines = winners
        .iter()
        .map(|winner| {
            format!("{}: {} with {}", winner.category.label(), winner.name, winner.tally.describe())
        })
        .collect::<Vec<_>>()
        .join("\n");

    ranked_message("twotruths.winners", &heading, &lines)
}

fn ranked_message(block_prefix: &str, heading: &str, lines: &str) -> MessageTemplate {
    let builder = MessageBuilder::new(format!("{heading}:\n{lines}"))
        .in_channel()
        .section(format!("{block_prefix}.heading.v1"), |section| {
            section.mrkdwn(format!("*{heading}*"));
        });

    if lines.is_empty() {
        return builder
            .context(format!("{block_prefix}.empty.v1"), |context| {
                context.plain("Nobody has enough votes yet.");
            })
            .build();
    }

    builder
        .section(format!("{block_prefix}.entries.v1"), |section| {
            section.mrkdwn(lines);
        })
        .build()
}

pub fn my_stats_message(scope: YearScope, stats: Option<&PersonalStats>) -> MessageTemplate {
    let Some(stats) = stats else {
        return notice_message("No votes recorded for you yet!");
    };

    let text = format!(
        "Your {} Stats: {}/{} ({:.0}%).\nYou are statistically {}.",
        scope.label(),
        stats.tally.correct(),
        stats.tally.total(),
        stats.tally.percent(),
        stats.performance.describe()
    );
    notice_message(&text)
}

pub fn help_message() -> MessageTemplate {
    notice_message(
        "To post the leaderboard in this channel, `/twotruths leaderboard [year]`.\n\
         To post the \"winners\" (by various measures) in this channel, `/twotruths winners [year]`.\n\
         To see your personal stats, `/twotruths mystats [year]`.\n\
         To see this help, `/twotruths help`.",
    )
}

pub fn admin_help_message() -> MessageTemplate {
    notice_message(
        "To enter statements, `/twotruths new`.\n\
         To close voting, `/twotruths close :number-that-was-a-lie:`.\n\
         To see this admin help, `/twotruths adminhelp`.\n\
         To see help for user commands, `/twotruths help`.",
    )
}

pub fn debug_help_message() -> MessageTemplate {
    notice_message(
        "Commands include: __version, __whoami.\n\
         Suffix any command with \"__as @-mention\" to impersonate a user.",
    )
}

pub fn unauthorized_message() -> MessageTemplate {
    notice_message("unauthorized :(")
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Something went very wrong: {summary}!"))
        .section("twotruths.error.summary.v1", |section| {
            section.mrkdwn(format!(":warning: Something went very wrong: {summary}!"));
        })
        .context("twotruths.error.context.v1", |context| {
            context.plain(format!("Correlation ID: {correlation_id}"));
        })
        .build()
}
