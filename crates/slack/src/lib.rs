//! Slack surface for the Two Truths and a Lie game
//!
//! - **Slash Commands** (`commands`) - `/twotruths leaderboard`, `/twotruths close :two:`, etc.
//! - **Events** (`events`) - the "click me" button, the submission form, poll reactions
//! - **Block Kit** (`blocks`) - reply builders for leaderboards, winners and poll messages
//!
//! # Getting Started
//!
//! 1. Create a Slack app at https://api.slack.com/apps
//! 2. Add the `/twotruths` slash command and enable interactivity
//! 3. Subscribe to `reaction_added` events
//! 4. Set env vars: `TWOTRUTHS_SLACK_BOT_TOKEN`, `TWOTRUTHS_SLACK_VERIFICATION_TOKEN`
//!
//! # Architecture
//!
//! ```text
//! Slack payload → EventDispatcher → Handlers → TwoTruthsService → Game ledger
//!                     ↓
//!               Block Kit reply
//! ```
//!
//! # Key Types
//!
//! - `EventDispatcher` - Routes events to the handler registered for their type
//! - `CommandRouter` - Verifies, normalizes and routes slash commands
//! - `MessageBuilder` - Constructs Block Kit messages
//! - `TwoTruthsService` - Trait the game store implements

pub mod blocks;
pub mod commands;
pub mod events;
