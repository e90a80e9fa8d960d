pub mod commands;
pub mod service;
pub mod store;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use twotruths_core::config::{AppConfig, ConfigOverrides, LoadOptions};

use commands::game::{CLI_CHANNEL, OPERATOR_USER};
use commands::{CommandResult, EXIT_CONFIG};

#[derive(Debug, Parser)]
#[command(
    name = "twotruths",
    about = "Two Truths and a Lie operator CLI",
    long_about = "Play Two Truths and a Lie against a local game ledger, inspect rankings, and check configuration.",
    after_help = "Examples:\n  twotruths submit --name Ada --statements \"$(printf 'I sail\\nI sing\\nI skate')\"\n  twotruths react --emoji two --user U123\n  twotruths react --emoji two --user U123 --remove\n  twotruths close --lie two\n  twotruths leaderboard --year 2019-2020\n  twotruths doctor --json"
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Config file (default: twotruths.toml or config/twotruths.toml)"
    )]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Game ledger JSON file, overriding game.ledger_path")]
    ledger: Option<PathBuf>,
    #[arg(long, global = true, help = "Log level, overriding logging.level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Wilson interval confidence, overriding ranking.confidence")]
    confidence: Option<f64>,
    #[arg(long, global = true, help = "Slack bot token")]
    bot_token: Option<String>,
    #[arg(long, global = true, help = "Slack request verification token")]
    verification_token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Print the voter leaderboard")]
    Leaderboard {
        #[arg(long, help = "Year (2019) or range (2019-2020); all time when omitted")]
        year: Option<String>,
    },
    #[command(about = "Print the winner of each category")]
    Winners {
        #[arg(long, help = "Year (2019) or range (2019-2020); all time when omitted")]
        year: Option<String>,
    },
    #[command(name = "mystats", about = "Print one voter's personal stats")]
    MyStats {
        #[arg(long, help = "Slack user id of the voter")]
        user: String,
        #[arg(long, help = "Year (2019) or range (2019-2020); all time when omitted")]
        year: Option<String>,
    },
    #[command(about = "Route raw /twotruths text through the slash-command router")]
    Slash {
        text: String,
        #[arg(long, default_value = OPERATOR_USER)]
        user: String,
        #[arg(long, default_value = CLI_CHANNEL)]
        channel: String,
    },
    #[command(about = "Submit two truths and a lie and open a poll on them")]
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long, help = "Three statements, one per line")]
        statements: String,
        #[arg(long, default_value = CLI_CHANNEL)]
        channel: String,
    },
    #[command(about = "React to the open poll as a voter, or take a reaction back")]
    React {
        #[arg(long, help = "Emoji name, e.g. one, two or three")]
        emoji: String,
        #[arg(long)]
        user: String,
        #[arg(long, help = "Remove the reaction instead of adding it")]
        remove: bool,
    },
    #[command(about = "Close the open poll, naming the lie")]
    Close {
        #[arg(long, help = "Emoji of the lie, e.g. :two:")]
        lie: String,
    },
    #[command(about = "Feed a Slack interactivity or Events API JSON body to the event dispatcher")]
    Interact {
        #[arg(long)]
        payload: String,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack token readiness, and ledger readability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Leaderboard { .. } => "leaderboard",
            Self::Winners { .. } => "winners",
            Self::MyStats { .. } => "mystats",
            Self::Slash { .. } => "slash",
            Self::Submit { .. } => "submit",
            Self::React { .. } => "react",
            Self::Close { .. } => "close",
            Self::Interact { .. } => "interact",
            Self::Config => "config",
            Self::Doctor { .. } => "doctor",
        }
    }
}

impl Cli {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                ledger_path: self.ledger.clone(),
                log_level: self.log_level.clone(),
                confidence: self.confidence,
                slack_bot_token: self.bot_token.clone(),
                slack_verification_token: self.verification_token.clone(),
            },
        }
    }
}

pub fn execute(cli: Cli) -> CommandResult {
    let options = cli.load_options();

    match cli.command {
        Command::Config => commands::config::run(options),
        Command::Doctor { json } => commands::doctor::run(options, json),
        command => match AppConfig::load(options) {
            Ok(config) => run_game_command(command, &config),
            Err(error) => CommandResult::failure(
                command.name(),
                "config_validation",
                error.to_string(),
                EXIT_CONFIG,
            ),
        },
    }
}

fn run_game_command(command: Command, config: &AppConfig) -> CommandResult {
    use commands::game;

    match command {
        Command::Leaderboard { year } => game::leaderboard(config, year.as_deref()),
        Command::Winners { year } => game::winners(config, year.as_deref()),
        Command::MyStats { user, year } => game::mystats(config, &user, year.as_deref()),
        Command::Slash { text, user, channel } => game::slash(config, &text, &user, &channel),
        Command::Submit { name, statements, channel } => {
            game::submit(config, &name, &statements, &channel)
        }
        Command::React { emoji, user, remove } => game::react(config, &emoji, &user, remove),
        Command::Close { lie } => game::close(config, &lie),
        Command::Interact { payload } => game::interact(config, &payload),
        Command::Config | Command::Doctor { .. } => {
            CommandResult::failure(command.name(), "routing", "not a game command", EXIT_CONFIG)
        }
    }
}
