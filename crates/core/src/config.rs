use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::Confidence;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub slack: SlackConfig,
    pub ranking: RankingConfig,
    pub game: GameConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    pub verification_token: SecretString,
    /// Excluded from poll ballots; the bot seeds every poll with the choice emoji.
    pub bot_user_id: Option<String>,
    pub username: String,
    pub icon_emoji: String,
}

#[derive(Clone, Debug)]
pub struct RankingConfig {
    pub confidence: Confidence,
    pub leaderboard_min_votes: u32,
    pub teller_min_votes: u32,
    pub leaderboard_size: usize,
}

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub ledger_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub ledger_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub confidence: Option<f64>,
    pub slack_bot_token: Option<String>,
    pub slack_verification_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slack: SlackConfig {
                bot_token: String::new().into(),
                verification_token: String::new().into(),
                bot_user_id: None,
                username: "Two Truths and a Lie Bot".to_string(),
                icon_emoji: ":thinking_face:".to_string(),
            },
            ranking: RankingConfig {
                confidence: Confidence::default(),
                leaderboard_min_votes: 5,
                teller_min_votes: 10,
                leaderboard_size: 10,
            },
            game: GameConfig { ledger_path: PathBuf::from("twotruths-ledger.json") },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("twotruths.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides)?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(slack) = patch.slack {
            if let Some(bot_token) = slack.bot_token {
                self.slack.bot_token = secret_value(bot_token);
            }
            if let Some(verification_token) = slack.verification_token {
                self.slack.verification_token = secret_value(verification_token);
            }
            if let Some(bot_user_id) = slack.bot_user_id {
                self.slack.bot_user_id = Some(bot_user_id);
            }
            if let Some(username) = slack.username {
                self.slack.username = username;
            }
            if let Some(icon_emoji) = slack.icon_emoji {
                self.slack.icon_emoji = icon_emoji;
            }
        }

        if let Some(ranking) = patch.ranking {
            if let Some(confidence) = ranking.confidence {
                self.ranking.confidence = confidence_level("ranking.confidence", confidence)?;
            }
            if let Some(leaderboard_min_votes) = ranking.leaderboard_min_votes {
                self.ranking.leaderboard_min_votes = leaderboard_min_votes;
            }
            if let Some(teller_min_votes) = ranking.teller_min_votes {
                self.ranking.teller_min_votes = teller_min_votes;
            }
            if let Some(leaderboard_size) = ranking.leaderboard_size {
                self.ranking.leaderboard_size = leaderboard_size;
            }
        }

        if let Some(game) = patch.game {
            if let Some(ledger_path) = game.ledger_path {
                self.game.ledger_path = ledger_path;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("TWOTRUTHS_SLACK_BOT_TOKEN") {
            self.slack.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("TWOTRUTHS_SLACK_VERIFICATION_TOKEN") {
            self.slack.verification_token = secret_value(value);
        }
        if let Some(value) = read_env("TWOTRUTHS_SLACK_BOT_USER_ID") {
            self.slack.bot_user_id = Some(value);
        }
        if let Some(value) = read_env("TWOTRUTHS_SLACK_USERNAME") {
            self.slack.username = value;
        }
        if let Some(value) = read_env("TWOTRUTHS_SLACK_ICON_EMOJI") {
            self.slack.icon_emoji = value;
        }

        if let Some(value) = read_env("TWOTRUTHS_RANKING_CONFIDENCE") {
            let level = parse_f64("TWOTRUTHS_RANKING_CONFIDENCE", &value)?;
            self.ranking.confidence = confidence_level("TWOTRUTHS_RANKING_CONFIDENCE", level)?;
        }
        if let Some(value) = read_env("TWOTRUTHS_RANKING_LEADERBOARD_MIN_VOTES") {
            self.ranking.leaderboard_min_votes =
                parse_u32("TWOTRUTHS_RANKING_LEADERBOARD_MIN_VOTES", &value)?;
        }
        if let Some(value) = read_env("TWOTRUTHS_RANKING_TELLER_MIN_VOTES") {
            self.ranking.teller_min_votes =
                parse_u32("TWOTRUTHS_RANKING_TELLER_MIN_VOTES", &value)?;
        }
        if let Some(value) = read_env("TWOTRUTHS_RANKING_LEADERBOARD_SIZE") {
            self.ranking.leaderboard_size =
                parse_usize("TWOTRUTHS_RANKING_LEADERBOARD_SIZE", &value)?;
        }

        if let Some(value) = read_env("TWOTRUTHS_GAME_LEDGER_PATH") {
            self.game.ledger_path = PathBuf::from(value);
        }

        let log_level =
            read_env("TWOTRUTHS_LOGGING_LEVEL").or_else(|| read_env("TWOTRUTHS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TWOTRUTHS_LOGGING_FORMAT").or_else(|| read_env("TWOTRUTHS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(ledger_path) = overrides.ledger_path {
            self.game.ledger_path = ledger_path;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(confidence) = overrides.confidence {
            self.ranking.confidence = confidence_level("confidence override", confidence)?;
        }
        if let Some(bot_token) = overrides.slack_bot_token {
            self.slack.bot_token = secret_value(bot_token);
        }
        if let Some(verification_token) = overrides.slack_verification_token {
            self.slack.verification_token = secret_value(verification_token);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_slack(&self.slack)?;
        validate_ranking(&self.ranking)?;
        validate_game(&self.game)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("twotruths.toml"), PathBuf::from("config/twotruths.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    // The bot token is optional so the ledger can be worked offline.
    let bot_token = slack.bot_token.expose_secret();
    if !bot_token.is_empty() && !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used the app-level token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions"
        )));
    }

    if slack.username.trim().is_empty() {
        return Err(ConfigError::Validation("slack.username must not be empty".to_string()));
    }

    let icon = slack.icon_emoji.trim();
    if icon.len() < 3 || !icon.starts_with(':') || !icon.ends_with(':') {
        return Err(ConfigError::Validation(
            "slack.icon_emoji must look like `:emoji_name:`".to_string(),
        ));
    }

    Ok(())
}

fn validate_ranking(ranking: &RankingConfig) -> Result<(), ConfigError> {
    if ranking.leaderboard_min_votes == 0 {
        return Err(ConfigError::Validation(
            "ranking.leaderboard_min_votes must be greater than zero".to_string(),
        ));
    }

    if ranking.teller_min_votes == 0 {
        return Err(ConfigError::Validation(
            "ranking.teller_min_votes must be greater than zero".to_string(),
        ));
    }

    if ranking.leaderboard_size == 0 || ranking.leaderboard_size > 50 {
        return Err(ConfigError::Validation(
            "ranking.leaderboard_size must be in range 1..=50".to_string(),
        ));
    }

    Ok(())
}

fn validate_game(game: &GameConfig) -> Result<(), ConfigError> {
    if game.ledger_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("game.ledger_path must not be empty".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn confidence_level(key: &str, level: f64) -> Result<Confidence, ConfigError> {
    Confidence::new(level).map_err(|error| ConfigError::Validation(format!("{key}: {error}")))
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    slack: Option<SlackPatch>,
    ranking: Option<RankingPatch>,
    game: Option<GamePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    verification_token: Option<String>,
    bot_user_id: Option<String>,
    username: Option<String>,
    icon_emoji: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RankingPatch {
    confidence: Option<f64>,
    leaderboard_min_votes: Option<u32>,
    teller_min_votes: Option<u32>,
    leaderboard_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct GamePatch {
    ledger_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
