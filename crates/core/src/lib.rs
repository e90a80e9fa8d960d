pub mod config;
pub mod domain;
pub mod errors;
pub mod ranking;
pub mod scoreboard;
pub mod stats;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::game::{GameLedger, Player, PlayerId, PollOutcome, Statement, StatementId, Vote};
pub use domain::poll::{Choice, Poll, PollId, Submission};
pub use domain::scope::YearScope;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use ranking::{PersonalStats, RankingEngine, Standing, VoteTally, Winner, WinnerCategory};
pub use scoreboard::{LeaderboardEntry, Scoreboard, WinnerEntry};
pub use stats::{ci_bounds, ci_bounds_at, p_value, Confidence, Performance, RankedScore, StatsError};
