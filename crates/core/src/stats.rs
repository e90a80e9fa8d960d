//! Small-sample statistics for ranking players.
//!
//! Vote counts per player are tiny (a handful of polls a year), so a raw
//! percentage ranks a lucky 1/1 above a steady 40/50. Rankings use the lower
//! bound of the Wilson score interval instead, and personal stats compare a
//! player against random guessing among three statements.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use thiserror::Error;

/// Confidence level used when none is configured.
pub const DEFAULT_CONFIDENCE: f64 = 0.95;

/// Probability of picking the lie by chance out of three statements.
pub const RANDOM_GUESS_RATE: f64 = 1.0 / 3.0;

/// Above this p-value a player is better than random.
pub const BETTER_THAN_RANDOM_P: f64 = 0.95;

/// Below this p-value a player is worse than random.
pub const WORSE_THAN_RANDOM_P: f64 = 0.05;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("cannot score an empty sample (total = 0)")]
    EmptySample,
    #[error("correct count {correct} exceeds total {total}")]
    CorrectExceedsTotal { correct: u32, total: u32 },
    #[error("confidence level must be strictly between 0 and 1, got {0}")]
    InvalidConfidence(f64),
    #[error("normal distribution could not be built: {0}")]
    Distribution(String),
}

/// A two-sided confidence level together with its standard-normal critical value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence {
    level: f64,
    z: f64,
}

impl Confidence {
    pub fn new(level: f64) -> Result<Self, StatsError> {
        if !(level > 0.0 && level < 1.0) {
            return Err(StatsError::InvalidConfidence(level));
        }

        let standard = normal(0.0, 1.0)?;
        let z = standard.inverse_cdf(1.0 - (1.0 - level) / 2.0);
        Ok(Self { level, z })
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Critical value `z` such that `P(-z < Z < z) = level`.
    pub fn z_score(&self) -> f64 {
        self.z
    }
}

impl Default for Confidence {
    fn default() -> Self {
        // inverse_cdf(0.975) of the standard normal
        Self { level: DEFAULT_CONFIDENCE, z: 1.959_963_984_540_054 }
    }
}

impl TryFrom<f64> for Confidence {
    type Error = StatsError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(value: Confidence) -> Self {
        value.level
    }
}

/// Wilson score interval for a binomial proportion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedScore {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub center: f64,
}

impl RankedScore {
    pub fn width(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}

pub fn wilson_interval(
    correct: u32,
    total: u32,
    confidence: Confidence,
) -> Result<RankedScore, StatsError> {
    check_sample(correct, total)?;

    let n = f64::from(total);
    let p = f64::from(correct) / n;
    let z = confidence.z_score();
    let z2 = z * z;

    let denom = 1.0 + z2 / n;
    let center = p + z2 / (2.0 * n);
    let err = z * ((p * (1.0 - p) + z2 / (4.0 * n)) / n).sqrt();

    Ok(RankedScore {
        lower_bound: ((center - err) / denom).clamp(0.0, 1.0),
        upper_bound: ((center + err) / denom).clamp(0.0, 1.0),
        center: (center / denom).clamp(0.0, 1.0),
    })
}

/// Wilson interval bounds at the default 95% confidence.
pub fn ci_bounds(correct: u32, total: u32) -> Result<(f64, f64), StatsError> {
    let score = wilson_interval(correct, total, Confidence::default())?;
    Ok((score.lower_bound, score.upper_bound))
}

pub fn ci_bounds_at(correct: u32, total: u32, confidence: f64) -> Result<(f64, f64), StatsError> {
    let score = wilson_interval(correct, total, Confidence::new(confidence)?)?;
    Ok((score.lower_bound, score.upper_bound))
}

/// Probability that random guessing would score `correct` or fewer out of `total`.
///
/// Uses the normal approximation of binomial(total, 1/3) without continuity
/// correction: mean `n/3`, variance `2n/9`.
pub fn p_value(correct: u32, total: u32) -> Result<f64, StatsError> {
    check_sample(correct, total)?;

    let n = f64::from(total);
    let mean = n * RANDOM_GUESS_RATE;
    let std_dev = (n * RANDOM_GUESS_RATE * (1.0 - RANDOM_GUESS_RATE)).sqrt();
    let null_model = normal(mean, std_dev)?;

    Ok(null_model.cdf(f64::from(correct)).clamp(0.0, 1.0))
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Performance {
    BetterThanRandom { p_value: f64 },
    WorseThanRandom { p_value: f64 },
    IndistinguishableFromRandom,
}

impl Performance {
    /// The reported p-value is one-sided toward whichever tail the player landed in.
    pub fn classify(p_value: f64) -> Self {
        if p_value > BETTER_THAN_RANDOM_P {
            Self::BetterThanRandom { p_value }
        } else if p_value < WORSE_THAN_RANDOM_P {
            Self::WorseThanRandom { p_value: 1.0 - p_value }
        } else {
            Self::IndistinguishableFromRandom
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::BetterThanRandom { p_value } => format!("better than random (p={p_value:.3})"),
            Self::WorseThanRandom { p_value } => format!("worse than random (p={p_value:.3})"),
            Self::IndistinguishableFromRandom => "indistinguishable from random".to_owned(),
        }
    }
}

fn check_sample(correct: u32, total: u32) -> Result<(), StatsError> {
    if total == 0 {
        return Err(StatsError::EmptySample);
    }
    if correct > total {
        return Err(StatsError::CorrectExceedsTotal { correct, total });
    }
    Ok(())
}

fn normal(mean: f64, std_dev: f64) -> Result<Normal, StatsError> {
    Normal::new(mean, std_dev).map_err(|error| StatsError::Distribution(error.to_string()))
}
