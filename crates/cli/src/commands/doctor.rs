use secrecy::ExposeSecret;
use serde::Serialize;
use twotruths_core::config::{AppConfig, LoadOptions};

use super::{CommandResult, EXIT_DOCTOR};
use crate::store::LedgerStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { EXIT_DOCTOR };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_slack_tokens(&config));
            checks.push(check_ledger(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["slack_token_readiness", "ledger_readability"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_failed { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_failed {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Tokens are optional offline; format is already enforced by `AppConfig::validate`.
fn check_slack_tokens(config: &AppConfig) -> DoctorCheck {
    let bot_token = config.slack.bot_token.expose_secret();
    let verification_token = config.slack.verification_token.expose_secret();

    if bot_token.is_empty() && verification_token.is_empty() {
        return DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Skipped,
            details: "no slack tokens configured; only local play is available".to_string(),
        };
    }

    let mut problems = Vec::new();
    if verification_token.is_empty() {
        problems.push(
            "slack.verification_token is empty; every slash command would be unauthorized",
        );
    }
    if !bot_token.is_empty() && config.slack.bot_user_id.is_none() {
        problems.push(
            "slack.bot_user_id is unset; the bot's own seed reactions would count as votes",
        );
    }

    if !problems.is_empty() {
        return DoctorCheck {
            name: "slack_token_readiness",
            status: CheckStatus::Fail,
            details: problems.join("; "),
        };
    }

    DoctorCheck {
        name: "slack_token_readiness",
        status: CheckStatus::Pass,
        details: "slack tokens configured".to_string(),
    }
}

fn check_ledger(config: &AppConfig) -> DoctorCheck {
    let store = LedgerStore::new(&config.game.ledger_path);
    if !store.path().exists() {
        return DoctorCheck {
            name: "ledger_readability",
            status: CheckStatus::Pass,
            details: format!("`{}` does not exist yet; it will be created", store.path().display()),
        };
    }

    match store.load() {
        Ok(ledger) => DoctorCheck {
            name: "ledger_readability",
            status: CheckStatus::Pass,
            details: format!(
                "read `{}`: {} players, {} polls, {} votes{}",
                store.path().display(),
                ledger.players.len(),
                ledger.polls.len(),
                ledger.votes.len(),
                if ledger.open_poll().is_some() { ", one poll open" } else { "" }
            ),
        },
        Err(error) => DoctorCheck {
            name: "ledger_readability",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
