//! CLI command handling
//!
//! Runs one-shot commands against the engine and formats their output.

pub mod console;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use serde_json::{Map, Value};

use crate::catalog::Catalog;
use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{logging, Error, Result};
use crate::control::{Outcome, Session, SessionOptions};
use crate::testing::{CaseStatus, Executor, Report, TestPlan, Tier};

/// Dispatch a one-shot CLI command
///
/// `config` already has command-line overrides applied.
pub async fn dispatch(command: Commands, config: Config) -> Result<ExitCode> {
    let catalog = Catalog::builtin();

    match command {
        Commands::Console => {
            console::run(config).await?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Ping => {
            let session = Session::tcp(SessionOptions::from(&config.connection));
            let probe = session
                .connect(&config.connection.host, config.connection.port)
                .await?;
            print_outcome(&probe);
            session.disconnect().await;
            Ok(exit_code(probe.is_pass()))
        }

        Commands::Send {
            target,
            method,
            params,
            example,
        } => {
            let params = if example {
                let description = catalog.describe(&target, &method);
                if description.is_empty() {
                    return Err(Error::InvalidParams(format!(
                        "No example for {}.{}; pass --params instead",
                        target, method
                    )));
                }
                description.example_params
            } else {
                parse_params(params.as_deref().unwrap_or(""))?
            };

            let session = Session::tcp(SessionOptions::from(&config.connection));
            let probe = session
                .connect(&config.connection.host, config.connection.port)
                .await?;
            if !probe.is_pass() {
                println!("{} liveness probe: {}", "!".yellow(), probe);
            }

            let outcome = session.request(&target, &method, params).await?;
            print_outcome(&outcome);
            session.disconnect().await;
            Ok(exit_code(outcome.is_pass()))
        }

        Commands::Targets => {
            print_targets(&catalog);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Methods { target } => Ok(exit_code(print_methods(&catalog, &target))),

        Commands::Describe { target, method } => {
            Ok(exit_code(print_description(&catalog, &target, &method)))
        }

        Commands::Test {
            tier,
            plan,
            delay_ms,
            json,
        } => {
            let plan = match plan.or_else(|| config.testing.plan.clone()) {
                Some(path) => TestPlan::load(&path)?,
                None => TestPlan::builtin(),
            };
            let delay = Duration::from_millis(delay_ms.unwrap_or(config.testing.case_delay_ms));

            let session = Arc::new(Session::tcp(SessionOptions::from(&config.connection)));
            let probe = session
                .connect(&config.connection.host, config.connection.port)
                .await?;
            if !probe.is_pass() {
                eprintln!("{} liveness probe: {}", "!".yellow(), probe);
            }

            let executor = Executor::new(plan).with_case_delay(delay);
            let report = run_tests(Arc::clone(&session), executor, tier).await?;
            session.disconnect().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(exit_code(report.all_passed()))
        }

        Commands::Logs { lines, clear } => {
            let Some(path) = logging::console_log_path() else {
                return Err(Error::Config("Could not determine log directory".to_string()));
            };

            if clear {
                logging::truncate_console_log()?;
                println!("Cleared {}", path.display());
                return Ok(ExitCode::SUCCESS);
            }

            if !path.exists() {
                println!("No console log yet ({})", path.display());
                return Ok(ExitCode::SUCCESS);
            }

            let content = std::fs::read_to_string(&path).map_err(|e| Error::FileRead {
                path: path.display().to_string(),
                error: e.to_string(),
            })?;
            let all: Vec<&str> = content.lines().collect();
            for line in &all[all.len().saturating_sub(lines)..] {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Run a tier on a spawned task; Ctrl+C cancels it between cases
pub(crate) async fn run_tests(session: Arc<Session>, executor: Executor, tier: Tier) -> Result<Report> {
    let token = executor.cancel_handle();
    let mut run = tokio::spawn(async move { executor.run(tier, &session).await });

    loop {
        tokio::select! {
            joined = &mut run => {
                return joined.map_err(|e| Error::Internal(format!("Test task failed: {}", e)))?;
            }
            _ = tokio::signal::ctrl_c(), if !token.is_cancelled() => {
                eprintln!("{}", "Cancelling after the current case...".yellow());
                token.cancel();
            }
        }
    }
}

/// Parse user-supplied parameters; empty input means no parameters
pub(crate) fn parse_params(text: &str) -> Result<Map<String, Value>> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::InvalidParams(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(Error::InvalidParams(e.to_string())),
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

pub(crate) fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Success { response, .. } if response.success => {
            println!("{} success", "✓".green());
            if !response.payload.is_empty() {
                let payload = Value::Object(response.payload.clone());
                let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
                for line in text.lines() {
                    println!("  {}", line);
                }
            }
        }
        Outcome::Success { response, .. } => {
            println!("{} {} {}", "✗".red(), "remote error:".red(), response.error_message());
        }
        Outcome::Failure { error, raw } => {
            println!("{} {} {}", "✗".red(), "malformed response:".magenta(), error);
            println!("  {}", raw.dimmed());
        }
        Outcome::TransportFailure { error } => {
            println!("{} {} {}", "✗".red(), "transport error:".yellow(), error);
        }
    }
}

pub(crate) fn print_targets(catalog: &Catalog) {
    for target in catalog.list_targets() {
        println!("{}", target);
    }
}

pub(crate) fn print_methods(catalog: &Catalog, target: &str) -> bool {
    let methods = catalog.list_methods(target);
    if methods.is_empty() {
        println!("No methods known for target '{}'", target);
        return false;
    }
    for method in methods {
        println!("{}", method);
    }
    true
}

pub(crate) fn print_description(catalog: &Catalog, target: &str, method: &str) -> bool {
    let description = catalog.describe(target, method);
    if description.is_empty() {
        println!("No description for {}.{}", target, method);
        return false;
    }
    println!("{}.{}: {}", target, method, description.label.bold());
    println!(
        "  params: {}",
        Value::Object(description.example_params).to_string().dimmed()
    );
    true
}

pub(crate) fn print_report(report: &Report) {
    match report.plan() {
        Some(plan) => println!(
            "\n{} {} tier of '{}' plan",
            "Test report:".blue().bold(),
            report.tier(),
            plan
        ),
        None => println!("\n{} {} tier", "Test report:".blue().bold(), report.tier()),
    }

    for record in report.records() {
        let timing = format!(
            "({}.{}, {}, {} ms)",
            record.target,
            record.method,
            record.tier,
            record.elapsed.as_millis()
        );
        let marker = if record.passed() { "✓".green() } else { "✗".red() };
        println!(
            "  {} {:>2}. {} {}",
            marker,
            record.index,
            record.label,
            timing.dimmed()
        );
        if let CaseStatus::Failed { kind, error } = &record.status {
            println!("        {} {}", format!("{}:", kind).red(), error);
        }
    }

    if report.cancelled() {
        println!(
            "\n{}",
            format!("Cancelled after {} of {} cases", report.total(), report.planned()).yellow()
        );
    }

    let summary = format!(
        "{}/{} ({:.1}%)",
        report.passed(),
        report.total(),
        report.pass_rate()
    );
    if report.all_passed() {
        println!("\n{} {}\n", "✓".green().bold(), summary.green().bold());
    } else {
        println!("\n{} {}\n", "✗".red().bold(), summary.red().bold());
    }
}
