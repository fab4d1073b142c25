//! Interactive console
//!
//! Keeps one session open across commands. Requests, probes and reconnects
//! are logged in detail to the console log file; stdout shows outcomes only.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::catalog::Catalog;
use crate::common::config::Config;
use crate::common::{logging, Error, Result};
use crate::control::{Session, SessionOptions};
use crate::testing::{Executor, TestPlan, Tier};

use super::{parse_params, print_description, print_methods, print_outcome, print_report, print_targets};

const HELP: &str = "\
Commands:
  connect [host] [port]        Connect and run the liveness probe
  disconnect                   Close the connection
  status                       Show connection state
  targets                      List targets
  methods <target>             List methods of a target
  describe <target> <method>   Show label and example parameters
  send <target> <method> [json]  Send a request
  example <target> <method>    Send a request with example parameters
  test [safe|regular|full]     Run a test tier (Ctrl+C cancels)
  help                         Show this help
  quit                         Leave the console";

/// A parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Empty,
    Connect {
        host: Option<String>,
        port: Option<u16>,
    },
    Disconnect,
    Status,
    Targets,
    Methods(String),
    Describe {
        target: String,
        method: String,
    },
    Send {
        target: String,
        method: String,
        params: Map<String, Value>,
    },
    Example {
        target: String,
        method: String,
    },
    Test(Tier),
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let Some((word, rest)) = split_word(line) else {
            return Ok(Self::Empty);
        };

        let args: Vec<&str> = rest.split_whitespace().collect();
        let pair = |usage: &str| match args.as_slice() {
            [target, method, ..] => Ok((target.to_string(), method.to_string())),
            _ => Err(Error::InvalidCommand(format!("Usage: {}", usage))),
        };

        match word.to_lowercase().as_str() {
            "connect" => {
                let port = args
                    .get(1)
                    .map(|p| {
                        p.parse::<u16>()
                            .map_err(|_| Error::InvalidCommand(format!("Invalid port: {}", p)))
                    })
                    .transpose()?;
                Ok(Self::Connect {
                    host: args.first().map(|h| h.to_string()),
                    port,
                })
            }
            "disconnect" => Ok(Self::Disconnect),
            "status" => Ok(Self::Status),
            "targets" => Ok(Self::Targets),
            "methods" => match args.first() {
                Some(target) => Ok(Self::Methods(target.to_string())),
                None => Err(Error::InvalidCommand("Usage: methods <target>".to_string())),
            },
            "describe" => {
                let (target, method) = pair("describe <target> <method>")?;
                Ok(Self::Describe { target, method })
            }
            "send" => {
                let (target, method) = pair("send <target> <method> [json]")?;
                // Parameters are the raw remainder so JSON may contain spaces
                let json = split_word(rest)
                    .and_then(|(_, r)| split_word(r))
                    .map(|(_, r)| r)
                    .unwrap_or("");
                Ok(Self::Send {
                    target,
                    method,
                    params: parse_params(json)?,
                })
            }
            "example" => {
                let (target, method) = pair("example <target> <method>")?;
                Ok(Self::Example { target, method })
            }
            "test" => match args.first() {
                Some(tier) => Ok(Self::Test(tier.parse()?)),
                None => Ok(Self::Test(Tier::Safe)),
            },
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(Error::InvalidCommand(format!(
                "Unknown command '{}'. Type 'help' for a list",
                other
            ))),
        }
    }
}

/// Split off the first whitespace-delimited word
fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(at) => Some((&s[..at], s[at..].trim_start())),
        None => Some((s, "")),
    }
}

struct Console {
    config: Config,
    catalog: Catalog,
    session: Arc<Session>,
}

/// Run the console until `quit`, end of input or Ctrl+C at the prompt
pub async fn run(config: Config) -> Result<()> {
    let session = Arc::new(Session::tcp(SessionOptions::from(&config.connection)));
    let console = Console {
        config,
        catalog: Catalog::builtin(),
        session,
    };

    println!("{}", "vflowctl console".bold());
    if let Some(path) = logging::console_log_path() {
        println!("Logging to {}", path.display().to_string().dimmed());
    }
    println!("Type 'help' for commands.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt(console.session.is_connected());

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        match ConsoleCommand::parse(&line) {
            Ok(ConsoleCommand::Quit) => break,
            Ok(command) => {
                if let Err(e) = console.execute(command).await {
                    println!("{} {}", "Error:".red(), e);
                }
            }
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }

    console.session.disconnect().await;
    Ok(())
}

fn prompt(connected: bool) {
    let marker = if connected { "●".green() } else { "○".dimmed() };
    print!("{} vflow> ", marker);
    let _ = std::io::stdout().flush();
}

impl Console {
    async fn execute(&self, command: ConsoleCommand) -> Result<()> {
        match command {
            ConsoleCommand::Empty | ConsoleCommand::Quit => {}

            ConsoleCommand::Help => println!("{}", HELP),

            ConsoleCommand::Connect { host, port } => {
                let host = host.unwrap_or_else(|| self.config.connection.host.clone());
                let port = port.unwrap_or(self.config.connection.port);
                println!("Connecting to {}:{}...", host, port);
                let probe = self.session.connect(&host, port).await?;
                println!("{} Connected", "✓".green());
                if probe.is_pass() {
                    println!("  liveness probe: {}", "ok".green());
                } else {
                    println!("  {} liveness probe: {}", "!".yellow(), probe);
                }
            }

            ConsoleCommand::Disconnect => {
                self.session.disconnect().await;
                println!("Disconnected");
            }

            ConsoleCommand::Status => {
                println!("State: {}", self.session.state());
                if let Some(endpoint) = self.session.endpoint().await {
                    println!("Endpoint: {}", endpoint);
                }
            }

            ConsoleCommand::Targets => print_targets(&self.catalog),

            ConsoleCommand::Methods(target) => {
                print_methods(&self.catalog, &target);
            }

            ConsoleCommand::Describe { target, method } => {
                print_description(&self.catalog, &target, &method);
            }

            ConsoleCommand::Send {
                target,
                method,
                params,
            } => {
                let outcome = self.session.request(&target, &method, params).await?;
                print_outcome(&outcome);
            }

            ConsoleCommand::Example { target, method } => {
                let description = self.catalog.describe(&target, &method);
                if description.is_empty() {
                    return Err(Error::InvalidParams(format!(
                        "No example for {}.{}",
                        target, method
                    )));
                }
                println!(
                    "{} {}.{} {}",
                    ">".dimmed(),
                    target,
                    method,
                    Value::Object(description.example_params.clone())
                );
                let outcome = self
                    .session
                    .request(&target, &method, description.example_params)
                    .await?;
                print_outcome(&outcome);
            }

            ConsoleCommand::Test(tier) => {
                let plan = match &self.config.testing.plan {
                    Some(path) => TestPlan::load(path)?,
                    None => TestPlan::builtin(),
                };
                let executor = Executor::new(plan)
                    .with_case_delay(Duration::from_millis(self.config.testing.case_delay_ms));
                let report = super::run_tests(Arc::clone(&self.session), executor, tier).await?;
                print_report(&report);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_connect() {
        assert_eq!(
            ConsoleCommand::parse("connect").unwrap(),
            ConsoleCommand::Connect {
                host: None,
                port: None
            }
        );
        assert_eq!(
            ConsoleCommand::parse("connect 192.168.1.5 20000").unwrap(),
            ConsoleCommand::Connect {
                host: Some("192.168.1.5".to_string()),
                port: Some(20000)
            }
        );
        assert!(matches!(
            ConsoleCommand::parse("connect localhost nope"),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_parse_send_with_json() {
        let cmd = ConsoleCommand::parse(r#"send clipboard setClipboard {"text": "a b c"}"#).unwrap();
        match cmd {
            ConsoleCommand::Send {
                target,
                method,
                params,
            } => {
                assert_eq!(target, "clipboard");
                assert_eq!(method, "setClipboard");
                assert_eq!(Value::Object(params), json!({"text": "a b c"}));
            }
            other => panic!("Expected Send, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_send_without_params() {
        assert_eq!(
            ConsoleCommand::parse("send power wakeUp").unwrap(),
            ConsoleCommand::Send {
                target: "power".to_string(),
                method: "wakeUp".to_string(),
                params: Map::new(),
            }
        );
        assert!(ConsoleCommand::parse("send power").is_err());
        assert!(ConsoleCommand::parse("send power wakeUp [1]").is_err());
    }

    #[test]
    fn test_parse_test_tier() {
        assert_eq!(ConsoleCommand::parse("test").unwrap(), ConsoleCommand::Test(Tier::Safe));
        assert_eq!(
            ConsoleCommand::parse("test full").unwrap(),
            ConsoleCommand::Test(Tier::Full)
        );
        assert!(matches!(
            ConsoleCommand::parse("test extreme"),
            Err(Error::UnknownTier(_))
        ));
    }

    #[test]
    fn test_parse_misc() {
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), ConsoleCommand::Empty);
        assert_eq!(ConsoleCommand::parse("QUIT").unwrap(), ConsoleCommand::Quit);
        assert_eq!(
            ConsoleCommand::parse("methods wifi").unwrap(),
            ConsoleCommand::Methods("wifi".to_string())
        );
        assert!(matches!(
            ConsoleCommand::parse("frobnicate"),
            Err(Error::InvalidCommand(_))
        ));
    }
}
