//! vflowctl - control client for the vFlow core engine
//!
//! One-shot commands talk to the engine and exit; `console` keeps a session
//! open for interactive use.

use std::process::ExitCode;

use clap::Parser;
use commands::{Commands, ConnectionArgs};
use vflowctl::common::config::Config;
use vflowctl::common::logging;
use vflowctl::{cli, commands};

#[derive(Parser)]
#[command(name = "vflowctl", about = "Control client for the vFlow core engine")]
#[command(version, long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Console => {
            logging::init_console();
        }
        _ => logging::init_cli(),
    }

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    cli.connection.apply(&mut config.connection);

    match cli::dispatch(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
