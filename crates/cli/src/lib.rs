pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "concierge",
    about = "Concierge operator CLI",
    long_about = "Inspect configuration, check readiness, list protocol actions, and run one-shot conversations.",
    after_help = "Examples:\n  concierge doctor --json\n  concierge actions\n  concierge chat --input \"order a pizza near 12.97,77.59\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config and check that the gateway and model clients can be built")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "List the protocol actions offered to the model, with parameter schemas")]
    Actions,
    #[command(about = "Run one conversation to completion and print the final answer")]
    Chat {
        #[arg(long, help = "User message for this conversation")]
        input: String,
        #[arg(long = "history", help = "Prior messages, alternating user and assistant")]
        history: Vec<String>,
        #[arg(long, help = "Replay decisions from a JSON file instead of calling the model")]
        script: Option<PathBuf>,
        #[arg(long, help = "Continue an existing order transaction")]
        transaction_id: Option<Uuid>,
        #[arg(long, help = "Print one JSON line per turn before the result")]
        trace: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Actions => {
            commands::CommandResult { exit_code: 0, output: commands::actions::run() }
        }
        Command::Chat { input, history, script, transaction_id, trace } => {
            commands::chat::run(commands::chat::ChatArgs {
                input,
                history,
                script,
                transaction_id,
                trace,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
