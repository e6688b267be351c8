pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "mavbot",
    about = "MAVBot Slack Socket Mode bot",
    long_about = "Run MAVBot against Slack over Socket Mode: greets mentions, answers /hello and \
                  /was-this-article-useful, and logs interactive callbacks.",
    after_help = "Examples:\n  mavbot version\n  mavbot start\n  mavbot start --config config/mavbot.toml"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Display the current version of MAVBot")]
    Version,
    #[command(about = "Connect to Slack and process events until Ctrl-C")]
    Start {
        #[arg(long, value_name = "PATH", help = "Read settings from this TOML file")]
        config: Option<PathBuf>,
        #[arg(long, value_name = "LEVEL", help = "Log level: trace|debug|info|warn|error")]
        log_level: Option<String>,
        #[arg(long, value_name = "FORMAT", help = "Log format: compact|pretty|json")]
        log_format: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Version => commands::version::run(),
        Command::Start { config, log_level, log_format } => {
            commands::start::run(commands::start::StartOptions {
                config_path: config,
                log_level,
                log_format,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
