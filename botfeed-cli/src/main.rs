use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod listener;

#[derive(Parser)]
#[command(name = "botfeed", about = "Run and maintain a chat bot's datafeed")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the datafeed and log every event
    Run(commands::run::RunArgs),
    /// List, create or delete datafeeds
    Feeds(commands::feeds::FeedsArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Feeds(args) => commands::feeds::run(args).await,
        Commands::Config(args) => commands::config::run(args),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_event_limit() {
        let cli = Cli::try_parse_from(["botfeed", "--verbose", "run", "--max-events", "5"]).unwrap();
        assert!(cli.verbose);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.max_events, Some(5));
    }

    #[test]
    fn rejects_zero_event_limit() {
        let err = Cli::try_parse_from(["botfeed", "run", "--max-events", "0"])
            .err()
            .expect("zero event limit should be rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_feed_delete() {
        let cli = Cli::try_parse_from(["botfeed", "feeds", "delete", "F1"]).unwrap();
        let Commands::Feeds(args) = cli.command else {
            panic!("expected feeds command");
        };
        assert!(matches!(
            args.command,
            commands::feeds::FeedsCommands::Delete { ref id } if id == "F1"
        ));
    }
}
