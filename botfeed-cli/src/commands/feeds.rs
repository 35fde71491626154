use anyhow::{Context, Result};
use botfeed_agent::AgentClient;
use botfeed_core::{AuthSession, DatafeedTransport};
use clap::{Args, Subcommand};

use crate::config::ConfigLoader;

#[derive(Args)]
pub struct FeedsArgs {
    #[command(subcommand)]
    pub command: FeedsCommands,
}

#[derive(Subcommand)]
pub enum FeedsCommands {
    /// List the bot's datafeeds
    List,
    /// Create a new datafeed
    Create,
    /// Delete a datafeed
    Delete {
        /// Datafeed id
        id: String,
    },
}

pub async fn run(args: FeedsArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let tokens = config.auth_session()?.tokens().await?;
    let client = AgentClient::new(&config.agent).context("Failed to create agent client")?;

    match args.command {
        FeedsCommands::List => {
            let feeds = client
                .list_feeds(&tokens)
                .await
                .context("Failed to list datafeeds")?;
            if feeds.is_empty() {
                println!("No datafeeds");
            }
            for feed in feeds {
                println!("{}", feed.id);
            }
        }
        FeedsCommands::Create => {
            let feed = client
                .create_feed(&tokens)
                .await
                .context("Failed to create datafeed")?;
            println!("Created datafeed {}", feed.id);
        }
        FeedsCommands::Delete { id } => {
            client
                .delete_feed(&tokens, &id)
                .await
                .with_context(|| format!("Failed to delete datafeed {id}"))?;
            println!("Deleted datafeed {id}");
        }
    }

    Ok(())
}
