use std::sync::Arc;

use anyhow::{Context, Result};
use botfeed_agent::AgentClient;
use botfeed_core::DatafeedLoop;
use clap::Args;
use tracing::info;

use crate::config::ConfigLoader;
use crate::listener::LoggingListener;

#[derive(Args)]
pub struct RunArgs {
    /// Stop after this many events have been handled (at least 1)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_events: Option<u64>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = ConfigLoader::load()?;
    let auth = config.auth_session()?;
    let client = AgentClient::new(&config.agent).context("Failed to create agent client")?;

    let datafeed = DatafeedLoop::new(Arc::new(client), Arc::new(auth), config.datafeed.clone());
    let listener = Arc::new(LoggingListener::new(datafeed.stop_handle(), args.max_events));
    datafeed.subscribe(listener.clone());

    datafeed
        .start()
        .await
        .context("Failed to start datafeed loop")?;
    info!(agent = %config.agent.base_url, "Listening for events, press Ctrl-C to stop");

    let stop = datafeed.stop_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping datafeed");
            stop.stop();
        }
    });

    datafeed.join().await;
    interrupt.abort();

    println!("Handled {} events", listener.handled());
    Ok(())
}
