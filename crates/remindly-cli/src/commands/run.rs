use std::time::Duration;

use clap::Args;
use remindly_core::{ActivatorStrategy, Collaborators, Config, ReminderContext};
use tokio::sync::broadcast::error::RecvError;

/// How often the store is re-read for reminders added by other commands.
const STORE_RELOAD: Duration = Duration::from_secs(5);

#[derive(Args)]
pub struct RunArgs {
    /// Override the configured activator strategy (ticked or scheduled)
    #[arg(long)]
    pub strategy: Option<ActivatorStrategy>,
    /// Start with all reminders paused
    #[arg(long)]
    pub paused: bool,
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration: Option<u64>,
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    if let Some(strategy) = args.strategy {
        config.scheduler.strategy = strategy;
    }
    if args.paused {
        config.reminders_paused = true;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(config, args.duration))
}

async fn serve(config: Config, duration: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let collaborators = Collaborators::console(&config)?;
    let ctx = ReminderContext::new(config, collaborators);
    let manager = ctx.manager();

    let loaded = manager.load_from_store();
    let mut events = ctx.events().subscribe();
    let handle = manager.start();
    tracing::info!(loaded, paused = ctx.is_paused(), "remindly running");

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut reload = tokio::time::interval(STORE_RELOAD);
    reload.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
            _ = &mut deadline => break,
            _ = reload.tick() => {
                manager.load_from_store();
            }
            event = events.recv() => match event {
                Ok(event) => println!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}
