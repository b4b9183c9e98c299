//! Foreground run command
//!
//! Resumes the persisted session and drives the tick loop until the requested time
//! has passed, the session ends, or Ctrl-C arrives. Notifications are logged as
//! they happen.

use super::common::{print_status, Context};
use anyhow::Result;
use clap::Args;
use miner_core::SessionEvent;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

#[derive(Args)]
pub struct RunArgs {
    /// Session owner
    #[arg(short, long)]
    pub user: Option<String>,

    /// Stop driving after this many seconds; runs until Ctrl-C when omitted
    #[arg(long)]
    pub seconds: Option<u64>,

    /// Start a session if none is running
    #[arg(long)]
    pub start: bool,
}

pub async fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let agent = ctx.bootstrapped_agent(args.user.as_deref()).await?;
    let mut events = agent.subscribe();

    if args.start && !agent.snapshot().mining_active {
        agent.start_mining()?;
    }
    if !agent.snapshot().mining_active {
        info!("No session running; use --start to begin one");
    }

    agent.spawn_tick_loop();

    let deadline = async {
        match args.seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => {
                info!("Run time elapsed");
                break;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => {
                    log_event(&event);
                    if event.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped notifications"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    agent.shutdown();
    agent.flush_remote().await;
    print_status(&agent.status());
    Ok(())
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::SessionStarted { period_secs } => {
            info!(period_secs, "Session started");
        }
        SessionEvent::RewardEarned { amount } => info!(amount, "Reward earned"),
        SessionEvent::SessionCompleted { session_reward } => {
            info!(session_reward, "Session completed");
        }
        SessionEvent::SessionStopped { session_reward } => {
            info!(session_reward, "Session stopped");
        }
        SessionEvent::ConnectivityLost => warn!("Remote unreachable, saving locally"),
        SessionEvent::ConnectivityRestored => info!("Remote reachable again"),
    }
}
