//! Start and stop commands

use super::common::{print_status, Context};
use anyhow::Result;
use clap::Args;

/// Arguments shared by session commands.
#[derive(Args)]
pub struct SessionArgs {
    /// Session owner; omit for an anonymous local-only session
    #[arg(short, long)]
    pub user: Option<String>,
}

/// Start a session and persist it to both tiers.
pub async fn start(ctx: &Context, args: SessionArgs) -> Result<()> {
    let agent = ctx.bootstrapped_agent(args.user.as_deref()).await?;
    agent.start_mining()?;
    agent.flush_remote().await;
    print_status(&agent.status());
    Ok(())
}

/// Stop the running session, crediting any boundary crossed since the last save.
pub async fn stop(ctx: &Context, args: SessionArgs) -> Result<()> {
    let agent = ctx.bootstrapped_agent(args.user.as_deref()).await?;
    agent.stop_mining()?;
    agent.flush_remote().await;
    print_status(&agent.status());
    Ok(())
}
