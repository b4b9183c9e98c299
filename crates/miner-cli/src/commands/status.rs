//! Status command

use super::common::{print_status, Context};
use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct StatusArgs {
    /// Session owner
    #[arg(short, long)]
    pub user: Option<String>,

    /// Print the status as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn show(ctx: &Context, args: StatusArgs) -> Result<()> {
    let agent = ctx.bootstrapped_agent(args.user.as_deref()).await?;
    agent.tick();
    agent.flush_remote().await;

    let status = agent.status();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}
