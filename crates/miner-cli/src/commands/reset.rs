//! Reset command

use super::common::Context;
use anyhow::{bail, Result};
use clap::Args;
use miner_core::effects::KeyValueStorage;

#[derive(Args)]
pub struct ResetArgs {
    /// Session owner whose local state is cleared
    #[arg(short, long)]
    pub user: Option<String>,

    /// Clear every namespaced key, for all users
    #[arg(long, conflicts_with = "user")]
    pub all: bool,
}

/// Clear local state. The remote mirror is left untouched and will be reconciled
/// back on the next bootstrap.
pub fn reset(ctx: &Context, args: ResetArgs) -> Result<()> {
    let agent = ctx.agent(args.user.as_deref())?;
    let local = agent.local();

    if args.all {
        let removed = local.clear_all()?;
        println!("Removed {removed} local entries");
        return Ok(());
    }

    let key = local.key_for(args.user.as_deref());
    if local.storage().get(&key)?.is_none() {
        bail!("no local state stored under {key}");
    }
    local.clear(args.user.as_deref());
    println!("Cleared {key}");
    Ok(())
}
