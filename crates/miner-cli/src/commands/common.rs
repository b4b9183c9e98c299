//! Shared command plumbing

use anyhow::{Context as _, Result};
use miner_agent::{AgentBuilder, MiningAgent, MiningStatus};
use miner_core::MinerConfig;
use miner_effects::{FilesystemDocumentHandler, FilesystemStorageHandler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const DATA_DIR_NAME: &str = "miner";

/// Resolved configuration and storage location for one invocation.
pub struct Context {
    pub config: MinerConfig,
    pub data_dir: PathBuf,
}

impl Context {
    /// Load the config file (absent means defaults) and resolve the data directory.
    pub fn load(config_path: &Path, data_dir: Option<PathBuf>) -> Result<Self> {
        let config = MinerConfig::load(config_path)
            .with_context(|| format!("loading config from {}", config_path.display()))?;
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        debug!(data_dir = %data_dir.display(), "Resolved data directory");
        Ok(Self { config, data_dir })
    }

    /// Build an agent for `user` without touching either tier.
    pub fn agent(&self, user: Option<&str>) -> Result<MiningAgent> {
        let storage = FilesystemStorageHandler::new(self.data_dir.join("local"))
            .context("opening local storage")?;
        let documents = FilesystemDocumentHandler::new(self.data_dir.join("remote"));

        let mut builder = AgentBuilder::new()
            .with_config(self.config.clone())
            .with_storage(Arc::new(storage))
            .with_documents(Arc::new(documents));
        if let Some(user) = user {
            builder = builder.with_user(user);
        }
        Ok(builder.build()?)
    }

    /// Build an agent for `user` and seed it from both tiers.
    pub async fn bootstrapped_agent(&self, user: Option<&str>) -> Result<MiningAgent> {
        let agent = self.agent(user)?;
        let action = agent.bootstrap().await;
        debug!(?action, "Bootstrap reconciliation");
        Ok(agent)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".miner").join("data"))
}

/// Print a status summary for humans.
pub fn print_status(status: &MiningStatus) {
    let owner = status.user_id.as_deref().unwrap_or("anonymous");
    println!("User:      {owner}");
    println!("Balance:   {:.6}", status.balance);
    println!("Rate:      {:.6}/min ({:.6}/day)", status.mining_rate, status.daily_rate);
    if status.active {
        println!("Session:   running, {} remaining", status.remaining);
        println!("Progress:  {:.1}%", status.progress * 100.0);
        println!("Accrued:   {:.6}", status.session_reward);
    } else {
        println!("Session:   idle");
    }
    if status.offline {
        println!("Remote:    offline, changes saved locally");
    }
}
