use std::path::Path;

use hive_verify::HiveConfig;

pub mod claims;
mod dispatch;
pub mod publish;
pub mod status;

pub use dispatch::dispatch;

/// Config from `--config` when given, otherwise from the environment.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<HiveConfig> {
    match path {
        Some(path) => Ok(HiveConfig::load(path)?),
        None => Ok(HiveConfig::from_env()),
    }
}

pub(crate) fn read_paper(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read paper {}: {}", path.display(), e))
}
