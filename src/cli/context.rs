//! Resolved configuration shared by every command.

use std::path::{Path, PathBuf};

use crate::cli::error::CliResult;
use crate::config::{ConfigurationLoader, EnvironmentLoader, DEFAULT_CONFIG_PATH};

/// Configuration and environment a command runs with
#[derive(Debug)]
pub struct CliContext {
    pub loader: ConfigurationLoader,
    pub env: EnvironmentLoader,
}

impl CliContext {
    /// Load configuration and `.env` from the global flags.
    pub fn load(config: Option<&Path>, env_file: Option<&Path>) -> CliResult<Self> {
        let env_file = env_file.map(Path::to_path_buf).or_else(default_env_file);
        let env = EnvironmentLoader::new(env_file.as_deref());

        let config_path = config.map(Path::to_path_buf).or_else(user_config_file);
        let loader = ConfigurationLoader::new(config_path.as_deref())?;
        tracing::debug!(config = %loader.config_path.display(), "configuration loaded");

        Ok(Self { loader, env })
    }
}

/// `./.env` when present.
fn default_env_file() -> Option<PathBuf> {
    let local = PathBuf::from(".env");
    local.exists().then_some(local)
}

/// `config/lorekeeper.toml` in the working directory, else
/// `<config dir>/lorekeeper/config.toml` when that exists.
fn user_config_file() -> Option<PathBuf> {
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        return None;
    }
    dirs::config_dir()
        .map(|dir| dir.join("lorekeeper").join("config.toml"))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lorekeeper.toml");
        std::fs::write(&path, "[graph]\ntopology = \"two_path\"\n").unwrap();

        let ctx = CliContext::load(Some(&path), Some(&dir.path().join("missing.env"))).unwrap();
        assert_eq!(ctx.loader.config.graph.topology, "two_path");
        assert_eq!(ctx.loader.config_path, path);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lorekeeper.toml");
        std::fs::write(&path, "[retriever]\nk = 0\n").unwrap();
        assert!(CliContext::load(Some(&path), None).is_err());
    }
}
