//! CLI argument parsing for bridges.

use std::path::{Path, PathBuf};

use clap::Parser;
use trydan_common::LoggingConfig;

/// Environment variable naming the configuration file. Overrides the CLI.
pub const CONFIG_ENV: &str = "CONFIG_PATH";

/// Common CLI arguments for all bridges.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "trydan2mqtt", about = "Trydan charger to MQTT bridge", version)]
pub struct BridgeArgs {
    /// Path to configuration file.
    #[arg(value_name = "CONFIG", conflicts_with = "config")]
    pub config_file: Option<PathBuf>,

    /// Path to configuration file (same as the positional argument).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Parse the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// The configuration file asked for.
    ///
    /// `CONFIG_PATH` wins over the command line, which wins over
    /// `default_config`.
    pub fn requested_config(&self, default_config: &str) -> PathBuf {
        let from_env = std::env::var_os(CONFIG_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        self.choose_config(from_env, default_config)
    }

    fn choose_config(&self, from_env: Option<PathBuf>, default_config: &str) -> PathBuf {
        from_env
            .or_else(|| self.config_file.clone())
            .or_else(|| self.config.clone())
            .unwrap_or_else(|| PathBuf::from(default_config))
    }

    /// Pick the configuration file to load.
    ///
    /// The requested path wins when it exists. Otherwise the first existing
    /// fallback is used, and failing that the requested path is returned so
    /// the loader reports it as missing.
    pub fn resolve_config(&self, default_config: &str, fallbacks: &[&str]) -> PathBuf {
        first_existing(self.requested_config(default_config), fallbacks)
    }

    /// Logging settings with the `--log-level` override applied.
    pub fn logging(&self, configured: &LoggingConfig) -> LoggingConfig {
        match &self.log_level {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..configured.clone()
            },
            None => configured.clone(),
        }
    }
}

fn first_existing(requested: PathBuf, fallbacks: &[&str]) -> PathBuf {
    if requested.exists() {
        return requested;
    }

    for fallback in fallbacks {
        let candidate = Path::new(fallback);
        if candidate.exists() {
            tracing::debug!(
                requested = %requested.display(),
                using = %candidate.display(),
                "Configuration file not found, using fallback"
            );
            return candidate.to_path_buf();
        }
    }

    requested
}
