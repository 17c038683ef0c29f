//! Command-line argument parsing for cfdi-lab.

use crate::config::{Config, ENV_API_URL};
use clap::Parser;
use std::path::PathBuf;

/// Interactive SQL lab client for the CFDI playground backend.
#[derive(Parser, Debug)]
#[command(name = "cfdi-lab")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Backend base address (e.g., http://127.0.0.1:8000)
    #[arg(long, value_name = "URL", env = ENV_API_URL)]
    pub api_url: Option<String>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Health polling interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// State database path (stores the last active view)
    #[arg(long, value_name = "PATH")]
    pub state_db: Option<PathBuf>,

    /// Run one statement, print the result, and exit
    #[arg(short = 'e', long, value_name = "SQL")]
    pub exec: Option<String>,

    /// Directory for CSV exports (with --exec, export the result there)
    #[arg(long, value_name = "DIR")]
    pub export: Option<PathBuf>,

    /// Use an in-memory backend with sample data instead of the network
    #[arg(long)]
    pub mock_backend: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Overlays command-line values onto a loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.api.base_url = Some(url.clone());
        }
        if let Some(ms) = self.timeout_ms {
            config.api.timeout_ms = ms;
        }
        if let Some(ms) = self.poll_interval_ms {
            config.api.health_interval_ms = ms;
        }
        if let Some(path) = &self.state_db {
            config.state_db = Some(path.clone());
        }
    }

    /// Returns true when running a single statement non-interactively.
    pub fn is_one_shot(&self) -> bool {
        self.exec.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_no_args() {
        let cli = parse_args(&["cfdi-lab"]);
        assert!(cli.config.is_none());
        assert!(cli.exec.is_none());
        assert!(!cli.mock_backend);
        assert!(!cli.is_one_shot());
    }

    #[test]
    fn test_parse_all_flags() {
        let cli = parse_args(&[
            "cfdi-lab",
            "--api-url",
            "https://lab.example.com",
            "--config",
            "/etc/lab.toml",
            "--timeout-ms",
            "3000",
            "--poll-interval-ms",
            "500",
            "--state-db",
            "/tmp/state.db",
            "--exec",
            "SELECT 1",
            "--export",
            "/tmp/out",
            "--mock-backend",
        ]);

        assert_eq!(cli.api_url.as_deref(), Some("https://lab.example.com"));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/lab.toml")));
        assert_eq!(cli.timeout_ms, Some(3000));
        assert_eq!(cli.poll_interval_ms, Some(500));
        assert_eq!(cli.state_db, Some(PathBuf::from("/tmp/state.db")));
        assert_eq!(cli.exec.as_deref(), Some("SELECT 1"));
        assert_eq!(cli.export, Some(PathBuf::from("/tmp/out")));
        assert!(cli.mock_backend);
        assert!(cli.is_one_shot());
    }

    #[test]
    fn test_short_exec() {
        let cli = parse_args(&["cfdi-lab", "-e", "SELECT 2"]);
        assert_eq!(cli.exec.as_deref(), Some("SELECT 2"));
    }

    #[test]
    fn test_invalid_timeout_rejected() {
        assert!(Cli::try_parse_from(["cfdi-lab", "--timeout-ms", "soon"]).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = parse_args(&[
            "cfdi-lab",
            "--api-url",
            "http://10.0.0.5:9000",
            "--timeout-ms",
            "1500",
        ]);
        let mut config = Config::default();
        config.api.base_url = Some("http://from-file".to_string());
        config.api.health_interval_ms = 2000;

        cli.apply_to(&mut config);

        assert_eq!(config.api.base_url.as_deref(), Some("http://10.0.0.5:9000"));
        assert_eq!(config.api.timeout_ms, 1500);
        assert_eq!(config.api.health_interval_ms, 2000);
    }

    #[test]
    fn test_config_path_override() {
        let cli = parse_args(&["cfdi-lab", "--config", "/x/y.toml"]);
        assert_eq!(cli.config_path(), PathBuf::from("/x/y.toml"));

        let cli = parse_args(&["cfdi-lab"]);
        assert_eq!(cli.config_path(), Config::default_path());
    }
}
