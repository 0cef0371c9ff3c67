//! CLI argument definitions for the campus assistant.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Multilingual campus FAQ assistant.
#[derive(Parser, Debug)]
#[command(name = "campus", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for the SQLite database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Import FAQ entries from a JSON array file.
    Import {
        path: PathBuf,
    },
    /// Answer a single message and print the result as JSON.
    Ask {
        message: String,
        /// Language code, or "auto" to detect.
        #[arg(long, default_value = "auto")]
        language: String,
        #[arg(long)]
        session: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    /// Interactive chat on stdin, keeping one session.
    Chat {
        #[arg(long, default_value = "auto")]
        language: String,
        #[arg(long)]
        user: Option<String>,
    },
    /// Show the persisted turns of a session, oldest first.
    History {
        session: String,
    },
    /// Conversation and feedback analytics.
    Stats {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
    /// Rate a previous response from 1 to 5.
    Feedback {
        session: String,
        message: String,
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    /// List supported languages.
    Languages,
    /// Detect the language of a text.
    Detect {
        text: String,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CAMPUS_CONFIG env var > platform default (~/.campus-assist/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CAMPUS_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory path.
    ///
    /// Priority: --data-dir flag > config file value.
    /// Returns `None` if not overridden (use config default).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    /// Returns `None` if not overridden.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".campus-assist").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".campus-assist").join("config.toml");
    }
    PathBuf::from("config.toml")
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}
