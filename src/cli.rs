// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `hashmake`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hashmake",
    version,
    about = "Incremental builds driven by content hashes and discovered dependencies.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Hashmake.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Hashmake.toml")]
    pub config: String,

    /// Task to build. Defaults to `[config].target`, or the only task.
    #[arg(long, value_name = "NAME")]
    pub target: Option<String>,

    /// Cache document path, overriding `[config].cache`.
    #[arg(long, value_name = "PATH")]
    pub cache: Option<String>,

    /// Build once and exit instead of watching for changes.
    #[arg(long)]
    pub once: bool,

    /// Parse + validate, print the task graph, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HASHMAKE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_watch_mode_with_local_config() {
        let args = CliArgs::try_parse_from(["hashmake"]).unwrap();
        assert_eq!(args.config, "Hashmake.toml");
        assert!(!args.once);
        assert!(!args.dry_run);
        assert!(args.target.is_none());
        assert!(args.cache.is_none());
    }

    #[test]
    fn parses_all_flags() {
        let args = CliArgs::try_parse_from([
            "hashmake",
            "--config",
            "site/Hashmake.toml",
            "--target",
            "docs",
            "--cache",
            "tmp/cache.json",
            "--once",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, "site/Hashmake.toml");
        assert_eq!(args.target.as_deref(), Some("docs"));
        assert_eq!(args.cache.as_deref(), Some("tmp/cache.json"));
        assert!(args.once);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
