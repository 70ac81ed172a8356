//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod init;
mod scrape;
mod sources;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "wongprime")]
#[command(about = "Retail price scraping and catalog ingestion")]
#[command(version)]
pub struct Cli {
    /// Config file path (TOML or JSON; defaults to ./wongprime.toml if present)
    #[arg(short, long, global = true, env = "WONGPRIME_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and register configured sources and categories
    Init,

    /// Scrape one or more sources
    Scrape {
        /// Source names to scrape (defaults to every enabled source)
        sources: Vec<String>,
        /// Scrape all enabled sources
        #[arg(short, long)]
        all: bool,
        /// Number of sources scraped at the same time
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Show recent run-log entries
    Status {
        /// Only show entries for this source
        #[arg(short, long)]
        source: Option<String>,
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// List configured sources
    Sources,
}

/// Run the CLI.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Init => init::cmd_init(&config).await,
        Commands::Scrape {
            sources,
            all,
            workers,
        } => scrape::cmd_scrape(&config, &sources, all, workers).await,
        Commands::Status { source, limit } => {
            status::cmd_status(&config, source.as_deref(), limit).await
        }
        Commands::Sources => sources::cmd_sources(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scrape_with_global_flags() {
        let cli = Cli::try_parse_from([
            "wongprime",
            "scrape",
            "Wong",
            "Plaza Vea",
            "--workers",
            "2",
            "-v",
            "--log-file",
            "run.log",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.log_file, Some(PathBuf::from("run.log")));
        match cli.command {
            Commands::Scrape {
                sources, workers, ..
            } => {
                assert_eq!(sources, vec!["Wong", "Plaza Vea"]);
                assert_eq!(workers, Some(2));
            }
            _ => panic!("expected scrape"),
        }
    }
}
