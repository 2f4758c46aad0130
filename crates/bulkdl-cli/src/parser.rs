//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Batch downloader: queue URLs, then download them a few at a time.
#[derive(Parser)]
#[command(name = "bulkdl")]
#[command(about = "Queue and download batches of files")]
#[command(version)]
pub struct Cli {
    /// Database holding the batch (defaults to the user data directory)
    #[arg(long = "db", env = "BULKDL_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["bulkdl", "--verbose", "--db", "/tmp/b.db", "list"]);
        assert!(cli.verbose);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/b.db")));
        assert!(matches!(cli.command, Some(Commands::List)));
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::parse_from([
            "bulkdl",
            "run",
            "https://example.com/a",
            "--concurrency",
            "5",
            "--format",
            "mp4",
        ]);
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.urls, vec!["https://example.com/a".to_string()]);
        assert_eq!(args.concurrency, Some(5));
        assert_eq!(args.format.as_deref(), Some("mp4"));
    }

    #[test]
    fn test_retry_requires_id_or_all() {
        assert!(Cli::try_parse_from(["bulkdl", "retry"]).is_err());
        assert!(Cli::try_parse_from(["bulkdl", "retry", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["bulkdl", "retry", "x", "--all"]).is_err());
    }
}
