//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use erp_bridge_core::DEFAULT_MAX_RETRIES;

/// Detect an existing ERP session and bridge it to an embedded consumer.
///
/// Reads session evidence from a cookie export, validates and caches it,
/// silently attempts login when no valid evidence exists, and prints the
/// handoff artifact for the embedded consumer.
#[derive(Parser, Debug)]
#[command(name = "erp-bridge")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding persisted session state
    #[arg(long, default_value = ".erp-bridge", global = true)]
    pub state_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a single check cycle against a cookie export and print the result
    Status {
        /// Netscape-format cookie file to read evidence from
        #[arg(long)]
        cookie_file: PathBuf,

        /// Only keep cookies matching this domain
        #[arg(long)]
        cookie_domain: Option<String>,
    },

    /// Run full detection (including silent login attempts) and print the
    /// handoff artifact
    Handoff {
        /// Netscape-format cookie file to read evidence from
        #[arg(long)]
        cookie_file: Option<PathBuf>,

        /// Only keep cookies matching this domain
        #[arg(long)]
        cookie_domain: Option<String>,

        /// The embedded consumer's URL
        #[arg(long)]
        embed_url: url::Url,

        /// The external ERP login URL
        #[arg(long)]
        login_url: url::Url,

        /// Maximum silent login attempts (1-10)
        #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..=10))]
        max_retries: u32,
    },

    /// Run detection, then keep watching for session changes until
    /// interrupted, printing each status transition
    Watch {
        /// Netscape-format cookie file to read evidence from
        #[arg(long)]
        cookie_file: Option<PathBuf>,

        /// Only keep cookies matching this domain
        #[arg(long)]
        cookie_domain: Option<String>,

        /// The external ERP login URL
        #[arg(long)]
        login_url: url::Url,

        /// Maximum silent login attempts (1-10)
        #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES, value_parser = clap::value_parser!(u32).range(1..=10))]
        max_retries: u32,
    },

    /// Inspect or clear the persisted session cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Print the cached session record, if fresh
    Show,
    /// Remove all persisted session state
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_status_parses_with_cookie_file() {
        let args =
            Args::try_parse_from(["erp-bridge", "status", "--cookie-file", "cookies.txt"]).unwrap();
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
        let Command::Status { cookie_file, .. } = args.command else {
            panic!("expected status subcommand");
        };
        assert_eq!(cookie_file, PathBuf::from("cookies.txt"));
    }

    #[test]
    fn test_cli_handoff_requires_urls() {
        let result = Args::try_parse_from(["erp-bridge", "handoff"]);
        assert!(result.is_err(), "embed/login URLs are required");

        let args = Args::try_parse_from([
            "erp-bridge",
            "handoff",
            "--embed-url",
            "https://chat.example.com/embed",
            "--login-url",
            "https://erp.example.com/login",
        ])
        .unwrap();
        let Command::Handoff { max_retries, .. } = args.command else {
            panic!("expected handoff subcommand");
        };
        assert_eq!(max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_cli_verbose_flag_counts() {
        let args = Args::try_parse_from(["erp-bridge", "-vv", "cache", "show"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert!(matches!(
            args.command,
            Command::Cache {
                action: CacheAction::Show
            }
        ));
    }

    #[test]
    fn test_cli_watch_requires_login_url() {
        let result = Args::try_parse_from(["erp-bridge", "watch"]);
        assert!(result.is_err(), "login URL is required");

        let args = Args::try_parse_from([
            "erp-bridge",
            "watch",
            "--login-url",
            "https://erp.example.com/login",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Watch { .. }));
    }

    #[test]
    fn test_cli_rejects_out_of_range_retries() {
        let result = Args::try_parse_from([
            "erp-bridge",
            "handoff",
            "--embed-url",
            "https://c.example.com",
            "--login-url",
            "https://e.example.com/login",
            "-r",
            "50",
        ]);
        assert!(result.is_err());
    }
}
