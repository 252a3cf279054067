//! CLI entry point for the ERP session bridge tool.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use erp_bridge_core::{
    BridgeConfig, BridgeOutcome, CookieSource, DetectorConfig, FileCookieSource, FileStore,
    HandoffArtifact, HttpLoginSurface, MemoryCookieSource, ScriptedLoginSurface, SessionBridge,
    SessionCache, SessionDetector,
};
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, CacheAction, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let store = FileStore::open(&args.state_dir)
        .with_context(|| format!("failed to open state dir {}", args.state_dir.display()))?;
    let cache = SessionCache::new(Arc::new(store));

    match args.command {
        Command::Status {
            cookie_file,
            cookie_domain,
        } => {
            let cookies = FileCookieSource::load(&cookie_file, cookie_domain.as_deref())
                .with_context(|| format!("failed to load {}", cookie_file.display()))?;
            // A status check never triggers login; the surface is inert
            let detector = SessionDetector::new(
                Arc::new(cookies),
                cache,
                Arc::new(ScriptedLoginSurface::new(vec![])),
                DetectorConfig::default(),
            );

            match detector.check_once() {
                Some(snapshot) => {
                    println!("{}", serde_json::to_string_pretty(&snapshot.user_info)?);
                    info!(status = %detector.current_status(), "session found");
                }
                None => {
                    warn!("no valid session evidence (live or stored)");
                    println!("not-logged-in");
                }
            }
        }

        Command::Handoff {
            cookie_file,
            cookie_domain,
            embed_url,
            login_url,
            max_retries,
        } => {
            let cookies: Arc<dyn CookieSource> = match cookie_file {
                Some(path) => Arc::new(
                    FileCookieSource::load(&path, cookie_domain.as_deref())
                        .with_context(|| format!("failed to load {}", path.display()))?,
                ),
                None => Arc::new(MemoryCookieSource::new()),
            };

            let surface = HttpLoginSurface::new(login_url.clone())
                .context("failed to build login surface client")?;
            let detector = Arc::new(SessionDetector::new(
                Arc::clone(&cookies),
                cache.clone(),
                Arc::new(surface),
                DetectorConfig::with_max_retries(max_retries),
            ));
            let bridge = SessionBridge::new(
                detector,
                cookies,
                cache,
                None,
                BridgeConfig::new(embed_url, login_url),
            );

            match bridge.run_once().await {
                BridgeOutcome::Ready {
                    artifact, stored, ..
                } => {
                    if stored {
                        info!("session restored from cache");
                    }
                    match artifact {
                        HandoffArtifact::Url(url) => println!("{url}"),
                        HandoffArtifact::Cookies(cookies) => {
                            for cookie in cookies {
                                println!("{cookie}");
                            }
                        }
                    }
                }
                BridgeOutcome::Failed { kind } => {
                    bail!("session detection failed: {kind}");
                }
            }
        }

        Command::Watch {
            cookie_file,
            cookie_domain,
            login_url,
            max_retries,
        } => {
            let cookies: Arc<dyn CookieSource> = match cookie_file {
                Some(path) => Arc::new(
                    FileCookieSource::load(&path, cookie_domain.as_deref())
                        .with_context(|| format!("failed to load {}", path.display()))?,
                ),
                None => Arc::new(MemoryCookieSource::new()),
            };

            let surface = HttpLoginSurface::new(login_url)
                .context("failed to build login surface client")?;
            let detector = Arc::new(SessionDetector::new(
                cookies,
                cache,
                Arc::new(surface),
                DetectorConfig::with_max_retries(max_retries),
            ));

            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = shutdown_tx.send(true);
                }
            });

            let mut statuses = detector.status();
            let printer = tokio::spawn(async move {
                while statuses.changed().await.is_ok() {
                    let status = statuses.borrow_and_update().clone();
                    println!("{status}");
                }
            });

            info!("watching for session changes (ctrl-c to stop)");
            detector.run(shutdown_rx).await;
            printer.abort();

            if detector.current_status().is_terminal() {
                bail!("session detection failed: {}", detector.current_status());
            }
        }

        Command::Cache { action } => match action {
            CacheAction::Show => match cache.load() {
                Some(stored) => {
                    println!("{}", serde_json::to_string_pretty(&stored)?);
                }
                None => println!("no fresh cached session"),
            },
            CacheAction::Clear => {
                cache.clear();
                info!("session cache cleared");
            }
        },
    }

    Ok(())
}
