use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::endpoints::{ForgeClient, PrintOutput};
use crate::gateway::{self, AppState};
use crate::install::{InstallRequest, require_repo};
use crate::instance::{Instances, StoreInstance};
use crate::ledger::TracingObserver;
use crate::ledger::poller::UpdatePoller;
use crate::models::{InstallMode, PackageType};

/// Entry id of the instance built from the environment.
pub const DEFAULT_ENTRY: &str = "default";

/// OnOff store - browse, install and update packages hosted on a Gitea forge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Forge base URL (overrides ONOFF_STORE_URL)
    #[arg(long, global = true)]
    pub url: Option<String>,
    /// API token (overrides ONOFF_STORE_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP gateway and the periodic update check
    Serve {
        /// Listen address (overrides ONOFF_STORE_BIND)
        #[arg(short = 'b', long)]
        bind: Option<String>,
    },
    /// Check every tracked package for a newer release, once
    CheckUpdates,
    /// List tracked packages
    List,
    /// List installable packages from the forge
    Browse,
    /// Install or reinstall a package
    Install {
        /// Repository owner (user or organization)
        owner: String,
        /// Repository name
        repo: String,
        #[arg(short = 't', long = "type", default_value_t = PackageType::Integration, value_enum)]
        package_type: PackageType,
        #[arg(short = 'm', long, value_enum)]
        mode: Option<InstallMode>,
        /// Release asset to download
        #[arg(short = 'a', long)]
        asset_name: Option<String>,
        /// Release tag, the latest release when omitted
        #[arg(short = 'v', long)]
        version: Option<String>,
    },
    /// Remove a package's files and stop tracking it
    Uninstall {
        owner: String,
        repo: String,
        #[arg(short = 't', long = "type", default_value_t = PackageType::Integration, value_enum)]
        package_type: PackageType,
    },
    /// Print a repository's README
    Readme { owner: String, repo: String },
    /// Check whether the configured token is accepted
    TestAuth,
}

pub fn init_tracing(cfg: &Config) {
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: ONOFF_STORE_LOG='{}' is not a valid tracing filter ({}); falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn print<T: Serialize>(output: T) -> anyhow::Result<()> {
    let out = PrintOutput {
        status: "ok".to_string(),
        output,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

pub async fn execute() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(url) = cli.url {
        cfg.forge_url = url;
    }
    if let Some(token) = cli.token.filter(|t| !t.trim().is_empty()) {
        cfg.token = Some(token);
    }
    init_tracing(&cfg);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                cfg.bind_address = bind;
            }
            serve(cfg).await?;
        }
        Commands::TestAuth => {
            let client = ForgeClient::new(&cfg.forge_url, cfg.token.clone());
            print(client.test_auth().await)?;
        }
        Commands::Readme { owner, repo } => {
            let client = ForgeClient::new(&cfg.forge_url, cfg.token.clone());
            match client.get_readme(&owner, &repo).await? {
                Some(text) => println!("{}", text),
                None => eprintln!("No README found for {}/{}", owner, repo),
            }
        }
        Commands::CheckUpdates => print(open(&cfg).await?.refresh().await?)?,
        Commands::List => print(open(&cfg).await?.ledger.packages().await)?,
        Commands::Browse => print(open(&cfg).await?.browse().await)?,
        Commands::Install {
            owner,
            repo,
            package_type,
            mode,
            asset_name,
            version,
        } => {
            let mut req = InstallRequest::new(&owner, &repo, package_type)?;
            req.mode = mode;
            req.asset_name = asset_name.filter(|a| !a.trim().is_empty());
            if let Some(tag) = version.as_deref().filter(|v| !v.trim().is_empty()) {
                req = req.version(tag);
            }
            print(open(&cfg).await?.install(&req).await?)?;
        }
        Commands::Uninstall {
            owner,
            repo,
            package_type,
        } => {
            let (owner, repo) = require_repo(Some(&owner), Some(&repo))?;
            let tracked = open(&cfg)
                .await?
                .uninstall(&owner, &repo, package_type)
                .await?;
            print(tracked)?;
        }
    }
    Ok(())
}

async fn open(cfg: &Config) -> anyhow::Result<StoreInstance> {
    let instance = StoreInstance::from_config(DEFAULT_ENTRY, cfg)
        .await
        .context("failed to open the package ledger")?;
    instance.ledger.attach_observer(Arc::new(TracingObserver));
    Ok(instance)
}

async fn serve(cfg: Config) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "onoff-store starting");
    let instance = open(&cfg).await?;
    if !instance.client.test_auth().await {
        warn!("token rejected by the forge; continuing with public access only");
    }

    let mut instances = Instances::new();
    let instance = instances.insert(instance);
    let poller = UpdatePoller::spawn(instance.ledger.clone(), cfg.poll_interval);

    let app = gateway::build(Arc::new(AppState { instances }));
    let listener = tokio::net::TcpListener::bind(&cfg.bind_address)
        .await
        .with_context(|| format!("cannot bind {}", cfg.bind_address))?;
    info!(addr = %cfg.bind_address, "HTTP gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.stop();
    info!("onoff-store stopped");
    Ok(())
}

/// Resolves on SIGINT (Ctrl-C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
