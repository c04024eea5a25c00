mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use brokerdesk::api::{ApiClient, ApiError, Services};
use brokerdesk::cache::{KeyValueStore, NoopStore, SqliteStore};
use brokerdesk::config::{CacheConfig, Config};
use brokerdesk::lifecycle::{FetchScope, Settled};
use clap::Parser;
use color_eyre::Result;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "brokerdesk")]
#[command(about = "Command-line client for the real-estate brokerage backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/brokerdesk/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Backend url, overrides the config file
  #[arg(long, global = true)]
  api_url: Option<String>,

  /// Bypass the cache for this invocation
  #[arg(long, global = true)]
  no_cache: bool,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(url) = args.api_url {
    config.api.url = url;
  }
  if args.no_cache {
    config.cache.enabled = false;
  }

  let _log_guard = brokerdesk::logging::init(&config.logging)?;
  info!(url = %config.api.url, "brokerdesk starting");

  let client = ApiClient::new(&config.api, Config::get_api_token())?;
  let store = open_store(&config.cache);
  let services = Services::new(client, store, config.cache.clone());

  let scope = FetchScope::open();
  let guard = scope.guard();
  let mut stdout = std::io::stdout();

  let is_write = args.command.is_write();
  let run = commands::run(args.command, &services, scope.token(), &mut stdout);
  let result = commands::until_interrupted(run, &scope, tokio::signal::ctrl_c()).await;

  match commands::settle(is_write, &guard, result) {
    Settled::Ready(()) => Ok(ExitCode::SUCCESS),
    Settled::Failed(report) => {
      match report.downcast_ref::<ApiError>() {
        Some(e) => eprintln!("error: {}", e.user_message(&e.to_string())),
        None => eprintln!("error: {:#}", report),
      }
      Ok(ExitCode::FAILURE)
    }
    Settled::Discarded => {
      eprintln!("Interrupted");
      Ok(ExitCode::from(130))
    }
  }
}

/// Cache store for this run. A cache that cannot be opened degrades to
/// always-miss instead of failing the command.
fn open_store(config: &CacheConfig) -> Arc<dyn KeyValueStore> {
  if !config.enabled {
    return Arc::new(NoopStore);
  }

  let opened = match &config.path {
    Some(path) => SqliteStore::open_at(path),
    None => SqliteStore::open(),
  };

  match opened {
    Ok(store) => Arc::new(store),
    Err(e) => {
      warn!(error = %e, "Cache unavailable, continuing without it");
      Arc::new(NoopStore)
    }
  }
}
