//! Subcommands and their execution.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use brokerdesk::api::{ApiError, Filters, ResourceKind, Services};
use brokerdesk::cache::{age_display, CacheSource};
use brokerdesk::lifecycle::{Effect, FetchScope, LivenessGuard, Settled};
use clap::Subcommand;
use color_eyre::{eyre::eyre, Report, Result};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List records of a resource
  List {
    resource: ResourceKind,
    /// Query filter as key=value (repeatable). Filtered listings skip the cache.
    #[arg(short, long = "filter", value_parser = Filters::parse_pair)]
    filters: Vec<(String, String)>,
  },
  /// Show a single record
  Get { resource: ResourceKind, id: String },
  /// Create a record from a JSON body
  Create {
    resource: ResourceKind,
    #[arg(short, long)]
    data: String,
  },
  /// Update a record from a JSON body
  Update {
    resource: ResourceKind,
    id: String,
    #[arg(short, long)]
    data: String,
  },
  /// Delete a record
  Delete { resource: ResourceKind, id: String },
  /// Search owners by name or CI
  SearchOwners { term: String },
  /// Re-list a resource periodically until interrupted
  Watch {
    resource: ResourceKind,
    /// Seconds between refreshes
    #[arg(short, long, default_value_t = 30)]
    interval: u64,
  },
  /// Inspect or clear cached listings
  Cache {
    #[command(subcommand)]
    action: CacheCommand,
  },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
  /// Show age and freshness of every cache slot
  Status,
  /// Drop one cached listing, or all of them
  Clear { resource: Option<ResourceKind> },
  /// Load every cached listing now
  Warm,
}

impl Command {
  /// Whether the command changes data on the backend.
  pub fn is_write(&self) -> bool {
    matches!(
      self,
      Command::Create { .. } | Command::Update { .. } | Command::Delete { .. }
    )
  }
}

/// Execute `command`, writing results to `out`.
///
/// Every request observes `cancel`; an interrupted command returns an
/// `ApiError::Cancelled`.
pub async fn run<W: Write>(
  command: Command,
  services: &Services,
  cancel: CancellationToken,
  out: &mut W,
) -> Result<()> {
  match command {
    Command::List { resource, filters } => {
      let service = services.raw(resource);
      let filters: Filters = filters.into_iter().collect();
      let records = if filters.is_empty() {
        let result = service.load_all(&cancel).await?;
        info!(
          resource = %resource,
          from_cache = result.source == CacheSource::Cache,
          "Listing loaded"
        );
        result.data
      } else {
        service.get_filtered(&filters, &cancel).await?
      };
      print_json(out, &records)
    }
    Command::Get { resource, id } => {
      let record = services.raw(resource).get_by_id(&id, &cancel).await?;
      print_json(out, &record)
    }
    Command::Create { resource, data } => {
      let body = parse_body(&data)?;
      let created = services.raw(resource).create(&body).await?;
      print_json(out, &created)
    }
    Command::Update { resource, id, data } => {
      let body = parse_body(&data)?;
      let updated = services.raw(resource).update(&id, &body).await?;
      print_json(out, &updated)
    }
    Command::Delete { resource, id } => {
      let response = services.raw(resource).delete(&id).await?;
      if !response.is_null() {
        print_json(out, &response)?;
      }
      Ok(())
    }
    Command::SearchOwners { term } => {
      let owners = services.owners().search(&term, &cancel).await?;
      for owner in &owners {
        writeln!(out, "{}\t{}", owner.ci, owner.full_name())?;
      }
      Ok(())
    }
    Command::Watch { resource, interval } => {
      watch(services, resource, Duration::from_secs(interval.max(1)), cancel, out).await
    }
    Command::Cache { action } => match action {
      CacheCommand::Status => cache_status(services, out),
      CacheCommand::Clear { resource } => cache_clear(services, resource, out),
      CacheCommand::Warm => {
        let lookups = services.load_lookups(&cancel).await?;
        writeln!(
          out,
          "Loaded {} roles, {} properties, {} owners",
          lookups.roles.len(),
          lookups.properties.len(),
          lookups.owners.len()
        )?;
        Ok(())
      }
    },
  }
}

/// Drive a command to completion, closing `scope` when `interrupt` fires.
///
/// The command is still awaited after an interrupt so it can settle. An
/// interrupt source that fails (no signal handler) is logged and ignored.
pub async fn until_interrupted<R, I>(run: R, scope: &FetchScope, interrupt: I) -> Result<()>
where
  R: Future<Output = Result<()>>,
  I: Future<Output = std::io::Result<()>>,
{
  tokio::pin!(run);
  tokio::select! {
    result = &mut run => result,
    signal = interrupt => {
      match signal {
        // Close first so whatever a read settles with is discarded
        Ok(()) => scope.close(),
        Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
      }
      run.await
    }
  }
}

/// Classify a finished command for reporting.
///
/// Reads go through the scope's guard. Writes are reported as they settled:
/// an interrupt cannot take back a write the backend already applied.
pub fn settle(is_write: bool, guard: &LivenessGuard, result: Result<()>) -> Settled<(), Report> {
  if is_write {
    return match result {
      Ok(()) => Settled::Ready(()),
      Err(e) => Settled::Failed(e),
    };
  }
  guard.settle(result)
}

async fn watch<W: Write>(
  services: &Services,
  resource: ResourceKind,
  interval: Duration,
  cancel: CancellationToken,
  out: &mut W,
) -> Result<()> {
  let service = services.raw(resource);
  let mut effect: Effect<ResourceKind, Vec<Value>, ApiError> =
    Effect::new(resource, move |_, run_cancel| {
      let service = service.clone();
      async move { service.get_all(&run_cancel).await }
    });
  effect.mount();

  let mut ticker = tokio::time::interval(interval);
  ticker.tick().await;

  loop {
    let loading = effect.is_loading();
    tokio::select! {
      _ = cancel.cancelled() => {
        effect.unmount();
        return Err(ApiError::Cancelled.into());
      }
      _ = effect.changed(), if loading => {
        if let Some(message) = effect.take_error() {
          writeln!(out, "error: {}", message)?;
        } else {
          print_json(out, effect.data())?;
        }
      }
      _ = ticker.tick() => effect.refetch(),
    }
  }
}

fn cache_status<W: Write>(services: &Services, out: &mut W) -> Result<()> {
  for kind in ResourceKind::cached() {
    let status = match services.cache_for(kind) {
      None => "disabled".to_string(),
      Some(cache) => match cache.age() {
        Some(age) => format!("fresh, stored {} (ttl {}s)", age_display(age), cache.ttl().as_secs()),
        None => "empty".to_string(),
      },
    };
    writeln!(out, "{:<12} {}", kind.to_string(), status)?;
  }
  Ok(())
}

fn cache_clear<W: Write>(services: &Services, resource: Option<ResourceKind>, out: &mut W) -> Result<()> {
  let kinds: Vec<ResourceKind> = match resource {
    Some(kind) if !kind.is_cached() => {
      return Err(eyre!("{} listings are never cached", kind));
    }
    Some(kind) => vec![kind],
    None => ResourceKind::cached().collect(),
  };

  for kind in kinds {
    if let Some(cache) = services.cache_for(kind) {
      cache.clear();
      writeln!(out, "Cleared {}", kind)?;
    }
  }
  Ok(())
}

fn parse_body(data: &str) -> Result<Value> {
  serde_json::from_str(data).map_err(|e| eyre!("Invalid JSON body: {}", e))
}

fn print_json<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
  writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
  Ok(())
}
