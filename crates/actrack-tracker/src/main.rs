//! Actrack
//!
//! Command-line front end for the main and sub activity stopwatches.

use actrack_core::models::{format_elapsed, Activity, Config, TimerSlot};
use actrack_core::storage::{init_data_dir, ActivityCatalog, FileStore};
use actrack_core::{Clock, SystemClock};
use actrack_tracker::cli::{parse_start_time, Cli, Command, ConfigArgs};
use actrack_tracker::config::{PresenceConfigUpdate, TimerConfigUpdate};
use actrack_tracker::timer::SlotStatus;
use actrack_tracker::{
    presence, ConfigManager, CoordinatorOptions, CsvRecordSink, DualTimerCoordinator,
    EventManager, PresenceSyncAdapter, Selection, TimerEventType,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Extra time the presence adapter gets to drain after the last event
const DRAIN_GRACE: Duration = Duration::from_secs(1);

struct App {
    config: Config,
    catalog: ActivityCatalog,
    records: Arc<CsvRecordSink>,
    coordinator: DualTimerCoordinator,
    events: Arc<EventManager>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new()?;
    let config = config_manager.get().await;
    let data_dir = init_data_dir()?;
    let log_file_path = init_logging(&data_dir, cli.log_level.as_deref().unwrap_or(&config.log_level))?;
    tracing::debug!("Log file: {}", log_file_path.display());

    if let Command::Config(args) = &cli.command {
        return run_config(&config_manager, args).await;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events = Arc::new(EventManager::new());

    let presence_service = presence::from_config(&config.presence)?;
    let adapter = PresenceSyncAdapter::new(presence_service.clone()).spawn(events.subscribe());

    let store = Arc::new(FileStore::new(data_dir.join("state"))?);
    let records = Arc::new(CsvRecordSink::new(data_dir.clone(), clock.clone()));
    let catalog = ActivityCatalog::load(data_dir)?;

    let coordinator = DualTimerCoordinator::restore(
        CoordinatorOptions::from_config(&config.timer, &config.presence),
        store,
        clock,
        events.clone(),
        records.clone(),
        presence_service,
    )
    .await?;
    tracing::info!("Stopwatches restored");

    let drain_timeout = config.presence.timeout() + DRAIN_GRACE;
    let app = App {
        config,
        catalog,
        records,
        coordinator,
        events,
    };
    let result = app.run(cli.command).await;

    // Dropping the last sender closes the channel so the adapter can finish.
    drop(app);
    if tokio::time::timeout(drain_timeout, adapter).await.is_err() {
        tracing::warn!("Presence sync did not finish before exit");
    }

    result
}

fn init_logging(data_dir: &Path, level: &str) -> Result<PathBuf> {
    let log_file_path = data_dir.join("actrack.log");
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .with_context(|| format!("opening {}", log_file_path.display()))?;

    // stdout is reserved for command output
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    let stderr_writer = std::io::stderr.with_max_level(tracing::Level::WARN);
    let file_writer = log_file.with_max_level(tracing::Level::DEBUG);

    tracing_subscriber::fmt()
        .with_writer(stderr_writer.and(file_writer))
        .with_env_filter(level)
        .with_ansi(false)
        .init();

    Ok(log_file_path)
}

async fn run_config(manager: &ConfigManager, args: &ConfigArgs) -> Result<()> {
    let config = if args.is_empty() {
        manager.get().await
    } else {
        if args.tick_ms.is_some() || args.auto_start_main.is_some() {
            manager
                .update_timer_config(TimerConfigUpdate {
                    tick_interval_ms: args.tick_ms,
                    auto_start_main: args.auto_start_main,
                })
                .await?;
        }
        manager
            .update_presence_config(PresenceConfigUpdate {
                enabled: args.presence,
                endpoint: args.presence_endpoint.clone(),
                ..Default::default()
            })
            .await?
    };

    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn slot(sub: bool) -> TimerSlot {
    if sub {
        TimerSlot::Sub
    } else {
        TimerSlot::Main
    }
}

impl App {
    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Status => self.status().await,
            Command::Start { activity, sub } => self.start(&activity, sub).await,
            Command::Complete { sub, memo } => {
                let record = self.coordinator.complete(slot(sub), memo).await?;
                println!(
                    "Recorded {:.2} min for {}",
                    record.value.as_f64(),
                    self.activity_label(record.activity_id)
                );
                Ok(())
            }
            Command::Cancel { sub } => {
                let binding = self.coordinator.cancel(slot(sub)).await?;
                println!("Cancelled {}", binding.activity_name);
                Ok(())
            }
            Command::EditStart { sub, at } => {
                let at = parse_start_time(&at, chrono::Utc::now()).map_err(anyhow::Error::msg)?;
                let display_ms = self.coordinator.edit_start(slot(sub), at).await?;
                println!("Elapsed now {}", format_elapsed(display_ms));
                Ok(())
            }
            Command::Memo { sub, text, sync } => {
                self.coordinator.set_memo(slot(sub), text, sync).await?;
                println!("Memo saved");
                Ok(())
            }
            Command::Count {
                activity,
                value,
                memo,
            } => {
                let activity = self.catalog.resolve(&activity)?;
                let record = self.coordinator.record_count(activity, value, memo).await?;
                println!("Recorded {} for {}", record.value.as_f64(), activity.name);
                Ok(())
            }
            Command::Watch => self.watch().await,
            Command::Retry => {
                let report = self.coordinator.retry_pending().await?;
                println!(
                    "Submitted {}, {} still pending",
                    report.submitted, report.remaining
                );
                Ok(())
            }
            Command::Config(_) => Ok(()),
        }
    }

    async fn start(&self, reference: &str, sub: bool) -> Result<()> {
        let activity = self.resolve_with_asset(reference)?;
        let details = self.records.details_for(activity.id);

        let selection = if sub {
            self.coordinator.select_for_sub(&activity, details).await?
        } else {
            self.coordinator.select_for_main(&activity, details).await?
        };

        match selection {
            Selection::Started { binding } => println!("Started {}", binding.activity_name),
            Selection::Unchanged => println!("{} is already running", activity.name),
            Selection::Switched { record } => println!(
                "Recorded {:.2} min for {}, now tracking {}",
                record.value.as_f64(),
                self.activity_label(record.activity_id),
                activity.name
            ),
        }
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        for slot in [TimerSlot::Main, TimerSlot::Sub] {
            print_status(&self.coordinator.status(slot).await);
        }
        let pending = self.coordinator.pending_count().await?;
        if pending > 0 {
            println!("{} record(s) pending, run `actrack retry`", pending);
        }
        Ok(())
    }

    async fn watch(&self) -> Result<()> {
        let mut rx = self.events.subscribe();
        for slot in [TimerSlot::Main, TimerSlot::Sub] {
            print_status(&self.coordinator.status(slot).await);
        }

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                received = rx.recv() => match received {
                    Ok(event) => match event.event_type {
                        TimerEventType::Tick { display_ms } => {
                            println!("{:<4} {}", event.slot, format_elapsed(display_ms))
                        }
                        other => tracing::info!(slot = %event.slot, "Event: {:?}", other),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Watch lagged, skipped {} events", skipped)
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        Ok(())
    }

    /// Activities without an asset use the configured default.
    fn resolve_with_asset(&self, reference: &str) -> Result<Activity> {
        let mut activity = self.catalog.resolve(reference)?.clone();
        if activity.asset_key.is_none() {
            activity.asset_key = Some(self.config.presence.default_asset_key.clone());
        }
        Ok(activity)
    }

    fn activity_label(&self, activity_id: i64) -> String {
        self.catalog
            .get(activity_id)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| format!("activity {}", activity_id))
    }
}

fn print_status(status: &SlotStatus) {
    match (&status.binding, status.start_reference) {
        (Some(binding), Some(start)) => {
            println!(
                "{:<4} {} since {} ({})",
                status.slot,
                binding.activity_name,
                start.with_timezone(&chrono::Local).format("%H:%M"),
                format_elapsed(status.display_ms)
            );
            if !status.memo.is_empty() {
                println!("     memo: {}", status.memo);
            }
        }
        _ => println!("{:<4} idle", status.slot),
    }
}
