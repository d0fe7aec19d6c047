use actrack_core::models::{Activity, ActivityUnit, RecordValue, TimerSlot};
use actrack_core::storage::{FileStore, KeyValueStore};
use actrack_core::{Clock, ManualClock};
use actrack_tracker::presence::NoopPresenceService;
use actrack_tracker::{
    CoordinatorOptions, CsvRecordSink, DualTimerCoordinator, EventManager, Selection,
};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn activity(id: i64, name: &str) -> Activity {
    Activity {
        id,
        name: name.to_string(),
        unit: ActivityUnit::Duration,
        group: "study".to_string(),
        asset_key: Some("book".to_string()),
    }
}

/// One process lifetime: fresh event channel and coordinator over the same files.
async fn launch(
    data_dir: &Path,
    clock: &ManualClock,
) -> Result<(DualTimerCoordinator, Arc<CsvRecordSink>)> {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = Arc::new(FileStore::new(data_dir.join("state"))?);
    let records = Arc::new(CsvRecordSink::new(data_dir.to_path_buf(), clock.clone()));

    let coordinator = DualTimerCoordinator::restore(
        CoordinatorOptions::default(),
        store,
        clock,
        Arc::new(EventManager::new()),
        records.clone(),
        Arc::new(NoopPresenceService),
    )
    .await?;
    Ok((coordinator, records))
}

#[tokio::test]
async fn test_running_stopwatch_survives_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let clock = ManualClock::at_epoch();

    let (coordinator, _) = launch(temp_dir.path(), &clock).await?;
    coordinator
        .select_for_main(&activity(1, "Reading"), String::new())
        .await?;
    coordinator.set_memo(TimerSlot::Main, "chapter 2".to_string(), false).await?;
    drop(coordinator);

    // an hour passes while the process is down
    clock.advance_ms(3_600_000);

    let (coordinator, records) = launch(temp_dir.path(), &clock).await?;
    let status = coordinator.status(TimerSlot::Main).await;
    assert_eq!(status.display_ms, 3_600_000);
    assert_eq!(status.memo, "chapter 2");

    let record = coordinator.complete(TimerSlot::Main, None).await?;
    assert_eq!(record.value, RecordValue::Minutes(60.0));
    assert_eq!(record.memo.as_deref(), Some("chapter 2"));

    let saved = records.records()?;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].id, record.id);

    let store = FileStore::new(temp_dir.path().join("state"))?;
    assert!(store.get(TimerSlot::Main.storage_key())?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_switch_is_durable_across_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let clock = ManualClock::at_epoch();

    let (coordinator, _) = launch(temp_dir.path(), &clock).await?;
    coordinator
        .select_for_main(&activity(1, "Reading"), String::new())
        .await?;
    coordinator
        .select_for_sub(&activity(3, "Music"), String::new())
        .await?;
    clock.advance_ms(60_000);
    let selection = coordinator
        .select_for_main(&activity(2, "Writing"), String::new())
        .await?;
    assert!(matches!(selection, Selection::Switched { .. }));
    drop(coordinator);

    clock.advance_ms(30_000);
    let (coordinator, records) = launch(temp_dir.path(), &clock).await?;

    let main = coordinator.status(TimerSlot::Main).await;
    assert_eq!(main.binding.map(|b| b.activity_id), Some(2));
    assert_eq!(main.display_ms, 30_000);

    let sub = coordinator.status(TimerSlot::Sub).await;
    assert_eq!(sub.binding.map(|b| b.asset_key), Some("book".to_string()));
    assert_eq!(sub.display_ms, 90_000);

    // the finished run was recorded exactly once, before the restart
    let saved = records.records()?;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].activity_id, 1);
    assert_eq!(saved[0].value, RecordValue::Minutes(1.0));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_snapshot_starts_idle() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let clock = ManualClock::at_epoch();

    let store = FileStore::new(temp_dir.path().join("state"))?;
    store.set(TimerSlot::Main.storage_key(), "{not json")?;

    let (coordinator, _) = launch(temp_dir.path(), &clock).await?;
    assert!(!coordinator.engine(TimerSlot::Main).is_running().await);
    assert_eq!(
        store.get("stopwatch_state.corrupt")?.as_deref(),
        Some("{not json")
    );
    Ok(())
}
