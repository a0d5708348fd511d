//! Periodic sweep worker behavior with in-memory storage.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use slideai_db::{
    generate_storage_path, MemoryFileRecordRepository, MemoryStorageBackend, StorageBackend,
};
use slideai_jobs::{
    Clock, FileRecordRepository, FileState, ManualClock, NewFileRecord, ServiceType, SweepConfig,
    SweepWorker, Sweeper, WorkerConfig, WorkerEvent,
};

async fn seed_completed(
    files: &MemoryFileRecordRepository,
    storage: &MemoryStorageBackend,
    clock: &ManualClock,
) -> Uuid {
    let id = Uuid::now_v7();
    let path = generate_storage_path(&id);
    storage.write(&path, b"video").await.unwrap();
    files
        .insert(NewFileRecord::new(
            id,
            3,
            "talk.mp4",
            path,
            ServiceType::VideoAbstract,
            5,
            clock.now(),
            chrono::Duration::days(3),
        ))
        .await
        .unwrap();
    files.mark_completed(id, "summary").await.unwrap();
    id
}

#[tokio::test(start_paused = true)]
async fn test_worker_sweeps_then_stops_on_shutdown() {
    let files = Arc::new(MemoryFileRecordRepository::new());
    let storage = Arc::new(MemoryStorageBackend::new());
    let clock = Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap(),
    ));

    let id = seed_completed(&files, &storage, &clock).await;
    clock.advance(Duration::from_secs(4 * 24 * 3600));

    let sweeper = Arc::new(Sweeper::new(
        files.clone(),
        storage.clone(),
        clock.clone(),
        SweepConfig::default(),
    ));
    let handle = SweepWorker::new(sweeper, WorkerConfig::default().with_interval(60)).start();
    let mut events = handle.events();

    assert!(matches!(events.recv().await.unwrap(), WorkerEvent::WorkerStarted));
    match events.recv().await.unwrap() {
        WorkerEvent::SweepCompleted(report) => assert_eq!(report.processed, 1),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(files.get(id).await.unwrap().unwrap().status, FileState::Expired);
    assert!(storage.is_empty().await);

    // Next tick finds nothing new.
    match events.recv().await.unwrap() {
        WorkerEvent::SweepCompleted(report) => assert_eq!(report.processed, 0),
        other => panic!("unexpected event: {:?}", other),
    }

    handle.shutdown().await.unwrap();
    loop {
        match events.recv().await.unwrap() {
            WorkerEvent::WorkerStopped => break,
            WorkerEvent::SweepCompleted(_) => continue,
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_disabled_worker_never_sweeps() {
    let files = Arc::new(MemoryFileRecordRepository::new());
    let storage = Arc::new(MemoryStorageBackend::new());
    let clock = Arc::new(ManualClock::starting_at(
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap(),
    ));
    let id = seed_completed(&files, &storage, &clock).await;
    clock.advance(Duration::from_secs(4 * 24 * 3600));

    let sweeper = Arc::new(Sweeper::new(
        files.clone(),
        storage.clone(),
        clock.clone(),
        SweepConfig::default(),
    ));
    let _handle = SweepWorker::new(sweeper, WorkerConfig::default().with_enabled(false)).start();

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(files.get(id).await.unwrap().unwrap().status, FileState::Completed);
}
