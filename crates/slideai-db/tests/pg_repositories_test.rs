//! PostgreSQL repository tests.
//!
//! Require a reachable database (`DATABASE_URL`); run with
//! `cargo test -p slideai-db -- --ignored`.

use chrono::{Duration, DurationRound, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use slideai_db::test_fixtures::{cleanup_user, connect_test_pool, ensure_users_table, seed_user};
use slideai_db::{
    generate_storage_path, DayWindow, FileRecordRepository, FileState, IdentityStore,
    NewFileRecord, NewUsageEvent, PgFileRecordRepository, PgIdentityStore, PgUsageRepository,
    ServiceType, UsageRepository,
};

const SCHEMA: &str = include_str!("../../../migrations/20260301000000_resource_manager.sql");

async fn setup() -> PgPool {
    let _ = dotenvy::dotenv();
    let pool = connect_test_pool()
        .await
        .expect("Failed to connect to test database");
    sqlx::raw_sql(SCHEMA)
        .execute(&pool)
        .await
        .expect("Failed to apply schema");
    ensure_users_table(&pool)
        .await
        .expect("Failed to create users table");
    pool
}

fn new_file(user_id: i64, created_at: chrono::DateTime<Utc>) -> NewFileRecord {
    let id = Uuid::now_v7();
    NewFileRecord::new(
        id,
        user_id,
        "deck.pdf",
        generate_storage_path(&id),
        ServiceType::PptToVideo,
        2048,
        created_at,
        Duration::days(3),
    )
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_identity_lookup_by_email() {
    let pool = setup().await;
    let store = PgIdentityStore::new(pool.clone());
    let user = seed_user(&pool, "lookup", true).await.unwrap();

    let found = store.find_by_key(&user.key).await.unwrap().unwrap();
    assert_eq!(found.id, user.id);
    assert!(found.is_privileged);
    assert!(store.find_by_key("nobody@test.slideai").await.unwrap().is_none());
    assert!(store
        .list_all()
        .await
        .unwrap()
        .iter()
        .any(|i| i.id == user.id));

    cleanup_user(&pool, user.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_usage_counted_per_utc_day() {
    let pool = setup().await;
    let repo = PgUsageRepository::new(pool.clone());
    let user = seed_user(&pool, "usage", false).await.unwrap();

    let window = DayWindow::containing(Utc::now());
    for offset in [0, 1] {
        repo.insert(NewUsageEvent {
            user_id: user.id,
            service_type: ServiceType::VideoAbstract,
            usage_date: window.start + Duration::hours(offset),
        })
        .await
        .unwrap();
    }
    repo.insert(NewUsageEvent {
        user_id: user.id,
        service_type: ServiceType::PptToVideo,
        usage_date: window.start - Duration::seconds(1),
    })
    .await
    .unwrap();

    let count = repo
        .count_in_window(user.id, window.start, window.end)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let listed = repo
        .list_in_window(user.id, window.start, window.end)
        .await
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.windows(2).all(|w| w[0].usage_date <= w[1].usage_date));

    let all_time = repo.count_by_service(user.id).await.unwrap();
    assert_eq!((all_time.video_abstract, all_time.ppt_to_video), (2, 1));

    cleanup_user(&pool, user.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_file_lifecycle_statements_are_conditional() {
    let pool = setup().await;
    let repo = PgFileRecordRepository::new(pool.clone());
    let user = seed_user(&pool, "files", false).await.unwrap();
    let now = Utc::now().duration_trunc(Duration::seconds(1)).unwrap();

    let rec = repo.insert(new_file(user.id, now)).await.unwrap();
    assert_eq!(rec.status, FileState::Processing);
    assert_eq!(rec.expires_at, now + Duration::days(3));

    assert!(!repo.mark_expired(rec.id).await.unwrap());
    let done = repo.mark_completed(rec.id, "summary").await.unwrap().unwrap();
    assert_eq!(done.status, FileState::Completed);
    assert_eq!(done.analysis_result.as_deref(), Some("summary"));
    assert!(repo.mark_completed(rec.id, "again").await.unwrap().is_none());

    let expiring = repo
        .list_expiring(user.id, now + Duration::days(2), now + Duration::days(3), 50)
        .await
        .unwrap();
    assert_eq!(expiring.len(), 1);

    let due = repo
        .list_due_for_expiry(now + Duration::days(3), 1000)
        .await
        .unwrap();
    assert!(due.iter().any(|r| r.id == rec.id));
    assert!(repo.mark_expired(rec.id).await.unwrap());
    assert!(!repo.mark_expired(rec.id).await.unwrap());

    assert!(repo.list_by_user(user.id, 100).await.unwrap().is_empty());

    cleanup_user(&pool, user.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_owned_delete_and_rollback() {
    let pool = setup().await;
    let repo = PgFileRecordRepository::new(pool.clone());
    let owner = seed_user(&pool, "owner", false).await.unwrap();
    let other = seed_user(&pool, "other", false).await.unwrap();
    let now = Utc::now();

    let pending = repo.insert(new_file(owner.id, now)).await.unwrap();
    let abandoned = repo
        .list_abandoned(now + Duration::days(3), 1000)
        .await
        .unwrap();
    assert!(abandoned.iter().any(|r| r.id == pending.id));
    assert!(repo.delete_processing(pending.id).await.unwrap());
    assert!(repo.get(pending.id).await.unwrap().is_none());

    let kept = repo.insert(new_file(owner.id, now)).await.unwrap();
    repo.mark_completed(kept.id, "ok").await.unwrap();
    assert!(!repo.delete_completed_owned(kept.id, other.id).await.unwrap());
    assert!(repo.get_owned(kept.id, other.id).await.unwrap().is_none());
    assert!(repo.delete_completed_owned(kept.id, owner.id).await.unwrap());

    cleanup_user(&pool, owner.id).await.unwrap();
    cleanup_user(&pool, other.id).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn test_storage_locator_is_unique() {
    let pool = setup().await;
    let repo = PgFileRecordRepository::new(pool.clone());
    let user = seed_user(&pool, "unique", false).await.unwrap();

    let first = new_file(user.id, Utc::now());
    let mut clash = new_file(user.id, Utc::now());
    clash.file_path = first.file_path.clone();

    repo.insert(first).await.unwrap();
    assert!(repo.insert(clash).await.is_err());

    cleanup_user(&pool, user.id).await.unwrap();
}
