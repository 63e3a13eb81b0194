//! Integration tests for the `store_migrations` progress store.

use sqlx::PgPool;

use storeforge_core::{
    MigrationConfig, MigrationCounters, MigrationErrorEntry, MigrationErrorKind, MigrationPhase,
    MigrationStatus, Platform,
};
use storeforge_db::{DbError, NewMigration};

async fn seed(pool: &PgPool) -> i64 {
    let row = storeforge_db::create_migration(
        pool,
        &NewMigration {
            store_id: 1,
            platform: Platform::Shopify,
            source_shop_id: "acme.myshopify.com".to_string(),
            source_shop_name: Some("Acme".to_string()),
            access_token_ciphertext: "ct".to_string(),
            refresh_token_ciphertext: None,
            token_expires_at: None,
            config: MigrationConfig::default(),
        },
    )
    .await
    .expect("create migration");
    row.id
}

#[sqlx::test(migrations = "../../migrations")]
async fn create_starts_connected_with_zeroed_counters(pool: PgPool) {
    let id = seed(&pool).await;
    let row = storeforge_db::get_migration(&pool, id).await.expect("row");

    assert_eq!(row.status, "connected");
    assert_eq!(row.counters(), MigrationCounters::default());
    assert!(row.started_at.is_none());
    assert!(row.completed_at.is_none());
    assert_eq!(row.version, 0);
    assert!(row.id_map(MigrationPhase::Products).is_empty());
    assert!(row.error_entries().is_empty());
    assert!(row.parsed_config().expect("config").import_products);
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_transitions_to_running_and_stamps_started_at(pool: PgPool) {
    let id = seed(&pool).await;
    let row = storeforge_db::claim_for_run(&pool, id).await.expect("claim");

    assert_eq!(row.status, "running");
    assert!(row.started_at.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_refuses_a_running_migration(pool: PgPool) {
    let id = seed(&pool).await;
    storeforge_db::claim_for_run(&pool, id).await.expect("claim");

    let second = storeforge_db::claim_for_run(&pool, id).await;
    assert!(
        matches!(second, Err(DbError::NotClaimable { status, .. }) if status == "running"),
        "second claim must lose the lease"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn claim_resumes_paused_and_cancelled(pool: PgPool) {
    let id = seed(&pool).await;
    storeforge_db::claim_for_run(&pool, id).await.expect("claim");

    for status in [MigrationStatus::Paused, MigrationStatus::Cancelled] {
        storeforge_db::set_status(&pool, id, status)
            .await
            .expect("set status");
        let row = storeforge_db::claim_for_run(&pool, id).await.expect("reclaim");
        assert_eq!(row.status, "running");
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn terminal_status_stamps_completed_at(pool: PgPool) {
    let id = seed(&pool).await;
    storeforge_db::claim_for_run(&pool, id).await.expect("claim");
    storeforge_db::set_status(&pool, id, MigrationStatus::Completed)
        .await
        .expect("complete");

    let row = storeforge_db::get_migration(&pool, id).await.expect("row");
    assert_eq!(row.status, "completed");
    assert!(row.completed_at.is_some());
    assert!(row.parsed_status().expect("status").is_terminal());
}

#[sqlx::test(migrations = "../../migrations")]
async fn flush_progress_writes_absolute_counters_and_bumps_version(pool: PgPool) {
    let id = seed(&pool).await;

    let counters = MigrationCounters {
        total_products: 10,
        migrated_products: 3,
        failed_products: 1,
        ..MigrationCounters::default()
    };

    let version = storeforge_db::flush_progress(
        &pool,
        id,
        &counters,
        Some(MigrationPhase::Products),
        Some("cursor-abc"),
        0,
    )
    .await
    .expect("flush");
    assert_eq!(version, 1);

    let row = storeforge_db::get_migration(&pool, id).await.expect("row");
    assert_eq!(row.total_products, 10);
    assert_eq!(row.migrated_products, 3);
    assert_eq!(row.failed_products, 1);
    assert_eq!(row.last_phase.as_deref(), Some("products"));
    assert_eq!(row.last_cursor.as_deref(), Some("cursor-abc"));
    assert_eq!(row.version, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn flush_progress_with_stale_version_is_a_conflict(pool: PgPool) {
    let id = seed(&pool).await;
    let counters = MigrationCounters::default();

    storeforge_db::flush_progress(&pool, id, &counters, None, None, 0)
        .await
        .expect("first flush");

    let stale = storeforge_db::flush_progress(&pool, id, &counters, None, None, 0).await;
    assert!(
        matches!(
            stale,
            Err(DbError::VersionConflict {
                expected_version: 0,
                ..
            })
        ),
        "stale flush must not silently win, got: {stale:?}"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn append_error_keeps_only_the_last_hundred(pool: PgPool) {
    let id = seed(&pool).await;

    for n in 0..150 {
        let entry = MigrationErrorEntry::new(MigrationErrorKind::Product, format!("error {n}"));
        storeforge_db::append_error(&pool, id, &entry)
            .await
            .expect("append");
    }

    let row = storeforge_db::get_migration(&pool, id).await.expect("row");
    let errors = row.error_entries();
    assert_eq!(errors.len(), 100);
    // Oldest dropped first: entries 50..150 remain, in append order.
    assert_eq!(errors[0].message, "error 50");
    assert_eq!(errors[99].message, "error 149");
}

#[sqlx::test(migrations = "../../migrations")]
async fn merge_id_map_entry_accumulates_per_phase(pool: PgPool) {
    let id = seed(&pool).await;

    storeforge_db::merge_id_map_entry(&pool, id, MigrationPhase::Products, "111", 1)
        .await
        .expect("merge");
    storeforge_db::merge_id_map_entry(&pool, id, MigrationPhase::Products, "222", 2)
        .await
        .expect("merge");
    storeforge_db::merge_id_map_entry(&pool, id, MigrationPhase::Customers, "900", 9)
        .await
        .expect("merge");

    let products = storeforge_db::fetch_id_map(&pool, id, MigrationPhase::Products)
        .await
        .expect("fetch");
    assert_eq!(products.len(), 2);
    assert_eq!(products.get("111"), Some(&1));
    assert_eq!(products.get("222"), Some(&2));

    let customers = storeforge_db::fetch_id_map(&pool, id, MigrationPhase::Customers)
        .await
        .expect("fetch");
    assert_eq!(customers.len(), 1);

    // Re-merging the same key overwrites rather than duplicating.
    storeforge_db::merge_id_map_entry(&pool, id, MigrationPhase::Products, "111", 5)
        .await
        .expect("merge");
    let products = storeforge_db::fetch_id_map(&pool, id, MigrationPhase::Products)
        .await
        .expect("fetch");
    assert_eq!(products.len(), 2);
    assert_eq!(products.get("111"), Some(&5));
}

#[sqlx::test(migrations = "../../migrations")]
async fn latest_migration_wins_over_older_attempts(pool: PgPool) {
    let first = seed(&pool).await;
    let second = seed(&pool).await;

    let latest = storeforge_db::latest_migration_for_store(&pool, 1)
        .await
        .expect("query")
        .expect("row");
    assert_eq!(latest.id, second);
    assert_ne!(latest.id, first);

    // Older rows are audit history, never deleted.
    let older = storeforge_db::get_migration(&pool, first).await;
    assert!(older.is_ok());
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_tokens_replaces_ciphertexts(pool: PgPool) {
    let id = seed(&pool).await;
    let expiry = chrono::Utc::now() + chrono::Duration::hours(1);

    storeforge_db::update_tokens(&pool, id, "new-access-ct", Some("new-refresh-ct"), Some(expiry))
        .await
        .expect("update");

    let row = storeforge_db::get_migration(&pool, id).await.expect("row");
    assert_eq!(row.access_token, "new-access-ct");
    assert_eq!(row.refresh_token.as_deref(), Some("new-refresh-ct"));
    assert!(row.token_expires_at.is_some());
}
