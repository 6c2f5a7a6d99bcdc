//! `PgHistoryStore` against a real database
//!
//! Ignored by default. Run with a PostgreSQL (with pgvector) reachable at
//! `DATABASE_URL`:
//!
//! ```text
//! cargo test -p marquee-api --test history_store_test -- --ignored
//! ```

use std::time::Duration;

use marquee_api::models::{ItemType, Rating};
use marquee_api::repositories::{ClearedHistory, HistoryStore, PgHistoryStore};
use sqlx::PgPool;

const USER: &str = "user-1";

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL with pgvector"]
async fn test_save_watched_upserts_title_and_timestamp(pool: PgPool) {
    let store = PgHistoryStore::new(pool.clone());

    let first = store.save_watched(USER, 27205, "Inception").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = store.save_watched(USER, 27205, "Inception (2010)").await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.title, "Inception (2010)");
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM watched_movies WHERE user_id = $1")
        .bind(USER)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL with pgvector"]
async fn test_history_is_most_recent_first(pool: PgPool) {
    let store = PgHistoryStore::new(pool);

    store.save_watched(USER, 100, "Heat").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    store.save_watched(USER, 200, "Collateral").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    store.save_watched(USER, 100, "Heat").await.unwrap();

    let ids: Vec<i64> = store
        .get_history(USER, 10)
        .await
        .unwrap()
        .iter()
        .map(|w| w.movie_id)
        .collect();
    assert_eq!(ids, vec![100, 200]);
    assert_eq!(store.get_history(USER, 1).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL with pgvector"]
async fn test_toggle_feedback_transitions(pool: PgPool) {
    let store = PgHistoryStore::new(pool);

    let rating = store.toggle_feedback(USER, ItemType::Movie, "42", Rating::Up).await.unwrap();
    assert_eq!(rating, Some(Rating::Up));

    // Opposite rating replaces in place
    let rating = store.toggle_feedback(USER, ItemType::Movie, "42", Rating::Down).await.unwrap();
    assert_eq!(rating, Some(Rating::Down));
    let feedback = store.get_feedback(USER).await.unwrap();
    assert_eq!(feedback.len(), 1);
    assert_eq!(feedback[0].rating, -1);

    // Same rating again clears it
    let rating = store.toggle_feedback(USER, ItemType::Movie, "42", Rating::Down).await.unwrap();
    assert_eq!(rating, None);
    assert!(store.get_feedback(USER).await.unwrap().is_empty());

    // Movie and track ids live in separate namespaces
    store.toggle_feedback(USER, ItemType::Movie, "7", Rating::Up).await.unwrap();
    store.toggle_feedback(USER, ItemType::Track, "7", Rating::Up).await.unwrap();
    assert_eq!(store.get_feedback(USER).await.unwrap().len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL pointing at PostgreSQL with pgvector"]
async fn test_clear_user_removes_only_that_user(pool: PgPool) {
    let store = PgHistoryStore::new(pool);

    store.save_watched(USER, 1, "Heat").await.unwrap();
    store.save_watched(USER, 2, "Ronin").await.unwrap();
    store.toggle_feedback(USER, ItemType::Movie, "1", Rating::Up).await.unwrap();
    store.save_watched("user-2", 1, "Heat").await.unwrap();

    let cleared = store.clear_user(USER).await.unwrap();
    assert_eq!(cleared, ClearedHistory { watched: 2, feedback: 1 });

    assert!(store.get_history(USER, 10).await.unwrap().is_empty());
    assert!(store.get_feedback(USER).await.unwrap().is_empty());
    assert_eq!(store.get_history("user-2", 10).await.unwrap().len(), 1);
}
