//! P1: an item is never in more than one of {pending, scored, error} at once,
//! exercised across a full poll -> score -> publish lifecycle.
//!
//! Requires a reachable Postgres at `NF_DATABASE_URL`; skipped otherwise.

use chrono::Utc;
use nf_config::PipelineTuning;
use nf_pipeline::{poll_once, publish_once, score_once, DecodedEntry};
use nf_testkit::{fresh_test_pool, FakeDecoder, FakePublisher, FakeRanker};
use sqlx::PgPool;

async fn db_or_skip() -> Option<PgPool> {
    if std::env::var(nf_store::ENV_DB_URL).is_err() {
        eprintln!("SKIP: {} not set, skipping DB-backed test", nf_store::ENV_DB_URL);
        return None;
    }
    Some(fresh_test_pool().await.expect("fresh test pool"))
}

async fn queue_membership_count(pool: &PgPool) -> (i64, i64, i64) {
    let report = nf_store::stats(pool).await.unwrap();
    (report.pending_count, report.scored_count, report.error_count)
}

#[tokio::test]
async fn item_occupies_exactly_one_queue_at_a_time_across_the_lifecycle() {
    let Some(pool) = db_or_skip().await else { return };
    let tuning = PipelineTuning::default();

    let source = nf_store::create_source(&pool, "https://example.com/feed.xml", "Example", 3600)
        .await
        .unwrap();

    let decoder = FakeDecoder::new();
    decoder.push_entries(
        &source.url,
        vec![DecodedEntry {
            guid: "g1".into(),
            payload: "<entry><link>https://example.com/a</link></entry>".into(),
        }],
    );
    poll_once(&pool, &decoder, &tuning, Utc::now()).await.unwrap();

    let (pending, scored, error) = queue_membership_count(&pool).await;
    assert_eq!((pending, scored, error), (1, 0, 0));

    let ranker = FakeRanker::new();
    ranker.push_rank("https://example.com/a", 9.0);
    score_once(&pool, &ranker, Utc::now()).await.unwrap();

    let (pending, scored, error) = queue_membership_count(&pool).await;
    assert_eq!((pending, scored, error), (0, 1, 0));

    let publisher = FakePublisher::new();
    publisher.push_success();
    publish_once(&pool, &publisher, &tuning).await.unwrap();

    let (pending, scored, error) = queue_membership_count(&pool).await;
    assert_eq!((pending, scored, error), (0, 0, 0), "item leaves every queue once published");
}

#[tokio::test]
async fn rank_zero_is_routed_to_error_not_scored() {
    let Some(pool) = db_or_skip().await else { return };

    let source = nf_store::create_source(&pool, "https://example.com/feed.xml", "Example", 3600)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let (item_id, _) =
        nf_store::upsert_item(&mut tx, source.id, "g1", "<entry><link>https://example.com/a</link></entry>")
            .await
            .unwrap();
    nf_store::enqueue_pending(&mut tx, item_id).await.unwrap();
    tx.commit().await.unwrap();

    let ranker = FakeRanker::new();
    ranker.push_rank("https://example.com/a", 0.0);
    score_once(&pool, &ranker, Utc::now()).await.unwrap();

    let (pending, scored, error) = queue_membership_count(&pool).await;
    assert_eq!((pending, scored, error), (0, 0, 1));
}
