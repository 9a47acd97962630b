//! End-to-end dispatcher scenarios against fakes and a real Postgres.
//!
//! Require a reachable Postgres at `NF_DATABASE_URL`; skipped otherwise.

use chrono::Utc;
use nf_config::PipelineTuning;
use nf_pipeline::{poll_once, publish_once, score_once, DecodedEntry, PollOutcome, PublishFailure, PublishOutcome, RankFailure, ScoreOutcome};
use nf_testkit::{fresh_test_pool, FakeDecoder, FakePublisher, FakeRanker};
use sqlx::PgPool;

async fn db_or_skip() -> Option<PgPool> {
    if std::env::var(nf_store::ENV_DB_URL).is_err() {
        eprintln!("SKIP: {} not set, skipping DB-backed test", nf_store::ENV_DB_URL);
        return None;
    }
    Some(fresh_test_pool().await.expect("fresh test pool"))
}

#[tokio::test]
async fn scenario_1_adaptive_interval_speeds_up_on_producing_source() {
    let Some(pool) = db_or_skip().await else { return };
    let tuning = PipelineTuning::default();

    let source = nf_store::create_source(&pool, "https://example.com/feed.xml", "Example", 3600)
        .await
        .unwrap();

    let decoder = FakeDecoder::new();
    decoder.push_entries(
        &source.url,
        vec![
            DecodedEntry { guid: "g1".into(), payload: "<entry/>".into() },
            DecodedEntry { guid: "g2".into(), payload: "<entry/>".into() },
        ],
    );

    let now = Utc::now();
    let outcome = poll_once(&pool, &decoder, &tuning, now).await.unwrap();
    assert_eq!(outcome, PollOutcome::Polled { source_name: "Example".into(), new_count: 2 });

    let refreshed = nf_store::find_source_by_url(&pool, &source.url).await.unwrap().unwrap();
    assert_eq!(refreshed.interval_seconds, 3540);

    let report = nf_store::stats(&pool).await.unwrap();
    assert_eq!(report.pending_count, 2);

    // Same guids again: no duplicates, interval climbs back up.
    decoder.push_entries(
        &source.url,
        vec![
            DecodedEntry { guid: "g1".into(), payload: "<entry/>".into() },
            DecodedEntry { guid: "g2".into(), payload: "<entry/>".into() },
        ],
    );
    let outcome2 = poll_once(&pool, &decoder, &tuning, Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(outcome2, PollOutcome::Polled { source_name: "Example".into(), new_count: 0 });

    let refreshed2 = nf_store::find_source_by_url(&pool, &source.url).await.unwrap().unwrap();
    assert_eq!(refreshed2.interval_seconds, 3600);

    let report2 = nf_store::stats(&pool).await.unwrap();
    assert_eq!(report2.pending_count, 2);
}

#[tokio::test]
async fn scenario_2_adaptive_interval_saturates_at_floor() {
    let Some(pool) = db_or_skip().await else { return };
    let tuning = PipelineTuning::default();

    let source = nf_store::create_source(&pool, "https://example.com/feed.xml", "Example", 300)
        .await
        .unwrap();

    let decoder = FakeDecoder::new();
    decoder.push_entries(&source.url, vec![DecodedEntry { guid: "g1".into(), payload: "<entry/>".into() }]);

    poll_once(&pool, &decoder, &tuning, Utc::now()).await.unwrap();

    let refreshed = nf_store::find_source_by_url(&pool, &source.url).await.unwrap().unwrap();
    assert_eq!(refreshed.interval_seconds, 300);
}

#[tokio::test]
async fn scenario_3_ranker_outcome_routing() {
    let Some(pool) = db_or_skip().await else { return };

    let source = nf_store::create_source(&pool, "https://example.com/feed.xml", "Example", 3600)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    for (guid, link) in [("g1", "https://example.com/a"), ("g2", "https://example.com/b"), ("g3", "https://example.com/c")] {
        let (item_id, _) =
            nf_store::upsert_item(&mut tx, source.id, guid, &format!("<entry><link>{link}</link></entry>"))
                .await
                .unwrap();
        nf_store::enqueue_pending(&mut tx, item_id).await.unwrap();
    }
    tx.commit().await.unwrap();

    let ranker = FakeRanker::new();
    ranker.push_rank("https://example.com/a", 9.0);
    ranker.push_rank("https://example.com/b", 0.0);
    ranker.push_failure("https://example.com/c", RankFailure::Timeout);

    let o1 = score_once(&pool, &ranker, Utc::now()).await.unwrap();
    assert_eq!(o1, ScoreOutcome::Scored { source_name: "Example".into(), rank: 9.0 });

    let o2 = score_once(&pool, &ranker, Utc::now()).await.unwrap();
    assert_eq!(o2, ScoreOutcome::ScoreZero { source_name: "Example".into() });

    let o3 = score_once(&pool, &ranker, Utc::now()).await.unwrap();
    assert!(matches!(o3, ScoreOutcome::Errored { .. }));

    let report = nf_store::stats(&pool).await.unwrap();
    assert_eq!(report.scored_count, 1);
    assert_eq!(report.error_count, 2);
    assert_eq!(report.pending_count, 0);
}

#[tokio::test]
async fn scenario_4_publish_threshold_skip() {
    let Some(pool) = db_or_skip().await else { return };
    let tuning = PipelineTuning::default();
    assert_eq!(tuning.publish_threshold, 8.0);

    let source = nf_store::create_source(&pool, "https://example.com/feed.xml", "Example", 3600)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let (item_id, _) = nf_store::upsert_item(&mut tx, source.id, "g1", "<entry><link>https://x</link></entry>")
        .await
        .unwrap();
    nf_store::enqueue_pending(&mut tx, item_id).await.unwrap();
    tx.commit().await.unwrap();

    let (slot, item, _) = nf_store::claim_next_pending(&pool).await.unwrap().unwrap();
    nf_store::record_score(&pool, slot.id, item.id, 7.9, Utc::now()).await.unwrap();

    let publisher = FakePublisher::new();
    let outcome = publish_once(&pool, &publisher, &tuning).await.unwrap();

    assert_eq!(outcome, PublishOutcome::SkippedBelowThreshold { source_name: "Example".into(), rank: 7.9 });
    assert!(publisher.published_messages().is_empty());

    let report = nf_store::stats(&pool).await.unwrap();
    assert_eq!(report.scored_count, 0);
}

#[tokio::test]
async fn scenario_5_rate_limit_backoff_leaves_slot_in_place() {
    let Some(pool) = db_or_skip().await else { return };
    let tuning = PipelineTuning::default();

    let source = nf_store::create_source(&pool, "https://example.com/feed.xml", "Example", 3600)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    for guid in ["g1", "g2"] {
        let (item_id, _) =
            nf_store::upsert_item(&mut tx, source.id, guid, "<entry><link>https://x</link></entry>")
                .await
                .unwrap();
        nf_store::enqueue_pending(&mut tx, item_id).await.unwrap();
    }
    tx.commit().await.unwrap();

    for _ in 0..2 {
        let (slot, item, _) = nf_store::claim_next_pending(&pool).await.unwrap().unwrap();
        nf_store::record_score(&pool, slot.id, item.id, 9.0, Utc::now()).await.unwrap();
    }

    let publisher = FakePublisher::new();
    publisher.push_failure(PublishFailure::classify("discord returned 429: rate limit hit"));

    let outcome = publish_once(&pool, &publisher, &tuning).await.unwrap();
    assert_eq!(outcome, PublishOutcome::RateLimited { source_name: "Example".into() });

    // The slot is still there immediately after the iteration.
    let report = nf_store::stats(&pool).await.unwrap();
    assert_eq!(report.scored_count, 2);
    assert_eq!(publisher.published_messages().len(), 1);
}

#[tokio::test]
async fn scenario_6_decoder_failure_does_not_corrupt_state() {
    let Some(pool) = db_or_skip().await else { return };
    let tuning = PipelineTuning::default();

    let source = nf_store::create_source(&pool, "https://example.com/feed.xml", "Example", 3600)
        .await
        .unwrap();

    let mut tx = pool.begin().await.unwrap();
    let (item_id, _) = nf_store::upsert_item(&mut tx, source.id, "existing", "<entry/>").await.unwrap();
    nf_store::enqueue_pending(&mut tx, item_id).await.unwrap();
    tx.commit().await.unwrap();

    let decoder = FakeDecoder::new();
    decoder.push_failure(&source.url, nf_pipeline::DecoderFailure::Fetch("connection refused".into()));

    let before = nf_store::stats(&pool).await.unwrap();

    let now = Utc::now();
    let outcome = poll_once(&pool, &decoder, &tuning, now).await.unwrap();
    assert!(matches!(outcome, PollOutcome::DecoderFailed { .. }));

    let refreshed = nf_store::find_source_by_url(&pool, &source.url).await.unwrap().unwrap();
    assert_eq!(refreshed.interval_seconds, 3600, "interval must be unchanged on decoder failure");
    assert_eq!(refreshed.last_checked, Some(now));

    let after = nf_store::stats(&pool).await.unwrap();
    assert_eq!(after.total_items, before.total_items, "no new items on decoder failure");
    assert_eq!(after.pending_count, before.pending_count, "no new pending slots on decoder failure");
}
