//! One iteration of each dispatcher loop. `nf-runtime` wraps these in the
//! sleep/retry/cancellation scaffolding; `nf-testkit` calls them directly
//! against fakes so the pipeline's decision logic is testable without a
//! running daemon or network access.

use chrono::{DateTime, Utc};
use nf_config::PipelineTuning;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::message::{extract_link, extract_summary, extract_title, format_news_message};
use crate::rss::{build_entry_payload, extract_guid, parse_feed_items};
use crate::traits::{PublishFailure, Publisher, Ranker, SourceDecoder};

// ---------------------------------------------------------------------------
// PollingScheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// No source exists, or the earliest-due source is not yet due.
    NothingDue,
    /// The source's decoder failed; `last_checked` was still advanced so the
    /// scheduler moves on rather than retrying it in a tight loop.
    DecoderFailed { source_name: String, reason: String },
    /// The source was polled; `new_count` entries were newly discovered.
    Polled { source_name: String, new_count: u32 },
}

/// Run one iteration of the PollingScheduler.
pub async fn poll_once(
    pool: &PgPool,
    decoder: &dyn SourceDecoder,
    tuning: &PipelineTuning,
    now: DateTime<Utc>,
) -> anyhow::Result<PollOutcome> {
    let Some(source) = nf_store::next_source_due_for_check(pool).await? else {
        return Ok(PollOutcome::NothingDue);
    };

    if let Some(last_checked) = source.last_checked {
        let next_check = last_checked + chrono::Duration::seconds(source.interval_seconds as i64);
        if next_check > now {
            return Ok(PollOutcome::NothingDue);
        }
    }

    info!(source = %source.name, url = %source.url, "checking source");

    let entries = match decoder.fetch_entries(&source.url).await {
        Ok(entries) => entries,
        Err(err) => {
            error!(source = %source.name, error = %err, "decoder failed");
            nf_store::mark_source_checked(pool, source.id, now).await?;
            return Ok(PollOutcome::DecoderFailed {
                source_name: source.name,
                reason: err.to_string(),
            });
        }
    };

    let mut new_count: u32 = 0;
    let mut tx = pool.begin().await?;
    for entry in &entries {
        let (item_id, is_new) =
            nf_store::upsert_item(&mut tx, source.id, &entry.guid, &entry.payload).await?;
        if is_new {
            nf_store::enqueue_pending(&mut tx, item_id).await?;
            new_count += 1;
        }
    }

    let new_interval = if new_count > 0 {
        tuning.clamp_interval(source.interval_seconds as i64 - tuning.adjust_step_seconds)
    } else {
        tuning.clamp_interval(source.interval_seconds as i64 + tuning.adjust_step_seconds)
    };
    nf_store::update_source_after_poll(&mut tx, source.id, new_interval as i32, now).await?;
    tx.commit().await?;

    if new_count > 0 {
        info!(source = %source.name, new_count, new_interval, "found new entries");
    } else {
        info!(source = %source.name, new_interval, "no new entries");
    }

    Ok(PollOutcome::Polled {
        source_name: source.name,
        new_count,
    })
}

/// Parse raw feed bytes into the `DecodedEntry` list a `SourceDecoder` returns.
/// Entries with neither a guid nor a link are dropped: there is nothing
/// stable to key them on.
pub fn decode_feed_bytes(raw_xml: &str) -> Result<Vec<crate::traits::DecodedEntry>, String> {
    let fields = parse_feed_items(raw_xml)?;
    fields
        .iter()
        .filter_map(|f| {
            let guid = extract_guid(f)?;
            Some(build_entry_payload(f).map(|payload| crate::traits::DecodedEntry { guid, payload }))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ScoringDispatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    Idle,
    Scored { source_name: String, rank: f64 },
    ScoreZero { source_name: String },
    Errored { source_name: String, reason: String },
}

/// Run one iteration of the ScoringDispatcher.
pub async fn score_once(
    pool: &PgPool,
    ranker: &dyn Ranker,
    now: DateTime<Utc>,
) -> anyhow::Result<ScoreOutcome> {
    let Some((slot, item, source)) = nf_store::claim_next_pending(pool).await? else {
        return Ok(ScoreOutcome::Idle);
    };

    let link = extract_link(&item.payload).unwrap_or_else(|| item.guid.clone());
    info!(source = %source.name, %link, "scoring item");

    match ranker.rank_url(&link).await {
        Ok(rank) if rank == 0.0 => {
            nf_store::record_score_error(pool, slot.id, item.id, "score returned 0").await?;
            warn!(source = %source.name, %link, "score returned 0, routed to error queue");
            Ok(ScoreOutcome::ScoreZero {
                source_name: source.name,
            })
        }
        Ok(rank) => {
            nf_store::record_score(pool, slot.id, item.id, rank, now).await?;
            info!(source = %source.name, %link, rank, "scored");
            Ok(ScoreOutcome::Scored {
                source_name: source.name,
                rank,
            })
        }
        Err(err) => {
            nf_store::record_score_error(pool, slot.id, item.id, &err.to_string()).await?;
            error!(source = %source.name, %link, error = %err, "scoring failed");
            Ok(ScoreOutcome::Errored {
                source_name: source.name,
                reason: err.to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// PublishingDispatcher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Idle,
    SkippedBelowThreshold { source_name: String, rank: f64 },
    Published { source_name: String, rank: f64 },
    RateLimited { source_name: String },
    Failed { source_name: String, reason: String },
}

/// Run one iteration of the PublishingDispatcher.
///
/// The caller owns the worker-local rate-limit backoff clock; this function
/// never sees or sets it, it only reports `RateLimited` so the caller can.
pub async fn publish_once(
    pool: &PgPool,
    publisher: &dyn Publisher,
    tuning: &PipelineTuning,
) -> anyhow::Result<PublishOutcome> {
    let Some((slot, item, source)) = nf_store::claim_next_scored(pool).await? else {
        return Ok(PublishOutcome::Idle);
    };

    let rank = item.rank.unwrap_or(0.0);
    if rank < tuning.publish_threshold {
        nf_store::finish_scored(pool, slot.id).await?;
        info!(source = %source.name, rank, threshold = tuning.publish_threshold, "skipping below threshold");
        return Ok(PublishOutcome::SkippedBelowThreshold {
            source_name: source.name,
            rank,
        });
    }

    let title = extract_title(&item.payload).unwrap_or_else(|| format!("Entry {}", item.id));
    let link = extract_link(&item.payload).unwrap_or_default();
    let summary = extract_summary(&item.payload);
    let message = format_news_message(rank, &source.name, &title, summary.as_deref(), &link);

    match publisher.publish(&message).await {
        Ok(()) => {
            nf_store::finish_scored(pool, slot.id).await?;
            info!(source = %source.name, %title, rank, "published");
            Ok(PublishOutcome::Published {
                source_name: source.name,
                rank,
            })
        }
        Err(err) if err.is_rate_limited() => {
            nf_store::return_scored(slot.id);
            warn!(source = %source.name, %title, "publish rate limited, leaving item queued");
            Ok(PublishOutcome::RateLimited {
                source_name: source.name,
            })
        }
        Err(PublishFailure::Other(reason)) => {
            nf_store::finish_scored(pool, slot.id).await?;
            error!(source = %source.name, %title, %reason, "publish failed");
            Ok(PublishOutcome::Failed {
                source_name: source.name,
                reason,
            })
        }
        Err(err) => unreachable!("classify() only produces RateLimited or Other: {err}"),
    }
}
