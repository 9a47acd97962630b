//! The three long-running dispatcher loops. Each races its idle sleep
//! against a `CancellationToken` so shutdown is prompt even mid-backoff.

use std::time::Duration;

use chrono::Utc;
use nf_config::PipelineTuning;
use nf_pipeline::{poll_once, publish_once, score_once, PollOutcome, PublishOutcome, ScoreOutcome, Publisher, Ranker, SourceDecoder};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = cancel.cancelled() => true,
    }
}

pub async fn poll_loop(
    pool: PgPool,
    decoder: Box<dyn SourceDecoder>,
    tuning: PipelineTuning,
    cancel: CancellationToken,
) {
    info!("polling scheduler started");
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let outcome = poll_once(&pool, decoder.as_ref(), &tuning, Utc::now()).await;
        let idle = match outcome {
            Ok(PollOutcome::NothingDue) => true,
            Ok(PollOutcome::Polled { .. }) | Ok(PollOutcome::DecoderFailed { .. }) => false,
            Err(err) => {
                error!(error = %err, "polling scheduler iteration failed");
                true
            }
        };
        if idle && sleep_or_cancel(Duration::from_secs(tuning.poll_idle_sleep_seconds), &cancel).await {
            break;
        }
    }
    info!("polling scheduler stopped");
}

pub async fn score_loop(pool: PgPool, ranker: Box<dyn Ranker>, tuning: PipelineTuning, cancel: CancellationToken) {
    info!("scoring dispatcher started");
    loop {
        if cancel.is_cancelled() {
            break;
        }
        let outcome = score_once(&pool, ranker.as_ref(), Utc::now()).await;
        let idle = match outcome {
            Ok(ScoreOutcome::Idle) => true,
            Ok(_) => false,
            Err(err) => {
                error!(error = %err, "scoring dispatcher iteration failed");
                true
            }
        };
        if idle && sleep_or_cancel(Duration::from_secs(tuning.score_idle_sleep_seconds), &cancel).await {
            break;
        }
    }
    info!("scoring dispatcher stopped");
}

pub async fn publish_loop(
    pool: PgPool,
    publisher: Box<dyn Publisher>,
    tuning: PipelineTuning,
    cancel: CancellationToken,
) {
    info!("publishing dispatcher started");
    let mut backoff_until: Option<chrono::DateTime<Utc>> = None;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if let Some(until) = backoff_until {
            let now = Utc::now();
            if now < until {
                let wait = (until - now).num_seconds().max(0) as u64;
                let wait = wait.min(60);
                info!(wait_seconds = wait, "publishing dispatcher backing off");
                if sleep_or_cancel(Duration::from_secs(wait), &cancel).await {
                    break;
                }
                continue;
            }
            backoff_until = None;
        }

        let outcome = publish_once(&pool, publisher.as_ref(), &tuning).await;
        let idle = match outcome {
            Ok(PublishOutcome::Idle) => true,
            Ok(PublishOutcome::RateLimited { .. }) => {
                backoff_until = Some(Utc::now() + chrono::Duration::seconds(tuning.rate_limit_backoff_seconds));
                warn!(backoff_seconds = tuning.rate_limit_backoff_seconds, "publish rate limited");
                false
            }
            Ok(_) => false,
            Err(err) => {
                error!(error = %err, "publishing dispatcher iteration failed");
                true
            }
        };
        if idle && sleep_or_cancel(Duration::from_secs(tuning.publish_idle_sleep_seconds), &cancel).await {
            break;
        }
    }
    info!("publishing dispatcher stopped");
}
