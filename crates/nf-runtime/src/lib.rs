//! Supervisor: spawns and tears down the three dispatcher loops together.
//! Grounded on the daemon's own startup/shutdown composition — one
//! `CancellationToken` shared by every worker, one join on shutdown.

mod http_collaborators;
mod loops;

pub use http_collaborators::{HttpPublisher, HttpRanker, HttpSourceDecoder};

use nf_config::PipelineTuning;
use nf_pipeline::{Publisher, Ranker, SourceDecoder};
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Supervisor {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Spawn the PollingScheduler, ScoringDispatcher, and PublishingDispatcher
    /// as independent tasks sharing one Postgres pool and one cancellation
    /// signal.
    pub fn spawn(
        pool: PgPool,
        tuning: PipelineTuning,
        decoder: Box<dyn SourceDecoder>,
        ranker: Box<dyn Ranker>,
        publisher: Box<dyn Publisher>,
    ) -> Self {
        let cancel = CancellationToken::new();

        let poll_handle = tokio::spawn(loops::poll_loop(
            pool.clone(),
            decoder,
            tuning,
            cancel.clone(),
        ));
        let score_handle = tokio::spawn(loops::score_loop(
            pool.clone(),
            ranker,
            tuning,
            cancel.clone(),
        ));
        let publish_handle = tokio::spawn(loops::publish_loop(pool, publisher, tuning, cancel.clone()));

        Supervisor {
            cancel,
            handles: vec![poll_handle, score_handle, publish_handle],
        }
    }

    /// Signal every worker to stop and wait for them to finish their current
    /// iteration.
    pub async fn shutdown(self) {
        info!("supervisor shutting down");
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("supervisor shut down");
    }
}
