//! Deterministic test doubles for the pipeline's collaborator traits, plus
//! shared DB-backed scenario-test scaffolding.

mod fakes;

pub use fakes::{FakeDecoder, FakePublisher, FakeRanker};

use anyhow::Result;
use sqlx::PgPool;

/// Connect to `NF_DATABASE_URL`, migrate, and truncate every table so each
/// scenario test starts from a clean slate.
pub async fn fresh_test_pool() -> Result<PgPool> {
    let pool = nf_store::testkit_db_pool().await?;
    sqlx::query("delete from sources").execute(&pool).await?;
    Ok(pool)
}
