//! nf-store — transactional state for the news-feed pipeline.
//!
//! This is the single source of truth the three pipeline workers share: all
//! state transitions (source bookkeeping, item discovery, the pending/scored/
//! error queues) go through here, and every multi-row mutation is a single
//! `sqlx::Transaction` so a crash between steps can never leave the queues in
//! an inconsistent state.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};

pub const ENV_DB_URL: &str = "NF_DATABASE_URL";

/// Connect to Postgres using `NF_DATABASE_URL`.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")
}

/// Test helper: connect using `NF_DATABASE_URL` and ensure migrations are applied.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("nf-store migrate failed")
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub last_checked: Option<DateTime<Utc>>,
    pub interval_seconds: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: i64,
    pub source_id: i64,
    pub guid: String,
    pub payload: String,
    pub discovered_at: DateTime<Utc>,
    pub rank: Option<f64>,
    pub ranked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSlot {
    pub id: i64,
    pub item_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSlot {
    pub id: i64,
    pub item_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSlot {
    pub id: i64,
    pub item_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

fn row_to_source(row: &sqlx::postgres::PgRow) -> Result<Source> {
    Ok(Source {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        name: row.try_get("name")?,
        last_checked: row.try_get("last_checked")?,
        interval_seconds: row.try_get("interval_seconds")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_item(row: &sqlx::postgres::PgRow) -> Result<Item> {
    Ok(Item {
        id: row.try_get("id")?,
        source_id: row.try_get("source_id")?,
        guid: row.try_get("guid")?,
        payload: row.try_get("payload")?,
        discovered_at: row.try_get("discovered_at")?,
        rank: row.try_get("rank")?,
        ranked_at: row.try_get("ranked_at")?,
    })
}

// ---------------------------------------------------------------------------
// Source CRUD (control-surface operations)
// ---------------------------------------------------------------------------

pub async fn create_source(
    pool: &PgPool,
    url: &str,
    name: &str,
    default_interval_seconds: i32,
) -> Result<Source> {
    let row = sqlx::query(
        r#"
        insert into sources (url, name, interval_seconds)
        values ($1, $2, $3)
        returning id, url, name, last_checked, interval_seconds, created_at
        "#,
    )
    .bind(url)
    .bind(name)
    .bind(default_interval_seconds)
    .fetch_one(pool)
    .await
    .context("create_source failed")?;

    row_to_source(&row)
}

pub async fn find_source_by_url(pool: &PgPool, url: &str) -> Result<Option<Source>> {
    let row = sqlx::query(
        r#"
        select id, url, name, last_checked, interval_seconds, created_at
        from sources where url = $1
        "#,
    )
    .bind(url)
    .fetch_optional(pool)
    .await
    .context("find_source_by_url failed")?;

    row.as_ref().map(row_to_source).transpose()
}

pub async fn list_sources(pool: &PgPool) -> Result<Vec<Source>> {
    let rows = sqlx::query(
        r#"
        select id, url, name, last_checked, interval_seconds, created_at
        from sources order by id asc
        "#,
    )
    .fetch_all(pool)
    .await
    .context("list_sources failed")?;

    rows.iter().map(row_to_source).collect()
}

/// Delete a source. Cascades to items and every queue slot (no orphans).
/// Returns true if a row was deleted.
pub async fn delete_source(pool: &PgPool, source_id: i64) -> Result<bool> {
    let result = sqlx::query("delete from sources where id = $1")
        .bind(source_id)
        .execute(pool)
        .await
        .context("delete_source failed")?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_items_for_source(pool: &PgPool, source_id: i64) -> Result<i64> {
    let (count,): (i64,) =
        sqlx::query_as("select count(*)::bigint from items where source_id = $1")
            .bind(source_id)
            .fetch_one(pool)
            .await
            .context("count_items_for_source failed")?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// PollingScheduler operations
// ---------------------------------------------------------------------------

/// Return the Source with the earliest `last_checked` (nulls first).
/// The caller decides whether it is actually due.
pub async fn next_source_due_for_check(pool: &PgPool) -> Result<Option<Source>> {
    let row = sqlx::query(
        r#"
        select id, url, name, last_checked, interval_seconds, created_at
        from sources
        order by last_checked asc nulls first, id asc
        limit 1
        "#,
    )
    .fetch_optional(pool)
    .await
    .context("next_source_due_for_check failed")?;

    row.as_ref().map(row_to_source).transpose()
}

/// Idempotent on `(source_id, guid)`. Returns `(item_id, is_new)`.
pub async fn upsert_item(
    tx: &mut Transaction<'_, Postgres>,
    source_id: i64,
    guid: &str,
    payload: &str,
) -> Result<(i64, bool)> {
    let existing: Option<(i64,)> =
        sqlx::query_as("select id from items where source_id = $1 and guid = $2")
            .bind(source_id)
            .bind(guid)
            .fetch_optional(&mut **tx)
            .await
            .context("upsert_item lookup failed")?;

    if let Some((id,)) = existing {
        return Ok((id, false));
    }

    let (id,): (i64,) = sqlx::query_as(
        r#"
        insert into items (source_id, guid, payload)
        values ($1, $2, $3)
        returning id
        "#,
    )
    .bind(source_id)
    .bind(guid)
    .bind(payload)
    .fetch_one(&mut **tx)
    .await
    .context("upsert_item insert failed")?;

    Ok((id, true))
}

/// Only valid to call in the same transaction as an `upsert_item` that
/// returned `is_new = true`.
pub async fn enqueue_pending(tx: &mut Transaction<'_, Postgres>, item_id: i64) -> Result<()> {
    sqlx::query("insert into pending_slots (item_id) values ($1)")
        .bind(item_id)
        .execute(&mut **tx)
        .await
        .context("enqueue_pending failed")?;
    Ok(())
}

/// Sets `last_checked` and `interval_seconds` in one write.
pub async fn update_source_after_poll(
    tx: &mut Transaction<'_, Postgres>,
    source_id: i64,
    new_interval_seconds: i32,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("update sources set last_checked = $1, interval_seconds = $2 where id = $3")
        .bind(now)
        .bind(new_interval_seconds)
        .bind(source_id)
        .execute(&mut **tx)
        .await
        .context("update_source_after_poll failed")?;
    Ok(())
}

/// Sets `last_checked` only, leaving the interval unchanged (decoder failure path).
pub async fn mark_source_checked(pool: &PgPool, source_id: i64, now: DateTime<Utc>) -> Result<()> {
    sqlx::query("update sources set last_checked = $1 where id = $2")
        .bind(now)
        .bind(source_id)
        .execute(pool)
        .await
        .context("mark_source_checked failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// ScoringDispatcher operations
// ---------------------------------------------------------------------------

/// Pop-like claim of the oldest pending slot. FIFO by `(created_at, id)`.
///
/// Does NOT delete the slot — per spec.md §4.3, the slot is deleted only as
/// part of the success/error write in `record_score`/`record_score_error`.
pub async fn claim_next_pending(pool: &PgPool) -> Result<Option<(PendingSlot, Item, Source)>> {
    let row = sqlx::query(
        r#"
        select
            p.id as slot_id, p.item_id as slot_item_id, p.created_at as slot_created_at,
            i.id as item_id, i.source_id, i.guid, i.payload, i.discovered_at, i.rank, i.ranked_at,
            s.id as src_id, s.url, s.name, s.last_checked, s.interval_seconds, s.created_at as src_created_at
        from pending_slots p
        join items i on i.id = p.item_id
        join sources s on s.id = i.source_id
        order by p.created_at asc, p.id asc
        limit 1
        "#,
    )
    .fetch_optional(pool)
    .await
    .context("claim_next_pending failed")?;

    let Some(row) = row else { return Ok(None) };

    let slot = PendingSlot {
        id: row.try_get("slot_id")?,
        item_id: row.try_get("slot_item_id")?,
        created_at: row.try_get("slot_created_at")?,
    };
    let item = Item {
        id: row.try_get("item_id")?,
        source_id: row.try_get("source_id")?,
        guid: row.try_get("guid")?,
        payload: row.try_get("payload")?,
        discovered_at: row.try_get("discovered_at")?,
        rank: row.try_get("rank")?,
        ranked_at: row.try_get("ranked_at")?,
    };
    let source = Source {
        id: row.try_get("src_id")?,
        url: row.try_get("url")?,
        name: row.try_get("name")?,
        last_checked: row.try_get("last_checked")?,
        interval_seconds: row.try_get("interval_seconds")?,
        created_at: row.try_get("src_created_at")?,
    };

    Ok(Some((slot, item, source)))
}

/// Deletes the PendingSlot, sets `(rank, ranked_at)` on the Item, and inserts
/// a ScoredSlot. All in one transaction.
pub async fn record_score(
    pool: &PgPool,
    pending_slot_id: i64,
    item_id: i64,
    rank: f64,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut tx = pool.begin().await.context("record_score begin failed")?;

    sqlx::query("delete from pending_slots where id = $1")
        .bind(pending_slot_id)
        .execute(&mut *tx)
        .await
        .context("record_score delete pending failed")?;

    sqlx::query("update items set rank = $1, ranked_at = $2 where id = $3")
        .bind(rank)
        .bind(now)
        .bind(item_id)
        .execute(&mut *tx)
        .await
        .context("record_score update item failed")?;

    sqlx::query("insert into scored_slots (item_id) values ($1)")
        .bind(item_id)
        .execute(&mut *tx)
        .await
        .context("record_score insert scored failed")?;

    tx.commit().await.context("record_score commit failed")
}

/// Deletes the PendingSlot and inserts an ErrorSlot. One transaction.
pub async fn record_score_error(
    pool: &PgPool,
    pending_slot_id: i64,
    item_id: i64,
    message: &str,
) -> Result<()> {
    let mut tx = pool
        .begin()
        .await
        .context("record_score_error begin failed")?;

    sqlx::query("delete from pending_slots where id = $1")
        .bind(pending_slot_id)
        .execute(&mut *tx)
        .await
        .context("record_score_error delete pending failed")?;

    sqlx::query("insert into error_slots (item_id, message) values ($1, $2)")
        .bind(item_id)
        .bind(message)
        .execute(&mut *tx)
        .await
        .context("record_score_error insert error failed")?;

    tx.commit()
        .await
        .context("record_score_error commit failed")
}

// ---------------------------------------------------------------------------
// PublishingDispatcher operations
// ---------------------------------------------------------------------------

pub async fn claim_next_scored(pool: &PgPool) -> Result<Option<(ScoredSlot, Item, Source)>> {
    let row = sqlx::query(
        r#"
        select
            sc.id as slot_id, sc.item_id as slot_item_id, sc.created_at as slot_created_at,
            i.id as item_id, i.source_id, i.guid, i.payload, i.discovered_at, i.rank, i.ranked_at,
            s.id as src_id, s.url, s.name, s.last_checked, s.interval_seconds, s.created_at as src_created_at
        from scored_slots sc
        join items i on i.id = sc.item_id
        join sources s on s.id = i.source_id
        order by sc.created_at asc, sc.id asc
        limit 1
        "#,
    )
    .fetch_optional(pool)
    .await
    .context("claim_next_scored failed")?;

    let Some(row) = row else { return Ok(None) };

    let slot = ScoredSlot {
        id: row.try_get("slot_id")?,
        item_id: row.try_get("slot_item_id")?,
        created_at: row.try_get("slot_created_at")?,
    };
    let item = row_to_item(&row)?;
    let source = row_to_source(&row)?;

    Ok(Some((slot, item, source)))
}

/// Deletes the slot after a successful or intentionally-skipped publication.
pub async fn finish_scored(pool: &PgPool, slot_id: i64) -> Result<()> {
    sqlx::query("delete from scored_slots where id = $1")
        .bind(slot_id)
        .execute(pool)
        .await
        .context("finish_scored failed")?;
    Ok(())
}

/// No-op: the slot is left in place. Present so the rate-limit callsite is
/// explicit about its intent rather than simply not calling anything.
pub fn return_scored(_slot_id: i64) {}

// ---------------------------------------------------------------------------
// Stats (control-surface read model)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct TopSourceByCount {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TopSourceByRank {
    pub name: String,
    pub avg_rank: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StatsReport {
    pub total_sources: i64,
    pub total_items: i64,
    pub items_today: i64,
    pub pending_count: i64,
    pub scored_count: i64,
    pub error_count: i64,
    pub items_scored_today: i64,
    pub average_items_per_source: f64,
    pub top_sources_by_count: Vec<TopSourceByCount>,
    pub top_sources_by_avg_rank: Vec<TopSourceByRank>,
    pub sources_with_zero_items: i64,
}

pub async fn stats(pool: &PgPool) -> Result<StatsReport> {
    let (total_sources,): (i64,) = sqlx::query_as("select count(*)::bigint from sources")
        .fetch_one(pool)
        .await
        .context("stats total_sources failed")?;

    let (total_items,): (i64,) = sqlx::query_as("select count(*)::bigint from items")
        .fetch_one(pool)
        .await
        .context("stats total_items failed")?;

    let (pending_count,): (i64,) = sqlx::query_as("select count(*)::bigint from pending_slots")
        .fetch_one(pool)
        .await
        .context("stats pending_count failed")?;

    let (scored_count,): (i64,) = sqlx::query_as("select count(*)::bigint from scored_slots")
        .fetch_one(pool)
        .await
        .context("stats scored_count failed")?;

    let (error_count,): (i64,) = sqlx::query_as("select count(*)::bigint from error_slots")
        .fetch_one(pool)
        .await
        .context("stats error_count failed")?;

    let (items_today,): (i64,) = sqlx::query_as(
        "select count(*)::bigint from items where discovered_at >= date_trunc('day', now())",
    )
    .fetch_one(pool)
    .await
    .context("stats items_today failed")?;

    let (items_scored_today,): (i64,) = sqlx::query_as(
        "select count(*)::bigint from scored_slots where created_at >= date_trunc('day', now())",
    )
    .fetch_one(pool)
    .await
    .context("stats items_scored_today failed")?;

    let average_items_per_source = if total_sources > 0 {
        total_items as f64 / total_sources as f64
    } else {
        0.0
    };

    let top_rows = sqlx::query(
        r#"
        select s.name as name, count(i.id)::bigint as cnt
        from sources s
        join items i on i.source_id = s.id
        group by s.id, s.name
        order by cnt desc, s.name asc
        limit 3
        "#,
    )
    .fetch_all(pool)
    .await
    .context("stats top_sources_by_count failed")?;

    let top_sources_by_count = top_rows
        .iter()
        .map(|r| -> Result<TopSourceByCount> {
            Ok(TopSourceByCount {
                name: r.try_get("name")?,
                count: r.try_get("cnt")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let rank_rows = sqlx::query(
        r#"
        select s.name as name, avg(i.rank) as avg_rank
        from sources s
        join items i on i.source_id = s.id
        where i.rank is not null
        group by s.id, s.name
        order by avg_rank desc, s.name asc
        limit 10
        "#,
    )
    .fetch_all(pool)
    .await
    .context("stats top_sources_by_avg_rank failed")?;

    let top_sources_by_avg_rank = rank_rows
        .iter()
        .map(|r| -> Result<TopSourceByRank> {
            Ok(TopSourceByRank {
                name: r.try_get("name")?,
                avg_rank: r.try_get("avg_rank")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let (sources_with_zero_items,): (i64,) = sqlx::query_as(
        r#"
        select count(*)::bigint from sources s
        where not exists (select 1 from items i where i.source_id = s.id)
        "#,
    )
    .fetch_one(pool)
    .await
    .context("stats sources_with_zero_items failed")?;

    Ok(StatsReport {
        total_sources,
        total_items,
        items_today,
        pending_count,
        scored_count,
        error_count,
        items_scored_today,
        average_items_per_source,
        top_sources_by_count,
        top_sources_by_avg_rank,
        sources_with_zero_items,
    })
}
