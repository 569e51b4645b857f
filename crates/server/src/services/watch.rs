// Watch toggle engine.
//
// A watch is one row in `watches`; the target's counter column mirrors the
// number of rows pointing at it. Every toggle runs in a single transaction
// whose first statement is a write, so SQLite hands it the writer lock before
// anything is read and concurrent toggles on the same target serialize.

use chrono::Utc;
use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::{
    db::models::WatchTarget,
    error::{AppError, Result},
};

/// State of a relationship after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOutcome {
    pub target: WatchTarget,
    pub watch_count: i64,
    pub is_watching: bool,
}

impl WatchOutcome {
    pub fn message(&self) -> &'static str {
        match (self.target, self.is_watching) {
            (WatchTarget::User, true) => "Successfully watching user",
            (WatchTarget::User, false) => "Successfully unwatched user",
            (WatchTarget::Project, true) => "Successfully watching project",
            (WatchTarget::Project, false) => "Successfully unwatched project",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub watch_count: i64,
    pub is_watching: bool,
    pub message: &'static str,
}

impl From<WatchOutcome> for WatchResponse {
    fn from(outcome: WatchOutcome) -> Self {
        Self {
            watch_count: outcome.watch_count,
            is_watching: outcome.is_watching,
            message: outcome.message(),
        }
    }
}

pub async fn toggle_user_watch(
    pool: &SqlitePool,
    watcher_id: &str,
    target_user_id: &str,
) -> Result<WatchOutcome> {
    if watcher_id == target_user_id {
        return Err(AppError::Validation("You cannot watch yourself".to_string()));
    }
    toggle(pool, watcher_id, WatchTarget::User, target_user_id).await
}

pub async fn toggle_project_watch(
    pool: &SqlitePool,
    watcher_id: &str,
    project_id: &str,
) -> Result<WatchOutcome> {
    toggle(pool, watcher_id, WatchTarget::Project, project_id).await
}

async fn toggle(
    pool: &SqlitePool,
    watcher_id: &str,
    target: WatchTarget,
    target_id: &str,
) -> Result<WatchOutcome> {
    // Rolls back on drop unless committed
    let mut tx = pool.begin().await?;

    let removed = sqlx::query(
        "DELETE FROM watches WHERE watcher_id = ? AND target_type = ? AND target_id = ?",
    )
    .bind(watcher_id)
    .bind(target.as_str())
    .bind(target_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let outcome = if removed > 0 {
        let watch_count = decrement_counter(&mut tx, target, target_id).await?;
        WatchOutcome {
            target,
            watch_count,
            is_watching: false,
        }
    } else {
        ensure_exists(&mut tx, WatchTarget::User, watcher_id).await?;
        ensure_exists(&mut tx, target, target_id).await?;

        sqlx::query(
            "INSERT INTO watches (watcher_id, target_type, target_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(watcher_id)
        .bind(target.as_str())
        .bind(target_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let watch_count = increment_counter(&mut tx, target, target_id).await?;
        WatchOutcome {
            target,
            watch_count,
            is_watching: true,
        }
    };

    tx.commit().await?;

    tracing::debug!(
        watcher_id,
        target_type = target.as_str(),
        target_id,
        watch_count = outcome.watch_count,
        is_watching = outcome.is_watching,
        "Watch toggled"
    );

    Ok(outcome)
}

async fn ensure_exists(
    tx: &mut Transaction<'_, Sqlite>,
    target: WatchTarget,
    id: &str,
) -> Result<()> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", target.table());
    let exists = sqlx::query_scalar::<_, i64>(&sql)
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

    if exists == 0 {
        return Err(match target {
            WatchTarget::User => AppError::NotFound("User not found".to_string()),
            WatchTarget::Project => AppError::NotFound("Project not found".to_string()),
        });
    }
    Ok(())
}

async fn increment_counter(
    tx: &mut Transaction<'_, Sqlite>,
    target: WatchTarget,
    id: &str,
) -> Result<i64> {
    let sql = format!(
        "UPDATE {table} SET {c} = {c} + 1 WHERE id = ? RETURNING {c}",
        table = target.table(),
        c = target.counter(),
    );
    let count = sqlx::query_scalar::<_, i64>(&sql)
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(count)
}

/// Decrements a counter that lost an edge. A counter already at zero means it
/// drifted from the edge table; it is logged and recounted rather than
/// clamped.
async fn decrement_counter(
    tx: &mut Transaction<'_, Sqlite>,
    target: WatchTarget,
    id: &str,
) -> Result<i64> {
    let sql = format!(
        "UPDATE {table} SET {c} = {c} - 1 WHERE id = ? AND {c} > 0 RETURNING {c}",
        table = target.table(),
        c = target.counter(),
    );
    let updated = sqlx::query_scalar::<_, i64>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

    match updated {
        Some(count) => Ok(count),
        None => {
            tracing::warn!(
                target_type = target.as_str(),
                target_id = id,
                "Watch counter was already zero while an edge existed, recounting"
            );
            recount(tx, target, id).await
        }
    }
}

/// Rewrites a target's counter from the edge table and returns the new value.
/// A missing target row counts as zero.
pub async fn recount(
    tx: &mut Transaction<'_, Sqlite>,
    target: WatchTarget,
    id: &str,
) -> Result<i64> {
    let sql = format!(
        "UPDATE {table} SET {c} = (SELECT COUNT(*) FROM watches WHERE target_type = ? AND target_id = ?) WHERE id = ? RETURNING {c}",
        table = target.table(),
        c = target.counter(),
    );
    let count = sqlx::query_scalar::<_, i64>(&sql)
        .bind(target.as_str())
        .bind(id)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(count.unwrap_or(0))
}
