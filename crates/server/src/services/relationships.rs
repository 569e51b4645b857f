// Read side of the watch relationships.

use sqlx::SqlitePool;

use crate::{
    db::models::{
        Project, ProjectRow, RelationshipIds, UserSummary, WatchTarget, PROJECT_SELECT,
        USER_SUMMARY_SELECT,
    },
    error::Result,
};

pub async fn is_watching(
    pool: &SqlitePool,
    watcher_id: &str,
    target: WatchTarget,
    target_id: &str,
) -> Result<bool> {
    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM watches WHERE watcher_id = ? AND target_type = ? AND target_id = ?",
    )
    .bind(watcher_id)
    .bind(target.as_str())
    .bind(target_id)
    .fetch_one(pool)
    .await?;

    Ok(exists > 0)
}

/// The user's `watching_ids`, `watched_by_ids` and `watched_project_ids`,
/// oldest edge first.
pub async fn relationship_ids(pool: &SqlitePool, user_id: &str) -> Result<RelationshipIds> {
    let watching_ids = sqlx::query_scalar::<_, String>(
        "SELECT target_id FROM watches WHERE watcher_id = ? AND target_type = 'user' ORDER BY created_at, rowid",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let watched_by_ids = sqlx::query_scalar::<_, String>(
        "SELECT watcher_id FROM watches WHERE target_type = 'user' AND target_id = ? ORDER BY created_at, rowid",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let watched_project_ids = sqlx::query_scalar::<_, String>(
        "SELECT target_id FROM watches WHERE watcher_id = ? AND target_type = 'project' ORDER BY created_at, rowid",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(RelationshipIds {
        watching_ids,
        watched_by_ids,
        watched_project_ids,
    })
}

/// Users watching `user_id`, newest first. `is_watched` says whether
/// `user_id` watches them back.
pub async fn list_watchers(pool: &SqlitePool, user_id: &str) -> Result<Vec<UserSummary>> {
    let sql = format!(
        "{USER_SUMMARY_SELECT}
        JOIN watches e ON e.watcher_id = u.id
        WHERE e.target_type = 'user' AND e.target_id = ?
        ORDER BY e.created_at DESC, e.rowid DESC"
    );

    let users = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(users)
}

/// Users `user_id` watches, newest first.
pub async fn list_watching(pool: &SqlitePool, user_id: &str) -> Result<Vec<UserSummary>> {
    let sql = format!(
        "{USER_SUMMARY_SELECT}
        JOIN watches e ON e.target_type = 'user' AND e.target_id = u.id
        WHERE e.watcher_id = ?
        ORDER BY e.created_at DESC, e.rowid DESC"
    );

    let users = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(users)
}

/// Projects `user_id` watches, newest edge first.
pub async fn list_watched_projects(pool: &SqlitePool, user_id: &str) -> Result<Vec<Project>> {
    let sql = format!(
        "{PROJECT_SELECT}
        JOIN watches e ON e.target_type = 'project' AND e.target_id = p.id
        WHERE e.watcher_id = ?
        ORDER BY e.created_at DESC, e.rowid DESC"
    );

    let rows = sqlx::query_as::<_, ProjectRow>(&sql)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Project::from).collect())
}
