// Counter audit/repair and relationship purge on entity deletion.

use serde::Serialize;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::{db::models::WatchTarget, error::Result, services::watch::recount};

/// A target whose stored counter disagrees with its edge count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterDrift {
    pub target_type: WatchTarget,
    pub target_id: String,
    pub stored: i64,
    pub actual: i64,
}

pub async fn audit(pool: &SqlitePool) -> Result<Vec<CounterDrift>> {
    let mut drifts = Vec::new();

    for target in [WatchTarget::User, WatchTarget::Project] {
        let sql = format!(
            r#"
            SELECT t.id, t.{c},
                   (SELECT COUNT(*) FROM watches w WHERE w.target_type = ? AND w.target_id = t.id) AS actual
            FROM {table} t
            WHERE t.{c} != (SELECT COUNT(*) FROM watches w WHERE w.target_type = ? AND w.target_id = t.id)
            ORDER BY t.id
            "#,
            table = target.table(),
            c = target.counter(),
        );

        let rows = sqlx::query_as::<_, (String, i64, i64)>(&sql)
            .bind(target.as_str())
            .bind(target.as_str())
            .fetch_all(pool)
            .await?;

        drifts.extend(
            rows.into_iter()
                .map(|(target_id, stored, actual)| CounterDrift {
                    target_type: target,
                    target_id,
                    stored,
                    actual,
                }),
        );
    }

    Ok(drifts)
}

/// Finds drifted counters, logs each one, and rewrites them from the edge
/// table. Returns the number repaired.
pub async fn reconcile(pool: &SqlitePool) -> Result<usize> {
    let drifts = audit(pool).await?;
    if drifts.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for drift in &drifts {
        tracing::warn!(
            target_type = drift.target_type.as_str(),
            target_id = %drift.target_id,
            stored = drift.stored,
            actual = drift.actual,
            "Repairing drifted watch counter"
        );
        recount(&mut tx, drift.target_type, &drift.target_id).await?;
    }
    tx.commit().await?;

    Ok(drifts.len())
}

/// Deletes every edge pointing at a project. The watchers keep no counter
/// for projects, so nothing else changes.
pub async fn purge_project(tx: &mut Transaction<'_, Sqlite>, project_id: &str) -> Result<u64> {
    let removed = sqlx::query("DELETE FROM watches WHERE target_type = 'project' AND target_id = ?")
        .bind(project_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    Ok(removed)
}

/// Deletes every edge a user takes part in, including edges pointing at the
/// user's projects, and recounts the targets that lost this user as watcher.
pub async fn purge_user(tx: &mut Transaction<'_, Sqlite>, user_id: &str) -> Result<u64> {
    let watched = sqlx::query_as::<_, (WatchTarget, String)>(
        "SELECT target_type, target_id FROM watches WHERE watcher_id = ?",
    )
    .bind(user_id)
    .fetch_all(&mut **tx)
    .await?;

    let removed = sqlx::query(
        r#"
        DELETE FROM watches
        WHERE watcher_id = ?
           OR (target_type = 'user' AND target_id = ?)
           OR (target_type = 'project' AND target_id IN (SELECT id FROM projects WHERE user_id = ?))
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    for (target, target_id) in &watched {
        recount(tx, *target, target_id).await?;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::Database,
        services::{
            relationships,
            watch::{toggle_project_watch, toggle_user_watch},
        },
        test_support::{insert_project, insert_user},
    };

    #[tokio::test]
    async fn audit_finds_and_reconcile_repairs_drift() {
        let db = Database::in_memory().await;
        let pool = &db.pool;
        let alice = insert_user(pool, "alice").await;
        let bob = insert_user(pool, "bob").await;
        let project = insert_project(pool, &bob, "Reel").await;

        toggle_user_watch(pool, &alice, &bob).await.unwrap();
        toggle_project_watch(pool, &alice, &project).await.unwrap();
        assert!(audit(pool).await.unwrap().is_empty());

        sqlx::query("UPDATE users SET account_watchers = 7 WHERE id = ?")
            .bind(&bob)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("UPDATE projects SET watch_count = 0 WHERE id = ?")
            .bind(&project)
            .execute(pool)
            .await
            .unwrap();

        let drifts = audit(pool).await.unwrap();
        assert_eq!(drifts.len(), 2);
        assert!(drifts.contains(&CounterDrift {
            target_type: WatchTarget::User,
            target_id: bob.clone(),
            stored: 7,
            actual: 1,
        }));
        assert!(drifts.contains(&CounterDrift {
            target_type: WatchTarget::Project,
            target_id: project.clone(),
            stored: 0,
            actual: 1,
        }));

        assert_eq!(reconcile(pool).await.unwrap(), 2);
        assert!(audit(pool).await.unwrap().is_empty());
        assert_eq!(reconcile(pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn purging_a_user_clears_every_side() {
        let db = Database::in_memory().await;
        let pool = &db.pool;
        let alice = insert_user(pool, "alice").await;
        let bob = insert_user(pool, "bob").await;
        let carol = insert_user(pool, "carol").await;
        let bobs_project = insert_project(pool, &bob, "Bob's").await;
        let carols_project = insert_project(pool, &carol, "Carol's").await;

        toggle_user_watch(pool, &bob, &alice).await.unwrap();
        toggle_user_watch(pool, &bob, &carol).await.unwrap();
        toggle_user_watch(pool, &carol, &bob).await.unwrap();
        toggle_project_watch(pool, &bob, &carols_project).await.unwrap();
        toggle_project_watch(pool, &alice, &bobs_project).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        purge_user(&mut tx, &bob).await.unwrap();
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&bob)
            .execute(&mut *tx)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let alice_ids = relationships::relationship_ids(pool, &alice).await.unwrap();
        let carol_ids = relationships::relationship_ids(pool, &carol).await.unwrap();
        assert!(alice_ids.watched_by_ids.is_empty());
        assert!(alice_ids.watched_project_ids.is_empty());
        assert!(carol_ids.watched_by_ids.is_empty());
        assert!(carol_ids.watching_ids.is_empty());

        let carols_count: i64 = sqlx::query_scalar("SELECT watch_count FROM projects WHERE id = ?")
            .bind(&carols_project)
            .fetch_one(pool)
            .await
            .unwrap();
        assert_eq!(carols_count, 0);
        assert!(audit(pool).await.unwrap().is_empty());
    }
}
