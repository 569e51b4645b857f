use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{Profile, Project, ProjectRow, UserSummary, PROJECT_SELECT, USER_SUMMARY_SELECT},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    routes::profile::load_user,
    AppState,
};

/// Routes that need an authenticated caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(explore_users))
        .route("/users/search", get(search_users))
        .route("/users/:id/projects", get(user_projects))
        .route("/users/:id/metrics", get(user_metrics))
}

/// Routes anyone can reach.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/users/:id/public", get(public_profile))
}

const SEARCH_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserMetrics {
    pub follower_count: i64,
    pub watching_count: i64,
    pub view_count: i64,
    pub project_count: i64,
    pub watch_count: i64,
}

async fn explore_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<UserSummary>>> {
    let sql = format!("{USER_SUMMARY_SELECT} WHERE u.id != ? ORDER BY u.created_at DESC");

    let users = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(&user.id)
        .bind(&user.id)
        .fetch_all(&state.db.pool)
        .await?;

    tracing::debug!(count = users.len(), "Explore users listed");
    Ok(Json(users))
}

async fn search_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserSummary>>> {
    let needle = query.query.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(Json(Vec::new()));
    }

    // SQLite's lower() only folds ASCII, so matching happens here
    let sql = format!("{USER_SUMMARY_SELECT} WHERE u.id != ? ORDER BY u.username ASC");

    let candidates = sqlx::query_as::<_, UserSummary>(&sql)
        .bind(&user.id)
        .bind(&user.id)
        .fetch_all(&state.db.pool)
        .await?;

    let users = candidates
        .into_iter()
        .filter(|u| {
            u.username.to_lowercase().contains(&needle)
                || u
                    .display_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .take(SEARCH_LIMIT)
        .collect();

    Ok(Json(users))
}

async fn public_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>> {
    let updated = sqlx::query("UPDATE users SET view_count = view_count + 1 WHERE id = ?")
        .bind(&user_id)
        .execute(&state.db.pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let row = load_user(&state.db.pool, &user_id).await?;
    Ok(Json(row.into_public_profile()))
}

async fn user_projects(
    State(state): State<AppState>,
    user: AuthUser,
    Path(owner_id): Path<String>,
) -> Result<Json<Vec<Project>>> {
    let sql = format!("{PROJECT_SELECT} WHERE p.user_id = ? ORDER BY p.created_at DESC");

    let rows = sqlx::query_as::<_, ProjectRow>(&sql)
        .bind(&user.id)
        .bind(&owner_id)
        .fetch_all(&state.db.pool)
        .await?;

    Ok(Json(rows.into_iter().map(Project::from).collect()))
}

async fn user_metrics(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<UserMetrics>> {
    let metrics = sqlx::query_as::<_, UserMetrics>(
        r#"
        SELECT u.account_watchers AS follower_count,
               (SELECT COUNT(*) FROM watches w
                WHERE w.watcher_id = u.id AND w.target_type = 'user') AS watching_count,
               u.view_count,
               (SELECT COUNT(*) FROM projects p WHERE p.user_id = u.id) AS project_count,
               (SELECT COALESCE(SUM(p.watch_count), 0) FROM projects p
                WHERE p.user_id = u.id) AS watch_count
        FROM users u
        WHERE u.id = ?
        "#,
    )
    .bind(&user_id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(metrics))
}
