use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::{
    db::models::{Project, UserSummary, WatchTarget},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::{
        relationships,
        watch::{self, WatchResponse},
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/watch/user/:id", post(toggle_user_watch))
        .route("/watch/project/:id", post(toggle_project_watch))
        .route("/watch-status/user/:id", get(user_watch_status))
        .route("/watchers", get(list_watchers))
        .route("/watching", get(list_watching))
        .route("/watched-projects", get(list_watched_projects))
        // Paths used by the existing web client
        .route("/users/:id/watch", post(toggle_user_watch))
        .route("/users/:id/watch-status", get(user_watch_status))
        .route("/projects/:id/watch", post(toggle_project_watch))
        .route("/watches/watchers", get(list_watchers))
        .route("/watches/watching", get(list_watching))
        .route("/watches/projects", get(list_watched_projects))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStatusResponse {
    pub is_watching: bool,
}

/// Failures past validation surface as a rolled-back toggle with safe
/// defaults, so the client re-queries instead of flipping its state.
fn toggle_failure(err: AppError) -> AppError {
    match err {
        AppError::Database(e) => {
            tracing::error!("Watch toggle rolled back: {e}");
            AppError::WatchFailed
        }
        other => other,
    }
}

async fn toggle_user_watch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(target_id): Path<String>,
) -> Result<Json<WatchResponse>> {
    let outcome = watch::toggle_user_watch(&state.db.pool, &user.id, &target_id)
        .await
        .map_err(toggle_failure)?;

    Ok(Json(outcome.into()))
}

async fn toggle_project_watch(
    State(state): State<AppState>,
    user: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<WatchResponse>> {
    let outcome = watch::toggle_project_watch(&state.db.pool, &user.id, &project_id)
        .await
        .map_err(toggle_failure)?;

    Ok(Json(outcome.into()))
}

async fn user_watch_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(target_id): Path<String>,
) -> Result<Json<WatchStatusResponse>> {
    let is_watching =
        relationships::is_watching(&state.db.pool, &user.id, WatchTarget::User, &target_id)
            .await?;

    Ok(Json(WatchStatusResponse { is_watching }))
}

async fn list_watchers(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<UserSummary>>> {
    Ok(Json(
        relationships::list_watchers(&state.db.pool, &user.id).await?,
    ))
}

async fn list_watching(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<UserSummary>>> {
    Ok(Json(
        relationships::list_watching(&state.db.pool, &user.id).await?,
    ))
}

async fn list_watched_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Project>>> {
    Ok(Json(
        relationships::list_watched_projects(&state.db.pool, &user.id).await?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::{send, TestApp};

    #[tokio::test]
    async fn toggling_a_user_reports_post_toggle_state() {
        let app = TestApp::new().await;
        let alice = app.signup("alice").await;
        let bob = app.signup("bob").await;

        let uri = format!("/api/watch/user/{}", bob.id);
        let (status, body) = send(&app.router, "POST", &uri, Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "watchCount": 1, "isWatching": true, "message": "Successfully watching user" })
        );

        let status_uri = format!("/api/watch-status/user/{}", bob.id);
        let (_, body) = send(&app.router, "GET", &status_uri, Some(&alice.token), None).await;
        assert_eq!(body, json!({ "isWatching": true }));

        let (_, body) = send(&app.router, "GET", "/api/watchers", Some(&bob.token), None).await;
        assert_eq!(body[0]["id"], alice.id.as_str());
        let (_, body) = send(&app.router, "GET", "/api/watching", Some(&alice.token), None).await;
        assert_eq!(body[0]["id"], bob.id.as_str());

        // Legacy path toggles the same relationship back off
        let legacy = format!("/api/users/{}/watch", bob.id);
        let (_, body) = send(&app.router, "POST", &legacy, Some(&alice.token), None).await;
        assert_eq!(body["isWatching"], false);
        assert_eq!(body["watchCount"], 0);
        assert_eq!(body["message"], "Successfully unwatched user");

        let (_, body) = send(&app.router, "GET", "/api/watchers", Some(&bob.token), None).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn toggling_a_project_and_listing_it() {
        let app = TestApp::new().await;
        let owner = app.signup("owner").await;
        let fan = app.signup("fan").await;
        let project_id = app.create_project(&owner, "Summer drop").await;

        let uri = format!("/api/watch/project/{project_id}");
        let (status, body) = send(&app.router, "POST", &uri, Some(&fan.token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["watchCount"], 1);
        assert_eq!(body["isWatching"], true);

        let (_, body) =
            send(&app.router, "GET", "/api/watched-projects", Some(&fan.token), None).await;
        assert_eq!(body[0]["id"], project_id.as_str());
        assert_eq!(body[0]["is_watching"], true);
        assert_eq!(body[0]["creator_name"], "owner");
    }

    #[tokio::test]
    async fn toggle_errors_map_to_client_statuses() {
        let app = TestApp::new().await;
        let alice = app.signup("alice").await;

        let (status, _) =
            send(&app.router, "POST", "/api/watch/user/missing", Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let own = format!("/api/watch/user/{}", alice.id);
        let (status, _) = send(&app.router, "POST", &own, Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app.router, "POST", "/api/watch/project/x", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn rolled_back_toggle_returns_safe_defaults() {
        let app = TestApp::new().await;
        let alice = app.signup("alice").await;
        let bob = app.signup("bob").await;

        sqlx::query(
            "CREATE TRIGGER fail_user_counter BEFORE UPDATE OF account_watchers ON users \
             BEGIN SELECT RAISE(ABORT, 'simulated failure'); END",
        )
        .execute(&app.state.db.pool)
        .await
        .unwrap();

        let uri = format!("/api/watch/user/{}", bob.id);
        let (status, body) = send(&app.router, "POST", &uri, Some(&alice.token), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["isWatching"], false);
        assert_eq!(body["watchCount"], 0);
        assert_eq!(body["message"], "Error toggling watch status");
    }
}
