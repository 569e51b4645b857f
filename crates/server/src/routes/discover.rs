use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::ProfileType,
    error::Result,
    middleware::auth::AuthUser,
    AppState,
};

/// Routes that need an authenticated caller.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/popular/creators", get(popular_creators))
        .route("/popular/brands", get(popular_brands))
}

/// Routes anyone can reach.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/leaderboard", get(leaderboard))
}

const LEADERBOARD_SIZE: i64 = 10;
const POPULAR_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardCategory {
    #[default]
    Watchers,
    Views,
    ProjectWatches,
}

impl LeaderboardCategory {
    fn score_expr(self) -> &'static str {
        match self {
            LeaderboardCategory::Watchers => "u.account_watchers",
            LeaderboardCategory::Views => "u.view_count",
            LeaderboardCategory::ProjectWatches => {
                "(SELECT COALESCE(SUM(p.watch_count), 0) FROM projects p WHERE p.user_id = u.id)"
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub category: LeaderboardCategory,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub id: String,
    pub username: String,
    pub profile_type: ProfileType,
    pub score: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct PopularUser {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub profile_type: ProfileType,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub account_watchers: i64,
    pub project_count: i64,
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let sql = format!(
        "SELECT u.id, u.username, u.profile_type, {} AS score
         FROM users u
         ORDER BY score DESC, u.username ASC
         LIMIT ?",
        query.category.score_expr()
    );

    let entries = sqlx::query_as::<_, LeaderboardEntry>(&sql)
        .bind(LEADERBOARD_SIZE)
        .fetch_all(&state.db.pool)
        .await?;

    Ok(Json(entries))
}

async fn popular_of_type(state: &AppState, profile_type: ProfileType) -> Result<Vec<PopularUser>> {
    let users = sqlx::query_as::<_, PopularUser>(
        r#"
        SELECT u.id, u.username, u.display_name, u.profile_type, u.bio, u.profile_image,
               u.account_watchers,
               (SELECT COUNT(*) FROM projects p WHERE p.user_id = u.id) AS project_count
        FROM users u
        WHERE u.profile_type = ?
        ORDER BY RANDOM()
        LIMIT ?
        "#,
    )
    .bind(profile_type.as_str())
    .bind(POPULAR_SIZE)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(users)
}

async fn popular_creators(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<PopularUser>>> {
    Ok(Json(popular_of_type(&state, ProfileType::Creator).await?))
}

async fn popular_brands(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<PopularUser>>> {
    Ok(Json(popular_of_type(&state, ProfileType::Brand).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::{send, TestApp};

    #[tokio::test]
    async fn leaderboard_ranks_by_category() {
        let app = TestApp::new().await;
        let alice = app.signup("alice").await;
        let bob = app.signup("bob").await;
        let carol = app.signup("carol").await;

        app.post(&alice, &format!("/api/watch/user/{}", bob.id)).await;
        app.post(&carol, &format!("/api/watch/user/{}", bob.id)).await;
        app.post(&bob, &format!("/api/watch/user/{}", carol.id)).await;

        let (status, body) = send(&app.router, "GET", "/api/leaderboard", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["username"], "bob");
        assert_eq!(body[0]["score"], 2);
        assert_eq!(body[1]["username"], "carol");

        let project = app.create_project(&alice, "Reel").await;
        app.post(&bob, &format!("/api/watch/project/{project}")).await;
        let (_, body) = send(
            &app.router,
            "GET",
            "/api/leaderboard?category=project_watches",
            None,
            None,
        )
        .await;
        assert_eq!(body[0]["username"], "alice");
        assert_eq!(body[0]["score"], 1);

        let (status, _) = send(
            &app.router,
            "GET",
            "/api/leaderboard?category=password_hash",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn leaderboard_is_public_but_popular_lists_are_not() {
        let app = TestApp::new().await;
        app.signup("alice").await;

        let (status, body) = send(
            &app.router,
            "GET",
            "/api/leaderboard?category=watchers",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["username"], "alice");
        assert_eq!(body[0]["score"], 0);

        let (status, _) = send(&app.router, "GET", "/api/popular/creators", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn popular_lists_filter_by_profile_type() {
        let app = TestApp::new().await;
        let creator = app.signup("creator").await;
        let (status, _) = send(
            &app.router,
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({
                "username": "acme",
                "email": "acme@example.com",
                "password": "password123",
                "profile_type": "brand",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        app.create_project(&creator, "Reel").await;

        let (_, body) =
            send(&app.router, "GET", "/api/popular/creators", Some(&creator.token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["username"], "creator");
        assert_eq!(body[0]["project_count"], 1);

        let (_, body) =
            send(&app.router, "GET", "/api/popular/brands", Some(&creator.token), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["profile_type"], "brand");
    }
}
