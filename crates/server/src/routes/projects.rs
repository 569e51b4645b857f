use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::models::{
        BrandDealDetails, CreativeWorkDetails, Project, ProjectDetails, ProjectRow, PROJECT_SELECT,
    },
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::integrity,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_own_projects).post(create_project))
        .route("/projects/all", get(list_all_projects))
        .route("/projects/random", get(random_projects))
        .route("/projects/recent", get(recent_projects))
        .route("/explore/projects", get(list_all_projects))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
}

const SHOWCASE_LIMIT: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub details: ProjectDetails,
}

/// Partial update. The project type is fixed at creation; only attributes of
/// the project's own type are accepted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    // brand_deal
    pub budget_range: Option<String>,
    pub timeline: Option<String>,
    pub payment_format: Option<String>,
    pub target_audience: Option<String>,
    pub campaign_goals: Option<String>,
    // creative_work
    pub content_category: Option<String>,
    pub content_length: Option<String>,
    pub technical_requirements: Option<String>,
}

impl UpdateProjectRequest {
    fn apply(self, project: &mut Project) -> Result<()> {
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Project name is required".to_string()));
            }
            project.name = name;
        }
        if let Some(description) = self.description {
            if description.trim().is_empty() {
                return Err(AppError::Validation(
                    "Project description is required".to_string(),
                ));
            }
            project.description = description;
        }

        let touches_deal = self.budget_range.is_some()
            || self.timeline.is_some()
            || self.payment_format.is_some()
            || self.target_audience.is_some()
            || self.campaign_goals.is_some();
        let touches_work = self.content_category.is_some()
            || self.content_length.is_some()
            || self.technical_requirements.is_some();

        match &mut project.details {
            ProjectDetails::BrandDeal(_) if touches_work => Err(AppError::Validation(
                "Creative work attributes cannot be set on a brand deal".to_string(),
            )),
            ProjectDetails::CreativeWork(_) if touches_deal => Err(AppError::Validation(
                "Brand deal attributes cannot be set on a creative work".to_string(),
            )),
            ProjectDetails::BrandDeal(deal) => {
                let BrandDealDetails {
                    budget_range,
                    timeline,
                    payment_format,
                    target_audience,
                    campaign_goals,
                } = deal;
                replace(budget_range, self.budget_range);
                replace(timeline, self.timeline);
                replace(payment_format, self.payment_format);
                replace(target_audience, self.target_audience);
                replace(campaign_goals, self.campaign_goals);
                Ok(())
            }
            ProjectDetails::CreativeWork(work) => {
                let CreativeWorkDetails {
                    content_category,
                    content_length,
                    technical_requirements,
                } = work;
                replace(content_category, self.content_category);
                replace(content_length, self.content_length);
                replace(technical_requirements, self.technical_requirements);
                Ok(())
            }
        }
    }
}

fn replace(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Columns of the type-specific attributes, in the order `detail_values`
/// returns them.
const DETAIL_COLUMNS: [&str; 8] = [
    "budget_range",
    "timeline",
    "payment_format",
    "target_audience",
    "campaign_goals",
    "content_category",
    "content_length",
    "technical_requirements",
];

fn detail_values(details: &ProjectDetails) -> [Option<&str>; 8] {
    match details {
        ProjectDetails::BrandDeal(deal) => [
            deal.budget_range.as_deref(),
            deal.timeline.as_deref(),
            deal.payment_format.as_deref(),
            deal.target_audience.as_deref(),
            deal.campaign_goals.as_deref(),
            None,
            None,
            None,
        ],
        ProjectDetails::CreativeWork(work) => [
            None,
            None,
            None,
            None,
            None,
            work.content_category.as_deref(),
            work.content_length.as_deref(),
            work.technical_requirements.as_deref(),
        ],
    }
}

pub async fn load_project(pool: &SqlitePool, viewer_id: &str, project_id: &str) -> Result<Project> {
    let sql = format!("{PROJECT_SELECT} WHERE p.id = ?");

    let row = sqlx::query_as::<_, ProjectRow>(&sql)
        .bind(viewer_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    Ok(row.into())
}

async fn list_projects_where(
    pool: &SqlitePool,
    viewer_id: &str,
    clause: &str,
    owner_id: Option<&str>,
) -> Result<Vec<Project>> {
    let sql = format!("{PROJECT_SELECT} {clause}");

    let mut query = sqlx::query_as::<_, ProjectRow>(&sql).bind(viewer_id);
    if let Some(owner_id) = owner_id {
        query = query.bind(owner_id);
    }

    let rows = query.fetch_all(pool).await?;
    Ok(rows.into_iter().map(Project::from).collect())
}

async fn list_own_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Project>>> {
    let projects = list_projects_where(
        &state.db.pool,
        &user.id,
        "WHERE p.user_id = ? ORDER BY p.created_at DESC",
        Some(&user.id),
    )
    .await?;

    Ok(Json(projects))
}

async fn list_all_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Project>>> {
    let projects =
        list_projects_where(&state.db.pool, &user.id, "ORDER BY p.created_at DESC", None).await?;

    Ok(Json(projects))
}

async fn random_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Project>>> {
    let clause = format!("ORDER BY RANDOM() LIMIT {SHOWCASE_LIMIT}");
    let projects = list_projects_where(&state.db.pool, &user.id, &clause, None).await?;

    Ok(Json(projects))
}

async fn recent_projects(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Project>>> {
    let clause = format!("ORDER BY p.created_at DESC LIMIT {SHOWCASE_LIMIT}");
    let projects = list_projects_where(&state.db.pool, &user.id, &clause, None).await?;

    Ok(Json(projects))
}

async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Project name is required".to_string()));
    }
    if body.description.trim().is_empty() {
        return Err(AppError::Validation(
            "Project description is required".to_string(),
        ));
    }

    let project_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let [budget_range, timeline, payment_format, target_audience, campaign_goals, content_category, content_length, technical_requirements] =
        detail_values(&body.details);

    sqlx::query(&format!(
        "INSERT INTO projects (id, user_id, name, description, project_type, {}, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        DETAIL_COLUMNS.join(", "),
    ))
    .bind(&project_id)
    .bind(&user.id)
    .bind(body.name.trim())
    .bind(&body.description)
    .bind(body.details.project_type().as_str())
    .bind(budget_range)
    .bind(timeline)
    .bind(payment_format)
    .bind(target_audience)
    .bind(campaign_goals)
    .bind(content_category)
    .bind(content_length)
    .bind(technical_requirements)
    .bind(&now)
    .bind(&now)
    .execute(&state.db.pool)
    .await?;

    tracing::info!(
        project_id = %project_id,
        owner_id = %user.id,
        owner = %user.username,
        project_type = body.details.project_type().as_str(),
        "Project created"
    );

    let project = load_project(&state.db.pool, &user.id, &project_id).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Project>> {
    Ok(Json(load_project(&state.db.pool, &user.id, &id).await?))
}

async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateProjectRequest>,
) -> Result<Json<Project>> {
    let mut project = load_project(&state.db.pool, &user.id, &id).await?;

    if project.user_id != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to update this project".to_string(),
        ));
    }

    body.apply(&mut project)?;

    let assignments = DETAIL_COLUMNS
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(", ");
    let [budget_range, timeline, payment_format, target_audience, campaign_goals, content_category, content_length, technical_requirements] =
        detail_values(&project.details);

    sqlx::query(&format!(
        "UPDATE projects SET name = ?, description = ?, {assignments}, updated_at = ? WHERE id = ?"
    ))
    .bind(&project.name)
    .bind(&project.description)
    .bind(budget_range)
    .bind(timeline)
    .bind(payment_format)
    .bind(target_audience)
    .bind(campaign_goals)
    .bind(content_category)
    .bind(content_length)
    .bind(technical_requirements)
    .bind(Utc::now().to_rfc3339())
    .bind(&id)
    .execute(&state.db.pool)
    .await?;

    Ok(Json(load_project(&state.db.pool, &user.id, &id).await?))
}

async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.pool.begin().await?;

    // Only owner can delete project
    let project = sqlx::query_as::<_, (String,)>("SELECT user_id FROM projects WHERE id = ?")
        .bind(&id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

    if project.0 != user.id {
        return Err(AppError::Forbidden(
            "Not authorized to delete this project".to_string(),
        ));
    }

    let purged = integrity::purge_project(&mut tx, &id).await?;

    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(project_id = %id, purged_edges = purged, "Project deleted");

    Ok(Json(MessageResponse {
        message: "Project deleted successfully".to_string(),
    }))
}
