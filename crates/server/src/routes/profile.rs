use axum::{
    extract::{Multipart, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    db::models::{encode_list, Profile, ProfileType, UserRow},
    error::{AppError, Result},
    middleware::auth::AuthUser,
    services::{integrity, relationships, storage::UploadStorage},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(get_profile).put(update_profile).delete(delete_account),
        )
        .route("/profile/update", post(update_profile))
        .route("/profile/upload-image", post(upload_image))
}

const UPLOAD_URL_PREFIX: &str = "/uploads/";

pub async fn load_user(pool: &SqlitePool, user_id: &str) -> Result<UserRow> {
    sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, username, email, profile_type, display_name, bio, skills, location,
               website, profile_image, creator_specialties, creator_platforms,
               content_categories, portfolio_links, preferred_deal_types, audience_size,
               creator_rate_min, creator_rate_max, brand_description, industry_sectors,
               target_audience, campaign_goals, budget_range, account_watchers, view_count,
               created_at, updated_at
        FROM users
        WHERE id = ?
        "#,
    )
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Partial profile update. Counters and identity fields are not part of it,
/// and unknown fields are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub profile_type: Option<ProfileType>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    // creator
    pub creator_specialties: Option<Vec<String>>,
    pub creator_platforms: Option<Vec<String>>,
    pub content_categories: Option<Vec<String>>,
    pub portfolio_links: Option<Vec<String>>,
    pub preferred_deal_types: Option<Vec<String>>,
    pub audience_size: Option<i64>,
    pub creator_rate_min: Option<i64>,
    pub creator_rate_max: Option<i64>,
    // brand
    pub brand_description: Option<String>,
    pub industry_sectors: Option<Vec<String>>,
    pub target_audience: Option<String>,
    pub campaign_goals: Option<String>,
    pub budget_range: Option<String>,
}

impl UpdateProfileRequest {
    fn has_creator_fields(&self) -> bool {
        self.creator_specialties.is_some()
            || self.creator_platforms.is_some()
            || self.content_categories.is_some()
            || self.portfolio_links.is_some()
            || self.preferred_deal_types.is_some()
            || self.audience_size.is_some()
            || self.creator_rate_min.is_some()
            || self.creator_rate_max.is_some()
    }

    fn has_brand_fields(&self) -> bool {
        self.brand_description.is_some()
            || self.industry_sectors.is_some()
            || self.target_audience.is_some()
            || self.campaign_goals.is_some()
            || self.budget_range.is_some()
    }

    /// Merges the patch into a stored row, enforcing that only the resulting
    /// profile type's attributes are touched.
    fn apply(self, row: &mut UserRow) -> Result<()> {
        let profile_type = self.profile_type.unwrap_or(row.profile_type);
        match profile_type {
            ProfileType::Creator if self.has_brand_fields() => {
                return Err(AppError::Validation(
                    "Brand attributes cannot be set on a creator profile".to_string(),
                ));
            }
            ProfileType::Brand if self.has_creator_fields() => {
                return Err(AppError::Validation(
                    "Creator attributes cannot be set on a brand profile".to_string(),
                ));
            }
            _ => {}
        }
        row.profile_type = profile_type;

        merge(&mut row.display_name, self.display_name);
        merge(&mut row.bio, self.bio);
        merge(&mut row.skills, self.skills);
        merge(&mut row.location, self.location);
        merge(&mut row.website, self.website);

        merge_list(&mut row.creator_specialties, self.creator_specialties);
        merge_list(&mut row.creator_platforms, self.creator_platforms);
        merge_list(&mut row.content_categories, self.content_categories);
        merge_list(&mut row.portfolio_links, self.portfolio_links);
        merge_list(&mut row.preferred_deal_types, self.preferred_deal_types);
        merge(&mut row.audience_size, self.audience_size);
        merge(&mut row.creator_rate_min, self.creator_rate_min);
        merge(&mut row.creator_rate_max, self.creator_rate_max);

        merge(&mut row.brand_description, self.brand_description);
        merge_list(&mut row.industry_sectors, self.industry_sectors);
        merge(&mut row.target_audience, self.target_audience);
        merge(&mut row.campaign_goals, self.campaign_goals);
        merge(&mut row.budget_range, self.budget_range);

        if [row.audience_size, row.creator_rate_min, row.creator_rate_max]
            .iter()
            .flatten()
            .any(|v| *v < 0)
        {
            return Err(AppError::Validation(
                "Audience size and rates cannot be negative".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (row.creator_rate_min, row.creator_rate_max) {
            if min > max {
                return Err(AppError::Validation(
                    "Minimum rate cannot exceed maximum rate".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn merge<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn merge_list(slot: &mut String, value: Option<Vec<String>>) {
    if let Some(items) = value {
        *slot = encode_list(&items);
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageResponse {
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    pub message: String,
}

async fn get_profile(State(state): State<AppState>, user: AuthUser) -> Result<Json<Profile>> {
    let row = load_user(&state.db.pool, &user.id).await?;
    let relationships = relationships::relationship_ids(&state.db.pool, &user.id).await?;

    Ok(Json(row.into_own_profile(relationships)))
}

async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>> {
    let mut row = load_user(&state.db.pool, &user.id).await?;
    body.apply(&mut row)?;
    row.updated_at = Utc::now().to_rfc3339();

    // Counters are only ever written by the watch engine
    sqlx::query(
        r#"
        UPDATE users SET
            profile_type = ?, display_name = ?, bio = ?, skills = ?, location = ?, website = ?,
            creator_specialties = ?, creator_platforms = ?, content_categories = ?,
            portfolio_links = ?, preferred_deal_types = ?, audience_size = ?,
            creator_rate_min = ?, creator_rate_max = ?,
            brand_description = ?, industry_sectors = ?, target_audience = ?,
            campaign_goals = ?, budget_range = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(row.profile_type.as_str())
    .bind(&row.display_name)
    .bind(&row.bio)
    .bind(&row.skills)
    .bind(&row.location)
    .bind(&row.website)
    .bind(&row.creator_specialties)
    .bind(&row.creator_platforms)
    .bind(&row.content_categories)
    .bind(&row.portfolio_links)
    .bind(&row.preferred_deal_types)
    .bind(row.audience_size)
    .bind(row.creator_rate_min)
    .bind(row.creator_rate_max)
    .bind(&row.brand_description)
    .bind(&row.industry_sectors)
    .bind(&row.target_audience)
    .bind(&row.campaign_goals)
    .bind(&row.budget_range)
    .bind(&row.updated_at)
    .bind(&user.id)
    .execute(&state.db.pool)
    .await?;

    tracing::debug!(user_id = %user.id, "Profile updated");

    // Re-read so counters reflect any toggles that landed meanwhile
    let row = load_user(&state.db.pool, &user.id).await?;
    let relationships = relationships::relationship_ids(&state.db.pool, &user.id).await?;
    Ok(Json(row.into_own_profile(relationships)))
}

async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<UploadImageResponse>> {
    let storage = UploadStorage::new(&state.config.upload_path);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        if field.name() != Some("profile_image") {
            continue;
        }

        let is_image = field
            .content_type()
            .map(|ct| ct.starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(AppError::Validation(
                "Not an image! Please upload an image.".to_string(),
            ));
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;

        if data.len() > state.config.max_upload_bytes {
            return Err(AppError::Validation("Image is too large".to_string()));
        }

        let stored = storage.store(&file_name, &data).await?;
        let image_url = format!("{UPLOAD_URL_PREFIX}{stored}");

        let previous = sqlx::query_scalar::<_, Option<String>>(
            "SELECT profile_image FROM users WHERE id = ?",
        )
        .bind(&user.id)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        sqlx::query("UPDATE users SET profile_image = ?, updated_at = ? WHERE id = ?")
            .bind(&image_url)
            .bind(Utc::now().to_rfc3339())
            .bind(&user.id)
            .execute(&state.db.pool)
            .await?;

        if let Some(old) = previous.as_deref().and_then(|p| p.strip_prefix(UPLOAD_URL_PREFIX)) {
            if let Err(e) = storage.delete(old).await {
                tracing::warn!("Failed to remove replaced profile image {old}: {e}");
            }
        }

        tracing::info!(user_id = %user.id, image_url = %image_url, "Profile image uploaded");
        return Ok(Json(UploadImageResponse { image_url }));
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}

async fn delete_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DeleteAccountResponse>> {
    let mut tx = state.db.pool.begin().await?;

    let profile_image = sqlx::query_scalar::<_, Option<String>>(
        "SELECT profile_image FROM users WHERE id = ?",
    )
    .bind(&user.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let purged = integrity::purge_user(&mut tx, &user.id).await?;

    // Cascades to projects, chats and messages
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    if let Some(old) = profile_image.as_deref().and_then(|p| p.strip_prefix(UPLOAD_URL_PREFIX)) {
        if let Err(e) = UploadStorage::new(&state.config.upload_path).delete(old).await {
            tracing::warn!("Failed to remove profile image {old}: {e}");
        }
    }

    tracing::info!(user_id = %user.id, purged_edges = purged, "Account deleted");

    Ok(Json(DeleteAccountResponse {
        message: "Account deleted".to_string(),
    }))
}
