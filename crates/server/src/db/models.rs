use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProfileType {
    Creator,
    Brand,
}

impl ProfileType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileType::Creator => "creator",
            ProfileType::Brand => "brand",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ProjectType {
    BrandDeal,
    CreativeWork,
}

impl ProjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectType::BrandDeal => "brand_deal",
            ProjectType::CreativeWork => "creative_work",
        }
    }
}

/// The kind of entity on the receiving end of a watch edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum WatchTarget {
    User,
    Project,
}

impl WatchTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchTarget::User => "user",
            WatchTarget::Project => "project",
        }
    }

    /// Table holding the target rows.
    pub fn table(self) -> &'static str {
        match self {
            WatchTarget::User => "users",
            WatchTarget::Project => "projects",
        }
    }

    /// Counter column that mirrors the number of edges pointing at a target.
    pub fn counter(self) -> &'static str {
        match self {
            WatchTarget::User => "account_watchers",
            WatchTarget::Project => "watch_count",
        }
    }
}

// Users

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub profile_type: ProfileType,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub profile_image: Option<String>,
    pub creator_specialties: String,
    pub creator_platforms: String,
    pub content_categories: String,
    pub portfolio_links: String,
    pub preferred_deal_types: String,
    pub audience_size: Option<i64>,
    pub creator_rate_min: Option<i64>,
    pub creator_rate_max: Option<i64>,
    pub brand_description: Option<String>,
    pub industry_sectors: String,
    pub target_audience: Option<String>,
    pub campaign_goals: Option<String>,
    pub budget_range: Option<String>,
    pub account_watchers: i64,
    pub view_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreatorDetails {
    pub creator_specialties: Vec<String>,
    pub creator_platforms: Vec<String>,
    pub content_categories: Vec<String>,
    pub portfolio_links: Vec<String>,
    pub preferred_deal_types: Vec<String>,
    pub audience_size: Option<i64>,
    pub creator_rate_min: Option<i64>,
    pub creator_rate_max: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandDetails {
    pub brand_description: Option<String>,
    pub industry_sectors: Vec<String>,
    pub target_audience: Option<String>,
    pub campaign_goals: Option<String>,
    pub budget_range: Option<String>,
}

/// Type-specific profile attributes. Creator and brand attribute sets are
/// disjoint; serialized flat next to `profile_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "profile_type", rename_all = "snake_case")]
pub enum ProfileDetails {
    Creator(CreatorDetails),
    Brand(BrandDetails),
}

/// ID sets read from the watch edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationshipIds {
    pub watching_ids: Vec<String>,
    pub watched_by_ids: Vec<String>,
    pub watched_project_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub profile_image: Option<String>,
    #[serde(flatten)]
    pub details: ProfileDetails,
    pub account_watchers: i64,
    pub view_count: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub relationships: Option<RelationshipIds>,
}

pub fn parse_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

impl UserRow {
    pub fn creator_details(&self) -> CreatorDetails {
        CreatorDetails {
            creator_specialties: parse_list(&self.creator_specialties),
            creator_platforms: parse_list(&self.creator_platforms),
            content_categories: parse_list(&self.content_categories),
            portfolio_links: parse_list(&self.portfolio_links),
            preferred_deal_types: parse_list(&self.preferred_deal_types),
            audience_size: self.audience_size,
            creator_rate_min: self.creator_rate_min,
            creator_rate_max: self.creator_rate_max,
        }
    }

    pub fn brand_details(&self) -> BrandDetails {
        BrandDetails {
            brand_description: self.brand_description.clone(),
            industry_sectors: parse_list(&self.industry_sectors),
            target_audience: self.target_audience.clone(),
            campaign_goals: self.campaign_goals.clone(),
            budget_range: self.budget_range.clone(),
        }
    }

    pub fn details(&self) -> ProfileDetails {
        match self.profile_type {
            ProfileType::Creator => ProfileDetails::Creator(self.creator_details()),
            ProfileType::Brand => ProfileDetails::Brand(self.brand_details()),
        }
    }

    /// Public view: no email, no relationship sets.
    pub fn into_public_profile(self) -> Profile {
        let details = self.details();
        Profile {
            id: self.id,
            username: self.username,
            email: None,
            display_name: self.display_name,
            bio: self.bio,
            skills: self.skills,
            location: self.location,
            website: self.website,
            profile_image: self.profile_image,
            details,
            account_watchers: self.account_watchers,
            view_count: self.view_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
            relationships: None,
        }
    }

    pub fn into_own_profile(self, relationships: RelationshipIds) -> Profile {
        let email = self.email.clone();
        let mut profile = self.into_public_profile();
        profile.email = Some(email);
        profile.relationships = Some(relationships);
        profile
    }
}

/// Card-sized view of a user. `is_watched` is relative to whoever the
/// listing was produced for.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub profile_type: ProfileType,
    pub bio: Option<String>,
    pub profile_image: Option<String>,
    pub account_watchers: i64,
    pub is_watched: bool,
}

/// Selects `UserSummary` columns from `users u`. Binds the subject user id
/// first.
pub const USER_SUMMARY_SELECT: &str = r#"
    SELECT u.id, u.username, u.display_name, u.profile_type, u.bio, u.profile_image,
           u.account_watchers,
           EXISTS (
               SELECT 1 FROM watches w
               WHERE w.watcher_id = ? AND w.target_type = 'user' AND w.target_id = u.id
           ) AS is_watched
    FROM users u
"#;

// Projects

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub project_type: ProjectType,
    pub budget_range: Option<String>,
    pub timeline: Option<String>,
    pub payment_format: Option<String>,
    pub target_audience: Option<String>,
    pub campaign_goals: Option<String>,
    pub content_category: Option<String>,
    pub content_length: Option<String>,
    pub technical_requirements: Option<String>,
    pub watch_count: i64,
    pub created_at: String,
    pub updated_at: String,
    pub creator_name: String,
    pub creator_type: ProfileType,
    pub is_watching: bool,
}

/// Selects `ProjectRow` columns from `projects p` joined to its owner. Binds
/// the viewing user id first.
pub const PROJECT_SELECT: &str = r#"
    SELECT p.id, p.user_id, p.name, p.description, p.project_type,
           p.budget_range, p.timeline, p.payment_format, p.target_audience, p.campaign_goals,
           p.content_category, p.content_length, p.technical_requirements,
           p.watch_count, p.created_at, p.updated_at,
           u.username AS creator_name, u.profile_type AS creator_type,
           EXISTS (
               SELECT 1 FROM watches w
               WHERE w.watcher_id = ? AND w.target_type = 'project' AND w.target_id = p.id
           ) AS is_watching
    FROM projects p
    JOIN users u ON u.id = p.user_id
"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandDealDetails {
    pub budget_range: Option<String>,
    pub timeline: Option<String>,
    pub payment_format: Option<String>,
    pub target_audience: Option<String>,
    pub campaign_goals: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreativeWorkDetails {
    pub content_category: Option<String>,
    pub content_length: Option<String>,
    pub technical_requirements: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "project_type", rename_all = "snake_case")]
pub enum ProjectDetails {
    BrandDeal(BrandDealDetails),
    CreativeWork(CreativeWorkDetails),
}

impl ProjectDetails {
    pub fn project_type(&self) -> ProjectType {
        match self {
            ProjectDetails::BrandDeal(_) => ProjectType::BrandDeal,
            ProjectDetails::CreativeWork(_) => ProjectType::CreativeWork,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub details: ProjectDetails,
    pub watch_count: i64,
    pub created_at: String,
    pub updated_at: String,
    pub creator_name: String,
    pub creator_type: ProfileType,
    pub is_watching: bool,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        let details = match row.project_type {
            ProjectType::BrandDeal => ProjectDetails::BrandDeal(BrandDealDetails {
                budget_range: row.budget_range,
                timeline: row.timeline,
                payment_format: row.payment_format,
                target_audience: row.target_audience,
                campaign_goals: row.campaign_goals,
            }),
            ProjectType::CreativeWork => ProjectDetails::CreativeWork(CreativeWorkDetails {
                content_category: row.content_category,
                content_length: row.content_length,
                technical_requirements: row.technical_requirements,
            }),
        };

        Project {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            description: row.description,
            details,
            watch_count: row.watch_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            creator_name: row.creator_name,
            creator_type: row.creator_type,
            is_watching: row.is_watching,
        }
    }
}

// Chats

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ChatSummary {
    pub id: String,
    pub user1_id: String,
    pub user1_username: String,
    pub user2_id: String,
    pub user2_username: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub content: String,
    pub created_at: String,
}
