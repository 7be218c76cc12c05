//! User document model and DTOs.

use devspace_core::types::{DocId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full user document.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
/// Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DocId,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub password_hash: String,
    #[sqlx(json)]
    pub stats: Vec<Stat>,
    #[sqlx(json)]
    pub projects: Vec<Project>,
    #[sqlx(json)]
    pub activities: Vec<Activity>,
    #[sqlx(json)]
    pub skills: Vec<Skill>,
    pub location: Option<String>,
    pub title: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A headline number shown on the profile dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stat {
    pub title: String,
    pub value: String,
    pub icon: String,
    #[serde(default)]
    pub change: Option<i32>,
}

/// A showcase project listed on a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub team: Vec<String>,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default)]
    pub stars: u32,
    #[serde(default)]
    pub commits: u32,
}

/// An entry in the recent-activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub icon: String,
    pub description: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub name: String,
    pub level: u8,
}

/// Safe user representation for API responses (no password hash).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: DocId,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub stats: Vec<Stat>,
    pub projects: Vec<Project>,
    pub activities: Vec<Activity>,
    pub skills: Vec<Skill>,
    pub location: Option<String>,
    pub title: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            avatar_url: user.avatar_url,
            stats: user.stats,
            projects: user.projects,
            activities: user.activities,
            skills: user.skills,
            location: user.location,
            title: user.title,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// DTO for creating a new user.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
}

/// DTO for updating an existing user. All fields are optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub stats: Option<Vec<Stat>>,
    pub projects: Option<Vec<Project>>,
    pub activities: Option<Vec<Activity>>,
    pub skills: Option<Vec<Skill>>,
    pub location: Option<String>,
    pub title: Option<String>,
}
