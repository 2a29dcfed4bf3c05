//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which family of publishable content an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Blog,
    Project,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blog => "blog",
            Self::Project => "project",
        }
    }

    /// Storage bucket used for this kind's images.
    pub fn image_bucket(&self) -> &'static str {
        match self {
            Self::Blog => "blog-images",
            Self::Project => "project-images",
        }
    }

    /// Public page path for an item of this kind.
    pub fn public_path(&self, slug: &str) -> String {
        match self {
            Self::Blog => format!("/blog/{}", slug),
            Self::Project => format!("/projects/{}", slug),
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ContentKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "blog" => Ok(Self::Blog),
            "project" => Ok(Self::Project),
            other => Err(format!("unknown content kind '{}'", other)),
        }
    }
}

/// Blog post or project.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub kind: ContentKind,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    /// Post content or project description.
    pub body: String,
    pub image: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub featured: bool,
    pub variants: Vec<String>,
    pub download_url: Option<String>,
    pub order_index: i32,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    /// Date shown on cards: publication time, or creation time for items
    /// that were never stamped.
    pub fn display_date(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.created_at)
    }
}

/// Editor form submitted for create and full-field update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemInput {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub body: String,
    pub image: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub featured: bool,
    pub variants: Vec<String>,
    pub download_url: Option<String>,
    pub order_index: i32,
    pub published: bool,
}

/// Normalized, validated item fields ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub body: String,
    pub image: Option<String>,
    pub category: Option<String>,
    pub author: Option<String>,
    pub featured: bool,
    pub variants: Vec<String>,
    pub download_url: Option<String>,
    pub order_index: i32,
    pub published: bool,
}

/// Triage state of a contact-form submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    New,
    Read,
    Replied,
    Archived,
}

impl ContactStatus {
    pub const ALL: [ContactStatus; 4] = [Self::New, Self::Read, Self::Replied, Self::Archived];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Read => "read",
            Self::Replied => "replied",
            Self::Archived => "archived",
        }
    }
}

impl TryFrom<String> for ContactStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "new" => Ok(Self::New),
            "read" => Ok(Self::Read),
            "replied" => Ok(Self::Replied),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown contact status '{}'", other)),
        }
    }
}

/// Contact submission model
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    #[sqlx(try_from = "String")]
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub replied_at: Option<DateTime<Utc>>,
}

/// New contact submission from the public form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Admin user model
#[derive(Debug, Clone, FromRow)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// New admin user for insertion
#[derive(Debug, Clone)]
pub struct NewAdminUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub role: String,
}

/// Counters shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub blog_posts: i64,
    pub projects: i64,
    pub contact_submissions: i64,
    pub unread_contacts: i64,
}
