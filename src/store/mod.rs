//! Content backend
//!
//! `ContentStore` is the query/insert/update/delete interface every page and
//! component reads through. It is constructed once at startup and injected
//! via `AppState`; `PgStore` and `MemoryStore` implement it with the same
//! filter, order and limit semantics.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::cmp::Ordering;
use std::time::Duration;
use uuid::Uuid;

use crate::db::models::{
    AdminUser, ContactStatus, ContactSubmission, ContentItem, ContentKind, DashboardStats,
    ItemDraft, NewAdminUser, NewContact,
};
use crate::error::StoreError;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result ordering for item queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOrder {
    /// Public listing: `published_at` desc, falling back to `created_at`.
    Latest,
    /// Project catalog: `order_index` asc, then `created_at` desc.
    Catalog,
    /// Admin tables: `created_at` desc.
    Newest,
}

impl ItemOrder {
    /// Natural ordering of a kind's public listing.
    pub fn public_for(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Blog => Self::Latest,
            ContentKind::Project => Self::Catalog,
        }
    }

    /// Natural ordering of a kind's admin table.
    pub fn admin_for(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Blog => Self::Newest,
            ContentKind::Project => Self::Catalog,
        }
    }

    pub fn compare(&self, a: &ContentItem, b: &ContentItem) -> Ordering {
        match self {
            Self::Latest => b
                .display_date()
                .cmp(&a.display_date())
                .then_with(|| b.created_at.cmp(&a.created_at)),
            Self::Catalog => a
                .order_index
                .cmp(&b.order_index)
                .then_with(|| b.created_at.cmp(&a.created_at)),
            Self::Newest => b.created_at.cmp(&a.created_at),
        }
    }
}

/// Filter, order and limit for `ContentStore::query_items`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemQuery {
    pub published_only: bool,
    pub category: Option<String>,
    pub search: Option<String>,
    pub order: ItemOrder,
    pub limit: Option<usize>,
}

impl ItemQuery {
    /// Published items in the kind's public order.
    pub fn published(kind: ContentKind) -> Self {
        Self {
            published_only: true,
            category: None,
            search: None,
            order: ItemOrder::public_for(kind),
            limit: None,
        }
    }

    /// Every item in the kind's admin order.
    pub fn all(kind: ContentKind) -> Self {
        Self {
            published_only: false,
            category: None,
            search: None,
            order: ItemOrder::admin_for(kind),
            limit: None,
        }
    }

    pub fn order(mut self, order: ItemOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = category.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.trim().is_empty());
        self
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Backend name for logging and health output
    fn name(&self) -> &'static str;

    async fn query_items(
        &self,
        kind: ContentKind,
        query: &ItemQuery,
    ) -> Result<Vec<ContentItem>, StoreError>;

    async fn find_item(&self, kind: ContentKind, id: Uuid)
        -> Result<Option<ContentItem>, StoreError>;

    async fn find_published_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentItem>, StoreError>;

    /// Insert a new item. A duplicate slug within the kind is a `Conflict`.
    async fn insert_item(
        &self,
        kind: ContentKind,
        draft: &ItemDraft,
    ) -> Result<ContentItem, StoreError>;

    /// Full-field update. Returns `NotFound` for an unknown id.
    async fn replace_item(
        &self,
        kind: ContentKind,
        id: Uuid,
        draft: &ItemDraft,
    ) -> Result<ContentItem, StoreError>;

    async fn set_published(
        &self,
        kind: ContentKind,
        id: Uuid,
        published: bool,
    ) -> Result<ContentItem, StoreError>;

    /// Hard delete. Returns `NotFound` for an unknown id.
    async fn delete_item(&self, kind: ContentKind, id: Uuid) -> Result<(), StoreError>;

    async fn insert_contact(&self, contact: &NewContact) -> Result<ContactSubmission, StoreError>;

    /// Every submission, newest first.
    async fn list_contacts(&self) -> Result<Vec<ContactSubmission>, StoreError>;

    async fn update_contact_status(
        &self,
        id: Uuid,
        status: ContactStatus,
    ) -> Result<ContactSubmission, StoreError>;

    async fn stats(&self) -> Result<DashboardStats, StoreError>;

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminUser>, StoreError>;

    /// Membership check in the admin-principal set.
    async fn is_admin(&self, principal_id: &str) -> Result<bool, StoreError>;

    /// Insert the admin unless one with the same e-mail already exists.
    async fn ensure_admin(&self, admin: &NewAdminUser) -> Result<AdminUser, StoreError>;

    /// Round-trip latency to the backend.
    async fn ping(&self) -> Result<Duration, StoreError>;
}
