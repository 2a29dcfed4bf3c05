//! In-memory backend, used when no database is configured and in tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ContentStore, ItemQuery};
use crate::content::{apply_contact_status, item_matches, next_published_at};
use crate::db::models::{
    AdminUser, ContactStatus, ContactSubmission, ContentItem, ContentKind, DashboardStats,
    ItemDraft, NewAdminUser, NewContact,
};
use crate::error::StoreError;

#[derive(Default)]
struct Tables {
    items: HashMap<Uuid, ContentItem>,
    contacts: HashMap<Uuid, ContactSubmission>,
    admins: HashMap<Uuid, AdminUser>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert fully-formed items as-is, timestamps included.
    #[cfg(test)]
    pub(crate) async fn seed(&self, items: Vec<ContentItem>) {
        let mut tables = self.tables.write().await;
        for item in items {
            tables.items.insert(item.id, item);
        }
    }
}

fn slug_taken(tables: &Tables, kind: ContentKind, slug: &str, except: Option<Uuid>) -> bool {
    tables
        .items
        .values()
        .any(|i| i.kind == kind && i.slug == slug && Some(i.id) != except)
}

fn slug_conflict() -> StoreError {
    StoreError::Conflict("Slug already exists".to_string())
}

#[async_trait]
impl ContentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn query_items(
        &self,
        kind: ContentKind,
        query: &ItemQuery,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let tables = self.tables.read().await;
        let mut items: Vec<ContentItem> = tables
            .items
            .values()
            .filter(|i| i.kind == kind)
            .filter(|i| !query.published_only || i.published)
            .filter(|i| match &query.category {
                Some(category) => i.category.as_deref() == Some(category.as_str()),
                None => true,
            })
            .filter(|i| match &query.search {
                Some(search) => item_matches(i, search),
                None => true,
            })
            .cloned()
            .collect();

        items.sort_by(|a, b| query.order.compare(a, b));
        if let Some(limit) = query.limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn find_item(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> Result<Option<ContentItem>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.items.get(&id).filter(|i| i.kind == kind).cloned())
    }

    async fn find_published_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentItem>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .values()
            .find(|i| i.kind == kind && i.published && i.slug == slug)
            .cloned())
    }

    async fn insert_item(
        &self,
        kind: ContentKind,
        draft: &ItemDraft,
    ) -> Result<ContentItem, StoreError> {
        let mut tables = self.tables.write().await;
        if slug_taken(&tables, kind, &draft.slug, None) {
            return Err(slug_conflict());
        }

        let now = Utc::now();
        let item = ContentItem {
            id: Uuid::new_v4(),
            kind,
            slug: draft.slug.clone(),
            title: draft.title.clone(),
            excerpt: draft.excerpt.clone(),
            body: draft.body.clone(),
            image: draft.image.clone(),
            category: draft.category.clone(),
            author: draft.author.clone(),
            featured: draft.featured,
            variants: draft.variants.clone(),
            download_url: draft.download_url.clone(),
            order_index: draft.order_index,
            published: draft.published,
            created_at: now,
            published_at: next_published_at(None, draft.published, now),
            updated_at: now,
        };
        tables.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn replace_item(
        &self,
        kind: ContentKind,
        id: Uuid,
        draft: &ItemDraft,
    ) -> Result<ContentItem, StoreError> {
        let mut tables = self.tables.write().await;
        if slug_taken(&tables, kind, &draft.slug, Some(id)) {
            return Err(slug_conflict());
        }

        let item = tables
            .items
            .get_mut(&id)
            .filter(|i| i.kind == kind)
            .ok_or(StoreError::NotFound)?;

        let now = Utc::now();
        item.slug = draft.slug.clone();
        item.title = draft.title.clone();
        item.excerpt = draft.excerpt.clone();
        item.body = draft.body.clone();
        item.image = draft.image.clone();
        item.category = draft.category.clone();
        item.author = draft.author.clone();
        item.featured = draft.featured;
        item.variants = draft.variants.clone();
        item.download_url = draft.download_url.clone();
        item.order_index = draft.order_index;
        item.published = draft.published;
        item.published_at = next_published_at(item.published_at, draft.published, now);
        item.updated_at = now;
        Ok(item.clone())
    }

    async fn set_published(
        &self,
        kind: ContentKind,
        id: Uuid,
        published: bool,
    ) -> Result<ContentItem, StoreError> {
        let mut tables = self.tables.write().await;
        let item = tables
            .items
            .get_mut(&id)
            .filter(|i| i.kind == kind)
            .ok_or(StoreError::NotFound)?;

        let now = Utc::now();
        item.published = published;
        item.published_at = next_published_at(item.published_at, published, now);
        item.updated_at = now;
        Ok(item.clone())
    }

    async fn delete_item(&self, kind: ContentKind, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.items.get(&id) {
            Some(item) if item.kind == kind => {
                tables.items.remove(&id);
                Ok(())
            }
            _ => Err(StoreError::NotFound),
        }
    }

    async fn insert_contact(&self, contact: &NewContact) -> Result<ContactSubmission, StoreError> {
        let submission = ContactSubmission {
            id: Uuid::new_v4(),
            name: contact.name.clone(),
            email: contact.email.clone(),
            subject: contact.subject.clone(),
            message: contact.message.clone(),
            status: ContactStatus::New,
            created_at: Utc::now(),
            read_at: None,
            replied_at: None,
        };
        let mut tables = self.tables.write().await;
        tables.contacts.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn list_contacts(&self) -> Result<Vec<ContactSubmission>, StoreError> {
        let tables = self.tables.read().await;
        let mut contacts: Vec<ContactSubmission> = tables.contacts.values().cloned().collect();
        contacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contacts)
    }

    async fn update_contact_status(
        &self,
        id: Uuid,
        status: ContactStatus,
    ) -> Result<ContactSubmission, StoreError> {
        let mut tables = self.tables.write().await;
        let contact = tables.contacts.get_mut(&id).ok_or(StoreError::NotFound)?;
        apply_contact_status(contact, status, Utc::now());
        Ok(contact.clone())
    }

    async fn stats(&self) -> Result<DashboardStats, StoreError> {
        let tables = self.tables.read().await;
        let count_kind = |kind| tables.items.values().filter(|i| i.kind == kind).count() as i64;
        Ok(DashboardStats {
            blog_posts: count_kind(ContentKind::Blog),
            projects: count_kind(ContentKind::Project),
            contact_submissions: tables.contacts.len() as i64,
            unread_contacts: tables
                .contacts
                .values()
                .filter(|c| c.status == ContactStatus::New)
                .count() as i64,
        })
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminUser>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .admins
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn is_admin(&self, principal_id: &str) -> Result<bool, StoreError> {
        let Ok(id) = Uuid::parse_str(principal_id) else {
            return Ok(false);
        };
        let tables = self.tables.read().await;
        Ok(tables.admins.get(&id).is_some_and(|a| a.is_active))
    }

    async fn ensure_admin(&self, admin: &NewAdminUser) -> Result<AdminUser, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .admins
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(&admin.email))
        {
            return Ok(existing.clone());
        }

        let user = AdminUser {
            id: Uuid::new_v4(),
            email: admin.email.clone(),
            password_hash: admin.password_hash.clone(),
            full_name: admin.full_name.clone(),
            role: admin.role.clone(),
            is_active: true,
            created_at: Utc::now(),
        };
        tables.admins.insert(user.id, user.clone());
        Ok(user)
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        let _tables = self.tables.read().await;
        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::prepare_item;
    use crate::db::models::ItemInput;

    fn draft(kind: ContentKind, title: &str, published: bool) -> ItemDraft {
        prepare_item(
            kind,
            ItemInput {
                title: title.to_string(),
                body: "Body".to_string(),
                published,
                ..ItemInput::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_query_published_only() {
        let store = MemoryStore::new();
        store
            .insert_item(ContentKind::Blog, &draft(ContentKind::Blog, "Draft Post", false))
            .await
            .unwrap();
        let live = store
            .insert_item(ContentKind::Blog, &draft(ContentKind::Blog, "Live Post", true))
            .await
            .unwrap();
        store
            .insert_item(ContentKind::Project, &draft(ContentKind::Project, "App", true))
            .await
            .unwrap();

        let items = store
            .query_items(ContentKind::Blog, &ItemQuery::published(ContentKind::Blog))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, live.id);
        assert!(items[0].published_at.is_some());

        let all = store
            .query_items(ContentKind::Blog, &ItemQuery::all(ContentKind::Blog))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict_within_kind_only() {
        let store = MemoryStore::new();
        store
            .insert_item(ContentKind::Blog, &draft(ContentKind::Blog, "Same", false))
            .await
            .unwrap();
        let err = store
            .insert_item(ContentKind::Blog, &draft(ContentKind::Blog, "Same", false))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert!(store
            .insert_item(ContentKind::Project, &draft(ContentKind::Project, "Same", false))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_publish_stamps_once() {
        let store = MemoryStore::new();
        let item = store
            .insert_item(ContentKind::Blog, &draft(ContentKind::Blog, "Post", false))
            .await
            .unwrap();
        assert!(item.published_at.is_none());

        let published = store
            .set_published(ContentKind::Blog, item.id, true)
            .await
            .unwrap();
        let stamp = published.published_at.unwrap();

        let hidden = store
            .set_published(ContentKind::Blog, item.id, false)
            .await
            .unwrap();
        assert_eq!(hidden.published_at, Some(stamp));

        let again = store
            .replace_item(ContentKind::Blog, item.id, &draft(ContentKind::Blog, "Post", true))
            .await
            .unwrap();
        assert_eq!(again.published_at, Some(stamp));
    }

    #[tokio::test]
    async fn test_delete_is_permanent() {
        let store = MemoryStore::new();
        let item = store
            .insert_item(ContentKind::Project, &draft(ContentKind::Project, "App", true))
            .await
            .unwrap();
        store.delete_item(ContentKind::Project, item.id).await.unwrap();
        assert!(store
            .find_item(ContentKind::Project, item.id)
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            store.delete_item(ContentKind::Project, item.id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_admin_membership() {
        let store = MemoryStore::new();
        let admin = store
            .ensure_admin(&NewAdminUser {
                email: "Admin@Example.com".to_string(),
                password_hash: "hash".to_string(),
                full_name: None,
                role: "admin".to_string(),
            })
            .await
            .unwrap();

        assert!(store.is_admin(&admin.id.to_string()).await.unwrap());
        assert!(!store.is_admin(&Uuid::new_v4().to_string()).await.unwrap());
        assert!(!store.is_admin("not-a-uuid").await.unwrap());
        assert!(store
            .find_admin_by_email("admin@example.com")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_stats_count_unread_contacts() {
        let store = MemoryStore::new();
        let first = store
            .insert_contact(&NewContact {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                subject: "Hi".into(),
                message: "Hello".into(),
            })
            .await
            .unwrap();
        store
            .insert_contact(&NewContact {
                name: "Bob".into(),
                email: "bob@example.com".into(),
                subject: "Hey".into(),
                message: "Hello".into(),
            })
            .await
            .unwrap();
        store
            .update_contact_status(first.id, ContactStatus::Read)
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.contact_submissions, 2);
        assert_eq!(stats.unread_contacts, 1);
    }
}
