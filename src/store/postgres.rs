//! Postgres backend over a shared `PgPool`.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::Duration;
use uuid::Uuid;

use super::{ContentStore, ItemOrder, ItemQuery};
use crate::db::{
    self,
    models::{
        AdminUser, ContactStatus, ContactSubmission, ContentItem, ContentKind, DashboardStats,
        ItemDraft, NewAdminUser, NewContact,
    },
};
use crate::error::StoreError;

const ITEM_COLUMNS: &str = "id, kind, slug, title, excerpt, body, image, category, author, \
     featured, variants, download_url, order_index, published, created_at, published_at, updated_at";

const CONTACT_COLUMNS: &str =
    "id, name, email, subject, message, status, created_at, read_at, replied_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn order_clause(order: ItemOrder) -> &'static str {
    match order {
        ItemOrder::Latest => " ORDER BY COALESCE(published_at, created_at) DESC, created_at DESC",
        ItemOrder::Catalog => " ORDER BY order_index ASC, created_at DESC",
        ItemOrder::Newest => " ORDER BY created_at DESC",
    }
}

/// Unique violations on `(kind, slug)` surface as a conflict.
fn map_write_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict("Slug already exists".to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl ContentStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn query_items(
        &self,
        kind: ContentKind,
        query: &ItemQuery,
    ) -> Result<Vec<ContentItem>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM content_items WHERE kind = ", ITEM_COLUMNS));
        builder.push_bind(kind.as_str());

        if query.published_only {
            builder.push(" AND published = true");
        }
        if let Some(category) = &query.category {
            builder.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(search) = &query.search {
            // strpos keeps the match literal; LIKE would treat % and _ as wildcards
            let needle = search.trim().to_lowercase();
            builder
                .push(" AND (strpos(lower(title), ")
                .push_bind(needle.clone())
                .push(") > 0 OR strpos(lower(COALESCE(excerpt, '')), ")
                .push_bind(needle.clone())
                .push(") > 0 OR strpos(lower(COALESCE(category, '')), ")
                .push_bind(needle)
                .push(") > 0)");
        }

        builder.push(order_clause(query.order));

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let items = builder
            .build_query_as::<ContentItem>()
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn find_item(
        &self,
        kind: ContentKind,
        id: Uuid,
    ) -> Result<Option<ContentItem>, StoreError> {
        let item = sqlx::query_as::<_, ContentItem>(&format!(
            "SELECT {} FROM content_items WHERE kind = $1 AND id = $2",
            ITEM_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn find_published_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentItem>, StoreError> {
        let item = sqlx::query_as::<_, ContentItem>(&format!(
            "SELECT {} FROM content_items WHERE kind = $1 AND slug = $2 AND published = true",
            ITEM_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn insert_item(
        &self,
        kind: ContentKind,
        draft: &ItemDraft,
    ) -> Result<ContentItem, StoreError> {
        sqlx::query_as::<_, ContentItem>(&format!(
            r#"
            INSERT INTO content_items
                (kind, slug, title, excerpt, body, image, category, author, featured,
                 variants, download_url, order_index, published, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    CASE WHEN $13 THEN now() ELSE NULL END)
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(&draft.slug)
        .bind(&draft.title)
        .bind(&draft.excerpt)
        .bind(&draft.body)
        .bind(&draft.image)
        .bind(&draft.category)
        .bind(&draft.author)
        .bind(draft.featured)
        .bind(&draft.variants)
        .bind(&draft.download_url)
        .bind(draft.order_index)
        .bind(draft.published)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn replace_item(
        &self,
        kind: ContentKind,
        id: Uuid,
        draft: &ItemDraft,
    ) -> Result<ContentItem, StoreError> {
        sqlx::query_as::<_, ContentItem>(&format!(
            r#"
            UPDATE content_items SET
                slug = $3, title = $4, excerpt = $5, body = $6, image = $7,
                category = $8, author = $9, featured = $10, variants = $11,
                download_url = $12, order_index = $13, published = $14,
                published_at = CASE WHEN $14 AND published_at IS NULL THEN now()
                                    ELSE published_at END,
                updated_at = now()
            WHERE kind = $1 AND id = $2
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(id)
        .bind(&draft.slug)
        .bind(&draft.title)
        .bind(&draft.excerpt)
        .bind(&draft.body)
        .bind(&draft.image)
        .bind(&draft.category)
        .bind(&draft.author)
        .bind(draft.featured)
        .bind(&draft.variants)
        .bind(&draft.download_url)
        .bind(draft.order_index)
        .bind(draft.published)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?
        .ok_or(StoreError::NotFound)
    }

    async fn set_published(
        &self,
        kind: ContentKind,
        id: Uuid,
        published: bool,
    ) -> Result<ContentItem, StoreError> {
        sqlx::query_as::<_, ContentItem>(&format!(
            r#"
            UPDATE content_items SET
                published = $3,
                published_at = CASE WHEN $3 AND published_at IS NULL THEN now()
                                    ELSE published_at END,
                updated_at = now()
            WHERE kind = $1 AND id = $2
            RETURNING {}
            "#,
            ITEM_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(id)
        .bind(published)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_item(&self, kind: ContentKind, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM content_items WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_contact(&self, contact: &NewContact) -> Result<ContactSubmission, StoreError> {
        let submission = sqlx::query_as::<_, ContactSubmission>(&format!(
            r#"
            INSERT INTO contact_submissions (name, email, subject, message)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            CONTACT_COLUMNS
        ))
        .bind(&contact.name)
        .bind(&contact.email)
        .bind(&contact.subject)
        .bind(&contact.message)
        .fetch_one(&self.pool)
        .await?;
        Ok(submission)
    }

    async fn list_contacts(&self) -> Result<Vec<ContactSubmission>, StoreError> {
        let contacts = sqlx::query_as::<_, ContactSubmission>(&format!(
            "SELECT {} FROM contact_submissions ORDER BY created_at DESC",
            CONTACT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(contacts)
    }

    async fn update_contact_status(
        &self,
        id: Uuid,
        status: ContactStatus,
    ) -> Result<ContactSubmission, StoreError> {
        sqlx::query_as::<_, ContactSubmission>(&format!(
            r#"
            UPDATE contact_submissions SET
                status = $2,
                read_at = CASE WHEN $2 = 'read' AND read_at IS NULL THEN now() ELSE read_at END,
                replied_at = CASE WHEN $2 = 'replied' THEN now() ELSE replied_at END
            WHERE id = $1
            RETURNING {}
            "#,
            CONTACT_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn stats(&self) -> Result<DashboardStats, StoreError> {
        let (blog_posts, projects, contact_submissions, unread_contacts): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM content_items WHERE kind = 'blog'),
                    (SELECT COUNT(*) FROM content_items WHERE kind = 'project'),
                    (SELECT COUNT(*) FROM contact_submissions),
                    (SELECT COUNT(*) FROM contact_submissions WHERE status = 'new')
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(DashboardStats {
            blog_posts,
            projects,
            contact_submissions,
            unread_contacts,
        })
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminUser>, StoreError> {
        let admin = sqlx::query_as::<_, AdminUser>(
            r#"
            SELECT id, email, password_hash, full_name, role, is_active, created_at
            FROM admin_users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(admin)
    }

    async fn is_admin(&self, principal_id: &str) -> Result<bool, StoreError> {
        let Ok(id) = Uuid::parse_str(principal_id) else {
            return Ok(false);
        };
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM admin_users WHERE id = $1 AND is_active = true")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn ensure_admin(&self, admin: &NewAdminUser) -> Result<AdminUser, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO admin_users (email, password_hash, full_name, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(&admin.full_name)
        .bind(&admin.role)
        .execute(&self.pool)
        .await?;

        self.find_admin_by_email(&admin.email)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        Ok(db::health_check(&self.pool).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_clauses() {
        assert!(order_clause(ItemOrder::Latest).contains("COALESCE(published_at, created_at) DESC"));
        assert!(order_clause(ItemOrder::Catalog).starts_with(" ORDER BY order_index ASC"));
        assert_eq!(order_clause(ItemOrder::Newest), " ORDER BY created_at DESC");
    }

    #[test]
    fn test_non_unique_errors_stay_database_errors() {
        assert!(matches!(
            map_write_error(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }
}
