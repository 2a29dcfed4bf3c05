/**
 * Content rules
 * Slugs, editor input validation, publication stamping and the literal
 * substring filters used by listing pages
 */
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;

use crate::db::models::{
    ContactStatus, ContactSubmission, ContentItem, ContentKind, ItemDraft, ItemInput, NewContact,
};

/// Author stamped on blog posts submitted without one.
pub const DEFAULT_AUTHOR: &str = "eqostack Team";

lazy_static::lazy_static! {
    /// Runs of characters that cannot appear in a slug
    static ref NON_SLUG_RUN: Regex = Regex::new(r"[^a-z0-9]+").unwrap();

    /// Valid slug pattern: lowercase letters, numbers, and single hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// Derive a URL-safe slug from a title: lowercase, collapse every run of
/// non-alphanumeric characters to one hyphen, trim hyphens at both ends.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    NON_SLUG_RUN
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Rejected editor input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate and normalize an editor form into the fields that get stored.
pub fn prepare_item(kind: ContentKind, input: ItemInput) -> Result<ItemDraft, ValidationError> {
    let title = input.title.trim().to_string();
    if title.is_empty() {
        return Err(ValidationError("Title is required".to_string()));
    }

    let body = input.body.trim().to_string();
    if body.is_empty() {
        let field = match kind {
            ContentKind::Blog => "Content",
            ContentKind::Project => "Description",
        };
        return Err(ValidationError(format!("{} is required", field)));
    }

    let slug = match non_blank(input.slug) {
        Some(explicit) => slugify(&explicit),
        None => slugify(&title),
    };
    if slug.is_empty() {
        return Err(ValidationError(
            "Slug must contain at least one letter or number".to_string(),
        ));
    }

    let mut variants: Vec<String> = Vec::new();
    for variant in input.variants {
        let variant = variant.trim();
        if !variant.is_empty() && !variants.iter().any(|v| v == variant) {
            variants.push(variant.to_string());
        }
    }

    let author = match kind {
        ContentKind::Blog => {
            Some(non_blank(input.author).unwrap_or_else(|| DEFAULT_AUTHOR.to_string()))
        }
        ContentKind::Project => non_blank(input.author),
    };

    Ok(ItemDraft {
        slug,
        title,
        excerpt: non_blank(input.excerpt),
        body,
        image: non_blank(input.image),
        category: non_blank(input.category),
        author,
        featured: input.featured,
        variants,
        download_url: non_blank(input.download_url),
        order_index: input.order_index,
        published: input.published,
    })
}

/// `published_at` after a write: stamped on the first publish only and
/// kept when an item is unpublished.
pub fn next_published_at(
    current: Option<DateTime<Utc>>,
    published: bool,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match current {
        Some(stamp) => Some(stamp),
        None if published => Some(now),
        None => None,
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Literal, case-insensitive substring match over title, excerpt and category.
pub fn item_matches(item: &ContentItem, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    contains_ci(&item.title, &needle)
        || item.excerpt.as_deref().is_some_and(|e| contains_ci(e, &needle))
        || item.category.as_deref().is_some_and(|c| contains_ci(c, &needle))
}

/// Validate a public contact-form submission.
pub fn validate_contact(contact: &NewContact) -> Result<NewContact, ValidationError> {
    let cleaned = NewContact {
        name: contact.name.trim().to_string(),
        email: contact.email.trim().to_string(),
        subject: contact.subject.trim().to_string(),
        message: contact.message.trim().to_string(),
    };

    for (field, value) in [
        ("Name", &cleaned.name),
        ("Email", &cleaned.email),
        ("Subject", &cleaned.subject),
        ("Message", &cleaned.message),
    ] {
        if value.is_empty() {
            return Err(ValidationError(format!("{} is required", field)));
        }
    }

    if !cleaned.email.contains('@') {
        return Err(ValidationError("Invalid email format".to_string()));
    }

    Ok(cleaned)
}

/// Move a submission to `status`, stamping `read_at` the first time it is
/// read and `replied_at` every time it is marked replied.
pub fn apply_contact_status(
    contact: &mut ContactSubmission,
    status: ContactStatus,
    now: DateTime<Utc>,
) {
    contact.status = status;
    match status {
        ContactStatus::Read if contact.read_at.is_none() => contact.read_at = Some(now),
        ContactStatus::Replied => contact.replied_at = Some(now),
        _ => {}
    }
}

/// Literal, case-insensitive substring match over every text field of a
/// submission.
pub fn contact_matches(contact: &ContactSubmission, search: &str) -> bool {
    let needle = search.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    [
        &contact.name,
        &contact.email,
        &contact.subject,
        &contact.message,
    ]
    .iter()
    .any(|field| contains_ci(field, &needle))
}

/// Number of submissions per status, with every status present.
pub fn contact_counts(contacts: &[ContactSubmission]) -> HashMap<ContactStatus, usize> {
    let mut counts: HashMap<ContactStatus, usize> =
        ContactStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for contact in contacts {
        *counts.entry(contact.status).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn input(title: &str, body: &str) -> ItemInput {
        ItemInput {
            title: title.to_string(),
            body: body.to_string(),
            ..ItemInput::default()
        }
    }

    fn contact(name: &str, subject: &str, status: ContactStatus) -> ContactSubmission {
        ContactSubmission {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            subject: subject.to_string(),
            message: "Hello there".to_string(),
            status,
            created_at: Utc::now(),
            read_at: None,
            replied_at: None,
        }
    }

    #[test]
    fn test_slugify_collapses_runs_and_trims() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
        assert_eq!(slugify("  --Mobile Money -- Revolution--  "), "mobile-money-revolution");
        assert_eq!(slugify("Rust & Go: 2024 Edition"), "rust-go-2024-edition");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_output_is_valid_slug() {
        for title in ["The Future of Tech in Africa", "a", "Cloud   Infra 101"] {
            assert!(is_valid_slug(&slugify(title)), "{}", title);
        }
        assert!(!is_valid_slug("Has Spaces"));
        assert!(!is_valid_slug("-leading"));
    }

    #[test]
    fn test_prepare_item_derives_slug_and_default_author() {
        let draft = prepare_item(ContentKind::Blog, input("Building Scalable Cloud", "Body"))
            .unwrap();
        assert_eq!(draft.slug, "building-scalable-cloud");
        assert_eq!(draft.author.as_deref(), Some(DEFAULT_AUTHOR));
        assert!(!draft.published);
    }

    #[test]
    fn test_prepare_item_normalizes_explicit_slug() {
        let mut form = input("Title", "Body");
        form.slug = Some("My Custom Slug".to_string());
        let draft = prepare_item(ContentKind::Blog, form).unwrap();
        assert_eq!(draft.slug, "my-custom-slug");
    }

    #[test]
    fn test_prepare_item_requires_title_and_body() {
        assert_eq!(
            prepare_item(ContentKind::Blog, input("  ", "Body")).unwrap_err().0,
            "Title is required"
        );
        assert_eq!(
            prepare_item(ContentKind::Project, input("App", "")).unwrap_err().0,
            "Description is required"
        );
        assert!(prepare_item(ContentKind::Blog, input("???", "Body")).is_err());
    }

    #[test]
    fn test_prepare_project_dedupes_variants() {
        let mut form = input("Task Manager", "A mobile app");
        form.variants = vec![" iOS ".into(), "Android".into(), "iOS".into(), "".into()];
        let draft = prepare_item(ContentKind::Project, form).unwrap();
        assert_eq!(draft.variants, vec!["iOS".to_string(), "Android".to_string()]);
        assert_eq!(draft.author, None);
    }

    #[test]
    fn test_published_at_stamped_on_first_publish_only() {
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        assert_eq!(next_published_at(None, false, first), None);
        assert_eq!(next_published_at(None, true, first), Some(first));
        assert_eq!(next_published_at(Some(first), true, later), Some(first));
        assert_eq!(next_published_at(Some(first), false, later), Some(first));
    }

    #[test]
    fn test_contact_validation() {
        let mut form = NewContact {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            subject: "Hi".into(),
            message: "Hello".into(),
        };
        assert!(validate_contact(&form).is_ok());

        form.email = "not-an-email".into();
        assert_eq!(validate_contact(&form).unwrap_err().0, "Invalid email format");

        form.message = "   ".into();
        assert_eq!(validate_contact(&form).unwrap_err().0, "Message is required");
    }

    #[test]
    fn test_contact_status_stamps() {
        let now = Utc::now();
        let mut submission = contact("Ada", "Hi", ContactStatus::New);

        apply_contact_status(&mut submission, ContactStatus::Read, now);
        assert_eq!(submission.read_at, Some(now));

        let later = now + chrono::Duration::minutes(5);
        apply_contact_status(&mut submission, ContactStatus::Read, later);
        assert_eq!(submission.read_at, Some(now));

        apply_contact_status(&mut submission, ContactStatus::Replied, later);
        assert_eq!(submission.status, ContactStatus::Replied);
        assert_eq!(submission.replied_at, Some(later));
    }

    #[test]
    fn test_contact_search_is_literal_and_case_insensitive() {
        let submission = contact("Grace", "Partnership (Q3)", ContactStatus::New);
        assert!(contact_matches(&submission, "partnership (q3"));
        assert!(contact_matches(&submission, "GRACE@"));
        assert!(!contact_matches(&submission, "partner.*"));
        assert!(contact_matches(&submission, ""));
    }

    #[test]
    fn test_contact_counts_cover_every_status() {
        let contacts = vec![
            contact("A", "x", ContactStatus::New),
            contact("B", "y", ContactStatus::New),
            contact("C", "z", ContactStatus::Archived),
        ];
        let counts = contact_counts(&contacts);
        assert_eq!(counts[&ContactStatus::New], 2);
        assert_eq!(counts[&ContactStatus::Read], 0);
        assert_eq!(counts[&ContactStatus::Archived], 1);
    }
}
