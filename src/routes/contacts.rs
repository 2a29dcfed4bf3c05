/**
 * Contact Routes
 * Public contact form and the admin triage inbox
 */
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::content::{contact_counts, contact_matches, validate_contact};
use crate::db::models::{ContactStatus, ContactSubmission, NewContact};
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub id: Uuid,
}

/// `status` is one of the contact statuses or `all` (the default).
#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactList {
    pub items: Vec<ContactSubmission>,
    /// Per-status totals over the whole inbox, plus `all`.
    pub counts: BTreeMap<String, usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: ContactStatus,
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<ContactStatus>, ApiError> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(other) => ContactStatus::try_from(other.to_string())
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Invalid status '{}'", other))),
    }
}

/// POST /api/contact
pub async fn submit(
    State(state): State<AppState>,
    Json(form): Json<NewContact>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let contact = validate_contact(&form)?;
    let saved = state.store.insert_contact(&contact).await?;

    tracing::info!(id = %saved.id, "contact submission received");
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            success: true,
            id: saved.id,
        }),
    ))
}

/// GET /api/admin/contacts
pub async fn list_contacts(
    State(state): State<AppState>,
    Query(params): Query<ContactQuery>,
) -> Result<Json<ContactList>, ApiError> {
    let status = parse_status_filter(params.status.as_deref())?;
    let all = state.store.list_contacts().await?;

    let mut counts: BTreeMap<String, usize> = contact_counts(&all)
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), count))
        .collect();
    counts.insert("all".to_string(), all.len());

    let search = params.search.unwrap_or_default();
    let items = all
        .into_iter()
        .filter(|c| status.map_or(true, |s| c.status == s))
        .filter(|c| contact_matches(c, &search))
        .collect();

    Ok(Json(ContactList { items, counts }))
}

/// PATCH /api/admin/contacts/{id}
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<ContactSubmission>, ApiError> {
    let contact = state.store.update_contact_status(id, update.status).await?;

    tracing::info!(id = %id, status = contact.status.as_str(), "contact status changed");
    Ok(Json(contact))
}
