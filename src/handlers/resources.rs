//! Resource registry HTTP handlers.
//!
//! This module implements the resource-related API endpoints:
//! - POST /api/v1/resources - Register a new resource
//! - GET /api/v1/resources - List resources (search + pagination)
//! - DELETE /api/v1/resources/{id} - Delete a resource
//! - GET /api/v1/resources/{id}/code - Scannable PNG code for a resource

use crate::{
    error::AppError,
    models::resource::{NewResource, ResourceResponse},
    services::qr_codec,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Resources shown per page when the client does not ask for a count.
const DEFAULT_PAGE_SIZE: usize = 6;

/// Default side length of a generated code image, in pixels.
const DEFAULT_CODE_SIZE: u32 = 260;

/// Accepted range for the code image side length.
const CODE_SIZE_RANGE: std::ops::RangeInclusive<u32> = 64..=1024;

/// Register a new resource.
///
/// # Endpoint
///
/// `POST /api/v1/resources`
///
/// # Authentication
///
/// Requires a valid session token in the Authorization header.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Student satisfaction",
///   "description": "Term survey",        // optional
///   "url": "https://forms.example/abc"   // optional
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: Returns the created resource, including the
///   `code_payload` its QR code will encode
/// - **Error (400)**: Empty name, or a non-empty URL that is malformed
/// - **Error (401)**: Invalid session token
/// - **Error (503)**: Store unreachable
///
/// Creation does not refresh anything by itself: clients re-fetch the list
/// after a successful create.
pub async fn create_resource(
    State(state): State<AppState>,
    Json(request): Json<NewResource>,
) -> Result<(StatusCode, Json<ResourceResponse>), AppError> {
    let resource = state.store.create(request).await?;

    Ok((StatusCode::CREATED, Json(resource.into())))
}

/// Query parameters for the list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Case-insensitive substring matched against name, description and URL.
    pub search: Option<String>,

    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: usize,

    /// Page size (1-100).
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    DEFAULT_PAGE_SIZE
}

/// One page of resources plus the numbers a pager needs.
#[derive(Debug, Serialize)]
pub struct ResourceListResponse {
    pub items: Vec<ResourceResponse>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// List registered resources, newest first.
///
/// # Endpoint
///
/// `GET /api/v1/resources?search=&page=&per_page=`
///
/// # Behavior
///
/// The full newest-first list is fetched from the store, then filtered and
/// paginated in memory: `search` does a case-insensitive substring match
/// against name, description and URL; `page`/`per_page` slice the filtered
/// list (default 6 per page).
///
/// On a store error nothing is returned at all; callers keep whatever list
/// they fetched last rather than overwriting it with a partial one.
///
/// # Response
///
/// - **Success (200 OK)**: One page of resources (may be empty)
/// - **Error (401)**: Invalid session token
/// - **Error (503)**: Store unreachable
pub async fn list_resources(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ResourceListResponse>, AppError> {
    let resources = state.store.list().await?;

    let needle = params
        .search
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let filtered: Vec<_> = resources
        .into_iter()
        .filter(|r| {
            if needle.is_empty() {
                return true;
            }
            r.name.to_lowercase().contains(&needle)
                || r.description
                    .as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
                || r.url
                    .as_deref()
                    .is_some_and(|u| u.to_lowercase().contains(&needle))
        })
        .collect();

    let per_page = params.per_page.clamp(1, 100);
    let page = params.page.max(1);
    let total = filtered.len();
    let total_pages = total.div_ceil(per_page).max(1);

    let items: Vec<ResourceResponse> = filtered
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .map(Into::into)
        .collect();

    Ok(Json(ResourceListResponse {
        items,
        page,
        per_page,
        total,
        total_pages,
    }))
}

/// Delete a resource.
///
/// # Endpoint
///
/// `DELETE /api/v1/resources/{id}`
///
/// # Response
///
/// - **Success (204 No Content)**: Resource deleted
/// - **Error (404)**: No resource with that id (the store reported a
///   zero-row delete)
/// - **Error (401)**: Invalid session token
/// - **Error (503)**: Store unreachable
///
/// Ids are never reused, so codes minted for a deleted resource stop
/// validating and stay dead.
pub async fn delete_resource(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.delete_by_id(resource_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Query parameters for the code image endpoint.
#[derive(Debug, Deserialize)]
pub struct CodeParams {
    /// Side length of the produced square image in pixels (64-1024).
    #[serde(default = "default_code_size")]
    pub size: u32,
}

fn default_code_size() -> u32 {
    DEFAULT_CODE_SIZE
}

/// Render the scannable code for a resource.
///
/// # Endpoint
///
/// `GET /api/v1/resources/{id}/code?size=260`
///
/// # Behavior
///
/// Recomputes the resource's code payload (URL when present, id otherwise)
/// and renders it as a square greyscale PNG with a one-module quiet margin.
/// The same resource always produces the same image for a given size.
///
/// # Response
///
/// - **Success (200 OK)**: `image/png` body
/// - **Error (400)**: Size outside the accepted range
/// - **Error (404)**: No resource with that id
/// - **Error (500)**: The code image could not be generated; clients show a
///   pending/error presentation, never a stale image
pub async fn resource_code(
    State(state): State<AppState>,
    Path(resource_id): Path<Uuid>,
    Query(params): Query<CodeParams>,
) -> Result<impl IntoResponse, AppError> {
    if !CODE_SIZE_RANGE.contains(&params.size) {
        return Err(AppError::ValidationRejected(format!(
            "size must be between {} and {} pixels",
            CODE_SIZE_RANGE.start(),
            CODE_SIZE_RANGE.end()
        )));
    }

    let resource = state
        .store
        .find_by_id(resource_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let png = qr_codec::encode_png(&resource.code_payload(), params.size)?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}
