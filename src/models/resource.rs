//! Resource data models and API request/response types.
//!
//! This module defines:
//! - `Resource`: Store entity representing a registered resource
//! - `NewResource`: Request body for registering resources
//! - `ResourceResponse`: Response body returned to clients
//!
//! A resource is the unit of registration: a named record, optionally
//! carrying an external URL (e.g. a form link), for which the service mints
//! a scannable QR code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Represents a resource record from the store.
///
/// # Remote Collection
///
/// Maps to the `recursos` collection. The remote columns keep their original
/// names (`nombre`, `descripcion`); the Rust fields use English names and are
/// matched up via `sqlx` renames.
///
/// # Lifecycle
///
/// Resources are created by explicit submission, read via list queries, and
/// deleted by explicit action. There is no update operation: a record is
/// never modified in place, so its `id` and `url`, and therefore its code
/// payload, stay stable for its whole life.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Resource {
    /// Unique identifier, assigned by the store at creation, immutable.
    ///
    /// Never reused after deletion (store-generated v4 UUIDs).
    pub id: Uuid,

    /// Human-readable display name. Always non-empty: empty submissions are
    /// rejected before reaching the store.
    #[sqlx(rename = "nombre")]
    pub name: String,

    /// Optional free-text description.
    #[sqlx(rename = "descripcion")]
    pub description: Option<String>,

    /// Optional canonical external target (e.g. a form link). When present,
    /// it is the string embedded in the resource's QR code.
    pub url: Option<String>,

    /// Timestamp assigned by the store, used for newest-first ordering.
    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// The string embedded in this resource's scannable code.
    ///
    /// The `url` when present and non-empty, otherwise the canonical string
    /// form of the `id`. Derived, never stored: recomputing it for an
    /// unchanged record always yields the same payload, so the same resource
    /// always renders the same code.
    pub fn code_payload(&self) -> String {
        match self.url.as_deref() {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => self.id.to_string(),
        }
    }
}

/// Request body for registering a new resource.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Student satisfaction",
///   "description": "Term survey",
///   "url": "https://forms.example/abc"
/// }
/// ```
///
/// # Validation
///
/// - `name`: Required, must be non-empty
/// - `description`: Optional, may be empty
/// - `url`: Optional; when non-empty it must be a well-formed http(s) URL
#[derive(Debug, Clone, Deserialize)]
pub struct NewResource {
    /// Display name for the new resource
    pub name: String,

    /// Free-text description (defaults to empty)
    #[serde(default)]
    pub description: String,

    /// External target URL (defaults to empty, meaning "none")
    #[serde(default)]
    pub url: String,
}

impl NewResource {
    /// Check the submission before it is allowed anywhere near the store.
    ///
    /// # Errors
    ///
    /// Returns `ValidationRejected` if the name is empty or a non-empty URL
    /// is not a well-formed http(s) URL.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.is_empty() {
            return Err(AppError::ValidationRejected(
                "The resource name is required".to_string(),
            ));
        }

        if !self.url.is_empty() {
            let parsed = url::Url::parse(&self.url).map_err(|_| {
                AppError::ValidationRejected("The URL is not well-formed".to_string())
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::ValidationRejected(
                    "The URL must use HTTP or HTTPS".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Description as persisted: empty submissions become NULL.
    pub fn description_or_none(&self) -> Option<&str> {
        (!self.description.is_empty()).then_some(self.description.as_str())
    }

    /// URL as persisted: empty submissions become NULL.
    pub fn url_or_none(&self) -> Option<&str> {
        (!self.url.is_empty()).then_some(self.url.as_str())
    }
}

/// Response body for resource endpoints.
///
/// This struct is returned to API clients.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "name": "Student satisfaction",
///   "description": "Term survey",
///   "url": "https://forms.example/abc",
///   "code_payload": "https://forms.example/abc",
///   "created_at": "2025-12-20T10:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ResourceResponse {
    /// Resource unique identifier
    pub id: Uuid,

    /// Resource name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Optional external target URL
    pub url: Option<String>,

    /// The exact string a QR code for this resource encodes; clients can
    /// render their own codes from it
    pub code_payload: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Convert store Resource to API ResourceResponse.
///
/// Adds the derived `code_payload` alongside the stored fields.
impl From<Resource> for ResourceResponse {
    fn from(resource: Resource) -> Self {
        let code_payload = resource.code_payload();
        Self {
            id: resource.id,
            name: resource.name,
            description: resource.description,
            url: resource.url,
            code_payload,
            created_at: resource.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(url: Option<&str>) -> Resource {
        Resource {
            id: Uuid::new_v4(),
            name: "Satisfaction".to_string(),
            description: None,
            url: url.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn payload_prefers_url_when_present() {
        let r = resource(Some("https://forms.example/abc"));
        assert_eq!(r.code_payload(), "https://forms.example/abc");
    }

    #[test]
    fn payload_falls_back_to_id_without_url() {
        let r = resource(None);
        assert_eq!(r.code_payload(), r.id.to_string());

        // An empty URL counts as absent.
        let r = resource(Some(""));
        assert_eq!(r.code_payload(), r.id.to_string());
    }

    #[test]
    fn payload_is_stable_across_recomputation() {
        let r = resource(Some("https://forms.example/abc"));
        assert_eq!(r.code_payload(), r.code_payload());
    }

    #[test]
    fn empty_name_is_rejected() {
        let new = NewResource {
            name: String::new(),
            description: "whatever".to_string(),
            url: String::new(),
        };
        assert!(matches!(
            new.validate(),
            Err(AppError::ValidationRejected(_))
        ));
    }

    #[test]
    fn malformed_url_is_rejected() {
        let new = NewResource {
            name: "Exit Poll".to_string(),
            description: String::new(),
            url: "not a url".to_string(),
        };
        assert!(matches!(
            new.validate(),
            Err(AppError::ValidationRejected(_))
        ));

        let new = NewResource {
            name: "Exit Poll".to_string(),
            description: String::new(),
            url: "ftp://forms.example/abc".to_string(),
        };
        assert!(matches!(
            new.validate(),
            Err(AppError::ValidationRejected(_))
        ));
    }

    #[test]
    fn valid_submission_passes() {
        let new = NewResource {
            name: "Exit Poll".to_string(),
            description: String::new(),
            url: "https://forms.example/abc".to_string(),
        };
        assert!(new.validate().is_ok());
        assert_eq!(new.description_or_none(), None);
        assert_eq!(new.url_or_none(), Some("https://forms.example/abc"));
    }
}
