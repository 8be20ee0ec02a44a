//! Identity session model for authentication.
//!
//! Sessions are issued by the external identity provider; this service only
//! reads them. Tokens are stored as SHA-256 hashes.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents an identity session record from the store.
///
/// # Remote Collection
///
/// Maps to the `sessions` table with columns:
/// - `id`: Unique identifier (UUID)
/// - `token_hash`: SHA-256 hash of the session token
/// - `email`: Address of the signed-in user
/// - `created_at`: When the session was issued
/// - `is_active`: Whether the session is currently valid
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    /// Unique identifier for this session
    pub id: Uuid,

    /// SHA-256 hash of the actual session token (64 hex characters)
    ///
    /// When a request comes in with "Bearer abc123", we:
    /// 1. Hash "abc123" with SHA-256
    /// 2. Look up this hash in the store
    /// 3. If found and active, the request carries an identity context
    pub token_hash: String,

    /// Email address of the user this session belongs to
    pub email: String,

    /// Timestamp when this session was issued
    pub created_at: DateTime<Utc>,

    /// Whether this session is currently active
    ///
    /// Inactive sessions are rejected. The identity provider flips this off
    /// on sign-out without deleting the record.
    pub is_active: bool,
}
