//! Identity session authentication middleware.
//!
//! The identity provider that signs users in lives outside this service;
//! what arrives here is an opaque session token. This middleware intercepts
//! every protected request to:
//! 1. Extract the session token from the Authorization header
//! 2. Hash it and verify it maps to an active session in the store
//! 3. Inject an identity context into the request
//! 4. Reject unauthenticated requests with HTTP 401
//!
//! "No session" is a hard precondition failure: neither the registry nor the
//! scanner can be invoked without an identity context.

use crate::{error::AppError, models::session::Session, state::AppState};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Identity context attached to authenticated requests.
///
/// This struct is inserted into the request's extension map and can be
/// extracted by route handlers to know who made the request. It is also the
/// value handed to a scan session at construction: a session cannot start
/// without one.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the authenticated identity session
    pub session_id: Uuid,

    /// Email of the signed-in user making the request
    pub email: String,
}

/// Session token authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer <token>` header from request
/// 2. Hash the `<token>` using SHA-256
/// 3. Query the store for a matching hash where `is_active = true`
/// 4. If found: inject `AuthContext` into request, call next handler
/// 5. If not found: return 401 Unauthorized error
///
/// # Headers
///
/// Expected header format:
/// ```text
/// Authorization: Bearer abc123xyz
/// ```
///
/// # Arguments
///
/// * `State(state)` - Shared application state (store pool)
/// * `request` - Incoming HTTP request (mutable to add extensions)
/// * `next` - Next middleware/handler in the chain
///
/// # Returns
///
/// - `Ok(Response)` if authenticated successfully (calls next handler)
/// - `Err(AppError::InvalidSession)` if authentication fails (returns 401)
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Step 1: Extract Authorization header
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidSession)?;

    // Step 2: Extract Bearer token
    // Expected format: "Bearer <session_token>"
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidSession)?;

    // Step 3: Hash the token using SHA-256
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());

    let token_hash = hex::encode(hasher.finalize());

    // Step 4: Lookup hashed token in the store
    let session = sqlx::query_as::<_, Session>(
        "SELECT id, token_hash, email, created_at, is_active
         FROM sessions
         WHERE token_hash = $1 AND is_active = true",
    )
    .bind(&token_hash)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(AppError::InvalidSession)?;

    // Step 5: Create identity context
    let auth_context = AuthContext {
        session_id: session.id,
        email: session.email,
    };

    // Step 6: Inject context into request extensions
    // Route handlers can now extract this using Extension<AuthContext>
    request.extensions_mut().insert(auth_context);

    // Step 7: Call the next middleware/handler
    Ok(next.run(request).await)
}
