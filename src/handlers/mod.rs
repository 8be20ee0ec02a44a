//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Performs business logic (store queries, validation)
//! 3. Returns HTTP response (JSON, status code)

/// Service health endpoint
pub mod health;
/// Resource registry endpoints
pub mod resources;
/// Payload validation endpoint
pub mod scans;
/// Scan session and frame ingestion endpoints
pub mod scanner;
