//! Shared application state.
//!
//! One `AppState` is built at startup and cloned into every handler and
//! middleware via Axum's `State` extraction.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    db::DbPool,
    handlers::scanner::ActiveScanner,
    services::resource_store::ResourceStore,
};

/// State shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Connection pool to the remote store; used directly by the auth
    /// middleware for session lookups.
    pub pool: DbPool,

    /// Resource store adapter used by the registry and validation paths.
    pub store: Arc<dyn ResourceStore>,

    /// The single active scan session, if any. The camera feed is
    /// exclusively owned by one session at a time, so this slot holds at
    /// most one.
    pub scanner: Arc<Mutex<Option<ActiveScanner>>>,
}
