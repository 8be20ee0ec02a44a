//! Data models representing store entities.
//!
//! This module contains all data structures that map to remote store
//! collections.

/// Registered resource model
pub mod resource;
/// Identity session model
pub mod session;
