//! Scan validation - resolving decoded payloads back to resources.
//!
//! Given the text read out of a scanned code, decide which registered
//! resource (if any) it identifies. The engine is stateless and read-only:
//! each call performs at most two store lookups and nothing else, and no
//! result is cached between calls: rescanning the same code repeats both
//! lookups against current store contents.

use uuid::Uuid;

use crate::{error::AppError, services::resource_store::ResourceStore};

/// Outcome of resolving one scanned payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanResolution {
    /// The payload identifies this registered resource.
    Matched(crate::models::resource::Resource),

    /// No registered resource matches the payload. A valid terminal
    /// outcome, not an error.
    Unresolved,
}

/// Resolve a decoded payload to zero or one resource.
///
/// # Lookup Order
///
/// 1. If the payload parses as a UUID, look it up by id. A hit terminates.
/// 2. Otherwise (or on a miss), look the raw payload up by URL. A hit
///    terminates.
/// 3. Neither matched: `Unresolved`.
///
/// The id lookup runs first on purpose: ids are guaranteed unique, so an id
/// match is authoritative. A URL match is a secondary heuristic: several
/// resources could share a URL, in which case the first store-returned match
/// wins.
///
/// # Errors
///
/// `StoreUnavailable` if either lookup cannot reach the store.
pub async fn resolve_payload(
    store: &dyn ResourceStore,
    payload: &str,
) -> Result<ScanResolution, AppError> {
    // 1) Try by id. Text that is not even a UUID cannot be an id match.
    if let Ok(id) = Uuid::parse_str(payload) {
        if let Some(resource) = store.find_by_id(id).await? {
            return Ok(ScanResolution::Matched(resource));
        }
    }

    // 2) Fall back to the URL lookup on the raw text
    if let Some(resource) = store.find_by_url(payload).await? {
        return Ok(ScanResolution::Matched(resource));
    }

    Ok(ScanResolution::Unresolved)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::{
        models::resource::NewResource,
        services::resource_store::testing::MemoryStore,
    };

    fn submission(name: &str, url: &str) -> NewResource {
        NewResource {
            name: name.to_string(),
            description: String::new(),
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn resolves_by_id_when_resource_has_no_url() {
        let store = MemoryStore::new();
        let created = store.create(submission("Satisfaction", "")).await.unwrap();

        let resolution = resolve_payload(&store, &created.id.to_string())
            .await
            .unwrap();
        match resolution {
            ScanResolution::Matched(r) => assert_eq!(r.name, "Satisfaction"),
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolves_by_url_when_id_lookup_misses() {
        let store = MemoryStore::new();
        store
            .create(submission("Exit Poll", "https://forms.example/abc"))
            .await
            .unwrap();

        let resolution = resolve_payload(&store, "https://forms.example/abc")
            .await
            .unwrap();
        match resolution {
            ScanResolution::Matched(r) => assert_eq!(r.name, "Exit Poll"),
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn id_match_wins_over_url_match_for_the_same_text() {
        let store = MemoryStore::new();
        let owner = store.create(submission("Owner", "")).await.unwrap();
        // A second resource whose URL is literally the first one's id
        store
            .create(submission("Squatter", &owner.id.to_string()))
            .await
            .unwrap();

        let resolution = resolve_payload(&store, &owner.id.to_string())
            .await
            .unwrap();
        match resolution {
            ScanResolution::Matched(r) => assert_eq!(r.name, "Owner"),
            other => panic!("expected the id match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_payload_is_unresolved_and_writes_nothing() {
        let store = MemoryStore::new();
        store.create(submission("Satisfaction", "")).await.unwrap();
        let writes_before = store.writes.load(Ordering::SeqCst);

        // Twice on purpose: each call is independent and side-effect-free
        for _ in 0..2 {
            let resolution = resolve_payload(&store, "not-a-real-id").await.unwrap();
            assert_eq!(resolution, ScanResolution::Unresolved);
        }

        assert_eq!(store.writes.load(Ordering::SeqCst), writes_before);
    }

    #[tokio::test]
    async fn url_matching_is_exact_with_no_normalization() {
        let store = MemoryStore::new();
        store
            .create(submission("Exit Poll", "https://forms.example/abc"))
            .await
            .unwrap();

        // Trailing slash, case changes, and padding are all different strings
        for near_miss in [
            "https://forms.example/abc/",
            "HTTPS://forms.example/abc",
            " https://forms.example/abc",
        ] {
            let resolution = resolve_payload(&store, near_miss).await.unwrap();
            assert_eq!(resolution, ScanResolution::Unresolved, "{near_miss}");
        }
    }

    #[tokio::test]
    async fn deleted_resource_no_longer_resolves() {
        let store = MemoryStore::new();
        let created = store.create(submission("Satisfaction", "")).await.unwrap();
        store.delete_by_id(created.id).await.unwrap();

        let resolution = resolve_payload(&store, &created.id.to_string())
            .await
            .unwrap();
        assert_eq!(resolution, ScanResolution::Unresolved);
    }

    #[tokio::test]
    async fn store_outage_surfaces_as_an_error() {
        let store = MemoryStore::new();
        store.unavailable.store(true, Ordering::SeqCst);

        let err = resolve_payload(&store, "not-a-real-id").await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }
}
