use thiserror::Error;

/// Errors surfaced by snapshot serialization.
///
/// The render graph itself never raises: missing lookups and out-of-range
/// values resolve to neutral no-ops or saturating clamps. Only the optional
/// JSON codec for snapshots is fallible.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot could not be encoded to or decoded from JSON
    #[error("snapshot serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A value was present under the key but had the wrong variant
    #[error("snapshot key `{key}` holds {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}
