//! Public error type for the `AnnIndex` trait surface.
//!
//! Internal plumbing (storage, mmap layout, graph traversal) keeps using
//! `anyhow::Result` throughout; `AnnError` exists only at the boundary the
//! `AnnIndex` trait exposes to callers outside this crate, where a stable,
//! matchable error type is worth the extra layer.

use thiserror::Error;

/// Errors an `AnnIndex` operation can return.
#[derive(Debug, Error)]
pub enum AnnError {
    /// A build/query parameter was invalid (e.g. `numPrefix > numPivot`,
    /// `k == 0` where zero isn't meaningful, dimension mismatch).
    #[error("invalid parameter: {0}")]
    Parameter(String),

    /// An operation attempted to mutate data in a way the index doesn't
    /// support online (e.g. inserting into a built NAPP index, which only
    /// supports full rebuilds).
    #[error("data mutation error: {0}")]
    DataMutation(String),

    /// The on-disk format failed a validation check (bad magic, truncated
    /// file, checksum mismatch, dimension mismatch between file and request).
    #[error("corrupted index: {0}")]
    Corruption(String),

    /// A requested capability isn't implemented for this index family or
    /// configuration (e.g. range search on NAPP, Delaunay type 2 pruning).
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The configured `Space` could not compute a distance for the given
    /// inputs (dimension mismatch, non-finite result).
    #[error("distance computation error: {0}")]
    Distance(String),
}

/// Internal marker carried inside an `anyhow::Error` so the conversion below
/// can tell "a space returned a non-finite distance" apart from ordinary
/// corruption, without internal plumbing switching off `anyhow::Result`
/// everywhere. Construct with `anyhow::Error::new(NonFiniteDistance(..))`,
/// not wrapped in `.context(..)`, so the exact-type downcast below matches.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub(crate) struct NonFiniteDistance(pub String);

impl From<anyhow::Error> for AnnError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<NonFiniteDistance>() {
            Ok(marker) => AnnError::Distance(marker.0),
            // Internal plumbing doesn't otherwise tag its errors by kind, so
            // a corruption-shaped default is the least surprising: most
            // anyhow errors crossing this boundary originate from
            // storage/mmap validation.
            Err(err) => AnnError::Corruption(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anyhow_conversion_preserves_message() {
        let source = anyhow::anyhow!("bad header magic");
        let err: AnnError = source.into();
        assert!(matches!(err, AnnError::Corruption(_)));
        assert!(err.to_string().contains("bad header magic"));
    }

    #[test]
    fn test_non_finite_distance_marker_converts_to_distance_variant() {
        let source = anyhow::Error::new(NonFiniteDistance("distance to node 3 was NaN".into()));
        let err: AnnError = source.into();
        assert!(matches!(err, AnnError::Distance(_)));
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AnnError::Parameter("numPrefix > numPivot".into()).to_string(),
            "invalid parameter: numPrefix > numPivot"
        );
        assert_eq!(
            AnnError::Unsupported("range search on NAPP".into()).to_string(),
            "unsupported operation: range search on NAPP"
        );
    }
}
