//! Error types for the `cartograph-core` crate.
//!
//! [`WorkspaceError`] is the taxonomy every operation reports through. None
//! of these are fatal: each failure is scoped to one feature, one layer, or
//! one load, and the workspace turns it into a user-visible notice.

use cartograph_types::{FeatureId, GeometryKind, WorkspaceKind};

use crate::remote::RemoteError;

/// Errors that can occur during workspace operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// An operation referenced an id absent from the store.
    #[error("feature not found: {0}")]
    NotFound(FeatureId),

    /// Input was rejected before any state mutation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A remote write failed. Local state is kept.
    #[error("remote write failed for feature {feature}: {source}")]
    RemoteWriteFailed {
        /// The feature whose write failed.
        feature: FeatureId,
        /// The underlying remote failure.
        source: RemoteError,
    },

    /// The initial remote load failed. The store stays empty.
    #[error("remote load failed: {0}")]
    RemoteLoadFailed(RemoteError),
}

/// Input rejected before it reached the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The uploaded file extension is not supported.
    #[error("unsupported file type: {file_name}")]
    UnsupportedFileType {
        /// The rejected file name.
        file_name: String,
    },

    /// The uploaded file has a supported type but unreadable content.
    #[error("malformed dataset in {file_name}: {reason}")]
    MalformedDataset {
        /// The rejected file name.
        file_name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A primitive is not finished (e.g. a polygon with fewer than three
    /// vertices).
    #[error("incomplete {kind} geometry: {reason}")]
    IncompleteGeometry {
        /// The geometry kind.
        kind: GeometryKind,
        /// What is missing.
        reason: String,
    },

    /// A coordinate component is NaN or infinite.
    #[error("coordinate {index} is not finite")]
    NonFiniteCoordinate {
        /// Position of the offending coordinate.
        index: usize,
    },

    /// The geometry kind does not belong in this workspace.
    #[error("{kind} geometry is not accepted by a {workspace:?} workspace")]
    WrongKind {
        /// The workspace kind.
        workspace: WorkspaceKind,
        /// The rejected geometry kind.
        kind: GeometryKind,
    },

    /// A feature id already exists in the store.
    #[error("duplicate feature id: {0}")]
    DuplicateId(FeatureId),

    /// A path point index is out of range.
    #[error("path has no point at index {index}")]
    NoSuchPoint {
        /// The requested index.
        index: usize,
    },
}
