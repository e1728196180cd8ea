//! Shared type definitions for the Cartograph feature workspace.
//!
//! This crate is the single source of truth for the types that cross crate
//! boundaries and the wire to the map client. Types defined here flow
//! downstream to `TypeScript` via `ts-rs` for the map front-end.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe string identifier wrappers
//! - [`geometry`] -- Coordinates, geometries, and bounding boxes
//! - [`enums`] -- Workspace kinds, notice levels, upload outcomes
//! - [`structs`] -- Features, measurements, remote records, layers
//! - [`events`] -- Render-surface events, render commands, store changes

pub mod enums;
pub mod events;
pub mod geometry;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{NoticeLevel, UploadOutcome, WorkspaceKind};
pub use events::{Notice, RenderCommand, StoreChange, SurfaceEvent};
pub use geometry::{BoundingBox, Coordinate, Geometry, GeometryKind};
pub use ids::{FeatureId, LayerId, RemoteId, SourceId, UserId};
pub use structs::{
    DrawLayer, Feature, FeaturePatch, FeatureRecord, Layer, LayerPaint, Measurements, NewFeature,
    PrimitiveStyle, RecordDraft,
};
