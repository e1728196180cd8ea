//! Feature store, edit reconciliation, layers, and persistence sync for the
//! Cartograph map workspace.
//!
//! This crate holds everything that operates on features without touching a
//! network socket or a database driver. The HTTP surface and the
//! `PostgreSQL` record store live in sibling crates and plug in through the
//! [`RemoteFeatureStore`] and [`RenderSurface`] traits.
//!
//! # Architecture
//!
//! ```text
//! SurfaceEvent / user action
//!     |
//!     +-- DrawEventReconciler / MarkerDragController
//!     |
//!     +-- FeatureStore ---- StoreChange ---+-- RenderSurface (apply_change)
//!                                          +-- PersistenceSync -> RemoteFeatureStore
//!                                          +-- UI observers
//! ```
//!
//! # Modules
//!
//! - [`codec`] -- Coordinate serialization for remote records
//! - [`config`] -- Configuration loading from YAML ([`CartographConfig`])
//! - [`drag`] -- Marker drag tracking ([`MarkerDragController`])
//! - [`error`] -- Error types ([`WorkspaceError`], [`ValidationError`])
//! - [`geometry`] -- Geodesic area, path length, and bounding boxes
//! - [`identity`] -- The signed-in user as a watched value
//! - [`layers`] -- Dataset uploads and layer visibility ([`LayerManager`])
//! - [`reconciler`] -- Surface edit events to store mutations
//! - [`remote`] -- The remote record store trait and an in-memory backend
//! - [`store`] -- The authoritative feature collection ([`FeatureStore`])
//! - [`surface`] -- The render surface trait and a command-emitting surface
//! - [`sync`] -- Versioned write-through to the remote store
//! - [`workspace`] -- The context object that wires all of the above
//!
//! [`CartographConfig`]: config::CartographConfig
//! [`MarkerDragController`]: drag::MarkerDragController
//! [`WorkspaceError`]: error::WorkspaceError
//! [`ValidationError`]: error::ValidationError
//! [`LayerManager`]: layers::LayerManager
//! [`FeatureStore`]: store::FeatureStore
//! [`RemoteFeatureStore`]: remote::RemoteFeatureStore
//! [`RenderSurface`]: surface::RenderSurface

pub mod codec;
pub mod config;
pub mod drag;
pub mod error;
pub mod geometry;
pub mod identity;
pub mod layers;
pub mod reconciler;
pub mod remote;
pub mod store;
pub mod surface;
pub mod sync;
pub mod workspace;

pub use config::CartographConfig;
pub use error::{ValidationError, WorkspaceError};
pub use identity::IdentityProvider;
pub use remote::{MemoryRemote, RemoteError, RemoteFeatureStore};
pub use store::FeatureStore;
pub use surface::{CommandSurface, RenderSurface};
pub use workspace::{Command, CommandReply, Request, Workspace, WorkspaceSnapshot};
