//! Type-safe identifier wrappers.
//!
//! Identifiers in the workspace come from three different owners: the render
//! surface names drawn primitives, the remote document store names records,
//! and the identity provider names users. All of them arrive as opaque
//! strings, so every wrapper holds a [`String`] and the compiler keeps them
//! from being mixed up.
//!
//! [`FeatureId::generate`] exists for features the workspace creates itself
//! (markers added at the map center, path features). It uses UUID v7 so
//! generated ids sort by creation time.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`String`] with standard derives.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Return the inner [`String`] value.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

define_key! {
    /// Identifier of a feature. Equal to the render-surface primitive id so
    /// later edit events correlate back to the same feature.
    FeatureId
}

define_key! {
    /// Identifier assigned by the remote document store to a record.
    RemoteId
}

define_key! {
    /// Identifier of an authenticated user, as supplied by the identity provider.
    UserId
}

define_key! {
    /// Identifier of an uploaded dataset layer.
    LayerId
}

define_key! {
    /// Identifier of a dataset source registered on the render surface.
    SourceId
}

impl FeatureId {
    /// Generate a fresh identifier using UUID v7 (time-ordered).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl From<RemoteId> for FeatureId {
    /// Features loaded from the remote store are keyed by their record id.
    fn from(id: RemoteId) -> Self {
        Self(id.0)
    }
}
