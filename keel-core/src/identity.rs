//! Identity types for Keel entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Common behavior of the strongly-typed entity identifiers.
pub trait EntityIdType: Copy + Eq + std::hash::Hash + fmt::Display {
    /// Wrap a raw UUID.
    fn new(uuid: Uuid) -> Self;

    /// Borrow the raw UUID.
    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh timestamp-sortable id.
    fn now_v7() -> Self {
        Self::new(new_entity_id())
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap a raw UUID.
            pub const fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The nil id, used as a placeholder in tests and error messages.
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Borrow the raw UUID.
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Generate a fresh timestamp-sortable id.
            pub fn now_v7() -> Self {
                Self(new_entity_id())
            }
        }

        impl EntityIdType for $name {
            fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| IdParseError {
                        kind: $label,
                        value: s.to_string(),
                    })
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_entity_id!(
    /// Organization that owns every row. All reads and writes are scoped to one tenant.
    TenantId,
    "tenant"
);
define_entity_id!(
    /// Root of the product tree.
    ProductId,
    "product"
);
define_entity_id!(InterfaceId, "interface");
define_entity_id!(FeatureId, "feature");
define_entity_id!(RequirementId, "requirement");
define_entity_id!(ReleaseId, "release");
define_entity_id!(RoadmapId, "roadmap");
define_entity_id!(
    /// Node of the generic page tree.
    PageId,
    "page"
);

/// Error when a string is not a valid id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {} id: {}", self.kind, self.value)
    }
}

impl std::error::Error for IdParseError {}
