//! Identity types for SlotSwap entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Common behaviour for strongly-typed entity identifiers.
///
/// Every identifier wraps a UUIDv7, which embeds a Unix timestamp and keeps
/// ids naturally sortable by creation time.
pub trait EntityIdType: Copy + Eq + fmt::Display {
    /// Entity type this identifier refers to.
    const ENTITY_TYPE: EntityType;

    /// Wrap an existing UUID.
    fn new(uuid: Uuid) -> Self;

    /// Access the wrapped UUID.
    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh timestamp-sortable identifier.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// The nil identifier.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident => $entity:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            const ENTITY_TYPE: EntityType = $entity;

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
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
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
    /// Identifier of a calendar event (a tradable slot).
    EventId => EntityType::Event
);
define_entity_id!(
    /// Identifier of a swap request in the ledger.
    SwapRequestId => EntityType::SwapRequest
);
define_entity_id!(
    /// Identifier of a user, as supplied by the access gateway.
    UserId => EntityType::User
);

/// Entity type discriminator for error reporting and polymorphic references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum EntityType {
    Event,
    SwapRequest,
    User,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityType::Event => "Event",
            EntityType::SwapRequest => "SwapRequest",
            EntityType::User => "User",
        };
        f.write_str(name)
    }
}
