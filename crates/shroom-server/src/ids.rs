//! Opaque topology and account identifiers.
//!
//! All ids are 32-bit values with no arithmetic beyond equality; the
//! newtypes keep a world id from ever being handed to something expecting a
//! channel id.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            /// Raw id value.
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// A world.
    WorldId
);
define_id!(
    /// A channel within a world.
    ChannelId
);
define_id!(
    /// A game map.
    MapId
);
define_id!(
    /// An account.
    AccountId
);
define_id!(
    /// A character owned by an account.
    CharacterId
);
define_id!(
    /// A live connection's session, assigned by the session manager.
    SessionId
);

/// A room: one instance of one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId {
    /// Instance discriminator; zero for the singleton instance of a map.
    pub instance: u32,
    /// The map this room runs.
    pub map: MapId,
}

impl RoomId {
    /// The singleton instance of `map`.
    #[must_use]
    pub const fn of_map(map: MapId) -> Self {
        Self { instance: 0, map }
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.map, self.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::{MapId, RoomId, WorldId};

    #[test]
    fn ids_compare_by_value() {
        assert_eq!(WorldId(1), WorldId::from(1));
        assert_ne!(WorldId(1), WorldId(2));
    }

    #[test]
    fn room_id_is_instance_plus_map() {
        let a = RoomId::of_map(MapId(100_000_000));
        let b = RoomId { instance: 1, map: MapId(100_000_000) };
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "100000000:0");
    }
}
