//! Core identity and role types for the Coronet mesh.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Stable, globally-unique device identifier.
///
/// A device keeps the same id across all transports and sessions, so the
/// id is the join point between discovery, connections and the census.
/// Ids must not contain `|` or `;`, which the census wire format reserves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The role a device currently holds in the kingdom.
///
/// Exactly one device in a connected kingdom is `King`, at most one is
/// `Prince`, every other member is `Peasant`, and devices with no kingdom
/// membership are `Free`. The `Display`/`FromStr` names are the wire role
/// names used by the census format and are case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// No kingdom membership.
    Free,
    /// Subordinate member, connected only to the King.
    Peasant,
    /// Designated heir; promotes to King if the King is lost.
    Prince,
    /// Coordinating root of the kingdom.
    King,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Free => "Free",
            Self::Peasant => "Peasant",
            Self::Prince => "Prince",
            Self::King => "King",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Free" => Ok(Self::Free),
            "Peasant" => Ok(Self::Peasant),
            "Prince" => Ok(Self::Prince),
            "King" => Ok(Self::King),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized role name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role name: {:?}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

/// How a subordinate's connection to its King came about.
///
/// Diagnostic provenance only; no protocol logic branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionAccomplishmentType {
    /// Connected to the King voluntarily (Free -> Peasant).
    Voluntarily,
    /// Connected to a new King after a bow-down.
    BowedDown,
    /// Connected to the Prince after the King was lost.
    FollowedHeir,
    /// Stepped down from Prince to Peasant.
    Degraded,
}

impl fmt::Display for ConnectionAccomplishmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Voluntarily => "Voluntarily",
            Self::BowedDown => "BowedDown",
            Self::FollowedHeir => "FollowedHeir",
            Self::Degraded => "Degraded",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip() {
        for role in [Role::Free, Role::Peasant, Role::Prince, Role::King] {
            let name = role.to_string();
            assert_eq!(name.parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn role_names_are_case_sensitive() {
        assert!("king".parse::<Role>().is_err());
        assert!("PEASANT".parse::<Role>().is_err());
    }

    #[test]
    fn device_id_ordering_is_lexicographic() {
        let a = DeviceId::from("device-a");
        let b = DeviceId::from("device-b");
        assert!(a < b);
    }
}
