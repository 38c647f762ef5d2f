//! The census: a snapshot of every known device and its role.
//!
//! The King periodically broadcasts a census so that every member shares a
//! view of the kingdom's topology. Subordinates keep only the latest one;
//! it is the sole source a Peasant has for locating the Prince when the
//! King disappears.
//!
//! # Wire format
//!
//! ASCII text, one clause per device, no terminator required after the
//! final clause:
//!
//! ```text
//! DeviceId "|" RoleName ";" DeviceId "|" RoleName ";" ...
//! ```
//!
//! Role names are the case-sensitive `Role` enumerator names. Decoding
//! stops at the first clause without a `|` separator and skips clauses
//! with unrecognized role names, so a garbled tail costs only the garbled
//! clauses, never the whole snapshot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, Role};

/// Immutable snapshot mapping every known device to its role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Census {
    devices: BTreeMap<DeviceId, Role>,
}

impl Census {
    /// Create an empty census.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a device's role, replacing any previous entry.
    pub fn insert(&mut self, device: DeviceId, role: Role) {
        self.devices.insert(device, role);
    }

    /// Get the recorded role of a device.
    pub fn role_of(&self, device: &DeviceId) -> Option<Role> {
        self.devices.get(device).copied()
    }

    /// Iterate over all `(device, role)` entries.
    pub fn devices(&self) -> impl Iterator<Item = (&DeviceId, Role)> {
        self.devices.iter().map(|(d, r)| (d, *r))
    }

    /// Number of devices in the snapshot.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// The Prince's device id, if the snapshot names one.
    pub fn prince(&self) -> Option<&DeviceId> {
        self.find_role(Role::Prince)
    }

    /// The King's device id, if the snapshot names one.
    ///
    /// A stable kingdom always has exactly one King, but a census captured
    /// mid-merge can transiently lack one, so absence is not an error.
    pub fn king(&self) -> Option<&DeviceId> {
        self.find_role(Role::King)
    }

    fn find_role(&self, role: Role) -> Option<&DeviceId> {
        self.devices
            .iter()
            .find(|(_, r)| **r == role)
            .map(|(d, _)| d)
    }

    /// Encode to the census wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        for (device, role) in &self.devices {
            out.push_str(device.as_str());
            out.push('|');
            out.push_str(&role.to_string());
            out.push(';');
        }
        out.into_bytes()
    }

    /// Decode from the census wire format.
    ///
    /// Never fails: a clause without a `|` ends the decode, a clause with
    /// an unknown role name is skipped, and everything well-formed before
    /// the damage is preserved.
    pub fn decode(text: &str) -> Self {
        let mut devices = BTreeMap::new();
        for clause in text.split(';') {
            let Some((device, role_name)) = clause.split_once('|') else {
                break;
            };
            match role_name.parse::<Role>() {
                Ok(role) => {
                    devices.insert(DeviceId::from(device), role);
                }
                Err(_) => continue,
            }
        }
        Self { devices }
    }
}

impl FromIterator<(DeviceId, Role)> for Census {
    fn from_iter<I: IntoIterator<Item = (DeviceId, Role)>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Census {
        [
            (DeviceId::from("alpha"), Role::King),
            (DeviceId::from("bravo"), Role::Prince),
            (DeviceId::from("charlie"), Role::Peasant),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn encode_produces_clause_per_device() {
        let text = String::from_utf8(sample().encode()).unwrap();
        assert_eq!(text, "alpha|King;bravo|Prince;charlie|Peasant;");
    }

    #[test]
    fn decode_reverses_encode() {
        let census = sample();
        let text = String::from_utf8(census.encode()).unwrap();
        assert_eq!(Census::decode(&text), census);
    }

    #[test]
    fn decode_without_trailing_separator() {
        let census = Census::decode("alpha|King;bravo|Peasant");
        assert_eq!(census.len(), 2);
        assert_eq!(census.role_of(&DeviceId::from("bravo")), Some(Role::Peasant));
    }

    #[test]
    fn decode_stops_at_single_field_clause() {
        let census = Census::decode("alpha|King;garbled;bravo|Peasant;");
        assert_eq!(census.len(), 1);
        assert_eq!(census.king(), Some(&DeviceId::from("alpha")));
    }

    #[test]
    fn decode_skips_unknown_role_names() {
        let census = Census::decode("alpha|King;bravo|Jester;charlie|Peasant;");
        assert_eq!(census.len(), 2);
        assert_eq!(census.role_of(&DeviceId::from("charlie")), Some(Role::Peasant));
    }

    #[test]
    fn decode_empty_text() {
        assert!(Census::decode("").is_empty());
    }

    #[test]
    fn prince_and_king_extraction() {
        let census = sample();
        assert_eq!(census.king(), Some(&DeviceId::from("alpha")));
        assert_eq!(census.prince(), Some(&DeviceId::from("bravo")));

        let kingless: Census = [(DeviceId::from("x"), Role::Peasant)].into_iter().collect();
        assert_eq!(kingless.king(), None);
        assert_eq!(kingless.prince(), None);
    }
}
