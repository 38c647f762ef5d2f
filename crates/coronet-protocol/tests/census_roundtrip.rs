//! Property tests for the census wire codec.

use std::collections::BTreeMap;

use proptest::prelude::*;

use coronet_protocol::{AdminMessage, Census, DeviceId, Role};

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Free),
        Just(Role::Peasant),
        Just(Role::Prince),
        Just(Role::King),
    ]
}

fn device_id_strategy() -> impl Strategy<Value = String> {
    // Ids free of the reserved '|' and ';' separators.
    "[a-z0-9:._-]{1,24}"
}

proptest! {
    #[test]
    fn census_round_trips(entries in proptest::collection::btree_map(
        device_id_strategy(),
        role_strategy(),
        1..32,
    )) {
        let census: Census = entries
            .iter()
            .map(|(id, role)| (DeviceId::from(id.as_str()), *role))
            .collect();

        let text = String::from_utf8(census.encode()).unwrap();
        prop_assert_eq!(Census::decode(&text), census);
    }

    #[test]
    fn census_round_trips_through_frame(entries in proptest::collection::btree_map(
        device_id_strategy(),
        role_strategy(),
        1..32,
    )) {
        let census: Census = entries
            .iter()
            .map(|(id, role)| (DeviceId::from(id.as_str()), *role))
            .collect();

        let frame = AdminMessage::Census(census.clone()).encode().unwrap();
        let (decoded, consumed) = AdminMessage::decode(&frame).unwrap();
        prop_assert_eq!(consumed, frame.len());
        prop_assert_eq!(decoded, AdminMessage::Census(census));
    }

    #[test]
    fn decode_never_panics(text in "[ -~]{0,256}") {
        let _ = Census::decode(&text);
    }

    #[test]
    fn truncated_tail_preserves_leading_clauses(entries in proptest::collection::btree_map(
        device_id_strategy(),
        role_strategy(),
        1..8,
    )) {
        let expected: BTreeMap<_, _> = entries.clone();
        let census: Census = entries
            .iter()
            .map(|(id, role)| (DeviceId::from(id.as_str()), *role))
            .collect();

        let mut text = String::from_utf8(census.encode()).unwrap();
        text.push_str("dangling-no-separator");

        let decoded = Census::decode(&text);
        for (id, role) in &expected {
            prop_assert_eq!(decoded.role_of(&DeviceId::from(id.as_str())), Some(*role));
        }
        prop_assert_eq!(decoded.len(), expected.len());
    }
}
