//! Blob payload codec: the decrypted payload is a JSON entry map.

use crate::error::StoreResult;
use covault_types::EntryMap;

/// Serializes the entry map into blob payload bytes. The map's ordering is
/// deterministic, so equal caches produce byte-identical payloads.
pub fn serialize_entries(entries: &EntryMap) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(entries)?)
}

/// Parses blob payload bytes back into an entry map.
///
/// A zero-length payload is the empty map: that is what a reset store
/// contains, and a never-written store decrypts to nothing at all.
pub fn parse_entries(bytes: &[u8]) -> StoreResult<EntryMap> {
    if bytes.is_empty() {
        return Ok(EntryMap::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use covault_types::Entry;
    use pretty_assertions::assert_eq;

    #[test]
    fn round_trips_a_map() {
        let mut map = EntryMap::new();
        map.insert("ssh".into(), Entry::new("ssh", b"key".to_vec(), None));

        let parsed = parse_entries(&serialize_entries(&map).unwrap()).unwrap();
        assert_eq!(parsed, map);
    }

    #[test]
    fn empty_payload_is_empty_map() {
        assert_eq!(parse_entries(b"").unwrap(), EntryMap::new());
    }

    #[test]
    fn equal_maps_serialize_identically() {
        let entry = Entry::new("a", b"1".to_vec(), None);
        let mut left = EntryMap::new();
        let mut right = EntryMap::new();
        // Insertion order differs; serialized bytes must not.
        left.insert("a".into(), entry.clone());
        left.insert("b".into(), entry.clone());
        right.insert("b".into(), entry.clone());
        right.insert("a".into(), entry);

        assert_eq!(
            serialize_entries(&left).unwrap(),
            serialize_entries(&right).unwrap()
        );
    }

    #[test]
    fn garbage_payload_is_a_serialization_error() {
        assert!(parse_entries(b"{not json").is_err());
    }
}
