use super::SerializeError;
use serde::{Serialize, de::DeserializeOwned};

pub(super) fn serialize<T>(ty: &T) -> Result<Vec<u8>, SerializeError>
where
    T: Serialize,
{
    serde_json::to_vec(ty).map_err(|e| SerializeError::Serialize(e.to_string()))
}

pub(super) fn deserialize<T>(bytes: &[u8]) -> Result<T, SerializeError>
where
    T: DeserializeOwned,
{
    serde_json::from_slice(bytes).map_err(|e| SerializeError::Deserialize(e.to_string()))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use crate::serialize::{SerializeError, deserialize, deserialize_bounded, serialize};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Flat {
        item_id: String,
        count: u32,
    }

    #[test]
    fn records_use_pascal_case_json() {
        let bytes = serialize(&Flat {
            item_id: "x".into(),
            count: 2,
        })
        .unwrap();

        assert_eq!(bytes, br#"{"ItemId":"x","Count":2}"#);
    }

    #[test]
    fn garbage_bytes_fail_to_deserialize() {
        let err = deserialize::<Flat>(b"\xff\x00").unwrap_err();

        assert!(matches!(err, SerializeError::Deserialize(_)));
    }

    #[test]
    fn bounded_decode_rejects_oversized_payloads() {
        let bytes = serialize(&Flat {
            item_id: "abcdef".into(),
            count: 1,
        })
        .unwrap();

        let err = deserialize_bounded::<Flat>(&bytes, 4).unwrap_err();
        assert!(matches!(err, SerializeError::TooLarge { max: 4, .. }));
    }
}
