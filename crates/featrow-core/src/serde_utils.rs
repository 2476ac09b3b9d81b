use bytes::Bytes;
use serde::{Deserializer, Serializer};

pub mod bytes_serde {
    use super::*;

    pub fn serialize<S>(val: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_bytes::serialize(&val[..], serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v: Vec<u8> = serde_bytes::deserialize(deserializer)?;
        Ok(Bytes::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct TestStruct {
        #[serde(with = "bytes_serde")]
        data: Bytes,
    }

    #[test]
    fn test_bytes_serde_roundtrip() {
        let original = TestStruct {
            data: Bytes::from(vec![1, 2, 3, 4, 5]),
        };

        let json = serde_json::to_string(&original).unwrap();
        let deserialized: TestStruct = serde_json::from_str(&json).unwrap();

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_bytes_serde_empty() {
        let original = TestStruct { data: Bytes::new() };

        let json = serde_json::to_string(&original).unwrap();
        let deserialized: TestStruct = serde_json::from_str(&json).unwrap();

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_postcard_serialization() {
        let original = TestStruct {
            data: Bytes::from(b"feature value".to_vec()),
        };

        let bytes = postcard::to_allocvec(&original).unwrap();
        let deserialized: TestStruct = postcard::from_bytes(&bytes).unwrap();

        assert_eq!(original, deserialized);
    }
}
