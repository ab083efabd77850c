//! Serialization protocol for checkpoints

use crate::error::{CheckpointError, Result};
use serde::{Deserialize, Serialize};

/// Protocol for serializing and deserializing checkpoint data
///
/// Implementations can provide custom serialization strategies
/// (JSON, MessagePack, bincode, etc.)
pub trait SerializerProtocol: Send + Sync {
    /// Serialize a value to bytes
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from bytes
    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T>;

    /// Serialize to JSON value (for compatibility)
    fn dumps_json<T: Serialize>(&self, value: &T) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(value)?)
    }

    /// Deserialize from JSON value (for compatibility)
    fn loads_json<T: for<'de> Deserialize<'de>>(&self, value: &serde_json::Value) -> Result<T> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Stable tag identifying this serializer's wire format, persisted
    /// alongside the bytes so a stored payload can be decoded correctly even
    /// after the default serializer changes across library versions.
    fn type_tag(&self) -> &'static str;

    /// Serialize a value and tag it with [`SerializerProtocol::type_tag`].
    fn dumps_typed<T: Serialize>(&self, value: &T) -> Result<(String, Vec<u8>)> {
        Ok((self.type_tag().to_string(), self.dumps(value)?))
    }

    /// Deserialize a tagged payload, rejecting one written by a different
    /// wire format than this serializer's.
    fn loads_typed<T: for<'de> Deserialize<'de>>(&self, type_tag: &str, data: &[u8]) -> Result<T> {
        if type_tag != self.type_tag() {
            return Err(CheckpointError::Invalid(format!(
                "serializer type tag mismatch: expected '{}', got '{}'",
                self.type_tag(),
                type_tag
            )));
        }
        self.loads(data)
    }
}

/// JSON-based serializer (default)
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }

    fn type_tag(&self) -> &'static str {
        "json"
    }
}

/// Binary serializer using bincode
#[derive(Debug, Clone, Default)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for BincodeSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(bincode::serialize(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(bincode::deserialize(data)?)
    }

    fn type_tag(&self) -> &'static str {
        "bincode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: i32,
    }

    #[test]
    fn test_json_serializer() {
        let serializer = JsonSerializer::new();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        let bytes = serializer.dumps(&data).unwrap();
        let restored: TestData = serializer.loads(&bytes).unwrap();

        assert_eq!(data, restored);
    }

    #[test]
    fn test_bincode_serializer() {
        let serializer = BincodeSerializer::new();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        let bytes = serializer.dumps(&data).unwrap();
        let restored: TestData = serializer.loads(&bytes).unwrap();

        assert_eq!(data, restored);
    }

    #[test]
    fn test_json_value_serialization() {
        let serializer = JsonSerializer::new();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        let json = serializer.dumps_json(&data).unwrap();
        let restored: TestData = serializer.loads_json(&json).unwrap();

        assert_eq!(data, restored);
    }

    #[test]
    fn test_json_typed_round_trip() {
        let serializer = JsonSerializer::new();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        let (tag, bytes) = serializer.dumps_typed(&data).unwrap();
        assert_eq!(tag, "json");

        let restored: TestData = serializer.loads_typed(&tag, &bytes).unwrap();
        assert_eq!(data, restored);
    }

    #[test]
    fn test_bincode_typed_round_trip() {
        let serializer = BincodeSerializer::new();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        let (tag, bytes) = serializer.dumps_typed(&data).unwrap();
        assert_eq!(tag, "bincode");

        let restored: TestData = serializer.loads_typed(&tag, &bytes).unwrap();
        assert_eq!(data, restored);
    }

    #[test]
    fn test_typed_round_trip_rejects_mismatched_tag() {
        let json = JsonSerializer::new();
        let bincode = BincodeSerializer::new();
        let data = TestData {
            name: "test".to_string(),
            value: 42,
        };

        let (tag, bytes) = bincode.dumps_typed(&data).unwrap();
        let result: Result<TestData> = json.loads_typed(&tag, &bytes);

        assert!(result.is_err());
    }
}
