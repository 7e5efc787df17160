//! PayloadCodec - 型付きの値と `serde_json::Value` の相互変換
//!
//! history に載るものは全てここを通して JSON にします。

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::CodecError;

pub struct PayloadCodec;

impl PayloadCodec {
    pub fn encode<T: Serialize>(value: &T) -> Result<Value, CodecError> {
        serde_json::to_value(value).map_err(|source| CodecError::Encode {
            type_name: std::any::type_name::<T>(),
            source,
        })
    }

    pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, CodecError> {
        serde_json::from_value(value).map_err(|source| CodecError::Decode {
            type_name: std::any::type_name::<T>(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Probe {
        value: i32,
    }

    #[test]
    fn decode_error_names_the_target_type() {
        let err = PayloadCodec::decode::<Probe>(json!({"value": "nope"})).unwrap_err();
        assert!(err.to_string().contains("Probe"));
    }

    #[test]
    fn encode_then_decode() {
        let v = PayloadCodec::encode(&Probe { value: 7 }).unwrap();
        assert_eq!(v, json!({"value": 7}));
        assert_eq!(PayloadCodec::decode::<Probe>(v).unwrap(), Probe { value: 7 });
    }
}
