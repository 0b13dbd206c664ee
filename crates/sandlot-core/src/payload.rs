//! Typed extension payloads.
//!
//! Generic option maps carry backend-specific records as an [`Any`]: a type
//! URL naming the record plus its serialized body. Only types implementing
//! [`TypeUrl`] can be packed or unpacked, so every tag maps to exactly one
//! Rust type known at compile time.

use sandlot_vm::{CreateVmRequest, CreateVmResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A record type that can travel inside an [`Any`].
pub trait TypeUrl: Serialize + DeserializeOwned {
    /// Tag identifying this type on the wire.
    const TYPE_URL: &'static str;
}

impl TypeUrl for CreateVmRequest {
    const TYPE_URL: &'static str = "sandlot.vm.v1.CreateVmRequest";
}

impl TypeUrl for CreateVmResponse {
    const TYPE_URL: &'static str = "sandlot.vm.v1.CreateVmResponse";
}

/// Opaque typed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Any {
    /// Tag naming the payload's type
    pub type_url: String,
    /// Serialized body
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Errors packing or unpacking an [`Any`].
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload carries a different type than requested
    #[error("payload type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Type URL the caller asked for
        expected: &'static str,
        /// Type URL found on the payload
        actual: String,
    },

    /// The body does not decode as the tagged type
    #[error("failed to decode {type_url}: {source}")]
    Decode {
        /// Type URL being decoded
        type_url: &'static str,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// The record could not be serialized
    #[error("failed to encode {type_url}: {source}")]
    Encode {
        /// Type URL being encoded
        type_url: &'static str,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },
}

impl Any {
    /// Wrap a record.
    pub fn pack<T: TypeUrl>(msg: &T) -> Result<Self, PayloadError> {
        let value = serde_json::to_value(msg).map_err(|source| PayloadError::Encode {
            type_url: T::TYPE_URL,
            source,
        })?;
        Ok(Self {
            type_url: T::TYPE_URL.to_string(),
            value,
        })
    }

    /// Decode the body as `T`, rejecting payloads tagged with another type.
    pub fn unpack<T: TypeUrl>(&self) -> Result<T, PayloadError> {
        if !self.is::<T>() {
            return Err(PayloadError::TypeMismatch {
                expected: T::TYPE_URL,
                actual: self.type_url.clone(),
            });
        }
        T::deserialize(&self.value).map_err(|source| PayloadError::Decode {
            type_url: T::TYPE_URL,
            source,
        })
    }

    /// True if the payload is tagged as `T`.
    pub fn is<T: TypeUrl>(&self) -> bool {
        self.type_url == T::TYPE_URL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pack_tags_type() {
        let any = Any::pack(&CreateVmRequest {
            vm_id: "sb-1".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(any.type_url, "sandlot.vm.v1.CreateVmRequest");
        assert!(any.is::<CreateVmRequest>());
        assert!(!any.is::<CreateVmResponse>());
        assert_eq!(any.value["vm_id"], "sb-1");
    }

    #[test]
    fn test_unpack_rejects_other_type() {
        let any = Any {
            type_url: "example.Other".into(),
            value: json!({}),
        };
        let err = any.unpack::<CreateVmRequest>().unwrap_err();
        assert!(matches!(err, PayloadError::TypeMismatch { .. }));
    }

    #[test]
    fn test_unpack_rejects_malformed_body() {
        let any = Any {
            type_url: CreateVmRequest::TYPE_URL.into(),
            value: json!({"machine_cfg": "four cpus"}),
        };
        let err = any.unpack::<CreateVmRequest>().unwrap_err();
        assert!(matches!(err, PayloadError::Decode { .. }));
    }

    #[test]
    fn test_missing_value_decodes_as_null() {
        let any: Any = serde_json::from_str(r#"{"type_url":"sandlot.vm.v1.CreateVmRequest"}"#).unwrap();
        assert!(any.value.is_null());
        assert!(any.unpack::<CreateVmRequest>().is_err());
    }
}
