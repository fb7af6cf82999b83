// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decode/encode bridge between the binary and JSON protobuf wire forms.
//!
//! Input and output modes are chosen independently, so a binary request can
//! be emitted as canonical protobuf JSON and vice versa.

use bytes::Bytes;
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, ReflectMessage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// `Content-Type` of binary protobuf payloads.
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// `Content-Type` of JSON protobuf payloads.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Wire encoding of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WireMode {
    /// Protobuf binary wire format.
    #[default]
    Binary,
    /// Canonical protobuf JSON mapping.
    Json,
}

impl WireMode {
    /// Media type a request must declare in this mode.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Binary => BINARY_CONTENT_TYPE,
            Self::Json => JSON_CONTENT_TYPE,
        }
    }
}

impl fmt::Display for WireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => f.write_str("binary"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl FromStr for WireMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binary" => Ok(Self::Binary),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown wire mode '{}' (expected 'binary' or 'json')",
                other
            )),
        }
    }
}

/// Why a decode or encode did not produce a value.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("binary decode failed: {0}")]
    Binary(#[from] prost::DecodeError),

    #[error("JSON codec failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot convert {from} into {to}: {source}")]
    Transcode {
        from: String,
        to: String,
        #[source]
        source: prost::DecodeError,
    },
}

/// Decode `payload` as a message of type `desc`.
pub fn decode(
    desc: &MessageDescriptor,
    payload: &[u8],
    mode: WireMode,
) -> Result<DynamicMessage, CodecError> {
    match mode {
        WireMode::Binary => Ok(DynamicMessage::decode(desc.clone(), payload)?),
        WireMode::Json => {
            let text = std::str::from_utf8(payload)?;
            let mut deserializer = serde_json::Deserializer::from_str(text);
            let message = DynamicMessage::deserialize(desc.clone(), &mut deserializer)?;
            deserializer.end()?;
            Ok(message)
        }
    }
}

/// Encode `message` as a message of type `desc`.
///
/// When the message was decoded with a different descriptor it is first
/// converted through its binary form, so the output always follows `desc`.
pub fn encode(
    desc: &MessageDescriptor,
    message: &DynamicMessage,
    mode: WireMode,
) -> Result<Bytes, CodecError> {
    if message.descriptor().full_name() != desc.full_name() {
        let converted = DynamicMessage::decode(desc.clone(), message.encode_to_vec().as_slice())
            .map_err(|source| CodecError::Transcode {
                from: message.descriptor().full_name().to_string(),
                to: desc.full_name().to_string(),
                source,
            })?;
        return encode(desc, &converted, mode);
    }

    match mode {
        WireMode::Binary => Ok(Bytes::from(message.encode_to_vec())),
        WireMode::Json => Ok(Bytes::from(serde_json::to_vec(message)?)),
    }
}
