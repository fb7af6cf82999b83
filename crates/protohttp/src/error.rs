// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types.
//!
//! Two tiers: [`RegistryError`] and [`crate::config::ConfigError`] abort
//! startup, while [`Rejection`] is scoped to a single request and always
//! answered with `400 Bad Request`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Startup-fatal errors raised while compiling schemas and building the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("proto_dir does not exist! [{}]", .0.display())]
    MissingProtoDir(PathBuf),

    #[error("Empty proto_dir! No .proto files found [{}]", .0.display())]
    EmptyProtoDir(PathBuf),

    #[error("Could not list proto_dir [{}]: {source}", path.display())]
    ListProtoDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not run schema compiler [{program}]: {source}")]
    CompilerSpawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Could not compile! [{}] {status}: {stderr}", path.display())]
    CompileFailed {
        path: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("Compiled proto not found! [{}]", .0.display())]
    MissingArtifact(PathBuf),

    #[error("Could not read compiled proto [{}]: {source}", path.display())]
    ReadArtifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Compiled proto is not a descriptor set! [{}]: {source}", path.display())]
    CorruptArtifact {
        path: PathBuf,
        #[source]
        source: prost::DecodeError,
    },

    #[error(
        "Possible 'import' issue! Use a single self-contained .proto file! [{}] imports [{import}]",
        path.display()
    )]
    UnresolvedImport { path: PathBuf, import: String },

    #[error("Invalid schema in compiled proto [{}]: {source}", path.display())]
    InvalidSchema {
        path: PathBuf,
        #[source]
        source: prost_reflect::DescriptorError,
    },

    #[error("Message type ['{name}'] not registered! [{}]", path.display())]
    UnresolvedType { name: String, path: PathBuf },

    #[error(
        "Message type ['{name}'] declared twice! [{}] and [{}]",
        first.display(),
        second.display()
    )]
    DuplicateType {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("No message types found! Check proto_dir [{}]!", .0.display())]
    NoMessageTypes(PathBuf),
}

/// Reason a request was refused.
///
/// `Display` renders the exact text returned in the `status` field of the
/// JSON response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Invalid 'Content-Type' header! [{}]", .0.as_deref().unwrap_or_default())]
    InvalidContentType(Option<String>),

    #[error("Invalid 'msgtype' in 'query_string'! [{}]", .0.as_deref().unwrap_or_default())]
    InvalidMsgType(Option<String>),

    #[error("Incompatible message! [msgtype: {msgtype}, size: {size} bytes]")]
    IncompatibleMessage { msgtype: String, size: usize },

    #[error("Invalid 'batch' message! [msgtype: {msgtype}, size: {size} bytes]")]
    InvalidBatch { msgtype: String, size: usize },

    #[error("Serialization failed! [msgtype: {msgtype}, size: {size} bytes]")]
    SerializationFailed { msgtype: String, size: usize },
}
