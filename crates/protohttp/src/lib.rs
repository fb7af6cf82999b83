// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Protobuf over HTTP ingestion endpoint
//!
//! Accepts protobuf messages posted over HTTP(S), in binary or JSON form,
//! validates them against schemas compiled at startup and forwards them to a
//! downstream event sink, optionally converting between the two wire forms.
//!
//! # Features
//!
//! - **Schema Registry**: every `*.proto` in a directory is compiled once at
//!   startup and all declared message types are addressable by full name
//! - **Mode Bridging**: input and output wire modes are independent
//! - **Batching**: envelope messages are unpacked and emitted as one stream
//! - **TLS**: optional, from PEM certificate and key
//!
//! # Quick Start
//!
//! ```bash
//! # Binary in, JSON out, on POST /debug.test
//! protohttp --proto-dir ./protos --tag debug.test --out-mode json
//!
//! # Using config file
//! protohttp --config protohttp.toml
//! ```
//!
//! ```bash
//! curl -X POST -H 'Content-Type: application/octet-stream' \
//!      --data-binary @log.bin \
//!      'http://localhost:8080/debug.test?msgtype=service.logging.Log'
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! proto_dir = "/etc/protohttp/protos"
//! tag = "debug.test"
//! in_mode = "binary"
//! out_mode = "json"
//!
//! [transport]
//! protocol = "tls"
//! cert_path = "/etc/protohttp/server.crt"
//! key_path = "/etc/protohttp/server.key"
//!
//! [sink]
//! type = "file"
//! path = "/var/log/protohttp/events.log"
//! ```

pub mod codec;
pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod registry;
pub mod sink;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_schemas;

pub use codec::WireMode;
pub use compiler::{ProtocCompiler, SchemaCompiler};
pub use config::{ConfigError, IngestConfig, SinkConfig, TransportConfig, TransportProtocol};
pub use dispatch::{Accepted, BatchDispatcher, IncomingRequest};
pub use endpoint::{build_router, shutdown_signal, IngestEndpoint, ServeError};
pub use error::{Rejection, RegistryError};
pub use registry::{build_lookup, compile, CompiledArtifacts, MessageTypeRegistry};
pub use sink::{create_sink, EventSink, EventTime, MemorySink, Record, WriterSink};
