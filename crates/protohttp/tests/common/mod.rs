// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Shared fixtures: the `service.logging` schema (the same descriptors the unit
// tests use), a compiler double that writes it as artifacts, and router helpers.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MapKey, Value};
use prost_types::FileDescriptorSet;
use protohttp::{
    IngestConfig, IngestEndpoint, MemorySink, RegistryError, SchemaCompiler, WireMode,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

#[path = "../../src/test_schemas/descriptors.rs"]
mod descriptors;

pub use descriptors::{logging_file, logging_pool};

pub const TAG: &str = "test";

/// Writes the logging schema as the artifact of every source it is given.
pub struct FixtureCompiler;

impl SchemaCompiler for FixtureCompiler {
    fn compile(&self, _proto_dir: &Path, sources: &[PathBuf]) -> Result<(), RegistryError> {
        for source in sources {
            let set = FileDescriptorSet {
                file: vec![logging_file()],
            };
            std::fs::write(source.with_extension("protoset"), set.encode_to_vec()).unwrap();
        }
        Ok(())
    }
}

/// A started endpoint over a temporary schema directory.
pub struct Harness {
    pub endpoint: IngestEndpoint,
    pub sink: Arc<MemorySink>,
    _proto_dir: TempDir,
}

impl Harness {
    pub fn start(in_mode: WireMode, out_mode: WireMode) -> Self {
        let proto_dir = TempDir::new().unwrap();
        std::fs::write(proto_dir.path().join("log.proto"), "syntax = \"proto3\";\n").unwrap();

        let config = IngestConfig::new(proto_dir.path(), TAG)
            .in_mode(in_mode)
            .out_mode(out_mode);
        let sink = Arc::new(MemorySink::new());
        let endpoint = IngestEndpoint::start_with(config, &FixtureCompiler, sink.clone()).unwrap();

        Self {
            endpoint,
            sink,
            _proto_dir: proto_dir,
        }
    }

    pub fn router(&self) -> Router {
        self.endpoint.router()
    }
}

pub fn post(uri: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// `status` field of a JSON response body.
pub async fn status_text(response: Response) -> String {
    let body = body_bytes(response).await;
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    value["status"].as_str().unwrap().to_string()
}

pub fn encode(message: &DynamicMessage, mode: WireMode) -> Vec<u8> {
    match mode {
        WireMode::Binary => message.encode_to_vec(),
        WireMode::Json => serde_json::to_vec(message).unwrap(),
    }
}

pub fn decode(pool: &DescriptorPool, name: &str, payload: &[u8], mode: WireMode) -> DynamicMessage {
    let desc = pool.get_message_by_name(name).unwrap();
    match mode {
        WireMode::Binary => DynamicMessage::decode(desc, payload).unwrap(),
        WireMode::Json => {
            let mut deserializer = serde_json::Deserializer::from_slice(payload);
            DynamicMessage::deserialize(desc, &mut deserializer).unwrap()
        }
    }
}

/// A `Log` with every field populated.
pub fn full_log(pool: &DescriptorPool, message: &str, level: i32) -> DynamicMessage {
    let source_desc = pool
        .get_message_by_name("service.logging.Log.Source")
        .unwrap();
    let mut source = DynamicMessage::new(source_desc);
    source.set_field_by_name("host", Value::String("node-1".into()));

    let mut labels = HashMap::new();
    labels.insert(MapKey::String("env".into()), Value::String("prod".into()));

    let mut log = DynamicMessage::new(pool.get_message_by_name("service.logging.Log").unwrap());
    log.set_field_by_name("message", Value::String(message.into()));
    log.set_field_by_name("level", Value::I32(level));
    log.set_field_by_name("source", Value::Message(source));
    log.set_field_by_name("labels", Value::Map(labels));
    log
}

pub fn batch(
    pool: &DescriptorPool,
    batch_type: &str,
    elements: &[DynamicMessage],
) -> DynamicMessage {
    let desc = pool.get_message_by_name("service.logging.Batch").unwrap();
    let mut batch = DynamicMessage::new(desc);
    batch.set_field_by_name("type", Value::String(batch_type.into()));
    batch.set_field_by_name(
        "batch",
        Value::List(elements.iter().cloned().map(Value::Message).collect()),
    );
    batch
}
