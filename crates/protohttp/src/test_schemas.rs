// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory schemas, artifacts and a compiler double for the unit tests.

mod descriptors;

pub(crate) use descriptors::*;

use crate::compiler::{artifact_path, SchemaCompiler};
use crate::error::RegistryError;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, Value};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::cell::Cell;
use std::path::{Path, PathBuf};

/// Write `files` as a serialized descriptor set at `dir/name`.
pub(crate) fn write_artifact(dir: &Path, name: &str, files: Vec<FileDescriptorProto>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, FileDescriptorSet { file: files }.encode_to_vec()).unwrap();
    path
}

/// Create placeholder schema sources; only their names matter.
pub(crate) fn write_proto_sources(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), "syntax = \"proto3\";\n").unwrap();
    }
}

/// `service.logging.Log`. Default values are left unset so that decoded
/// copies compare equal.
pub(crate) fn log_message(pool: &DescriptorPool, message: &str, level: i32) -> DynamicMessage {
    let desc = pool.get_message_by_name("service.logging.Log").unwrap();
    let mut log = DynamicMessage::new(desc);
    if !message.is_empty() {
        log.set_field_by_name("message", Value::String(message.into()));
    }
    if level != 0 {
        log.set_field_by_name("level", Value::I32(level));
    }
    log
}

/// `service.logging.Batch` wrapping `elements`.
pub(crate) fn batch_message(
    pool: &DescriptorPool,
    batch_type: &str,
    elements: &[DynamicMessage],
) -> DynamicMessage {
    let desc = pool.get_message_by_name("service.logging.Batch").unwrap();
    let mut batch = DynamicMessage::new(desc);
    if !batch_type.is_empty() {
        batch.set_field_by_name("type", Value::String(batch_type.into()));
    }
    if !elements.is_empty() {
        batch.set_field_by_name(
            "batch",
            Value::List(elements.iter().cloned().map(Value::Message).collect()),
        );
    }
    batch
}

/// Compiler double: writes a logging descriptor set for each source.
#[derive(Default)]
pub(crate) struct StubCompiler {
    calls: Cell<usize>,
    fail: bool,
    fail_at: Option<String>,
    skip: Option<String>,
}

impl StubCompiler {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Write artifacts for the sources before `name`, then fail on it.
    pub(crate) fn failing_at(name: &str) -> Self {
        Self {
            fail_at: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// Leave no artifact for the source named `name`.
    pub(crate) fn skipping(name: &str) -> Self {
        Self {
            skip: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl SchemaCompiler for StubCompiler {
    fn compile(&self, _proto_dir: &Path, sources: &[PathBuf]) -> Result<(), RegistryError> {
        self.calls.set(self.calls.get() + 1);

        for source in sources {
            let name = source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.fail || self.fail_at.as_deref() == Some(name.as_str()) {
                return Err(RegistryError::CompileFailed {
                    path: source.clone(),
                    status: "exit status: 1".into(),
                    stderr: "stub failure".into(),
                });
            }
            if self.skip.as_deref() == Some(name.as_str()) {
                continue;
            }
            let artifact = artifact_path(source);
            std::fs::write(
                &artifact,
                FileDescriptorSet {
                    file: vec![logging_file()],
                }
                .encode_to_vec(),
            )
            .unwrap();
        }
        Ok(())
    }
}
