// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Schema compilation with the real `protoc`. Skipped when `protoc` is not
// installed.

use protohttp::{build_lookup, compile, ProtocCompiler, RegistryError};
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const LOG_PROTO: &str = r#"syntax = "proto3";

package service.logging;

message Log {
  message Source {
    string host = 1;
  }
  string message = 1;
  int32 level = 2;
  Source source = 3;
  map<string, string> labels = 4;
}

message Batch {
  string type = 1;
  repeated Log batch = 2;
}
"#;

const ENVELOPE_PROTO: &str = r#"syntax = "proto3";

package service.envelope;

import "log.proto";

message Envelope {
  service.logging.Log log = 1;
}
"#;

fn protoc_available() -> bool {
    let found = Command::new("protoc")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if !found {
        eprintln!("Skipping test: requires protoc");
    }
    found
}

#[test]
fn compiles_and_registers_self_contained_schema() {
    if !protoc_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("log.proto"), LOG_PROTO).unwrap();

    let artifacts = compile(temp_dir.path(), &ProtocCompiler::default()).unwrap();
    assert_eq!(artifacts.len(), 1);
    assert!(artifacts.paths()[0].ends_with("log.protoset"));

    let registry = build_lookup(&artifacts).unwrap();
    assert_eq!(
        registry.names(),
        vec![
            "service.logging.Batch",
            "service.logging.Log",
            "service.logging.Log.Source",
        ]
    );

    assert_eq!(artifacts.remove_all(), 1);
    assert!(!temp_dir.path().join("log.protoset").exists());
    assert!(temp_dir.path().join("log.proto").exists());
}

#[test]
fn schema_with_import_is_rejected() {
    if !protoc_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("log.proto"), LOG_PROTO).unwrap();
    fs::write(temp_dir.path().join("envelope.proto"), ENVELOPE_PROTO).unwrap();

    let artifacts = compile(temp_dir.path(), &ProtocCompiler::default()).unwrap();
    let err = build_lookup(&artifacts).unwrap_err();
    assert!(matches!(err, RegistryError::UnresolvedImport { .. }));
    assert!(err.to_string().contains("envelope.protoset"));

    artifacts.remove_all();
}

#[test]
fn syntax_error_fails_compilation() {
    if !protoc_available() {
        return;
    }
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("broken.proto"), "syntax = \"proto3\";\nmessage {").unwrap();

    let err = compile(temp_dir.path(), &ProtocCompiler::default()).unwrap_err();
    match err {
        RegistryError::CompileFailed { path, stderr, .. } => {
            assert!(path.ends_with("broken.proto"));
            assert!(!stderr.is_empty());
        }
        other => panic!("unexpected error: {}", other),
    }
}
