// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema descriptors shared by the unit and integration tests.
//!
//! Built as `prost_types` values so that no test needs `protoc`.

use prost_reflect::DescriptorPool;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet, MessageOptions,
};

fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.into()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.into()),
        ..Default::default()
    }
}

fn message_field(name: &str, number: i32, type_name: &str, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        label: Some(label as i32),
        type_name: Some(type_name.into()),
        ..field(name, number, Type::Message)
    }
}

/// Descriptor of:
///
/// ```proto
/// syntax = "proto3";
/// package service.logging;
///
/// message Log {
///   message Source { string host = 1; }
///   string message = 1;
///   int32 level = 2;
///   Source source = 3;
///   map<string, string> labels = 4;
/// }
///
/// message Batch {
///   string type = 1;
///   repeated Log batch = 2;
/// }
///
/// message LegacyLog { string message = 1; }
/// ```
pub fn logging_file() -> FileDescriptorProto {
    let source = DescriptorProto {
        name: Some("Source".into()),
        field: vec![field("host", 1, Type::String)],
        ..Default::default()
    };
    let labels_entry = DescriptorProto {
        name: Some("LabelsEntry".into()),
        field: vec![field("key", 1, Type::String), field("value", 2, Type::String)],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };
    let log = DescriptorProto {
        name: Some("Log".into()),
        field: vec![
            field("message", 1, Type::String),
            field("level", 2, Type::Int32),
            message_field("source", 3, ".service.logging.Log.Source", Label::Optional),
            message_field("labels", 4, ".service.logging.Log.LabelsEntry", Label::Repeated),
        ],
        nested_type: vec![source, labels_entry],
        ..Default::default()
    };
    let batch = DescriptorProto {
        name: Some("Batch".into()),
        field: vec![
            field("type", 1, Type::String),
            message_field("batch", 2, ".service.logging.Log", Label::Repeated),
        ],
        ..Default::default()
    };
    let legacy = DescriptorProto {
        name: Some("LegacyLog".into()),
        field: vec![field("message", 1, Type::String)],
        ..Default::default()
    };

    FileDescriptorProto {
        name: Some("log.proto".into()),
        package: Some("service.logging".into()),
        syntax: Some("proto3".into()),
        message_type: vec![log, batch, legacy],
        ..Default::default()
    }
}

/// `metrics.proto`: `message Gauge { string name = 1; double value = 2; }`.
pub fn metrics_file() -> FileDescriptorProto {
    let gauge = DescriptorProto {
        name: Some("Gauge".into()),
        field: vec![field("name", 1, Type::String), field("value", 2, Type::Double)],
        ..Default::default()
    };
    FileDescriptorProto {
        name: Some("metrics.proto".into()),
        package: Some("service.metrics".into()),
        syntax: Some("proto3".into()),
        message_type: vec![gauge],
        ..Default::default()
    }
}

/// `envelope.proto`: imports `log.proto`, so it cannot be loaded alone.
pub fn importing_file() -> FileDescriptorProto {
    let envelope = DescriptorProto {
        name: Some("Envelope".into()),
        field: vec![message_field("log", 1, ".service.logging.Log", Label::Optional)],
        ..Default::default()
    };
    FileDescriptorProto {
        name: Some("envelope.proto".into()),
        package: Some("service.envelope".into()),
        dependency: vec!["log.proto".into()],
        syntax: Some("proto3".into()),
        message_type: vec![envelope],
        ..Default::default()
    }
}

/// `event.proto`: imports `google/protobuf/timestamp.proto`.
///
/// ```proto
/// message Event {
///   string name = 1;
///   google.protobuf.Timestamp at = 2;
/// }
/// ```
pub fn timestamped_file() -> FileDescriptorProto {
    let event = DescriptorProto {
        name: Some("Event".into()),
        field: vec![
            field("name", 1, Type::String),
            message_field("at", 2, ".google.protobuf.Timestamp", Label::Optional),
        ],
        ..Default::default()
    };
    FileDescriptorProto {
        name: Some("event.proto".into()),
        package: Some("service.events".into()),
        dependency: vec!["google/protobuf/timestamp.proto".into()],
        syntax: Some("proto3".into()),
        message_type: vec![event],
        ..Default::default()
    }
}

pub fn logging_pool() -> DescriptorPool {
    DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
        file: vec![logging_file()],
    })
    .unwrap()
}

/// Logging and metrics schemas in one pool.
pub fn logging_and_metrics_pool() -> DescriptorPool {
    DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
        file: vec![logging_file(), metrics_file()],
    })
    .unwrap()
}
