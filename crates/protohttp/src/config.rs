// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint configuration.
//!
//! Supports both programmatic and file-based (TOML) configuration.

use crate::codec::WireMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// The address to listen to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// The port to listen to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory containing the `.proto` files.
    pub proto_dir: PathBuf,

    /// Wire mode of incoming (accepted) messages.
    #[serde(default)]
    pub in_mode: WireMode,

    /// Wire mode of outgoing (emitted) messages.
    #[serde(default)]
    pub out_mode: WireMode,

    /// Tag of emitted events, also the route path (`POST /<tag>`).
    pub tag: String,

    /// Schema compiler executable.
    #[serde(default = "default_protoc")]
    pub protoc: String,

    /// Maximum accepted request body size.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Log level / filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Downstream sink settings.
    #[serde(default)]
    pub sink: SinkConfig,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_protoc() -> String {
    "protoc".to_string()
}

fn default_max_body_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

impl IngestConfig {
    /// Create a configuration with defaults for everything but the required keys.
    pub fn new(proto_dir: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            proto_dir: proto_dir.into(),
            in_mode: WireMode::default(),
            out_mode: WireMode::default(),
            tag: tag.into(),
            protoc: default_protoc(),
            max_body_bytes: default_max_body_bytes(),
            log_level: default_log_level(),
            transport: TransportConfig::default(),
            sink: SinkConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the input wire mode.
    pub fn in_mode(mut self, mode: WireMode) -> Self {
        self.in_mode = mode;
        self
    }

    /// Set the output wire mode.
    pub fn out_mode(mut self, mode: WireMode) -> Self {
        self.out_mode = mode;
        self
    }

    /// Route path served by the endpoint.
    pub fn route_path(&self) -> String {
        format!("/{}", self.tag)
    }

    /// `bind:port` pair.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tag.is_empty() {
            return Err(ConfigError::Invalid("Missing 'tag'".into()));
        }
        // `:`, `*` and braces would open a path capture in the router.
        if self.tag.contains(['/', '?', ':', '*', '{', '}']) {
            return Err(ConfigError::Invalid(format!(
                "Tag '{}' cannot be used as a route path",
                self.tag
            )));
        }
        if self.proto_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Missing 'proto_dir'".into()));
        }
        if self.protoc.is_empty() {
            return Err(ConfigError::Invalid("Empty 'protoc' executable".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("'max_body_bytes' must be > 0".into()));
        }

        if self.transport.protocol == TransportProtocol::Tls {
            if self.transport.cert_path.is_none() {
                return Err(ConfigError::Invalid(
                    "TLS transport requires 'cert_path'".into(),
                ));
            }
            if self.transport.key_path.is_none() {
                return Err(ConfigError::Invalid(
                    "TLS transport requires 'key_path'".into(),
                ));
            }
        }

        if let SinkConfig::File { path, max_files, .. } = &self.sink {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("File sink has empty 'path'".into()));
            }
            if *max_files == 0 {
                return Err(ConfigError::Invalid(
                    "File sink 'max_files' must be > 0".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportProtocol {
    #[default]
    Tcp,
    Tls,
}

/// Transport settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransportConfig {
    #[serde(default)]
    pub protocol: TransportProtocol,

    /// PEM certificate chain (TLS only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_path: Option<PathBuf>,

    /// PEM private key (TLS only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
}

/// Where emitted events go.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    /// JSON lines on stdout.
    #[default]
    Stdout,
    /// JSON lines in a file, rotated by size.
    File {
        path: PathBuf,
        #[serde(default = "default_max_size")]
        max_size: u64,
        #[serde(default = "default_max_files")]
        max_files: u32,
    },
}

fn default_max_size() -> u64 {
    64 * 1024 * 1024
}

fn default_max_files() -> u32 {
    5
}
