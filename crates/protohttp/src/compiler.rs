// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema compiler invocation.
//!
//! The registry only depends on the [`SchemaCompiler`] contract: given the
//! schema directory and its sources, leave one descriptor-set artifact per
//! source next to it (see [`artifact_path`]).

use crate::error::RegistryError;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Suffix of schema source files.
pub const PROTO_SUFFIX: &str = ".proto";

/// Suffix of compiled artifacts (serialized `FileDescriptorSet`).
pub const COMPILED_SUFFIX: &str = ".protoset";

/// Compiled artifact path for a schema source: `log.proto` -> `log.protoset`.
pub fn artifact_path(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.strip_suffix(PROTO_SUFFIX).unwrap_or(&name);
    source.with_file_name(format!("{}{}", stem, COMPILED_SUFFIX))
}

/// Turns schema sources into loadable artifacts.
pub trait SchemaCompiler {
    /// Compile every source in `sources` (all located in `proto_dir`).
    fn compile(&self, proto_dir: &Path, sources: &[PathBuf]) -> Result<(), RegistryError>;
}

/// Runs the external `protoc` compiler.
#[derive(Debug, Clone)]
pub struct ProtocCompiler {
    program: String,
}

impl ProtocCompiler {
    /// Use the given executable (name on `PATH` or absolute path).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Executable this compiler runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, proto_dir: &Path, source: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(format!("--proto_path={}", proto_dir.display()))
            .arg(format!(
                "--descriptor_set_out={}",
                artifact_path(source).display()
            ))
            .arg(source);
        cmd
    }
}

impl Default for ProtocCompiler {
    fn default() -> Self {
        Self::new("protoc")
    }
}

impl SchemaCompiler for ProtocCompiler {
    // protoc writes a single descriptor set per run, so each source gets its own run.
    fn compile(&self, proto_dir: &Path, sources: &[PathBuf]) -> Result<(), RegistryError> {
        for source in sources {
            tracing::debug!("{} {}", self.program, source.display());

            let output = self
                .command(proto_dir, source)
                .output()
                .map_err(|source| RegistryError::CompilerSpawn {
                    program: self.program.clone(),
                    source,
                })?;

            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if !output.status.success() {
                for line in stderr.lines() {
                    tracing::error!("{}", line);
                }
                return Err(RegistryError::CompileFailed {
                    path: source.clone(),
                    status: output.status.to_string(),
                    stderr,
                });
            }
            if !stderr.is_empty() {
                tracing::warn!("{}: {}", source.display(), stderr);
            }
        }

        Ok(())
    }
}
