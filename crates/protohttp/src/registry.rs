// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema registry: compiles the schema directory once at startup and maps
//! every declared message type name to its descriptor.
//!
//! The registry is immutable after [`build_lookup`] returns; share it with
//! `Arc` and read it from any number of request handlers without locking.

use crate::compiler::{artifact_path, SchemaCompiler, PROTO_SUFFIX};
use crate::error::RegistryError;
use prost::Message;
use prost_reflect::{DescriptorPool, MessageDescriptor};
use prost_types::FileDescriptorSet;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Compiled artifacts, one per schema source, owned for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct CompiledArtifacts {
    proto_dir: PathBuf,
    paths: Vec<PathBuf>,
}

impl CompiledArtifacts {
    /// Wrap already compiled artifacts.
    pub fn new(proto_dir: impl Into<PathBuf>, paths: Vec<PathBuf>) -> Self {
        Self {
            proto_dir: proto_dir.into(),
            paths,
        }
    }

    /// Schema directory the artifacts were compiled from.
    pub fn proto_dir(&self) -> &Path {
        &self.proto_dir
    }

    /// Artifact paths, in source order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Delete every artifact. Best effort: failures are logged and skipped.
    ///
    /// Returns the number of files removed.
    pub fn remove_all(&self) -> usize {
        let mut removed = 0;
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!("Removed compiled proto [{}]", path.display());
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!("Could not remove compiled proto [{}]: {}", path.display(), e)
                }
            }
        }
        removed
    }
}

/// Immutable mapping from message type name to message descriptor.
#[derive(Debug, Clone, Default)]
pub struct MessageTypeRegistry {
    types: HashMap<String, MessageDescriptor>,
}

impl MessageTypeRegistry {
    /// Register every message declared in `pool`.
    ///
    /// Used to serve schemas that are already loaded in memory; startup goes
    /// through [`build_lookup`].
    pub fn from_pool(pool: &DescriptorPool) -> Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::default();
        builder.register(
            Path::new("<memory>"),
            pool,
            message_type_names(pool.all_messages()),
        )?;
        builder.finish(Path::new("<memory>"))
    }

    /// Schema handle for `name`; `None` is the only "unknown type" signal.
    pub fn get(&self, name: &str) -> Option<&MessageDescriptor> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// List the schema sources in `proto_dir`, invoke the compiler once for the
/// whole set and check that every expected artifact exists.
pub fn compile(
    proto_dir: &Path,
    compiler: &dyn SchemaCompiler,
) -> Result<CompiledArtifacts, RegistryError> {
    tracing::debug!("Checking proto_dir [{}]...", proto_dir.display());

    if !proto_dir.is_dir() {
        return Err(RegistryError::MissingProtoDir(proto_dir.to_path_buf()));
    }
    let proto_dir = fs::canonicalize(proto_dir).map_err(|source| RegistryError::ListProtoDir {
        path: proto_dir.to_path_buf(),
        source,
    })?;

    let sources = list_sources(&proto_dir)?;
    if sources.is_empty() {
        return Err(RegistryError::EmptyProtoDir(proto_dir));
    }

    tracing::info!("Compiling .proto files [{}]...", sources.len());
    if let Err(e) = compiler.compile(&proto_dir, &sources) {
        remove_partial_output(&proto_dir, &sources);
        return Err(e);
    }
    tracing::info!(
        "Compiled successfully:\n- {}",
        display_list(sources.iter().map(|p| p.display()))
    );

    let paths: Vec<PathBuf> = sources.iter().map(|source| artifact_path(source)).collect();
    // Also catches stale or partial compiler output.
    if let Some(missing) = paths.iter().find(|artifact| !artifact.is_file()) {
        let missing = missing.clone();
        remove_partial_output(&proto_dir, &sources);
        return Err(RegistryError::MissingArtifact(missing));
    }

    tracing::info!(
        "Compiled .proto files:\n- {}",
        display_list(paths.iter().map(|p| p.display()))
    );

    Ok(CompiledArtifacts::new(proto_dir, paths))
}

/// Remove whatever artifacts a failed compile left behind.
fn remove_partial_output(proto_dir: &Path, sources: &[PathBuf]) {
    let written: Vec<PathBuf> = sources
        .iter()
        .map(|source| artifact_path(source))
        .filter(|artifact| artifact.is_file())
        .collect();
    if !written.is_empty() {
        CompiledArtifacts::new(proto_dir, written).remove_all();
    }
}

fn list_sources(proto_dir: &Path) -> Result<Vec<PathBuf>, RegistryError> {
    let list_err = |source: std::io::Error| RegistryError::ListProtoDir {
        path: proto_dir.to_path_buf(),
        source,
    };

    let mut sources = Vec::new();
    for entry in fs::read_dir(proto_dir).map_err(list_err)? {
        let path = entry.map_err(list_err)?.path();
        let is_proto = path
            .file_name()
            .map(|n| n.to_string_lossy().ends_with(PROTO_SUFFIX))
            .unwrap_or(false);
        if is_proto && path.is_file() {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

/// Load every artifact and register the message types it declares.
///
/// Artifacts may import the google well-known types; any other import fails,
/// as does a type that cannot be resolved, a type name declared twice, or an
/// empty registry.
pub fn build_lookup(artifacts: &CompiledArtifacts) -> Result<MessageTypeRegistry, RegistryError> {
    let mut builder = RegistryBuilder::default();

    for path in artifacts.paths() {
        tracing::debug!("Extracting message types [{}]...", path.display());

        let (pool, own_files) = load_artifact(path)?;
        let candidates = message_type_names(
            pool.all_messages()
                .filter(|m| own_files.contains(m.parent_file().name())),
        );
        builder.register(path, &pool, candidates)?;
    }

    let registry = builder.finish(artifacts.proto_dir())?;
    tracing::info!(
        "Registered messages [{}]:\n- {}",
        registry.len(),
        display_list(registry.names())
    );
    Ok(registry)
}

/// Load one artifact on top of the well-known types.
///
/// Returns the pool and the names of the files the artifact itself declares.
fn load_artifact(path: &Path) -> Result<(DescriptorPool, HashSet<String>), RegistryError> {
    let bytes = fs::read(path).map_err(|source| RegistryError::ReadArtifact {
        path: path.to_path_buf(),
        source,
    })?;
    let set = FileDescriptorSet::decode(bytes.as_slice()).map_err(|source| {
        RegistryError::CorruptArtifact {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let mut pool = DescriptorPool::global();
    let in_set: HashSet<&str> = set.file.iter().map(|f| f.name()).collect();
    for file in &set.file {
        if let Some(import) = file
            .dependency
            .iter()
            .find(|dep| !in_set.contains(dep.as_str()) && pool.get_file_by_name(dep).is_none())
        {
            return Err(RegistryError::UnresolvedImport {
                path: path.to_path_buf(),
                import: import.clone(),
            });
        }
    }

    // Copies of well-known files are skipped by the pool; their types are not ours.
    let own_files: HashSet<String> = in_set
        .into_iter()
        .filter(|name| pool.get_file_by_name(name).is_none())
        .map(str::to_string)
        .collect();

    pool.add_file_descriptor_set(set)
        .map_err(|source| RegistryError::InvalidSchema {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((pool, own_files))
}

#[derive(Default)]
struct RegistryBuilder {
    types: HashMap<String, MessageDescriptor>,
    origins: BTreeMap<String, PathBuf>,
}

impl RegistryBuilder {
    fn register(
        &mut self,
        path: &Path,
        pool: &DescriptorPool,
        candidates: Vec<String>,
    ) -> Result<(), RegistryError> {
        if candidates.is_empty() {
            tracing::warn!("No message types found! [{}]", path.display());
            return Ok(());
        }
        tracing::info!(
            "Total [{}] message types in [{}]:\n- {}",
            candidates.len(),
            path.display(),
            display_list(&candidates)
        );

        for name in candidates {
            let desc = pool.get_message_by_name(&name).ok_or_else(|| {
                RegistryError::UnresolvedType {
                    name: name.clone(),
                    path: path.to_path_buf(),
                }
            })?;

            if let Some(first) = self.origins.get(&name) {
                return Err(RegistryError::DuplicateType {
                    name,
                    first: first.clone(),
                    second: path.to_path_buf(),
                });
            }
            self.origins.insert(name.clone(), path.to_path_buf());
            self.types.insert(name, desc);
        }

        Ok(())
    }

    fn finish(self, proto_dir: &Path) -> Result<MessageTypeRegistry, RegistryError> {
        if self.types.is_empty() {
            return Err(RegistryError::NoMessageTypes(proto_dir.to_path_buf()));
        }
        Ok(MessageTypeRegistry { types: self.types })
    }
}

/// Fully-qualified names of `messages`, nested ones included. Synthetic map
/// entry types are not addressable and are skipped.
fn message_type_names(messages: impl Iterator<Item = MessageDescriptor>) -> Vec<String> {
    messages
        .filter(|m| !m.is_map_entry())
        .map(|m| m.full_name().to_string())
        .collect()
}

fn display_list<I>(items: I) -> String
where
    I: IntoIterator,
    I::Item: std::fmt::Display,
{
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("\n- ")
}
