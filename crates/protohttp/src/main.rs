// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! protohttp CLI
//!
//! Serves the protobuf ingestion endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Binary in, binary out on POST /debug.test
//! protohttp --proto-dir ./protos --tag debug.test
//!
//! # JSON in, binary out, over TLS
//! protohttp --proto-dir ./protos --tag debug.test --in-mode json \
//!     --tls-cert server.crt --tls-key server.key
//!
//! # Using configuration file
//! protohttp --config protohttp.toml
//!
//! # Check a configuration and its schemas without serving
//! protohttp validate --config protohttp.toml
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use protohttp::{
    build_lookup, compile, create_sink, shutdown_signal, ConfigError, IngestConfig,
    IngestEndpoint, ProtocCompiler, SinkConfig, TransportConfig, TransportProtocol, WireMode,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Protobuf over HTTP ingestion endpoint
#[derive(Parser, Debug)]
#[command(name = "protohttp")]
#[command(about = "Ingest protobuf messages over HTTP(S) and forward them downstream")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the .proto schemas
    #[arg(long, conflicts_with = "config")]
    proto_dir: Option<PathBuf>,

    /// Tag of emitted events, also the route path
    #[arg(short, long, conflicts_with = "config")]
    tag: Option<String>,

    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// HTTP server port
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Input wire mode (binary, json)
    #[arg(long, default_value = "binary")]
    in_mode: WireMode,

    /// Output wire mode (binary, json)
    #[arg(long, default_value = "binary")]
    out_mode: WireMode,

    /// Schema compiler executable
    #[arg(long, default_value = "protoc")]
    protoc: String,

    /// Largest accepted request body in bytes
    #[arg(long, default_value = "16777216")]
    max_body_bytes: usize,

    /// PEM certificate chain; enables TLS
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// PEM private key
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "protohttp.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file and compile its schemas
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Handle subcommands
    if let Some(cmd) = &args.command {
        init_logging(args.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = build_config(&args)?;
    init_logging(&config.log_level);

    tracing::info!("protohttp v{}", env!("CARGO_PKG_VERSION"));

    let sink = create_sink(&config.sink, config.out_mode).context("Could not open sink")?;
    let endpoint = IngestEndpoint::start(config, Arc::new(sink))?;
    endpoint.serve(shutdown_signal()).await?;

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_config(args: &Args) -> anyhow::Result<IngestConfig> {
    // Load from file if specified
    if let Some(ref config_path) = args.config {
        let mut config = IngestConfig::from_file(config_path)
            .with_context(|| format!("Could not load [{}]", config_path.display()))?;
        if let Some(ref level) = args.log_level {
            config.log_level = level.clone();
        }
        return Ok(config);
    }

    // Build from command line arguments
    let proto_dir = args.proto_dir.clone().ok_or_else(|| {
        ConfigError::Invalid("Missing --proto-dir (or use --config)".into())
    })?;
    let tag = args
        .tag
        .clone()
        .ok_or_else(|| ConfigError::Invalid("Missing --tag (or use --config)".into()))?;

    let mut config = IngestConfig::new(proto_dir, tag)
        .in_mode(args.in_mode)
        .out_mode(args.out_mode);
    config.bind = args.bind.clone();
    config.port = args.port;
    config.protoc = args.protoc.clone();
    config.max_body_bytes = args.max_body_bytes;
    if let Some(ref level) = args.log_level {
        config.log_level = level.clone();
    }
    if args.tls_cert.is_some() || args.tls_key.is_some() {
        config.transport = TransportConfig {
            protocol: TransportProtocol::Tls,
            cert_path: args.tls_cert.clone(),
            key_path: args.tls_key.clone(),
        };
    }

    config.validate()?;
    Ok(config)
}

fn cmd_gen_config(output: &Path) -> anyhow::Result<()> {
    let mut config =
        IngestConfig::new("/etc/protohttp/protos", "debug.test").out_mode(WireMode::Json);
    config.sink = SinkConfig::File {
        path: "/var/log/protohttp/events.log".into(),
        max_size: 64 * 1024 * 1024,
        max_files: 5,
    };

    let toml_str = toml::to_string_pretty(&config)?;

    // Add comments
    let content = format!(
        r#"# protohttp configuration
# Generated by protohttp gen-config
#
# Requests: POST /<tag>?msgtype=<package.Message>[&batch=true]
# TLS: set [transport] protocol = "tls" with cert_path and key_path

{}
"#,
        toml_str
    );

    std::fs::write(output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> anyhow::Result<()> {
    let config = match IngestConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    };

    println!("Configuration valid!");
    println!();
    println!("Route:     POST {}", config.route_path());
    println!("Listen:    {}", config.listen_addr());
    println!("Modes:     {} -> {}", config.in_mode, config.out_mode);
    println!("Proto dir: {}", config.proto_dir.display());
    println!();

    let compiler = ProtocCompiler::new(config.protoc.clone());
    let artifacts = match compile(&config.proto_dir, &compiler) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            eprintln!("Schemas invalid: {}", e);
            std::process::exit(1);
        }
    };
    let registry = build_lookup(&artifacts);
    artifacts.remove_all();

    match registry {
        Ok(registry) => {
            println!("Message types [{}]:", registry.len());
            for name in registry.names() {
                println!("  {}", name);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Schemas invalid: {}", e);
            std::process::exit(1);
        }
    }
}
