// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP surface of the ingest endpoint.
//!
//! A single route, `POST /<tag>`, feeds every request through the
//! [`BatchDispatcher`]. The compiled schema artifacts live exactly as long
//! as the endpoint: they are created by [`IngestEndpoint::start`] and
//! removed when [`IngestEndpoint::serve`] returns.
//!
//! | Outcome  | Status | Content-Type         | Body                   |
//! |----------|--------|----------------------|------------------------|
//! | single   | 200    | `text/plain`         | empty                  |
//! | batch    | 200    | `application/json`   | `{"status": "..."}`    |
//! | rejected | 400    | `application/json`   | `{"status": "..."}`    |

use crate::compiler::{ProtocCompiler, SchemaCompiler};
use crate::config::{IngestConfig, TransportProtocol};
use crate::dispatch::{Accepted, BatchDispatcher, IncomingRequest};
use crate::error::{Rejection, RegistryError};
use crate::registry::{self, CompiledArtifacts, MessageTypeRegistry};
use crate::sink::EventSink;
use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use bytes::Bytes;
use serde::Serialize;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// In-flight requests get this long to finish once shutdown starts (TLS only).
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Errors raised while serving.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Could not resolve listen address [{addr}]: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Could not bind [{addr}]: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("TLS transport requires 'cert_path' and 'key_path'")]
    MissingTlsFiles,

    #[error("Could not load TLS certificate: {0}")]
    Tls(#[source] io::Error),

    #[error("Server error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Serialize)]
struct StatusBody {
    status: String,
}

impl IntoResponse for Accepted {
    fn into_response(self) -> Response {
        match self {
            Accepted::Single => {
                (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")]).into_response()
            }
            Accepted::Batch { .. } => {
                let body = StatusBody {
                    status: self.to_string(),
                };
                (StatusCode::OK, [(header::CONNECTION, "close")], Json(body)).into_response()
            }
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = StatusBody {
            status: self.to_string(),
        };
        (
            StatusCode::BAD_REQUEST,
            [(header::CONNECTION, "close")],
            Json(body),
        )
            .into_response()
    }
}

/// Build the router serving `POST /<tag>`.
pub fn build_router(dispatcher: BatchDispatcher, max_body_bytes: usize) -> Router {
    let path = format!("/{}", dispatcher.tag());
    Router::new()
        .route(&path, post(ingest))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(dispatcher))
}

/// POST /<tag>
async fn ingest(
    State(dispatcher): State<Arc<BatchDispatcher>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = IncomingRequest {
        peer: connect_info.map(|ConnectInfo(addr)| addr),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        query,
        body,
    };

    match dispatcher.dispatch(&request) {
        Ok(accepted) => accepted.into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

/// A started ingest endpoint: compiled schemas, registry and dispatcher.
#[derive(Debug)]
pub struct IngestEndpoint {
    config: IngestConfig,
    dispatcher: BatchDispatcher,
    artifacts: CompiledArtifacts,
}

impl IngestEndpoint {
    /// Compile the schema directory with `protoc` and build the registry.
    pub fn start(config: IngestConfig, sink: Arc<dyn EventSink>) -> Result<Self, RegistryError> {
        let compiler = ProtocCompiler::new(config.protoc.clone());
        Self::start_with(config, &compiler, sink)
    }

    /// Like [`IngestEndpoint::start`] with a caller-provided compiler.
    ///
    /// Artifacts already written are removed if compiling or building the
    /// registry fails.
    pub fn start_with(
        config: IngestConfig,
        compiler: &dyn SchemaCompiler,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, RegistryError> {
        tracing::info!(
            "Starting [tag: {}, in_mode: {}, out_mode: {}]",
            config.tag,
            config.in_mode,
            config.out_mode
        );

        let artifacts = registry::compile(&config.proto_dir, compiler)?;
        let registry = match registry::build_lookup(&artifacts) {
            Ok(registry) => registry,
            Err(e) => {
                artifacts.remove_all();
                return Err(e);
            }
        };

        Ok(Self::from_parts(config, registry, artifacts, sink))
    }

    /// Assemble an endpoint from an already built registry.
    pub fn from_parts(
        config: IngestConfig,
        registry: MessageTypeRegistry,
        artifacts: CompiledArtifacts,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let dispatcher = BatchDispatcher::new(
            Arc::new(registry),
            sink,
            config.tag.clone(),
            config.in_mode,
            config.out_mode,
        );
        Self {
            config,
            dispatcher,
            artifacts,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &BatchDispatcher {
        &self.dispatcher
    }

    pub fn artifacts(&self) -> &CompiledArtifacts {
        &self.artifacts
    }

    pub fn router(&self) -> Router {
        build_router(self.dispatcher.clone(), self.config.max_body_bytes)
    }

    /// Serve until `shutdown` resolves, then remove the compiled artifacts.
    ///
    /// Artifacts are removed whether the server stopped cleanly or failed.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let result = self.run(shutdown).await;

        tracing::info!("Shutting down...");
        let removed = self.artifacts.remove_all();
        tracing::info!("Removed compiled proto files [{}]", removed);

        result
    }

    async fn run<F>(&self, shutdown: F) -> Result<(), ServeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = resolve(&self.config.listen_addr()).await?;
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        match self.config.transport.protocol {
            TransportProtocol::Tcp => {
                let listener = TcpListener::bind(addr)
                    .await
                    .map_err(|source| ServeError::Bind { addr, source })?;
                tracing::info!(
                    "Listening on http://{}{}",
                    listener.local_addr()?,
                    self.config.route_path()
                );

                axum::serve(listener, app)
                    .with_graceful_shutdown(shutdown)
                    .await?;
            }
            TransportProtocol::Tls => {
                let (Some(cert_path), Some(key_path)) = (
                    self.config.transport.cert_path.as_ref(),
                    self.config.transport.key_path.as_ref(),
                ) else {
                    return Err(ServeError::MissingTlsFiles);
                };
                let tls = RustlsConfig::from_pem_file(cert_path, key_path)
                    .await
                    .map_err(ServeError::Tls)?;
                tracing::info!(
                    "Listening on https://{}{}",
                    addr,
                    self.config.route_path()
                );

                let handle = axum_server::Handle::new();
                let signal = handle.clone();
                tokio::spawn(async move {
                    shutdown.await;
                    signal.graceful_shutdown(Some(SHUTDOWN_GRACE));
                });

                axum_server::bind_rustls(addr, tls)
                    .handle(handle)
                    .serve(app)
                    .await?;
            }
        }

        Ok(())
    }
}

async fn resolve(addr: &str) -> Result<SocketAddr, ServeError> {
    let resolve_err = |source: io::Error| ServeError::Resolve {
        addr: addr.to_string(),
        source,
    };
    tokio::net::lookup_host(addr)
        .await
        .map_err(resolve_err)?
        .next()
        .ok_or_else(|| resolve_err(io::Error::new(io::ErrorKind::NotFound, "no address")))
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Could not listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
