// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-request state machine.
//!
//! ```text
//! Received -> ContentValidated -> TypeResolved -> Decoded -> SingleEmit | BatchEmit
//! ```
//!
//! Every transition either advances or short-circuits with a [`Rejection`];
//! nothing is emitted to the sink unless the whole request is valid.
//!
//! # Batch envelopes
//!
//! With `batch=true` the posted message must follow a schema convention the
//! deployer owns: a string field `type` naming the element message type and
//! a repeated message field `batch` holding the elements, e.g.
//!
//! ```proto
//! message Batch {
//!   string type = 1;
//!   repeated Log batch = 2;
//! }
//! ```
//!
//! The schema format does not enforce any relation between `type` and the
//! element type of `batch`; elements are re-encoded as the declared `type`.

use crate::codec::{self, WireMode};
use crate::error::Rejection;
use crate::registry::MessageTypeRegistry;
use crate::sink::{EventSink, EventStream, EventTime, Record};
use crate::validator::{extract_params, validate_content_type};
use bytes::Bytes;
use prost_reflect::{DynamicMessage, Value};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// Name of the envelope field naming the element type.
pub const BATCH_TYPE_FIELD: &str = "type";

/// Name of the envelope field carrying the elements.
pub const BATCH_ELEMENTS_FIELD: &str = "batch";

/// Transport-independent view of an ingest request.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub peer: Option<SocketAddr>,
    pub content_type: Option<String>,
    pub query: Option<String>,
    pub body: Bytes,
}

impl IncomingRequest {
    /// `ip:port` of the peer, or `-`.
    pub fn peer_display(&self) -> String {
        self.peer
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// Successful outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepted {
    /// One record emitted.
    Single,
    /// `batch_size` records of `batch_type` emitted as one stream.
    Batch {
        batch_type: String,
        batch_size: usize,
    },
}

impl fmt::Display for Accepted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => f.write_str("Message received!"),
            Self::Batch {
                batch_type,
                batch_size,
            } => write!(
                f,
                "Batch received! [batch_type: {}, batch_size: {} messages]",
                batch_type, batch_size
            ),
        }
    }
}

/// Validates, decodes and emits ingest requests.
#[derive(Clone)]
pub struct BatchDispatcher {
    registry: Arc<MessageTypeRegistry>,
    sink: Arc<dyn EventSink>,
    tag: String,
    in_mode: WireMode,
    out_mode: WireMode,
}

impl fmt::Debug for BatchDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchDispatcher")
            .field("tag", &self.tag)
            .field("in_mode", &self.in_mode)
            .field("out_mode", &self.out_mode)
            .field("registered", &self.registry.len())
            .finish()
    }
}

impl BatchDispatcher {
    pub fn new(
        registry: Arc<MessageTypeRegistry>,
        sink: Arc<dyn EventSink>,
        tag: impl Into<String>,
        in_mode: WireMode,
        out_mode: WireMode,
    ) -> Self {
        Self {
            registry,
            sink,
            tag: tag.into(),
            in_mode,
            out_mode,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn in_mode(&self) -> WireMode {
        self.in_mode
    }

    pub fn out_mode(&self) -> WireMode {
        self.out_mode
    }

    pub fn registry(&self) -> &MessageTypeRegistry {
        &self.registry
    }

    /// Run one request through the state machine.
    pub fn dispatch(&self, req: &IncomingRequest) -> Result<Accepted, Rejection> {
        let peer = req.peer_display();
        let size = req.body.len();

        tracing::info!("[R] {{{}}} [{}, size: {} bytes]", self.in_mode, peer, size);
        tracing::debug!("Dumping serialized message [{} bytes]:\n{:?}", size, req.body);

        let result = self.run(req, size);
        match &result {
            Ok(accepted) => tracing::debug!("[>] Done [{}] {}", peer, accepted),
            Err(rejection) => tracing::warn!("[X] Message rejected! [{}] {}", peer, rejection),
        }
        result
    }

    fn run(&self, req: &IncomingRequest, size: usize) -> Result<Accepted, Rejection> {
        // Received -> ContentValidated
        let content_type = req.content_type.as_deref();
        if !validate_content_type(content_type, self.in_mode) {
            return Err(Rejection::InvalidContentType(req.content_type.clone()));
        }
        tracing::debug!("[>] Content-Type: {}", content_type.unwrap_or_default());

        // ContentValidated -> TypeResolved
        let params = extract_params(req.query.as_deref());
        let Some((msgtype, desc)) = params
            .msgtype
            .as_deref()
            .and_then(|name| self.registry.get(name).map(|desc| (name, desc)))
        else {
            return Err(Rejection::InvalidMsgType(params.msgtype.clone()));
        };
        let is_batch = params.is_batch();
        tracing::debug!(
            "[>] Query parameters: [msgtype: {}, batch: {}]",
            msgtype,
            is_batch
        );

        // TypeResolved -> Decoded
        let message = codec::decode(desc, &req.body, self.in_mode).map_err(|e| {
            tracing::error!(
                "Incompatible message! [msgtype: {}, size: {} bytes] {}",
                msgtype,
                size,
                e
            );
            Rejection::IncompatibleMessage {
                msgtype: msgtype.to_string(),
                size,
            }
        })?;

        if is_batch {
            self.emit_batch(req, msgtype, size, &message)
        } else {
            self.emit_single(req, msgtype, size, &message)
        }
    }

    fn emit_single(
        &self,
        req: &IncomingRequest,
        msgtype: &str,
        size: usize,
        message: &DynamicMessage,
    ) -> Result<Accepted, Rejection> {
        let peer = req.peer_display();
        tracing::info!(
            "[S] {{{}}} [{}, msgtype: {}, size: {} bytes]",
            self.in_mode,
            peer,
            msgtype,
            size
        );

        let time = EventTime::now();
        let payload = self.encode_as(msgtype, message, size)?;
        let out_size = payload.len();
        self.sink.emit_one(&self.tag, time, Record::new(payload));

        tracing::info!(
            "[S] {{{}}} [{}, msgtype: {}, size: {} bytes]",
            self.out_mode,
            peer,
            msgtype,
            out_size
        );
        Ok(Accepted::Single)
    }

    fn emit_batch(
        &self,
        req: &IncomingRequest,
        msgtype: &str,
        size: usize,
        envelope: &DynamicMessage,
    ) -> Result<Accepted, Rejection> {
        let peer = req.peer_display();
        tracing::info!(
            "[B] {{{}}} [{}, msgtype: {}, size: {} bytes]",
            self.in_mode,
            peer,
            msgtype,
            size
        );

        let invalid = || Rejection::InvalidBatch {
            msgtype: msgtype.to_string(),
            size,
        };
        let (batch_type, elements) = unpack_envelope(envelope).ok_or_else(invalid)?;
        let batch_size = elements.len();

        tracing::info!(
            "[B] Emitting message stream/batch [batch_size: {} messages]...",
            batch_size
        );

        // All elements are encoded before anything is emitted.
        let mut stream: EventStream = Vec::with_capacity(batch_size);
        for element in &elements {
            let time = EventTime::now();
            let payload = self.encode_as(&batch_type, element, size)?;
            stream.push((time, Record::new(payload)));
        }
        self.sink.emit_batch(&self.tag, stream);

        let accepted = Accepted::Batch {
            batch_type,
            batch_size,
        };
        tracing::info!(
            "[B] {{{}}} [{}, msgtype: {}] {}",
            self.out_mode,
            peer,
            msgtype,
            accepted
        );
        Ok(accepted)
    }

    /// Encode `message` as registry type `msgtype` in the output mode.
    fn encode_as(
        &self,
        msgtype: &str,
        message: &DynamicMessage,
        size: usize,
    ) -> Result<Bytes, Rejection> {
        tracing::debug!("Serializing [{} > {}]...", self.in_mode, self.out_mode);

        let failed = || Rejection::SerializationFailed {
            msgtype: msgtype.to_string(),
            size,
        };
        let Some(desc) = self.registry.get(msgtype) else {
            tracing::error!("Serialization failed! Unknown message type [{}]", msgtype);
            return Err(failed());
        };

        codec::encode(desc, message, self.out_mode).map_err(|e| {
            tracing::error!(
                "Serialization failed! [msgtype: {}, msg: {:?}] Error: {}",
                msgtype,
                message,
                e
            );
            failed()
        })
    }
}

/// Element type and elements of a batch envelope, or `None` when the message
/// does not follow the envelope convention or carries no elements.
fn unpack_envelope(envelope: &DynamicMessage) -> Option<(String, Vec<DynamicMessage>)> {
    let batch_type = envelope.get_field_by_name(BATCH_TYPE_FIELD)?;
    let batch_type = batch_type.as_str()?;
    if batch_type.is_empty() {
        return None;
    }

    let elements = envelope.get_field_by_name(BATCH_ELEMENTS_FIELD)?;
    let elements = elements
        .as_list()?
        .iter()
        .map(|value| match value {
            Value::Message(message) => Some(message.clone()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if elements.is_empty() {
        return None;
    }

    Some((batch_type.to_string(), elements))
}
