// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Request validation: content type negotiation and query parameters.

use crate::codec::WireMode;

/// Query parameters of an ingest request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    /// Registry key of the posted message type.
    pub msgtype: Option<String>,
    /// `"true"` selects batch dispatch.
    pub batch: Option<String>,
}

impl QueryParams {
    /// Whether the batch flag is set. Any value other than `"true"` is single dispatch.
    pub fn is_batch(&self) -> bool {
        self.batch.as_deref() == Some("true")
    }
}

/// Whether `content_type` is the media type accepted in `mode`.
pub fn validate_content_type(content_type: Option<&str>, mode: WireMode) -> bool {
    content_type == Some(mode.content_type())
}

/// Extract `msgtype` and `batch` from a raw query string.
///
/// When a key repeats, its first value wins. A missing or unparsable query
/// string yields empty parameters; the caller rejects the request on the
/// missing `msgtype`.
pub fn extract_params(query: Option<&str>) -> QueryParams {
    let Some(query) = query else {
        tracing::warn!("Empty query string! 'msgtype' is required!");
        return QueryParams::default();
    };

    let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(query) {
        Ok(pairs) => pairs,
        Err(e) => {
            tracing::warn!("Invalid query string [{}]: {}", query, e);
            return QueryParams::default();
        }
    };

    let mut params = QueryParams::default();
    for (key, value) in pairs {
        let slot = match key.as_str() {
            "msgtype" => &mut params.msgtype,
            "batch" => &mut params.batch,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value);
        } else {
            tracing::debug!("Repeated '{}' in 'query_string' ignored [{}]", key, query);
        }
    }

    if params.msgtype.is_none() {
        tracing::warn!("'msgtype' not found in 'query_string' [{}]", query);
    }
    if params.batch.is_none() {
        tracing::debug!("'batch' not found in 'query_string' [{}]", query);
    }

    params
}
