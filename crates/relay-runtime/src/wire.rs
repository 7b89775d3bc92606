//! JSON + base64 envelopes exchanged with the control endpoint.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RuntimeError, RuntimeResult};
use crate::http::{Request, Response};

const DEFAULT_FORWARDED_PROTO: &str = "https";
const DEFAULT_FORWARDED_HOST: &str = "localhost";

/// One invocation delivered by `invocation/next`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationEvent {
    pub id: String,
    pub trace_id: Option<String>,
    /// JSON-encoded [`WireRequest`].
    pub body: String,
}

/// Request as carried in the invocation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRequest {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Base64 body; absent means empty.
    #[serde(default)]
    pub body: Option<String>,
}

impl WireRequest {
    pub fn parse(payload: &str) -> RuntimeResult<Self> {
        serde_json::from_str(payload).map_err(|e| RuntimeError::InvalidRequest {
            message: format!("failed to parse invocation payload: {}", e),
        })
    }

    /// Build the handler-facing request.
    ///
    /// The URL is `x-forwarded-proto://x-forwarded-host` with `path` resolved
    /// against it.
    pub fn into_request(self) -> RuntimeResult<Request> {
        let method = Method::from_bytes(self.method.as_bytes()).map_err(|e| {
            RuntimeError::InvalidRequest {
                message: format!("invalid method {:?}: {}", self.method, e),
            }
        })?;

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                RuntimeError::InvalidRequest {
                    message: format!("invalid header name {:?}: {}", name, e),
                }
            })?;
            let value =
                HeaderValue::from_str(value).map_err(|e| RuntimeError::InvalidRequest {
                    message: format!("invalid value for header {}: {}", name, e),
                })?;
            headers.append(name, value);
        }

        let proto = header_str(&headers, "x-forwarded-proto").unwrap_or(DEFAULT_FORWARDED_PROTO);
        let host = header_str(&headers, "x-forwarded-host").unwrap_or(DEFAULT_FORWARDED_HOST);
        let base = format!("{}://{}", proto, host);
        let url = Url::parse(&base)
            .and_then(|base| base.join(&self.path))
            .map_err(|e| RuntimeError::InvalidRequest {
                message: format!("cannot resolve {:?} against {}: {}", self.path, base, e),
            })?;

        let body = match self.body.as_deref() {
            None | Some("") => Bytes::new(),
            Some(encoded) => {
                Bytes::from(STANDARD.decode(encoded).map_err(|e| {
                    RuntimeError::InvalidRequest {
                        message: format!("request body is not valid base64: {}", e),
                    }
                })?)
            }
        };

        Ok(Request {
            method,
            url,
            headers,
            body,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Response posted back to `invocation/{id}/response`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// Always `"base64"`.
    pub encoding: String,
    pub body: String,
}

impl WireResponse {
    /// Drain the response body and encode it.
    ///
    /// Repeated headers are joined with `", "`.
    pub async fn from_response(response: Response) -> RuntimeResult<Self> {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in &response.headers {
            let value = String::from_utf8_lossy(value.as_bytes());
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert_with(|| value.into_owned());
        }

        let body = response.body.collect().await.map_err(|e| {
            RuntimeError::HandlerExecution {
                message: format!("failed to read response body: {}", e),
                causes: Vec::new(),
            }
        })?;

        Ok(Self {
            status_code: response.status.as_u16(),
            headers,
            encoding: "base64".to_string(),
            body: STANDARD.encode(&body),
        })
    }
}

/// Body posted to `invocation/{id}/error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error_type: String,
    pub error_message: String,
    pub stack_trace: Vec<String>,
}

impl ErrorEnvelope {
    /// The trace drops its first line, which would repeat type and message.
    pub fn from_error(err: &RuntimeError) -> Self {
        let error_type = err.error_type().to_string();
        let error_message = err.to_string();

        let mut trace = vec![format!("{}: {}", error_type, error_message)];
        if let RuntimeError::HandlerExecution { causes, .. } = err {
            trace.extend(causes.iter().map(|c| format!("    caused by: {}", c)));
        }

        Self {
            error_type,
            error_message,
            stack_trace: trace.into_iter().skip(1).collect(),
        }
    }
}
