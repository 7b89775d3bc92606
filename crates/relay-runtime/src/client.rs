//! Control-plane HTTP client.
//!
//! This is the only place that interprets control endpoint status codes.
//! Every unexpected status is a [`RuntimeError::Protocol`]: no retries.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::wire::{ErrorEnvelope, InvocationEvent, WireResponse};

const USER_AGENT_VALUE: &str = concat!("relay-runtime/", env!("CARGO_PKG_VERSION"));

pub const HEADER_REQUEST_ID: &str = "lambda-runtime-aws-request-id";
pub const HEADER_TRACE_ID: &str = "lambda-runtime-trace-id";
pub const HEADER_FUNCTION_ERROR_TYPE: &str = "lambda-runtime-function-error-type";

/// Client for the runtime API of one function instance.
#[derive(Debug, Clone)]
pub struct ControlClient {
    client: reqwest::Client,
    base_url: String,
    post_timeout: Option<Duration>,
}

impl ControlClient {
    pub fn new(config: &RuntimeConfig) -> RuntimeResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        // No client-wide timeout: `invocation/next` blocks until work arrives.
        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(|e| RuntimeError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.runtime_base_url(),
            post_timeout: config.post_timeout_secs.map(Duration::from_secs),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Long-poll for the next invocation.
    pub async fn next_invocation(&self) -> RuntimeResult<InvocationEvent> {
        let url = format!("{}/invocation/next", self.base_url);
        debug!(url = %url, "waiting for next invocation");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Protocol {
                message: format!("unexpected status {} from invocation/next: {}", status, body),
            });
        }

        let headers = response.headers();
        let trace_id = header_string(headers, HEADER_TRACE_ID);
        let id = header_string(headers, HEADER_REQUEST_ID).ok_or_else(|| {
            RuntimeError::Protocol {
                message: format!("invocation/next response is missing {}", HEADER_REQUEST_ID),
            }
        })?;

        let body = response.text().await.map_err(|e| RuntimeError::Network {
            message: format!("failed to read invocation payload: {}", e),
        })?;

        Ok(InvocationEvent { id, trace_id, body })
    }

    pub async fn post_response(&self, id: &str, response: &WireResponse) -> RuntimeResult<()> {
        let url = format!("{}/invocation/{}/response", self.base_url, id);
        self.post(&url, response, None).await
    }

    pub async fn post_error(&self, id: &str, envelope: &ErrorEnvelope) -> RuntimeResult<()> {
        let url = format!("{}/invocation/{}/error", self.base_url, id);
        self.post(&url, envelope, Some("Unhandled")).await
    }

    async fn post<T: Serialize>(
        &self,
        url: &str,
        body: &T,
        error_type: Option<&str>,
    ) -> RuntimeResult<()> {
        let mut request = self.client.post(url).json(body);
        if let Some(error_type) = error_type {
            request = request.header(HEADER_FUNCTION_ERROR_TYPE, error_type);
        }
        if let Some(timeout) = self.post_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(RuntimeError::Protocol {
                message: format!("unexpected status {} from {}: {}", status, url, body),
            });
        }

        debug!(url = %url, "posted invocation result");
        Ok(())
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
}
