//! Single-invocation runtime loop.
//!
//! One invocation is in flight at a time: the next long-poll is issued only
//! after the current result or error has been posted, so invocations are
//! handled strictly in delivery order.

use std::convert::Infallible;

use tracing::{info, info_span, warn, Instrument};

use crate::client::ControlClient;
use crate::config::{RuntimeConfig, ENV_TRACE_ID};
use crate::error::{RuntimeError, RuntimeResult};
use crate::handler::{HandlerLoader, HandlerSlot};
use crate::wire::{ErrorEnvelope, InvocationEvent, WireRequest, WireResponse};

/// How one invocation ended. Both outcomes were posted successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    Responded { id: String, status_code: u16 },
    Failed { id: String, error_type: String },
}

/// Polls the control endpoint and dispatches each invocation to the handler.
pub struct EventLoop<L> {
    client: ControlClient,
    loader: L,
    slot: HandlerSlot,
}

impl<L: HandlerLoader> EventLoop<L> {
    pub fn new(config: &RuntimeConfig, loader: L) -> RuntimeResult<Self> {
        Ok(Self::with_client(
            ControlClient::new(config)?,
            config.handler.clone(),
            loader,
        ))
    }

    pub fn with_client(client: ControlClient, specifier: impl Into<String>, loader: L) -> Self {
        Self {
            client,
            loader,
            slot: HandlerSlot::new(specifier),
        }
    }

    pub fn is_handler_loaded(&self) -> bool {
        self.slot.is_loaded()
    }

    /// Loop until a process-scoped error occurs.
    pub async fn run(&self) -> RuntimeResult<Infallible> {
        info!(handler = %self.slot.specifier(), api = %self.client.base_url(), "runtime loop started");
        loop {
            self.run_once().await?;
        }
    }

    /// Fetch, handle and answer exactly one invocation.
    ///
    /// Only protocol and transport failures are returned as errors; handler
    /// failures are posted to the error endpoint and reported as
    /// [`InvocationOutcome::Failed`].
    pub async fn run_once(&self) -> RuntimeResult<InvocationOutcome> {
        let event = self.client.next_invocation().await?;
        set_trace_id(event.trace_id.as_deref());

        let span = info_span!("invocation", id = %event.id);
        async {
            match self.handle(&event).await {
                Ok(wire) => {
                    let status_code = wire.status_code;
                    self.client.post_response(&event.id, &wire).await?;
                    info!(status = status_code, "invocation completed");
                    Ok(InvocationOutcome::Responded {
                        id: event.id.clone(),
                        status_code,
                    })
                }
                Err(err) if err.is_fatal() => Err(err),
                Err(err) => {
                    warn!(error = %err, error_type = err.error_type(), "invocation failed");
                    let envelope = ErrorEnvelope::from_error(&err);
                    self.client.post_error(&event.id, &envelope).await?;
                    Ok(InvocationOutcome::Failed {
                        id: event.id.clone(),
                        error_type: envelope.error_type,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn handle(&self, event: &InvocationEvent) -> RuntimeResult<WireResponse> {
        let wire = WireRequest::parse(&event.body)?;
        let handler = self.slot.get_or_load(&self.loader).await?;
        let request = wire.into_request()?;

        let response = handler
            .call(request)
            .await
            .map_err(RuntimeError::handler_failed)?
            .unwrap_or_default();

        WireResponse::from_response(response).await
    }
}

/// Export the trace id of the invocation in flight, clearing a stale one.
fn set_trace_id(trace_id: Option<&str>) {
    match trace_id {
        Some(id) => std::env::set_var(ENV_TRACE_ID, id),
        None => std::env::remove_var(ENV_TRACE_ID),
    }
}
