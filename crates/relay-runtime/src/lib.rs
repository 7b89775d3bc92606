//! Custom-runtime bootstrap for request/response handlers.
//!
//! Implements the function platform's runtime API loop:
//!
//! 1. long-poll `invocation/next`
//! 2. decode the JSON + base64 [`WireRequest`] into a [`Request`]
//! 3. call the handler, loaded once per process through a [`HandlerLoader`]
//! 4. post a [`WireResponse`] or an [`ErrorEnvelope`]
//!
//! # Quick Start
//!
//! ```no_run
//! use relay_runtime::{CommandLoader, EventLoop, RuntimeConfig};
//!
//! # async fn example() -> relay_runtime::RuntimeResult<()> {
//! let config = RuntimeConfig::from_env()?;
//! let loader = CommandLoader::new(config.task_root.clone());
//! let event_loop = EventLoop::new(&config, loader)?;
//! event_loop.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `AWS_LAMBDA_RUNTIME_API` | Control endpoint authority |
//! | `ENTRYPOINT` / `_HANDLER` | Handler module specifier |
//! | `LAMBDA_TASK_ROOT` | Base directory for relative specifiers |
//! | `RELAY_CACHE_DIR` | Relocated compiler cache, checked at startup |
//! | `RELAY_RUNTIME_TIMEOUT` | Timeout for result posts in seconds |

pub mod client;
pub mod command;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod handler;
pub mod http;
pub mod wire;

pub use client::ControlClient;
pub use command::{CommandHandler, CommandLoader};
pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use event_loop::{EventLoop, InvocationOutcome};
pub use handler::{Export, Handler, HandlerLoader, HandlerSlot, StaticLoader};
pub use http::{Body, Request, Response};
pub use wire::{ErrorEnvelope, InvocationEvent, WireRequest, WireResponse};
