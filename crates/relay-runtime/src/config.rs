//! Runtime configuration read from the process environment.

use std::path::{Path, PathBuf};

use crate::error::{RuntimeError, RuntimeResult};

pub const ENV_RUNTIME_API: &str = "AWS_LAMBDA_RUNTIME_API";
pub const ENV_HANDLER: &str = "_HANDLER";
pub const ENV_ENTRYPOINT: &str = "ENTRYPOINT";
pub const ENV_TASK_ROOT: &str = "LAMBDA_TASK_ROOT";
pub const ENV_CACHE_DIR: &str = "RELAY_CACHE_DIR";
pub const ENV_POST_TIMEOUT: &str = "RELAY_RUNTIME_TIMEOUT";

/// Trace id exported to the handler for the invocation in flight.
pub const ENV_TRACE_ID: &str = "_X_AMZN_TRACE_ID";

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Control endpoint authority (`host:port`, or a full base URL).
    pub api: String,

    /// Handler module specifier.
    pub handler: String,

    /// Directory relative specifiers resolve against.
    pub task_root: Option<PathBuf>,

    /// Compiler cache directory staged next to the handler.
    pub cache_dir: Option<PathBuf>,

    /// Timeout for response/error posts, in seconds. The long-poll never times out.
    pub post_timeout_secs: Option<u64>,
}

impl RuntimeConfig {
    pub fn new(api: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            handler: handler.into(),
            task_root: None,
            cache_dir: None,
            post_timeout_secs: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `AWS_LAMBDA_RUNTIME_API` | Control endpoint authority (required) |
    /// | `ENTRYPOINT` | Handler module specifier (preferred) |
    /// | `_HANDLER` | Handler module specifier (fallback) |
    /// | `LAMBDA_TASK_ROOT` | Base for relative specifiers |
    /// | `RELAY_CACHE_DIR` | Relocated compiler cache |
    /// | `RELAY_RUNTIME_TIMEOUT` | Post timeout in seconds |
    pub fn from_env() -> RuntimeResult<Self> {
        let api = non_empty_var(ENV_RUNTIME_API).ok_or_else(|| RuntimeError::Config {
            message: format!("{} is not set", ENV_RUNTIME_API),
        })?;

        let handler = non_empty_var(ENV_ENTRYPOINT)
            .or_else(|| non_empty_var(ENV_HANDLER))
            .ok_or_else(|| RuntimeError::Config {
                message: format!("neither {} nor {} is set", ENV_ENTRYPOINT, ENV_HANDLER),
            })?;

        Ok(Self {
            api,
            handler,
            task_root: non_empty_var(ENV_TASK_ROOT).map(PathBuf::from),
            cache_dir: non_empty_var(ENV_CACHE_DIR).map(PathBuf::from),
            post_timeout_secs: non_empty_var(ENV_POST_TIMEOUT).and_then(|v| v.parse().ok()),
        })
    }

    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = api.into();
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = handler.into();
        self
    }

    pub fn with_task_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.task_root = Some(root.into());
        self
    }

    /// Handler specifier as a path, joined to the task root when relative.
    pub fn handler_path(&self) -> PathBuf {
        let spec = self.handler.strip_prefix("file://").unwrap_or(&self.handler);
        let path = Path::new(spec);
        match &self.task_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Base URL of the runtime API.
    pub fn runtime_base_url(&self) -> String {
        let api = self.api.trim_end_matches('/');
        if api.contains("://") {
            format!("{}/2018-06-01/runtime", api)
        } else {
            format!("http://{}/2018-06-01/runtime", api)
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
