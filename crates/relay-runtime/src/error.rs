//! Error types for the runtime loop.

/// Runtime errors.
///
/// Protocol, network and config errors are process-scoped: they end the
/// loop. The others are scoped to one invocation and are reported to the
/// control endpoint as an error envelope.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Unexpected status or missing header from the control endpoint.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Transport failure talking to the control endpoint.
    #[error("network error: {message}")]
    Network { message: String },

    /// Startup configuration is missing or invalid.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The handler module could not be loaded or does not export a callable handler.
    #[error("{message}")]
    HandlerLoad { message: String },

    /// The handler failed, or its response body could not be read.
    #[error("{message}")]
    HandlerExecution { message: String, causes: Vec<String> },

    /// The wire request could not be decoded into a request.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl RuntimeError {
    /// Wrap an error raised by handler code, keeping its cause chain.
    pub fn handler_failed(err: anyhow::Error) -> Self {
        Self::HandlerExecution {
            message: err.to_string(),
            causes: err.chain().skip(1).map(|c| c.to_string()).collect(),
        }
    }

    /// Whether the error must terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Protocol { .. } | Self::Network { .. } | Self::Config { .. }
        )
    }

    /// Name reported as `errorType` in the error envelope.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Protocol { .. } => "ProtocolError",
            Self::Network { .. } => "NetworkError",
            Self::Config { .. } => "ConfigError",
            Self::HandlerLoad { .. } => "HandlerLoadError",
            Self::HandlerExecution { .. } => "HandlerExecutionError",
            Self::InvalidRequest { .. } => "InvalidRequestError",
        }
    }

    /// Exit code for the bootstrap process.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 1,
            Self::Protocol { .. } => 2,
            Self::Network { .. } => 3,
            _ => 4,
        }
    }
}

impl From<reqwest::Error> for RuntimeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
