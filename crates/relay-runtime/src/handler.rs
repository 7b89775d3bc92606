//! Handler contract, module loading and the once-only handler slot.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::{RuntimeError, RuntimeResult};
use crate::http::{Request, Response};

/// User code serving one request.
///
/// Returning `Ok(None)` stands for "no recognizable response"; the loop
/// substitutes an empty default response.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: Request) -> anyhow::Result<Option<Response>>;
}

/// What a loaded module exports as its default.
#[derive(Clone)]
pub enum Export {
    Callable(Arc<dyn Handler>),
    /// Something that cannot be invoked; the string describes what it is.
    NotCallable(String),
}

impl std::fmt::Debug for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Callable(_) => f.write_str("Export::Callable"),
            Self::NotCallable(kind) => write!(f, "Export::NotCallable({})", kind),
        }
    }
}

/// Resolves a handler module specifier to its default export.
#[async_trait]
pub trait HandlerLoader: Send + Sync {
    async fn load(&self, specifier: &str) -> RuntimeResult<Export>;
}

#[async_trait]
impl<T: HandlerLoader + ?Sized> HandlerLoader for Arc<T> {
    async fn load(&self, specifier: &str) -> RuntimeResult<Export> {
        (**self).load(specifier).await
    }
}

/// Loader over handlers registered in-process.
#[derive(Default, Clone)]
pub struct StaticLoader {
    modules: HashMap<String, Export>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, specifier: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.modules
            .insert(specifier.into(), Export::Callable(handler));
        self
    }

    pub fn with_export(mut self, specifier: impl Into<String>, export: Export) -> Self {
        self.modules.insert(specifier.into(), export);
        self
    }
}

#[async_trait]
impl HandlerLoader for StaticLoader {
    async fn load(&self, specifier: &str) -> RuntimeResult<Export> {
        self.modules
            .get(specifier)
            .cloned()
            .ok_or_else(|| RuntimeError::HandlerLoad {
                message: format!("cannot find module {:?}", specifier),
            })
    }
}

/// Holds the handler for the lifetime of the process.
///
/// Starts unloaded. The first successful load fills it and it is never
/// reset; a failed load leaves it unloaded so the next invocation retries.
pub struct HandlerSlot {
    specifier: String,
    handler: OnceCell<Arc<dyn Handler>>,
}

impl HandlerSlot {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            handler: OnceCell::new(),
        }
    }

    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    pub fn is_loaded(&self) -> bool {
        self.handler.initialized()
    }

    /// Return the loaded handler, loading it through `loader` on first use.
    pub async fn get_or_load(&self, loader: &dyn HandlerLoader) -> RuntimeResult<Arc<dyn Handler>> {
        let handler = self
            .handler
            .get_or_try_init(|| async {
                match loader.load(&self.specifier).await? {
                    Export::Callable(handler) => {
                        info!(handler = %self.specifier, "loaded handler");
                        Ok(handler)
                    }
                    Export::NotCallable(kind) => Err(RuntimeError::HandlerLoad {
                        message: format!(
                            "invalid handler {:?}: default export is {}, expected a function",
                            self.specifier, kind
                        ),
                    }),
                }
            })
            .await?;
        Ok(Arc::clone(handler))
    }
}
