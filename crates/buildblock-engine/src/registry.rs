//! Block type registry.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::context::ReadFileFn;
use crate::custom::{HandlerSourceError, load_handler_source};
use crate::handler::BlockHandler;
use crate::handlers::{
    ATTR, AssetHandler, AttrHandler, IncludeHandler, RemoveHandler, TemplateHandler,
};
use crate::transform::AssetKind;

/// Mapping from block type to handler.
///
/// Built per processor from the built-in handlers plus user-supplied ones. A
/// later registration replaces an earlier one with the same name. Attribute
/// block types (`[src]`, `[href]`, ...) fall back to the `[attr]` entry when no
/// handler is registered under their exact name.
#[derive(Clone)]
pub struct BlockRegistry {
    handlers: HashMap<String, Arc<dyn BlockHandler>>,
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl BlockRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Create a registry with the built-in `remove`, `include`, `js`, `css`,
    /// `template` and `[attr]` handlers.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(RemoveHandler);
        registry.register(IncludeHandler);
        registry.register(AssetHandler::new(AssetKind::Js));
        registry.register(AssetHandler::new(AssetKind::Css));
        registry.register(AttrHandler);
        registry.register(TemplateHandler);
        registry
    }

    /// Register a handler under its own name.
    ///
    /// Returns the handler previously registered under that name.
    pub fn register<H: BlockHandler + 'static>(
        &mut self,
        handler: H,
    ) -> Option<Arc<dyn BlockHandler>> {
        self.register_shared(Arc::new(handler))
    }

    /// Register a shared handler under its own name.
    pub fn register_shared(
        &mut self,
        handler: Arc<dyn BlockHandler>,
    ) -> Option<Arc<dyn BlockHandler>> {
        let name = handler.name().to_owned();
        let previous = self.handlers.insert(name.clone(), handler);
        if previous.is_some() {
            tracing::debug!(block_type = %name, "Overriding registered block handler");
        }
        previous
    }

    /// Load a declarative handler source and register every handler it declares.
    ///
    /// Returns the number of handlers registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or fails validation. Nothing
    /// is registered in that case.
    pub fn load_source(
        &mut self,
        path: &Path,
        read_file: &ReadFileFn,
    ) -> Result<usize, HandlerSourceError> {
        let handlers = load_handler_source(path, read_file)?;
        let count = handlers.len();
        for handler in handlers {
            self.register_shared(handler);
        }
        tracing::debug!(path = %path.display(), count, "Loaded custom block types");
        Ok(count)
    }

    /// Look up the handler for a block type.
    #[must_use]
    pub fn get(&self, block_type: &str) -> Option<&dyn BlockHandler> {
        self.handlers
            .get(block_type)
            .or_else(|| {
                let is_attribute = block_type.starts_with('[') && block_type.ends_with(']');
                is_attribute.then(|| self.handlers.get(ATTR)).flatten()
            })
            .map(AsRef::as_ref)
    }

    /// Check whether a block type has a handler.
    #[must_use]
    pub fn contains(&self, block_type: &str) -> bool {
        self.get(block_type).is_some()
    }

    /// Registered block type names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for BlockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
