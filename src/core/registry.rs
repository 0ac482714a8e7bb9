use crate::core::tool::{Tool, ToolDescriptor};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name-keyed store of tools, in registration order.
///
/// Populated at startup and then shared read-only behind an `Arc`.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tool, replacing any earlier one with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        let name = tool.name().to_string();
        if let Some(index) = self.tools.get_index_of(&name) {
            warn!(tool = %name, "tool already registered, replacing");
            // Keep the original slot so listing order is stable.
            if let Some((_, slot)) = self.tools.get_index_mut(index) {
                *slot = tool;
            }
        } else {
            debug!(tool = %name, "registered tool");
            self.tools.insert(name, tool);
        }
        self
    }

    pub fn register_tool<T: Tool>(&mut self, tool: T) -> &mut Self {
        self.register(Arc::new(tool))
    }

    /// Exact, case-sensitive lookup.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.get(name)
    }

    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        self.tools.values().cloned().collect()
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.values().map(|tool| tool.descriptor()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.tools.clear();
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
