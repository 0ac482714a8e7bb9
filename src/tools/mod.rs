pub mod project;

use crate::core::process::CommandExecutor;
use crate::core::registry::ToolRegistry;
use crate::core::tool::CommandToolHandler;
use project::{InitFeatureTool, InitProjectTool, ListFeaturesTool, StatusTool};
use std::sync::Arc;

/// Register every built-in tool, all sharing one executor.
pub fn register_all_tools(registry: &mut ToolRegistry, executor: Arc<CommandExecutor>) {
    registry
        .register_tool(CommandToolHandler::new(InitProjectTool, Arc::clone(&executor)))
        .register_tool(CommandToolHandler::new(StatusTool, Arc::clone(&executor)))
        .register_tool(CommandToolHandler::new(InitFeatureTool, Arc::clone(&executor)))
        .register_tool(CommandToolHandler::new(ListFeaturesTool, executor));
}
