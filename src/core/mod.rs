pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod output;
pub mod process;
pub mod registry;
pub mod tool;
pub mod types;

pub use context::ExecutionContext;
pub use dispatcher::{CallToolResult, Dispatcher, TextContent};
pub use error::AppError;
pub use output::SuccessPolicy;
pub use process::{CommandExecutor, ProcessError, ProcessRequest, ProcessRunner, TokioProcessRunner};
pub use registry::ToolRegistry;
pub use tool::{CommandTool, CommandToolHandler, Tool, ToolDescriptor};
pub use types::ErrorCategory;
