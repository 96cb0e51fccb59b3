pub mod registry;
pub mod schema;
pub mod types;

pub use registry::ToolRegistry;
pub use schema::{InputSchema, ParamKind};
pub use types::{canonical_id, ToolAdapter, ToolCall, ToolDefinition, ToolEntry, ToolResult, ToolSchema};
