//! Tool abstractions: specs, the [`Tool`] trait, the registry, and the
//! built-in tool set.
//!
//! # Defining tools
//!
//! - **[`FnTool`]**: closure-based. [`FnTool::typed`] deserializes the
//!   arguments into a struct first. Best for stateless tools.
//! - **`impl Tool`**: a struct holding its own [`ToolSpec`](spec::ToolSpec).
//!   Best for tools with state (tables, clients, counters).
//!
//! # Submodules
//!
//! - [`spec`]: [`ToolSpec`](spec::ToolSpec) builder, parameter types and
//!   coercion, JSON Schema export.
//! - [`core`]: [`Tool`] trait, [`ToolRegistry`], [`FnTool`], argument
//!   validation.
//! - [`builtin`]: `calc`, `weather`, `kb`, `unit_converter`, `translator`,
//!   `random_quote`. Register all at once with
//!   [`ToolRegistry::with_builtin_tools()`].

pub mod builtin;
pub mod core;
pub mod spec;

pub use builtin::{KnowledgeBase, KnowledgeBaseError};
pub use self::core::{
    Arguments, FnTool, Tool, ToolError, ToolErrorKind, ToolFuture, ToolRegistry,
    validate_arguments,
};
pub use spec::{ParamSpec, ParamType, ToolSpec};
