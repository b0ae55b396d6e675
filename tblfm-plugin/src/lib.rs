//! tblfm Plugin System
//!
//! Aggregate functions (`sum`, `mean`, `median`, ...) are plugins: a
//! [`FunctionPlugin`] takes the value of its single argument and folds it
//! into one cell. The [`PluginRegistry`] resolves names at parse time.

mod traits;
mod registry;
mod context;

pub use traits::{FunctionPlugin, FunctionMeta, ArgMeta};
pub use registry::PluginRegistry;
pub use context::EvalContext;

/// Re-export core types for plugin authors
pub mod prelude {
    pub use crate::{FunctionPlugin, FunctionMeta, ArgMeta, PluginRegistry, EvalContext};
    pub use tblfm_core::prelude::*;
}
