//! tblfm Standard Library

pub mod functions;

use tblfm_plugin::PluginRegistry;

/// Load standard library into registry
pub fn load_standard_library(registry: PluginRegistry) -> PluginRegistry {
    registry
        .with_function(functions::Sum)
        .with_function(functions::Mean)
        .with_function(functions::Median)
}

/// Create registry with standard library
pub fn standard_registry() -> PluginRegistry {
    load_standard_library(PluginRegistry::new())
}
