//! Evaluation Context

use crate::PluginRegistry;
use std::sync::Arc;
use tblfm_core::DEFAULT_DIVISION_DIGITS;

/// Settings shared by every evaluation of one batch of directives
#[derive(Clone)]
pub struct EvalContext {
    /// Significant digits kept on quotients (`/`, `mean`, `median`)
    pub division_digits: usize,
    pub registry: Arc<PluginRegistry>,
}

impl EvalContext {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            division_digits: DEFAULT_DIVISION_DIGITS,
            registry,
        }
    }

    pub fn with_division_digits(mut self, digits: usize) -> Self {
        self.division_digits = digits.max(1);
        self
    }
}
