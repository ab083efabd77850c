//! Managed values for graph execution
//!
//! Managed values are special values that are automatically injected into the state
//! during graph execution. They provide execution context like remaining steps,
//! current step number, and whether this is the last step.
//!
//! # Example
//!
//! ```rust,ignore
//! use pregel_core::managed::{ManagedValueType, ExecutionContext};
//!
//! let context = ExecutionContext::new(10); // max 10 steps
//! context.increment_step();
//!
//! let remaining = context.get_managed_value(ManagedValueType::RemainingSteps);
//! let is_last = context.get_managed_value(ManagedValueType::IsLastStep);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Types of managed values that can be injected into state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagedValueType {
    /// Number of steps remaining before max_steps is reached
    RemainingSteps,

    /// Boolean indicating if this is the last step (remaining_steps == 1)
    IsLastStep,

    /// Current step number (0-indexed)
    CurrentStep,
}

impl ManagedValueType {
    /// Get the state key for this managed value
    pub fn state_key(&self) -> &'static str {
        match self {
            ManagedValueType::RemainingSteps => "__remaining_steps__",
            ManagedValueType::IsLastStep => "__is_last_step__",
            ManagedValueType::CurrentStep => "__current_step__",
        }
    }
}

/// Execution context that tracks managed values
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Current step number (0-indexed)
    current_step: Arc<RwLock<usize>>,

    /// Maximum number of steps allowed
    max_steps: usize,
}

impl ExecutionContext {
    /// Create a new execution context with the given max steps
    pub fn new(max_steps: usize) -> Self {
        Self {
            current_step: Arc::new(RwLock::new(0)),
            max_steps,
        }
    }

    /// Get the current step number
    pub fn current_step(&self) -> usize {
        *self.current_step.read().unwrap()
    }

    /// Get the maximum number of steps
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Get remaining steps (max_steps - current_step)
    pub fn remaining_steps(&self) -> usize {
        self.max_steps.saturating_sub(self.current_step())
    }

    /// Check if this is the last step
    pub fn is_last_step(&self) -> bool {
        self.remaining_steps() <= 1
    }

    /// Increment the step counter
    pub fn increment_step(&self) {
        let mut step = self.current_step.write().unwrap();
        *step += 1;
    }

    /// Set the step counter to a specific value
    pub(crate) fn set_current_step(&self, value: usize) {
        let mut step = self.current_step.write().unwrap();
        *step = value;
    }

    /// Reset the step counter
    pub fn reset(&self) {
        let mut step = self.current_step.write().unwrap();
        *step = 0;
    }

    /// Get a managed value by type
    pub fn get_managed_value(&self, value_type: ManagedValueType) -> Value {
        match value_type {
            ManagedValueType::RemainingSteps => {
                serde_json::json!(self.remaining_steps())
            }
            ManagedValueType::IsLastStep => {
                serde_json::json!(self.is_last_step())
            }
            ManagedValueType::CurrentStep => {
                serde_json::json!(self.current_step())
            }
        }
    }

    /// Inject managed values into state
    pub fn inject_managed_values(&self, state: &mut Value) -> Result<(), String> {
        if let Some(obj) = state.as_object_mut() {
            obj.insert(
                ManagedValueType::RemainingSteps.state_key().to_string(),
                self.get_managed_value(ManagedValueType::RemainingSteps),
            );
            obj.insert(
                ManagedValueType::IsLastStep.state_key().to_string(),
                self.get_managed_value(ManagedValueType::IsLastStep),
            );
            obj.insert(
                ManagedValueType::CurrentStep.state_key().to_string(),
                self.get_managed_value(ManagedValueType::CurrentStep),
            );
            Ok(())
        } else {
            Err("State must be a JSON object to inject managed values".to_string())
        }
    }

    /// Remove managed values from state (for cleanup)
    pub fn remove_managed_values(&self, state: &mut Value) {
        if let Some(obj) = state.as_object_mut() {
            obj.remove(ManagedValueType::RemainingSteps.state_key());
            obj.remove(ManagedValueType::IsLastStep.state_key());
            obj.remove(ManagedValueType::CurrentStep.state_key());
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(25) // Default to 25 steps like Python
    }
}
