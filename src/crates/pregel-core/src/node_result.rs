//! Node execution result types
//!
//! This module defines the result types that nodes can return from execution.
//! Nodes can return either a simple state update or a Command for advanced control.

use crate::command::Command;
use serde_json::Value;

/// Result that a node can return from execution
///
/// Nodes can return either:
/// - A simple state value (JSON) that will be merged into the graph state
/// - A Command for advanced control (update, goto, resume)
///
/// # Example: Simple State Update
///
/// ```rust
/// use pregel_core::NodeResult;
/// use serde_json::json;
///
/// // Return a simple state update
/// let result = NodeResult::State(json!({"count": 42}));
/// ```
///
/// # Example: Command with Navigation
///
/// ```rust
/// use pregel_core::{NodeResult, Command};
/// use serde_json::json;
///
/// // Return a command to update state and navigate
/// let result = NodeResult::Command(
///     Command::new()
///         .with_update(json!({"status": "processed"}))
///         .with_goto("next_step")
/// );
/// ```
#[derive(Debug, Clone)]
pub enum NodeResult {
    /// Simple state value to be merged into graph state
    State(Value),

    /// Command with advanced control
    Command(Command),
}

impl NodeResult {
    /// Extract the state update from this result
    ///
    /// For State variant, returns the value directly.
    /// For Command variant, returns the command's update field.
    pub fn get_state_update(&self) -> Option<Value> {
        match self {
            NodeResult::State(value) => Some(value.clone()),
            NodeResult::Command(cmd) => cmd.update.clone(),
        }
    }

    /// Extract the Command if present
    pub fn get_command(&self) -> Option<&Command> {
        match self {
            NodeResult::State(_) => None,
            NodeResult::Command(cmd) => Some(cmd),
        }
    }

    /// Check if this result contains a goto directive
    pub fn has_goto(&self) -> bool {
        matches!(self, NodeResult::Command(cmd) if cmd.goto.is_some())
    }

    /// Check if this result contains a resume directive
    pub fn has_resume(&self) -> bool {
        matches!(self, NodeResult::Command(cmd) if cmd.resume.is_some())
    }

    /// Convert into a Command, creating one if needed
    pub fn into_command(self) -> Command {
        match self {
            NodeResult::State(value) => Command::new().with_update(value),
            NodeResult::Command(cmd) => cmd,
        }
    }
}

impl From<Value> for NodeResult {
    fn from(value: Value) -> Self {
        NodeResult::State(value)
    }
}

impl From<Command> for NodeResult {
    fn from(cmd: Command) -> Self {
        NodeResult::Command(cmd)
    }
}
