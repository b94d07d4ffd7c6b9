use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::command::CommandResult;

/// A declared macro parameter. Steps reference it as `{name}` in their
/// speaker or argument tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroParameter {
    pub name: String,
    /// Used when the caller supplies no value. None makes the parameter
    /// required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// One command in a macro. `speaker` and `args` may contain `{param}`
/// references substituted at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroStep {
    pub speaker: String,
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// A named, persisted sequence of parameterized commands. The name is the
/// unique key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<MacroStep>,
    #[serde(default)]
    pub parameters: Vec<MacroParameter>,
}

/// Request body for macro execution.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroExecuteRequest {
    pub macro_name: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// Outcome of a macro run. Steps after the first failure are never
/// dispatched, so `steps.len()` can be shorter than the definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroExecutionResult {
    pub macro_name: String,
    pub steps: Vec<CommandResult>,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step_index: Option<usize>,
}
