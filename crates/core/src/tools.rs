// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool identifier validation.
//!
//! The LLM CLI's tool permission model has a small closed set of built-in
//! tools plus an open-ended set of externally namespaced tools (MCP
//! servers), identified by an `mcp__` prefix convention.

use serde::{Deserialize, Serialize};
use std::fmt;

const BUILTIN_TOOLS: &[&str] = &[
    "Read",
    "Write",
    "Edit",
    "Bash",
    "Glob",
    "Grep",
    "WebFetch",
    "WebSearch",
    "Task",
    "TodoWrite",
    "NotebookEdit",
];

const EXTERNAL_TOOL_PREFIX: &str = "mcp__";

/// A validated tool identifier: either a built-in, or an `mcp__`-prefixed
/// external tool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolId(String);

impl ToolId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_external(&self) -> bool {
        self.0.starts_with(EXTERNAL_TOOL_PREFIX)
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ToolId {
    type Error = ToolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if BUILTIN_TOOLS.contains(&value.as_str()) || value.starts_with(EXTERNAL_TOOL_PREFIX) {
            Ok(Self(value))
        } else {
            Err(ToolError::Unknown {
                name: value,
                hint: format!(
                    "unknown tool; built-in tools are {:?}, external tools must be prefixed with `{}` (e.g. `{}my-server__my-tool`)",
                    BUILTIN_TOOLS, EXTERNAL_TOOL_PREFIX, EXTERNAL_TOOL_PREFIX
                ),
            })
        }
    }
}

impl From<ToolId> for String {
    fn from(value: ToolId) -> Self {
        value.0
    }
}

impl std::str::FromStr for ToolId {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

/// Error validating a tool identifier.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool `{name}`: {hint}")]
    Unknown { name: String, hint: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tool_accepted() {
        assert!("Read".parse::<ToolId>().is_ok());
        assert!("Bash".parse::<ToolId>().is_ok());
    }

    #[test]
    fn external_tool_accepted() {
        let id: ToolId = "mcp__github__create_issue".parse().unwrap();
        assert!(id.is_external());
    }

    #[test]
    fn unknown_unprefixed_tool_rejected_with_hint() {
        let err = "DoAnything".parse::<ToolId>().unwrap_err();
        let ToolError::Unknown { name, hint } = err;
        assert_eq!(name, "DoAnything");
        assert!(hint.contains("mcp__"));
    }
}
