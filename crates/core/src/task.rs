// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task definition: the document a user authors on disk describing a
//! prompt, its tool permissions, its trigger, and its retry policy.
//!
//! Deserialization routes trigger kinds by a `type` tag rather than through
//! polymorphism, per the "dynamic dispatch over trigger kinds" design note:
//! `Trigger` is a plain tagged-variant enum and every boundary (validation,
//! cron installer, watcher) matches on it directly.

use crate::tools::ToolId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A fully loaded, validated task definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: crate::queue_item::Priority,
    pub trigger: Trigger,
    pub task: TaskSpec,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub on_success: Vec<OnOutcomeAction>,
    #[serde(default)]
    pub on_failure: Vec<OnOutcomeAction>,
}

fn default_enabled() -> bool {
    true
}

/// The trigger that causes this task to be enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum Trigger {
    Manual,
    Cron {
        expression: String,
        #[serde(default)]
        timezone: Option<String>,
    },
    FileWatch {
        path: String,
        pattern: String,
        event: WatchEvent,
        #[serde(default = "default_debounce_ms")]
        debounce_ms: u64,
    },
}

fn default_debounce_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchEvent {
    Created,
    Modified,
    Deleted,
}

/// The prompt and tool permissions to invoke the LLM CLI with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSpec {
    pub prompt: String,
    #[serde(default)]
    pub allowed_tools: Vec<ToolId>,
    #[serde(default)]
    pub disallowed_tools: Vec<ToolId>,
    #[serde(default)]
    pub permission_mode: PermissionMode,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub context: HashMap<String, String>,
    #[serde(default)]
    pub mcp_config_path: Option<String>,
}

impl TaskSpec {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_timeout_seconds() -> u64 {
    3600
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    #[default]
    Prompt,
    AcceptEdits,
    RejectEdits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: default_max_attempts(),
            backoff: BackoffKind::default(),
            initial_delay_seconds: default_initial_delay(),
            max_delay_seconds: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_seconds)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_seconds)
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> u64 {
    30
}

fn default_max_delay() -> u64 {
    600
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    #[default]
    Exponential,
    Fixed,
}

/// An action to take once a task reaches a terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OnOutcomeAction {
    Log { template: String },
    Notify { notify: bool },
}

/// Errors produced while validating or substituting a [`TaskConfig`].
#[derive(Debug, thiserror::Error)]
pub enum TaskConfigError {
    #[error("{0}")]
    Invalid(String),
    #[error("environment variable `{0}` is not set")]
    EnvironmentMissing(String),
}

impl TaskConfig {
    /// Cross-field validation beyond what serde/schema already enforces.
    ///
    /// Collects every violation rather than failing on the first one, so a
    /// single `doctor`/`load` report can show the user everything wrong with
    /// a task file at once.
    pub fn validate(&self) -> Result<(), TaskConfigError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("`name` must not be empty".to_string());
        }
        if !is_filesystem_safe(&self.name) {
            errors.push(format!(
                "`name` = {:?} is not filesystem-safe (use letters, digits, `-`, `_`)",
                self.name
            ));
        }
        if self.task.prompt.trim().is_empty() {
            errors.push("`task.prompt` must not be empty".to_string());
        }
        if let Trigger::FileWatch { debounce_ms, .. } = &self.trigger {
            if *debounce_ms == 0 {
                errors.push("`trigger.debounce_ms` must be greater than 0".to_string());
            }
        }
        if let Trigger::Cron { expression, .. } = &self.trigger {
            if expression.trim().is_empty() {
                errors.push("`trigger.expression` must not be empty".to_string());
            }
        }
        if self.retry.enabled && self.retry.max_attempts == 0 {
            errors.push("`retry.max_attempts` must be greater than 0 when retry is enabled".to_string());
        }
        for tool in &self.task.allowed_tools {
            if self.task.disallowed_tools.contains(tool) {
                errors.push(format!(
                    "tool `{}` appears in both `allowed_tools` and `disallowed_tools`",
                    tool
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(TaskConfigError::Invalid(errors.join("; ")))
        }
    }

    /// Replace every `{{ env.VAR }}` occurrence in the prompt and context
    /// values with the corresponding process environment variable.
    ///
    /// Pure over the config at load time — never re-applied at spawn time,
    /// so a missing variable surfaces before any subprocess exists.
    pub fn substitute_env(mut self) -> Result<Self, TaskConfigError> {
        self.task.prompt = substitute(&self.task.prompt)?;
        let mut substituted_context = HashMap::with_capacity(self.task.context.len());
        for (k, v) in self.task.context.drain() {
            substituted_context.insert(k, substitute(&v)?);
        }
        self.task.context = substituted_context;
        Ok(self)
    }
}

fn is_filesystem_safe(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Replace `{{ env.VAR }}` placeholders in `input` with `std::env::var(VAR)`.
fn substitute(input: &str) -> Result<String, TaskConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            output.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let placeholder = after_open[..end].trim();
        let var_name = placeholder
            .strip_prefix("env.")
            .map(str::trim)
            .ok_or_else(|| {
                TaskConfigError::Invalid(format!(
                    "unsupported substitution `{{{{ {} }}}}`, only `env.VAR` is supported",
                    placeholder
                ))
            })?;
        let value = std::env::var(var_name)
            .map_err(|_| TaskConfigError::EnvironmentMissing(var_name.to_string()))?;
        output.push_str(&value);
        rest = &after_open[end + 2..];
    }
    output.push_str(rest);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> TaskConfig {
        TaskConfig {
            name: "greet".to_string(),
            description: None,
            enabled: true,
            priority: crate::queue_item::Priority::Normal,
            trigger: Trigger::Manual,
            task: TaskSpec {
                prompt: "say hi".to_string(),
                allowed_tools: vec![],
                disallowed_tools: vec![],
                permission_mode: PermissionMode::Prompt,
                timeout_seconds: 30,
                context: HashMap::new(),
                mcp_config_path: None,
            },
            retry: RetryPolicy::default(),
            on_success: vec![],
            on_failure: vec![],
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut cfg = base_config();
        cfg.name = "".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn non_filesystem_safe_name_is_rejected() {
        let mut cfg = base_config();
        cfg.name = "bad name/slash".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, TaskConfigError::Invalid(_)));
    }

    #[test]
    fn empty_prompt_is_rejected() {
        let mut cfg = base_config();
        cfg.task.prompt = "   ".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn conflicting_tool_lists_are_rejected() {
        let mut cfg = base_config();
        let tool: ToolId = "Read".parse().unwrap();
        cfg.task.allowed_tools.push(tool.clone());
        cfg.task.disallowed_tools.push(tool);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn retry_enabled_with_zero_attempts_rejected() {
        let mut cfg = base_config();
        cfg.retry.enabled = true;
        cfg.retry.max_attempts = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_substitution_succeeds_when_var_set() {
        // SAFETY-by-convention: test-only, single-threaded env mutation.
        std::env::set_var("CLODPUTER_TEST_VAR", "hello");
        let mut cfg = base_config();
        cfg.task.prompt = "say {{ env.CLODPUTER_TEST_VAR }}".to_string();
        let substituted = cfg.substitute_env().unwrap();
        assert_eq!(substituted.task.prompt, "say hello");
        std::env::remove_var("CLODPUTER_TEST_VAR");
    }

    #[test]
    fn env_substitution_fails_cleanly_when_var_unset() {
        std::env::remove_var("CLODPUTER_TEST_VAR_MISSING");
        let mut cfg = base_config();
        cfg.task.prompt = "say {{ env.CLODPUTER_TEST_VAR_MISSING }}".to_string();
        let err = cfg.substitute_env().unwrap_err();
        assert!(matches!(err, TaskConfigError::EnvironmentMissing(name) if name == "CLODPUTER_TEST_VAR_MISSING"));
    }

    #[test]
    fn trigger_deserializes_by_type_tag() {
        let yaml = r#"
name: nightly
trigger:
  type: cron
  expression: "0 2 * * *"
task:
  prompt: "do the thing"
"#;
        let cfg: TaskConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(cfg.trigger, Trigger::Cron { .. }));
    }
}
