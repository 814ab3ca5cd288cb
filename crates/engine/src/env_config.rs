// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves the LLM CLI binary path and invocation extras (§6 "Environment
//! variables consumed"): environment overrides win, falling back to
//! `env.json`, falling back to a platform default.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

const CLI_PATH_ENV: &str = "CLODPUTER_CLI_PATH";
const CLI_EXTRA_ARGS_ENV: &str = "CLODPUTER_CLI_EXTRA_ARGS";
const DEFAULT_CLI_PATH: &str = "claude";

/// Persisted in `env.json`; consumed by the executor, cron installer, and
/// watcher to locate the LLM CLI when no environment override is present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvConfig {
    #[serde(default)]
    pub cli_path: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl EnvConfig {
    pub fn load(path: &Path) -> io::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Resolve the effective CLI path: env var, then this document, then the
    /// platform default (`claude` on `$PATH`).
    pub fn resolve_cli_path(&self) -> String {
        std::env::var(CLI_PATH_ENV)
            .ok()
            .or_else(|| self.cli_path.clone())
            .unwrap_or_else(|| DEFAULT_CLI_PATH.to_string())
    }

    /// Resolve extra arguments appended to every invocation: the env var
    /// (whitespace-split) takes precedence over the document's list.
    pub fn resolve_extra_args(&self) -> Vec<String> {
        if let Ok(raw) = std::env::var(CLI_EXTRA_ARGS_ENV) {
            return raw.split_whitespace().map(str::to_string).collect();
        }
        self.extra_args.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = EnvConfig::load(&dir.path().join("env.json")).unwrap();
        assert!(cfg.cli_path.is_none());
    }

    #[test]
    #[serial_test::serial(cli_path_env)]
    fn document_value_used_when_no_env_override() {
        std::env::remove_var(CLI_PATH_ENV);
        let cfg = EnvConfig {
            cli_path: Some("/opt/claude/bin/claude".to_string()),
            extra_args: vec![],
        };
        assert_eq!(cfg.resolve_cli_path(), "/opt/claude/bin/claude");
    }

    #[test]
    #[serial_test::serial(cli_path_env)]
    fn falls_back_to_platform_default() {
        std::env::remove_var(CLI_PATH_ENV);
        let cfg = EnvConfig::default();
        assert_eq!(cfg.resolve_cli_path(), "claude");
    }
}
