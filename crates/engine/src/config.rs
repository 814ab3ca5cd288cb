// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task definition loading (§4.1): reads `tasks/*.{yaml,yml}`, applies
//! schema validation and env substitution once at load time.

use clodputer_core::{TaskConfig, TaskConfigError};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("task {0:?} not found")]
    NotFound(String),
    #[error("reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{0}")]
    Invalid(#[from] TaskConfigError),
}

/// Load and validate a single task by name, substituting environment
/// variables eagerly so a missing variable surfaces before any subprocess
/// exists.
pub fn load(tasks_dir: &Path, name: &str) -> Result<TaskConfig, ConfigError> {
    let path = locate(tasks_dir, name).ok_or_else(|| ConfigError::NotFound(name.to_string()))?;
    load_path(&path)
}

fn locate(tasks_dir: &Path, name: &str) -> Option<PathBuf> {
    for ext in ["yaml", "yml"] {
        let candidate = tasks_dir.join(format!("{name}.{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

fn load_path(path: &Path) -> Result<TaskConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: TaskConfig =
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    let config = config.substitute_env()?;
    Ok(config)
}

/// Load every task definition in `tasks_dir`, returning successfully parsed
/// configs alongside the (path, error) pairs for any that failed — used by
/// diagnostics so a single malformed file never aborts the whole scan.
pub fn load_all(tasks_dir: &Path) -> (Vec<TaskConfig>, Vec<(PathBuf, ConfigError)>) {
    let mut configs = Vec::new();
    let mut errors = Vec::new();

    let entries = match std::fs::read_dir(tasks_dir) {
        Ok(entries) => entries,
        Err(_) => return (configs, errors),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_task_file = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if !is_task_file {
            continue;
        }
        match load_path(&path) {
            Ok(config) => configs.push(config),
            Err(err) => errors.push((path, err)),
        }
    }

    (configs, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_task(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(format!("{name}.yaml")), body).unwrap();
    }

    #[test]
    fn loads_a_valid_task_by_name() {
        let dir = tempfile::tempdir().unwrap();
        write_task(
            dir.path(),
            "greet",
            "name: greet\ntrigger: {type: manual}\ntask: {prompt: \"say hi\"}\n",
        );
        let config = load(dir.path(), "greet").unwrap();
        assert_eq!(config.name, "greet");
    }

    #[test]
    fn missing_task_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load(dir.path(), "nope"), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn load_all_collects_errors_without_aborting() {
        let dir = tempfile::tempdir().unwrap();
        write_task(
            dir.path(),
            "good",
            "name: good\ntrigger: {type: manual}\ntask: {prompt: \"ok\"}\n",
        );
        write_task(dir.path(), "bad", "not: [valid, yaml: :::");
        let (configs, errors) = load_all(dir.path());
        assert_eq!(configs.len(), 1);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn load_all_on_missing_dir_is_empty_not_a_panic() {
        let (configs, errors) = load_all(Path::new("/nonexistent/tasks/dir"));
        assert!(configs.is_empty());
        assert!(errors.is_empty());
    }
}
