// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `clodputer doctor` — run diagnostics; exit non-zero on any error-level
//! check (§4.9, §6).

use crate::color;
use anyhow::Result;
use clodputer_executor::{CheckStatus, StateDir};

pub async fn handle(state_dir: &StateDir) -> Result<bool> {
    let checks = clodputer_executor::run_checks(state_dir).await;
    let mut any_error = false;

    for check in &checks {
        let label = match check.status {
            CheckStatus::Ok => color::green("ok"),
            CheckStatus::Warn => color::yellow("warn"),
            CheckStatus::Error => {
                any_error = true;
                "error".to_string()
            }
        };
        println!("[{label}] {}: {}", check.name, check.message);
        if let Some(hint) = &check.hint {
            println!("       hint: {hint}");
        }
    }

    Ok(!any_error)
}
