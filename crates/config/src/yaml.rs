// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{Context, Result};
use std::path::Path;

/// Read a yaml file expanding `$VAR` and `${VAR}` references from the environment.
pub fn load_yaml_with_env(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)?;
    expand_env(&raw).with_context(|| format!("Could not expand variables in {}", path.display()))
}

pub fn expand_env(raw: &str) -> Result<String> {
    let expanded = shellexpand::env(raw).map_err(|e| {
        anyhow::anyhow!("environment variable '{}' is not set: {}", e.var_name, e.cause)
    })?;
    Ok(expanded.into_owned())
}
