// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::Path;

use crate::app::errors::{AppResult, invalid_config};
use crate::app::types::Credentials;

const USERNAME_FILE: &str = "username";
const PASSWORD_FILE: &str = "password";

/// File content minus its trailing line ending. Inner and edge spaces stay.
fn read_mounted_value(dir: &Path, name: &str) -> AppResult<String> {
    let path = dir.join(name);
    let raw = std::fs::read_to_string(&path).map_err(|err| {
        invalid_config(format!("failed to read {}: {err}", path.display()))
    })?;
    let value = raw.trim_end_matches(['\r', '\n']);
    if value.trim().is_empty() {
        return Err(invalid_config(format!("{} is empty", path.display())));
    }
    Ok(value.to_string())
}

/// Read the cluster login from a mounted secret directory.
#[tracing::instrument(name = "fs", level = "debug", fields(op = "read_credentials", dir = %dir.display()))]
pub fn read_credentials(dir: &Path) -> AppResult<Credentials> {
    Ok(Credentials {
        username: read_mounted_value(dir, USERNAME_FILE)?.trim().to_string(),
        password: read_mounted_value(dir, PASSWORD_FILE)?,
    })
}
