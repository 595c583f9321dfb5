// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::SshConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecCapture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl ExecCapture {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

#[async_trait]
/// Remote command execution boundary.
/// Every call opens its own session and closes it before returning.
pub trait RemoteExecPort: Send + Sync {
    /// Dial and authenticate without running anything.
    async fn check_connectivity(&self, config: &SshConfig) -> AppResult<()>;

    async fn exec_capture(&self, config: &SshConfig, command: &str) -> AppResult<ExecCapture>;
}
