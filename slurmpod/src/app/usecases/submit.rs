// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::RemoteExecPort;
use crate::app::services::slurm::{self, SubmitOptions};
use crate::app::types::{JobId, SshConfig};

/// Hands a batch script to `sbatch` and reads back the new job id.
pub struct JobSubmitter {
    remote: Arc<dyn RemoteExecPort>,
    ssh: Arc<SshConfig>,
}

impl JobSubmitter {
    pub fn new(remote: Arc<dyn RemoteExecPort>, ssh: Arc<SshConfig>) -> Self {
        Self { remote, ssh }
    }

    /// Submit `script`. Any error means no job was created as far as the
    /// controller can tell; there is no "job 0".
    #[tracing::instrument(
        name = "submit",
        level = "debug",
        skip_all,
        fields(host = %self.ssh.host, user = %self.ssh.username)
    )]
    pub async fn submit(&self, script: &str, options: &SubmitOptions) -> AppResult<JobId> {
        if script.trim().is_empty() {
            return Err(AppError::with_message(
                AppErrorKind::Semantic,
                codes::INVALID_ARGUMENT,
                "job script is empty",
            ));
        }
        let command = slurm::submit_command(script, options);
        let capture = self.remote.exec_capture(&self.ssh, &command).await?;
        if !capture.success() {
            return Err(AppError::with_message(
                AppErrorKind::Semantic,
                codes::COMMAND_FAILED,
                format!(
                    "sbatch exited with {}: {}",
                    capture.exit_code,
                    capture.stderr_text().trim()
                ),
            ));
        }
        let id = slurm::parse_submit_ack(&capture.stdout_text())?;
        tracing::info!("successfully submitted a job with job id {id}");
        Ok(id)
    }
}
