// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::RemoteExecPort;
use crate::app::services::slurm;
use crate::app::types::{JobId, RemoteJobSnapshot, SshConfig};

/// Runs the describe-job query for one job.
pub struct StatusPoller {
    remote: Arc<dyn RemoteExecPort>,
    ssh: Arc<SshConfig>,
}

impl StatusPoller {
    pub fn new(remote: Arc<dyn RemoteExecPort>, ssh: Arc<SshConfig>) -> Self {
        Self { remote, ssh }
    }

    /// Errors here mean "no snapshot this cycle", never a job failure.
    #[tracing::instrument(
        name = "poll",
        level = "debug",
        skip(self),
        fields(host = %self.ssh.host)
    )]
    pub async fn query(&self, id: JobId) -> AppResult<RemoteJobSnapshot> {
        let capture = self
            .remote
            .exec_capture(&self.ssh, &slurm::describe_job_command(id))
            .await?;
        if !capture.success() {
            return Err(AppError::with_message(
                AppErrorKind::Semantic,
                codes::COMMAND_FAILED,
                format!(
                    "scontrol returned {}: {}",
                    capture.exit_code,
                    capture.stderr_text().trim()
                ),
            ));
        }
        let snapshot = slurm::parse_job_snapshot(&capture.stdout_text())?;
        tracing::debug!(state = ?snapshot.raw_state(), "job {id} described");
        Ok(snapshot)
    }
}
