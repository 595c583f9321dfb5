// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use crate::app::ports::RemoteExecPort;
use crate::app::services::slurm;
use crate::app::types::{JobId, JobStatus, SshConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillOutcome {
    /// Status to record, if any.
    pub status: Option<JobStatus>,
    pub note: String,
    /// Whether a cancel command was sent.
    pub attempted: bool,
}

/// Acts on the kill flag. Callers only consult it once the flag is set.
pub struct KillCoordinator {
    remote: Arc<dyn RemoteExecPort>,
    ssh: Arc<SshConfig>,
}

impl KillCoordinator {
    pub fn new(remote: Arc<dyn RemoteExecPort>, ssh: Arc<SshConfig>) -> Self {
        Self { remote, ssh }
    }

    #[tracing::instrument(
        name = "kill",
        level = "debug",
        skip(self),
        fields(host = %self.ssh.host)
    )]
    pub async fn reconcile_kill(&self, id: JobId, current: JobStatus) -> KillOutcome {
        if current.is_terminal() {
            // A job that finished or failed on its own is never relabelled.
            let status = (current == JobStatus::Cancelled).then_some(JobStatus::Cancelled);
            return KillOutcome {
                status,
                note: format!("job {id} is already in finished state {current}"),
                attempted: false,
            };
        }

        let note = match self
            .remote
            .exec_capture(&self.ssh, &slurm::cancel_command(id))
            .await
        {
            Ok(capture) if capture.success() && capture.stdout_text().trim().is_empty() => {
                return KillOutcome {
                    status: Some(JobStatus::Cancelled),
                    note: format!("job {id} killed successfully"),
                    attempted: true,
                };
            }
            Ok(capture) => {
                let stdout = capture.stdout_text();
                let stderr = capture.stderr_text();
                let detail = [stdout.trim(), stderr.trim()]
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("; ");
                format!(
                    "job {id} is not killed (exit {}): {detail}; will try again",
                    capture.exit_code
                )
            }
            Err(err) => format!("failed to reach cluster to kill job {id}: {err}; will try again"),
        };
        KillOutcome {
            status: None,
            note,
            attempted: true,
        }
    }
}
