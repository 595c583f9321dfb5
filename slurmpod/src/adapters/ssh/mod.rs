// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;

use async_trait::async_trait;
use russh::client::Config;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{ExecCapture, RemoteExecPort};
use crate::app::types::SshConfig;

mod error;
mod session;

pub use error::AuthenticationFailure;

/// Remote execution over SSH with a fresh connection per call.
#[derive(Clone)]
pub struct SshAdapter {
    client: Arc<Config>,
}

impl SshAdapter {
    pub fn new() -> Self {
        Self {
            client: session::client_config(),
        }
    }
}

impl Default for SshAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn ssh_error_code(err: &anyhow::Error) -> &'static str {
    if err.chain().any(|cause| cause.is::<AuthenticationFailure>()) {
        codes::AUTHENTICATION_FAILURE
    } else {
        codes::CONNECTION_FAILURE
    }
}

fn map_connect_error(err: anyhow::Error) -> AppError {
    let code = ssh_error_code(&err);
    let kind = if code == codes::AUTHENTICATION_FAILURE {
        AppErrorKind::Authentication
    } else {
        AppErrorKind::Connectivity
    };
    AppError::with_message(kind, code, format!("ssh connect failed: {err:#}"))
}

fn map_exec_error(err: anyhow::Error) -> AppError {
    AppError::with_message(
        AppErrorKind::Connectivity,
        codes::REMOTE_ERROR,
        format!("ssh exec failed: {err:#}"),
    )
}

#[async_trait]
impl RemoteExecPort for SshAdapter {
    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, config),
        fields(op = "check_connectivity", host = %config.host, user = %config.username, port = config.port)
    )]
    async fn check_connectivity(&self, config: &SshConfig) -> AppResult<()> {
        let handle = session::connect(self.client.clone(), config)
            .await
            .map_err(map_connect_error)?;
        session::disconnect(handle).await;
        tracing::info!("authenticated to {} as {}", config.target(), config.username);
        Ok(())
    }

    #[tracing::instrument(
        name = "ssh",
        level = "debug",
        skip(self, config, command),
        fields(op = "exec_capture", host = %config.host, user = %config.username, port = config.port)
    )]
    async fn exec_capture(&self, config: &SshConfig, command: &str) -> AppResult<ExecCapture> {
        let handle = session::connect(self.client.clone(), config)
            .await
            .map_err(map_connect_error)?;
        let result = session::exec_capture(&handle, command).await;
        session::disconnect(handle).await;
        let capture = result.map_err(map_exec_error)?;
        tracing::debug!(exit_code = capture.exit_code, "remote command finished");
        Ok(capture)
    }
}
