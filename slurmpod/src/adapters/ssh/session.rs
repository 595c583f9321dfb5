// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use russh::client::{AuthResult, Config, Handle};
use russh::{ChannelMsg, Disconnect};

use super::error::{AuthenticationFailure, ConnectTimeout};
use crate::app::ports::ExecCapture;
use crate::app::types::SshConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// russh client handler for cluster login nodes.
///
/// Host keys are accepted without verification: the login node is reached
/// from inside the pod network and there is no known_hosts to consult.
#[derive(Clone, Debug)]
pub(super) struct ClientHandler {
    target: String,
}

impl russh::client::Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        tracing::debug!(
            "accepting {} host key for {}",
            server_public_key.algorithm(),
            self.target
        );
        Ok(true)
    }
}

pub(super) fn client_config() -> Arc<Config> {
    Arc::new(Config {
        inactivity_timeout: Some(Duration::from_secs(60)),
        ..Default::default()
    })
}

/// Dial `config` and authenticate with its password.
pub(super) async fn connect(
    client: Arc<Config>,
    config: &SshConfig,
) -> Result<Handle<ClientHandler>> {
    let target = config.target();
    let handler = ClientHandler {
        target: target.clone(),
    };
    let dial = russh::client::connect(client, (config.host.as_str(), config.port), handler);
    let mut handle = match tokio::time::timeout(CONNECT_TIMEOUT, dial).await {
        Ok(result) => result.context("SSH connect failed")?,
        Err(_) => return Err(ConnectTimeout(CONNECT_TIMEOUT.as_secs(), target).into()),
    };
    tracing::debug!(
        "established connection with {}@{}, proceeding with auth",
        config.username,
        target
    );

    let result = handle
        .authenticate_password(config.username.clone(), config.password.clone())
        .await
        .context("password authentication")?;
    match result {
        AuthResult::Success => Ok(handle),
        AuthResult::Failure { .. } => Err(AuthenticationFailure.into()),
    }
}

pub(super) async fn disconnect(handle: Handle<ClientHandler>) {
    if let Err(err) = handle
        .disconnect(Disconnect::ByApplication, "", "en")
        .await
    {
        tracing::debug!("ssh disconnect failed: {err}");
    }
}

/// Output of one remote command while its channel is still open.
#[derive(Debug, Default)]
struct CaptureState {
    capture: ExecCapture,
    exit_status: Option<i32>,
    signal: Option<String>,
}

impl CaptureState {
    /// Only an explicit exit status counts as a finished command.
    fn finish(self) -> Result<ExecCapture> {
        if let Some(signal) = self.signal {
            bail!("remote command killed by signal {signal}");
        }
        let Some(exit_code) = self.exit_status else {
            bail!("channel closed without an exit status");
        };
        Ok(ExecCapture {
            exit_code,
            ..self.capture
        })
    }
}

/// Accumulate one channel message. Returns true once the channel is closed.
fn handle_capture_message(msg: &ChannelMsg, state: &mut CaptureState) -> bool {
    match msg {
        ChannelMsg::Data { data } => {
            state.capture.stdout.extend_from_slice(data);
            false
        }
        ChannelMsg::ExtendedData { data, ext: 1 } => {
            state.capture.stderr.extend_from_slice(data);
            false
        }
        ChannelMsg::ExitStatus { exit_status } => {
            state.exit_status = Some(*exit_status as i32);
            false
        }
        ChannelMsg::ExitSignal {
            signal_name,
            error_message,
            ..
        } => {
            tracing::debug!("remote command got {signal_name:?}: {error_message}");
            state.signal = Some(format!("{signal_name:?}"));
            false
        }
        ChannelMsg::Close => true,
        _ => false,
    }
}

/// Run one command on an authenticated session and collect its output.
pub(super) async fn exec_capture(
    handle: &Handle<ClientHandler>,
    command: &str,
) -> Result<ExecCapture> {
    let mut chan = handle
        .channel_open_session()
        .await
        .context("open session channel")?;
    tracing::debug!("executing '{command}'");
    chan.exec(true, command).await.context("exec request")?;

    let mut state = CaptureState::default();
    while let Some(msg) = chan.wait().await {
        if handle_capture_message(&msg, &mut state) {
            break;
        }
    }
    let _ = chan.close().await;
    state.finish().with_context(|| format!("'{command}'"))
}
