// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;

pub mod codes {
    pub const AUTHENTICATION_FAILURE: &str = "authentication_failure";
    pub const CONNECTION_FAILURE: &str = "connection_failure";
    pub const REMOTE_ERROR: &str = "remote_error";
    pub const MALFORMED_RESPONSE: &str = "malformed_response";
    pub const COMMAND_FAILED: &str = "command_failed";
    pub const NO_JOB_ENTRIES: &str = "no_job_entries";
    pub const STORE_ERROR: &str = "store_error";
    pub const INVALID_CONFIG: &str = "invalid_config";
    pub const INVALID_ARGUMENT: &str = "invalid_argument";
}

/// Failure classes a caller can branch on.
///
/// `Connectivity` and `Authentication` come from dialing the cluster,
/// `Protocol` from responses that do not have the expected shape and
/// `Semantic` from commands that ran but reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppErrorKind {
    Connectivity,
    Authentication,
    Protocol,
    Semantic,
    Store,
    InvalidConfig,
}

#[derive(Debug, Clone)]
pub struct AppError {
    kind: AppErrorKind,
    code: &'static str,
    message: String,
}

impl AppError {
    pub fn with_message(
        kind: AppErrorKind,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> AppErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Errors the next poll cycle may clear up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            AppErrorKind::Connectivity | AppErrorKind::Authentication | AppErrorKind::Store
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

pub fn protocol_error(message: impl Into<String>) -> AppError {
    AppError::with_message(AppErrorKind::Protocol, codes::MALFORMED_RESPONSE, message)
}

pub fn invalid_config(message: impl Into<String>) -> AppError {
    AppError::with_message(AppErrorKind::InvalidConfig, codes::INVALID_CONFIG, message)
}
