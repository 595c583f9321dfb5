// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use thiserror::Error as ThisError;

/// The server refused the username/password pair.
#[derive(Debug, ThisError)]
#[error("authentication_failure")]
pub struct AuthenticationFailure;

#[derive(Debug, ThisError)]
#[error("timed out after {0}s connecting to {1}")]
pub struct ConnectTimeout(pub u64, pub String);
