// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod clock;
pub mod record_store;
pub mod remote_exec;

pub use clock::ClockPort;
pub use record_store::RecordStorePort;
pub use remote_exec::{ExecCapture, RemoteExecPort};
