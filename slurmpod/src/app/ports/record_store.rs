// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::AppResult;
use crate::app::types::RecordData;

#[async_trait]
/// The workload's persisted key/value record, owned outside this process.
pub trait RecordStorePort: Send + Sync {
    async fn fetch(&self) -> AppResult<RecordData>;

    /// Overwrite the given keys, leaving every other key untouched.
    async fn merge(&self, fields: &RecordData) -> AppResult<()>;
}
