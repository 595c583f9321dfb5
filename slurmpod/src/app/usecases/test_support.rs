// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use time::macros::datetime;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes};
use crate::app::ports::{ClockPort, ExecCapture, RecordStorePort, RemoteExecPort};
use crate::app::types::{RecordData, SshConfig};

pub(crate) fn ssh_config() -> Arc<SshConfig> {
    Arc::new(SshConfig {
        host: "login.cluster.test".to_string(),
        port: 22,
        username: "alice".to_string(),
        password: "s3cret".to_string(),
    })
}

pub(crate) fn capture(stdout: &str, exit_code: i32) -> AppResult<ExecCapture> {
    Ok(ExecCapture {
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
        exit_code,
    })
}

pub(crate) fn capture_err(stderr: &str, exit_code: i32) -> AppResult<ExecCapture> {
    Ok(ExecCapture {
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
        exit_code,
    })
}

pub(crate) fn dial_failure() -> AppResult<ExecCapture> {
    Err(AppError::with_message(
        AppErrorKind::Connectivity,
        codes::CONNECTION_FAILURE,
        "ssh connect failed: connection refused",
    ))
}

pub(crate) fn job_json(state: &str, start: i64, submit: i64, end: i64) -> String {
    format!(
        r#"{{"jobs":[{{"job_state":["{state}"],"start_time":{start},"submit_time":{submit},"end_time":{end}}}]}}"#
    )
}

/// Remote exec fake that expects an exact command sequence.
pub(crate) struct SequencedRemoteExec {
    captures: Mutex<VecDeque<(String, AppResult<ExecCapture>)>>,
    issued: Mutex<Vec<String>>,
}

impl SequencedRemoteExec {
    pub(crate) fn new(captures: Vec<(String, AppResult<ExecCapture>)>) -> Self {
        Self {
            captures: Mutex::new(VecDeque::from(captures)),
            issued: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn issued(&self) -> Vec<String> {
        self.issued.lock().expect("issued lock").clone()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.captures.lock().expect("captures lock").len()
    }
}

#[async_trait]
impl RemoteExecPort for SequencedRemoteExec {
    async fn check_connectivity(&self, _config: &SshConfig) -> AppResult<()> {
        Ok(())
    }

    async fn exec_capture(&self, _config: &SshConfig, command: &str) -> AppResult<ExecCapture> {
        self.issued
            .lock()
            .expect("issued lock")
            .push(command.to_string());
        let mut captures = self.captures.lock().expect("captures lock");
        let Some((expected, result)) = captures.pop_front() else {
            panic!("unexpected command: {command}");
        };
        assert_eq!(command, expected);
        result
    }
}

/// Record store kept in memory; merges are applied and logged.
#[derive(Default)]
pub(crate) struct InMemoryRecordStore {
    data: Mutex<RecordData>,
    merges: Mutex<Vec<RecordData>>,
    fail_merges: bool,
    fail_fetches: bool,
}

impl InMemoryRecordStore {
    pub(crate) fn with_data(pairs: &[(&str, &str)]) -> Self {
        Self {
            data: Mutex::new(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    pub(crate) fn failing_merges(mut self) -> Self {
        self.fail_merges = true;
        self
    }

    pub(crate) fn failing_fetches(mut self) -> Self {
        self.fail_fetches = true;
        self
    }

    pub(crate) fn set(&self, key: &str, value: &str) {
        self.data
            .lock()
            .expect("data lock")
            .insert(key.to_string(), value.to_string());
    }

    pub(crate) fn get(&self, key: &str) -> Option<String> {
        self.data.lock().expect("data lock").get(key).cloned()
    }

    pub(crate) fn snapshot(&self) -> RecordData {
        self.data.lock().expect("data lock").clone()
    }

    pub(crate) fn merges(&self) -> Vec<RecordData> {
        self.merges.lock().expect("merges lock").clone()
    }
}

#[async_trait]
impl RecordStorePort for InMemoryRecordStore {
    async fn fetch(&self) -> AppResult<RecordData> {
        if self.fail_fetches {
            return Err(AppError::with_message(
                AppErrorKind::Store,
                codes::STORE_ERROR,
                "configmap read rejected",
            ));
        }
        Ok(self.snapshot())
    }

    async fn merge(&self, fields: &RecordData) -> AppResult<()> {
        if self.fail_merges {
            return Err(AppError::with_message(
                AppErrorKind::Store,
                codes::STORE_ERROR,
                "configmap patch rejected",
            ));
        }
        self.merges
            .lock()
            .expect("merges lock")
            .push(fields.clone());
        let mut data = self.data.lock().expect("data lock");
        for (k, v) in fields {
            data.insert(k.clone(), v.clone());
        }
        Ok(())
    }
}

pub(crate) struct FixedClock(pub OffsetDateTime);

impl Default for FixedClock {
    fn default() -> Self {
        Self(datetime!(2026-03-14 09:26:53 UTC))
    }
}

impl ClockPort for FixedClock {
    fn now_utc(&self) -> OffsetDateTime {
        self.0
    }
}
