// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::app::errors::{AppResult, invalid_config};

/// Raw key/value content of the persisted record.
pub type RecordData = BTreeMap<String, String>;

/// Keys of the persisted record read or written by the controller.
pub mod keys {
    pub const RESOURCE_URL: &str = "resourceURL";
    pub const UPDATE_INTERVAL: &str = "updateInterval";
    pub const ID: &str = "id";
    pub const KILL: &str = "kill";
    pub const JOB_STATUS: &str = "jobStatus";
    pub const START_TIME: &str = "startTime";
    pub const SUBMIT_TIME: &str = "submitTime";
    pub const END_TIME: &str = "endTime";
    pub const MESSAGE: &str = "message";
    pub const JOB_SCRIPT: &str = "jobdata.jobScript";
    pub const JOB_PROPERTIES: &str = "jobproperties";
}

/// Scheduler-assigned job identifier. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl JobId {
    pub fn new(raw: u64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    #[cfg(test)]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseJobIdError(pub String);

impl fmt::Display for ParseJobIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a positive integer job id", self.0)
    }
}

impl std::error::Error for ParseJobIdError {}

impl FromStr for JobId {
    type Err = ParseJobIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .ok()
            .and_then(JobId::new)
            .ok_or_else(|| ParseJobIdError(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    Pending,
    Running,
    Completed,
    Completing,
    Cancelled,
    Failed,
    Unknown,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Completing => "COMPLETING",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::Failed => "FAILED",
            JobStatus::Unknown => "UNKNOWN",
        }
    }

    /// Normalize a scheduler state string.
    ///
    /// Slurm end states that mean the job did not finish on its own collapse
    /// into `Failed`; anything unrecognised is `Unknown` and keeps the loop going.
    pub fn from_slurm(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUBMITTED" => JobStatus::Submitted,
            "PENDING" => JobStatus::Pending,
            "RUNNING" => JobStatus::Running,
            "COMPLETED" => JobStatus::Completed,
            "COMPLETING" => JobStatus::Completing,
            "CANCELLED" => JobStatus::Cancelled,
            "FAILED" | "BOOT_FAIL" | "DEADLINE" | "NODE_FAIL" | "OUT_OF_MEMORY" | "PREEMPTED"
            | "TIMEOUT" => JobStatus::Failed,
            _ => JobStatus::Unknown,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }

    /// States for which the scheduler's timing fields are worth copying.
    pub fn captures_timing(self) -> bool {
        self.is_terminal() || self == JobStatus::Completing
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one describe-job query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteJobSnapshot {
    /// Raw scheduler states; the first one is authoritative.
    pub states: Vec<String>,
    pub start_time: i64,
    pub submit_time: i64,
    pub end_time: i64,
}

impl RemoteJobSnapshot {
    pub fn raw_state(&self) -> Option<&str> {
        self.states.first().map(String::as_str)
    }

    pub fn status(&self) -> JobStatus {
        self.raw_state()
            .map(JobStatus::from_slurm)
            .unwrap_or(JobStatus::Unknown)
    }
}

/// In-memory view of the persisted record owned by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobRecord {
    pub id: Option<JobId>,
    pub status: Option<JobStatus>,
    pub start_time: Option<String>,
    pub submit_time: Option<String>,
    pub end_time: Option<String>,
    pub message: Option<String>,
    /// Set by other components; never written back.
    pub kill_requested: bool,
}

fn non_empty(data: &RecordData, key: &str) -> Option<String> {
    data.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn kill_flag(data: &RecordData) -> bool {
    data.get(keys::KILL)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

impl JobRecord {
    pub fn from_data(data: &RecordData) -> AppResult<Self> {
        let id = match non_empty(data, keys::ID) {
            Some(raw) => Some(raw.parse::<JobId>().map_err(|err| {
                invalid_config(format!("record holds an unusable job id: {err}"))
            })?),
            None => None,
        };
        Ok(Self {
            id,
            status: non_empty(data, keys::JOB_STATUS).map(|raw| JobStatus::from_slurm(&raw)),
            start_time: non_empty(data, keys::START_TIME),
            submit_time: non_empty(data, keys::SUBMIT_TIME),
            end_time: non_empty(data, keys::END_TIME),
            message: non_empty(data, keys::MESSAGE),
            kill_requested: kill_flag(data),
        })
    }

    /// Fields to merge into the persisted record. Unset fields are left alone.
    pub fn to_fields(&self) -> RecordData {
        let mut out = RecordData::new();
        if let Some(id) = self.id {
            out.insert(keys::ID.to_string(), id.to_string());
        }
        if let Some(status) = self.status {
            out.insert(keys::JOB_STATUS.to_string(), status.as_str().to_string());
        }
        let optional = [
            (keys::START_TIME, &self.start_time),
            (keys::SUBMIT_TIME, &self.submit_time),
            (keys::END_TIME, &self.end_time),
            (keys::MESSAGE, &self.message),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                out.insert(key.to_string(), value.clone());
            }
        }
        out
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(JobStatus::is_terminal)
    }

    /// Record a new status. A terminal status is never replaced; returns
    /// whether the status was applied.
    pub fn set_status(&mut self, status: JobStatus) -> bool {
        if self.is_terminal() && self.status != Some(status) {
            return false;
        }
        self.status = Some(status);
        true
    }

    /// Copy the nonzero timing fields of a snapshot.
    pub fn apply_timing(&mut self, snapshot: &RemoteJobSnapshot) {
        if snapshot.start_time != 0 {
            self.start_time = Some(snapshot.start_time.to_string());
        }
        if snapshot.submit_time != 0 {
            self.submit_time = Some(snapshot.submit_time.to_string());
        }
        if snapshot.end_time != 0 {
            self.end_time = Some(snapshot.end_time.to_string());
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and as whom to open remote sessions.
#[derive(Clone, PartialEq, Eq)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl SshConfig {
    pub fn target(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Debug for SshConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Immutable settings every component is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub ssh: SshConfig,
    pub poll_interval: Duration,
}

impl BridgeSettings {
    pub fn from_record(
        data: &RecordData,
        credentials: Credentials,
        default_port: u16,
        default_interval: Duration,
    ) -> AppResult<Self> {
        let raw_url = non_empty(data, keys::RESOURCE_URL).ok_or_else(|| {
            invalid_config(format!("record has no {} value", keys::RESOURCE_URL))
        })?;
        let (host, port) = parse_resource_url(&raw_url, default_port)?;
        let poll_interval = match non_empty(data, keys::UPDATE_INTERVAL)
            .and_then(|raw| raw.parse::<u64>().ok())
        {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                tracing::warn!(
                    "{} missing or invalid; polling every {}s",
                    keys::UPDATE_INTERVAL,
                    default_interval.as_secs()
                );
                default_interval
            }
        };
        Ok(Self {
            ssh: SshConfig {
                host,
                port,
                username: credentials.username,
                password: credentials.password,
            },
            poll_interval,
        })
    }
}

/// Split a cluster address into host and port.
///
/// Accepts `host`, `host:port`, `[v6]:port`, a bare IPv6 address and an
/// optional `ssh://` scheme with a trailing slash.
pub fn parse_resource_url(raw: &str, default_port: u16) -> AppResult<(String, u16)> {
    let trimmed = raw.trim();
    let without_scheme = trimmed.strip_prefix("ssh://").unwrap_or(trimmed);
    let authority = without_scheme.trim_end_matches('/');
    if authority.is_empty() {
        return Err(invalid_config(format!("resource url '{raw}' has no host")));
    }
    if authority.contains('/') {
        return Err(invalid_config(format!(
            "resource url '{raw}' must not contain a path"
        )));
    }

    let parse_port = |value: &str| {
        value
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or_else(|| invalid_config(format!("resource url '{raw}' has an invalid port")))
    };

    if let Some(rest) = authority.strip_prefix('[') {
        let Some((host, tail)) = rest.split_once(']') else {
            return Err(invalid_config(format!(
                "resource url '{raw}' has an unterminated IPv6 literal"
            )));
        };
        let port = match tail.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None if tail.is_empty() => default_port,
            None => {
                return Err(invalid_config(format!(
                    "resource url '{raw}' is malformed"
                )));
            }
        };
        return Ok((host.to_string(), port));
    }

    match authority.matches(':').count() {
        0 => Ok((authority.to_string(), default_port)),
        1 => {
            let (host, port) = authority.split_once(':').unwrap_or((authority, ""));
            if host.is_empty() {
                return Err(invalid_config(format!("resource url '{raw}' has no host")));
            }
            Ok((host.to_string(), parse_port(port)?))
        }
        _ => Ok((authority.to_string(), default_port)),
    }
}
