// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use serde::Deserialize;
use serde_json::Value;

use crate::app::errors::{AppError, AppErrorKind, AppResult, codes, protocol_error};
use crate::app::services::shell::sh_escape;
use crate::app::types::{JobId, RemoteJobSnapshot};

/// Token position of the job id in `Submitted batch job <id>`.
const SUBMIT_ACK_ID_TOKEN: usize = 3;

pub fn describe_job_command(id: JobId) -> String {
    format!("scontrol show job --json {id}")
}

pub fn cancel_command(id: JobId) -> String {
    format!("scancel {id}")
}

/// Pipe the stored script body into `sbatch`.
///
/// `%b` expands backslash escapes, so a script stored as a single line with
/// literal `\n` sequences still reaches sbatch as a multi-line file.
pub fn submit_command(script: &str, options: &SubmitOptions) -> String {
    let mut command = format!("printf '%b\\n' {} | sbatch", sh_escape(script));
    for arg in options.to_args() {
        command.push(' ');
        command.push_str(&sh_escape(&arg));
    }
    command
}

/// Extract the job id from sbatch's acknowledgment line.
pub fn parse_submit_ack(output: &str) -> AppResult<JobId> {
    let Some(token) = output.split_whitespace().nth(SUBMIT_ACK_ID_TOKEN) else {
        return Err(protocol_error(format!(
            "unexpected sbatch message: {:?}",
            output.trim()
        )));
    };
    token
        .parse::<JobId>()
        .map_err(|err| protocol_error(format!("unexpected sbatch message: {err}")))
}

/// sbatch options taken from the record's `jobproperties` object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub partition: Option<String>,
    pub ntasks: Option<u32>,
    pub nodes: Option<u32>,
    pub job_name: Option<String>,
    pub working_dir: Option<String>,
    pub env_path: Option<String>,
    pub env_lib_path: Option<String>,
}

fn invalid_properties(message: impl Into<String>) -> AppError {
    AppError::with_message(AppErrorKind::Semantic, codes::INVALID_ARGUMENT, message)
}

fn property_text(props: &serde_json::Map<String, Value>, key: &str) -> AppResult<Option<String>> {
    match props.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(invalid_properties(format!(
            "job property {key} must be a string or number, got {other}"
        ))),
    }
}

fn property_count(props: &serde_json::Map<String, Value>, key: &str) -> AppResult<Option<u32>> {
    let Some(raw) = property_text(props, key)? else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(invalid_properties(format!(
            "job property {key} must be a positive integer, got {raw}"
        ))),
    }
}

impl SubmitOptions {
    pub fn from_properties(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(raw)
            .map_err(|err| invalid_properties(format!("job properties are not valid JSON: {err}")))?;
        let Value::Object(props) = value else {
            return Err(invalid_properties("job properties must be a JSON object"));
        };
        Ok(Self {
            partition: property_text(&props, "Queue")?,
            ntasks: property_count(&props, "Tasks")?,
            nodes: property_count(&props, "NodesNumber")?,
            job_name: property_text(&props, "slurmJobName")?,
            working_dir: property_text(&props, "currentWorkingDir")?,
            env_path: property_text(&props, "envPath")?,
            env_lib_path: property_text(&props, "envLibPath")?,
        })
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(v) = &self.partition {
            args.push(format!("--partition={v}"));
        }
        if let Some(v) = self.ntasks {
            args.push(format!("--ntasks={v}"));
        }
        if let Some(v) = self.nodes {
            args.push(format!("--nodes={v}"));
        }
        if let Some(v) = &self.job_name {
            args.push(format!("--job-name={v}"));
        }
        if let Some(v) = &self.working_dir {
            args.push(format!("--chdir={v}"));
        }
        let mut exports = Vec::new();
        if let Some(v) = &self.env_path {
            exports.push(format!("PATH={v}"));
        }
        if let Some(v) = &self.env_lib_path {
            exports.push(format!("LD_LIBRARY_PATH={v}"));
        }
        if !exports.is_empty() {
            args.push(format!("--export=ALL,{}", exports.join(",")));
        }
        args
    }
}

// `scontrol show job --json` output. Older Slurm releases emit `job_state` as a
// plain string and times as integers; newer ones wrap both.

#[derive(Debug, Deserialize)]
struct JobInfo {
    #[serde(default)]
    jobs: Vec<JobEntry>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    #[serde(default)]
    job_state: Option<JobState>,
    #[serde(default)]
    start_time: Option<SlurmTime>,
    #[serde(default)]
    submit_time: Option<SlurmTime>,
    #[serde(default)]
    end_time: Option<SlurmTime>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JobState {
    List(Vec<String>),
    Single(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SlurmTime {
    Plain(i64),
    Number {
        #[serde(default)]
        set: Option<bool>,
        #[serde(default)]
        infinite: bool,
        #[serde(default)]
        number: i64,
    },
}

impl SlurmTime {
    fn epoch(&self) -> i64 {
        match self {
            SlurmTime::Plain(v) => *v,
            SlurmTime::Number {
                set,
                infinite,
                number,
            } => {
                if *set == Some(false) || *infinite {
                    0
                } else {
                    *number
                }
            }
        }
    }
}

fn epoch_or_zero(value: &Option<SlurmTime>) -> i64 {
    value.as_ref().map(SlurmTime::epoch).unwrap_or(0)
}

/// Parse the describe-job response; the first job entry is used.
pub fn parse_job_snapshot(output: &str) -> AppResult<RemoteJobSnapshot> {
    let info: JobInfo = serde_json::from_str(output)
        .map_err(|err| protocol_error(format!("failed to parse scontrol json: {err}")))?;
    let Some(entry) = info.jobs.into_iter().next() else {
        return Err(AppError::with_message(
            AppErrorKind::Protocol,
            codes::NO_JOB_ENTRIES,
            "scontrol returned no job entries",
        ));
    };
    let states: Vec<String> = match entry.job_state {
        Some(JobState::List(states)) => states,
        Some(JobState::Single(state)) => vec![state],
        None => Vec::new(),
    }
    .into_iter()
    .map(|state| state.trim().to_string())
    .filter(|state| !state.is_empty())
    .collect();
    if states.is_empty() {
        return Err(protocol_error("scontrol job entry has no job_state"));
    }
    Ok(RemoteJobSnapshot {
        states,
        start_time: epoch_or_zero(&entry.start_time),
        submit_time: epoch_or_zero(&entry.submit_time),
        end_time: epoch_or_zero(&entry.end_time),
    })
}
