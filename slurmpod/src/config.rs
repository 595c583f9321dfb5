// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

const CONFIG_ENV_VAR: &str = "SLURMPOD_CONFIG_PATH";
const DEFAULT_CREDENTIALS_DIR: &str = "/credentials/";
const DEFAULT_SSH_PORT: u16 = 22;
const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    credentials_dir: Option<String>,
    ssh_port: Option<u16>,
    default_update_interval_secs: Option<u64>,
    verbose: Option<bool>,
}

#[derive(Debug)]
pub struct Config {
    pub credentials_dir: PathBuf,
    pub ssh_port: u16,
    pub default_update_interval_secs: u64,
    pub verbose: bool,
}

impl Config {
    pub fn default_update_interval(&self) -> Duration {
        Duration::from_secs(self.default_update_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Env,
    ConfigFile,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Override => "override",
            ConfigSource::Env => "env",
            ConfigSource::ConfigFile => "config",
            ConfigSource::Default => "default",
        }
    }
}

#[derive(Debug)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

#[derive(Debug)]
pub struct ConfigReport {
    pub config_path: Option<PathBuf>,
    pub config_path_source: Option<ConfigSource>,
    pub credentials_dir: ConfigValue<PathBuf>,
    pub ssh_port: ConfigValue<u16>,
    pub default_update_interval_secs: ConfigValue<u64>,
    pub verbose: ConfigValue<bool>,
}

#[derive(Debug)]
pub struct LoadResult {
    pub config: Config,
    pub report: ConfigReport,
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub credentials_dir: Option<PathBuf>,
    pub ssh_port: Option<u16>,
    pub default_update_interval_secs: Option<u64>,
    pub verbose: Option<bool>,
}

fn pick<T>(over: Option<T>, file: Option<T>, default: T) -> (T, ConfigSource) {
    match (over, file) {
        (Some(value), _) => (value, ConfigSource::Override),
        (None, Some(value)) => (value, ConfigSource::ConfigFile),
        (None, None) => (default, ConfigSource::Default),
    }
}

pub fn load_with_report(
    config_path_override: Option<PathBuf>,
    overrides: Overrides,
) -> Result<LoadResult> {
    let (config_path, config_path_source) = match config_path_override {
        Some(path) => (Some(expand_path(path)), Some(ConfigSource::Override)),
        None => match config_path_from_env()? {
            Some(path) => (Some(expand_path(path)), Some(ConfigSource::Env)),
            None => (None, None),
        },
    };

    let file_config = match config_path.as_deref() {
        Some(path) => read_config_file(path)?,
        None => FileConfig::default(),
    };

    let (credentials_dir, credentials_source) = match overrides.credentials_dir {
        Some(path) => (expand_path(path), ConfigSource::Override),
        None => match file_config.credentials_dir {
            Some(raw) => (
                resolve_path(&raw, config_path.as_deref().and_then(|path| path.parent())),
                ConfigSource::ConfigFile,
            ),
            None => (PathBuf::from(DEFAULT_CREDENTIALS_DIR), ConfigSource::Default),
        },
    };

    let (ssh_port, ssh_port_source) =
        pick(overrides.ssh_port, file_config.ssh_port, DEFAULT_SSH_PORT);
    if ssh_port == 0 {
        anyhow::bail!("ssh_port must be between 1 and 65535");
    }

    let (default_update_interval_secs, interval_source) = pick(
        overrides.default_update_interval_secs,
        file_config.default_update_interval_secs,
        DEFAULT_UPDATE_INTERVAL_SECS,
    );
    if default_update_interval_secs == 0 {
        anyhow::bail!("default_update_interval_secs must be at least 1");
    }

    let (verbose, verbose_source) = pick(overrides.verbose, file_config.verbose, false);

    let config = Config {
        credentials_dir,
        ssh_port,
        default_update_interval_secs,
        verbose,
    };

    let report = ConfigReport {
        config_path,
        config_path_source,
        credentials_dir: ConfigValue {
            value: config.credentials_dir.clone(),
            source: credentials_source,
        },
        ssh_port: ConfigValue {
            value: config.ssh_port,
            source: ssh_port_source,
        },
        default_update_interval_secs: ConfigValue {
            value: config.default_update_interval_secs,
            source: interval_source,
        },
        verbose: ConfigValue {
            value: config.verbose,
            source: verbose_source,
        },
    };

    Ok(LoadResult { config, report })
}

/// Name and namespace of the workload this pod serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadIdentity {
    pub job_name: String,
    pub namespace: String,
}

impl WorkloadIdentity {
    pub fn new(job_name: &str, namespace: &str) -> Result<Self> {
        let job_name = job_name.trim();
        let namespace = namespace.trim();
        if job_name.is_empty() {
            anyhow::bail!("job name is empty; set --job-name or JOBNAME");
        }
        if namespace.is_empty() {
            anyhow::bail!("namespace is empty; set --namespace or NAMESPACE");
        }
        Ok(Self {
            job_name: job_name.to_string(),
            namespace: namespace.to_string(),
        })
    }
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    if !path.exists() {
        anyhow::bail!("config file not found at {}", path.display());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return path;
    }
    match base_dir {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn expand_path(path: PathBuf) -> PathBuf {
    let path_string = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&path_string);
    PathBuf::from(expanded.as_ref())
}

fn config_path_from_env() -> Result<Option<PathBuf>> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) => {
            if value.is_empty() {
                anyhow::bail!("{CONFIG_ENV_VAR} is set but empty");
            }
            Ok(Some(PathBuf::from(value)))
        }
        None => Ok(None),
    }
}
