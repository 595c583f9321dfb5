// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;

use clap::{CommandFactory, FromArgMatches, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "slurmpod",
    version,
    about = "Run one Slurm batch job on a remote cluster and mirror its state into the pod's ConfigMap",
    long_about = None,
    after_help = "Configuration precedence: defaults < config file < command-line flags.\n\
Config path precedence: SLURMPOD_CONFIG_PATH < --config. Without either, no config file is read.\n\
Paths in the config file are resolved relative to the config file directory.\n\
Exit status: 0 when the job completed, 1 otherwise."
)]
pub struct Opts {
    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Path to a TOML config file. When omitted, slurmpod uses SLURMPOD_CONFIG_PATH if set."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long,
        env = "JOBNAME",
        value_name = "NAME",
        help = "Workload name; the record lives in ConfigMap <NAME>-bridge-cm."
    )]
    pub job_name: String,
    #[arg(
        long,
        env = "NAMESPACE",
        value_name = "NAMESPACE",
        help = "Namespace holding the job's ConfigMap."
    )]
    pub namespace: String,
    #[arg(
        long,
        value_name = "DIR",
        help = "Directory with `username` and `password` files. Overrides `credentials_dir` from the config file."
    )]
    pub credentials_dir: Option<PathBuf>,
    #[arg(
        long,
        value_name = "PORT",
        help = "SSH port used when resourceURL has none. Overrides `ssh_port` from the config file."
    )]
    pub ssh_port: Option<u16>,
    #[arg(
        long,
        value_name = "SECS",
        help = "Poll interval used when updateInterval is missing or invalid. Overrides `default_update_interval_secs` from the config file."
    )]
    pub default_update_interval_secs: Option<u64>,
    #[arg(
        short,
        long,
        action = clap::ArgAction::SetTrue,
        help = "Enable debug logging. Overrides `verbose` from the config file."
    )]
    pub verbose: bool,
}

pub struct ParsedOpts {
    pub opts: Opts,
    pub verbose_override: Option<bool>,
}

pub fn cli_command() -> clap::Command {
    Opts::command()
}

fn parse_matches(matches: &clap::ArgMatches) -> Result<ParsedOpts, clap::Error> {
    let verbose_override = matches.get_flag("verbose").then_some(true);
    let opts = Opts::from_arg_matches(matches)?;
    Ok(ParsedOpts {
        opts,
        verbose_override,
    })
}

pub fn parse_opts() -> ParsedOpts {
    let matches = cli_command().get_matches();
    parse_matches(&matches).unwrap_or_else(|err| err.exit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ParsedOpts, clap::Error> {
        let matches = cli_command().try_get_matches_from(args)?;
        parse_matches(&matches)
    }

    #[test]
    fn command_definition_is_consistent() {
        cli_command().debug_assert();
    }

    #[test]
    fn flags_map_to_overrides() {
        let parsed = parse(&[
            "slurmpod",
            "--job-name",
            "train-7",
            "--namespace",
            "research",
            "--ssh-port",
            "2222",
            "--default-update-interval-secs",
            "30",
            "-v",
        ])
        .unwrap();
        assert_eq!(parsed.opts.job_name, "train-7");
        assert_eq!(parsed.opts.namespace, "research");
        assert_eq!(parsed.opts.ssh_port, Some(2222));
        assert_eq!(parsed.opts.default_update_interval_secs, Some(30));
        assert_eq!(parsed.verbose_override, Some(true));
        assert!(parsed.opts.config.is_none());
    }

    #[test]
    fn verbose_is_not_an_override_unless_given() {
        let parsed = parse(&["slurmpod", "--job-name", "j", "--namespace", "n"]).unwrap();
        assert_eq!(parsed.verbose_override, None);
        assert!(parsed.opts.credentials_dir.is_none());
    }

    #[test]
    fn rejects_non_numeric_port() {
        let err = parse(&[
            "slurmpod",
            "--job-name",
            "j",
            "--namespace",
            "n",
            "--ssh-port",
            "ssh",
        ])
        .err()
        .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
