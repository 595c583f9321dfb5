// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

mod adapters;
mod app;
mod config;
mod logging;

use app::ports::{RecordStorePort, RemoteExecPort};
use app::types::BridgeSettings;
use app::usecases::Reconciler;

fn log_config_report(report: &config::ConfigReport) {
    match (&report.config_path, report.config_path_source) {
        (Some(path), Some(source)) => {
            tracing::info!("config path: {} (source={})", path.display(), source.as_str());
        }
        _ => tracing::info!("config path: (none)"),
    }
    tracing::info!(
        "config credentials_dir: {} (source={})",
        report.credentials_dir.value.display(),
        report.credentials_dir.source.as_str()
    );
    tracing::info!(
        "config ssh_port: {} (source={})",
        report.ssh_port.value,
        report.ssh_port.source.as_str()
    );
    tracing::info!(
        "config default_update_interval_secs: {} (source={})",
        report.default_update_interval_secs.value,
        report.default_update_interval_secs.source.as_str()
    );
    tracing::info!(
        "config verbose: {} (source={})",
        report.verbose.value,
        report.verbose.source.as_str()
    );
}

/// Flip `tx` to true on SIGTERM or Ctrl-C.
fn spawn_signal_listener(tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(err) => {
                    tracing::warn!("cannot listen for SIGTERM: {err}");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("received Ctrl-C"),
            _ = terminate => tracing::info!("received SIGTERM"),
        }
        let _ = tx.send(true);
    });
}

async fn run() -> anyhow::Result<ExitCode> {
    let parsed = adapters::cli::parse_opts();
    let opts = parsed.opts;
    let config::LoadResult { config, report } = config::load_with_report(
        opts.config,
        config::Overrides {
            credentials_dir: opts.credentials_dir,
            ssh_port: opts.ssh_port,
            default_update_interval_secs: opts.default_update_interval_secs,
            verbose: parsed.verbose_override,
        },
    )?;
    logging::init(config.verbose);
    log_config_report(&report);

    let workload = config::WorkloadIdentity::new(&opts.job_name, &opts.namespace)?;
    tracing::info!(
        "serving job {} in namespace {}",
        workload.job_name,
        workload.namespace
    );

    let credentials = adapters::fs::read_credentials(&config.credentials_dir)
        .context("failed to read cluster credentials")?;

    let store: Arc<dyn RecordStorePort> = Arc::new(
        adapters::kube::ConfigMapStore::in_cluster(&workload.job_name, &workload.namespace)
            .context("failed to set up the job record store")?,
    );
    let record = store.fetch().await.context("failed to read the job record")?;
    let settings = BridgeSettings::from_record(
        &record,
        credentials,
        config.ssh_port,
        config.default_update_interval(),
    )?;
    tracing::info!(
        "cluster {} as {}, polling every {}s",
        settings.ssh.target(),
        settings.ssh.username,
        settings.poll_interval.as_secs()
    );

    let remote: Arc<dyn RemoteExecPort> = Arc::new(adapters::ssh::SshAdapter::new());
    remote
        .check_connectivity(&settings.ssh)
        .await
        .context("cannot reach the cluster")?;

    let (stop_tx, stop_rx) = watch::channel(false);
    spawn_signal_listener(stop_tx);

    let clock = Arc::new(adapters::time::SystemClock);
    let reconciler = Reconciler::new(&settings, remote, store, clock);
    let outcome = reconciler.run(&record, stop_rx).await?;
    tracing::info!("finished: {outcome:?}");
    Ok(ExitCode::from(outcome.exit_code()))
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            if tracing::dispatcher::has_been_set() {
                tracing::error!("{err:#}");
            } else {
                eprintln!("slurmpod: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
