// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::sync::Arc;
use std::time::Duration;

use time::macros::format_description;
use tokio::sync::watch;

use crate::app::errors::AppResult;
use crate::app::ports::{ClockPort, RecordStorePort, RemoteExecPort};
use crate::app::services::slurm::SubmitOptions;
use crate::app::types::{BridgeSettings, JobId, JobRecord, JobStatus, RecordData, keys, kill_flag};

use super::{JobSubmitter, KillCoordinator, StatusPoller};

const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit a job to HPC";

/// How a reconciliation run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The job reached COMPLETED, CANCELLED or FAILED.
    Terminal(JobStatus),
    /// No job could be submitted; the record carries the reason.
    SubmissionFailed(String),
    /// A stop signal arrived while waiting for the next cycle.
    Interrupted,
}

impl ReconcileOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            ReconcileOutcome::Terminal(JobStatus::Completed) => 0,
            _ => 1,
        }
    }
}

/// Drives one job from submission (or resume) to a terminal state.
pub struct Reconciler {
    store: Arc<dyn RecordStorePort>,
    clock: Arc<dyn ClockPort>,
    submitter: JobSubmitter,
    poller: StatusPoller,
    killer: KillCoordinator,
    interval: Duration,
}

impl Reconciler {
    pub fn new(
        settings: &BridgeSettings,
        remote: Arc<dyn RemoteExecPort>,
        store: Arc<dyn RecordStorePort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        let ssh = Arc::new(settings.ssh.clone());
        Self {
            store,
            clock,
            submitter: JobSubmitter::new(remote.clone(), ssh.clone()),
            poller: StatusPoller::new(remote.clone(), ssh.clone()),
            killer: KillCoordinator::new(remote, ssh),
            interval: settings.poll_interval,
        }
    }

    /// Run until the job is terminal, submission fails, or `shutdown` flips
    /// to true. Only an unusable record is returned as an error.
    pub async fn run(
        &self,
        initial: &RecordData,
        mut shutdown: watch::Receiver<bool>,
    ) -> AppResult<ReconcileOutcome> {
        let mut record = JobRecord::from_data(initial)?;

        if let Some(status) = record.status.filter(|s| s.is_terminal()) {
            tracing::info!("record already holds terminal status {status}; nothing to do");
            return Ok(ReconcileOutcome::Terminal(status));
        }

        let id = match record.id {
            Some(id) => {
                tracing::info!("slurm job {id} already recorded; resuming monitoring");
                id
            }
            None => {
                tracing::info!("no slurm job recorded; submitting a new job");
                match self.submit_new(initial, &mut record).await {
                    Ok(id) => id,
                    Err(message) => return Ok(ReconcileOutcome::SubmissionFailed(message)),
                }
            }
        };

        Ok(self.monitor(id, &mut record, &mut shutdown).await)
    }

    async fn submit_new(&self, data: &RecordData, record: &mut JobRecord) -> Result<JobId, String> {
        let script = data.get(keys::JOB_SCRIPT).map(String::as_str).unwrap_or("");
        let properties = data
            .get(keys::JOB_PROPERTIES)
            .map(String::as_str)
            .unwrap_or("");
        let options = SubmitOptions::from_properties(properties).unwrap_or_else(|err| {
            tracing::warn!("ignoring job properties, submitting without options: {err}");
            SubmitOptions::default()
        });

        match self.submitter.submit(script, &options).await {
            Ok(id) => {
                record.id = Some(id);
                record.set_status(JobStatus::Submitted);
                let now = self.clock.now_utc();
                let stamp = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");
                let formatted = now.format(stamp);
                record.start_time =
                    Some(formatted.unwrap_or_else(|_| now.unix_timestamp().to_string()));
                self.persist(record).await;
                Ok(id)
            }
            Err(err) => {
                tracing::error!(code = err.code(), "job submission failed: {err}");
                let message = format!("{SUBMIT_FAILED_MESSAGE}: {}", err.message());
                record.set_status(JobStatus::Failed);
                record.message = Some(message.clone());
                self.persist(record).await;
                Err(message)
            }
        }
    }

    async fn monitor(
        &self,
        id: JobId,
        record: &mut JobRecord,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ReconcileOutcome {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown_requested(shutdown) => {
                    tracing::info!("stop requested; leaving job {id} to the scheduler");
                    return ReconcileOutcome::Interrupted;
                }
            }
            if let Some(status) = self.run_cycle(id, record).await {
                tracing::info!("job {id} reached terminal status {status}");
                return ReconcileOutcome::Terminal(status);
            }
        }
    }

    /// One poll/reconcile step. Returns the terminal status once reached.
    #[tracing::instrument(name = "cycle", level = "debug", skip(self, record))]
    async fn run_cycle(&self, id: JobId, record: &mut JobRecord) -> Option<JobStatus> {
        match self.store.fetch().await {
            Ok(data) => record.kill_requested = kill_flag(&data),
            Err(err) => tracing::warn!("failed to re-read record; keeping kill flag: {err}"),
        }

        match self.poller.query(id).await {
            Ok(snapshot) => {
                let status = snapshot.status();
                if !record.set_status(status) {
                    tracing::warn!(
                        "ignoring {status} for job {id}; record is already terminal"
                    );
                }
                if status.captures_timing() {
                    record.apply_timing(&snapshot);
                } else if record.kill_requested {
                    self.apply_kill(id, record).await;
                }
            }
            Err(err) => {
                tracing::warn!(
                    kind = ?err.kind(),
                    code = err.code(),
                    transient = err.is_transient(),
                    "no status for job {id} this cycle: {err}"
                );
                if record.kill_requested {
                    self.apply_kill(id, record).await;
                }
            }
        }

        self.persist(record).await;
        record.status.filter(|s| s.is_terminal())
    }

    async fn apply_kill(&self, id: JobId, record: &mut JobRecord) {
        let current = record.status.unwrap_or(JobStatus::Unknown);
        let outcome = self.killer.reconcile_kill(id, current).await;
        tracing::info!(attempted = outcome.attempted, "{}", outcome.note);
        if let Some(status) = outcome.status {
            record.set_status(status);
        }
    }

    async fn persist(&self, record: &JobRecord) {
        if let Err(err) = self.store.merge(&record.to_fields()).await {
            tracing::warn!("failed to update record: {err}");
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // Sender gone: nobody can ask us to stop any more.
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::slurm;
    use crate::app::types::SshConfig;
    use crate::app::usecases::test_support::{
        FixedClock, InMemoryRecordStore, SequencedRemoteExec, capture, capture_err,
        dial_failure, job_json, ssh_config,
    };
    use crate::app::ports::ExecCapture;

    const INTERVAL: Duration = Duration::from_secs(30);
    const SCRIPT: &str = "#!/bin/bash\\nsrun ./train.sh";
    const DESCRIBE: &str = "scontrol show job --json 4821";
    const CANCEL: &str = "scancel 4821";

    fn settings(ssh: &SshConfig) -> BridgeSettings {
        BridgeSettings {
            ssh: ssh.clone(),
            poll_interval: INTERVAL,
        }
    }

    fn reconciler(
        remote: &Arc<SequencedRemoteExec>,
        store: &Arc<InMemoryRecordStore>,
    ) -> Reconciler {
        Reconciler::new(
            &settings(&ssh_config()),
            remote.clone(),
            store.clone(),
            Arc::new(FixedClock::default()),
        )
    }

    fn describe(state: &str) -> (String, AppResult<ExecCapture>) {
        (DESCRIBE.to_string(), capture(&job_json(state, 0, 0, 0), 0))
    }

    fn submit_cmd() -> String {
        slurm::submit_command(SCRIPT, &SubmitOptions::default())
    }

    fn no_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    async fn run(
        remote: &Arc<SequencedRemoteExec>,
        store: &Arc<InMemoryRecordStore>,
    ) -> ReconcileOutcome {
        let (_tx, rx) = no_shutdown();
        let initial = store.snapshot();
        reconciler(remote, store).run(&initial, rx).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn submits_then_monitors_until_completed() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![
            (submit_cmd(), capture("Submitted batch job 4821\n", 0)),
            describe("PENDING"),
            describe("RUNNING"),
            (
                DESCRIBE.to_string(),
                capture(&job_json("COMPLETED", 1_700_000_100, 1_700_000_000, 1_700_000_900), 0),
            ),
        ]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[
            (keys::RESOURCE_URL, "login.cluster.test"),
            (keys::JOB_SCRIPT, SCRIPT),
        ]));

        let started = tokio::time::Instant::now();
        let outcome = run(&remote, &store).await;

        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Completed));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(remote.remaining(), 0);
        assert_eq!(started.elapsed(), INTERVAL * 3);

        let merges = store.merges();
        assert_eq!(
            merges[0].get(keys::JOB_STATUS).map(String::as_str),
            Some("SUBMITTED")
        );
        assert_eq!(merges[0].get(keys::ID).map(String::as_str), Some("4821"));
        assert_eq!(
            merges[0].get(keys::START_TIME).map(String::as_str),
            Some("2026-03-14T09:26:53Z")
        );
        assert_eq!(store.get(keys::JOB_STATUS).as_deref(), Some("COMPLETED"));
        assert_eq!(store.get(keys::START_TIME).as_deref(), Some("1700000100"));
        assert_eq!(store.get(keys::SUBMIT_TIME).as_deref(), Some("1700000000"));
        assert_eq!(store.get(keys::END_TIME).as_deref(), Some("1700000900"));
        assert_eq!(store.get(keys::MESSAGE), None);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_snapshot_states_exit_with_mapped_code() {
        for (state, code) in [("COMPLETED", 0), ("CANCELLED", 1), ("FAILED", 1), ("TIMEOUT", 1)] {
            let remote = Arc::new(SequencedRemoteExec::new(vec![describe(state)]));
            let store = Arc::new(InMemoryRecordStore::with_data(&[(keys::ID, "4821")]));
            let outcome = run(&remote, &store).await;
            let ReconcileOutcome::Terminal(status) = outcome.clone() else {
                panic!("expected terminal outcome for {state}, got {outcome:?}");
            };
            assert!(status.is_terminal());
            assert_eq!(outcome.exit_code(), code, "state {state}");
            assert_eq!(
                store.get(keys::JOB_STATUS).as_deref(),
                Some(status.as_str())
            );
            // Exactly one poll happened; the sequenced fake panics on extras.
            assert_eq!(remote.issued(), vec![DESCRIBE.to_string()]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_terminal_cycle_keeps_looping() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![describe("RUNNING")]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[(keys::ID, "4821")]));
        let reconciler = reconciler(&remote, &store);
        let mut record = JobRecord::from_data(&store.snapshot()).unwrap();

        let id = JobId::new(4821).unwrap();
        assert_eq!(reconciler.run_cycle(id, &mut record).await, None);
        assert_eq!(record.status, Some(JobStatus::Running));
        assert_eq!(store.get(keys::JOB_STATUS).as_deref(), Some("RUNNING"));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_states_keep_the_loop_alive() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![
            describe("SUSPENDED"),
            describe("COMPLETING"),
            describe("COMPLETED"),
        ]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[(keys::ID, "4821")]));
        let outcome = run(&remote, &store).await;
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Completed));
        let statuses: Vec<_> = store
            .merges()
            .iter()
            .filter_map(|m| m.get(keys::JOB_STATUS).cloned())
            .collect();
        assert_eq!(statuses, vec!["UNKNOWN", "COMPLETING", "COMPLETED"]);
    }

    #[tokio::test(start_paused = true)]
    async fn resume_skips_submission() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![describe("FAILED")]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[
            (keys::ID, "4821"),
            (keys::JOB_STATUS, "RUNNING"),
            (keys::JOB_SCRIPT, SCRIPT),
        ]));
        let outcome = run(&remote, &store).await;
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Failed));
        assert!(remote.issued().iter().all(|c| !c.contains("sbatch")));
        assert_eq!(store.get(keys::ID).as_deref(), Some("4821"));
    }

    #[tokio::test(start_paused = true)]
    async fn submission_failure_is_recorded_and_stops() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![(
            submit_cmd(),
            capture("Submitted batch\n", 0),
        )]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[(keys::JOB_SCRIPT, SCRIPT)]));
        let outcome = run(&remote, &store).await;

        let ReconcileOutcome::SubmissionFailed(message) = &outcome else {
            panic!("expected submission failure, got {outcome:?}");
        };
        assert!(message.starts_with(SUBMIT_FAILED_MESSAGE));
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(store.get(keys::JOB_STATUS).as_deref(), Some("FAILED"));
        assert_eq!(store.get(keys::MESSAGE).as_deref(), Some(message.as_str()));
        assert_eq!(store.get(keys::ID), None);
        assert_eq!(remote.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_job_properties_fall_back_to_plain_submission() {
        for props in ["{'Queue': 'gpu'}", "{not json", r#"["gpu"]"#] {
            let remote = Arc::new(SequencedRemoteExec::new(vec![
                (submit_cmd(), capture("Submitted batch job 4821\n", 0)),
                describe("COMPLETED"),
            ]));
            let store = Arc::new(InMemoryRecordStore::with_data(&[
                (keys::JOB_SCRIPT, SCRIPT),
                (keys::JOB_PROPERTIES, props),
            ]));
            let outcome = run(&remote, &store).await;
            assert_eq!(
                outcome,
                ReconcileOutcome::Terminal(JobStatus::Completed),
                "properties {props:?}"
            );
            assert_eq!(remote.issued()[0], submit_cmd());
            assert_eq!(store.get(keys::ID).as_deref(), Some("4821"));
            assert_eq!(store.get(keys::MESSAGE), None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn job_properties_become_sbatch_options() {
        let props = r#"{"Queue":"gpu","NodesNumber":2}"#;
        let options = SubmitOptions::from_properties(props).unwrap();
        let remote = Arc::new(SequencedRemoteExec::new(vec![
            (
                slurm::submit_command(SCRIPT, &options),
                capture("Submitted batch job 4821\n", 0),
            ),
            describe("COMPLETED"),
        ]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[
            (keys::JOB_SCRIPT, SCRIPT),
            (keys::JOB_PROPERTIES, props),
        ]));
        let outcome = run(&remote, &store).await;
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Completed));
        assert!(remote.issued()[0].contains("'--partition=gpu' '--nodes=2'"));
    }

    #[tokio::test(start_paused = true)]
    async fn kill_flag_cancels_running_job() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![
            describe("RUNNING"),
            (CANCEL.to_string(), capture("", 0)),
        ]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[
            (keys::ID, "4821"),
            (keys::KILL, "true"),
        ]));
        let outcome = run(&remote, &store).await;
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Cancelled));
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(store.get(keys::JOB_STATUS).as_deref(), Some("CANCELLED"));
        assert_eq!(store.get(keys::KILL).as_deref(), Some("true"));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_cancel_is_retried_next_cycle() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![
            describe("RUNNING"),
            (CANCEL.to_string(), capture_err("scancel: error: try later", 1)),
            describe("RUNNING"),
            (CANCEL.to_string(), capture("", 0)),
        ]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[
            (keys::ID, "4821"),
            (keys::KILL, "true"),
        ]));
        let started = tokio::time::Instant::now();
        let outcome = run(&remote, &store).await;
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Cancelled));
        assert_eq!(started.elapsed(), INTERVAL * 2);
        assert_eq!(remote.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn kill_flag_set_mid_run_is_picked_up() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![
            describe("RUNNING"),
            describe("RUNNING"),
            (CANCEL.to_string(), capture("", 0)),
        ]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[(keys::ID, "4821")]));
        let reconciler = reconciler(&remote, &store);
        let mut record = JobRecord::from_data(&store.snapshot()).unwrap();
        let id = JobId::new(4821).unwrap();

        assert_eq!(reconciler.run_cycle(id, &mut record).await, None);
        store.set(keys::KILL, "true");
        assert_eq!(
            reconciler.run_cycle(id, &mut record).await,
            Some(JobStatus::Cancelled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_record_keeps_the_last_kill_flag() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![
            describe("RUNNING"),
            (CANCEL.to_string(), capture("", 0)),
        ]));
        let store = Arc::new(
            InMemoryRecordStore::with_data(&[(keys::ID, "4821"), (keys::KILL, "true")])
                .failing_fetches(),
        );
        let reconciler = reconciler(&remote, &store);
        let mut record = JobRecord::from_data(&store.snapshot()).unwrap();
        assert!(record.kill_requested);
        assert!(store.fetch().await.is_err());

        let id = JobId::new(4821).unwrap();
        assert_eq!(
            reconciler.run_cycle(id, &mut record).await,
            Some(JobStatus::Cancelled)
        );
        assert!(record.kill_requested);
        assert_eq!(remote.issued(), vec![DESCRIBE.to_string(), CANCEL.to_string()]);
        assert_eq!(store.get(keys::JOB_STATUS).as_deref(), Some("CANCELLED"));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_job_is_not_cancelled_despite_kill_flag() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![describe("COMPLETED")]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[
            (keys::ID, "4821"),
            (keys::KILL, "true"),
        ]));
        let outcome = run(&remote, &store).await;
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Completed));
        assert_eq!(remote.issued(), vec![DESCRIBE.to_string()]);
        assert_eq!(store.get(keys::JOB_STATUS).as_deref(), Some("COMPLETED"));
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_cluster_stalls_without_exiting() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![
            (DESCRIBE.to_string(), dial_failure()),
            (DESCRIBE.to_string(), capture("not json", 0)),
            describe("COMPLETED"),
        ]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[
            (keys::ID, "4821"),
            (keys::JOB_STATUS, "RUNNING"),
        ]));
        let outcome = run(&remote, &store).await;
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Completed));
        assert_eq!(remote.remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn kill_is_attempted_when_no_snapshot_was_obtained() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![
            (DESCRIBE.to_string(), capture(r#"{"jobs":[]}"#, 0)),
            (CANCEL.to_string(), capture("", 0)),
        ]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[
            (keys::ID, "4821"),
            (keys::JOB_STATUS, "PENDING"),
            (keys::KILL, "true"),
        ]));
        let outcome = run(&remote, &store).await;
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_record_at_startup_is_not_resurrected() {
        let remote = Arc::new(SequencedRemoteExec::new(Vec::new()));
        let store = Arc::new(InMemoryRecordStore::with_data(&[
            (keys::ID, "4821"),
            (keys::JOB_STATUS, "CANCELLED"),
        ]));
        let outcome = run(&remote, &store).await;
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Cancelled));
        assert!(remote.issued().is_empty());
        assert!(store.merges().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unusable_job_id_is_an_error() {
        let remote = Arc::new(SequencedRemoteExec::new(Vec::new()));
        let store = Arc::new(InMemoryRecordStore::with_data(&[(keys::ID, "job-7")]));
        let (_tx, rx) = no_shutdown();
        let err = reconciler(&remote, &store)
            .run(&store.snapshot(), rx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::app::errors::AppErrorKind::InvalidConfig);
        assert!(remote.issued().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_signal_interrupts_the_wait() {
        let remote = Arc::new(SequencedRemoteExec::new(Vec::new()));
        let store = Arc::new(InMemoryRecordStore::with_data(&[(keys::ID, "4821")]));
        let (tx, rx) = no_shutdown();
        tx.send(true).unwrap();
        let outcome = reconciler(&remote, &store)
            .run(&store.snapshot(), rx)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Interrupted);
        assert_eq!(outcome.exit_code(), 1);
        assert!(remote.issued().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_stop_sender_never_interrupts() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![describe("COMPLETED")]));
        let store = Arc::new(InMemoryRecordStore::with_data(&[(keys::ID, "4821")]));
        let (tx, rx) = no_shutdown();
        drop(tx);
        let outcome = reconciler(&remote, &store)
            .run(&store.snapshot(), rx)
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn record_write_failures_do_not_stop_the_loop() {
        let remote = Arc::new(SequencedRemoteExec::new(vec![
            describe("RUNNING"),
            describe("COMPLETED"),
        ]));
        let store = Arc::new(
            InMemoryRecordStore::with_data(&[(keys::ID, "4821")]).failing_merges(),
        );
        let outcome = run(&remote, &store).await;
        assert_eq!(outcome, ReconcileOutcome::Terminal(JobStatus::Completed));
        assert_eq!(remote.remaining(), 0);
    }
}
