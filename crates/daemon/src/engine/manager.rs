// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-job state machine and event dispatch.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use jobd_core::{
    Clock, ExitStatus, Fault, Job, JobState, Label, Manifest, ScheduleKind, Signal, TimerId,
    TimerKind,
};
use jobd_storage::{
    write_atomic, JobProperties, ManifestStore, PropertyStore, RuntimeStatus, StatusStore,
};
use tracing::{debug, error, info, trace, warn};

use crate::calendar;
use crate::mux::{Multiplexer, MuxEvent};

use super::registry::Registry;
use super::spawn::Supervisor;
use super::ManagerError;

/// What the engine loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Exit(i32),
}

/// Path and policy configuration for the manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub manifest_dir: PathBuf,
    pub property_dir: PathBuf,
    pub status_dir: PathBuf,
    /// Where SIGUSR1 writes the human-readable job table.
    pub status_file: PathBuf,
    /// Grace period between TERM and KILL during unload.
    pub kill_grace: Duration,
}

/// The job manager. Owns the registry and all scheduling policy.
///
/// Generic over the child supervisor and the clock so the state machine is
/// testable without forking or sleeping.
pub struct Manager<S, C> {
    pub(crate) registry: Registry,
    pub(crate) manifests: ManifestStore,
    pub(crate) properties: PropertyStore,
    pub(crate) statuses: StatusStore,
    pub(crate) supervisor: S,
    pub(crate) clock: C,
    status_file: PathBuf,
    kill_grace: Duration,
}

enum TimerDecision {
    Run,
    Overlap,
    Skip,
}

impl<S, C> Manager<S, C>
where
    S: Supervisor,
    C: Clock,
{
    pub fn new(config: ManagerConfig, supervisor: S, clock: C) -> Self {
        Self {
            registry: Registry::new(),
            manifests: ManifestStore::new(config.manifest_dir),
            properties: PropertyStore::new(config.property_dir),
            statuses: StatusStore::new(config.status_dir),
            supervisor,
            clock,
            status_file: config.status_file,
            kill_grace: config.kill_grace,
        }
    }

    /// Dispatch one multiplexer event. Errors are confined to the affected
    /// job; only INT/TERM end the loop.
    pub fn handle_event(&mut self, event: MuxEvent, mux: &mut Multiplexer) -> LoopAction {
        match event {
            MuxEvent::Signal(Signal::Hup) => {
                info!("caught SIGHUP, rescanning manifest directory");
                if let Err(e) = self.rescan(mux) {
                    error!(error = %e, "manifest rescan failed");
                }
            }
            MuxEvent::Signal(Signal::Usr1) => {
                if let Err(e) = self.write_status_file() {
                    error!(error = %e, "failed to write status file");
                }
            }
            MuxEvent::Signal(Signal::Chld) => {
                // Exits are reaped via per-pid watches; this is only a wake.
                trace!("SIGCHLD");
            }
            MuxEvent::Signal(Signal::Int) => {
                info!("caught SIGINT, exiting");
                self.unload_all(mux);
                return LoopAction::Exit(1);
            }
            MuxEvent::Signal(Signal::Term) => {
                info!("caught SIGTERM, exiting");
                return LoopAction::Exit(0);
            }
            MuxEvent::ProcExit { pid, status } => self.reap(pid, status, mux),
            MuxEvent::Timer(id) => self.on_timer(&id, mux),
            MuxEvent::Control(ctrl) => {
                let response = self.handle_request(&ctrl.request, mux);
                if ctrl.reply.send(response).is_err() {
                    debug!("client disconnected before the response");
                }
            }
        }
        LoopAction::Continue
    }

    /// Insert a job into the registry and persist its normalized manifest.
    ///
    /// Durable properties are restored when present; otherwise `enabled` is
    /// seeded from the manifest's `Enable`, the only time that key is
    /// consulted.
    pub fn define(&mut self, manifest: Manifest) -> Result<Label, ManagerError> {
        let label = manifest.label.clone();
        if self.registry.contains(label.as_str()) {
            return Err(ManagerError::DuplicateLabel(label));
        }

        let props = match self.properties.load(&label)? {
            Some(props) => props,
            None => self
                .properties
                .edit(&label, JobProperties { enabled: manifest.enable, fault: None }, |_| {})?,
        };
        self.manifests.save(&manifest)?;

        let mut job = Job::new(manifest, props.enabled);
        job.fault = props.fault;
        self.registry.define(job)?;
        debug!(label = %label, "job defined");
        Ok(label)
    }

    /// Transition DEFINED → LOADED: register schedule timers and run the
    /// cheap missing-program check.
    pub fn load(&mut self, label: &str, mux: &mut Multiplexer) -> Result<(), ManagerError> {
        let (label_owned, schedule, interval_secs, cal, missing_program) = {
            let job = self.registry.by_label_mut(label)?;
            if job.state != JobState::Defined {
                return Err(ManagerError::InvalidState {
                    label: job.label.clone(),
                    state: state_name(&job.state),
                    operation: "load",
                });
            }
            job.schedule = job.manifest.schedule_kind();
            job.state = JobState::Loaded;

            let program = job.manifest.executable().to_string();
            let missing = Path::new(&program).is_absolute() && !Path::new(&program).exists();
            if missing {
                job.fault = Some(Fault::missing_program(&program));
            }
            (
                job.label.clone(),
                job.schedule,
                job.manifest.start_interval,
                job.manifest.start_calendar_interval,
                missing.then_some(program),
            )
        };

        match schedule {
            ScheduleKind::Periodic => mux.set_periodic_timer(
                TimerId::interval(&label_owned),
                Duration::from_secs(interval_secs),
            ),
            ScheduleKind::Calendar => self.arm_calendar(&label_owned, cal.as_ref(), mux),
            _ => {}
        }

        match missing_program {
            Some(program) => {
                self.persist_fault(&label_owned, Some(Fault::missing_program(&program)))?;
                warn!(label = %label_owned, program = %program, "program missing; job loaded with fault");
            }
            None => debug!(label = %label_owned, schedule = %schedule, "job loaded"),
        }
        Ok(())
    }

    /// Start the job's child process.
    ///
    /// Valid from LOADED (initial run), WAITING (timer fire) and EXITED
    /// (keep-alive wake). A spawn failure leaves the job LOADED with an
    /// exec-failed fault.
    pub fn run(&mut self, label: &str, mux: &mut Multiplexer) -> Result<(), ManagerError> {
        let manifest = {
            let job = self.registry.by_label(label)?;
            match job.state {
                JobState::Loaded | JobState::Waiting | JobState::Exited => {}
                _ => {
                    return Err(ManagerError::InvalidState {
                        label: job.label.clone(),
                        state: state_name(&job.state),
                        operation: "run",
                    })
                }
            }
            job.manifest.clone()
        };

        match self.supervisor.spawn(&manifest, mux) {
            Ok(pid) => {
                {
                    let job = self.registry.by_label_mut(label)?;
                    job.state = JobState::Running { pid };
                    job.last_exit_status = 0;
                    job.term_signal = 0;
                    job.restart_after = None;
                }
                self.statuses.write(
                    &manifest.label,
                    &RuntimeStatus { pid, last_exit_status: 0, term_signal: 0 },
                );
                info!(label, pid, "job running");
                Ok(())
            }
            Err(e) => {
                let fault = Fault::exec_failed(e.to_string());
                {
                    let job = self.registry.by_label_mut(label)?;
                    job.state = JobState::Loaded;
                    job.restart_after = None;
                    job.fault = Some(fault.clone());
                }
                let label_owned = manifest.label.clone();
                if let Err(pe) = self.persist_fault(&label_owned, Some(fault)) {
                    warn!(label, error = %pe, "failed to persist exec fault");
                }
                warn!(label, error = %e, "spawn failed");
                Err(ManagerError::Exec(e))
            }
        }
    }

    /// Handle a PROC_EXIT: record the status, then reschedule.
    ///
    /// Idempotent with respect to duplicate notifications: the exit watch is
    /// removed first, and a pid with no owning job is only logged.
    pub fn reap(&mut self, pid: u32, status: ExitStatus, mux: &mut Multiplexer) {
        mux.unwatch_exit(pid);

        let Some(label) = self.registry.label_of_pid(pid) else {
            warn!(pid, "child exited but no job found");
            return;
        };
        mux.cancel_timer(&TimerId::kill_grace(&label));

        let was_killed = {
            let Ok(job) = self.registry.by_label_mut(label.as_str()) else {
                return;
            };
            let was_killed = matches!(job.state, JobState::Killed { .. });
            if !was_killed {
                job.state = JobState::Exited;
                job.last_exit_status = status.code();
                job.term_signal = status.signal();
            }
            was_killed
        };
        debug!(label = %label, pid, %status, "reaped child");

        if was_killed {
            // Unloaded while running; nobody cares about the exit status.
            self.delete_job(&label, mux);
            return;
        }

        self.statuses.write(
            &label,
            &RuntimeStatus { pid: 0, last_exit_status: status.code(), term_signal: status.signal() },
        );
        self.reschedule(&label, mux);
    }

    /// Apply the respawn policy to a freshly reaped job.
    fn reschedule(&mut self, label: &Label, mux: &mut Multiplexer) {
        let now_ms = self.clock.epoch_ms();
        let offline = {
            let Ok(job) = self.registry.by_label_mut(label.as_str()) else {
                return;
            };
            if !job.enabled {
                job.state = JobState::Loaded;
                job.restart_after = None;
                debug!(label = %label, "job disabled; no restart");
                false
            } else if job.manifest.start_interval > 0 {
                // The periodic timer keeps firing and will push the job
                // back to RUNNING. Wins over KeepAlive.
                job.state = JobState::Waiting;
                false
            } else if job.schedule == ScheduleKind::Calendar {
                // The calendar timer re-arms itself on every fire.
                job.state = JobState::Waiting;
                false
            } else if job.manifest.keep_alive {
                job.state = JobState::Exited;
                job.restart_after = Some(now_ms + job.manifest.throttle_interval * 1000);
                false
            } else {
                job.state = JobState::Loaded;
                job.restart_after = None;
                job.fault = Some(Fault::offline());
                info!(label = %label, "job exited with no respawn policy; marked offline");
                true
            }
        };
        if offline {
            if let Err(e) = self.persist_fault(label, Some(Fault::offline())) {
                warn!(label = %label, error = %e, "failed to persist offline fault");
            }
        }
        self.keepalive_rearm(mux);
    }

    /// Handle a timer fire.
    pub fn on_timer(&mut self, id: &TimerId, mux: &mut Multiplexer) {
        let Some(kind) = id.kind() else {
            warn!(timer = %id, "unknown timer fired");
            return;
        };
        match kind {
            TimerKind::Interval { label } | TimerKind::Calendar { label } => {
                let label = label.to_string();
                let is_calendar = matches!(kind, TimerKind::Calendar { .. });
                let (decision, cal, label_owned) = match self.registry.by_label(&label) {
                    Ok(job) => {
                        let decision = match job.state {
                            JobState::Waiting if job.enabled && job.fault.is_none() => {
                                TimerDecision::Run
                            }
                            JobState::Loaded if job.is_runnable() => TimerDecision::Run,
                            JobState::Running { .. } => TimerDecision::Overlap,
                            _ => TimerDecision::Skip,
                        };
                        (decision, job.manifest.start_calendar_interval, job.label.clone())
                    }
                    Err(_) => {
                        // Stale timer for a deleted job.
                        mux.cancel_timer(id);
                        return;
                    }
                };
                if is_calendar {
                    self.arm_calendar(&label_owned, cal.as_ref(), mux);
                }
                match decision {
                    TimerDecision::Run => {
                        if let Err(e) = self.run(&label, mux) {
                            warn!(label = %label, error = %e, "scheduled run failed");
                        }
                    }
                    TimerDecision::Overlap => {
                        // Periodic jobs do not overlap.
                        debug!(label = %label, "timer fired while job is running; fire dropped");
                    }
                    TimerDecision::Skip => {}
                }
            }
            TimerKind::KillGrace { label } => {
                if let Ok(job) = self.registry.by_label(label) {
                    if let JobState::Killed { pid } = job.state {
                        warn!(label, pid, "kill grace expired; sending KILL");
                        self.supervisor.kill(pid);
                    }
                }
            }
            TimerKind::KeepaliveWake => self.keepalive_wake(mux),
        }
    }

    /// Begin the unload path for one job.
    pub fn unload(&mut self, label: &str, mux: &mut Multiplexer) -> Result<(), ManagerError> {
        enum UnloadStep {
            Kill(u32),
            AlreadyKilling,
            Delete,
        }

        let (label_owned, step) = {
            let job = self.registry.by_label_mut(label)?;
            let label_owned = job.label.clone();
            let step = match job.state {
                JobState::Running { pid } => {
                    job.state = JobState::Killed { pid };
                    UnloadStep::Kill(pid)
                }
                JobState::Killed { .. } => UnloadStep::AlreadyKilling,
                _ => {
                    job.state = JobState::Defined;
                    UnloadStep::Delete
                }
            };
            (label_owned, step)
        };

        match step {
            UnloadStep::Kill(pid) => {
                mux.cancel_timer(&TimerId::interval(&label_owned));
                mux.cancel_timer(&TimerId::calendar(&label_owned));
                self.supervisor.terminate(pid);
                mux.set_timer(TimerId::kill_grace(&label_owned), self.kill_grace);
                info!(label = %label_owned, pid, "unloading running job; TERM sent");
            }
            UnloadStep::AlreadyKilling => {
                debug!(label = %label_owned, "unload already in progress");
            }
            UnloadStep::Delete => {
                self.delete_job(&label_owned, mux);
                info!(label = %label_owned, "job unloaded");
            }
        }
        Ok(())
    }

    /// Unload everything; used on SIGINT.
    pub fn unload_all(&mut self, mux: &mut Multiplexer) {
        info!("unloading all jobs");
        for label in self.registry.labels() {
            if let Err(e) = self.unload(label.as_str(), mux) {
                error!(label = %label, error = %e, "unload failed");
            }
        }
    }

    /// Remove a job and every trace of it: timers, manifest, properties,
    /// volatile status.
    fn delete_job(&mut self, label: &Label, mux: &mut Multiplexer) {
        mux.cancel_timer(&TimerId::interval(label));
        mux.cancel_timer(&TimerId::calendar(label));
        mux.cancel_timer(&TimerId::kill_grace(label));
        if let Err(e) = self.manifests.remove(label) {
            warn!(label = %label, error = %e, "failed to remove manifest");
        }
        if let Err(e) = self.properties.remove(label) {
            warn!(label = %label, error = %e, "failed to remove properties");
        }
        self.statuses.remove(label);
        self.registry.remove(label);
        self.keepalive_rearm(mux);
        debug!(label = %label, "job deleted");
    }

    /// Set the durable enabled flag; a newly runnable job is started.
    pub fn enable(&mut self, label: &str, mux: &mut Multiplexer) -> Result<(), ManagerError> {
        let label_owned = self.registry.by_label(label)?.label.clone();
        self.properties
            .edit(&label_owned, JobProperties { enabled: true, fault: None }, |p| {
                p.enabled = true;
            })?;
        let runnable = {
            let job = self.registry.by_label_mut(label)?;
            job.enabled = true;
            job.is_runnable()
        };
        info!(label, "job enabled");
        if runnable {
            if let Err(e) = self.run(label, mux) {
                warn!(label, error = %e, "enabled job failed to start");
            }
        }
        Ok(())
    }

    /// Clear the durable enabled flag. The job continues until its next
    /// natural stop.
    pub fn disable(&mut self, label: &str) -> Result<(), ManagerError> {
        let label_owned = self.registry.by_label(label)?.label.clone();
        self.properties
            .edit(&label_owned, JobProperties { enabled: false, fault: None }, |p| {
                p.enabled = false;
            })?;
        self.registry.by_label_mut(label)?.enabled = false;
        info!(label, "job disabled");
        Ok(())
    }

    /// Clear a sticky fault. The job is not run immediately; the next
    /// schedule tick or an explicit run handles it.
    pub fn clear(&mut self, label: &str) -> Result<(), ManagerError> {
        let (label_owned, enabled) = {
            let job = self.registry.by_label(label)?;
            (job.label.clone(), job.enabled)
        };
        self.properties
            .edit(&label_owned, JobProperties { enabled, fault: None }, |p| p.fault = None)?;
        self.registry.by_label_mut(label)?.fault = None;
        info!(label, "fault cleared");
        Ok(())
    }

    /// Scan the manifest directory, define anything new, then load and run
    /// pending jobs. Duplicate labels and parse failures are logged and
    /// skipped.
    pub fn rescan(&mut self, mux: &mut Multiplexer) -> Result<(), ManagerError> {
        let report = self.manifests.scan()?;
        let mut seen: std::collections::HashSet<Label> = std::collections::HashSet::new();
        let mut fresh = 0;

        for manifest in report.manifests {
            let label = manifest.label.clone();
            if self.registry.contains(label.as_str()) {
                if seen.contains(&label) {
                    error!(label = %label, "duplicate label in manifest directory; skipped");
                } else {
                    debug!(label = %label, "already defined; skipped");
                }
            } else {
                match self.define(manifest) {
                    Ok(_) => fresh += 1,
                    Err(e) => error!(label = %label, error = %e, "failed to define job"),
                }
            }
            seen.insert(label);
        }

        debug!(total = self.registry.len(), new = fresh, "finished scanning jobs");
        if fresh > 0 {
            self.run_pending(mux);
        }
        Ok(())
    }

    /// Two-pass activation: load every DEFINED job, then run every runnable
    /// LOADED job.
    pub fn run_pending(&mut self, mux: &mut Multiplexer) {
        for label in self.registry.labels() {
            let defined = self
                .registry
                .by_label(label.as_str())
                .map(|job| job.state == JobState::Defined)
                .unwrap_or(false);
            if defined {
                debug!(label = %label, "loading job");
                if let Err(e) = self.load(label.as_str(), mux) {
                    error!(label = %label, error = %e, "load failed");
                }
            }
        }
        for label in self.registry.labels() {
            let runnable = self
                .registry
                .by_label(label.as_str())
                .map(|job| job.is_runnable())
                .unwrap_or(false);
            if runnable {
                debug!(label = %label, "running job");
                if let Err(e) = self.run(label.as_str(), mux) {
                    error!(label = %label, error = %e, "run failed");
                }
            }
        }
    }

    /// Write the human-readable job table (SIGUSR1), atomically.
    pub fn write_status_file(&self) -> Result<(), ManagerError> {
        let mut out = String::new();
        let _ = writeln!(out, "{:<8} {:<8} {}", "PID", "Status", "Label");
        for label in self.registry.labels() {
            if let Ok(job) = self.registry.by_label(label.as_str()) {
                let pid = match job.pid() {
                    0 => "-".to_string(),
                    pid => pid.to_string(),
                };
                let _ = writeln!(out, "{:<8} {:<8} {}", pid, job.last_exit_status, job.label);
            }
        }
        write_atomic(&self.status_file, out.as_bytes())?;
        info!(path = %self.status_file.display(), "status file written");
        Ok(())
    }

    /// Arm the one-shot calendar timer for the next fire time.
    fn arm_calendar(
        &self,
        label: &Label,
        cal: Option<&jobd_core::CalendarInterval>,
        mux: &mut Multiplexer,
    ) {
        let Some(cal) = cal else { return };
        match calendar::delay_until_next_fire(cal) {
            Some(delay) => mux.set_timer(TimerId::calendar(label), delay),
            None => warn!(label = %label, "calendar interval can never fire"),
        }
    }

    /// Persist a fault (or its absence) to the property store.
    pub(crate) fn persist_fault(
        &mut self,
        label: &Label,
        fault: Option<Fault>,
    ) -> Result<(), ManagerError> {
        let enabled =
            self.registry.by_label(label.as_str()).map(|job| job.enabled).unwrap_or(true);
        self.properties
            .edit(label, JobProperties { enabled, fault: None }, |p| p.fault = fault)?;
        Ok(())
    }
}

pub(crate) fn state_name(state: &JobState) -> &'static str {
    match state {
        JobState::Defined => "defined",
        JobState::Loaded => "loaded",
        JobState::Waiting => "waiting",
        JobState::Running { .. } => "running",
        JobState::Killed { .. } => "killed",
        JobState::Exited => "exited",
    }
}
