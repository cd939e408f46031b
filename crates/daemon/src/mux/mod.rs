// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event multiplexer: one ordered stream of kernel and control-plane events.
//!
//! Signals, child exits, timers and IPC requests all arrive through
//! [`Multiplexer::next`], which returns exactly one event per wait. Source
//! tasks (signal forwarders, per-pid exit watches, the socket listener) only
//! forward into the stream; all state lives with the engine loop.

mod scheduler;

pub(crate) use scheduler::Scheduler;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jobd_core::{ExitStatus, Signal, TimerId};
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::protocol::{Request, Response};

/// An RPC request paired with the channel its response is written back on.
#[derive(Debug)]
pub struct ControlRequest {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

/// One event delivered by the multiplexer.
#[derive(Debug)]
pub enum MuxEvent {
    /// A watched signal was delivered.
    Signal(Signal),
    /// A watched child exited; carries the reaped status.
    ProcExit { pid: u32, status: ExitStatus },
    /// A timer fired.
    Timer(TimerId),
    /// A control-plane request from the listener.
    Control(ControlRequest),
}

/// All signals the daemon watches for itself.
const DAEMON_SIGNALS: [Signal; 5] =
    [Signal::Hup, Signal::Usr1, Signal::Int, Signal::Term, Signal::Chld];

/// The unified readiness queue.
pub struct Multiplexer {
    tx: mpsc::Sender<MuxEvent>,
    rx: mpsc::Receiver<MuxEvent>,
    timers: Scheduler,
    watches: HashMap<u32, JoinHandle<()>>,
    /// Synthetic pid counter for no-fork mode; counts down from the top of
    /// the range so it can never collide with a real pid.
    next_synthetic_pid: u32,
}

impl Multiplexer {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(256);
        Self { tx, rx, timers: Scheduler::new(), watches: HashMap::new(), next_synthetic_pid: u32::MAX }
    }

    /// Sender half for auxiliary tasks (the listener).
    pub fn sender(&self) -> mpsc::Sender<MuxEvent> {
        self.tx.clone()
    }

    /// Install forwarder tasks for every daemon signal.
    ///
    /// Must run inside the runtime. Failure here is fatal at startup.
    pub fn watch_signals(&self) -> std::io::Result<()> {
        for sig in DAEMON_SIGNALS {
            let kind = match sig {
                Signal::Hup => SignalKind::hangup(),
                Signal::Usr1 => SignalKind::user_defined1(),
                Signal::Int => SignalKind::interrupt(),
                Signal::Term => SignalKind::terminate(),
                Signal::Chld => SignalKind::child(),
            };
            let mut stream = unix_signal(kind)?;
            let tx = self.tx.clone();
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    if tx.send(MuxEvent::Signal(sig)).await.is_err() {
                        break;
                    }
                }
            });
        }
        Ok(())
    }

    /// Register an exit watch for a spawned child.
    ///
    /// The watch task reaps the child and emits exactly one `ProcExit`.
    /// Re-registering a pid replaces the previous watch.
    pub fn watch_exit(&mut self, pid: u32, mut child: tokio::process::Child) {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            let status = match child.wait().await {
                Ok(status) => ExitStatus::from(status),
                Err(e) => {
                    warn!(pid, error = %e, "wait on child failed");
                    ExitStatus::Exited(-1)
                }
            };
            let _ = tx.send(MuxEvent::ProcExit { pid, status }).await;
        });
        if let Some(old) = self.watches.insert(pid, task) {
            old.abort();
        }
    }

    /// Allocate a synthetic pid and deliver an immediate exit for it.
    ///
    /// Used in no-fork mode so the run→reap→reschedule path is exercised
    /// without real processes.
    pub fn watch_exit_synthetic(&mut self, status: ExitStatus) -> u32 {
        let pid = self.next_synthetic_pid;
        self.next_synthetic_pid -= 1;
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            let _ = tx.send(MuxEvent::ProcExit { pid, status }).await;
        });
        if let Some(old) = self.watches.insert(pid, task) {
            old.abort();
        }
        pid
    }

    /// Drop the exit watch for a pid; silently succeeds when absent.
    ///
    /// Called after the exit has been observed, so the watch task has
    /// already finished; this only releases the bookkeeping entry.
    pub fn unwatch_exit(&mut self, pid: u32) {
        self.watches.remove(&pid);
    }

    /// Whether an exit watch exists for the pid.
    pub fn has_exit_watch(&self, pid: u32) -> bool {
        self.watches.contains_key(&pid)
    }

    /// Arm a one-shot timer.
    pub fn set_timer(&mut self, id: TimerId, delay: Duration) {
        trace!(timer = %id, ?delay, "arming timer");
        self.timers.set(id, delay, None, Instant::now());
    }

    /// Arm a periodic timer with the given period (first fire after one
    /// full period).
    pub fn set_periodic_timer(&mut self, id: TimerId, period: Duration) {
        trace!(timer = %id, ?period, "arming periodic timer");
        self.timers.set(id, period, Some(period), Instant::now());
    }

    /// Cancel a timer; silently succeeds when absent.
    pub fn cancel_timer(&mut self, id: &TimerId) {
        self.timers.cancel(id);
    }

    pub fn has_timer(&self, id: &TimerId) -> bool {
        self.timers.contains(id)
    }

    /// Block until the next event. Exactly one event per call.
    pub async fn next(&mut self) -> MuxEvent {
        loop {
            if let Some(fired) = self.timers.pop_fired(Instant::now()) {
                return MuxEvent::Timer(fired);
            }
            match self.timers.next_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        event = self.rx.recv() => {
                            if let Some(event) = event {
                                return event;
                            }
                        }
                        _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {}
                    }
                }
                None => {
                    // The mux holds its own sender, so recv cannot return None.
                    if let Some(event) = self.rx.recv().await {
                        return event;
                    }
                }
            }
        }
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
