//! Cooperative run control.
//!
//! An [`AgentHandle`] is a cheap clone that any task can hold. Control
//! requests travel on one `watch` channel and the loop observes them at
//! phase boundaries. State snapshots travel the other way on a second
//! `watch` channel, so readers never touch the loop's live state.

use designloop_core::agent::{AgentState, RunStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Upper bound on how long a paused loop goes without re-checking its signal.
pub const PAUSE_POLL: Duration = Duration::from_secs(1);

/// What the caller wants the loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSignal {
    Run,
    Pause,
    Stop,
}

/// Control and observation handle for a [`DesignAgent`](crate::DesignAgent).
#[derive(Clone)]
pub struct AgentHandle {
    signal: Arc<watch::Sender<RunSignal>>,
    state: Arc<watch::Sender<AgentState>>,
}

impl AgentHandle {
    pub(crate) fn new() -> Self {
        let (signal, _) = watch::channel(RunSignal::Run);
        let (state, _) = watch::channel(AgentState::default());
        Self {
            signal: Arc::new(signal),
            state: Arc::new(state),
        }
    }

    /// Ask the loop to pause before its next phase. Ignored once stopped.
    pub fn pause(&self) {
        self.signal.send_if_modified(|s| {
            if *s == RunSignal::Run {
                *s = RunSignal::Pause;
                true
            } else {
                false
            }
        });
    }

    /// Let a paused loop continue. Ignored once stopped.
    pub fn resume(&self) {
        self.signal.send_if_modified(|s| {
            if *s == RunSignal::Pause {
                *s = RunSignal::Run;
                true
            } else {
                false
            }
        });
    }

    /// Ask the loop to end at the next phase boundary. Also ends a pause.
    pub fn stop(&self) {
        self.signal.send_replace(RunSignal::Stop);
    }

    pub fn signal(&self) -> RunSignal {
        *self.signal.borrow()
    }

    pub fn is_paused(&self) -> bool {
        self.signal() == RunSignal::Pause
    }

    pub fn is_stop_requested(&self) -> bool {
        self.signal() == RunSignal::Stop
    }

    /// Copy of the most recently published state.
    pub fn state(&self) -> AgentState {
        self.state.borrow().clone()
    }

    /// Receive every published state copy.
    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    /// Clear a stop left over from a previous run. A pending pause is kept.
    pub(crate) fn reset(&self) {
        self.signal.send_if_modified(|s| {
            if *s == RunSignal::Stop {
                *s = RunSignal::Run;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn signals(&self) -> watch::Receiver<RunSignal> {
        self.signal.subscribe()
    }

    /// Align the pause flags with the current signal and publish a copy.
    /// Returns the copy for callbacks.
    pub(crate) fn publish(&self, state: &mut AgentState) -> AgentState {
        if state.is_running {
            let paused = self.is_paused();
            state.is_paused = paused;
            state.status = if paused { RunStatus::Paused } else { RunStatus::Running };
        }
        let snapshot = state.clone();
        self.state.send_replace(snapshot.clone());
        snapshot
    }
}

/// Block while paused. Returns `false` if a stop arrives first.
pub(crate) async fn wait_while_paused(signals: &mut watch::Receiver<RunSignal>) -> bool {
    loop {
        match *signals.borrow_and_update() {
            RunSignal::Run => return true,
            RunSignal::Stop => return false,
            RunSignal::Pause => {}
        }
        tokio::select! {
            changed = signals.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
            _ = tokio::time::sleep(PAUSE_POLL) => {}
        }
    }
}

/// Sleep for `duration` unless a stop arrives. Returns `true` if stopped.
pub(crate) async fn sleep_unless_stopped(
    signals: &mut watch::Receiver<RunSignal>,
    duration: Duration,
) -> bool {
    if duration.is_zero() {
        return *signals.borrow() == RunSignal::Stop;
    }
    let interrupted = tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = stopped(signals) => true,
    };
    interrupted || *signals.borrow() == RunSignal::Stop
}

async fn stopped(signals: &mut watch::Receiver<RunSignal>) {
    loop {
        if *signals.borrow_and_update() == RunSignal::Stop {
            return;
        }
        if signals.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
