//! Run observation: callback hooks and a broadcast event bus.
//!
//! The run loop reports through a [`RunObserver`]. Hooks are awaited in
//! order (decision → analysis → progress), so an observer always sees the
//! iteration sequence exactly as it happened. [`EventBusObserver`] adapts
//! those hooks onto an [`EventBus`] for hosts that prefer pub/sub.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::agent::{AgentState, RunConfig, RunStatus};
use crate::analysis::IterationAnalysis;
use crate::decision::Decision;
use crate::pattern::PatternKind;

/// Callback hooks invoked by the run loop.
#[async_trait]
pub trait RunObserver: Send + Sync {
    async fn on_start(&self, _config: &RunConfig) {}

    async fn on_decision(&self, _decision: &Decision) {}

    async fn on_analysis(&self, _analysis: &IterationAnalysis) {}

    /// Receives a snapshot copy, never the live state.
    async fn on_progress(&self, _state: &AgentState) {}

    async fn on_consolidation(&self, _kind: PatternKind, _rules: usize) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

#[async_trait]
impl RunObserver for NoopObserver {}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A run left the idle state
    RunStarted {
        design_goal: String,
        max_iterations: u32,
        test_mode: bool,
        timestamp: DateTime<Utc>,
    },

    /// A decision was produced for an iteration
    DecisionMade {
        decision: Decision,
        timestamp: DateTime<Utc>,
    },

    /// An iteration was scored (including validation rejections)
    IterationAnalyzed {
        iteration: u32,
        quality_score: f64,
        style_score: f64,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// Progress snapshot after an iteration
    Progress {
        iteration: u32,
        total_cost: f64,
        avg_quality: f64,
        success_rate: f64,
        timestamp: DateTime<Utc>,
    },

    /// A pattern collection was compacted
    PatternsConsolidated {
        kind: PatternKind,
        rules: usize,
        timestamp: DateTime<Utc>,
    },

    /// The run ended
    RunFinished {
        status: RunStatus,
        reason: Option<String>,
        iterations: u32,
        total_cost: f64,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Publishes every observer hook as a [`DomainEvent`].
pub struct EventBusObserver {
    bus: Arc<EventBus>,
}

impl EventBusObserver {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl RunObserver for EventBusObserver {
    async fn on_start(&self, config: &RunConfig) {
        self.bus.publish(DomainEvent::RunStarted {
            design_goal: config.design_goal.clone(),
            max_iterations: config.max_iterations,
            test_mode: config.test_mode,
            timestamp: Utc::now(),
        });
    }

    async fn on_decision(&self, decision: &Decision) {
        self.bus.publish(DomainEvent::DecisionMade {
            decision: decision.clone(),
            timestamp: Utc::now(),
        });
    }

    async fn on_analysis(&self, analysis: &IterationAnalysis) {
        self.bus.publish(DomainEvent::IterationAnalyzed {
            iteration: analysis.iteration,
            quality_score: analysis.quality_score,
            style_score: analysis.style_score,
            success: analysis.success,
            timestamp: Utc::now(),
        });
    }

    async fn on_progress(&self, state: &AgentState) {
        let event = match state.status {
            RunStatus::Idle => return,
            RunStatus::Running | RunStatus::Paused => DomainEvent::Progress {
                iteration: state.current_iteration,
                total_cost: state.total_cost,
                avg_quality: state.overall_progress.avg_quality,
                success_rate: state.overall_progress.success_rate,
                timestamp: Utc::now(),
            },
            RunStatus::Stopped | RunStatus::Completed => DomainEvent::RunFinished {
                status: state.status,
                reason: state.stop_reason.clone(),
                iterations: state.current_iteration,
                total_cost: state.total_cost,
                timestamp: Utc::now(),
            },
        };
        self.bus.publish(event);
    }

    async fn on_consolidation(&self, kind: PatternKind, rules: usize) {
        self.bus.publish(DomainEvent::PatternsConsolidated {
            kind,
            rules,
            timestamp: Utc::now(),
        });
    }
}
