//! The design improvement loop.
//!
//! One run is a sequence of iterations over a single image:
//! consolidate (periodically) → decide → validate → execute → analyze → learn.
//! Every external call is awaited in order; the next iteration always starts
//! from the image the previous one produced.

use crate::analysis::{AnalysisStage, apply_style_policy};
use crate::control::{AgentHandle, RunSignal, sleep_unless_stopped, wait_while_paused};
use crate::decision::{DecisionContext, DecisionStage};
use crate::summarizer::LlmSummarizer;
use crate::validation::{GateVerdict, REJECTION_SCORE, ValidationGate};
use designloop_core::agent::{AgentState, OverallProgress, RunConfig, RunStatus};
use designloop_core::analysis::IterationAnalysis;
use designloop_core::decision::Action;
use designloop_core::error::{Error, ExecutionError};
use designloop_core::event::RunObserver;
use designloop_core::execution::{ImageEditor, SpatialValidator};
use designloop_core::image::ImageRef;
use designloop_core::pattern::{PatternKind, Summarizer};
use designloop_core::perception::{DetectedObject, Perceiver};
use designloop_core::provider::Provider;
use designloop_memory::{MemoryLimits, PatternMemory};
use designloop_telemetry::CostTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// How one iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Move on to the next iteration.
    Next,
    /// A stop was observed at a phase boundary.
    Cancelled,
    /// The cost tracker refused the edit; the run is over.
    BudgetExhausted,
}

/// The improvement agent.
///
/// Owns its pattern memory, so rules learned in one run carry into the next
/// run of the same agent. Control it from other tasks through
/// [`DesignAgent::handle`].
pub struct DesignAgent {
    decision: DecisionStage,
    analysis: AnalysisStage,
    summarizer: Arc<dyn Summarizer>,
    perceiver: Arc<dyn Perceiver>,
    editor: Option<Arc<dyn ImageEditor>>,
    gate: ValidationGate,
    memory: PatternMemory,
    perception_cache: Option<(ImageRef, Vec<DetectedObject>)>,
    handle: AgentHandle,
    unit_cost: f64,
    simulated_delay: Duration,
    summarize_interval: u32,
}

impl DesignAgent {
    /// Create an agent whose decision, critique and consolidation calls all
    /// go to `provider` with `model`.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        perceiver: Arc<dyn Perceiver>,
    ) -> Self {
        let model = model.into();
        Self {
            decision: DecisionStage::new(provider.clone(), model.clone()),
            analysis: AnalysisStage::new(provider.clone(), model.clone()),
            summarizer: Arc::new(LlmSummarizer::new(provider, model)),
            perceiver,
            editor: None,
            gate: ValidationGate::new(),
            memory: PatternMemory::default(),
            perception_cache: None,
            handle: AgentHandle::new(),
            unit_cost: 0.04,
            simulated_delay: Duration::from_millis(1000),
            summarize_interval: 5,
        }
    }

    /// The editor used outside test mode.
    pub fn with_editor(mut self, editor: Arc<dyn ImageEditor>) -> Self {
        self.editor = Some(editor);
        self
    }

    /// Spatial checks outside test mode.
    pub fn with_spatial_validator(mut self, validator: Arc<dyn SpatialValidator>) -> Self {
        self.gate = self.gate.with_spatial_validator(validator);
        self
    }

    /// Replace the default consolidation summarizer.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Start from existing memory instead of an empty one.
    pub fn with_memory(mut self, memory: PatternMemory) -> Self {
        self.memory = memory;
        self
    }

    /// Start from an empty memory with custom limits.
    pub fn with_memory_limits(mut self, limits: MemoryLimits) -> Self {
        self.memory = PatternMemory::new(limits);
        self
    }

    /// Which learned rules reach the decision prompt.
    pub fn with_recall(mut self, min_score: f64, limit: usize) -> Self {
        self.decision = self.decision.with_recall(min_score, limit);
        self
    }

    /// Cost reserved for every real edit.
    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = unit_cost;
        self.decision = self.decision.with_unit_cost(unit_cost);
        self
    }

    /// Stand-in latency for edits in test mode.
    pub fn with_simulated_delay(mut self, delay: Duration) -> Self {
        self.simulated_delay = delay;
        self
    }

    /// Consolidate memory every `interval` iterations. Zero disables it.
    pub fn with_summarize_interval(mut self, interval: u32) -> Self {
        self.summarize_interval = interval;
        self
    }

    /// Sampling temperature for decisions. Critiques keep their own low default.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.decision = self.decision.with_temperature(temperature);
        self
    }

    /// Reply length cap for decision and critique requests.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.decision = self.decision.with_max_tokens(max_tokens);
        self.analysis = self.analysis.with_max_tokens(max_tokens);
        self
    }

    /// Control handle; clone it into whatever task needs to pause or stop the run.
    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    /// Copy of the last published state.
    pub fn state(&self) -> AgentState {
        self.handle.state()
    }

    pub fn memory(&self) -> &PatternMemory {
        &self.memory
    }

    /// Run the loop on `image` until the iteration cap, budget exhaustion,
    /// or a stop request.
    ///
    /// Never fails: collaborator errors end up in the returned state's error
    /// log. The returned state is terminal (`Completed` or `Stopped`).
    pub async fn run(
        &mut self,
        image: ImageRef,
        config: RunConfig,
        observer: &dyn RunObserver,
    ) -> AgentState {
        self.handle.reset();
        let mut signals = self.handle.signals();
        let mut cost = CostTracker::new(config.max_cost);
        let mut state = AgentState {
            is_running: true,
            status: RunStatus::Running,
            current_image: Some(image.clone()),
            learned_patterns: self.memory.snapshot(),
            ..AgentState::default()
        };

        info!(
            goal = %config.design_goal,
            max_iterations = config.max_iterations,
            max_cost = config.max_cost,
            test_mode = config.test_mode,
            "Design run started"
        );
        observer.on_start(&config).await;

        state.detected_objects = self.initial_perception(&image, &mut state).await;
        self.handle.publish(&mut state);

        let mut stop_reason: Option<String> = None;

        for iteration in 1..=config.max_iterations {
            if self.handle.is_stop_requested() || !self.checkpoint(&mut signals, &mut state).await {
                stop_reason = Some("Stopped by user".into());
                break;
            }

            state.current_iteration = iteration;
            self.handle.publish(&mut state);
            debug!(iteration, "Iteration started");

            let outcome = match self.iterate(iteration, &config, &mut cost, &mut signals, &mut state, observer).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(iteration, error = %e, "Iteration failed");
                    state.errors.push(format!("Iteration {iteration}: {e}"));
                    if self.handle.is_stop_requested() {
                        IterationOutcome::Cancelled
                    } else {
                        IterationOutcome::Next
                    }
                }
            };

            match outcome {
                IterationOutcome::Next => {}
                IterationOutcome::Cancelled => {
                    stop_reason = Some("Stopped by user".into());
                    break;
                }
                IterationOutcome::BudgetExhausted => {
                    stop_reason = Some("Budget limit reached".into());
                    break;
                }
            }

            state.overall_progress = OverallProgress::from_analyses(&state.analyses);
            state.total_cost = cost.spent();
            state.learned_patterns = self.memory.snapshot();
            let snapshot = self.handle.publish(&mut state);
            observer.on_progress(&snapshot).await;

            if iteration < config.max_iterations
                && sleep_unless_stopped(&mut signals, Duration::from_millis(config.iteration_delay_ms)).await
            {
                stop_reason = Some("Stopped by user".into());
                break;
            }
        }

        state.is_running = false;
        state.is_paused = false;
        state.status = if stop_reason.is_some() { RunStatus::Stopped } else { RunStatus::Completed };
        state.stop_reason = Some(stop_reason.unwrap_or_else(|| "Reached iteration limit".into()));
        state.overall_progress = OverallProgress::from_analyses(&state.analyses);
        state.total_cost = cost.spent();
        state.learned_patterns = self.memory.snapshot();

        let summary = cost.summary();
        info!(
            status = %state.status,
            reason = state.stop_reason.as_deref().unwrap_or_default(),
            iterations = state.current_iteration,
            spent = summary.spent_usd,
            reservations = summary.reservations,
            avg_quality = state.overall_progress.avg_quality,
            success_rate = state.overall_progress.success_rate,
            "Design run finished"
        );

        let snapshot = self.handle.publish(&mut state);
        observer.on_progress(&snapshot).await;
        snapshot
    }

    /// One iteration, from consolidation to learning.
    async fn iterate(
        &mut self,
        iteration: u32,
        config: &RunConfig,
        cost: &mut CostTracker,
        signals: &mut watch::Receiver<RunSignal>,
        state: &mut AgentState,
        observer: &dyn RunObserver,
    ) -> Result<IterationOutcome, Error> {
        if iteration > 1 && self.summarize_interval > 0 && iteration % self.summarize_interval == 0 {
            self.consolidate(iteration, observer).await;
        }

        // Decide
        let decision = {
            let ctx = DecisionContext {
                config,
                iteration,
                history: &state.decisions,
                objects: &state.detected_objects,
                memory: &self.memory,
                image: state.current_image.as_ref(),
            };
            self.decision.decide(&ctx).await
        };
        info!(
            iteration,
            action = %decision.action,
            target = %decision.target,
            confidence = decision.confidence,
            "Decision made"
        );
        state.decisions.push(decision.clone());
        observer.on_decision(&decision).await;

        if !self.checkpoint(signals, state).await {
            return Ok(IterationOutcome::Cancelled);
        }

        if decision.action == Action::Wait {
            state.improvements.push(format!("Iteration {iteration}: waited ({})", decision.reason));
            return Ok(IterationOutcome::Next);
        }

        // Validate
        let verdict = self
            .gate
            .check(&decision, &state.detected_objects, state.current_image.as_ref(), config.test_mode)
            .await?;
        if let GateVerdict::Rejected(rejection) = verdict {
            let rule = rejection.avoid_rule(&decision);
            let reason = rejection.detail();
            info!(iteration, rule = %rule, reason = %reason, "Decision rejected before execution");
            self.memory.observe(PatternKind::Execution, &rule, REJECTION_SCORE, iteration);
            state.improvements.push(format!("Iteration {iteration}: rejected, {rule} ({reason})"));

            let analysis = rejection.into_analysis(decision);
            state.analyses.push(analysis.clone());
            observer.on_analysis(&analysis).await;
            return Ok(IterationOutcome::Next);
        }

        if !self.checkpoint(signals, state).await {
            return Ok(IterationOutcome::Cancelled);
        }

        // Execute
        let edited = if config.test_mode {
            tokio::time::sleep(self.simulated_delay).await;
            state.improvements.push(format!("[TEST MODE] Would execute {}", decision.summary()));
            state.current_image.clone()
        } else {
            let Some(editor) = self.editor.clone() else {
                return Err(ExecutionError::NotConfigured("no image editor attached".into()).into());
            };
            if let Err(e) = cost.reserve(format!("edit:{} {}", decision.action, decision.target), self.unit_cost) {
                state.errors.push(format!("Budget limit reached ({e})"));
                return Ok(IterationOutcome::BudgetExhausted);
            }
            state.total_cost = cost.spent();

            let Some(current) = state.current_image.clone() else {
                return Err(Error::Internal("no current image".into()));
            };
            match editor.execute(&current, &decision).await? {
                Some(new_image) => {
                    info!(iteration, cost = cost.spent(), "Edit applied");
                    state.current_image = Some(new_image.clone());
                    self.refresh_perception(&new_image, state).await;
                    Some(new_image)
                }
                None => {
                    warn!(iteration, "Editor returned no image");
                    state.errors.push(format!(
                        "Iteration {iteration}: editor returned no image for {}",
                        decision.summary()
                    ));
                    return Ok(IterationOutcome::Next);
                }
            }
        };

        if !self.checkpoint(signals, state).await {
            return Ok(IterationOutcome::Cancelled);
        }

        // Analyze
        let mut analysis = self.analysis.analyze(&decision, edited.as_ref(), config).await;
        let prior_style = OverallProgress::from_analyses(&state.analyses).avg_style_score;
        apply_style_policy(&mut analysis, prior_style);
        info!(
            iteration,
            quality = analysis.quality_score,
            style = analysis.style_score,
            success = analysis.success,
            score = analysis.learning_weight,
            "Iteration analyzed"
        );
        state.improvements.push(format!(
            "Iteration {iteration}: {} [{}] quality {:.2}, style {:.2}",
            decision.summary(),
            if analysis.success { "success" } else { "failed" },
            analysis.quality_score,
            analysis.style_score
        ));
        state.analyses.push(analysis.clone());
        observer.on_analysis(&analysis).await;

        if !self.checkpoint(signals, state).await {
            return Ok(IterationOutcome::Cancelled);
        }

        // Learn
        self.learn(iteration, &analysis);
        Ok(IterationOutcome::Next)
    }

    fn learn(&mut self, iteration: u32, analysis: &IterationAnalysis) {
        let decision = &analysis.decision;
        let rule = if analysis.success {
            format!("{} on {} succeeds", decision.action, decision.target)
        } else {
            format!("Avoid {} on {}", decision.action, decision.target)
        };
        self.memory.observe(PatternKind::Execution, &rule, analysis.learning_weight, iteration);

        if !analysis.lesson_learned.is_empty() {
            self.memory
                .observe(PatternKind::Style, &analysis.lesson_learned, analysis.learning_weight, iteration);
        }
    }

    async fn consolidate(&mut self, iteration: u32, observer: &dyn RunObserver) {
        for kind in [PatternKind::Execution, PatternKind::Style] {
            match self.memory.consolidate(kind, self.summarizer.as_ref(), iteration).await {
                Ok(0) => debug!(iteration, %kind, "Nothing to consolidate"),
                Ok(rules) => observer.on_consolidation(kind, rules).await,
                Err(e) => warn!(iteration, %kind, error = %e, "Consolidation failed, keeping patterns"),
            }
        }
    }

    /// Phase boundary: wait out a pause, then report whether to go on.
    async fn checkpoint(&self, signals: &mut watch::Receiver<RunSignal>, state: &mut AgentState) -> bool {
        match self.handle.signal() {
            RunSignal::Run => true,
            RunSignal::Stop => false,
            RunSignal::Pause => {
                info!(iteration = state.current_iteration, "Run paused");
                self.handle.publish(state);
                let proceed = wait_while_paused(signals).await;
                self.handle.publish(state);
                if proceed {
                    info!(iteration = state.current_iteration, "Run resumed");
                }
                proceed
            }
        }
    }

    async fn initial_perception(&mut self, image: &ImageRef, state: &mut AgentState) -> Vec<DetectedObject> {
        if let Some((cached, objects)) = &self.perception_cache {
            if cached == image {
                debug!(count = objects.len(), "Using cached perception");
                return objects.clone();
            }
        }

        match self.perceiver.detect_objects(image).await {
            Ok(objects) => {
                info!(count = objects.len(), "Initial perception complete");
                self.perception_cache = Some((image.clone(), objects.clone()));
                objects
            }
            Err(e) => {
                warn!(error = %e, "Initial perception failed");
                state.errors.push(format!("Initial perception failed: {e}"));
                Vec::new()
            }
        }
    }

    async fn refresh_perception(&mut self, image: &ImageRef, state: &mut AgentState) {
        match self.perceiver.detect_objects(image).await {
            Ok(objects) => {
                debug!(count = objects.len(), "Perception refreshed");
                self.perception_cache = Some((image.clone(), objects.clone()));
                state.detected_objects = objects;
            }
            Err(e) => {
                warn!(error = %e, "Perception refresh failed, keeping previous objects");
                state.errors.push(format!(
                    "Iteration {}: perception refresh failed: {e}",
                    state.current_iteration
                ));
            }
        }
    }
}
