//! End-to-end tests for the design run loop.
//!
//! Every collaborator is scripted, so each test pins down one behaviour of
//! the loop: budget enforcement, validation short-circuits, consolidation
//! cadence, the style-regression penalty, and cooperative pause/stop.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use designloop_agent::{ANALYSIS_SYSTEM, CONSOLIDATION_SYSTEM, DECISION_SYSTEM, DesignAgent};
use designloop_core::agent::{AgentState, RunConfig, RunStatus};
use designloop_core::analysis::IterationAnalysis;
use designloop_core::decision::Decision;
use designloop_core::error::{ExecutionError, MemoryError, PerceptionError, ProviderError, ValidationError};
use designloop_core::event::{DomainEvent, EventBus, EventBusObserver, NoopObserver, RunObserver};
use designloop_core::execution::{ImageEditor, SpatialConstraints, SpatialValidator, SpatialVerdict};
use designloop_core::image::ImageRef;
use designloop_core::message::Message;
use designloop_core::pattern::{PatternKind, Summarizer};
use designloop_core::perception::{DetectedObject, Perceiver};
use designloop_core::provider::{Provider, ProviderRequest, ProviderResponse};

// ── Scripted collaborators ───────────────────────────────────────────────

/// Answers decision and critique requests from separate scripts.
///
/// When a script runs out, the default reply is repeated.
struct Reasoner {
    decisions: Mutex<VecDeque<String>>,
    default_decision: String,
    analyses: Mutex<VecDeque<String>>,
    default_analysis: String,
    decision_delay: Duration,
    decision_prompts: Mutex<Vec<String>>,
    analysis_calls: Mutex<usize>,
}

impl Reasoner {
    fn new(default_decision: String, default_analysis: String) -> Self {
        Self {
            decisions: Mutex::new(VecDeque::new()),
            default_decision,
            analyses: Mutex::new(VecDeque::new()),
            default_analysis,
            decision_delay: Duration::ZERO,
            decision_prompts: Mutex::new(Vec::new()),
            analysis_calls: Mutex::new(0),
        }
    }

    fn with_analyses(self, replies: Vec<String>) -> Self {
        *self.analyses.lock().unwrap() = replies.into();
        self
    }

    fn with_decision_delay(mut self, delay: Duration) -> Self {
        self.decision_delay = delay;
        self
    }

    fn decision_prompts(&self) -> Vec<String> {
        self.decision_prompts.lock().unwrap().clone()
    }

    fn analysis_calls(&self) -> usize {
        *self.analysis_calls.lock().unwrap()
    }
}

#[async_trait]
impl Provider for Reasoner {
    fn name(&self) -> &str {
        "reasoner_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let system = request.messages[0].content.as_str();
        let text = if system == DECISION_SYSTEM {
            if !self.decision_delay.is_zero() {
                tokio::time::sleep(self.decision_delay).await;
            }
            self.decision_prompts
                .lock()
                .unwrap()
                .push(request.messages[1].content.clone());
            self.decisions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.default_decision.clone())
        } else if system == ANALYSIS_SYSTEM {
            *self.analysis_calls.lock().unwrap() += 1;
            self.analyses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.default_analysis.clone())
        } else if system == CONSOLIDATION_SYSTEM {
            r#"{"rules": ["Consolidated by the reasoner"]}"#.to_string()
        } else {
            return Err(ProviderError::ApiError {
                status_code: 400,
                message: "unexpected request".into(),
            });
        };

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model: "mock-model".into(),
        })
    }
}

struct FixedPerceiver {
    objects: Vec<DetectedObject>,
}

impl FixedPerceiver {
    fn new(names: &[&str]) -> Self {
        Self {
            objects: names.iter().map(|n| DetectedObject::new(*n, "furniture")).collect(),
        }
    }
}

#[async_trait]
impl Perceiver for FixedPerceiver {
    async fn detect_objects(&self, _image: &ImageRef) -> Result<Vec<DetectedObject>, PerceptionError> {
        Ok(self.objects.clone())
    }
}

/// Returns `https://edits.example.com/<n>.png` for the n-th call, or nothing.
struct CountingEditor {
    produce: bool,
    calls: Mutex<usize>,
}

impl CountingEditor {
    fn working() -> Self {
        Self {
            produce: true,
            calls: Mutex::new(0),
        }
    }

    fn empty_handed() -> Self {
        Self {
            produce: false,
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ImageEditor for CountingEditor {
    async fn execute(&self, _image: &ImageRef, _decision: &Decision) -> Result<Option<ImageRef>, ExecutionError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        Ok(self.produce.then(|| edit_image(*calls)))
    }
}

/// Rejects every decision. An escalating validator words each warning differently.
struct RejectingValidator {
    warning: String,
    escalating: bool,
    calls: Mutex<u32>,
}

impl RejectingValidator {
    fn fixed(warning: &str) -> Self {
        Self {
            warning: warning.into(),
            escalating: false,
            calls: Mutex::new(0),
        }
    }

    fn escalating(warning: &str) -> Self {
        Self {
            escalating: true,
            ..Self::fixed(warning)
        }
    }
}

#[async_trait]
impl SpatialValidator for RejectingValidator {
    async fn validate(
        &self,
        _decision: &Decision,
        _constraints: &SpatialConstraints,
    ) -> Result<SpatialVerdict, ValidationError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        let warning = if self.escalating {
            format!("{} by {}cm", self.warning, *calls * 10)
        } else {
            self.warning.clone()
        };
        Ok(SpatialVerdict::rejected(warning))
    }
}

/// Records every consolidation request and answers with a numbered rule.
#[derive(Default)]
struct CountingSummarizer {
    calls: Mutex<Vec<(PatternKind, Vec<String>)>>,
}

impl CountingSummarizer {
    fn calls_for(&self, kind: PatternKind) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, rules)| rules.clone())
            .collect()
    }
}

#[async_trait]
impl Summarizer for CountingSummarizer {
    async fn summarize(&self, kind: PatternKind, rules: &[String]) -> Result<Vec<String>, MemoryError> {
        let mut calls = self.calls.lock().unwrap();
        calls.push((kind, rules.to_vec()));
        let n = calls.iter().filter(|(k, _)| *k == kind).count();
        Ok(vec![format!("Distilled {kind} rule {n}")])
    }
}

/// Flattens observer callbacks into a readable trace.
#[derive(Default)]
struct RecordingObserver {
    trace: Mutex<Vec<String>>,
}

impl RecordingObserver {
    fn trace(&self) -> Vec<String> {
        self.trace.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunObserver for RecordingObserver {
    async fn on_start(&self, _config: &RunConfig) {
        self.trace.lock().unwrap().push("start".into());
    }

    async fn on_decision(&self, decision: &Decision) {
        self.trace.lock().unwrap().push(format!("decision:{}", decision.iteration));
    }

    async fn on_analysis(&self, analysis: &IterationAnalysis) {
        self.trace.lock().unwrap().push(format!("analysis:{}", analysis.iteration));
    }

    async fn on_progress(&self, state: &AgentState) {
        self.trace
            .lock()
            .unwrap()
            .push(format!("progress:{}:{}", state.current_iteration, state.status));
    }

    async fn on_consolidation(&self, kind: PatternKind, _rules: usize) {
        self.trace.lock().unwrap().push(format!("consolidation:{kind}"));
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

fn decision_reply(action: &str, target: &str) -> String {
    serde_json::json!({
        "action": action,
        "target": target,
        "reason": "improve the layout",
        "prompt": format!("{action} the {target}"),
        "confidence": 0.8,
    })
    .to_string()
}

fn analysis_reply(quality: u32, style: u32, success: bool, lesson: &str) -> String {
    serde_json::json!({
        "qualityScore": quality,
        "styleScore": style,
        "success": success,
        "strengths": ["cleaner layout"],
        "weaknesses": [],
        "styleNotes": "consistent palette",
        "lessonLearned": lesson,
    })
    .to_string()
}

fn initial_image() -> ImageRef {
    ImageRef::from_uri("https://images.example.com/living-room.png")
}

fn edit_image(n: usize) -> ImageRef {
    ImageRef::from_uri(format!("https://edits.example.com/{n}.png"))
}

fn config(iterations: u32, test_mode: bool) -> RunConfig {
    RunConfig {
        test_mode,
        max_iterations: iterations,
        iteration_delay_ms: 0,
        max_cost: 1.0,
        ..RunConfig::new("bright, uncluttered living room")
    }
}

fn agent(reasoner: Arc<Reasoner>, objects: &[&str]) -> DesignAgent {
    DesignAgent::new(reasoner, "mock-model", Arc::new(FixedPerceiver::new(objects)))
        .with_simulated_delay(Duration::ZERO)
}

fn moving_sofa() -> Arc<Reasoner> {
    Arc::new(Reasoner::new(
        decision_reply("MOVE", "sofa"),
        analysis_reply(80, 70, true, "Keep walkways clear"),
    ))
}

// ── Budget ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn budget_stops_run_on_third_reservation() {
    let editor = Arc::new(CountingEditor::working());
    let mut agent = agent(moving_sofa(), &["sofa", "table"]).with_editor(editor.clone());
    let mut cfg = config(5, false);
    cfg.max_cost = 0.08;

    let state = agent.run(initial_image(), cfg, &NoopObserver).await;

    assert_eq!(editor.calls(), 2);
    assert_eq!(state.status, RunStatus::Stopped);
    assert!(!state.is_running);
    assert_eq!(state.stop_reason.as_deref(), Some("Budget limit reached"));
    assert!(state.errors.iter().any(|e| e.to_lowercase().contains("budget")));
    assert!((state.total_cost - 0.08).abs() < 1e-9);
    assert_eq!(state.current_iteration, 3);
    assert_eq!(state.analyses.len(), 2);
    assert_eq!(state.current_image, Some(edit_image(2)));
}

#[tokio::test]
async fn empty_edit_is_logged_and_keeps_image() {
    let editor = Arc::new(CountingEditor::empty_handed());
    let reasoner = moving_sofa();
    let mut agent = agent(reasoner.clone(), &["sofa"]).with_editor(editor.clone());

    let state = agent.run(initial_image(), config(1, false), &NoopObserver).await;

    assert_eq!(editor.calls(), 1);
    assert_eq!(state.current_image, Some(initial_image()));
    assert!(state.errors.iter().any(|e| e.contains("editor returned no image")));
    // Money already spent stays spent.
    assert!((state.total_cost - 0.04).abs() < 1e-9);
    assert!(state.analyses.is_empty());
    assert_eq!(reasoner.analysis_calls(), 0);
    assert_eq!(state.status, RunStatus::Completed);
}

// ── WAIT ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn wait_charges_nothing_and_records_no_analysis() {
    let reasoner = Arc::new(Reasoner::new(
        decision_reply("WAIT", ""),
        analysis_reply(80, 70, true, "unused"),
    ));
    let editor = Arc::new(CountingEditor::working());
    let mut agent = agent(reasoner.clone(), &["sofa"]).with_editor(editor.clone());

    let state = agent.run(initial_image(), config(3, false), &NoopObserver).await;

    assert_eq!(state.current_iteration, 3);
    assert_eq!(state.decisions.len(), 3);
    assert!(state.analyses.is_empty());
    assert_eq!(state.total_cost, 0.0);
    assert_eq!(editor.calls(), 0);
    assert_eq!(reasoner.analysis_calls(), 0);
    assert_eq!(state.status, RunStatus::Completed);
}

// ── Validation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn missing_target_learns_avoid_rule_without_critique() {
    let reasoner = Arc::new(Reasoner::new(
        decision_reply("MOVE", "floating shelf"),
        analysis_reply(80, 70, true, "unused"),
    ));
    let mut agent = agent(reasoner.clone(), &["sofa", "table"]);

    let state = agent.run(initial_image(), config(1, true), &NoopObserver).await;

    let avoid = state
        .learned_patterns
        .execution
        .iter()
        .find(|p| p.content.contains("Avoid MOVE on floating shelf"))
        .expect("avoid rule learned");
    assert!(avoid.score >= 0.8);

    assert_eq!(state.analyses.len(), 1);
    assert!(!state.analyses[0].success);
    assert_eq!(state.analyses[0].quality_score, 0.0);
    assert_eq!(reasoner.analysis_calls(), 0);
    assert_eq!(state.current_image, Some(initial_image()));
}

#[tokio::test]
async fn spatial_rejection_skips_execution_and_cost() {
    let editor = Arc::new(CountingEditor::working());
    let mut agent = agent(moving_sofa(), &["sofa", "door"])
        .with_editor(editor.clone())
        .with_spatial_validator(Arc::new(RejectingValidator::fixed("sofa would block the doorway")));

    let state = agent.run(initial_image(), config(1, false), &NoopObserver).await;

    assert_eq!(editor.calls(), 0);
    assert_eq!(state.total_cost, 0.0);
    assert!(state.analyses[0].weaknesses[0].contains("sofa would block the doorway"));
    assert!(state.improvements[0].contains("sofa would block the doorway"));
    let avoid = &state.learned_patterns.execution[0];
    assert_eq!(avoid.content, "Avoid MOVE on sofa");
    assert!((avoid.score - 0.8).abs() < 1e-9);
}

#[tokio::test]
async fn repeated_rejections_reinforce_one_avoid_rule() {
    let mut agent = agent(moving_sofa(), &["sofa", "door"])
        .with_editor(Arc::new(CountingEditor::working()))
        .with_spatial_validator(Arc::new(RejectingValidator::escalating("sofa would block the doorway")));

    let state = agent.run(initial_image(), config(2, false), &NoopObserver).await;

    let execution = &state.learned_patterns.execution;
    assert_eq!(execution.len(), 1);
    assert_eq!(execution[0].content, "Avoid MOVE on sofa");
    assert_eq!(execution[0].frequency, 2);
    assert_eq!(execution[0].last_iteration, 2);
    assert!(state.analyses[0].weaknesses[0].contains("by 10cm"));
    assert!(state.analyses[1].weaknesses[0].contains("by 20cm"));
}

// ── Consolidation ────────────────────────────────────────────────────────

#[tokio::test]
async fn twelve_iterations_consolidate_twice() {
    let summarizer = Arc::new(CountingSummarizer::default());
    let observer = RecordingObserver::default();
    let mut agent = agent(moving_sofa(), &["sofa"])
        .with_summarizer(summarizer.clone())
        .with_summarize_interval(5);

    let state = agent.run(initial_image(), config(12, true), &observer).await;
    assert_eq!(state.status, RunStatus::Completed);

    let style_calls = summarizer.calls_for(PatternKind::Style);
    assert_eq!(style_calls.len(), 2);
    assert_eq!(style_calls[0], vec!["Keep walkways clear".to_string()]);
    // The second pass sees the first pass's output: the collection was replaced.
    assert!(style_calls[1].contains(&"Distilled style rule 1".to_string()));

    let style = &state.learned_patterns.style;
    assert!(style.iter().any(|p| p.content == "Distilled style rule 2" && p.last_iteration == 10));
    assert!(!style.iter().any(|p| p.content == "Distilled style rule 1"));

    let trace = observer.trace();
    let consolidations: Vec<usize> = trace
        .iter()
        .enumerate()
        .filter(|(_, t)| *t == "consolidation:style")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(consolidations.len(), 2);
    assert_eq!(trace[consolidations[0] + 1], "decision:5");
    assert_eq!(trace[consolidations[1] + 1], "decision:10");
}

#[tokio::test]
async fn first_iteration_never_consolidates() {
    let summarizer = Arc::new(CountingSummarizer::default());
    let mut agent = agent(moving_sofa(), &["sofa"])
        .with_summarizer(summarizer.clone())
        .with_summarize_interval(1);

    agent.run(initial_image(), config(3, true), &NoopObserver).await;
    assert_eq!(summarizer.calls_for(PatternKind::Style).len(), 2);

    // Carried-over memory is not compacted before the next run's first decision.
    let observer = RecordingObserver::default();
    let state = agent.run(initial_image(), config(2, true), &observer).await;

    let trace = observer.trace();
    assert_eq!(trace[..3], ["start", "decision:1", "analysis:1"]);
    assert_eq!(trace[4], "consolidation:execution");
    assert_eq!(trace[6], "decision:2");
    assert_eq!(summarizer.calls_for(PatternKind::Style).len(), 3);
    assert!(state.learned_patterns.style.iter().any(|p| p.last_iteration == 2));
}

// ── Scoring ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn style_regression_flips_success_and_halves_weight() {
    let reasoner = Arc::new(
        Reasoner::new(decision_reply("MOVE", "sofa"), analysis_reply(80, 80, true, "unused")).with_analyses(vec![
            analysis_reply(80, 80, true, "Warm wood tones"),
            analysis_reply(90, 60, true, "Bold accent colours"),
        ]),
    );
    let mut agent = agent(reasoner, &["sofa"]);

    let state = agent.run(initial_image(), config(2, true), &NoopObserver).await;

    let first = &state.analyses[0];
    assert!(first.success);
    assert!((first.learning_weight - 0.8).abs() < 1e-9);

    let second = &state.analyses[1];
    assert!(!second.success);
    assert!((second.learning_weight - 0.45).abs() < 1e-9);
    assert!(second.weaknesses.iter().any(|w| w.contains("style regressed")));

    let execution = &state.learned_patterns.execution;
    assert!(execution.iter().any(|p| p.content == "MOVE on sofa succeeds"));
    let avoid = execution.iter().find(|p| p.content == "Avoid MOVE on sofa").unwrap();
    assert!((avoid.score - 0.45).abs() < 1e-9);
    assert!((state.overall_progress.success_rate - 0.5).abs() < 1e-9);
}

// ── Control ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stop_during_first_decision_keeps_initial_image() {
    let reasoner = Arc::new(
        Reasoner::new(decision_reply("MOVE", "sofa"), analysis_reply(80, 70, true, "x"))
            .with_decision_delay(Duration::from_millis(200)),
    );
    let editor = Arc::new(CountingEditor::working());
    let mut agent = agent(reasoner, &["sofa"]).with_editor(editor.clone());

    let handle = agent.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
    });

    let state = agent.run(initial_image(), config(5, false), &NoopObserver).await;

    assert_eq!(state.status, RunStatus::Stopped);
    assert_eq!(state.stop_reason.as_deref(), Some("Stopped by user"));
    assert_eq!(editor.calls(), 0);
    assert_eq!(state.current_image, Some(initial_image()));
    assert_eq!(state.decisions.len(), 1);
    assert_eq!(state.total_cost, 0.0);
}

#[tokio::test(start_paused = true)]
async fn stop_during_later_decision_keeps_last_edit() {
    let reasoner = Arc::new(
        Reasoner::new(decision_reply("MOVE", "sofa"), analysis_reply(80, 70, true, "x"))
            .with_decision_delay(Duration::from_millis(200)),
    );
    let editor = Arc::new(CountingEditor::working());
    let mut agent = agent(reasoner, &["sofa"]).with_editor(editor.clone());

    let handle = agent.handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.stop();
    });

    let state = agent.run(initial_image(), config(5, false), &NoopObserver).await;

    assert_eq!(state.status, RunStatus::Stopped);
    assert_eq!(editor.calls(), 1);
    assert_eq!(state.current_image, Some(edit_image(1)));
    assert_eq!(state.analyses.len(), 1);
    assert!((state.total_cost - 0.04).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn pause_holds_before_execution_until_resumed() {
    let reasoner = Arc::new(
        Reasoner::new(decision_reply("MOVE", "sofa"), analysis_reply(80, 70, true, "x"))
            .with_decision_delay(Duration::from_millis(100)),
    );
    let editor = Arc::new(CountingEditor::working());
    let mut agent = agent(reasoner, &["sofa"]).with_editor(editor.clone());

    let handle = agent.handle();
    let watched_editor = editor.clone();
    let controller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.pause();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        let seen = handle.state();
        let edits_while_paused = watched_editor.calls();
        handle.resume();
        (seen, edits_while_paused)
    });

    let state = agent.run(initial_image(), config(2, false), &NoopObserver).await;
    let (seen, edits_while_paused) = controller.await.unwrap();

    assert!(seen.is_paused);
    assert_eq!(seen.status, RunStatus::Paused);
    assert_eq!(seen.current_iteration, 1);
    assert_eq!(edits_while_paused, 0);

    assert_eq!(state.status, RunStatus::Completed);
    assert!(!state.is_paused);
    assert_eq!(editor.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_while_paused_ends_run() {
    let reasoner = moving_sofa();
    let mut agent = agent(reasoner.clone(), &["sofa"]);

    let handle = agent.handle();
    handle.pause();
    let stopper = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        stopper.stop();
    });

    let state = agent.run(initial_image(), config(3, true), &NoopObserver).await;

    assert_eq!(state.status, RunStatus::Stopped);
    assert_eq!(state.current_iteration, 0);
    assert!(reasoner.decision_prompts().is_empty());
}

// ── Observation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn callbacks_fire_in_iteration_order() {
    let reasoner = Arc::new(Reasoner::new(
        decision_reply("MOVE", "sofa"),
        analysis_reply(80, 70, true, "Keep walkways clear"),
    ));
    reasoner
        .decisions
        .lock()
        .unwrap()
        .push_back(decision_reply("REMOVE", "piano"));
    let observer = RecordingObserver::default();
    let mut agent = agent(reasoner, &["sofa"]);

    agent.run(initial_image(), config(2, true), &observer).await;

    assert_eq!(
        observer.trace(),
        vec![
            "start",
            "decision:1",
            "analysis:1",
            "progress:1:running",
            "decision:2",
            "analysis:2",
            "progress:2:running",
            "progress:2:completed",
        ]
    );
}

#[tokio::test]
async fn event_bus_sees_start_and_finish() {
    let bus = Arc::new(EventBus::new(64));
    let mut rx = bus.subscribe();
    let observer = EventBusObserver::new(bus.clone());
    let mut agent = agent(moving_sofa(), &["sofa"]);

    agent.run(initial_image(), config(2, true), &observer).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(events.first().map(|e| e.as_ref()), Some(DomainEvent::RunStarted { .. })));
    match events.last().map(|e| e.as_ref()) {
        Some(DomainEvent::RunFinished { status, iterations, .. }) => {
            assert_eq!(*status, RunStatus::Completed);
            assert_eq!(*iterations, 2);
        }
        other => panic!("Expected RunFinished, got {other:?}"),
    }
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e.as_ref(), DomainEvent::IterationAnalyzed { .. }))
            .count(),
        2
    );
}

// ── Memory across runs ───────────────────────────────────────────────────

#[tokio::test]
async fn learned_rules_reach_the_next_run() {
    let reasoner = moving_sofa();
    let mut agent = agent(reasoner.clone(), &["sofa"]);

    let first = agent.run(initial_image(), config(1, true), &NoopObserver).await;
    assert!(!first.learned_patterns.is_empty());

    let second = agent.run(initial_image(), config(1, true), &NoopObserver).await;
    assert_eq!(second.status, RunStatus::Completed);

    let prompts = reasoner.decision_prompts();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[0].contains("MOVE on sofa succeeds"));
    assert!(prompts[1].contains("MOVE on sofa succeeds"));
    assert!(prompts[1].contains("Keep walkways clear"));
}

#[tokio::test]
async fn snapshot_reads_do_not_track_live_state() {
    let mut agent = agent(moving_sofa(), &["sofa"]);
    let handle = agent.handle();

    let state = agent.run(initial_image(), config(2, true), &NoopObserver).await;
    let mut snapshot = handle.state();
    assert_eq!(snapshot.current_iteration, state.current_iteration);
    assert_eq!(snapshot.status, RunStatus::Completed);

    snapshot.analyses.clear();
    assert_eq!(handle.state().analyses.len(), 2);
}
