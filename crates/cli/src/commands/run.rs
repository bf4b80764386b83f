//! `designloop run`: improve one image toward a design goal.

use designloop_agent::DesignAgent;
use designloop_config::AppConfig;
use designloop_core::agent::AgentState;
use designloop_core::event::{DomainEvent, EventBus, EventBusObserver};
use designloop_core::image::ImageRef;
use designloop_memory::MemoryLimits;
use designloop_providers::{HttpImageEditor, OpenAiCompatProvider, VisionPerceiver, VisionSpatialValidator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Flags of the `run` command.
pub struct RunOptions {
    pub image: String,
    pub goal: String,
    pub iterations: Option<u32>,
    pub max_cost: Option<f64>,
    pub delay_ms: Option<u64>,
    pub test_mode: bool,
    pub style: Vec<String>,
    pub out: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

pub async fn run(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    DESIGNLOOP_API_KEY=sk-...");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let mut run_config = config.run_config(&options.goal);
    if let Some(iterations) = options.iterations {
        run_config.max_iterations = iterations;
    }
    if let Some(max_cost) = options.max_cost {
        run_config.max_cost = max_cost;
    }
    if let Some(delay_ms) = options.delay_ms {
        run_config.iteration_delay_ms = delay_ms;
    }
    if options.test_mode {
        run_config.test_mode = true;
    }
    if !options.style.is_empty() {
        run_config.style_keywords = options.style.clone();
    }

    if !run_config.test_mode && config.execution.editor_url.is_none() {
        return Err("No image editor configured. Set execution.editor_url or pass --test-mode.".into());
    }

    let image = load_image(&options.image)?;

    // Collaborators
    let provider = Arc::new(OpenAiCompatProvider::new("openai", &config.api_url, api_key));
    let perceiver = Arc::new(VisionPerceiver::new(provider.clone(), &config.model));
    let validator = Arc::new(VisionSpatialValidator::new(provider.clone(), &config.model));

    let mut agent = DesignAgent::new(provider, &config.model, perceiver)
        .with_spatial_validator(validator)
        .with_memory_limits(MemoryLimits {
            capacity: config.memory.capacity,
            decay: config.memory.decay,
            consolidated_score: config.memory.consolidated_score,
        })
        .with_recall(config.memory.recall_min_score, config.memory.recall_limit)
        .with_summarize_interval(config.memory.summarize_interval)
        .with_unit_cost(config.execution.unit_cost)
        .with_simulated_delay(Duration::from_millis(config.execution.simulated_delay_ms))
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens);

    if let Some(url) = &config.execution.editor_url {
        let mut editor = HttpImageEditor::new(url);
        if let Some(key) = &config.execution.editor_api_key {
            editor = editor.with_api_key(key);
        }
        agent = agent.with_editor(Arc::new(editor));
    }

    // Progress printer
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Progress printer fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Ctrl-C ends the run at the next phase boundary.
    let handle = agent.handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n  Stopping after the current step...");
            handle.stop();
        }
    });

    println!();
    println!("  Goal:        {}", run_config.design_goal);
    println!("  Model:       {}", config.model);
    println!("  Iterations:  {}", run_config.max_iterations);
    println!("  Budget:      ${:.2}", run_config.max_cost);
    println!("  Mode:        {}", if run_config.test_mode { "test (no edits, no cost)" } else { "live" });
    println!();

    let observer = EventBusObserver::new(bus.clone());
    let state = agent.run(image, run_config, &observer).await;

    interrupt.abort();
    drop(observer);
    drop(bus);
    let _ = printer.await;

    print_summary(&state);

    if let Some(path) = &options.out {
        save_image(&state, path)?;
    } else if let Some(image) = &state.current_image {
        if image.is_inline() {
            let path = PathBuf::from(format!("designloop-result.{}", extension_for(image.mime())));
            save_image(&state, &path)?;
        } else {
            println!("  Final image: {}", image.as_uri());
        }
    }

    if let Some(path) = &options.report {
        std::fs::write(path, serde_json::to_string_pretty(&state)?)?;
        println!("  Report written to {}", path.display());
    }

    Ok(())
}

/// Accept a URL or data URL as-is; read anything else from disk.
fn load_image(source: &str) -> Result<ImageRef, Box<dyn std::error::Error>> {
    if source.starts_with("http://") || source.starts_with("https://") || source.starts_with("data:") {
        return Ok(ImageRef::from_uri(source));
    }
    let path = Path::new(source);
    let bytes = std::fs::read(path).map_err(|e| format!("Failed to read image {}: {e}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "Image loaded");
    Ok(ImageRef::from_bytes(mime_for(path), &bytes))
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "image/png",
    }
}

fn extension_for(mime: Option<&str>) -> &'static str {
    match mime {
        Some("image/jpeg") => "jpg",
        Some("image/webp") => "webp",
        Some("image/gif") => "gif",
        _ => "png",
    }
}

fn save_image(state: &AgentState, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let Some(image) = &state.current_image else {
        return Err("Run produced no image".into());
    };
    match image.decode() {
        Some(bytes) => {
            std::fs::write(path, bytes)?;
            println!("  Final image written to {}", path.display());
        }
        None => {
            println!("  Final image is remote: {}", image.as_uri());
            println!("  (not downloaded to {})", path.display());
        }
    }
    Ok(())
}

fn print_event(event: &DomainEvent) {
    match event {
        DomainEvent::RunStarted { max_iterations, .. } => {
            println!("  Run started ({max_iterations} iterations)");
        }
        DomainEvent::DecisionMade { decision, .. } => {
            println!(
                "  [{}] {} (confidence {:.2}): {}",
                decision.iteration,
                decision.summary(),
                decision.confidence,
                decision.reason
            );
        }
        DomainEvent::IterationAnalyzed {
            iteration,
            quality_score,
            style_score,
            success,
            ..
        } => {
            println!(
                "  [{iteration}] {} quality {quality_score:.2}, style {style_score:.2}",
                if *success { "ok  " } else { "FAIL" }
            );
        }
        DomainEvent::Progress {
            iteration,
            total_cost,
            avg_quality,
            success_rate,
            ..
        } => {
            println!(
                "  [{iteration}] spent ${total_cost:.2}, avg quality {avg_quality:.2}, success {:.0}%",
                success_rate * 100.0
            );
        }
        DomainEvent::PatternsConsolidated { kind, rules, .. } => {
            println!("  Consolidated {kind} rules into {rules}");
        }
        DomainEvent::RunFinished { status, reason, .. } => {
            println!("  Run {status}: {}", reason.as_deref().unwrap_or("-"));
        }
    }
}

fn print_summary(state: &AgentState) {
    let progress = &state.overall_progress;
    println!();
    println!("  Iterations:    {}", state.current_iteration);
    println!("  Changes:       {}", progress.total_changes);
    println!("  Spent:         ${:.2}", state.total_cost);
    println!("  Avg quality:   {:.2}", progress.avg_quality);
    println!("  Avg style:     {:.2}", progress.avg_style_score);
    println!("  Success rate:  {:.0}%", progress.success_rate * 100.0);

    let patterns = &state.learned_patterns;
    if !patterns.is_empty() {
        println!();
        println!("  Learned rules:");
        for p in patterns.execution.iter().chain(patterns.style.iter()).take(6) {
            println!("    [{:.2}] {}", p.score, p.content);
        }
    }

    if !state.errors.is_empty() {
        println!();
        println!("  Errors:");
        for e in &state.errors {
            println!("    {e}");
        }
    }
    println!();
}
