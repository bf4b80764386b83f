//! `designloop status`: show resolved configuration and check the endpoint.

use designloop_config::AppConfig;
use designloop_core::provider::Provider;
use designloop_providers::OpenAiCompatProvider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("designloop status");
    println!("=================");
    println!("  Config dir:     {}", AppConfig::config_dir().display());
    println!("  Endpoint:       {}", config.api_url);
    println!("  Model:          {}", config.model);
    println!("  Temperature:    {}", config.temperature);
    println!("  API key:        {}", if config.has_api_key() { "configured" } else { "missing" });
    if let Some(key) = config.api_key.clone() {
        let provider = OpenAiCompatProvider::new("openai", &config.api_url, key);
        println!("  Reachability:   {}", health_line(&provider).await);
    }
    println!();
    println!("  Test mode:      {}", config.run.test_mode);
    println!("  Iterations:     {}", config.run.max_iterations);
    println!("  Delay:          {} ms", config.run.iteration_delay_ms);
    println!("  Max cost:       ${:.2}", config.run.max_cost);
    if !config.run.style_keywords.is_empty() {
        println!("  Style:          {}", config.run.style_keywords.join(", "));
    }
    println!();
    println!("  Memory:         {} rules/kind, decay {}", config.memory.capacity, config.memory.decay);
    println!("  Consolidation:  every {} iterations", config.memory.summarize_interval);
    println!("  Edit cost:      ${:.2}", config.execution.unit_cost);
    println!(
        "  Editor:         {}",
        config.execution.editor_url.as_deref().unwrap_or("not configured (test mode only)")
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, using defaults. Run `designloop init` to create one.");
    }

    Ok(())
}

/// Short verdict on whether the provider answers its health check.
async fn health_line(provider: &dyn Provider) -> String {
    match provider.health_check().await {
        Ok(true) => "reachable".to_string(),
        Ok(false) => "responded with an error".to_string(),
        Err(e) => format!("unreachable ({e})"),
    }
}
