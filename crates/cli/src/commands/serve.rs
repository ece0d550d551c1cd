//! `coursellm serve` — Start the HTTP API server.

use coursellm_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("🎓 CourseLLM IST Service");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {}", config.llm.provider);

    if let Err(e) = coursellm_gateway::start(config).await {
        eprintln!();
        eprintln!("  ❌ Failed to start: {e}");
        eprintln!();
        eprintln!("  💡 Make sure to:");
        eprintln!("     1. Create a .env file in the working directory");
        eprintln!("     2. Set LLM_PROVIDER and the matching API key (a real key, not a placeholder)");
        eprintln!("     3. Run `coursellm doctor` to check the setup");
        eprintln!();
        return Err(e);
    }

    Ok(())
}
