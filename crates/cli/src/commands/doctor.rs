//! `coursellm doctor` — Diagnose configuration and provider access.

use coursellm_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 CourseLLM Doctor — Service Diagnostics");
    println!("=========================================\n");

    let mut issues = 0;

    // Check config file
    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ℹ️  No config file, using defaults and environment variables");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    // Check provider, model and key
    let llm = match config.resolve_llm() {
        Ok(llm) => {
            println!("  ✅ Provider: {}", llm.provider.name());
            println!("  ✅ Model: {}", llm.model);
            println!("  ✅ API key configured");
            Some(llm)
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
            None
        }
    };

    // Check provider reachability
    if let Some(llm) = llm {
        let provider = coursellm_providers::build_from_config(&llm);
        match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider reachable at {}", llm.base_url),
            Ok(false) => {
                println!("  ⚠️  Provider at {} rejected the request — check the API key", llm.base_url);
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider unreachable: {e}");
                issues += 1;
            }
        }
    }

    println!(
        "  ✅ Gateway: {}:{} ({} CORS origin(s))",
        config.gateway.host,
        config.gateway.port,
        config.gateway.cors_origins.len()
    );

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
