//! `vicagent serve` — Start the browser front-end.

use vicagent_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if !config.has_api_key() {
        eprintln!("  Warning: no API key configured; chat requests will fail.");
    }

    println!("VIC-20 Human Assistant");
    println!("   Open:   http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:  {}", config.model);

    vicagent_gateway::start(config).await?;

    Ok(())
}
