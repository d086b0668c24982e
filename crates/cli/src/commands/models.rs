//! `vicagent models` — List the model options.

use vicagent_config::{AppConfig, MODEL_OPTIONS, ModelOption};

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().unwrap_or_default();
    print!("{}", render(&config.model, &config.base_url));
    Ok(())
}

fn render(selected: &str, base_url: &str) -> String {
    let mut out = String::from("Model options\n\n");
    for option in MODEL_OPTIONS {
        out.push_str(&line(&option, option.label == selected, base_url));
    }
    out
}

fn line(option: &ModelOption, selected: bool, base_url: &str) -> String {
    format!(
        "  {} {:<16} {:<48} {}\n",
        if selected { "*" } else { " " },
        option.label,
        option.provider_model_id(base_url),
        if option.supports_thinking { "thinking" } else { "" },
    )
}
