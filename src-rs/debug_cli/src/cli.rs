use std::env;

use crate::models::CLIConfig;

const DEFAULT_URL: &str = "http://127.0.0.1:8005";

pub fn parse_config() -> CLIConfig {
    let mut cfg = CLIConfig {
        base_url: env_or("REKI_AGENT_URL", DEFAULT_URL.to_string()),
        model: env_opt("REKI_AGENT_MODEL"),
        stream: env_bool("REKI_AGENT_STREAM", false),
        token: env_opt("REKI_AGENT_TOKEN"),
    };

    let args: Vec<String> = env::args().collect();
    let mut idx = 1;
    while idx < args.len() {
        match args[idx].as_str() {
            "--base" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.base_url = value.clone();
                    idx += 1;
                }
            }
            "--model" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.model = Some(value.clone());
                    idx += 1;
                }
            }
            "--stream" => cfg.stream = true,
            "--token" => {
                if let Some(value) = args.get(idx + 1) {
                    cfg.token = Some(value.clone());
                    idx += 1;
                }
            }
            _ => {}
        }
        idx += 1;
    }

    cfg
}

fn env_or(key: &str, fallback: String) -> String {
    env::var(key).unwrap_or(fallback)
}

fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn env_bool(key: &str, fallback: bool) -> bool {
    match env::var(key) {
        Ok(value) => value.parse::<bool>().unwrap_or(fallback),
        Err(_) => fallback,
    }
}
