use std::time::Duration;

use chrono::NaiveTime;

use crate::error::ConfigError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_XAI_MODELS: [&str; 2] = ["grok-4-fast-reasoning", "grok-4-fast-non-reasoning"];

/// Per-agent knobs.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    /// Planning turns per session.
    pub max_iterations: usize,
    /// Planner-issued tool calls per session.
    pub max_tool_calls: usize,
    pub history_budget_bytes: usize,
    pub tool_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            temperature: 0.3,
            max_iterations: 10,
            max_tool_calls: 10,
            history_budget_bytes: 24_000,
            tool_timeout: Duration::from_secs(45),
            request_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Clone, Debug)]
pub struct XaiCredentials {
    pub api_keys: Vec<String>,
    pub base_url: String,
    pub models: Vec<String>,
}

/// Service configuration read from the environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub sportradar_api_key: String,
    pub sportradar_access_level: String,
    pub brave_api_key: String,
    pub gemini_keys: Vec<String>,
    pub xai: Option<XaiCredentials>,
    pub llm_provider: String,
    pub llm_model: String,
    pub host: String,
    pub port: u16,
    pub max_tool_calls: usize,
    pub max_retries: usize,
    pub client_timeout: Duration,
    /// Per LLM HTTP call; shorter than `request_timeout`, which bounds a session.
    pub llm_timeout: Duration,
    pub request_timeout: Duration,
    pub research_daily_at: NaiveTime,
    pub research_schedule_enabled: bool,
}

impl AppConfig {
    /// Loads `.env` when present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::MissingCredential(key.to_string()));

        let sportradar_api_key = required("SPORTRADAR_API_KEY")?;
        let brave_api_key = required("BRAVE_API_KEY")?;

        let gemini_keys = load_keys(&get, "GEMINI_API_KEY");
        let xai_keys = load_keys(&get, "XAI_API_KEY");
        let xai = match (xai_keys.is_empty(), get("XAI_BASE_URL")) {
            (false, Some(base_url)) => Some(XaiCredentials {
                api_keys: xai_keys,
                base_url,
                models: get("XAI_MODELS")
                    .map(|raw| split_list(&raw))
                    .unwrap_or_else(|| DEFAULT_XAI_MODELS.iter().map(|m| m.to_string()).collect()),
            }),
            (false, None) => return Err(ConfigError::MissingCredential("XAI_BASE_URL".to_string())),
            (true, _) => None,
        };
        if gemini_keys.is_empty() && xai.is_none() {
            return Err(ConfigError::MissingCredential("GEMINI_API_KEY or XAI_API_KEY".to_string()));
        }

        let llm_provider = get("LLM_PROVIDER")
            .map(|p| p.to_lowercase())
            .unwrap_or_else(|| if gemini_keys.is_empty() { "xai" } else { "gemini" }.to_string());
        let llm_model = match (llm_provider.as_str(), get("LLM_MODEL")) {
            (_, Some(model)) => model,
            ("gemini", None) => DEFAULT_GEMINI_MODEL.to_string(),
            ("xai", None) => xai
                .as_ref()
                .and_then(|x| x.models.first().cloned())
                .unwrap_or_else(|| DEFAULT_XAI_MODELS[0].to_string()),
            (other, None) => return Err(invalid("LLM_PROVIDER", other)),
        };
        match llm_provider.as_str() {
            "gemini" if gemini_keys.is_empty() => {
                return Err(ConfigError::MissingCredential("GEMINI_API_KEY".to_string()))
            }
            "xai" if xai.is_none() => return Err(ConfigError::MissingCredential("XAI_API_KEY".to_string())),
            "gemini" | "xai" => {}
            other => return Err(invalid("LLM_PROVIDER", other)),
        }

        let access_level = get("SPORTRADAR_ACCESS_LEVEL").unwrap_or_else(|| "production".to_string());
        if access_level != "production" && access_level != "trial" {
            return Err(invalid("SPORTRADAR_ACCESS_LEVEL", &access_level));
        }

        let request_timeout = Duration::from_secs(parse_or(&get, "REQUEST_TIMEOUT_SECS", 120)?);
        let llm_timeout = Duration::from_secs(parse_or(&get, "LLM_TIMEOUT_SECS", 60)?);
        if llm_timeout >= request_timeout {
            return Err(invalid("LLM_TIMEOUT_SECS", &llm_timeout.as_secs().to_string()));
        }

        Ok(Self {
            sportradar_api_key,
            sportradar_access_level: access_level,
            brave_api_key,
            gemini_keys,
            xai,
            llm_provider,
            llm_model,
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&get, "PORT", 8005)?,
            max_tool_calls: parse_or(&get, "MAX_TOOL_CALLS", 10)?,
            max_retries: parse_or(&get, "MAX_RETRIES", 3)?,
            client_timeout: Duration::from_secs(parse_or(&get, "CLIENT_TIMEOUT_SECS", 10)?),
            llm_timeout,
            request_timeout,
            research_daily_at: match get("RESEARCH_DAILY_AT") {
                Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|_| invalid("RESEARCH_DAILY_AT", &raw))?,
                None => NaiveTime::from_hms_opt(10, 45, 0).ok_or_else(|| invalid("RESEARCH_DAILY_AT", "10:45"))?,
            },
            research_schedule_enabled: parse_or(&get, "RESEARCH_SCHEDULE_ENABLED", true)?,
        })
    }

    /// Agent settings for the planner-driven sports agent.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            provider: self.llm_provider.clone(),
            model: self.llm_model.clone(),
            max_tool_calls: self.max_tool_calls,
            request_timeout: self.request_timeout,
            ..AgentConfig::default()
        }
    }
}

/// `KEY` as a comma list, plus `KEY_2` through `KEY_10`.
fn load_keys(get: &impl Fn(&str) -> Option<String>, prefix: &str) -> Vec<String> {
    let mut keys = get(prefix).map(|raw| split_list(&raw)).unwrap_or_default();
    for idx in 2..=10 {
        if let Some(value) = get(&format!("{}_{}", prefix, idx)) {
            keys.push(value);
        }
    }
    keys
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    fallback: T,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| invalid(key, &raw)),
        None => Ok(fallback),
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    }
}
