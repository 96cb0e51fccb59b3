use std::sync::Arc;

use crate::agent::Agent;
use crate::config::{AgentConfig, AppConfig};
use crate::error::ConfigError;
use crate::llm::{GeminiAdapter, GeminiConfig, LLMRouter, OpenAICompatAdapter, OpenAICompatConfig};
use crate::planner::LlmPlanner;
use crate::prompts::{RESEARCH_SYSTEM_PROMPT, SPORTS_SYSTEM_PROMPT};
use crate::retry::RetryPolicy;
use crate::runs::RunStore;
use crate::search::{BraveSearchClient, SearchApi};
use crate::sports::{research_registry, sports_registry, ResponseCache, SportsFeeds};
use crate::tools::ToolRegistry;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Both agents share one router, one search client and one run log.
pub struct Agents {
    pub sports: Arc<Agent>,
    pub research: Arc<Agent>,
    pub router: Arc<LLMRouter>,
    pub runs: Arc<RunStore>,
}

/// Registers every provider with credentials; `llm_provider` is the default.
pub fn build_llm_router(cfg: &AppConfig) -> Result<LLMRouter, ConfigError> {
    let agent_cfg = cfg.agent_config();
    let mut router = LLMRouter::new(&cfg.llm_provider);

    if !cfg.gemini_keys.is_empty() {
        let model = if cfg.llm_provider == "gemini" {
            cfg.llm_model.clone()
        } else {
            crate::config::DEFAULT_GEMINI_MODEL.to_string()
        };
        let adapter = GeminiAdapter::new(GeminiConfig {
            api_keys: cfg.gemini_keys.clone(),
            base_url: GEMINI_BASE_URL.to_string(),
            model,
            temperature: agent_cfg.temperature,
            timeout: cfg.llm_timeout,
        })
        .map_err(|err| ConfigError::Llm(err.to_string()))?;
        router.register_provider("gemini", "google", Arc::new(adapter));
    }

    if let Some(xai) = &cfg.xai {
        let mut models = xai.models.clone();
        if cfg.llm_provider == "xai" && !models.contains(&cfg.llm_model) {
            models.insert(0, cfg.llm_model.clone());
        }
        let adapter = OpenAICompatAdapter::new(OpenAICompatConfig {
            api_keys: xai.api_keys.clone(),
            base_url: xai.base_url.clone(),
            models,
            temperature: agent_cfg.temperature,
            timeout: cfg.llm_timeout,
        })
        .map_err(|err| ConfigError::Llm(err.to_string()))?;
        router.register_provider("xai", "xai", Arc::new(adapter));
    }

    if !router.has_provider(&cfg.llm_provider) {
        return Err(ConfigError::Llm(format!(
            "{} provider selected but no credentials found",
            cfg.llm_provider
        )));
    }
    Ok(router)
}

fn retry_policy(cfg: &AppConfig) -> RetryPolicy {
    RetryPolicy {
        max_retries: cfg.max_retries,
        ..RetryPolicy::default()
    }
}

fn planned_agent(
    name: &str,
    router: Arc<LLMRouter>,
    registry: ToolRegistry,
    prompt: &str,
    config: AgentConfig,
    runs: Arc<RunStore>,
) -> Agent {
    let planner = LlmPlanner::new(router, registry.get_schemas(), prompt, config.clone());
    Agent::new(name, config, Arc::new(planner), Arc::new(registry)).with_runs(runs)
}

/// Builds the sports and research agents from service configuration.
pub fn build_agents(cfg: &AppConfig) -> Result<Agents, ConfigError> {
    let router = Arc::new(build_llm_router(cfg)?);
    let agent_cfg = cfg.agent_config();
    let runs = Arc::new(RunStore::default());

    let feeds = SportsFeeds::sportradar(
        &cfg.sportradar_api_key,
        &cfg.sportradar_access_level,
        cfg.client_timeout,
        retry_policy(cfg),
    )
    .map_err(|err| ConfigError::Client(format!("sportradar: {}", err)))?;
    let search: Arc<dyn SearchApi> = Arc::new(
        BraveSearchClient::new(&cfg.brave_api_key, cfg.client_timeout, retry_policy(cfg))
            .map_err(|err| ConfigError::Client(format!("search: {}", err)))?,
    );

    let sports_tools = sports_registry(
        &feeds,
        Arc::new(ResponseCache::default()),
        search.clone(),
        agent_cfg.tool_timeout,
    )
    .map_err(ConfigError::Tools)?;
    let research_tools = research_registry(search, agent_cfg.tool_timeout).map_err(ConfigError::Tools)?;

    let sports = planned_agent(
        "sports",
        router.clone(),
        sports_tools,
        SPORTS_SYSTEM_PROMPT,
        agent_cfg.clone(),
        runs.clone(),
    );
    let research = planned_agent(
        "research",
        router.clone(),
        research_tools,
        RESEARCH_SYSTEM_PROMPT,
        agent_cfg,
        runs.clone(),
    );

    Ok(Agents {
        sports: Arc::new(sports),
        research: Arc::new(research),
        router,
        runs,
    })
}
