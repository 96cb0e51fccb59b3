use std::net::SocketAddr;
use std::process;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use reki_agent_rs::api::{AgentServer, AppState};
use reki_agent_rs::config::AppConfig;
use reki_agent_rs::helpers::build_agents;
use reki_agent_rs::scheduler::ResearchTrigger;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,reki_agent_rs=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("failed to install Ctrl+C handler: {}", err);
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() {
    init_logging();

    let cfg = match AppConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("configuration error: {}", err);
            process::exit(1);
        }
    };
    let addr: SocketAddr = match format!("{}:{}", cfg.host, cfg.port).parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!("invalid listen address {}:{}: {}", cfg.host, cfg.port, err);
            process::exit(1);
        }
    };
    let agents = match build_agents(&cfg) {
        Ok(agents) => agents,
        Err(err) => {
            error!("startup failed: {}", err);
            process::exit(1);
        }
    };
    info!(
        provider = %cfg.llm_provider,
        model = %cfg.llm_model,
        tools = agents.sports.tools().count(),
        "agents ready"
    );

    if cfg.research_schedule_enabled {
        let trigger = ResearchTrigger::new(agents.research.clone());
        tokio::spawn(trigger.run_daily(cfg.research_daily_at));
    }

    let server = AgentServer::new(addr, AppState::from(agents));
    if let Err(err) = server.start(shutdown_signal()).await {
        error!("server error: {}", err);
        process::exit(1);
    }
}
