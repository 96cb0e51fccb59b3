use std::io::{self, Write};

use crate::models::{CLIConfig, ChatMessage, ResearchResponse, RunInfo};

pub fn banner(cfg: &CLIConfig) {
    println!("Reki Agent Debug CLI");
    println!("API: {}", cfg.base_url);
    println!(
        "Model: {}  Stream: {}",
        cfg.model.clone().unwrap_or_else(|| "(server default)".to_string()),
        cfg.stream
    );
    println!("Type /help for commands.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  /help                  Show commands");
    println!("  /exit | /quit          Exit");
    println!("  /model <name>          Set model");
    println!("  /stream [on|off]       Toggle streamed answers");
    println!("  /research <query>      Run the research agent");
    println!("  /runs [limit]          List recent runs");
    println!("  /run <id>              Show one run");
    println!("  /history               Show chat history");
    println!("  /reset                 Clear chat history");
    println!("  /config                Show current config");
    println!("  /base <url>            Update base URL");
}

pub fn answer(text: &str) {
    println!("assistant> {}", text);
}

pub fn assistant_start() {
    print!("assistant> ");
    let _ = io::stdout().flush();
}

pub fn delta(text: &str) {
    print!("{}", text);
    let _ = io::stdout().flush();
}

pub fn assistant_end() {
    println!();
}

pub fn research(resp: &ResearchResponse) {
    match &resp.error {
        Some(err) if !resp.success => println!("research failed ({}): {}", resp.session_id, err),
        _ => println!("research> {}", resp.output),
    }
}

pub fn runs(runs: &[RunInfo]) {
    if runs.is_empty() {
        println!("no runs");
        return;
    }
    for run in runs {
        println!(
            "[{}] {} {} ({} calls) - {}",
            run.status, run.id, run.agent, run.tool_calls, run.query
        );
    }
}

pub fn run(run: &RunInfo) {
    println!("run {}", run.id);
    println!("  agent: {}", run.agent);
    println!("  status: {}", run.status);
    println!("  query: {}", run.query);
    println!("  tool calls: {}", run.tool_calls);
    println!("  created: {}", run.created_at);
    if let Some(output) = &run.output {
        println!("  output: {}", output);
    }
    if let Some(error) = &run.error {
        println!("  error: {}", error);
    }
}

pub fn config(cfg: &CLIConfig) {
    println!("config:");
    println!("  base: {}", cfg.base_url);
    println!("  model: {}", cfg.model.clone().unwrap_or_default());
    println!("  stream: {}", cfg.stream);
}

pub fn history(items: &[ChatMessage]) {
    if items.is_empty() {
        println!("no history");
        return;
    }
    for msg in items {
        println!("{}> {}", msg.role, msg.content);
    }
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}
