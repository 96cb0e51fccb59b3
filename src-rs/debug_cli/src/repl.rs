use std::io;

use crate::client::HTTPClient;
use crate::models::{CLIConfig, ChatMessage, ChatRequest};
use crate::render;

pub struct REPL {
    pub config: CLIConfig,
    pub client: HTTPClient,
    pub history: Vec<ChatMessage>,
}

impl REPL {
    pub fn new(config: CLIConfig, client: HTTPClient) -> Self {
        Self {
            config,
            client,
            history: Vec::new(),
        }
    }

    pub fn run(&mut self) {
        render::banner(&self.config);
        loop {
            render::prompt();
            let mut line = String::new();
            match io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('/') {
                if self.handle_command(&line) {
                    break;
                }
                continue;
            }
            self.send(&line);
        }
    }

    fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").trim_start_matches('/');
        let rest = parts.next().unwrap_or("").trim();
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "model" => {
                if rest.is_empty() {
                    render::info(&format!("model: {}", self.config.model.clone().unwrap_or_default()));
                } else {
                    self.config.model = Some(rest.to_string());
                    render::info("model updated");
                }
            }
            "stream" => {
                if rest.is_empty() {
                    self.config.stream = !self.config.stream;
                } else if let Some(flag) = parse_on_off(rest) {
                    self.config.stream = flag;
                } else {
                    render::error("invalid stream flag");
                    return false;
                }
                render::info(&format!("stream: {}", self.config.stream));
            }
            "research" => {
                if rest.is_empty() {
                    render::error("usage: /research <query>");
                } else {
                    match self.client.research(rest) {
                        Ok(resp) => render::research(&resp),
                        Err(err) => render::error(&err),
                    }
                }
            }
            "runs" => {
                let limit = rest.parse::<usize>().unwrap_or(10);
                match self.client.list_runs(limit) {
                    Ok(runs) => render::runs(&runs),
                    Err(err) => render::error(&err),
                }
            }
            "run" => match self.client.get_run(rest) {
                Ok(run) => render::run(&run),
                Err(err) => render::error(&err),
            },
            "history" => render::history(&self.history),
            "reset" => {
                self.history.clear();
                render::info("history cleared");
            }
            "config" => render::config(&self.config),
            "base" => {
                if rest.is_empty() {
                    render::info(&format!("base: {}", self.config.base_url));
                } else {
                    match HTTPClient::new(rest, self.config.token.clone()) {
                        Ok(client) => {
                            self.config.base_url = rest.to_string();
                            self.client = client;
                            render::info("base url updated");
                        }
                        Err(err) => render::error(&err),
                    }
                }
            }
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    fn send(&mut self, line: &str) {
        self.history.push(ChatMessage {
            role: "user".to_string(),
            content: line.to_string(),
        });

        let req = ChatRequest {
            model: self.config.model.clone(),
            messages: self.history.clone(),
            stream: self.config.stream,
        };

        let outcome = if self.config.stream {
            render::assistant_start();
            let outcome = self.client.chat_stream(&req, render::delta);
            render::assistant_end();
            outcome
        } else {
            self.client.chat(&req).map(|answer| {
                render::answer(&answer);
                answer
            })
        };

        match outcome {
            Ok(answer) if !answer.is_empty() => self.history.push(ChatMessage {
                role: "assistant".to_string(),
                content: answer,
            }),
            Ok(_) => {}
            Err(err) => {
                // Keep the history alternating.
                self.history.pop();
                render::error(&err);
            }
        }
    }
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Some(true),
        "off" | "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
