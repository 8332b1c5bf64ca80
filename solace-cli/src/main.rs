//! solace-cli: journal sessions against a Solace server from the terminal
//!
//! # Subcommands
//! - `start`                              : open a new session, print its id
//! - `say <session> <text> [--generated]` : append a message
//! - `close <session>`                    : summarize the session
//! - `ask <session>`                      : get a follow-up question
//! - `history`, `goals`, `stats`          : read analytics
//! - `status`                             : show server health
//!
//! Every subcommand except `status` accepts `--json` to print the raw response.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8766";
const USER_HEADER: &str = "x-user-id";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "solace-cli", version, about = "Journal sessions and read analytics from a Solace server")]
struct Cli {
    /// Solace HTTP server URL (overrides SOLACE_HTTP_URL env var)
    #[arg(long, env = "SOLACE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    /// User identity sent with every request
    #[arg(long, env = "SOLACE_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Start a new session
    Start {
        #[arg(long)]
        json: bool,
    },

    /// Add a message to a session
    Say {
        session: String,
        text: String,

        /// Record the message as generated rather than user-written
        #[arg(long)]
        generated: bool,

        #[arg(long)]
        json: bool,
    },

    /// Close and summarize a session
    Close {
        session: String,
        #[arg(long)]
        json: bool,
    },

    /// Ask for a follow-up question
    Ask {
        session: String,
        #[arg(long)]
        json: bool,
    },

    /// List past sessions
    History {
        #[arg(long)]
        json: bool,
    },

    /// Show tracked goals
    Goals {
        #[arg(long)]
        json: bool,
    },

    /// Show usage statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Show Solace server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Analytics {
    pub avg_intensity: f64,
    pub emotion_percentages: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
pub struct GoalTracking {
    pub goals_processed: usize,
    pub new_goals: usize,
    pub updated_goals: usize,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloseResponse {
    pub status: String,
    pub reason: Option<String>,
    pub summary: Option<String>,
    pub analytics: Option<Analytics>,
    pub overall_summary: Option<String>,
    pub goal_tracking: Option<GoalTracking>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    pub session_id: String,
    pub created_at: String,
    pub status: String,
    pub message_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct GoalView {
    pub text: String,
    pub status: String,
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct GoalReport {
    pub goals: Vec<GoalView>,
    pub by_status: BTreeMap<String, usize>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct Statistics {
    pub total_sessions: usize,
    pub closed_sessions: usize,
    pub consecutive_days: usize,
    pub total_messages: usize,
}

// ============================================================================
// Formatting
// ============================================================================

/// The `n` largest emotion shares as "sad 50%, anxious 30%".
pub fn top_emotions(percentages: &BTreeMap<String, f64>, n: usize) -> String {
    let mut shares: Vec<(&String, &f64)> = percentages.iter().filter(|(_, v)| **v > 0.0).collect();
    shares.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
    shares
        .into_iter()
        .take(n)
        .map(|(name, share)| format!("{} {:.0}%", name, share * 100.0))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_close(resp: &CloseResponse) -> String {
    if resp.status != "summarized" {
        return format!(
            "Not summarized: {}",
            resp.reason.as_deref().unwrap_or("unknown reason")
        );
    }

    let mut out = String::new();
    out.push_str(&format!("Summary:   {}\n", resp.summary.as_deref().unwrap_or("")));
    if let Some(analytics) = &resp.analytics {
        out.push_str(&format!("Intensity: {:.1}/10\n", analytics.avg_intensity));
        out.push_str(&format!("Emotions:  {}\n", top_emotions(&analytics.emotion_percentages, 3)));
    }
    if let Some(goals) = &resp.goal_tracking {
        match &goals.error {
            Some(e) => out.push_str(&format!("Goals:     not tracked ({})\n", e)),
            None => out.push_str(&format!(
                "Goals:     {} found, {} new, {} updated\n",
                goals.goals_processed, goals.new_goals, goals.updated_goals
            )),
        }
    }
    if let Some(overall) = resp.overall_summary.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(&format!("Overall:   {}\n", overall));
    }
    out
}

pub fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No sessions yet.".to_string();
    }
    entries
        .iter()
        .map(|e| {
            let date: String = e.created_at.chars().take(10).collect();
            format!("{}  {}  {:<10}  {} messages", date, e.session_id, e.status, e.message_count)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_goals(report: &GoalReport) -> String {
    if report.total == 0 {
        return "No goals tracked yet.".to_string();
    }
    let mut out: Vec<String> = report
        .goals
        .iter()
        .map(|g| format!("[{:<9}] {} ({})", g.status, g.text, g.category))
        .collect();
    let counts = report
        .by_status
        .iter()
        .map(|(status, n)| format!("{} {}", status, n))
        .collect::<Vec<_>>()
        .join(", ");
    out.push(format!("{} goals: {}", report.total, counts));
    out.join("\n")
}

pub fn format_stats(stats: &Statistics) -> String {
    format!(
        "Sessions:         {} ({} summarized)\nMessages:         {}\nConsecutive days: {}",
        stats.total_sessions, stats.closed_sessions, stats.total_messages, stats.consecutive_days
    )
}

// ============================================================================
// HTTP Client
// ============================================================================

struct SolaceClient {
    http: reqwest::blocking::Client,
    server: String,
    user: Option<String>,
}

impl SolaceClient {
    fn new(server: &str, user: Option<String>) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            server: server.trim_end_matches('/').to_string(),
            user,
        })
    }

    fn get(&self, path: &str) -> anyhow::Result<Value> {
        self.send(self.http.get(format!("{}{}", self.server, path)))
    }

    fn post(&self, path: &str, body: Option<Value>) -> anyhow::Result<Value> {
        let mut req = self.http.post(format!("{}{}", self.server, path));
        if let Some(body) = body {
            req = req.json(&body);
        }
        self.send(req)
    }

    fn send(&self, mut req: reqwest::blocking::RequestBuilder) -> anyhow::Result<Value> {
        if let Some(user) = &self.user {
            req = req.header(USER_HEADER, user);
        }
        let resp = req
            .send()
            .with_context(|| format!("connection failed to {}", self.server))?;

        let status = resp.status();
        let body: Value = resp.json().unwrap_or(Value::Null);
        if !status.is_success() {
            let message = body["error"].as_str().unwrap_or("no error message");
            return Err(anyhow!("server returned {}: {}", status, message));
        }
        Ok(body)
    }
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let client = SolaceClient::new(&cli.server, cli.user)?;

    match cli.command {
        Commands::Start { json } => {
            let body = client.post("/sessions", None)?;
            if json {
                return print_json(&body);
            }
            println!("{}", body["id"].as_str().unwrap_or("?"));
        }
        Commands::Say {
            session,
            text,
            generated,
            json,
        } => {
            let role = if generated { "generated" } else { "user" };
            let body = client.post(
                &format!("/sessions/{}/messages", session),
                Some(serde_json::json!({ "text": text, "role": role })),
            )?;
            if json {
                return print_json(&body);
            }
            if body["reopened"].as_bool().unwrap_or(false) {
                println!("Session reopened; its summary will be rebuilt on the next close.");
            }
        }
        Commands::Close { session, json } => {
            let body = client.post(&format!("/sessions/{}/close", session), None)?;
            if json {
                return print_json(&body);
            }
            let resp: CloseResponse = serde_json::from_value(body)?;
            println!("{}", format_close(&resp).trim_end());
        }
        Commands::Ask { session, json } => {
            let body = client.post(&format!("/sessions/{}/question", session), None)?;
            if json {
                return print_json(&body);
            }
            println!("{}", body["question"].as_str().unwrap_or(""));
        }
        Commands::History { json } => {
            let body = client.get("/sessions")?;
            if json {
                return print_json(&body);
            }
            let entries: Vec<HistoryEntry> = serde_json::from_value(body)?;
            println!("{}", format_history(&entries));
        }
        Commands::Goals { json } => {
            let body = client.get("/goals")?;
            if json {
                return print_json(&body);
            }
            let report: GoalReport = serde_json::from_value(body)?;
            println!("{}", format_goals(&report));
        }
        Commands::Stats { json } => {
            let body = client.get("/statistics")?;
            if json {
                return print_json(&body);
            }
            let stats: Statistics = serde_json::from_value(body)?;
            println!("{}", format_stats(&stats));
        }
        Commands::Status => {
            let body = client.get("/health")?;
            println!("Solace server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:         {}", body["store"].as_str().unwrap_or("?"));
            println!("Generator:     {}", body["generator"].as_str().unwrap_or("?"));
            println!("Socket:        {}", body["socket"].as_str().unwrap_or("?"));
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("solace-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
