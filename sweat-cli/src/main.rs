//! sweat-cli — command-line front end for sweat strip analysis
//!
//! # Subcommands
//! - `score --glucose .. --ph .. --cortisol .. --salt ..`   — offline risk score
//! - `analyze --glucose .. --ph .. --cortisol .. --salt ..` — submit to the server
//! - `status`                                               — show server health

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use sweat_core::scoring::{zone_points, RiskScorer, DEFAULT_DENOMINATOR};
use sweat_core::{Category, Notification, Readings, Severity};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8787";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "sweat-cli",
    version,
    about = "Log DIY sweat strip results and get PCOS risk insights"
)]
struct Cli {
    /// Analysis server URL (overrides SWEAT_HTTP_URL env var)
    #[arg(long, env = "SWEAT_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct ReadingArgs {
    /// Glucose zone result, e.g. "Dark Blue" or "No Color"
    #[arg(long, default_value = "")]
    glucose: String,

    /// pH zone result, e.g. "Pink", "Green" or "Purple"
    #[arg(long, default_value = "")]
    ph: String,

    /// Cortisol zone result, e.g. "Dark Brown" or "Faint"
    #[arg(long, default_value = "")]
    cortisol: String,

    /// Salt zone result, e.g. "Light Brown" or "Yellow"
    #[arg(long, default_value = "")]
    salt: String,
}

impl From<ReadingArgs> for Readings {
    fn from(a: ReadingArgs) -> Self {
        Readings::new(a.glucose, a.ph, a.cortisol, a.salt)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute the risk score locally, without the AI insight or saving
    Score {
        #[command(flatten)]
        readings: ReadingArgs,

        /// Points the sum is divided by before scaling to a percentage
        #[arg(long, default_value_t = DEFAULT_DENOMINATOR)]
        denominator: u32,
    },

    /// Submit readings to the server for scoring, insight and saving
    Analyze {
        #[command(flatten)]
        readings: ReadingArgs,

        /// Attribute the result to this user id (UUID)
        #[arg(long)]
        user_id: Option<String>,

        /// Print the raw server response as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show analysis server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

/// Body returned by POST /analyze
#[derive(Debug, Deserialize)]
pub struct AnalyzeResult {
    pub state: String,
    pub error_kind: Option<String>,
    pub missing: Option<Vec<Category>>,
    pub score: Option<u8>,
    pub insight: Option<String>,
    pub notification: Notification,
}

// ============================================================================
// Rendering
// ============================================================================

/// Per-zone points and final score, one line each.
pub fn render_score(readings: &Readings, scorer: &RiskScorer) -> String {
    let mut out = String::new();
    for category in Category::ALL {
        let reading = readings.get(category);
        out.push_str(&format!(
            "{:<14} {:<20} {:>2} pts\n",
            category.label(),
            if reading.is_empty() { "-" } else { reading },
            zone_points(category, reading)
        ));
    }
    out.push_str(&format!("\nPCOS Risk Score: {}\n", scorer.score(readings)));
    out
}

pub fn render_analysis(result: &AnalyzeResult) -> String {
    let mut out = String::new();

    let marker = match result.notification.severity {
        Severity::Default => "✅",
        Severity::Destructive => "❌",
    };
    out.push_str(&format!(
        "{} {}: {}\n",
        marker, result.notification.title, result.notification.description
    ));

    if let Some(missing) = result.missing.as_ref().filter(|m| !m.is_empty()) {
        let labels: Vec<&str> = missing.iter().map(|c| c.label()).collect();
        out.push_str(&format!("Missing: {}\n", labels.join(", ")));
    }

    if let Some(score) = result.score {
        out.push_str(&format!("\nPCOS Risk Score: {}%\n", score));
    }

    if let Some(insight) = result.insight.as_deref().filter(|i| !i.is_empty()) {
        out.push_str("\nAI Insight\n");
        out.push_str(insight);
        out.push('\n');
    }

    out
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn do_analyze(
    server: &str,
    readings: Readings,
    user_id: Option<String>,
    json_output: bool,
) -> anyhow::Result<bool> {
    // No client timeout: the server waits on the generative service as long as it takes.
    let client = reqwest::blocking::Client::builder()
        .timeout(None::<std::time::Duration>)
        .build()?;

    let url = format!("{}/analyze", server);
    let mut request = client.post(&url).json(&readings);
    if let Some(id) = user_id {
        request = request.header("x-user-id", id);
    }

    let resp = match request.send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("sweat-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body: serde_json::Value = match resp.json() {
        Ok(b) => b,
        Err(e) => {
            eprintln!("sweat-cli: failed to parse response (HTTP {}): {}", status, e);
            std::process::exit(1);
        }
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(status.is_success());
    }

    match serde_json::from_value::<AnalyzeResult>(body.clone()) {
        Ok(result) => print!("{}", render_analysis(&result)),
        Err(_) => eprintln!(
            "sweat-cli: server returned {}: {}",
            status,
            body["error"].as_str().unwrap_or("unknown error")
        ),
    }

    Ok(status.is_success())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<bool> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Sweat server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:      {}", body["version"].as_str().unwrap_or("?"));
            println!("Store:        {}", body["store"].as_str().unwrap_or("?"));
            if let Some(pg) = body["postgresql"].as_str() {
                println!("PostgreSQL:   {}", pg);
            }
            Ok(true)
        }
        Ok(r) => {
            eprintln!("sweat-cli: server unhealthy (HTTP {})", r.status());
            Ok(false)
        }
        Err(e) => {
            eprintln!("sweat-cli: cannot reach {} — {}", url, e);
            Ok(false)
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Score {
            readings,
            denominator,
        } => {
            let readings = Readings::from(readings);
            print!("{}", render_score(&readings, &RiskScorer::new(denominator)));
            Ok(true)
        }
        Commands::Analyze {
            readings,
            user_id,
            json,
        } => do_analyze(&server, readings.into(), user_id, json),
        Commands::Status => do_status(&server),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("sweat-cli: {}", e);
            std::process::exit(1);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
