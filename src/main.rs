//! Rehab Monitor CLI
//!
//! Live terminal client for the rehab backend.

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use rehab_monitor::backend::with_deadline;
use rehab_monitor::{
    Backend, Config, DashboardView, HeartRateZone, HttpBackend, Monitor, SessionState,
    SessionSummary, VERSION,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rehab-monitor")]
#[command(version = VERSION)]
#[command(about = "Live monitor for rehab exercise sessions", long_about = None)]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the backend and show live readings
    Watch {
        /// Poll interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Emit one JSON view per update instead of text
        #[arg(long)]
        json: bool,
    },

    /// Start a recording session
    Start,

    /// Stop the current recording session and print its analysis
    Stop,

    /// Fetch the live status once
    Status,

    /// Show recent session history
    Overview,

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rehab_monitor=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(url) = cli.backend {
        config.backend_url = url;
    }

    match cli.command {
        Commands::Watch { interval_ms, json } => {
            if let Some(ms) = interval_ms {
                config.poll_interval = Duration::from_millis(ms);
            }
            config.validate()?;
            cmd_watch(config, json).await
        }
        Commands::Start => cmd_start(&config).await,
        Commands::Stop => cmd_stop(&config).await,
        Commands::Status => cmd_status(&config).await,
        Commands::Overview => cmd_overview(&config).await,
        Commands::Config { save } => cmd_config(&config, save),
    }
}

fn connect(config: &Config) -> anyhow::Result<Arc<HttpBackend>> {
    let backend = HttpBackend::new(&config.backend_url, config.command_timeout)?;
    Ok(Arc::new(backend))
}

async fn cmd_watch(config: Config, json: bool) -> anyhow::Result<()> {
    let backend = connect(&config)?;

    if !json {
        println!("Rehab Monitor v{VERSION}");
        println!();
        println!("  Backend: {}", backend.base_url());
        println!("  Poll interval: {:?}", config.poll_interval);
        println!("  Poll timeout: {:?}", config.poll_timeout);
        println!();
        println!("Type 'start' or 'stop' and press Enter. Press Ctrl+C to quit.");
        println!();
    }

    let handle = Monitor::spawn(backend, config);
    let token = handle.cancellation_token();
    ctrlc_handler(token.clone())?;

    let mut view = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut renderer = Renderer::new(json);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                renderer.render(&current);
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "start" | "s" => {
                        handle.start().await;
                    }
                    "stop" | "x" => {
                        handle.stop().await;
                    }
                    "quit" | "q" => break,
                    "" => {}
                    other => eprintln!("Unknown command: {other} (start, stop, quit)"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    eprintln!("Warning: stdin unavailable: {e}");
                    stdin_open = false;
                }
            },
        }
    }

    if !json {
        println!();
        println!("Stopping monitor...");
    }
    handle.shutdown().await;
    Ok(())
}

async fn cmd_start(config: &Config) -> anyhow::Result<()> {
    let backend = connect(config)?;
    with_deadline(config.command_timeout, backend.start_session()).await?;
    println!("Session started.");
    Ok(())
}

async fn cmd_stop(config: &Config) -> anyhow::Result<()> {
    let backend = connect(config)?;
    let response = with_deadline(config.command_timeout, backend.stop_session()).await?;
    println!("Session stopped.");
    println!();
    println!("{}", response.analysis_text());
    Ok(())
}

async fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let backend = connect(config)?;
    let status = with_deadline(config.poll_timeout, backend.rehab_status()).await?;

    println!("Rehab Backend Status");
    println!("====================");
    println!();
    println!("  Backend: {}", backend.base_url());
    match status.heart_rate {
        Some(bpm) => println!(
            "  Heart rate: {bpm:.0} bpm ({})",
            HeartRateZone::classify(bpm).label()
        ),
        None => println!("  Heart rate: n/a"),
    }
    match status.wrist_angle {
        Some(angle) => println!("  Wrist angle: {angle:.1}°"),
        None => println!("  Wrist angle: n/a"),
    }
    println!(
        "  Risk level: {}",
        status.risk_level.as_deref().unwrap_or("unknown")
    );
    println!(
        "  Recording: {}",
        match status.is_recording {
            Some(true) => "yes",
            Some(false) => "no",
            None => "unknown",
        }
    );
    if let Some(summary) = status.ai_summary {
        println!();
        println!("{summary}");
    }
    Ok(())
}

async fn cmd_overview(config: &Config) -> anyhow::Result<()> {
    let backend = connect(config)?;
    let response = with_deadline(config.command_timeout, backend.exercise_overview()).await?;
    print_summary(&SessionSummary::from_response(response, Utc::now()));
    Ok(())
}

fn cmd_config(config: &Config, save: bool) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);

    if save {
        config.validate()?;
        config.save()?;
        println!();
        println!("Saved.");
    }
    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    println!("Recent Sessions");
    println!("===============");
    println!();
    if summary.records.is_empty() {
        println!("  (none)");
    }
    for record in &summary.records {
        let hr = record
            .avg_heart_rate
            .map(|bpm| format!("{bpm:.0} bpm"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "  {}  accuracy {:>5.1}%  {}  {}",
            record.date,
            record.accuracy_score,
            hr,
            record.risk.as_deref().unwrap_or("")
        );
    }
    if let Some(avg) = summary.average_accuracy() {
        println!();
        println!("  Average accuracy: {avg:.1}%");
    }
    println!();
    println!("{}", summary.trend);
}

/// Prints views as they change, without repeating unchanged sections.
struct Renderer {
    json: bool,
    last_poll: u64,
    last_session: SessionState,
    last_analysis: Option<String>,
    last_error: Option<String>,
    last_summary_at: Option<chrono::DateTime<Utc>>,
}

impl Renderer {
    fn new(json: bool) -> Self {
        Self {
            json,
            last_poll: 0,
            last_session: SessionState::Idle,
            last_analysis: None,
            last_error: None,
            last_summary_at: None,
        }
    }

    fn render(&mut self, view: &DashboardView) {
        if self.json {
            match serde_json::to_string(view) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("Error serializing view: {e}"),
            }
            return;
        }

        if view.session != self.last_session {
            println!("[{}] Session {}", Local::now().format("%H:%M:%S"), view.session);
            self.last_session = view.session;
        }

        if view.poll_count != self.last_poll {
            self.last_poll = view.poll_count;
            println!("{}", status_line(view));
        }

        if view.error != self.last_error {
            if let Some(error) = &view.error {
                eprintln!("Error: {error}");
            }
            self.last_error = view.error.clone();
        }

        if view.analysis != self.last_analysis {
            if let Some(analysis) = &view.analysis {
                println!();
                println!("{analysis}");
                println!();
            }
            self.last_analysis = view.analysis.clone();
        }

        if view.summary.fetched_at.is_some() && view.summary.fetched_at != self.last_summary_at {
            self.last_summary_at = view.summary.fetched_at;
            println!();
            print_summary(&view.summary);
            println!();
        }
    }
}

fn status_line(view: &DashboardView) -> String {
    let session = if view.session == SessionState::Recording {
        format!(
            "REC {:02}:{:02}",
            view.elapsed_secs / 60,
            view.elapsed_secs % 60
        )
    } else {
        view.session.to_string()
    };

    let heart = match (view.heart_rate.last(), view.heart_rate_zone) {
        (Some(sample), Some(zone)) => format!("{:.0} bpm ({})", sample.value, zone.label()),
        _ => "-- bpm".to_string(),
    };

    let motion = match view.motion.last() {
        Some(sample) => match sample.secondary {
            Some(ideal) => format!("angle {:.1}° (ideal {:.1}°)", sample.value, ideal),
            None => format!("angle {:.1}°", sample.value),
        },
        None => "angle --".to_string(),
    };

    let risk = view
        .latest
        .as_ref()
        .and_then(|s| s.risk_level.as_deref())
        .unwrap_or("--");

    format!(
        "[{}] {:<10} | {:<10} | {} | {} | risk {}",
        Local::now().format("%H:%M:%S"),
        view.connection,
        session,
        heart,
        motion,
        risk
    )
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(token: CancellationToken) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        token.cancel();
    })
    .context("Error setting Ctrl+C handler")
}
