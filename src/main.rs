//! Quadra CLI entry point.

use std::sync::Arc;

use chrono::{Days, Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quadra::{
    extract_available_only, extract_full, render_available, BrowserPortal, Config, ConfigError,
    Credentials, ExtractionWindow, HttpPortal, Portal, QuadraError,
};

/// Quadra: availability scanner for a condominium reservation portal
#[derive(Parser, Debug)]
#[command(name = "quadra")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Extraction backend
    #[arg(short, long, global = true, value_enum, default_value = "browser")]
    backend: Backend,

    /// Portal username (or QUADRA_USERNAME)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Portal password (or QUADRA_PASSWORD)
    #[arg(short, long, global = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Backend {
    /// Drive the portal's UI through a headless browser
    Browser,
    /// Query the portal's internal day endpoint over HTTP
    Http,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the full availability grid and write it as an HTML document
    Scan {
        /// First date of the window (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        start: Option<String>,
        /// Last date of the window (YYYY-MM-DD, default: today + 14)
        #[arg(short, long)]
        end: Option<String>,
        /// Output file
        #[arg(short, long, default_value = "disponibilidade.html")]
        output: String,
    },
    /// List available slots only
    Available {
        /// First date of the window (YYYY-MM-DD, default: today)
        #[arg(short, long)]
        start: Option<String>,
        /// Last date of the window (YYYY-MM-DD, default: today + 14)
        #[arg(short, long)]
        end: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Write an HTML document instead of printing
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, QuadraError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| ConfigError::Invalid(format!("invalid date '{value}', expected YYYY-MM-DD")).into())
}

/// Build the window from the flags, defaulting to the next two weeks,
/// and enforce the span limit here - window validation is the caller's
/// job, not the extraction core's.
fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
    max_days: i64,
) -> Result<ExtractionWindow, QuadraError> {
    let today = Local::now().date_naive();
    let start = match start {
        Some(value) => parse_date(value)?,
        None => today,
    };
    let end = match end {
        Some(value) => parse_date(value)?,
        None => today + Days::new(14),
    };
    let window = ExtractionWindow::new(start, end);
    window.validate_span(max_days)?;
    Ok(window)
}

fn resolve_credentials(args: &Args) -> Result<Credentials, QuadraError> {
    let username = args
        .username
        .clone()
        .or_else(|| std::env::var("QUADRA_USERNAME").ok())
        .ok_or_else(|| ConfigError::MissingField("username".to_string()))?;
    let password = args
        .password
        .clone()
        .or_else(|| std::env::var("QUADRA_PASSWORD").ok())
        .ok_or_else(|| ConfigError::MissingField("password".to_string()))?;
    Ok(Credentials::new(username, password))
}

async fn run(args: Args) -> Result<(), QuadraError> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    let portal: Arc<dyn Portal> = match args.backend {
        Backend::Browser => Arc::new(BrowserPortal::new(&config)),
        Backend::Http => Arc::new(HttpPortal::new(&config)),
    };
    let credentials = resolve_credentials(&args)?;

    match &args.command {
        Command::Scan { start, end, output } => {
            let window = resolve_window(
                start.as_deref(),
                end.as_deref(),
                config.extraction.max_window_days,
            )?;
            let document = extract_full(portal, &credentials, window, &config).await?;
            std::fs::write(output, &document.html)?;
            if document.no_data {
                tracing::warn!("no data collected for {window}");
            }
            tracing::info!(
                rows = document.row_count,
                records = document.record_count,
                resources = document.resources.len(),
                "wrote {output}"
            );
        }
        Command::Available {
            start,
            end,
            json,
            output,
        } => {
            let window = resolve_window(
                start.as_deref(),
                end.as_deref(),
                config.extraction.max_window_days,
            )?;
            let slots = extract_available_only(portal, &credentials, window, &config).await?;
            if let Some(output) = output {
                std::fs::write(output, render_available(&slots))?;
                tracing::info!(slots = slots.len(), "wrote {output}");
            } else if *json {
                println!("{}", serde_json::to_string_pretty(&slots)?);
            } else if slots.is_empty() {
                println!("Nenhuma disponibilidade encontrada em {window}");
            } else {
                for slot in &slots {
                    println!(
                        "{}  {}  {}",
                        slot.date.format("%d/%m/%Y"),
                        slot.time_label,
                        slot.resource_label
                    );
                }
            }
        }
    }
    Ok(())
}
