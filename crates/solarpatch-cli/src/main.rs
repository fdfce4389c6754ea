//! solarpatch CLI — composite region patches onto a synthetic full-disk canvas.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use solarpatch::{
    parse_observation_date, CodeHistogram, Compositor, Observation, ResolvedRectangle,
    SessionConfig, SessionReport,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "solarpatch")]
#[command(about = "Composite HARP/TARP patch bitmaps onto a full-disk solar canvas")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite the patches of one observation.
    Composite(CliCompositeArgs),

    /// Print the provider table, optionally the provider chosen for a date.
    Providers {
        /// Session config JSON (defaults to the built-in table).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Observation date, e.g. 2012.07.12_00:00:00 or 2003-10-28T11:00:00.
        #[arg(long)]
        date: Option<String>,
    },

    /// Print the secondary instrument's recode table.
    RecodeTable {
        /// Session config JSON (defaults to the built-in table).
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct CliCompositeArgs {
    /// Observation JSON: header keywords and patch records.
    #[arg(long)]
    session: PathBuf,

    /// Path to write the composite summary (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Session config JSON (schema `solarpatch.config.v1`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Force a provider by name (hmi, mdi) instead of selecting by date.
    #[arg(long)]
    instrument: Option<String>,

    /// Write the canvas as a 16-bit code PNG (no-data -> 0).
    #[arg(long)]
    canvas_png: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> CliResult<SessionConfig> {
    match path {
        Some(path) => {
            tracing::info!("Loading config: {}", path.display());
            SessionConfig::from_json_file(path)
        }
        None => Ok(SessionConfig::default()),
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Composite(args) => run_composite(&args),
        Commands::Providers { config, date } => run_providers(config.as_deref(), date.as_deref()),
        Commands::RecodeTable { config } => run_recode_table(config.as_deref()),
    }
}

// ── composite ──────────────────────────────────────────────────────────

#[derive(serde::Serialize)]
struct HistogramEntry {
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    pixels: usize,
}

#[derive(serde::Serialize)]
struct CompositeSummary<'a> {
    canvas_id: &'a str,
    instrument: &'a str,
    observation_date: String,
    image_size: u32,
    bounding_boxes: &'a [ResolvedRectangle],
    histogram: Vec<HistogramEntry>,
    no_data_pixels: usize,
    report: &'a SessionReport,
}

fn labeled_histogram(hist: &CodeHistogram, config: &SessionConfig) -> Vec<HistogramEntry> {
    // The canvas is always in the primary vocabulary.
    let labels = &config.providers.primary().category_labels;
    hist.codes
        .iter()
        .map(|(&code, &pixels)| HistogramEntry {
            code,
            label: labels.get(&code).cloned(),
            pixels,
        })
        .collect()
}

fn run_composite(args: &CliCompositeArgs) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;

    tracing::info!("Loading session: {}", args.session.display());
    let mut observation = Observation::from_json_file(&args.session)?;
    if let Some(name) = &args.instrument {
        observation.instrument = Some(name.clone());
    }
    tracing::info!("{} patch records", observation.patches.len());

    let compositor = Compositor::with_config(config);
    let out = compositor.composite_observation(&observation)?;

    let hist = out.canvas.code_histogram();
    tracing::info!(
        "Canvas '{}': {} regions, {} on-disk/foreground px, {} no-data px",
        out.canvas.id(),
        out.bounding_boxes.len(),
        hist.codes.values().sum::<usize>(),
        hist.no_data,
    );
    if !out.report.warnings.is_empty() {
        tracing::warn!(
            "{} uncovered recode codes; see report.warnings",
            out.report.warnings.len()
        );
    }

    let summary = CompositeSummary {
        canvas_id: out.canvas.id(),
        instrument: &out.instrument,
        observation_date: solarpatch::format_observation_date(&out.observation_date),
        image_size: out.canvas.side(),
        bounding_boxes: &out.bounding_boxes,
        histogram: labeled_histogram(&hist, compositor.config()),
        no_data_pixels: hist.no_data,
        report: &out.report,
    };
    let json = serde_json::to_string_pretty(&summary)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Results written to {}", args.out.display());

    if let Some(path) = &args.canvas_png {
        out.canvas.to_code_image().save(path)?;
        tracing::info!("Canvas image written to {}", path.display());
    }

    Ok(())
}

// ── providers ──────────────────────────────────────────────────────────

fn run_providers(config: Option<&Path>, date: Option<&str>) -> CliResult<()> {
    let config = load_config(config)?;

    println!("solarpatch instrument providers");
    for p in config.providers.providers() {
        let end = p
            .observing
            .end
            .map_or_else(|| "open".to_string(), |e| e.to_string());
        println!(
            "  {:<4} {:?}: side {} px, {} ({} / {}), {} .. {}{}",
            p.name,
            p.role,
            p.canvas_side,
            p.region_keyword,
            p.fulldisk_series,
            p.patch_series,
            p.observing.start,
            end,
            if p.recode.is_some() { ", recoded" } else { "" },
        );
    }

    if let Some(raw) = date {
        let date = parse_observation_date(raw)?;
        let provider = config.providers.select(&date)?;
        println!("Selected for {}: {}", date, provider.name);
        println!("  canvas id: {}", provider.canvas_id(&date));
    }

    Ok(())
}

// ── recode-table ───────────────────────────────────────────────────────

fn run_recode_table(config: Option<&Path>) -> CliResult<()> {
    let config = load_config(config)?;
    let secondary = config.providers.secondary();
    let table = secondary
        .recode
        .as_ref()
        .ok_or_else(|| -> CliError { format!("{} has no recode table", secondary.name).into() })?;
    println!("{}", serde_json::to_string_pretty(table)?);
    Ok(())
}
