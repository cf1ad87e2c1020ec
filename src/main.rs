// nametag-pdf: Generate printable name tag sheets from a JSON job file

use chrono::Local;
use clap::Parser;
use nametag_pdf::job::{Job, JobError};
use nametag_pdf::{estimate_page_count, render, ExportConfig, FontOverrides, RenderError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Per-job person quota
const DEFAULT_MAX_PERSONS: usize = 300;

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    JobError(#[from] JobError),
    #[error("{0}")]
    RenderError(#[from] RenderError),
    #[error("Failed to read font {path}: {source}")]
    FontError {
        path: String,
        source: std::io::Error,
    },
    #[error("Too many persons: {count} (limit {max})")]
    QuotaError { count: usize, max: usize },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

// ============================================================================
// Data Structures
// ============================================================================

/// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Generate printable name tag sheets as PDF")]
struct Args {
    /// Job file (JSON: templates, persons, textFields, exportConfig, ...)
    job: PathBuf,

    /// Output filename (defaults to nametags-{date}-{project}.pdf)
    #[arg(short, long)]
    output: Option<String>,

    /// Preferred TrueType font for regular text
    #[arg(long)]
    font: Option<PathBuf>,

    /// Preferred TrueType font for bold text
    #[arg(long)]
    bold_font: Option<PathBuf>,

    /// Watermark text, overriding the job file
    #[arg(long, conflicts_with = "no_watermark")]
    watermark: Option<String>,

    /// Disable the watermark even if the job enables it
    #[arg(long)]
    no_watermark: bool,

    /// Maximum number of persons per job
    #[arg(long, default_value_t = DEFAULT_MAX_PERSONS)]
    max_persons: usize,

    /// Print the estimated page count and exit
    #[arg(long)]
    estimate: bool,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args = Args::parse();

    let job = Job::load(&args.job)?;
    let person_count = job.persons.len();
    if person_count > args.max_persons {
        return Err(AppError::QuotaError {
            count: person_count,
            max: args.max_persons,
        });
    }

    let export = ExportConfig::from(job.export_config.clone());
    let estimated_pages = estimate_page_count(person_count, &export);
    if args.estimate {
        println!("{}", estimated_pages);
        return Ok(());
    }

    let fonts = FontOverrides {
        regular: read_font(&args.font)?,
        bold: read_font(&args.bold_font)?,
    };

    // Determine output filename
    let output_file = args.output.clone().unwrap_or_else(|| default_output_name(job.project_name()));

    let base_dir = args.job.parent().unwrap_or_else(|| Path::new("."));
    let mut request = job.into_request(base_dir, fonts);
    if args.no_watermark {
        request.watermark.enabled = false;
    } else if let Some(text) = args.watermark {
        request.watermark.enabled = true;
        request.watermark.text = text;
    }

    let generation_id = generate_short_id();
    let document = render(&request)?;

    let file = File::create(&output_file)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&document.bytes)?;
    writer.flush()?;

    let drawn = document.placements.iter().filter(|p| p.drawn).count();
    println!("✓ Generated: {}", output_file);
    println!("  Project: {}", request.title);
    println!("  Persons: {}", request.persons.len());
    println!("  Nametags drawn: {}", drawn);
    println!("  Pages: {} (estimated {})", document.page_count, estimated_pages);
    println!("  Generation ID: {}", generation_id);

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

fn read_font(path: &Option<PathBuf>) -> Result<Option<Vec<u8>>, AppError> {
    match path {
        Some(p) => std::fs::read(p).map(Some).map_err(|source| AppError::FontError {
            path: p.display().to_string(),
            source,
        }),
        None => Ok(None),
    }
}

fn default_output_name(project: &str) -> String {
    let sanitized_name = project
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-')
        .collect::<String>();
    format!(
        "nametags-{}-{}.pdf",
        Local::now().date_naive().format("%Y-%m-%d"),
        sanitized_name
    )
}

fn generate_short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}
