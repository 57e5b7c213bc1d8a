use anyhow::{Context, Result, bail};
use clap::Parser;
use log::LevelFilter;
use qrdeck::{PdfWorker, ProgressSection, QrDeck, inspect_pdf_bytes, parse_playlists, require_deck_layout};
use std::path::PathBuf;
use std::time::Instant;

/// Render playlists into a printable deck: a statistics page followed by
/// duplex QR code sheets (codes on the front, year and track on the back).
#[derive(Parser)]
#[command(name = "qrdeck", version)]
struct Args {
    /// Playlists JSON (array of playlists with their `trackInfos`)
    input: PathBuf,

    /// Output PDF path
    #[arg(short, long, default_value = "qrdeck.pdf")]
    output: PathBuf,

    /// QR code rows per sheet
    #[arg(long, default_value_t = 5)]
    rows: u32,

    /// QR code columns per sheet
    #[arg(long, default_value_t = 4)]
    columns: u32,

    /// Edge length of one QR code in millimetres
    #[arg(long, default_value_t = 40.0)]
    qr_size_mm: f32,

    /// Document title
    #[arg(long)]
    title: Option<String>,

    /// Write a JSONL event trace to this file
    #[arg(long)]
    debug_log: Option<PathBuf>,

    /// Omit the dashed cut guides
    #[arg(long)]
    no_scissors: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logger(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let json = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let playlists = parse_playlists(&json)
        .with_context(|| format!("failed to parse playlists from {}", args.input.display()))?;
    log::info!("loaded {} playlists", playlists.len());

    let mut builder = QrDeck::builder()
        .grid(args.rows, args.columns)
        .qr_size_mm(args.qr_size_mm)
        .scissor_lines(!args.no_scissors);
    if let Some(title) = args.title {
        builder = builder.title(title);
    }
    if let Some(path) = args.debug_log {
        builder = builder.debug_log(path);
    }
    let deck = builder.build().context("invalid deck configuration")?;

    let started = Instant::now();
    let mut worker = PdfWorker::spawn(deck)?;
    let mut last_line: Option<(ProgressSection, u8)> = None;
    let bytes = worker.generate(playlists, |event| {
        // Print every tenth percent to keep the output readable.
        let bucket = event.percent / 10;
        if last_line != Some((event.section, bucket)) {
            println!("{:>3}% {}", event.percent, event.section);
            last_line = Some((event.section, bucket));
        }
    })?;
    worker.terminate();

    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    let report = inspect_pdf_bytes(&bytes)?;
    if let Err(err) = require_deck_layout(&report) {
        bail!("produced pdf is not a printable deck: {err}");
    }
    println!(
        "wrote {} ({} pages, {} sheets, {} bytes) in {:.2}s",
        args.output.display(),
        report.page_count,
        report.sheet_count(),
        report.file_size_bytes,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
