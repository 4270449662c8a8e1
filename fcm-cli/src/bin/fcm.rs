use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fcm_cli::PendingWrites;
use fcm_core::io::{build_output_path, read_text};
use fcm_core::{FiniteContextModel, persist, report};

/// Train a finite-context model on a text file and report its average
/// information content.
#[derive(Parser, Debug)]
#[command(name = "fcm")]
#[command(about = "Train a finite-context model and report average information content", long_about = None)]
struct Args {
	/// Training text file
	text_file: PathBuf,

	/// Context order (number of preceding symbols, >= 1)
	#[arg(short = 'k', long = "order")]
	order: usize,

	/// Additive smoothing constant (>= 0)
	#[arg(short = 'a', long = "alpha")]
	alpha: f64,

	/// Output model file (escaped tab-separated records)
	#[arg(short, long, default_value = "model.txt")]
	model: PathBuf,

	/// Output CSV of context,symbol,count rows
	#[arg(long, default_value = "context_counts.csv")]
	counts: PathBuf,

	/// Optional CSV of per-position information content
	#[arg(long)]
	positions: Option<PathBuf>,

	/// Also write a binary snapshot next to the model file (`.bin`)
	#[arg(long)]
	snapshot: bool,

	/// Print every context with its symbol counts
	#[arg(long)]
	dump: bool,
}

fn main() -> Result<()> {
	fcm_cli::init_tracing();
	let args = Args::parse();

	let mut model = FiniteContextModel::new(args.order, args.alpha).context("Invalid model parameters")?;

	let text = read_text(&args.text_file)
		.with_context(|| format!("Error opening file {}", args.text_file.display()))?;
	tracing::info!("Training order-{} model on {} bytes", model.order(), text.len());
	model.train(&text);

	let score = model.score(&text).context("Scoring failed")?;

	// Render every output before writing any of them
	let mut pending = PendingWrites::new();

	let mut records = Vec::new();
	persist::write_records(model.table(), &mut records)?;
	pending.push(&args.model, records);

	let mut counts = Vec::new();
	report::write_counts_csv(model.table(), &mut counts)?;
	pending.push(&args.counts, counts);

	if let Some(path) = &args.positions {
		let mut positions = Vec::new();
		report::write_positions_csv(&score.positions, &mut positions)?;
		pending.push(path, positions);
	}

	if args.snapshot {
		let path = build_output_path(&args.model, "bin")?;
		pending.push(path, model.snapshot_bytes()?);
	}

	pending.commit()?;

	if args.dump {
		print!("{}", report::dump(model.table()));
	}
	println!("Average Information Content: {} bits/symbol", score.average_bits);
	Ok(())
}
