use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use fcm_cli::load_model;
use fcm_core::model::generation_input::DEFAULT_GUARD_WINDOW;
use fcm_core::{FcmError, FiniteContextModel, GenerationInput, Policy, Sampler, StopReason};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Generate text from a model written by `fcm`.
#[derive(Parser, Debug)]
#[command(name = "fcm-generate")]
#[command(about = "Generate text by sampling a finite-context model", long_about = None)]
struct Args {
	/// Context order the model was trained with
	#[arg(short = 'k', long = "order")]
	order: usize,

	/// Additive smoothing constant (>= 0)
	#[arg(short = 'a', long = "alpha")]
	alpha: f64,

	/// Seed text, exactly `k` bytes long
	#[arg(short = 'p', long = "prior")]
	prior: String,

	/// Number of symbols to generate
	#[arg(short = 's', long = "size")]
	size: usize,

	/// Model file: text records, or a snapshot when the extension is `.bin`
	#[arg(short, long, default_value = "model.txt")]
	model: PathBuf,

	/// Sampling policy
	#[arg(long, value_enum, default_value_t = PolicyArg::Weighted)]
	policy: PolicyArg,

	/// Repetition guard window (default: 5 for weighted, off for max-frequency)
	#[arg(long, conflicts_with = "no_guard")]
	guard: Option<usize>,

	/// Disable the repetition guard
	#[arg(long)]
	no_guard: bool,

	/// Seed for the random generator (reproducible output)
	#[arg(long)]
	seed: Option<u64>,

	/// ASCII symbol emitted for unknown contexts
	#[arg(long, default_value_t = ' ')]
	fallback: char,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
	/// Cumulative draw weighted by smoothed probability
	Weighted,
	/// Uniform draw among symbols near the maximum count
	MaxFrequency,
}

impl From<PolicyArg> for Policy {
	fn from(arg: PolicyArg) -> Self {
		match arg {
			PolicyArg::Weighted => Policy::Weighted,
			PolicyArg::MaxFrequency => Policy::MaxFrequency,
		}
	}
}

impl Args {
	fn generation_input(&self) -> Result<GenerationInput> {
		let policy = Policy::from(self.policy);
		let mut input = GenerationInput::new(self.size, policy);

		let guard = if self.no_guard {
			None
		} else {
			match (self.guard, policy) {
				(Some(window), _) => Some(window),
				(None, Policy::Weighted) => Some(DEFAULT_GUARD_WINDOW),
				(None, Policy::MaxFrequency) => None,
			}
		};
		input.set_repetition_guard(guard)?;

		if !self.fallback.is_ascii() {
			bail!("Fallback symbol must be ASCII, got {:?}", self.fallback);
		}
		input.fallback = self.fallback as u8;
		Ok(input)
	}
}

fn main() -> Result<()> {
	fcm_cli::init_tracing();
	let args = Args::parse();

	// Configuration is fully validated before the model is read
	FiniteContextModel::new(args.order, args.alpha).context("Invalid model parameters")?;
	let prior = args.prior.as_bytes();
	if prior.len() != args.order {
		return Err(FcmError::PriorLength { expected: args.order, actual: prior.len() })
			.context("Invalid parameters. Ensure prior has length k");
	}
	let input = args.generation_input()?;

	let model = load_model(&args.model, args.order, args.alpha)?;

	let rng = match args.seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_os_rng(),
	};
	let generation = Sampler::new(&model, &input, rng).generate(prior)?;

	if generation.unknown_contexts > 0 {
		tracing::warn!("{} steps hit an unknown context", generation.unknown_contexts);
	}
	if generation.stop == StopReason::DegenerateRepetition {
		tracing::warn!("Stopped after {} of {} symbols: degenerate repetition", generation.generated, input.length);
	}

	println!("Generated text:\n{}", String::from_utf8_lossy(&generation.text));
	Ok(())
}
