use rand::Rng;
use rand::seq::IndexedRandom;

use super::fcm_model::FiniteContextModel;
use super::generation_input::{GenerationInput, Policy};
use crate::error::{FcmError, Result};
use crate::persist::escape;

/// Fraction of the maximum count a symbol needs to be a `MaxFrequency` candidate.
pub const MAX_FREQUENCY_THRESHOLD: f64 = 0.7;

/// Outcome of a single sampling decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Draw {
	/// A symbol drawn from the context's distribution.
	Symbol(u8),
	/// The context was never observed; the caller emits its fallback.
	UnknownContext,
}

/// Why a generation run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
	/// The requested number of symbols was produced.
	Completed,
	/// The repetition guard saw the same symbol fill its whole window.
	DegenerateRepetition,
}

/// A generated sequence with its diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
	/// Prior followed by the generated symbols.
	pub text: Vec<u8>,
	/// Number of symbols appended to the prior.
	pub generated: usize,
	/// How many steps hit an unknown context and emitted the fallback.
	pub unknown_contexts: usize,
	pub stop: StopReason,
}

/// Generates sequences from a trained model.
///
/// # Responsibilities
/// - Slide a `k`-symbol window over the output and draw the next symbol
/// - Apply the selected `Policy`
/// - Report unknown contexts and stop on degenerate repetition
///
/// The random source is owned by the sampler and injected by the caller,
/// so a seeded generator gives reproducible output.
pub struct Sampler<'a, R: Rng> {
	model: &'a FiniteContextModel,
	input: &'a GenerationInput,
	rng: R,
}

impl<'a, R: Rng> Sampler<'a, R> {
	pub fn new(model: &'a FiniteContextModel, input: &'a GenerationInput, rng: R) -> Self {
		Self { model, input, rng }
	}

	/// Draws the symbol following `context` with the configured policy.
	pub fn next_symbol(&mut self, context: &[u8]) -> Draw {
		match self.input.policy {
			Policy::MaxFrequency => self.draw_max_frequency(context),
			Policy::Weighted => self.draw_weighted(context),
		}
	}

	/// Uniform draw among symbols whose count reaches
	/// `MAX_FREQUENCY_THRESHOLD * max_count`.
	fn draw_max_frequency(&mut self, context: &[u8]) -> Draw {
		let model = self.model;
		let Some(dist) = model.table().lookup(context) else {
			return Draw::UnknownContext;
		};

		let threshold = dist.max_count() as f64 * MAX_FREQUENCY_THRESHOLD;
		let candidates: Vec<u8> = dist
			.iter()
			.filter(|(_, count)| *count as f64 >= threshold)
			.map(|(symbol, _)| symbol)
			.collect();

		match candidates.choose(&mut self.rng) {
			Some(symbol) => Draw::Symbol(*symbol),
			None => Draw::UnknownContext,
		}
	}

	/// Cumulative-probability draw over the observed symbols.
	///
	/// Each observed symbol is weighted by the model's smoothed probability
	/// (the same one used for scoring), renormalized over the observed
	/// symbols' combined mass.
	fn draw_weighted(&mut self, context: &[u8]) -> Draw {
		let model = self.model;
		let Some(dist) = model.table().lookup(context) else {
			return Draw::UnknownContext;
		};

		let weights: Vec<(u8, f64)> = dist
			.iter()
			.map(|(symbol, _)| (symbol, model.probability(context, symbol)))
			.collect();
		let mass: f64 = weights.iter().map(|(_, p)| p).sum();
		let Some(&(last, _)) = weights.last() else {
			return Draw::UnknownContext;
		};

		let draw: f64 = self.rng.random();
		let mut cumulative = 0.0;
		for (symbol, p) in &weights {
			cumulative += p / mass;
			if draw <= cumulative {
				return Draw::Symbol(*symbol);
			}
		}

		// Rounding left the cumulative sum just under the draw
		Draw::Symbol(last)
	}

	/// Extends `prior` by up to `input.length` symbols.
	///
	/// # Errors
	/// Returns `PriorLength` if `prior` is not exactly `k` symbols long.
	/// No random draw happens in that case.
	pub fn generate(&mut self, prior: &[u8]) -> Result<Generation> {
		let k = self.model.order();
		if prior.len() != k {
			return Err(FcmError::PriorLength { expected: k, actual: prior.len() });
		}

		let mut text = Vec::with_capacity(k + self.input.length);
		text.extend_from_slice(prior);
		let mut unknown_contexts = 0;
		let mut stop = StopReason::Completed;

		for step in 0..self.input.length {
			let context = &text[text.len() - k..];
			let symbol = match self.next_symbol(context) {
				Draw::Symbol(symbol) => symbol,
				Draw::UnknownContext => {
					tracing::warn!("Unknown context '{}', emitting fallback", escape(context));
					unknown_contexts += 1;
					self.input.fallback
				}
			};
			tracing::trace!("Step {}: context = '{}', next = '{}'", step, escape(context), escape(&[symbol]));
			text.push(symbol);

			if self.is_degenerate(&text, step + 1) {
				tracing::warn!("Repetition of '{}' detected after {} symbols, stopping", escape(&[symbol]), step + 1);
				stop = StopReason::DegenerateRepetition;
				break;
			}
		}

		let generated = text.len() - k;
		Ok(Generation { text, generated, unknown_contexts, stop })
	}

	fn is_degenerate(&self, text: &[u8], generated: usize) -> bool {
		let Some(window) = self.input.repetition_guard() else {
			return false;
		};
		if generated < window {
			return false;
		}
		let tail = &text[text.len() - window..];
		tail.iter().all(|symbol| *symbol == tail[0])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn model_from(text: &[u8], order: usize, alpha: f64) -> FiniteContextModel {
		let mut model = FiniteContextModel::new(order, alpha).unwrap();
		model.train(text);
		model
	}

	fn input(length: usize, policy: Policy, guard: Option<usize>) -> GenerationInput {
		let mut input = GenerationInput::new(length, policy);
		input.set_repetition_guard(guard).unwrap();
		input
	}

	#[test]
	fn test_max_frequency_never_picks_rare_symbol() {
		let mut table = crate::model::context_table::ContextTable::new(1).unwrap();
		table.add_count(b"a", b'a', 3).unwrap();
		table.add_count(b"a", b'b', 3).unwrap();
		table.add_count(b"a", b'c', 1).unwrap();
		let model = FiniteContextModel::from_table(table, 1.0).unwrap();
		let input = input(1, Policy::MaxFrequency, None);
		let mut sampler = Sampler::new(&model, &input, StdRng::seed_from_u64(7));

		let mut seen_a = false;
		let mut seen_b = false;
		for _ in 0..500 {
			match sampler.next_symbol(b"a") {
				Draw::Symbol(b'a') => seen_a = true,
				Draw::Symbol(b'b') => seen_b = true,
				other => panic!("unexpected draw {:?}", other),
			}
		}
		assert!(seen_a && seen_b);
	}

	#[test]
	fn test_weighted_follows_counts() {
		let mut table = crate::model::context_table::ContextTable::new(1).unwrap();
		table.add_count(b"x", b'b', 1).unwrap();
		table.add_count(b"x", b'c', 3).unwrap();
		let model = FiniteContextModel::from_table(table, 0.0).unwrap();
		let input = input(1, Policy::Weighted, None);
		let mut sampler = Sampler::new(&model, &input, StdRng::seed_from_u64(42));

		let trials = 4000;
		let mut c_count = 0;
		for _ in 0..trials {
			match sampler.next_symbol(b"x") {
				Draw::Symbol(b'c') => c_count += 1,
				Draw::Symbol(b'b') => (),
				other => panic!("unexpected draw {:?}", other),
			}
		}
		let ratio = c_count as f64 / trials as f64;
		assert!((ratio - 0.75).abs() < 0.05, "ratio was {}", ratio);
	}

	#[test]
	fn test_weighted_smoothing_uses_observed_symbols() {
		let mut table = crate::model::context_table::ContextTable::new(1).unwrap();
		table.add_count(b"x", b'b', 1).unwrap();
		table.add_count(b"x", b'c', 3).unwrap();
		let model = FiniteContextModel::from_table(table, 1.0).unwrap();
		let input = input(1, Policy::Weighted, None);
		let mut sampler = Sampler::new(&model, &input, StdRng::seed_from_u64(42));

		// (3 + 1) / (4 + 1 * 2): smoothing spread over the two observed symbols
		let expected = 4.0 / 6.0;
		let trials = 20000;
		let mut c_count = 0;
		for _ in 0..trials {
			match sampler.next_symbol(b"x") {
				Draw::Symbol(b'c') => c_count += 1,
				Draw::Symbol(b'b') => (),
				other => panic!("unexpected draw {:?}", other),
			}
		}
		let ratio = c_count as f64 / trials as f64;
		assert!((ratio - expected).abs() < 0.02, "ratio was {}", ratio);
		// Clearly apart from the unsmoothed 3/4
		assert!((ratio - 0.75).abs() > 0.05, "ratio was {}", ratio);
	}

	#[test]
	fn test_unknown_context_draw() {
		let model = model_from(b"abc", 1, 1.0);
		for policy in [Policy::MaxFrequency, Policy::Weighted] {
			let input = input(1, policy, None);
			let mut sampler = Sampler::new(&model, &input, StdRng::seed_from_u64(1));
			assert_eq!(sampler.next_symbol(b"z"), Draw::UnknownContext);
		}
	}

	#[test]
	fn test_prior_length_mismatch_fails_before_sampling() {
		let model = model_from(b"hello world", 3, 1.0);
		let input = input(10, Policy::Weighted, None);
		let mut sampler = Sampler::new(&model, &input, StdRng::seed_from_u64(1));
		let err = sampler.generate(b"he").unwrap_err();
		assert!(matches!(err, FcmError::PriorLength { expected: 3, actual: 2 }));
	}

	#[test]
	fn test_generate_follows_deterministic_chain() {
		// Every context has a single continuation
		let model = model_from(b"abcdefgh", 2, 1.0);
		for policy in [Policy::MaxFrequency, Policy::Weighted] {
			let input = input(6, policy, Some(5));
			let mut sampler = Sampler::new(&model, &input, StdRng::seed_from_u64(3));
			let generation = sampler.generate(b"ab").unwrap();
			assert_eq!(generation.text, b"abcdefgh");
			assert_eq!(generation.generated, 6);
			assert_eq!(generation.unknown_contexts, 0);
			assert_eq!(generation.stop, StopReason::Completed);
		}
	}

	#[test]
	fn test_unknown_context_emits_fallback() {
		let model = model_from(b"ab", 1, 1.0);
		let mut input = input(4, Policy::MaxFrequency, None);
		input.fallback = b'_';
		let mut sampler = Sampler::new(&model, &input, StdRng::seed_from_u64(3));
		let generation = sampler.generate(b"a").unwrap();
		assert_eq!(generation.text, b"ab___");
		assert_eq!(generation.unknown_contexts, 3);
		assert_eq!(generation.stop, StopReason::Completed);
	}

	#[test]
	fn test_repetition_guard_stops_early() {
		let model = model_from(b"aaaaaaaa", 1, 1.0);
		let input = input(50, Policy::Weighted, Some(5));
		let mut sampler = Sampler::new(&model, &input, StdRng::seed_from_u64(9));
		let generation = sampler.generate(b"a").unwrap();
		assert_eq!(generation.stop, StopReason::DegenerateRepetition);
		assert_eq!(generation.generated, 5);
		assert_eq!(generation.text, b"aaaaaa");

		let mut unguarded = GenerationInput::new(50, Policy::Weighted);
		unguarded.set_repetition_guard(None).unwrap();
		let mut sampler = Sampler::new(&model, &unguarded, StdRng::seed_from_u64(9));
		let generation = sampler.generate(b"a").unwrap();
		assert_eq!(generation.stop, StopReason::Completed);
		assert_eq!(generation.generated, 50);
	}

	#[test]
	fn test_seeded_generation_is_reproducible() {
		let model = model_from(b"she sells sea shells by the sea shore", 2, 0.5);
		let input = input(40, Policy::Weighted, None);
		let first = Sampler::new(&model, &input, StdRng::seed_from_u64(11)).generate(b"se").unwrap();
		let second = Sampler::new(&model, &input, StdRng::seed_from_u64(11)).generate(b"se").unwrap();
		assert_eq!(first, second);
		assert_eq!(first.text.len(), 42);
	}
}
