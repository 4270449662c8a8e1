use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::context_table::ContextTable;
use crate::error::{FcmError, Result};

/// Number of distinct symbol values (one byte per symbol).
pub const ALPHABET_SIZE: usize = 256;

/// Self-information of the symbol at one scored position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PositionInfo {
	/// Index of the symbol in the scored text.
	pub position: usize,
	pub symbol: u8,
	/// `-log2(p)` in bits.
	pub bits: f64,
}

/// Result of scoring a text under a model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Score {
	/// Mean self-information over every scored position, 0 when nothing was scored.
	pub average_bits: f64,
	/// Per-position values, in text order.
	pub positions: Vec<PositionInfo>,
}

/// A fixed-order finite-context model.
///
/// Holds the context order `k`, the additive smoothing constant `alpha`,
/// the alphabet size the smoothing mass is spread over, and the learned
/// `ContextTable`.
///
/// # Responsibilities
/// - Train: count every symbol of a text against its `k` preceding symbols
/// - Score: smoothed probabilities, self-information, average information content
/// - Persist a binary snapshot (`postcard`)
///
/// # Invariants
/// - `alpha` is finite and >= 0
/// - `alphabet_size` is >= 1
/// - `table.order()` is the model order
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FiniteContextModel {
	alpha: f64,
	alphabet_size: usize,
	table: ContextTable,
}

impl FiniteContextModel {
	/// Creates an untrained model over the byte alphabet.
	///
	/// # Errors
	/// - `InvalidOrder` if `order == 0`
	/// - `InvalidAlpha` if `alpha` is negative or not finite
	pub fn new(order: usize, alpha: f64) -> Result<Self> {
		Self::from_table(ContextTable::new(order)?, alpha)
	}

	/// Wraps an existing table, typically one loaded from disk.
	pub fn from_table(table: ContextTable, alpha: f64) -> Result<Self> {
		if !alpha.is_finite() || alpha < 0.0 {
			return Err(FcmError::InvalidAlpha(alpha));
		}
		Ok(Self { alpha, alphabet_size: ALPHABET_SIZE, table })
	}

	/// Overrides the alphabet size used in the smoothing denominator.
	///
	/// # Errors
	/// Returns an error if `alphabet_size == 0`.
	pub fn with_alphabet_size(mut self, alphabet_size: usize) -> Result<Self> {
		if alphabet_size == 0 {
			return Err(FcmError::InvalidAlphabetSize);
		}
		self.alphabet_size = alphabet_size;
		Ok(self)
	}

	pub fn order(&self) -> usize {
		self.table.order()
	}

	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	pub fn alphabet_size(&self) -> usize {
		self.alphabet_size
	}

	pub fn table(&self) -> &ContextTable {
		&self.table
	}

	/// Consumes the model and returns its table.
	pub fn into_table(self) -> ContextTable {
		self.table
	}

	/// Counts every symbol of `text` against the `k` symbols preceding it.
	///
	/// Texts no longer than `k` add nothing. Training is additive:
	/// training twice on the same text doubles every count.
	pub fn train(&mut self, text: &[u8]) {
		let k = self.order();
		for window in text.windows(k + 1) {
			self.table.observe(window);
		}
		tracing::debug!(
			"Trained on {} bytes: {} contexts, {} counts",
			text.len(),
			self.table.len(),
			self.table.total_count()
		);
	}

	/// Smoothed probability of `symbol` following `context`.
	///
	/// `(count + alpha) / (total + alpha * A)`. An unknown context behaves
	/// as an empty distribution, so smoothing alone decides the result.
	pub fn probability(&self, context: &[u8], symbol: u8) -> f64 {
		let (count, total) = match self.table.lookup(context) {
			Some(dist) => (dist.count(symbol), dist.total()),
			None => (0, 0),
		};
		let denominator = total as f64 + self.alpha * self.alphabet_size as f64;
		if denominator == 0.0 {
			return 0.0;
		}
		(count as f64 + self.alpha) / denominator
	}

	/// `-log2` of [`probability`](Self::probability), in bits.
	///
	/// Infinite when the probability is 0 (only possible with `alpha == 0`).
	pub fn self_information(&self, context: &[u8], symbol: u8) -> f64 {
		-self.probability(context, symbol).log2()
	}

	/// Scores `text`, returning the average and the per-position series.
	///
	/// # Errors
	/// Returns `ZeroProbability` for the first position whose symbol has
	/// probability 0, which can only happen when `alpha == 0`.
	pub fn score(&self, text: &[u8]) -> Result<Score> {
		let mut positions = Vec::with_capacity(text.len().saturating_sub(self.order()));
		let average_bits = self.fold_information(text, |info| positions.push(info))?;
		Ok(Score { average_bits, positions })
	}

	/// Average information content of `text` in bits per symbol.
	pub fn average_information(&self, text: &[u8]) -> Result<f64> {
		self.fold_information(text, |_| ())
	}

	fn fold_information<F>(&self, text: &[u8], mut visit: F) -> Result<f64>
	where
		F: FnMut(PositionInfo),
	{
		let k = self.order();
		let mut sum = 0.0;
		let mut scored = 0usize;
		for (offset, window) in text.windows(k + 1).enumerate() {
			let position = offset + k;
			let bits = self.self_information(&window[..k], window[k]);
			if !bits.is_finite() {
				return Err(FcmError::ZeroProbability { position });
			}
			sum += bits;
			scored += 1;
			visit(PositionInfo { position, symbol: window[k], bits });
		}

		if scored == 0 {
			return Ok(0.0);
		}
		Ok(sum / scored as f64)
	}

	/// Encodes the whole model as a `postcard` snapshot.
	pub fn snapshot_bytes(&self) -> Result<Vec<u8>> {
		Ok(postcard::to_stdvec(self)?)
	}

	/// Writes the whole model as a `postcard` snapshot.
	pub fn save_snapshot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let bytes = self.snapshot_bytes()?;
		crate::io::write_atomic(&path, &bytes)?;
		tracing::info!("Saved snapshot to {:?} ({} bytes)", path.as_ref(), bytes.len());
		Ok(())
	}

	/// Reads a snapshot written by [`save_snapshot`](Self::save_snapshot).
	///
	/// # Errors
	/// - `Io` if the file cannot be read
	/// - `Snapshot` if decoding fails
	/// - `CorruptSnapshot` if the decoded model breaks an invariant
	pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Self> {
		let bytes = fs::read(&path)?;
		let model: Self = postcard::from_bytes(&bytes)?;
		model.validate()?;
		tracing::info!(
			"Loaded snapshot from {:?}: order {}, {} contexts",
			path.as_ref(),
			model.order(),
			model.table.len()
		);
		Ok(model)
	}

	fn validate(&self) -> Result<()> {
		if !self.alpha.is_finite() || self.alpha < 0.0 {
			return Err(FcmError::CorruptSnapshot(format!("invalid alpha {}", self.alpha)));
		}
		if self.alphabet_size == 0 {
			return Err(FcmError::CorruptSnapshot("alphabet size is 0".to_owned()));
		}
		self.table.validate().map_err(FcmError::CorruptSnapshot)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn trained(text: &[u8], order: usize, alpha: f64) -> FiniteContextModel {
		let mut model = FiniteContextModel::new(order, alpha).unwrap();
		model.train(text);
		model
	}

	#[test]
	fn test_invalid_parameters_are_rejected() {
		assert!(matches!(FiniteContextModel::new(0, 1.0), Err(FcmError::InvalidOrder)));
		assert!(matches!(FiniteContextModel::new(1, -0.5), Err(FcmError::InvalidAlpha(_))));
		assert!(matches!(FiniteContextModel::new(1, f64::NAN), Err(FcmError::InvalidAlpha(_))));
		assert!(matches!(
			FiniteContextModel::new(1, 1.0).unwrap().with_alphabet_size(0),
			Err(FcmError::InvalidAlphabetSize)
		));
	}

	#[test]
	fn test_total_count_is_length_minus_order() {
		let text = b"the quick brown fox jumps over the lazy dog";
		for order in 1..=5 {
			let model = trained(text, order, 1.0);
			assert_eq!(model.table().total_count(), (text.len() - order) as u64);
		}
	}

	#[test]
	fn test_short_text_adds_nothing() {
		let model = trained(b"ab", 2, 1.0);
		assert!(model.table().is_empty());
		assert_eq!(model.average_information(b"ab").unwrap(), 0.0);
		assert!(model.score(b"a").unwrap().positions.is_empty());
	}

	#[test]
	fn test_training_twice_doubles_counts() {
		let text = b"abracadabra";
		let once = trained(text, 2, 1.0);
		let mut twice = trained(text, 2, 1.0);
		twice.train(text);

		assert_eq!(once.table().len(), twice.table().len());
		for (context, symbol, count) in once.table().records() {
			assert_eq!(twice.table().lookup(context).unwrap().count(symbol), count * 2);
		}
		assert_eq!(twice.table().total_count(), once.table().total_count() * 2);
	}

	#[test]
	fn test_aaaa_scenario() {
		let model = trained(b"aaaa", 1, 1.0).with_alphabet_size(4).unwrap();
		assert_eq!(model.table().lookup(b"a").unwrap().count(b'a'), 3);
		assert_eq!(model.table().context_total(b"a"), 3);

		let p = model.probability(b"a", b'a');
		assert!((p - 4.0 / 7.0).abs() < 1e-12);

		let score = model.score(b"aaaa").unwrap();
		assert_eq!(score.positions.len(), 3);
		let expected = -(4.0f64 / 7.0).log2();
		assert!((expected - 0.807).abs() < 1e-3);
		assert!((score.average_bits - expected).abs() < 1e-12);
		assert_eq!(score.positions[0].position, 1);
		assert_eq!(score.positions[2].position, 3);
	}

	#[test]
	fn test_probabilities_are_bounded() {
		let model = trained(b"mississippi river", 2, 0.5);
		let probe = b"misty rivers of mississippi";
		for window in probe.windows(3) {
			let p = model.probability(&window[..2], window[2]);
			assert!(p > 0.0 && p <= 1.0);
		}
		let score = model.score(probe).unwrap();
		assert!(score.average_bits >= 0.0);
		assert!(score.positions.iter().all(|info| info.bits.is_finite() && info.bits >= 0.0));
	}

	#[test]
	fn test_unknown_context_uses_smoothing_only() {
		let model = trained(b"abc", 1, 1.0);
		let p = model.probability(b"z", b'a');
		assert!((p - 1.0 / ALPHABET_SIZE as f64).abs() < 1e-12);
	}

	#[test]
	fn test_zero_alpha_unseen_symbol_fails() {
		let model = trained(b"abab", 1, 0.0);
		assert_eq!(model.average_information(b"abab").unwrap(), 0.0);
		let err = model.score(b"abb").unwrap_err();
		assert!(matches!(err, FcmError::ZeroProbability { position: 2 }));
	}

	#[test]
	fn test_average_matches_score() {
		let model = trained(b"hello world, hello rust", 3, 0.1);
		let text = b"hello there";
		let score = model.score(text).unwrap();
		let average = model.average_information(text).unwrap();
		assert!((score.average_bits - average).abs() < 1e-12);
	}
}
