use crate::error::{FcmError, Result};

/// Symbol emitted when the current context was never observed.
pub const FALLBACK_SYMBOL: u8 = b' ';

/// Default number of symbols to generate.
pub const DEFAULT_LENGTH: usize = 100;

/// Default repetition guard window.
pub const DEFAULT_GUARD_WINDOW: usize = 5;

/// Strategy used to draw the next symbol from a context's distribution.
///
/// # Variants
/// - `MaxFrequency`: uniform draw among the symbols whose count is at least
///   70% of the most frequent one. Biased toward frequent continuations but
///   not deterministic.
/// - `Weighted`: draw proportionally to the smoothed probability of each
///   observed symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Policy {
	MaxFrequency,
	#[default]
	Weighted,
}

/// Parameters of one generation run.
///
/// # Invariants
/// - `repetition_guard`, when set, is a window of at least 2 symbols
pub struct GenerationInput {
	/// Number of symbols to append to the prior.
	pub length: usize,

	/// Sampling policy.
	pub policy: Policy,

	/// Symbol emitted for unknown contexts.
	pub fallback: u8,

	/// Stop early once the last `window` symbols are identical.
	repetition_guard: Option<usize>,
}

impl Default for GenerationInput {
	fn default() -> Self {
		Self {
			length: DEFAULT_LENGTH,
			policy: Policy::default(),
			fallback: FALLBACK_SYMBOL,
			repetition_guard: Some(DEFAULT_GUARD_WINDOW),
		}
	}
}

impl GenerationInput {
	/// Creates an input generating `length` symbols with `policy`.
	pub fn new(length: usize, policy: Policy) -> Self {
		Self { length, policy, ..Self::default() }
	}

	/// Returns the repetition guard window, if enabled.
	pub fn repetition_guard(&self) -> Option<usize> {
		self.repetition_guard
	}

	/// Sets (or disables with `None`) the repetition guard.
	///
	/// # Errors
	/// Returns an error if the window is smaller than 2.
	pub fn set_repetition_guard(&mut self, window: Option<usize>) -> Result<()> {
		if let Some(window) = window {
			if window < 2 {
				return Err(FcmError::InvalidGuard(window));
			}
		}
		self.repetition_guard = window;
		Ok(())
	}
}
