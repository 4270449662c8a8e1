use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Observed symbol counts following one context.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Responsibilities:
/// - Accumulate symbol occurrences during training
/// - Keep the cached total in step with the per-symbol counts
/// - Merge with the distribution of the same context from another table
///
/// ## Invariants
/// - Every stored count is strictly positive
/// - `total` always equals the sum of `counts`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolDistribution {
	/// Occurrences indexed by the next symbol, in ascending symbol order.
	/// Example: { b'e' => 42, b'a' => 3 }
	counts: BTreeMap<u8, u64>,
	/// Cached sum of `counts`.
	total: u64,
}

impl SymbolDistribution {
	/// Creates an empty distribution.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records one occurrence of `symbol`.
	pub fn increment(&mut self, symbol: u8) {
		self.add(symbol, 1);
	}

	/// Records `count` occurrences of `symbol` at once.
	///
	/// A zero count is ignored so that no zero entry is ever stored.
	pub fn add(&mut self, symbol: u8, count: u64) {
		if count == 0 {
			return;
		}
		*self.counts.entry(symbol).or_insert(0) += count;
		self.total += count;
	}

	/// Raw count of `symbol`, 0 when never observed.
	pub fn count(&self, symbol: u8) -> u64 {
		self.counts.get(&symbol).copied().unwrap_or(0)
	}

	/// Sum of all counts.
	pub fn total(&self) -> u64 {
		self.total
	}

	/// Number of distinct observed symbols.
	pub fn distinct(&self) -> usize {
		self.counts.len()
	}

	/// Largest single count, 0 for an empty distribution.
	pub fn max_count(&self) -> u64 {
		self.counts.values().copied().max().unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.counts.is_empty()
	}

	/// Iterates `(symbol, count)` in ascending symbol order.
	pub fn iter(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
		self.counts.iter().map(|(symbol, count)| (*symbol, *count))
	}

	/// Adds every count of `other` into this distribution.
	pub fn merge(&mut self, other: &Self) {
		for (symbol, count) in other.iter() {
			self.add(symbol, count);
		}
	}

	/// Checks the cached total against the per-symbol counts.
	pub(crate) fn is_consistent(&self) -> bool {
		!self.counts.values().any(|count| *count == 0)
			&& self.counts.values().try_fold(0u64, |acc, c| acc.checked_add(*c)) == Some(self.total)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_increment_updates_total() {
		let mut dist = SymbolDistribution::new();
		dist.increment(b'a');
		dist.increment(b'a');
		dist.increment(b'b');

		assert_eq!(dist.count(b'a'), 2);
		assert_eq!(dist.count(b'b'), 1);
		assert_eq!(dist.count(b'z'), 0);
		assert_eq!(dist.total(), 3);
		assert_eq!(dist.distinct(), 2);
		assert_eq!(dist.max_count(), 2);
		assert!(dist.is_consistent());
	}

	#[test]
	fn test_add_zero_is_ignored() {
		let mut dist = SymbolDistribution::new();
		dist.add(b'x', 0);
		assert!(dist.is_empty());
		assert_eq!(dist.total(), 0);
	}

	#[test]
	fn test_iter_is_ordered() {
		let mut dist = SymbolDistribution::new();
		for symbol in [b'c', b'a', b'b'] {
			dist.increment(symbol);
		}
		let symbols: Vec<u8> = dist.iter().map(|(s, _)| s).collect();
		assert_eq!(symbols, vec![b'a', b'b', b'c']);
	}

	#[test]
	fn test_merge_sums_counts() {
		let mut left = SymbolDistribution::new();
		left.add(b'a', 2);
		let mut right = SymbolDistribution::new();
		right.add(b'a', 3);
		right.add(b'b', 1);

		left.merge(&right);
		assert_eq!(left.count(b'a'), 5);
		assert_eq!(left.count(b'b'), 1);
		assert_eq!(left.total(), 6);
	}
}
