use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::distribution::SymbolDistribution;
use crate::error::{FcmError, Result};

/// Mapping from fixed-length contexts to the symbols observed after them.
///
/// # Responsibilities
/// - Accumulate counts for `(context, symbol)` pairs
/// - Answer lookups, returning `None` for never-observed contexts
/// - Enumerate every record in a deterministic order
/// - Merge with another table of the same order
///
/// # Invariants
/// - `order` is always >= 1
/// - Every key in `contexts` is exactly `order` bytes long
/// - Every stored distribution is non-empty
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContextTable {
	/// Context length `k`.
	order: usize,

	/// Mapping from a context (length `order`) to its distribution.
	contexts: BTreeMap<Vec<u8>, SymbolDistribution>,
}

impl ContextTable {
	/// Creates an empty table for contexts of `order` symbols.
	///
	/// # Errors
	/// Returns an error if `order == 0`.
	pub fn new(order: usize) -> Result<Self> {
		if order == 0 {
			return Err(FcmError::InvalidOrder);
		}
		Ok(Self { order, contexts: BTreeMap::new() })
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Number of distinct contexts.
	pub fn len(&self) -> usize {
		self.contexts.len()
	}

	pub fn is_empty(&self) -> bool {
		self.contexts.is_empty()
	}

	/// Increments the count of `symbol` after `context` by one.
	///
	/// # Errors
	/// Returns an error if `context` is not exactly `order` bytes long.
	pub fn increment(&mut self, context: &[u8], symbol: u8) -> Result<()> {
		self.add_count(context, symbol, 1)
	}

	/// Adds `count` occurrences of `symbol` after `context`.
	///
	/// Zero counts leave the table untouched.
	///
	/// # Errors
	/// Returns an error if `context` is not exactly `order` bytes long.
	pub fn add_count(&mut self, context: &[u8], symbol: u8, count: u64) -> Result<()> {
		self.check_context(context)?;
		self.insert(context, symbol, count);
		Ok(())
	}

	/// Counts the last symbol of `window` after its first `order` symbols.
	///
	/// `window` must be exactly `order + 1` bytes, as produced by
	/// `text.windows(order + 1)`.
	pub(crate) fn observe(&mut self, window: &[u8]) {
		debug_assert_eq!(window.len(), self.order + 1);
		let (context, symbol) = window.split_at(self.order);
		self.insert(context, symbol[0], 1);
	}

	fn insert(&mut self, context: &[u8], symbol: u8, count: u64) {
		if count == 0 {
			return;
		}
		// Only allocate a key the first time a context is seen
		match self.contexts.get_mut(context) {
			Some(dist) => dist.add(symbol, count),
			None => {
				let mut dist = SymbolDistribution::new();
				dist.add(symbol, count);
				self.contexts.insert(context.to_vec(), dist);
			}
		}
	}

	/// Returns the distribution observed after `context`, if any.
	pub fn lookup(&self, context: &[u8]) -> Option<&SymbolDistribution> {
		self.contexts.get(context)
	}

	/// Cached total count for `context`, 0 when unknown.
	pub fn context_total(&self, context: &[u8]) -> u64 {
		self.lookup(context).map_or(0, SymbolDistribution::total)
	}

	/// Sum of every count in the table.
	pub fn total_count(&self) -> u64 {
		self.contexts.values().map(SymbolDistribution::total).sum()
	}

	/// Iterates over `(context, distribution)` in ascending context order.
	pub fn contexts(&self) -> impl Iterator<Item = (&[u8], &SymbolDistribution)> {
		self.contexts.iter().map(|(context, dist)| (context.as_slice(), dist))
	}

	/// Flattens the table into `(context, symbol, count)` records,
	/// ordered by context then symbol.
	pub fn records(&self) -> impl Iterator<Item = (&[u8], u8, u64)> {
		self.contexts().flat_map(|(context, dist)| {
			dist.iter().map(move |(symbol, count)| (context, symbol, count))
		})
	}

	/// Merges another table into this one.
	///
	/// # Notes
	/// - Both tables must have the same order.
	/// - Counts for matching contexts and symbols are summed.
	///
	/// # Errors
	/// Returns an error if the orders do not match.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.order != other.order {
			return Err(FcmError::OrderMismatch { expected: self.order, actual: other.order });
		}

		for (context, dist) in &other.contexts {
			if let Some(existing) = self.contexts.get_mut(context) {
				existing.merge(dist);
			} else {
				self.contexts.insert(context.clone(), dist.clone());
			}
		}

		Ok(())
	}

	/// Verifies the structural invariants, used after decoding a snapshot.
	pub(crate) fn validate(&self) -> std::result::Result<(), String> {
		if self.order == 0 {
			return Err("order is 0".to_owned());
		}
		for (context, dist) in &self.contexts {
			if context.len() != self.order {
				return Err(format!("context of length {} in a table of order {}", context.len(), self.order));
			}
			if dist.is_empty() || !dist.is_consistent() {
				return Err(format!("inconsistent counts for context {:?}", context));
			}
		}
		Ok(())
	}

	fn check_context(&self, context: &[u8]) -> Result<()> {
		if context.len() != self.order {
			return Err(FcmError::ContextLength { expected: self.order, actual: context.len() });
		}
		Ok(())
	}
}
