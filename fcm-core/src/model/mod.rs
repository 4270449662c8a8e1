//! Top-level module for the finite-context model.
//!
//! This module provides:
//! - Per-context symbol counts (`SymbolDistribution`)
//! - The context → distribution table (`ContextTable`)
//! - Training and scoring (`FiniteContextModel`)
//! - Generation parameters (`GenerationInput`)
//! - Sequence generation under two sampling policies (`Sampler`)

/// Observed symbol counts for one context, with a cached total.
pub mod distribution;

/// Fixed-order table mapping contexts to their symbol distributions.
///
/// Supports counting, lookup, ordered record enumeration and merging.
pub mod context_table;

/// Model of order `k` with additive smoothing.
///
/// Handles training, smoothed probabilities, self-information,
/// average information content and binary snapshots.
pub mod fcm_model;

/// Validated generation parameters: length, policy, fallback symbol
/// and repetition guard.
pub mod generation_input;

/// Sliding-window generation loop with max-frequency and
/// probability-weighted policies over an injected random source.
pub mod sampler;
