//! Finite-context statistical model over byte sequences.
//!
//! This crate provides:
//! - Fixed-order context counting with additive (Laplace-style) smoothing
//! - Average information content ("surprise") of a text under a model
//! - Text generation by sampling the learned conditional distributions
//! - Persistence: escaped text records, binary snapshots and CSV reports

/// Core model types, training, scoring and sampling.
pub mod model;

/// Escaped, tab-separated text records for a `ContextTable`.
pub mod persist;

/// CSV reports and human-readable listings.
pub mod report;

/// Error taxonomy shared by the whole crate.
pub mod error;

/// I/O utilities (file loading, output paths, atomic writes).
pub mod io;

pub use error::{FcmError, Result};
pub use model::context_table::ContextTable;
pub use model::distribution::SymbolDistribution;
pub use model::fcm_model::{ALPHABET_SIZE, FiniteContextModel, PositionInfo, Score};
pub use model::generation_input::{GenerationInput, Policy};
pub use model::sampler::{Draw, Generation, Sampler, StopReason};
pub use persist::LoadReport;
