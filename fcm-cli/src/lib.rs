//! Shared glue for the `fcm` binaries.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fcm_core::io::write_atomic;
use fcm_core::{FcmError, FiniteContextModel, persist};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a stderr `fmt` subscriber filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info".into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();
}

/// Output files rendered in memory and written together at the end.
///
/// Nothing touches the disk until [`commit`](Self::commit), so a failure
/// while building any output leaves no file behind.
#[derive(Default)]
pub struct PendingWrites {
	files: Vec<(PathBuf, Vec<u8>)>,
}

impl PendingWrites {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queues `bytes` to be written to `path`.
	pub fn push<P: Into<PathBuf>>(&mut self, path: P, bytes: Vec<u8>) {
		self.files.push((path.into(), bytes));
	}

	/// Writes every queued file atomically, in queue order.
	pub fn commit(self) -> Result<()> {
		for (path, bytes) in self.files {
			write_atomic(&path, &bytes).with_context(|| format!("Failed to write {}", path.display()))?;
			tracing::info!("Wrote {} ({} bytes)", path.display(), bytes.len());
		}
		Ok(())
	}
}

/// Loads a model for generation.
///
/// A `.bin` extension selects a snapshot, anything else the text records.
/// `alpha` from the command line wins over a snapshot's stored value (with a
/// warning when they differ); a snapshot's alphabet size is kept.
pub fn load_model(path: &Path, order: usize, alpha: f64) -> Result<FiniteContextModel> {
	let (table, alphabet_size) = if path.extension().is_some_and(|ext| ext == "bin") {
		let snapshot = FiniteContextModel::load_snapshot(path)
			.with_context(|| format!("Error opening model file {}", path.display()))?;
		if snapshot.order() != order {
			return Err(FcmError::OrderMismatch { expected: order, actual: snapshot.order() }.into());
		}
		if snapshot.alpha() != alpha {
			tracing::warn!(
				"Snapshot {} was saved with alpha {}, using -a {} instead",
				path.display(),
				snapshot.alpha(),
				alpha
			);
		}
		let alphabet_size = snapshot.alphabet_size();
		(snapshot.into_table(), Some(alphabet_size))
	} else {
		let report = persist::load_table(path, order)
			.with_context(|| format!("Error opening model file {}", path.display()))?;
		if report.skipped > 0 {
			tracing::warn!("{} malformed records skipped while loading {}", report.skipped, path.display());
		}
		(report.table, None)
	};

	if table.is_empty() {
		tracing::warn!("Model {} has no contexts, every step will use the fallback", path.display());
	}
	let model = FiniteContextModel::from_table(table, alpha)?;
	Ok(match alphabet_size {
		Some(size) => model.with_alphabet_size(size)?,
		None => model,
	})
}
