/// Errors produced by the finite-context model.
///
/// Configuration errors are raised before any training, scoring or
/// generation takes place. Unknown contexts, malformed persisted records
/// and degenerate generation are *not* errors: they are reported through
/// `Generation` and `LoadReport`.
#[derive(Debug, thiserror::Error)]
pub enum FcmError {
	#[error("context order must be >= 1")]
	InvalidOrder,

	#[error("smoothing constant must be finite and >= 0, got {0}")]
	InvalidAlpha(f64),

	#[error("alphabet size must be >= 1")]
	InvalidAlphabetSize,

	#[error("prior must be exactly {expected} symbols long, got {actual}")]
	PriorLength { expected: usize, actual: usize },

	#[error("context must be exactly {expected} symbols long, got {actual}")]
	ContextLength { expected: usize, actual: usize },

	#[error("model order mismatch: expected {expected}, got {actual}")]
	OrderMismatch { expected: usize, actual: usize },

	#[error("repetition guard window must be >= 2, got {0}")]
	InvalidGuard(usize),

	#[error("symbol at position {position} has zero probability (alpha = 0)")]
	ZeroProbability { position: usize },

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("CSV write error")]
	Csv(#[from] csv::Error),

	#[error("snapshot encoding error")]
	Snapshot(#[from] postcard::Error),

	#[error("corrupt snapshot: {0}")]
	CorruptSnapshot(String),
}

pub type Result<T> = std::result::Result<T, FcmError>;
