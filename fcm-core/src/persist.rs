//! Text persistence of a `ContextTable`.
//!
//! One record per line: `CONTEXT\tSYMBOL\tCOUNT`. Context and symbol bytes
//! are escaped so that neither can contain the field or record separator:
//!
//! | byte                       | written as |
//! |----------------------------|------------|
//! | `\`                        | `\\`       |
//! | TAB                        | `\t`       |
//! | LF                         | `\n`       |
//! | CR                         | `\r`       |
//! | other bytes outside 0x20..=0x7E | `\xHH` |
//!
//! Space is printable and written as is. Loading is tolerant: malformed
//! lines are skipped, logged and counted in [`LoadReport::skipped`].

use std::io::{BufRead, Write};
use std::path::Path;

use crate::error::Result;
use crate::model::context_table::ContextTable;

const FIELD_SEPARATOR: u8 = b'\t';

/// Outcome of loading a persisted table.
#[derive(Debug)]
pub struct LoadReport {
	pub table: ContextTable,
	/// Number of well-formed records loaded.
	pub loaded: usize,
	/// Number of malformed lines that were skipped.
	pub skipped: usize,
}

/// Why a persisted line was rejected.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
	#[error("expected 3 tab-separated fields, found {0}")]
	FieldCount(usize),

	#[error("invalid escape sequence in {0}")]
	Escape(&'static str),

	#[error("context decodes to {actual} symbols, expected {expected}")]
	ContextLength { expected: usize, actual: usize },

	#[error("symbol decodes to {0} bytes, expected 1")]
	SymbolLength(usize),

	#[error("count is not a positive integer")]
	Count,
}

/// Escapes `bytes` into `out` following the module-level table.
pub fn escape_into(bytes: &[u8], out: &mut Vec<u8>) {
	for &byte in bytes {
		match byte {
			b'\\' => out.extend_from_slice(b"\\\\"),
			b'\t' => out.extend_from_slice(b"\\t"),
			b'\n' => out.extend_from_slice(b"\\n"),
			b'\r' => out.extend_from_slice(b"\\r"),
			0x20..=0x7E => out.push(byte),
			_ => {
				out.extend_from_slice(b"\\x");
				out.push(hex_digit(byte >> 4));
				out.push(hex_digit(byte & 0x0F));
			}
		}
	}
}

/// Escapes `bytes` into a printable ASCII string.
pub fn escape(bytes: &[u8]) -> String {
	let mut out = Vec::with_capacity(bytes.len());
	escape_into(bytes, &mut out);
	// Escaped output is printable ASCII only
	String::from_utf8_lossy(&out).into_owned()
}

/// Reverses [`escape`]. Returns `None` on a dangling or unknown escape.
pub fn unescape(field: &[u8]) -> Option<Vec<u8>> {
	let mut out = Vec::with_capacity(field.len());
	let mut bytes = field.iter().copied();
	while let Some(byte) = bytes.next() {
		if byte != b'\\' {
			out.push(byte);
			continue;
		}
		match bytes.next()? {
			b'\\' => out.push(b'\\'),
			b't' => out.push(b'\t'),
			b'n' => out.push(b'\n'),
			b'r' => out.push(b'\r'),
			b'x' => {
				let high = hex_value(bytes.next()?)?;
				let low = hex_value(bytes.next()?)?;
				out.push(high << 4 | low);
			}
			_ => return None,
		}
	}
	Some(out)
}

fn hex_digit(nibble: u8) -> u8 {
	b"0123456789abcdef"[nibble as usize]
}

fn hex_value(digit: u8) -> Option<u8> {
	match digit {
		b'0'..=b'9' => Some(digit - b'0'),
		b'a'..=b'f' => Some(digit - b'a' + 10),
		b'A'..=b'F' => Some(digit - b'A' + 10),
		_ => None,
	}
}

/// Writes every record of `table` to `writer`, one per line.
pub fn write_records<W: Write>(table: &ContextTable, writer: &mut W) -> Result<usize> {
	let mut line = Vec::new();
	let mut written = 0;
	for (context, symbol, count) in table.records() {
		line.clear();
		escape_into(context, &mut line);
		line.push(FIELD_SEPARATOR);
		escape_into(&[symbol], &mut line);
		line.push(FIELD_SEPARATOR);
		line.extend_from_slice(count.to_string().as_bytes());
		line.push(b'\n');
		writer.write_all(&line)?;
		written += 1;
	}
	writer.flush()?;
	Ok(written)
}

/// Serializes `table` and writes it to `path` in one step.
pub fn save_table<P: AsRef<Path>>(table: &ContextTable, path: P) -> Result<usize> {
	let mut buffer = Vec::new();
	let written = write_records(table, &mut buffer)?;
	crate::io::write_atomic(&path, &buffer)?;
	tracing::info!("Saved {} records to {:?}", written, path.as_ref());
	Ok(written)
}

/// Parses one persisted line into `(context, symbol, count)`.
pub fn parse_record(line: &[u8], order: usize) -> std::result::Result<(Vec<u8>, u8, u64), RecordError> {
	let fields: Vec<&[u8]> = line.split(|byte| *byte == FIELD_SEPARATOR).collect();
	if fields.len() != 3 {
		return Err(RecordError::FieldCount(fields.len()));
	}

	let context = unescape(fields[0]).ok_or(RecordError::Escape("context"))?;
	if context.len() != order {
		return Err(RecordError::ContextLength { expected: order, actual: context.len() });
	}

	let symbol = unescape(fields[1]).ok_or(RecordError::Escape("symbol"))?;
	let [symbol] = symbol[..] else {
		return Err(RecordError::SymbolLength(symbol.len()));
	};

	let count = std::str::from_utf8(fields[2])
		.ok()
		.and_then(|s| s.parse::<u64>().ok())
		.filter(|count| *count > 0)
		.ok_or(RecordError::Count)?;

	Ok((context, symbol, count))
}

/// Loads a table of `order` from a persisted record stream.
///
/// # Behavior
/// - Blank lines are ignored.
/// - Malformed lines are skipped with a warning and counted.
/// - Repeated `(context, symbol)` records add up.
///
/// # Errors
/// Returns an error on I/O failure or if `order == 0`.
pub fn read_records<R: BufRead>(reader: R, order: usize) -> Result<LoadReport> {
	let mut table = ContextTable::new(order)?;
	let mut loaded = 0;
	let mut skipped = 0;

	for (index, line) in reader.split(b'\n').enumerate() {
		let mut line = line?;
		if line.last() == Some(&b'\r') {
			line.pop();
		}
		if line.is_empty() {
			continue;
		}

		match parse_record(&line, order) {
			Ok((context, symbol, count)) => {
				table.add_count(&context, symbol, count)?;
				loaded += 1;
			}
			Err(e) => {
				tracing::warn!("Skipping line {}: {}", index + 1, e);
				skipped += 1;
			}
		}
	}

	Ok(LoadReport { table, loaded, skipped })
}

/// Opens `path` and loads it with [`read_records`].
pub fn load_table<P: AsRef<Path>>(path: P, order: usize) -> Result<LoadReport> {
	let reader = crate::io::open_reader(&path)?;
	let report = read_records(reader, order)?;
	tracing::info!(
		"Loaded {} records from {:?} ({} skipped)",
		report.loaded,
		path.as_ref(),
		report.skipped
	);
	Ok(report)
}
