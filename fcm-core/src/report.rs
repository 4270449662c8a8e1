//! Tabular reports for external inspection (plotting, spreadsheets).

use std::fmt::Write as _;
use std::io::Write;

use crate::error::Result;
use crate::model::context_table::ContextTable;
use crate::model::fcm_model::PositionInfo;
use crate::persist::escape;

/// Writes `context,symbol,count` rows for every record of `table`.
///
/// No header row: the file is read positionally (`header=None`).
/// Context and symbol bytes go through [`escape`], quoting is left to `csv`.
pub fn write_counts_csv<W: Write>(table: &ContextTable, writer: W) -> Result<()> {
	let mut wrt = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
	for (context, symbol, count) in table.records() {
		wrt.write_record([escape(context), escape(&[symbol]), count.to_string()])?;
	}
	wrt.flush()?;
	Ok(())
}

/// Writes `position,symbol,bits` rows for a per-position score series.
pub fn write_positions_csv<W: Write>(positions: &[PositionInfo], writer: W) -> Result<()> {
	let mut wrt = csv::WriterBuilder::new().from_writer(writer);
	wrt.write_record(["position", "symbol", "bits"])?;
	for info in positions {
		wrt.write_record([
			info.position.to_string(),
			escape(&[info.symbol]),
			format!("{:.6}", info.bits),
		])?;
	}
	wrt.flush()?;
	Ok(())
}

/// Human-readable listing, one context per line: `ab: c=2 d=1`.
pub fn dump(table: &ContextTable) -> String {
	let mut out = String::new();
	for (context, dist) in table.contexts() {
		let _ = write!(out, "{}:", escape(context));
		for (symbol, count) in dist.iter() {
			let _ = write!(out, " {}={}", escape(&[symbol]), count);
		}
		out.push('\n');
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_table() -> ContextTable {
		let mut table = ContextTable::new(2).unwrap();
		table.add_count(b"a,", b'"', 2).unwrap();
		table.add_count(b"ab", b'c', 3).unwrap();
		table.add_count(b"ab", b'\n', 1).unwrap();
		table
	}

	#[test]
	fn test_counts_csv() {
		let mut out = Vec::new();
		write_counts_csv(&sample_table(), &mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		assert_eq!(text, "\"a,\",\"\"\"\",2\nab,\\n,1\nab,c,3\n");
	}

	#[test]
	fn test_counts_csv_starts_with_data_row() {
		let mut table = ContextTable::new(1).unwrap();
		table.increment(b"a", b'b').unwrap();
		let mut out = Vec::new();
		write_counts_csv(&table, &mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		assert_eq!(text.lines().next(), Some("a,b,1"));
		assert_eq!(text.lines().count(), 1);
	}

	#[test]
	fn test_counts_csv_reads_back() {
		let mut out = Vec::new();
		write_counts_csv(&sample_table(), &mut out).unwrap();
		let mut rdr = csv::ReaderBuilder::new().has_headers(false).from_reader(out.as_slice());
		let rows: Vec<Vec<String>> = rdr
			.records()
			.map(|record| record.unwrap().iter().map(str::to_owned).collect())
			.collect();
		assert_eq!(rows.len(), 3);
		assert_eq!(rows[0], vec!["a,", "\"", "2"]);
		assert_eq!(rows[1], vec!["ab", "\\n", "1"]);
	}

	#[test]
	fn test_positions_csv() {
		let positions = vec![
			PositionInfo { position: 1, symbol: b'a', bits: 0.5 },
			PositionInfo { position: 2, symbol: b',', bits: 1.25 },
		];
		let mut out = Vec::new();
		write_positions_csv(&positions, &mut out).unwrap();
		let text = String::from_utf8(out).unwrap();
		assert_eq!(text, "position,symbol,bits\n1,a,0.500000\n2,\",\",1.250000\n");
	}

	#[test]
	fn test_dump() {
		assert_eq!(dump(&sample_table()), "a,: \"=2\nab: \\n=1 c=3\n");
	}
}
