//! Legacy HMDB peak-list text files.
//!
//! These are tab-delimited listings exported from the spectrometer software: a
//! "peaks" table and, optionally, a "multiplets" table, each introduced by a
//! header line starting with `No`.

use crate::error::NmrError;
use crate::providers::nmrml::accession_from_stem;
use crate::providers::single::{MultipletEntry, PeakEntry, SingleSpectrum};
use crate::record::MemoryRecord;

/// First line of a 13C listing.
const CARBON_MARKER: &str = "DUoptxwinnmr";

#[derive(Debug, Default)]
struct TextTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TextTable {
    fn value<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        let position = self
            .columns
            .iter()
            .position(|known| known.eq_ignore_ascii_case(column))?;
        row.get(position).map(String::as_str)
    }
}

pub fn parse(origin: &str, stem: &str, text: &str) -> Result<MemoryRecord, NmrError> {
    let mut spectrum = SingleSpectrum {
        accession: accession_from_stem(stem),
        ..SingleSpectrum::default()
    };
    let lines: Vec<&str> = text.lines().collect();
    if lines.iter().any(|line| line.starts_with(CARBON_MARKER)) {
        spectrum.atom_type = "C".to_string();
        return Ok(spectrum.into_record(origin));
    }

    let peaks_start = marker_line(&lines, "peaks").unwrap_or(0);
    let peaks = read_table(&lines, peaks_start);
    for row in &peaks.rows {
        let Some(shift) = peaks.value(row, "(ppm)") else {
            continue;
        };
        spectrum.peaks.push(PeakEntry {
            shift: shift.to_string(),
            intensity: peaks.value(row, "Height").map(str::to_string),
            ..PeakEntry::default()
        });
    }

    if let Some(start) = marker_line(&lines, "multiplets") {
        let multiplets = read_table(&lines, start);
        for (index, row) in multiplets.rows.iter().enumerate() {
            let (range_min, range_max) = multiplets
                .value(row, "(ppm)")
                .and_then(|range| range.split_once(".."))
                .map(|(low, high)| (Some(low.trim().to_string()), Some(high.trim().to_string())))
                .unwrap_or((None, None));
            spectrum.multiplets.push(MultipletEntry {
                id: (index + 1).to_string(),
                center: multiplets.value(row, "Shift1(ppm)").map(str::to_string),
                range_min,
                range_max,
                atom_ref: multiplets.value(row, "Atom1").map(str::to_string),
                multiplicity: multiplets.value(row, "Type").map(str::to_string),
            });
        }
    }

    Ok(spectrum.into_record(origin))
}

/// Last line mentioning `marker`; preambles may mention both tables.
fn marker_line(lines: &[&str], marker: &str) -> Option<usize> {
    lines
        .iter()
        .rposition(|line| line.to_lowercase().contains(marker))
}

/// Header at the first `No` line after `start`, then every row starting with a digit
/// until the first line that is neither.
fn read_table(lines: &[&str], start: usize) -> TextTable {
    let mut table = TextTable::default();
    for line in lines.iter().skip(start) {
        let line = line.trim_start_matches(' ');
        if line.starts_with("No") {
            if !table.rows.is_empty() {
                break;
            }
            table.columns = cells(line)
                .into_iter()
                .map(|cell| cell.replace(' ', ""))
                .collect();
        } else if line.starts_with(|ch: char| ch.is_ascii_digit()) {
            if !table.columns.is_empty() {
                table.rows.push(cells(line));
            }
        } else if !table.rows.is_empty() {
            break;
        }
    }
    table
}

fn cells(line: &str) -> Vec<String> {
    line.split('\t')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}
