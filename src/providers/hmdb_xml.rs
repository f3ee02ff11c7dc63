use roxmltree::{Document, Node};

use crate::error::NmrError;
use crate::providers::single::{PeakEntry, SingleSpectrum, atom_type};
use crate::record::MemoryRecord;

/// Parses an HMDB `nmr-one-d` spectrum document.
pub fn parse(origin: &str, text: &str) -> Result<MemoryRecord, NmrError> {
    let document = Document::parse(text).map_err(|err| NmrError::malformed(origin, err))?;
    let root = document.root_element();
    if !root.has_tag_name("nmr-one-d") {
        return Err(NmrError::malformed(
            origin,
            format!("root element is {}, expected nmr-one-d", root.tag_name().name()),
        ));
    }

    let mut spectrum = SingleSpectrum {
        accession: element_text(root, "database-id"),
        frequency: element_text(root, "frequency").map(|value| leading_number(&value)),
        ph: element_text(root, "sample-ph"),
        temperature: element_text(root, "sample-temperature"),
        temperature_units: element_text(root, "sample-temperature-units"),
        amount: element_text(root, "sample-concentration"),
        amount_units: element_text(root, "sample-concentration-units"),
        reference: element_text(root, "chemical-shift-reference"),
        solvent: element_text(root, "solvent"),
        ..SingleSpectrum::default()
    };
    if let Some(nucleus) = element_text(root, "nucleus") {
        spectrum.atom_type = atom_type(&nucleus);
    }

    for peak in root
        .descendants()
        .filter(|node| node.has_tag_name("nmr-one-d-peak"))
    {
        let Some(shift) = element_text(peak, "chemical-shift") else {
            continue;
        };
        spectrum.peaks.push(PeakEntry {
            shift,
            intensity: element_text(peak, "intensity"),
            ..PeakEntry::default()
        });
    }

    Ok(spectrum.into_record(origin))
}

/// Trimmed text of the first descendant named `tag`, if it has any.
fn element_text(node: Node, tag: &str) -> Option<String> {
    node.descendants()
        .filter(|child| child.has_tag_name(tag))
        .find_map(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// `"500 MHz"` -> `"500"`.
fn leading_number(value: &str) -> String {
    let numeric: String = value
        .trim()
        .chars()
        .take_while(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect();
    if numeric.is_empty() {
        value.trim().to_string()
    } else {
        numeric
    }
}
