use roxmltree::{Document, Node};

use crate::error::NmrError;
use crate::providers::single::{MultipletEntry, PeakEntry, SingleSpectrum, atom_type};
use crate::record::MemoryRecord;

/// Parses an nmrML document. `stem` is the file name without extension,
/// `<accession>_<spectrum>_<nucleus>` for HMDB exports.
pub fn parse(origin: &str, stem: &str, text: &str) -> Result<MemoryRecord, NmrError> {
    let document = Document::parse(text).map_err(|err| NmrError::malformed(origin, err))?;
    let root = document.root_element();
    if !root.has_tag_name("nmrML") {
        return Err(NmrError::malformed(
            origin,
            format!("root element is {}, expected nmrML", root.tag_name().name()),
        ));
    }

    let mut spectrum = SingleSpectrum {
        accession: accession_from_stem(stem),
        reference: first_attribute(root, "chemicalShiftStandard", "name"),
        frequency: first_attribute(root, "effectiveExcitationField", "value"),
        ..SingleSpectrum::default()
    };
    if let Some(nucleus) = first_attribute(root, "acquisitionNucleus", "name") {
        spectrum.atom_type = atom_type(&nucleus);
    }

    for (index, node) in root
        .descendants()
        .filter(|node| node.has_tag_name("multiplet"))
        .enumerate()
    {
        let id = (index + 1).to_string();
        spectrum.multiplets.push(MultipletEntry {
            id: id.clone(),
            center: node.attribute("center").map(str::to_string),
            atom_ref: child_attribute(node, "atoms", "atomRefs"),
            multiplicity: child_attribute(node, "multiplicity", "name"),
            ..MultipletEntry::default()
        });
        for peak in node.descendants().filter(|peak| peak.has_tag_name("peak")) {
            let Some(center) = peak.attribute("center") else {
                continue;
            };
            spectrum.peaks.push(PeakEntry {
                shift: center.to_string(),
                intensity: peak.attribute("amplitude").map(str::to_string),
                width: peak.attribute("width").map(str::to_string),
                multiplet: Some(id.clone()),
            });
        }
    }

    Ok(spectrum.into_record(origin))
}

/// Spectrum number embedded in an HMDB file stem, used to find the companion XML.
pub fn spectrum_number(stem: &str) -> Option<String> {
    let parts: Vec<&str> = stem.split('_').collect();
    (parts.len() >= 3)
        .then(|| parts[parts.len() - 2])
        .filter(|part| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit()))
        .map(str::to_string)
}

pub fn accession_from_stem(stem: &str) -> Option<String> {
    stem.split('_')
        .next()
        .filter(|accession| !accession.is_empty())
        .map(str::to_string)
}

fn first_attribute(root: Node, tag: &str, attribute: &str) -> Option<String> {
    root.descendants()
        .filter(|node| node.has_tag_name(tag))
        .find_map(|node| node.attribute(attribute))
        .map(str::to_string)
}

fn child_attribute(node: Node, tag: &str, attribute: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.attribute(attribute))
        .map(str::to_string)
}
