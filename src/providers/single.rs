//! Record layout for sources that describe exactly one 1D spectrum of one sample.
//!
//! HMDB files carry no peak-list, sample or experiment framing of their own, so
//! their adapters fill a [`SingleSpectrum`] and let it lay out the categories
//! with a single peak list, sample, experiment and spectrometer, all with ID `1`.

use crate::assembler::names;
use crate::record::{Loop, MemoryRecord, TagTable};

const FRAME_ID: &str = "1";
const EMPTY: &str = ".";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakEntry {
    pub shift: String,
    pub intensity: Option<String>,
    pub width: Option<String>,
    pub multiplet: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipletEntry {
    pub id: String,
    pub center: Option<String>,
    pub range_min: Option<String>,
    pub range_max: Option<String>,
    pub atom_ref: Option<String>,
    pub multiplicity: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SingleSpectrum {
    pub accession: Option<String>,
    /// Atom type of the acquisition nucleus: `H`, `C`, ...
    pub atom_type: String,
    pub frequency: Option<String>,
    pub ph: Option<String>,
    pub temperature: Option<String>,
    pub temperature_units: Option<String>,
    pub amount: Option<String>,
    pub amount_units: Option<String>,
    pub reference: Option<String>,
    pub solvent: Option<String>,
    pub peaks: Vec<PeakEntry>,
    pub multiplets: Vec<MultipletEntry>,
}

impl Default for SingleSpectrum {
    fn default() -> Self {
        Self {
            accession: None,
            atom_type: "H".to_string(),
            frequency: None,
            ph: None,
            temperature: None,
            temperature_units: None,
            amount: None,
            amount_units: None,
            reference: None,
            solvent: None,
            peaks: Vec::new(),
            multiplets: Vec::new(),
        }
    }
}

fn or_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(EMPTY)
}

/// Maps an nmrML/HMDB nucleus label (`1H`, `hydrogen`, `13C`) to an atom type.
pub fn atom_type(nucleus: &str) -> String {
    let trimmed = nucleus.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "hydrogen" | "proton" => return "H".to_string(),
        "carbon" => return "C".to_string(),
        _ => {}
    }
    let letters: String = trimmed.chars().filter(|ch| ch.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        EMPTY.to_string()
    } else {
        letters
    }
}

impl SingleSpectrum {
    pub fn into_record(self, origin: &str) -> MemoryRecord {
        let mut record = MemoryRecord::new(origin);
        if let Some(accession) = &self.accession {
            record.push_tag("Entry.ID", accession);
        }

        record.push_saveframe(
            TagTable::new(names::PEAK_LIST_FRAME, names::PEAK_LIST_PREFIX)
                .with_tag("ID", FRAME_ID)
                .with_tag("Experiment_ID", FRAME_ID)
                .with_tag("Sample_ID", FRAME_ID),
        );
        record.push_loop(
            Loop::new(names::DIMENSION, &["ID", names::ATOM_TYPE, names::PEAK_LIST_ID])
                .with_row(&["1", self.atom_type.as_str(), FRAME_ID]),
        );

        if !self.peaks.is_empty() {
            let mut shifts = Loop::new(
                names::SHIFT,
                &[
                    "Spectral_transition_ID",
                    names::CHEM_SHIFT,
                    names::LINE_WIDTH,
                    names::MULTIPLET_ID,
                    names::PEAK_LIST_ID,
                ],
            );
            let mut intensities = Loop::new(
                names::INTENSITY,
                &["Spectral_transition_ID", names::INTENSITY_VAL, names::PEAK_LIST_ID],
            );
            for (index, peak) in self.peaks.iter().enumerate() {
                let id = (index + 1).to_string();
                shifts.push_row(vec![
                    id.clone(),
                    peak.shift.clone(),
                    or_empty(&peak.width).to_string(),
                    or_empty(&peak.multiplet).to_string(),
                    FRAME_ID.to_string(),
                ]);
                intensities.push_row(vec![
                    id,
                    or_empty(&peak.intensity).to_string(),
                    FRAME_ID.to_string(),
                ]);
            }
            record.push_loop(shifts);
            record.push_loop(intensities);
        }

        if !self.multiplets.is_empty() {
            let mut multiplets = Loop::new(
                names::MULTIPLET,
                &[
                    "ID",
                    "Center",
                    "Range_min",
                    "Range_max",
                    "Atom_ref",
                    "Multiplicity",
                    names::PEAK_LIST_ID,
                ],
            );
            for multiplet in &self.multiplets {
                multiplets.push_row(vec![
                    multiplet.id.clone(),
                    or_empty(&multiplet.center).to_string(),
                    or_empty(&multiplet.range_min).to_string(),
                    or_empty(&multiplet.range_max).to_string(),
                    or_empty(&multiplet.atom_ref).to_string(),
                    or_empty(&multiplet.multiplicity).to_string(),
                    FRAME_ID.to_string(),
                ]);
            }
            record.push_loop(multiplets);
        }

        // The solute row is always present so the sample exists even without a concentration.
        let mut components = Loop::new(
            names::SAMPLE_COMPONENT,
            &[
                "Sample_ID",
                "Type",
                "Mol_common_name",
                "Concentration_val",
                "Concentration_val_units",
            ],
        );
        components.push_row(vec![
            FRAME_ID.to_string(),
            "Solute".to_string(),
            EMPTY.to_string(),
            or_empty(&self.amount).to_string(),
            or_empty(&self.amount_units).to_string(),
        ]);
        if let Some(reference) = &self.reference {
            components.push_row(vec![
                FRAME_ID.to_string(),
                "Reference".to_string(),
                reference.clone(),
            ]);
        }
        if let Some(solvent) = &self.solvent {
            components.push_row(vec![
                FRAME_ID.to_string(),
                "Solvent".to_string(),
                solvent.clone(),
            ]);
        }
        record.push_loop(components);

        let mut conditions = Loop::new(
            names::SAMPLE_CONDITION,
            &[names::CONDITION_LIST_ID, "Type", "Val", "Val_units"],
        );
        if let Some(ph) = &self.ph {
            conditions.push_row(vec![
                names::PRIMARY_CONDITION_LIST.to_string(),
                "pH".to_string(),
                ph.clone(),
                "pH".to_string(),
            ]);
        }
        if let Some(temperature) = &self.temperature {
            conditions.push_row(vec![
                names::PRIMARY_CONDITION_LIST.to_string(),
                "temperature".to_string(),
                temperature.clone(),
                or_empty(&self.temperature_units).to_string(),
            ]);
        }
        if !conditions.is_empty() {
            record.push_loop(conditions);
        }

        record.push_loop(
            Loop::new(names::EXPERIMENT, &["ID", "Name", "NMR_spectrometer_ID", "Sample_ID"])
                .with_row(&[FRAME_ID, "1D 1H", FRAME_ID, FRAME_ID]),
        );
        record.push_saveframe(
            TagTable::new(names::SPECTROMETER_FRAME, "NMR_spectrometer")
                .with_tag("ID", FRAME_ID)
                .with_tag("Field_strength", or_empty(&self.frequency)),
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordSource;

    #[test]
    fn nucleus_labels_map_to_atom_types() {
        assert_eq!(atom_type("1H"), "H");
        assert_eq!(atom_type("13C"), "C");
        assert_eq!(atom_type("hydrogen"), "H");
        assert_eq!(atom_type(""), ".");
    }

    #[test]
    fn layout_links_everything_to_one_peak_list() {
        let record = SingleSpectrum {
            accession: Some("HMDB0000001".to_string()),
            frequency: Some("500".to_string()),
            peaks: vec![PeakEntry {
                shift: "7.05".to_string(),
                intensity: Some("0.9".to_string()),
                ..PeakEntry::default()
            }],
            ..SingleSpectrum::default()
        }
        .into_record("mem");

        let frames = record.get_saveframe_tags(names::PEAK_LIST_FRAME);
        assert_eq!(frames[0].get("Sample_ID"), Some("1"));
        assert_eq!(record.get_loops(names::SHIFT)[0].len(), 1);
        assert_eq!(record.get_tag("NMR_spectrometer.Field_strength"), vec!["500".to_string()]);
        assert!(record.get_loops(names::SAMPLE_CONDITION).is_empty());
    }
}
