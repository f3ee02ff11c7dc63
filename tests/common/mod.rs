#![allow(dead_code)]

use nmr_normalizer::assembler::names;
use nmr_normalizer::record::{Loop, MemoryRecord, TagTable};

/// One proton peak list `1` measured in experiment `E1` on sample `S1`.
pub fn proton_record(title: &str, shifts: &[&str], intensities: &[&str]) -> MemoryRecord {
    let mut shift_table = Loop::new(names::SHIFT, &[names::CHEM_SHIFT, names::PEAK_LIST_ID]);
    for shift in shifts {
        shift_table.push_row(vec![shift.to_string(), "1".to_string()]);
    }
    let mut intensity_table =
        Loop::new(names::INTENSITY, &[names::INTENSITY_VAL, names::PEAK_LIST_ID]);
    for intensity in intensities {
        intensity_table.push_row(vec![intensity.to_string(), "1".to_string()]);
    }

    MemoryRecord::new(title)
        .with_tag("Entry.Title", title)
        .with_saveframe(
            TagTable::new(names::PEAK_LIST_FRAME, names::PEAK_LIST_PREFIX)
                .with_tag("ID", "1")
                .with_tag("Experiment_ID", "E1")
                .with_tag("Sample_ID", "S1"),
        )
        .with_loop(
            Loop::new(names::DIMENSION, &["ID", names::ATOM_TYPE, names::PEAK_LIST_ID])
                .with_row(&["1", "H", "1"]),
        )
        .with_loop(shift_table)
        .with_loop(intensity_table)
        .with_loop(
            Loop::new(
                names::SAMPLE_COMPONENT,
                &["Sample_ID", "Type", "Mol_common_name", "Concentration_val"],
            )
            .with_row(&["S1", "Solute", title, "5.0"]),
        )
        .with_loop(Loop::new(names::EXPERIMENT, &["ID", "Name"]).with_row(&["E1", "1D 1H"]))
}

pub fn glucose() -> MemoryRecord {
    proton_record("Glucose", &["1.23", "2.45"], &["100.0", "50.0"])
}
