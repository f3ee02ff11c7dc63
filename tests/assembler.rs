mod common;

use nmr_normalizer::assembler::{AssemblerOptions, SpectralAssembler, names};
use nmr_normalizer::error::RejectReason;
use nmr_normalizer::record::{Loop, MemoryRecord, TagTable};

use common::{glucose, proton_record};

#[test]
fn paired_tables_produce_one_sample_and_spectrum() {
    let assembly = SpectralAssembler::default().assemble(&glucose()).unwrap();
    assert_eq!(assembly.samples.len(), 1);

    let sample = &assembly.samples[0];
    assert_eq!(sample.source_sample_id, "S1");
    assert_eq!(sample.amount, Some(5.0));
    assert_eq!(sample.spectra.len(), 1);

    let spectrum = &sample.spectra[0];
    assert_eq!(spectrum.experiment_id, "E1");
    assert_eq!(spectrum.multiplets.len(), 2);
    assert_eq!(spectrum.peaks.len(), 2);
    assert_eq!(spectrum.peaks[0].shift, 1.23);
    assert_eq!(spectrum.peaks[0].intensity, 100.0);
    assert_eq!(spectrum.peaks[1].shift, 2.45);
    assert_eq!(spectrum.peaks[1].intensity, 50.0);
    assert_eq!(spectrum.multiplets[1].center, 2.45);
    assert_eq!(spectrum.multiplets[1].multiplicity, "Unknown");
    assert_eq!(spectrum.peaks[1].multiplet, Some(1));
}

#[test]
fn textual_not_available_ph_reads_as_null() {
    let record = glucose().with_loop(
        Loop::new(
            names::SAMPLE_CONDITION,
            &[names::CONDITION_LIST_ID, "Type", "Val", "Val_units"],
        )
        .with_row(&["1", "pH", "N/A", "pH"])
        .with_row(&["1", "temperature", "25", "C"])
        .with_row(&["2", "pH", "7.0", "pH"]),
    );
    let sample = &SpectralAssembler::default().assemble(&record).unwrap().samples[0];
    assert_eq!(sample.ph, None);
    assert!((sample.temperature.unwrap() - 298.15).abs() < 1e-9);
}

#[test]
fn gates_are_checked_in_order() {
    let assembler = SpectralAssembler::default();
    assert_eq!(
        assembler.assemble(&MemoryRecord::new("empty")),
        Err(RejectReason::NoPeakList)
    );

    let no_shifts = proton_record("Glucose", &[], &["1.0"]);
    assert_eq!(
        assembler.assemble(&no_shifts),
        Err(RejectReason::InsufficientChemicalShift)
    );

    let no_intensities = proton_record("Glucose", &["1.0"], &[]);
    assert_eq!(
        assembler.assemble(&no_intensities),
        Err(RejectReason::InsufficientIntensity)
    );
}

#[test]
fn two_dimensional_peak_lists_are_ignored() {
    let record = MemoryRecord::new("hsqc")
        .with_saveframe(
            TagTable::new(names::PEAK_LIST_FRAME, names::PEAK_LIST_PREFIX)
                .with_tag("ID", "1")
                .with_tag("Experiment_ID", "1")
                .with_tag("Sample_ID", "1"),
        )
        .with_loop(
            Loop::new(names::DIMENSION, &["ID", names::ATOM_TYPE, names::PEAK_LIST_ID])
                .with_row(&["1", "H", "1"])
                .with_row(&["2", "C", "1"]),
        )
        .with_loop(
            Loop::new(names::SHIFT, &[names::CHEM_SHIFT, names::PEAK_LIST_ID])
                .with_row(&["3.2", "1"]),
        );
    assert_eq!(
        SpectralAssembler::default().assemble(&record),
        Err(RejectReason::InsufficientChemicalShift)
    );
}

#[test]
fn samples_without_peaks_are_not_emitted() {
    let record = glucose()
        .with_loop(
            Loop::new(
                names::SAMPLE_COMPONENT,
                &["Sample_ID", "Type", "Mol_common_name", "Concentration_val"],
            )
            .with_row(&["S2", "Solute", "Glucose", "1.0"]),
        )
        .with_loop(Loop::new(names::EXPERIMENT, &["ID", "Name"]).with_row(&["E2", "1D 13C"]));
    let assembly = SpectralAssembler::default().assemble(&record).unwrap();
    assert_eq!(assembly.samples.len(), 1);
    assert_eq!(assembly.samples[0].source_sample_id, "S1");
    assert_eq!(assembly.samples[0].spectra.len(), 1);
    assert_eq!(assembly.samples[0].spectra[0].experiment_id, "E1");
}

#[test]
fn unparseable_rows_are_skipped_without_rejecting() {
    let record = proton_record("Glucose", &["1.23", "x", "3.00"], &["100", "80", "."]);
    let assembly = SpectralAssembler::default().assemble(&record).unwrap();
    let peaks = &assembly.samples[0].spectra[0].peaks;
    assert_eq!(peaks.len(), 1);
    assert_eq!(peaks[0].shift, 1.23);
}

#[test]
fn configured_default_linewidth_is_applied() {
    let assembler = SpectralAssembler::new(AssemblerOptions {
        default_linewidth: 0.01,
        max_linewidth: 0.5,
    });
    let assembly = assembler.assemble(&glucose()).unwrap();
    assert!(
        assembly.samples[0].spectra[0]
            .peaks
            .iter()
            .all(|peak| peak.width == 0.01)
    );
}
