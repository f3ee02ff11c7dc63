mod common;

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use assert_matches::assert_matches;

use nmr_normalizer::domain::{RecordOrder, SourceFormat};
use nmr_normalizer::error::{FailureKind, NmrError, RejectReason};
use nmr_normalizer::pipeline::{
    InputRecord, InputSpec, NormalizationPipeline, PipelineOptions, ProgressEvent, ProgressSink,
    SilentProgress, discover_inputs, order_inputs,
};
use nmr_normalizer::providers::catalog::CatalogEntry;
use nmr_normalizer::assembler::names;
use nmr_normalizer::record::{Loop, MemoryRecord, TagTable};
use nmr_normalizer::registry::SCREENING_PLACEHOLDER_TITLE;
use nmr_normalizer::sink::MemorySink;

use common::{glucose, proton_record};

#[derive(Default)]
struct RecordingProgress {
    messages: RefCell<Vec<String>>,
}

impl ProgressSink for RecordingProgress {
    fn event(&self, event: ProgressEvent) {
        self.messages.borrow_mut().push(event.message);
    }
}

fn catalog_entry(accession: &str, name: &str) -> CatalogEntry {
    CatalogEntry {
        accession: accession.to_string(),
        name: name.to_string(),
        description: None,
        chemical_formula: None,
        molecular_weight: None,
        smiles: None,
        inchi: None,
        synonyms: vec!["Dextrose".to_string(), "Dextrose".to_string()],
        ontology: vec![("Biofluid".to_string(), None)],
    }
}

#[test]
fn scenario_tables_share_one_spectrum() {
    let mut pipeline = NormalizationPipeline::default();
    pipeline.process(&glucose()).unwrap();

    let tables = pipeline.tables();
    assert_eq!(tables.samples.len(), 1);
    assert_eq!(tables.spectra.len(), 1);
    assert_eq!(tables.multiplets.len(), 2);
    assert_eq!(tables.peaks.len(), 2);
    assert_eq!(tables.peaks[0].shift, 1.23);
    assert_eq!(tables.peaks[0].intensity, 100.0);
    assert_eq!(tables.peaks[1].shift, 2.45);
    assert_eq!(tables.peaks[1].intensity, 50.0);
    assert_eq!(tables.peaks[0].spectrum_id, tables.peaks[1].spectrum_id);
    assert_eq!(tables.samples[0].sample_id.to_string(), "SA:1");
    assert_eq!(tables.spectra[0].spectrum_id.to_string(), "SP:1");
}

#[test]
fn identical_titles_share_a_metabolite() {
    let mut pipeline = NormalizationPipeline::default();
    let first = pipeline.process(&glucose()).unwrap();
    let second = pipeline.process(&glucose()).unwrap();
    let third = pipeline
        .process(&proton_record("D-Glucose", &["3.4"], &["1.0"]))
        .unwrap();

    assert!(first.new_metabolite);
    assert!(!second.new_metabolite);
    assert_eq!(first.metabolite_id, second.metabolite_id);
    assert_ne!(first.metabolite_id, third.metabolite_id);

    let tables = pipeline.tables();
    assert_eq!(tables.metabolites.len(), 2);
    assert_eq!(tables.samples.len(), 3);
    assert_eq!(tables.spectra[1].spectrum_id.to_string(), "SP:2");
    assert_eq!(tables.peaks[2].peak_id.to_string(), "PK:2.1");
}

#[test]
fn rejected_records_leave_no_rows() {
    let mut pipeline = NormalizationPipeline::default();
    let outcome = pipeline.process(&proton_record("Water", &["4.7"], &[]));
    assert_matches!(
        outcome,
        Err(FailureKind::Rejected(RejectReason::InsufficientIntensity))
    );
    pipeline.process(&glucose()).unwrap();

    let tables = pipeline.tables();
    assert_eq!(tables.metabolites.len(), 1);
    assert_eq!(tables.metabolites[0].metabolite_id.to_string(), "SU:1");
    assert_eq!(tables.samples[0].sample_id.to_string(), "SA:1");

    let summary = pipeline.summary();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.failures["insufficient_intensity"], 1);
    assert_eq!(summary.failures["no_peak_list"], 0);
    assert_eq!(summary.failed(), 1);
}

fn peak_list_frame(id: &str) -> TagTable {
    TagTable::new(names::PEAK_LIST_FRAME, names::PEAK_LIST_PREFIX)
        .with_tag("ID", id)
        .with_tag("Experiment_ID", "E1")
        .with_tag("Sample_ID", "S1")
}

#[test]
fn peak_lists_on_one_experiment_share_sample_and_spectrum() {
    let record = MemoryRecord::new("split")
        .with_tag("Entry.Title", "Citrate")
        .with_saveframe(peak_list_frame("1"))
        .with_saveframe(peak_list_frame("2"))
        .with_loop(
            Loop::new(names::DIMENSION, &["ID", names::ATOM_TYPE, names::PEAK_LIST_ID])
                .with_row(&["1", "H", "1"])
                .with_row(&["1", "H", "2"]),
        )
        .with_loop(
            Loop::new(names::SHIFT, &[names::CHEM_SHIFT, names::PEAK_LIST_ID])
                .with_row(&["2.52", "1"])
                .with_row(&["2.66", "1"])
                .with_row(&["2.70", "2"]),
        )
        .with_loop(
            Loop::new(names::INTENSITY, &[names::INTENSITY_VAL, names::PEAK_LIST_ID])
                .with_row(&["1.0", "1"])
                .with_row(&["0.9", "1"])
                .with_row(&["0.4", "2"]),
        )
        .with_loop(
            Loop::new(
                names::SAMPLE_COMPONENT,
                &["Sample_ID", "Type", "Mol_common_name", "Concentration_val"],
            )
            .with_row(&["S1", "Solute", "Citrate", "2.0"]),
        )
        .with_loop(Loop::new(names::EXPERIMENT, &["ID", "Name"]).with_row(&["E1", "1D 1H"]));

    let mut pipeline = NormalizationPipeline::default();
    let accepted = pipeline.process(&record).unwrap();
    assert_eq!(accepted.samples, 1);
    assert_eq!(accepted.peaks, 3);

    let mut sink = MemorySink::default();
    pipeline.finish(&mut sink, &SilentProgress).unwrap();
    let tables = sink.tables.unwrap();
    assert_eq!(tables.samples.len(), 1);
    assert_eq!(tables.spectra.len(), 1);

    let peak_ids: Vec<String> = tables.peaks.iter().map(|peak| peak.peak_id.to_string()).collect();
    assert_eq!(peak_ids, vec!["PK:1.1", "PK:1.2", "PK:1.3"]);
    let multiplet_ids: Vec<String> = tables
        .multiplets
        .iter()
        .map(|multiplet| multiplet.multiplet_id.to_string())
        .collect();
    assert_eq!(multiplet_ids, vec!["MT:1.1", "MT:1.2", "MT:1.3"]);
    assert_eq!(tables.peaks[2].shift, 2.70);
    assert_eq!(tables.peaks[2].intensity, 0.4);
    assert_eq!(
        tables.peaks[2].multiplet_id.map(|id| id.to_string()).as_deref(),
        Some("MT:1.3")
    );
}

#[test]
fn placeholder_title_falls_back_to_component_name() {
    let record = proton_record(SCREENING_PLACEHOLDER_TITLE, &["1.0"], &["2.0"])
        .with_tag("Chem_comp.Name", "Alpha-D-Glucose, anhydrous");
    let mut pipeline = NormalizationPipeline::default();
    pipeline.process(&record).unwrap();
    assert_eq!(pipeline.tables().metabolites[0].name, "alpha_d_glucose__anhydrous");
}

#[test]
fn nameless_records_resolve_through_the_catalog() {
    let mut pipeline = NormalizationPipeline::new(PipelineOptions::default());
    pipeline.seed_catalog(vec![catalog_entry("HMDB0000122", "D-Glucose")]);

    let record = proton_record("", &["5.22"], &["0.3"]).with_tag("Entry.ID", "HMDB0000122");
    let accepted = pipeline.process(&record).unwrap();
    assert!(!accepted.new_metabolite);

    let tables = pipeline.tables();
    assert_eq!(tables.metabolites.len(), 1);
    assert_eq!(tables.metabolites[0].name, "D-Glucose");
    assert_eq!(tables.synonyms.len(), 1);
    assert_eq!(tables.ontology.len(), 1);
    assert_eq!(tables.isin.len(), 1);
    assert_eq!(tables.samples[0].metabolite_id, accepted.metabolite_id);
    assert!(tables.check_integrity().is_ok());
}

#[test]
fn unidentified_records_are_counted_not_guessed() {
    let mut pipeline = NormalizationPipeline::default();
    let record = proton_record("", &["5.22"], &["0.3"]).with_tag("Entry.ID", "HMDB9999999");
    assert_matches!(pipeline.process(&record), Err(FailureKind::Unidentified));
    assert!(pipeline.tables().samples.is_empty());
    assert_eq!(pipeline.summary().failures["unidentified"], 1);
}

#[test]
fn every_outcome_is_counted_once() {
    let dir = tempfile::tempdir().unwrap();
    let broken = dir.path().join("bmse000002.str");
    fs::write(&broken, "data_x\nsave_open\n").unwrap();

    let mut pipeline = NormalizationPipeline::default();
    pipeline.process(&glucose()).unwrap();
    let _ = pipeline.process(&MemoryRecord::new("empty"));
    let _ = pipeline.process_input(&InputRecord::new(&broken, SourceFormat::Star));

    let summary = pipeline.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.accepted + summary.failed(), summary.total);
    assert_eq!(summary.failures["malformed"], 1);
    assert_eq!(summary.failures.len(), FailureKind::ALL.len());
}

#[test]
fn finish_replaces_sink_contents_and_reports_progress() {
    let mut pipeline = NormalizationPipeline::default();
    pipeline.process(&glucose()).unwrap();

    let mut sink = MemorySink::default();
    let progress = RecordingProgress::default();
    let summary = pipeline.finish(&mut sink, &progress).unwrap();
    pipeline.finish(&mut sink, &SilentProgress).unwrap();

    assert_eq!(sink.writes, 2);
    assert_eq!(sink.tables.unwrap().peaks.len(), 2);
    assert_eq!(summary.rows["peaks"], 2);
    assert_eq!(summary.rows["metabolites"], 1);
    let messages = progress.messages.into_inner();
    assert!(messages.iter().any(|message| message.starts_with("phase=Persist")));
}

#[test]
fn rerun_produces_identical_tables() {
    let records = [
        proton_record("Glucose", &["1.23"], &["1"]),
        proton_record("Alanine", &["1.47", "3.77"], &["1", "0.3"]),
        proton_record("Glucose", &["5.22"], &["0.4"]),
    ];
    let run = || {
        let mut pipeline = NormalizationPipeline::default();
        for record in &records {
            pipeline.process(record).unwrap();
        }
        pipeline.tables()
    };
    assert_eq!(run(), run());
}

#[test]
fn discovery_prefers_nmrml_and_pairs_companions() {
    let dir = tempfile::tempdir().unwrap();
    let spectra = dir.path().join("spectra");
    let companions = dir.path().join("companions");
    fs::create_dir_all(&spectra).unwrap();
    fs::create_dir_all(&companions).unwrap();
    for name in [
        "HMDB0000122_1024_1H.nmrML",
        "HMDB0000122_nmroned_1024_9999.txt",
        "bmse000028.str",
        "notes.md",
    ] {
        fs::write(spectra.join(name), "").unwrap();
    }
    fs::write(companions.join("HMDB0000122_nmr_one_d_spectrum_1024.xml"), "").unwrap();
    fs::write(companions.join("HMDB0000122_nmr_one_d_spectrum_10240.xml"), "").unwrap();

    let specs = vec![InputSpec {
        path: spectra.clone(),
        format: None,
    }];
    let inputs = order_inputs(
        discover_inputs(&specs, Some(&companions)).unwrap(),
        RecordOrder::Accession,
    );
    let names: Vec<String> = inputs
        .iter()
        .map(|input| input.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["HMDB0000122_1024_1H.nmrML", "bmse000028.str"]);
    assert_eq!(
        inputs[0].companion,
        Some(companions.join("HMDB0000122_nmr_one_d_spectrum_1024.xml"))
    );
    assert_eq!(inputs[1].companion, None);
}

#[test]
fn companion_choice_follows_sorted_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let spectrum = dir.path().join("HMDB0000122_1024_1H.nmrML");
    let companions = dir.path().join("companions");
    fs::create_dir_all(&companions).unwrap();
    fs::write(&spectrum, "").unwrap();
    for name in [
        "HMDB0000122_nmr_one_d_spectrum_1024_z.xml",
        "HMDB0000122_nmr_one_d_spectrum_1024_b.xml",
        "HMDB0000122_nmr_one_d_spectrum_1024_m.xml",
    ] {
        fs::write(companions.join(name), "").unwrap();
    }

    let specs = vec![InputSpec {
        path: spectrum,
        format: None,
    }];
    let inputs = discover_inputs(&specs, Some(&companions)).unwrap();
    assert_eq!(
        inputs[0].companion,
        Some(companions.join("HMDB0000122_nmr_one_d_spectrum_1024_b.xml"))
    );
}

#[test]
fn discovery_rejects_missing_and_unknown_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = vec![InputSpec {
        path: dir.path().join("absent.str"),
        format: None,
    }];
    assert_matches!(discover_inputs(&missing, None), Err(NmrError::Filesystem(_)));

    let unknown = dir.path().join("notes.md");
    fs::write(&unknown, "").unwrap();
    let specs = vec![InputSpec {
        path: unknown,
        format: None,
    }];
    assert_matches!(discover_inputs(&specs, None), Err(NmrError::InvalidFormat(_)));
}

#[test]
fn run_reports_each_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bmse000001.str");
    fs::write(&path, "data_bmse000001\n").unwrap();

    let mut pipeline = NormalizationPipeline::default();
    let progress = RecordingProgress::default();
    pipeline.run(&[InputRecord::new(PathBuf::from(&path), SourceFormat::Star)], &progress);

    let messages = progress.messages.into_inner();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("phase=Normalize; 1/1"));
    assert_eq!(pipeline.summary().failures["no_peak_list"], 1);
}
