use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::assembler::{AssemblerOptions, Assembly, SpectralAssembler};
use crate::domain::{MetaboliteId, RecordOrder, SourceFormat};
use crate::error::{FailureKind, NmrError};
use crate::providers::{self, catalog::CatalogEntry, nmrml};
use crate::record::{LayeredRecord, RecordSource};
use crate::registry::{EntityRegistry, SCREENING_PLACEHOLDER_TITLE, canonical_name};
use crate::resolver::MetaboliteProfile;
use crate::sink::Sink;
use crate::tables::{Multiplet, Peak, Sample, Spectrum, Tables};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Discards every event.
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn event(&self, _event: ProgressEvent) {}
}

/// A configured input location: a file or a directory to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub path: PathBuf,
    pub format: Option<SourceFormat>,
}

/// One file to normalize, with the HMDB spectrum XML that supplements it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub companion: Option<PathBuf>,
}

impl InputRecord {
    pub fn new(path: impl Into<PathBuf>, format: SourceFormat) -> Self {
        Self {
            path: path.into(),
            format,
            companion: None,
        }
    }

    /// Stable sort key: the file name up to its first `.`.
    pub fn accession_key(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

/// Expands `specs` into input files.
///
/// Directories are scanned recursively and keep only files of a recognised
/// format (or of the forced one). For each HMDB accession only the best
/// available kind is kept: nmrML, then peak-list text, then spectrum XML. nmrML
/// and text inputs are paired with the spectrum XML carrying the same spectrum
/// number, searched among the inputs and in `companion_dir`.
pub fn discover_inputs(
    specs: &[InputSpec],
    companion_dir: Option<&Path>,
) -> Result<Vec<InputRecord>, NmrError> {
    let mut seen = HashSet::new();
    let mut inputs = Vec::new();
    for spec in specs {
        for input in expand(spec)? {
            if seen.insert(input.path.clone()) {
                inputs.push(input);
            }
        }
    }

    let mut companions: Vec<PathBuf> = inputs
        .iter()
        .filter(|input| input.format == SourceFormat::HmdbXml)
        .map(|input| input.path.clone())
        .collect();
    if let Some(dir) = companion_dir {
        companions.extend(
            walk_dir(dir)?
                .into_iter()
                .filter(|path| SourceFormat::from_path(path) == Some(SourceFormat::HmdbXml)),
        );
    }

    let mut inputs = prefer_best_source(inputs);
    for input in &mut inputs {
        if matches!(input.format, SourceFormat::Nmrml | SourceFormat::PeakText) {
            input.companion = find_companion(&input.path, &companions)?;
        }
    }
    Ok(inputs)
}

fn expand(spec: &InputSpec) -> Result<Vec<InputRecord>, NmrError> {
    if spec.path.is_dir() {
        return Ok(walk_dir(&spec.path)?
            .into_iter()
            .filter_map(|path| {
                let inferred = SourceFormat::from_path(&path)?;
                match spec.format {
                    Some(forced) if forced != inferred => None,
                    _ => Some(InputRecord::new(path, inferred)),
                }
            })
            .collect());
    }
    if !spec.path.exists() {
        return Err(NmrError::Filesystem(format!(
            "input {} does not exist",
            spec.path.display()
        )));
    }
    let format = spec
        .format
        .or_else(|| SourceFormat::from_path(&spec.path))
        .ok_or_else(|| NmrError::InvalidFormat(spec.path.display().to_string()))?;
    Ok(vec![InputRecord::new(spec.path.clone(), format)])
}

fn source_rank(format: SourceFormat) -> Option<u8> {
    match format {
        SourceFormat::Nmrml => Some(0),
        SourceFormat::PeakText => Some(1),
        SourceFormat::HmdbXml => Some(2),
        SourceFormat::Star => None,
    }
}

fn prefer_best_source(inputs: Vec<InputRecord>) -> Vec<InputRecord> {
    let accession = |input: &InputRecord| {
        nmrml::accession_from_stem(&providers::file_stem(&input.path)).unwrap_or_default()
    };
    let mut best: HashMap<String, u8> = HashMap::new();
    for input in &inputs {
        if let Some(rank) = source_rank(input.format) {
            let entry = best.entry(accession(input)).or_insert(rank);
            *entry = (*entry).min(rank);
        }
    }
    inputs
        .into_iter()
        .filter(|input| match source_rank(input.format) {
            Some(rank) => best.get(&accession(input)).is_none_or(|kept| *kept == rank),
            None => true,
        })
        .collect()
}

fn find_companion(path: &Path, candidates: &[PathBuf]) -> Result<Option<PathBuf>, NmrError> {
    let Some(number) = nmrml::spectrum_number(&providers::file_stem(path)) else {
        return Ok(None);
    };
    let pattern = Regex::new(&format!(r"one_d_spectrum_{number}(\D|$)"))
        .map_err(|err| NmrError::Filesystem(err.to_string()))?;
    Ok(candidates
        .iter()
        .find(|candidate| {
            candidate
                .file_name()
                .map(|name| pattern.is_match(&name.to_string_lossy()))
                .unwrap_or(false)
        })
        .cloned())
}

/// Every file under `root`, sorted by path.
fn walk_dir(root: &Path) -> Result<Vec<PathBuf>, NmrError> {
    let mut items = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(path) = stack.pop() {
        let entries = fs::read_dir(&path).map_err(|err| NmrError::Filesystem(err.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|err| NmrError::Filesystem(err.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                items.push(path);
            }
        }
    }
    items.sort();
    Ok(items)
}

/// Puts inputs into the processing order that ID allocation depends on.
pub fn order_inputs(mut inputs: Vec<InputRecord>, order: RecordOrder) -> Vec<InputRecord> {
    match order {
        RecordOrder::Accession => {
            inputs.sort_by(|a, b| {
                a.accession_key()
                    .cmp(&b.accession_key())
                    .then_with(|| a.path.cmp(&b.path))
            });
        }
        RecordOrder::Path => inputs.sort_by(|a, b| a.path.cmp(&b.path)),
        RecordOrder::Discovery => {}
    }
    inputs
}

/// Reads an input and layers its companion over it when there is one.
pub fn load_input(input: &InputRecord) -> Result<Box<dyn RecordSource>, NmrError> {
    let primary = providers::load(&input.path, input.format)?;
    let Some(companion) = &input.companion else {
        return Ok(Box::new(primary));
    };
    match providers::load(companion, SourceFormat::HmdbXml) {
        Ok(secondary) => Ok(Box::new(LayeredRecord::new(primary, secondary))),
        Err(err) => {
            warn!(
                path = %input.path.display(),
                companion = %companion.display(),
                error = %err,
                "companion unreadable, using the primary file alone"
            );
            Ok(Box::new(primary))
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub assembler: AssemblerOptions,
    pub placeholder_titles: Vec<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            assembler: AssemblerOptions::default(),
            placeholder_titles: vec![SCREENING_PLACEHOLDER_TITLE.to_string()],
        }
    }
}

/// What one accepted record contributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub metabolite_id: MetaboliteId,
    pub new_metabolite: bool,
    pub samples: usize,
    pub peaks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub accepted: usize,
    pub failures: BTreeMap<String, usize>,
    pub rows: BTreeMap<String, usize>,
    pub completed_at: String,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }
}

pub struct NormalizationPipeline {
    registry: EntityRegistry,
    assembler: SpectralAssembler,
    placeholders: Vec<String>,
    tables: Tables,
    total: usize,
    accepted: usize,
    failures: BTreeMap<FailureKind, usize>,
}

impl Default for NormalizationPipeline {
    fn default() -> Self {
        Self::new(PipelineOptions::default())
    }
}

impl NormalizationPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            registry: EntityRegistry::new(),
            assembler: SpectralAssembler::new(options.assembler),
            placeholders: options.placeholder_titles,
            tables: Tables::new(),
            total: 0,
            accepted: 0,
            failures: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Registers catalog metabolites, ordered by accession, before any spectra.
    pub fn seed_catalog(&mut self, mut entries: Vec<CatalogEntry>) {
        entries.sort_by(|a, b| a.accession.cmp(&b.accession));
        for entry in &entries {
            let name = entry.name.trim();
            let metabolite_id = self
                .registry
                .resolve_metabolite(name, entry.attributes())
                .id();
            for synonym in &entry.synonyms {
                self.tables.push_synonym(metabolite_id, synonym);
            }
            for (group, definition) in &entry.ontology {
                self.tables.push_ontology(group, definition.as_deref());
                self.tables.push_link(metabolite_id, group);
            }
        }
        info!(
            entries = entries.len(),
            metabolites = self.registry.metabolite_count(),
            "catalog seeded"
        );
    }

    /// Normalizes one record. Rejected and unidentified records leave every table untouched.
    pub fn process(&mut self, record: &dyn RecordSource) -> Result<Accepted, FailureKind> {
        self.total += 1;
        let outcome = self.try_process(record);
        match &outcome {
            Ok(accepted) => {
                self.accepted += 1;
                debug!(
                    origin = record.origin(),
                    metabolite = %accepted.metabolite_id,
                    new = accepted.new_metabolite,
                    peaks = accepted.peaks,
                    "record accepted"
                );
            }
            Err(kind) => {
                *self.failures.entry(*kind).or_default() += 1;
                warn!(origin = record.origin(), reason = kind.label(), "{kind}");
            }
        }
        outcome
    }

    fn try_process(&mut self, record: &dyn RecordSource) -> Result<Accepted, FailureKind> {
        let assembly = self
            .assembler
            .assemble(record)
            .map_err(FailureKind::Rejected)?;

        let profile = MetaboliteProfile::from_record(record);
        let name = canonical_name(
            profile.title.as_deref(),
            profile.component_name.as_deref(),
            &self.placeholders,
        )
        .or_else(|| {
            profile
                .accession
                .as_deref()
                .and_then(|accession| self.registry.name_for_accession(accession))
                .map(str::to_string)
        })
        .ok_or(FailureKind::Unidentified)?;

        let resolution = self.registry.resolve_metabolite(&name, (&profile).into());
        let metabolite_id = resolution.id();
        let samples = assembly.samples.len();
        let peaks = assembly.peak_count();
        self.commit(metabolite_id, assembly);
        Ok(Accepted {
            metabolite_id,
            new_metabolite: resolution.is_new(),
            samples,
            peaks,
        })
    }

    fn commit(&mut self, metabolite_id: MetaboliteId, assembly: Assembly) {
        for bundle in assembly.samples {
            let sample_id = self.registry.next_sample_id();
            self.tables.samples.push(Sample {
                sample_id,
                metabolite_id,
                ph: bundle.ph,
                temperature: bundle.temperature,
                amount: bundle.amount,
                units: bundle.units,
                reference: bundle.reference,
                solvent: bundle.solvent,
            });
            for spectrum in bundle.spectra {
                let spectrum_id = self.registry.next_spectrum_id();
                self.tables.spectra.push(Spectrum {
                    spectrum_id,
                    sample_id,
                    frequency: spectrum.frequency,
                });
                for (index, multiplet) in spectrum.multiplets.into_iter().enumerate() {
                    self.tables.multiplets.push(Multiplet {
                        multiplet_id: self.registry.multiplet_id(spectrum_id, index as u32 + 1),
                        spectrum_id,
                        center: multiplet.center,
                        atom_ref: multiplet.atom_ref,
                        multiplicity: multiplet.multiplicity,
                    });
                }
                for (index, peak) in spectrum.peaks.into_iter().enumerate() {
                    self.tables.peaks.push(Peak {
                        peak_id: self.registry.peak_id(spectrum_id, index as u32 + 1),
                        spectrum_id,
                        multiplet_id: peak
                            .multiplet
                            .map(|position| self.registry.multiplet_id(spectrum_id, position as u32 + 1)),
                        shift: peak.shift,
                        intensity: peak.intensity,
                        width: Some(peak.width),
                    });
                }
            }
        }
        for synonym in &assembly.synonyms {
            self.tables.push_synonym(metabolite_id, synonym);
        }
    }

    /// Loads and processes one input file; unreadable files count as malformed.
    pub fn process_input(&mut self, input: &InputRecord) -> Result<Accepted, FailureKind> {
        match load_input(input) {
            Ok(record) => self.process(record.as_ref()),
            Err(err) => {
                self.total += 1;
                *self.failures.entry(FailureKind::Malformed).or_default() += 1;
                warn!(path = %input.path.display(), error = %err, "malformed source");
                Err(FailureKind::Malformed)
            }
        }
    }

    pub fn run(&mut self, inputs: &[InputRecord], progress: &dyn ProgressSink) {
        let started = Instant::now();
        info!(inputs = inputs.len(), "normalization started");
        for (index, input) in inputs.iter().enumerate() {
            progress.event(ProgressEvent {
                message: format!(
                    "phase=Normalize; {}/{} {}",
                    index + 1,
                    inputs.len(),
                    input.path.display()
                ),
                elapsed: Some(started.elapsed()),
            });
            let _ = self.process_input(input);
        }
        info!(
            total = self.total,
            accepted = self.accepted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "normalization finished"
        );
        for (kind, count) in &self.failures {
            info!(reason = kind.label(), count, "records skipped");
        }
    }

    /// Snapshot of every table, metabolites included.
    pub fn tables(&self) -> Tables {
        let mut tables = self.tables.clone();
        tables.metabolites = self.registry.metabolites().cloned().collect();
        tables
    }

    pub fn summary(&self) -> RunSummary {
        let failures = FailureKind::ALL
            .iter()
            .map(|kind| {
                (
                    kind.label().to_string(),
                    self.failures.get(kind).copied().unwrap_or(0),
                )
            })
            .collect();
        let rows = self
            .tables()
            .row_counts()
            .into_iter()
            .map(|(table, count)| (table.to_string(), count))
            .collect();
        RunSummary {
            total: self.total,
            accepted: self.accepted,
            failures,
            rows,
            completed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Checks referential integrity and replaces the sink's contents with this run's tables.
    pub fn finish(&self, sink: &mut dyn Sink, progress: &dyn ProgressSink) -> Result<RunSummary, NmrError> {
        let started = Instant::now();
        let tables = self.tables();
        tables.check_integrity()?;
        progress.event(ProgressEvent {
            message: format!("phase=Persist; writing {}", sink.describe()),
            elapsed: None,
        });
        sink.replace_all(&tables)?;
        progress.event(ProgressEvent {
            message: "phase=Persist; done".to_string(),
            elapsed: Some(started.elapsed()),
        });
        info!(sink = %sink.describe(), "tables persisted");
        Ok(self.summary())
    }
}
