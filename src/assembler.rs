//! Turns one record into linked sample, spectrum, multiplet and peak drafts.
//!
//! The assembler never allocates IDs. It returns an [`Assembly`] whose drafts
//! reference each other by position, and the pipeline commits it through the
//! registry. A record either passes all three gates and yields an assembly, or
//! is rejected with a [`RejectReason`] and contributes nothing.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::RejectReason;
use crate::record::{Loop, RecordSource, TagTable};
use crate::resolver::{FieldResolver, FieldSpec, Strategy, parse_number, table_number, table_value, to_kelvin};

pub const DEFAULT_LINEWIDTH: f64 = 0.004;
pub const MAX_LINEWIDTH: f64 = 0.5;
pub const UNKNOWN_MULTIPLICITY: &str = "Unknown";

/// Category, tag and column names shared by the assembler and the format adapters.
pub mod names {
    pub const PEAK_LIST_FRAME: &str = "spectral_peak_list";
    pub const PEAK_LIST_PREFIX: &str = "Spectral_peak_list";
    pub const DIMENSION: &str = "Spectral_dim";
    pub const SHIFT: &str = "Spectral_transition_char";
    pub const INTENSITY: &str = "Spectral_transition_general_char";
    pub const MULTIPLET: &str = "Spectral_multiplet";
    pub const SAMPLE_COMPONENT: &str = "Sample_component";
    pub const SAMPLE_CONDITION: &str = "Sample_condition_variable";
    pub const EXPERIMENT: &str = "Experiment";
    pub const SPECTROMETER_FRAME: &str = "NMR_spectrometer";
    pub const COMMON_NAME: &str = "Chem_comp_common_name";

    pub const PEAK_LIST_ID: &str = "Spectral_peak_list_ID";
    pub const ATOM_TYPE: &str = "Atom_type";
    pub const CHEM_SHIFT: &str = "Chem_shift_val";
    pub const LINE_WIDTH: &str = "Line_width_val";
    pub const MULTIPLET_ID: &str = "Multiplet_ID";
    pub const INTENSITY_VAL: &str = "Intensity_val";
    pub const CONDITION_LIST_ID: &str = "Sample_condition_list_ID";
    pub const PRIMARY_CONDITION_LIST: &str = "1";
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblerOptions {
    pub default_linewidth: f64,
    pub max_linewidth: f64,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            default_linewidth: DEFAULT_LINEWIDTH,
            max_linewidth: MAX_LINEWIDTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub samples: Vec<SampleBundle>,
    pub synonyms: Vec<String>,
}

impl Assembly {
    pub fn peak_count(&self) -> usize {
        self.samples
            .iter()
            .flat_map(|sample| &sample.spectra)
            .map(|spectrum| spectrum.peaks.len())
            .sum()
    }
}

/// One physical sample that produced at least one spectrum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleBundle {
    pub source_sample_id: String,
    pub ph: Option<f64>,
    pub temperature: Option<f64>,
    pub amount: Option<f64>,
    pub units: Option<String>,
    pub reference: Option<String>,
    pub solvent: Option<String>,
    pub spectra: Vec<SpectrumBundle>,
}

/// One experiment on a sample; never empty once it is part of a bundle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumBundle {
    pub experiment_id: String,
    pub frequency: Option<f64>,
    pub multiplets: Vec<MultipletDraft>,
    pub peaks: Vec<PeakDraft>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultipletDraft {
    pub center: f64,
    pub atom_ref: Option<String>,
    pub multiplicity: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeakDraft {
    pub shift: f64,
    pub intensity: f64,
    pub width: f64,
    /// Position of the enclosing multiplet in [`SpectrumBundle::multiplets`].
    pub multiplet: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Link {
    experiment_id: String,
    sample_id: String,
}

#[derive(Debug, Clone)]
struct Experiment {
    id: String,
    spectrometer_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Conditions {
    ph: Option<f64>,
    temperature: Option<f64>,
}

#[derive(Debug, Clone)]
struct DeclaredMultiplet {
    key: Option<String>,
    center: Option<f64>,
    range: Option<(f64, f64)>,
    atom_ref: Option<String>,
    multiplicity: String,
    members: Vec<f64>,
}

impl DeclaredMultiplet {
    /// Strictly inside the range; a shift on a boundary belongs to neither side.
    fn contains(&self, shift: f64) -> bool {
        self.range
            .map(|(low, high)| low < shift && shift < high)
            .unwrap_or(false)
    }

    /// Explicit center, else midpoint of the range, else mean of member shifts.
    fn center(&self) -> Option<f64> {
        self.center
            .or_else(|| self.range.map(|(low, high)| (low + high) / 2.0))
            .or_else(|| {
                (!self.members.is_empty())
                    .then(|| self.members.iter().sum::<f64>() / self.members.len() as f64)
            })
    }
}

struct PendingPeak {
    shift: f64,
    intensity: f64,
    width: f64,
    owner: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SpectralAssembler {
    options: AssemblerOptions,
}

impl SpectralAssembler {
    pub fn new(options: AssemblerOptions) -> Self {
        Self { options }
    }

    pub fn assemble(&self, record: &dyn RecordSource) -> Result<Assembly, RejectReason> {
        let peak_lists = record.get_saveframe_tags(names::PEAK_LIST_FRAME);
        if peak_lists.is_empty() {
            return Err(RejectReason::NoPeakList);
        }

        let retained = retained_peak_lists(record);
        let shifts = rows_by_peak_list(record.get_loops(names::SHIFT), &retained);
        if shifts.is_empty() {
            return Err(RejectReason::InsufficientChemicalShift);
        }
        let intensities = rows_by_peak_list(record.get_loops(names::INTENSITY), &retained);
        if intensities.is_empty() {
            return Err(RejectReason::InsufficientIntensity);
        }
        let multiplets = rows_by_peak_list(record.get_loops(names::MULTIPLET), &retained);

        let links = peak_list_links(&peak_lists, &retained);
        let experiments = experiments(record);
        if experiments.len() > 1 {
            debug!(
                origin = record.origin(),
                count = experiments.len(),
                "more than one experiment row"
            );
        }
        let conditions = conditions(record);

        let mut samples = Vec::new();
        for table in record.get_loops(names::SAMPLE_COMPONENT) {
            let mut sample = sample_bundle(&table, conditions);
            for experiment in &experiments {
                let mut spectrum = SpectrumBundle {
                    experiment_id: experiment.id.clone(),
                    frequency: frequency(record, experiment),
                    ..SpectrumBundle::default()
                };
                for (peak_list_id, shift_table) in &shifts {
                    let linked = links.get(peak_list_id).is_some_and(|link| {
                        link.experiment_id == experiment.id && link.sample_id == sample.source_sample_id
                    });
                    if !linked {
                        continue;
                    }
                    let Some(intensity_table) = intensities.get(peak_list_id) else {
                        debug!(
                            origin = record.origin(),
                            peak_list_id = peak_list_id.as_str(),
                            "peak list has no intensities"
                        );
                        continue;
                    };
                    self.join(
                        &mut spectrum,
                        shift_table,
                        intensity_table,
                        multiplets.get(peak_list_id),
                    );
                }
                if !spectrum.peaks.is_empty() {
                    sample.spectra.push(spectrum);
                }
            }
            if !sample.spectra.is_empty() {
                samples.push(sample);
            }
        }

        Ok(Assembly {
            samples,
            synonyms: synonyms(record),
        })
    }

    fn join(
        &self,
        spectrum: &mut SpectrumBundle,
        shifts: &Loop,
        intensities: &Loop,
        multiplets: Option<&Loop>,
    ) {
        let mut declared = multiplets.map(declared_multiplets).unwrap_or_default();
        let grouped = !declared.is_empty();
        let mut pending = Vec::new();

        for (position, row) in shifts.rows().enumerate() {
            let Some(shift) = row.get(names::CHEM_SHIFT).and_then(parse_number) else {
                continue;
            };
            // Intensity rows are aligned with shift rows by position.
            let Some(intensity) = intensities
                .row(position)
                .and_then(|paired| paired.get(names::INTENSITY_VAL))
                .and_then(parse_number)
            else {
                continue;
            };
            let width = self.linewidth(row.get(names::LINE_WIDTH));

            if grouped {
                let owner = locate(&declared, row.get(names::MULTIPLET_ID), shift);
                if let Some(index) = owner {
                    declared[index].members.push(shift);
                }
                pending.push(PendingPeak {
                    shift,
                    intensity,
                    width,
                    owner,
                });
            } else {
                spectrum.multiplets.push(MultipletDraft {
                    center: shift,
                    atom_ref: None,
                    multiplicity: UNKNOWN_MULTIPLICITY.to_string(),
                });
                spectrum.peaks.push(PeakDraft {
                    shift,
                    intensity,
                    width,
                    multiplet: Some(spectrum.multiplets.len() - 1),
                });
            }
        }

        if !grouped {
            return;
        }
        let mut slots = vec![None; declared.len()];
        for (index, multiplet) in declared.into_iter().enumerate() {
            let Some(center) = multiplet.center() else {
                continue;
            };
            spectrum.multiplets.push(MultipletDraft {
                center,
                atom_ref: multiplet.atom_ref,
                multiplicity: multiplet.multiplicity,
            });
            slots[index] = Some(spectrum.multiplets.len() - 1);
        }
        for peak in pending {
            spectrum.peaks.push(PeakDraft {
                shift: peak.shift,
                intensity: peak.intensity,
                width: peak.width,
                multiplet: peak.owner.and_then(|index| slots[index]),
            });
        }
    }

    /// Reported linewidth when plausible, otherwise the nominal default.
    fn linewidth(&self, raw: Option<&str>) -> f64 {
        raw.and_then(parse_number)
            .filter(|width| *width > 0.0 && *width <= self.options.max_linewidth)
            .unwrap_or(self.options.default_linewidth)
    }
}

/// All loops of one category as a single table.
fn combined(tables: Vec<Loop>) -> Option<Loop> {
    tables.into_iter().reduce(|merged, table| merged.merged(&table))
}

/// Peak lists whose dimension table is exactly one proton dimension.
fn retained_peak_lists(record: &dyn RecordSource) -> HashSet<String> {
    let Some(dimensions) = combined(record.get_loops(names::DIMENSION)) else {
        return HashSet::new();
    };
    dimensions
        .split_by(names::PEAK_LIST_ID)
        .into_iter()
        .filter(|(peak_list_id, table)| {
            !peak_list_id.is_empty()
                && table.len() == 1
                && table
                    .row(0)
                    .and_then(|row| row.get(names::ATOM_TYPE))
                    .is_some_and(|atom| atom.eq_ignore_ascii_case("H"))
        })
        .map(|(peak_list_id, _)| peak_list_id)
        .collect()
}

fn rows_by_peak_list(tables: Vec<Loop>, retained: &HashSet<String>) -> IndexMap<String, Loop> {
    let Some(table) = combined(tables) else {
        return IndexMap::new();
    };
    table
        .split_by(names::PEAK_LIST_ID)
        .into_iter()
        .filter(|(peak_list_id, table)| retained.contains(peak_list_id) && !table.is_empty())
        .collect()
}

fn peak_list_links(frames: &[TagTable], retained: &HashSet<String>) -> IndexMap<String, Link> {
    frames
        .iter()
        .filter_map(|frame| {
            let id = frame.get("ID")?;
            if !retained.contains(id) {
                return None;
            }
            let link = Link {
                experiment_id: frame.get("Experiment_ID")?.to_string(),
                sample_id: frame.get("Sample_ID")?.to_string(),
            };
            Some((id.to_string(), link))
        })
        .collect()
}

fn experiments(record: &dyn RecordSource) -> Vec<Experiment> {
    record
        .get_loops(names::EXPERIMENT)
        .iter()
        .flat_map(|table| {
            table
                .rows()
                .filter_map(|row| {
                    Some(Experiment {
                        id: row.get("ID")?.to_string(),
                        spectrometer_id: row.get("NMR_spectrometer_ID").map(str::to_string),
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn frequency(record: &dyn RecordSource, experiment: &Experiment) -> Option<f64> {
    let spectrometer_id = experiment.spectrometer_id.clone()?;
    let spec = FieldSpec::new("frequency").or(Strategy::saveframe_tag(
        names::SPECTROMETER_FRAME,
        "ID",
        &[spectrometer_id],
        "Field_strength",
    ));
    FieldResolver.resolve_number(record, &spec)
}

fn conditions(record: &dyn RecordSource) -> Conditions {
    let Some(table) = combined(record.get_loops(names::SAMPLE_CONDITION)) else {
        return Conditions::default();
    };
    let lists = table.split_by(names::CONDITION_LIST_ID);
    if lists.len() > 1 {
        debug!(
            origin = record.origin(),
            count = lists.len(),
            "more than one condition list"
        );
    }
    let Some((_, primary)) = lists
        .into_iter()
        .find(|(list_id, _)| list_id == names::PRIMARY_CONDITION_LIST)
    else {
        return Conditions::default();
    };
    let temperature = table_number(&primary, "Type", "temperature", "Val")
        .map(|value| to_kelvin(value, table_value(&primary, "Type", "temperature", "Val_units")));
    Conditions {
        ph: table_number(&primary, "Type", "pH", "Val"),
        temperature,
    }
}

fn sample_bundle(table: &Loop, conditions: Conditions) -> SampleBundle {
    let source_sample_id = table
        .row(0)
        .and_then(|row| row.get("Sample_ID"))
        .unwrap_or_default()
        .to_string();
    SampleBundle {
        source_sample_id,
        ph: conditions.ph,
        temperature: conditions.temperature,
        amount: table_number(table, "Type", "Solute", "Concentration_val"),
        units: table_value(table, "Type", "Solute", "Concentration_val_units").map(str::to_string),
        reference: table_value(table, "Type", "Reference", "Mol_common_name").map(str::to_string),
        solvent: table_value(table, "Type", "Solvent", "Mol_common_name").map(str::to_string),
        spectra: Vec::new(),
    }
}

fn declared_multiplets(table: &Loop) -> Vec<DeclaredMultiplet> {
    table
        .rows()
        .map(|row| {
            let range = match (
                row.get("Range_min").and_then(parse_number),
                row.get("Range_max").and_then(parse_number),
            ) {
                (Some(first), Some(second)) => Some((first.min(second), first.max(second))),
                _ => None,
            };
            DeclaredMultiplet {
                key: row.get("ID").map(str::to_string),
                center: row.get("Center").and_then(parse_number),
                range,
                atom_ref: row.get("Atom_ref").map(str::to_string),
                multiplicity: row
                    .get("Multiplicity")
                    .unwrap_or(UNKNOWN_MULTIPLICITY)
                    .to_string(),
                members: Vec::new(),
            }
        })
        .collect()
}

/// Owner of a peak: the multiplet named by its `Multiplet_ID`, else the first whose range holds the shift.
fn locate(declared: &[DeclaredMultiplet], multiplet_id: Option<&str>, shift: f64) -> Option<usize> {
    match multiplet_id {
        Some(key) => declared
            .iter()
            .position(|multiplet| multiplet.key.as_deref() == Some(key)),
        None => declared.iter().position(|multiplet| multiplet.contains(shift)),
    }
}

fn synonyms(record: &dyn RecordSource) -> Vec<String> {
    let tables = record.get_loops(names::COMMON_NAME);
    if tables.is_empty() {
        return FieldResolver
            .resolve(record, &crate::resolver::fields::synonym_tag())
            .into_iter()
            .collect();
    }
    tables
        .iter()
        .flat_map(|table| {
            table
                .rows()
                .filter(|row| {
                    row.get("Type")
                        .is_some_and(|kind| kind.eq_ignore_ascii_case("synonym"))
                })
                .filter_map(|row| row.get("Name").map(str::to_string))
                .collect::<Vec<_>>()
        })
        .collect()
}
