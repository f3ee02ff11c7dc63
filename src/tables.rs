use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::domain::{MetaboliteId, MultipletId, PeakId, SampleId, SpectrumId};
use crate::error::NmrError;

pub const TABLE_NAMES: [&str; 8] = [
    "metabolites",
    "samples",
    "spectra",
    "multiplets",
    "peaks",
    "synonyms",
    "isin",
    "ontology",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metabolite {
    pub metabolite_id: MetaboliteId,
    pub accession: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub chemical_formula: Option<String>,
    pub molecular_weight: Option<f64>,
    pub smiles: Option<String>,
    pub inchi: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub sample_id: SampleId,
    pub metabolite_id: MetaboliteId,
    #[serde(rename = "pH")]
    pub ph: Option<f64>,
    pub temperature: Option<f64>,
    pub amount: Option<f64>,
    pub units: Option<String>,
    pub reference: Option<String>,
    pub solvent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spectrum {
    pub spectrum_id: SpectrumId,
    pub sample_id: SampleId,
    pub frequency: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Multiplet {
    pub multiplet_id: MultipletId,
    pub spectrum_id: SpectrumId,
    pub center: f64,
    pub atom_ref: Option<String>,
    pub multiplicity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peak {
    pub peak_id: PeakId,
    pub spectrum_id: SpectrumId,
    pub multiplet_id: Option<MultipletId>,
    pub shift: f64,
    pub intensity: f64,
    pub width: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Synonym {
    pub metabolite_id: MetaboliteId,
    pub synonym: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OntologyTerm {
    pub group: String,
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OntologyLink {
    pub metabolite_id: MetaboliteId,
    pub group: String,
}

/// Row buffers for one run. Owned by the pipeline and handed to a sink at the end.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tables {
    pub metabolites: Vec<Metabolite>,
    pub samples: Vec<Sample>,
    pub spectra: Vec<Spectrum>,
    pub multiplets: Vec<Multiplet>,
    pub peaks: Vec<Peak>,
    pub synonyms: Vec<Synonym>,
    pub isin: Vec<OntologyLink>,
    pub ontology: Vec<OntologyTerm>,
    #[serde(skip)]
    synonym_keys: HashSet<Synonym>,
    #[serde(skip)]
    link_keys: HashSet<OntologyLink>,
    #[serde(skip)]
    ontology_index: HashSet<String>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a synonym unless the exact pair is already present or the text is blank.
    pub fn push_synonym(&mut self, metabolite_id: MetaboliteId, synonym: &str) -> bool {
        let synonym = synonym.trim();
        if synonym.is_empty() {
            return false;
        }
        let row = Synonym {
            metabolite_id,
            synonym: synonym.to_string(),
        };
        if !self.synonym_keys.insert(row.clone()) {
            return false;
        }
        self.synonyms.push(row);
        true
    }

    /// First definition seen for a group wins.
    pub fn push_ontology(&mut self, group: &str, definition: Option<&str>) -> bool {
        if !self.ontology_index.insert(group.to_string()) {
            return false;
        }
        self.ontology.push(OntologyTerm {
            group: group.to_string(),
            definition: definition.map(str::to_string),
        });
        true
    }

    pub fn push_link(&mut self, metabolite_id: MetaboliteId, group: &str) -> bool {
        let row = OntologyLink {
            metabolite_id,
            group: group.to_string(),
        };
        if !self.link_keys.insert(row.clone()) {
            return false;
        }
        self.isin.push(row);
        true
    }

    pub fn row_counts(&self) -> IndexMap<&'static str, usize> {
        let counts = [
            self.metabolites.len(),
            self.samples.len(),
            self.spectra.len(),
            self.multiplets.len(),
            self.peaks.len(),
            self.synonyms.len(),
            self.isin.len(),
            self.ontology.len(),
        ];
        TABLE_NAMES.into_iter().zip(counts).collect()
    }

    /// Verifies every foreign key points at an existing row.
    pub fn check_integrity(&self) -> Result<(), NmrError> {
        let metabolites: HashSet<MetaboliteId> =
            self.metabolites.iter().map(|row| row.metabolite_id).collect();
        let samples: HashSet<SampleId> = self.samples.iter().map(|row| row.sample_id).collect();
        let spectra: HashSet<SpectrumId> = self.spectra.iter().map(|row| row.spectrum_id).collect();
        let multiplets: HashSet<MultipletId> =
            self.multiplets.iter().map(|row| row.multiplet_id).collect();
        let groups: HashSet<&str> = self.ontology.iter().map(|row| row.group.as_str()).collect();

        let dangling = |table: &str, id: &dyn std::fmt::Display, target: &dyn std::fmt::Display| {
            Err(NmrError::Integrity(format!(
                "{table} row {id} references missing {target}"
            )))
        };

        for row in &self.samples {
            if !metabolites.contains(&row.metabolite_id) {
                return dangling("samples", &row.sample_id, &row.metabolite_id);
            }
        }
        for row in &self.spectra {
            if !samples.contains(&row.sample_id) {
                return dangling("spectra", &row.spectrum_id, &row.sample_id);
            }
        }
        for row in &self.multiplets {
            if !spectra.contains(&row.spectrum_id) {
                return dangling("multiplets", &row.multiplet_id, &row.spectrum_id);
            }
        }
        for row in &self.peaks {
            if !spectra.contains(&row.spectrum_id) {
                return dangling("peaks", &row.peak_id, &row.spectrum_id);
            }
            if let Some(multiplet_id) = row.multiplet_id
                && !multiplets.contains(&multiplet_id)
            {
                return dangling("peaks", &row.peak_id, &multiplet_id);
            }
        }
        for row in &self.synonyms {
            if !metabolites.contains(&row.metabolite_id) {
                return dangling("synonyms", &row.synonym, &row.metabolite_id);
            }
        }
        for row in &self.isin {
            if !metabolites.contains(&row.metabolite_id) {
                return dangling("isin", &row.group, &row.metabolite_id);
            }
            if !groups.contains(row.group.as_str()) {
                return dangling("isin", &row.metabolite_id, &row.group);
            }
        }
        Ok(())
    }
}
