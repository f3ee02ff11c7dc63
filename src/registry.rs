//! Identity resolution and ID allocation for one run.
//!
//! The registry is the only place IDs are minted. Metabolites are keyed by their
//! canonical name with exact string matching; the first sighting of a name fixes
//! the row and later sightings only get its ID back.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::domain::{MetaboliteId, MultipletId, PeakId, SampleId, SpectrumId};
use crate::record::present;
use crate::resolver::MetaboliteProfile;
use crate::tables::Metabolite;

/// Boilerplate entry title shared by every record of the BMRB fragment-library screening study.
pub const SCREENING_PLACEHOLDER_TITLE: &str = "NMR quality control of fragment libraries for screening";

/// Descriptive columns stored with a metabolite the first time its name is seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaboliteAttributes {
    pub accession: Option<String>,
    pub description: Option<String>,
    pub chemical_formula: Option<String>,
    pub molecular_weight: Option<f64>,
    pub smiles: Option<String>,
    pub inchi: Option<String>,
}

impl From<&MetaboliteProfile> for MetaboliteAttributes {
    fn from(profile: &MetaboliteProfile) -> Self {
        Self {
            accession: profile.accession.clone(),
            description: profile.description.clone(),
            chemical_formula: profile.chemical_formula.clone(),
            molecular_weight: profile.molecular_weight,
            smiles: profile.smiles.clone(),
            inchi: profile.inchi.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Created(MetaboliteId),
    Existing(MetaboliteId),
}

impl Resolution {
    pub fn id(&self) -> MetaboliteId {
        match self {
            Resolution::Created(id) | Resolution::Existing(id) => *id,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Resolution::Created(_))
    }
}

#[derive(Debug, Default)]
pub struct EntityRegistry {
    metabolites: IndexMap<String, Metabolite>,
    by_accession: HashMap<String, String>,
    samples: u32,
    spectra: u32,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ID registered for `name`, allocating the next `SU:n` and
    /// storing `attributes` only when the name is new.
    pub fn resolve_metabolite(&mut self, name: &str, attributes: MetaboliteAttributes) -> Resolution {
        if let Some(existing) = self.metabolites.get(name) {
            return Resolution::Existing(existing.metabolite_id);
        }
        let metabolite_id = MetaboliteId::new(self.metabolites.len() as u32 + 1);
        if let Some(accession) = &attributes.accession {
            self.by_accession
                .entry(accession.clone())
                .or_insert_with(|| name.to_string());
        }
        self.metabolites.insert(
            name.to_string(),
            Metabolite {
                metabolite_id,
                accession: attributes.accession,
                name: name.to_string(),
                description: attributes.description,
                chemical_formula: attributes.chemical_formula,
                molecular_weight: attributes.molecular_weight,
                smiles: attributes.smiles,
                inchi: attributes.inchi,
            },
        );
        Resolution::Created(metabolite_id)
    }

    /// Canonical name of the first metabolite registered under `accession`.
    pub fn name_for_accession(&self, accession: &str) -> Option<&str> {
        self.by_accession.get(accession).map(String::as_str)
    }

    pub fn next_sample_id(&mut self) -> SampleId {
        self.samples += 1;
        SampleId::new(self.samples)
    }

    pub fn next_spectrum_id(&mut self) -> SpectrumId {
        self.spectra += 1;
        SpectrumId::new(self.spectra)
    }

    pub fn multiplet_id(&self, spectrum: SpectrumId, k: u32) -> MultipletId {
        MultipletId::new(spectrum, k)
    }

    pub fn peak_id(&self, spectrum: SpectrumId, k: u32) -> PeakId {
        PeakId::new(spectrum, k)
    }

    pub fn metabolite_count(&self) -> usize {
        self.metabolites.len()
    }

    /// Metabolite rows in allocation order.
    pub fn metabolites(&self) -> impl Iterator<Item = &Metabolite> {
        self.metabolites.values()
    }
}

/// Derives the identity key for a record.
///
/// A curated title is used verbatim (trimmed). When the title is missing or one
/// of `placeholders`, the chemical component name is used instead, lower-cased
/// with spaces, hyphens and commas turned into underscores.
pub fn canonical_name(
    title: Option<&str>,
    component_name: Option<&str>,
    placeholders: &[String],
) -> Option<String> {
    if let Some(title) = title.and_then(present) {
        let generic = placeholders
            .iter()
            .any(|placeholder| placeholder.trim().eq_ignore_ascii_case(title));
        if !generic {
            return Some(title.to_string());
        }
    }
    component_name.and_then(present).map(|name| {
        name.chars()
            .map(|ch| match ch {
                ' ' | '-' | ',' => '_',
                other => other,
            })
            .collect::<String>()
            .to_lowercase()
    })
}
