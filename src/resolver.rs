//! Ordered-strategy extraction of logical fields from a [`RecordSource`].
//!
//! A field is described by a [`FieldSpec`]: an ordered list of places it may
//! live. Resolution never fails; a field that cannot be found is `None` and the
//! caller decides whether that matters.

use tracing::debug;

use crate::record::{Loop, RecordSource, present};

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// A dotted `Category.tag` path.
    Tag(String),
    /// First present `column` value of a row whose `filter_column` matches `filter_value`.
    LoopLookup {
        category: String,
        filter_column: String,
        filter_value: String,
        column: String,
    },
    /// `tag` of the first saveframe of `category` whose `key_tag` is one of `keys`.
    SaveframeTag {
        category: String,
        key_tag: String,
        keys: Vec<String>,
        tag: String,
    },
}

impl Strategy {
    pub fn tag(path: &str) -> Self {
        Strategy::Tag(path.to_string())
    }

    pub fn loop_lookup(category: &str, filter_column: &str, filter_value: &str, column: &str) -> Self {
        Strategy::LoopLookup {
            category: category.to_string(),
            filter_column: filter_column.to_string(),
            filter_value: filter_value.to_string(),
            column: column.to_string(),
        }
    }

    pub fn saveframe_tag(category: &str, key_tag: &str, keys: &[String], tag: &str) -> Self {
        Strategy::SaveframeTag {
            category: category.to_string(),
            key_tag: key_tag.to_string(),
            keys: keys.to_vec(),
            tag: tag.to_string(),
        }
    }

    fn extract(&self, record: &dyn RecordSource) -> Option<String> {
        match self {
            Strategy::Tag(path) => record
                .get_tag(path)
                .iter()
                .find_map(|value| present(value).map(str::to_string)),
            Strategy::LoopLookup {
                category,
                filter_column,
                filter_value,
                column,
            } => record.get_loops(category).iter().find_map(|table| {
                table
                    .find_value(filter_column, filter_value, column)
                    .map(str::to_string)
            }),
            Strategy::SaveframeTag {
                category,
                key_tag,
                keys,
                tag,
            } => record
                .get_saveframe_tags(category)
                .iter()
                .filter(|frame| {
                    frame
                        .get(key_tag)
                        .map(|key| keys.iter().any(|wanted| wanted == key))
                        .unwrap_or(false)
                })
                .find_map(|frame| frame.get(tag).map(str::to_string)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    name: &'static str,
    strategies: Vec<Strategy>,
}

impl FieldSpec {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            strategies: Vec::new(),
        }
    }

    pub fn or(mut self, strategy: Strategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldResolver;

impl FieldResolver {
    /// Result of the first strategy that yields a present value.
    pub fn resolve(&self, record: &dyn RecordSource, spec: &FieldSpec) -> Option<String> {
        let value = spec
            .strategies()
            .iter()
            .find_map(|strategy| strategy.extract(record));
        if value.is_none() {
            debug!(origin = record.origin(), field = spec.name(), "field not found");
        }
        value
    }

    /// Like [`resolve`](Self::resolve) but parsed as a float; unparsable reads as absent.
    pub fn resolve_number(&self, record: &dyn RecordSource, spec: &FieldSpec) -> Option<f64> {
        self.resolve(record, spec)
            .as_deref()
            .and_then(parse_number)
    }
}

pub fn parse_number(raw: &str) -> Option<f64> {
    present(raw)
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

/// Row lookup inside one already-selected table.
pub fn table_value<'a>(table: &'a Loop, filter_column: &str, filter_value: &str, column: &str) -> Option<&'a str> {
    table.find_value(filter_column, filter_value, column)
}

pub fn table_number(table: &Loop, filter_column: &str, filter_value: &str, column: &str) -> Option<f64> {
    table_value(table, filter_column, filter_value, column).and_then(parse_number)
}

/// Converts a temperature to Kelvin based on its unit label; unknown labels are taken as Kelvin.
pub fn to_kelvin(value: f64, units: Option<&str>) -> f64 {
    match units.map(|unit| unit.trim().trim_start_matches('°').to_ascii_lowercase()) {
        Some(unit) if unit == "c" || unit == "celsius" || unit == "degc" => value + 273.15,
        _ => value,
    }
}

/// Lookup chains for metabolite-level attributes.
pub mod fields {
    use super::{FieldSpec, Strategy};

    pub fn accession() -> FieldSpec {
        FieldSpec::new("accession")
            .or(Strategy::tag("Entry.ID"))
            .or(Strategy::tag("Chem_comp.BMRB_code"))
    }

    pub fn title() -> FieldSpec {
        FieldSpec::new("title").or(Strategy::tag("Entry.Title"))
    }

    pub fn component_name() -> FieldSpec {
        FieldSpec::new("component_name")
            .or(Strategy::tag("Chem_comp.Name"))
            .or(Strategy::tag("Assembly.Name"))
    }

    pub fn description() -> FieldSpec {
        FieldSpec::new("description").or(Strategy::tag("Chem_comp.Details"))
    }

    pub fn chemical_formula() -> FieldSpec {
        FieldSpec::new("chemical_formula").or(Strategy::tag("Chem_comp.Formula"))
    }

    pub fn molecular_weight() -> FieldSpec {
        FieldSpec::new("molecular_weight").or(Strategy::tag("Chem_comp.Formula_weight"))
    }

    pub fn smiles() -> FieldSpec {
        FieldSpec::new("smiles")
            .or(Strategy::loop_lookup("Chem_comp_SMILES", "Type", "canonical", "String"))
            .or(Strategy::loop_lookup("Chem_comp_descriptor", "Type", "SMILES", "Descriptor"))
    }

    pub fn inchi() -> FieldSpec {
        FieldSpec::new("inchi")
            .or(Strategy::tag("Chem_comp.InChI_code"))
            .or(Strategy::loop_lookup("Chem_comp_descriptor", "Type", "InChI", "Descriptor"))
    }

    pub fn synonym_tag() -> FieldSpec {
        FieldSpec::new("synonym").or(Strategy::tag("Chem_comp.Synonyms"))
    }
}

/// Metabolite-level attributes read from one record, before canonicalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaboliteProfile {
    pub accession: Option<String>,
    pub title: Option<String>,
    pub component_name: Option<String>,
    pub description: Option<String>,
    pub chemical_formula: Option<String>,
    pub molecular_weight: Option<f64>,
    pub smiles: Option<String>,
    pub inchi: Option<String>,
}

impl MetaboliteProfile {
    pub fn from_record(record: &dyn RecordSource) -> Self {
        let resolver = FieldResolver;
        Self {
            accession: resolver.resolve(record, &fields::accession()),
            title: resolver.resolve(record, &fields::title()),
            component_name: resolver.resolve(record, &fields::component_name()),
            description: resolver.resolve(record, &fields::description()),
            chemical_formula: resolver.resolve(record, &fields::chemical_formula()),
            molecular_weight: resolver.resolve_number(record, &fields::molecular_weight()),
            smiles: resolver.resolve(record, &fields::smiles()),
            inchi: resolver.resolve(record, &fields::inchi()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Loop, MemoryRecord, TagTable};

    fn record() -> MemoryRecord {
        MemoryRecord::new("mem")
            .with_tag("Entry.ID", "bmse000010")
            .with_tag("Chem_comp.Formula_weight", "not-a-number")
            .with_tag("Chem_comp.Synonyms", ".")
            .with_loop(
                Loop::new("Chem_comp_descriptor", &["Type", "Descriptor"])
                    .with_row(&["SMILES", "CC(N)C(=O)O"]),
            )
            .with_loop(
                Loop::new("Sample_condition_variable", &["Type", "Val"])
                    .with_row(&["pH", "N/A"])
                    .with_row(&["temperature", "298"]),
            )
            .with_saveframe(
                TagTable::new("NMR_spectrometer", "NMR_spectrometer")
                    .with_tag("ID", "1")
                    .with_tag("Field_strength", "600"),
            )
            .with_saveframe(
                TagTable::new("NMR_spectrometer", "NMR_spectrometer")
                    .with_tag("ID", "2")
                    .with_tag("Field_strength", "800"),
            )
    }

    #[test]
    fn falls_through_to_later_strategies() {
        let resolver = FieldResolver;
        assert_eq!(
            resolver.resolve(&record(), &fields::smiles()).as_deref(),
            Some("CC(N)C(=O)O")
        );
    }

    #[test]
    fn absent_and_sentinel_fields_resolve_to_none() {
        let resolver = FieldResolver;
        let record = record();
        assert_eq!(resolver.resolve(&record, &fields::title()), None);
        assert_eq!(resolver.resolve(&record, &fields::synonym_tag()), None);
        let ph = FieldSpec::new("pH").or(Strategy::loop_lookup(
            "Sample_condition_variable",
            "Type",
            "PH",
            "Val",
        ));
        assert_eq!(resolver.resolve(&record, &ph), None);
    }

    #[test]
    fn numeric_parse_failure_is_absent() {
        let resolver = FieldResolver;
        assert_eq!(resolver.resolve_number(&record(), &fields::molecular_weight()), None);
        assert_eq!(parse_number("5.25"), Some(5.25));
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn saveframe_lookup_is_joined_to_keys() {
        let resolver = FieldResolver;
        let spec = FieldSpec::new("frequency").or(Strategy::saveframe_tag(
            "NMR_spectrometer",
            "ID",
            &["2".to_string()],
            "Field_strength",
        ));
        assert_eq!(resolver.resolve_number(&record(), &spec), Some(800.0));
    }

    #[test]
    fn celsius_converts_to_kelvin() {
        assert!((to_kelvin(25.0, Some("°C")) - 298.15).abs() < 1e-9);
        assert_eq!(to_kelvin(298.0, Some("K")), 298.0);
        assert_eq!(to_kelvin(298.0, None), 298.0);
    }
}
