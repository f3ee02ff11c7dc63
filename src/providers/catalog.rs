//! HMDB metabolite catalog (`hmdb_metabolites.xml`).

use std::path::Path;

use roxmltree::{Document, Node};

use crate::error::NmrError;
use crate::providers::read_text;
use crate::registry::MetaboliteAttributes;
use crate::resolver::parse_number;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub accession: String,
    pub name: String,
    pub description: Option<String>,
    pub chemical_formula: Option<String>,
    pub molecular_weight: Option<f64>,
    pub smiles: Option<String>,
    pub inchi: Option<String>,
    pub synonyms: Vec<String>,
    /// Ontology terms with the definition of the node that holds them.
    pub ontology: Vec<(String, Option<String>)>,
}

impl CatalogEntry {
    pub fn attributes(&self) -> MetaboliteAttributes {
        MetaboliteAttributes {
            accession: Some(self.accession.clone()),
            description: self.description.clone(),
            chemical_formula: self.chemical_formula.clone(),
            molecular_weight: self.molecular_weight,
            smiles: self.smiles.clone(),
            inchi: self.inchi.clone(),
        }
    }
}

pub fn load(path: &Path) -> Result<Vec<CatalogEntry>, NmrError> {
    let text = read_text(path)?;
    parse(&path.display().to_string(), &text)
}

/// Every `metabolite` element that has both an accession and a name.
pub fn parse(origin: &str, text: &str) -> Result<Vec<CatalogEntry>, NmrError> {
    let document = Document::parse(text).map_err(|err| NmrError::malformed(origin, err))?;
    Ok(document
        .root_element()
        .descendants()
        .filter(|node| node.has_tag_name("metabolite"))
        .filter_map(entry)
        .collect())
}

fn entry(node: Node) -> Option<CatalogEntry> {
    let accession = child_text(node, "accession")?;
    let name = child_text(node, "name")?;
    let synonyms = node
        .children()
        .filter(|child| child.has_tag_name("synonyms"))
        .flat_map(|list| list.children().filter(|child| child.has_tag_name("synonym")))
        .filter_map(text_of)
        .collect();
    let ontology = node
        .children()
        .filter(|child| child.has_tag_name("ontology"))
        .flat_map(|tree| tree.descendants().filter(|child| child.has_tag_name("term")))
        .filter_map(|term| {
            let group = text_of(term)?;
            let definition = term.parent().and_then(|parent| child_text(parent, "definition"));
            Some((group, definition))
        })
        .collect();
    Some(CatalogEntry {
        accession,
        name,
        description: child_text(node, "description"),
        chemical_formula: child_text(node, "chemical_formula"),
        molecular_weight: child_text(node, "average_molecular_weight")
            .as_deref()
            .and_then(parse_number),
        smiles: child_text(node, "smiles"),
        inchi: child_text(node, "inchi"),
        synonyms,
        ontology,
    })
}

fn child_text(node: Node, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(text_of)
}

fn text_of(node: Node) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
