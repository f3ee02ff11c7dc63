//! Persistence of a finished run. Every sink replaces what it held before; nothing is appended.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use rusqlite::{Connection, Statement, Transaction, params};
use serde::{Deserialize, Serialize};

use crate::error::NmrError;
use crate::tables::{TABLE_NAMES, Tables};

pub trait Sink {
    /// Human-readable destination, for logs.
    fn describe(&self) -> String;

    /// Replaces every output table with the rows of `tables`.
    fn replace_all(&mut self, tables: &Tables) -> Result<(), NmrError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[default]
    Sqlite,
    Json,
}

pub fn open(kind: OutputKind, path: &Path) -> Result<Box<dyn Sink>, NmrError> {
    match kind {
        OutputKind::Sqlite => Ok(Box::new(SqliteSink::new(path))),
        OutputKind::Json => Ok(Box::new(JsonDirSink::new(path)?)),
    }
}

const SCHEMA: [(&str, &str); 8] = [
    (
        "metabolites",
        "metabolite_id TEXT PRIMARY KEY, accession TEXT, name TEXT NOT NULL UNIQUE, \
         description TEXT, chemical_formula TEXT, molecular_weight REAL, smiles TEXT, inchi TEXT",
    ),
    (
        "samples",
        "sample_id TEXT PRIMARY KEY, metabolite_id TEXT NOT NULL REFERENCES metabolites (metabolite_id), \
         pH REAL, temperature REAL, amount REAL, units TEXT, reference TEXT, solvent TEXT",
    ),
    (
        "spectra",
        "spectrum_id TEXT PRIMARY KEY, sample_id TEXT NOT NULL REFERENCES samples (sample_id), frequency REAL",
    ),
    (
        "multiplets",
        "multiplet_id TEXT PRIMARY KEY, spectrum_id TEXT NOT NULL REFERENCES spectra (spectrum_id), \
         center REAL NOT NULL, atom_ref TEXT, multiplicity TEXT",
    ),
    (
        "peaks",
        "peak_id TEXT PRIMARY KEY, spectrum_id TEXT NOT NULL REFERENCES spectra (spectrum_id), \
         multiplet_id TEXT REFERENCES multiplets (multiplet_id), shift REAL NOT NULL, \
         intensity REAL NOT NULL, width REAL",
    ),
    (
        "synonyms",
        "metabolite_id TEXT NOT NULL REFERENCES metabolites (metabolite_id), synonym TEXT NOT NULL",
    ),
    (
        "isin",
        "metabolite_id TEXT NOT NULL REFERENCES metabolites (metabolite_id), \"group\" TEXT NOT NULL",
    ),
    ("ontology", "\"group\" TEXT PRIMARY KEY, definition TEXT"),
];

/// Writes all tables into one SQLite file inside a single transaction.
pub struct SqliteSink {
    path: PathBuf,
}

impl SqliteSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    fn write(tx: &Transaction<'_>, tables: &Tables) -> Result<(), NmrError> {
        for name in TABLE_NAMES.iter().rev() {
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {name};"))
                .map_err(sink_error)?;
        }
        for (name, columns) in SCHEMA {
            tx.execute_batch(&format!("CREATE TABLE {name} ({columns});"))
                .map_err(sink_error)?;
        }

        insert_all(
            tx,
            "INSERT INTO metabolites VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            &tables.metabolites,
            |stmt, row| {
                stmt.execute(params![
                    row.metabolite_id.to_string(),
                    row.accession,
                    row.name,
                    row.description,
                    row.chemical_formula,
                    row.molecular_weight,
                    row.smiles,
                    row.inchi
                ])
            },
        )?;
        insert_all(
            tx,
            "INSERT INTO samples VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            &tables.samples,
            |stmt, row| {
                stmt.execute(params![
                    row.sample_id.to_string(),
                    row.metabolite_id.to_string(),
                    row.ph,
                    row.temperature,
                    row.amount,
                    row.units,
                    row.reference,
                    row.solvent
                ])
            },
        )?;
        insert_all(
            tx,
            "INSERT INTO spectra VALUES (?1, ?2, ?3)",
            &tables.spectra,
            |stmt, row| {
                stmt.execute(params![
                    row.spectrum_id.to_string(),
                    row.sample_id.to_string(),
                    row.frequency
                ])
            },
        )?;
        insert_all(
            tx,
            "INSERT INTO multiplets VALUES (?1, ?2, ?3, ?4, ?5)",
            &tables.multiplets,
            |stmt, row| {
                stmt.execute(params![
                    row.multiplet_id.to_string(),
                    row.spectrum_id.to_string(),
                    row.center,
                    row.atom_ref,
                    row.multiplicity
                ])
            },
        )?;
        insert_all(
            tx,
            "INSERT INTO peaks VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            &tables.peaks,
            |stmt, row| {
                stmt.execute(params![
                    row.peak_id.to_string(),
                    row.spectrum_id.to_string(),
                    row.multiplet_id.map(|id| id.to_string()),
                    row.shift,
                    row.intensity,
                    row.width
                ])
            },
        )?;
        insert_all(
            tx,
            "INSERT INTO synonyms VALUES (?1, ?2)",
            &tables.synonyms,
            |stmt, row| stmt.execute(params![row.metabolite_id.to_string(), row.synonym]),
        )?;
        insert_all(
            tx,
            "INSERT INTO isin VALUES (?1, ?2)",
            &tables.isin,
            |stmt, row| stmt.execute(params![row.metabolite_id.to_string(), row.group]),
        )?;
        insert_all(
            tx,
            "INSERT INTO ontology VALUES (?1, ?2)",
            &tables.ontology,
            |stmt, row| stmt.execute(params![row.group, row.definition]),
        )?;
        Ok(())
    }
}

impl Sink for SqliteSink {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn replace_all(&mut self, tables: &Tables) -> Result<(), NmrError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| NmrError::Filesystem(err.to_string()))?;
        }
        let mut conn = Connection::open(&self.path).map_err(sink_error)?;
        let tx = conn.transaction().map_err(sink_error)?;
        Self::write(&tx, tables)?;
        tx.commit().map_err(sink_error)
    }
}

fn insert_all<T>(
    tx: &Transaction<'_>,
    sql: &str,
    rows: &[T],
    mut insert: impl FnMut(&mut Statement<'_>, &T) -> rusqlite::Result<usize>,
) -> Result<(), NmrError> {
    let mut stmt = tx.prepare(sql).map_err(sink_error)?;
    for row in rows {
        insert(&mut stmt, row).map_err(sink_error)?;
    }
    Ok(())
}

fn sink_error(err: rusqlite::Error) -> NmrError {
    NmrError::Sink(err.to_string())
}

/// Writes one pretty-printed `<table>.json` array per table into a directory.
pub struct JsonDirSink {
    root: Utf8PathBuf,
}

impl JsonDirSink {
    pub fn new(root: &Path) -> Result<Self, NmrError> {
        let root = Utf8PathBuf::from_path_buf(root.to_path_buf())
            .map_err(|path| NmrError::Sink(format!("non UTF-8 output path {}", path.display())))?;
        Ok(Self { root })
    }

    pub fn table_path(&self, table: &str) -> Utf8PathBuf {
        self.root.join(format!("{table}.json"))
    }

    fn write_table<T: Serialize>(&self, table: &str, rows: &[T]) -> Result<(), NmrError> {
        let path = self.table_path(table);
        let content =
            serde_json::to_vec_pretty(rows).map_err(|err| NmrError::Sink(err.to_string()))?;
        write_atomic(&path, &content)
    }
}

impl Sink for JsonDirSink {
    fn describe(&self) -> String {
        format!("json:{}", self.root)
    }

    fn replace_all(&mut self, tables: &Tables) -> Result<(), NmrError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| NmrError::Filesystem(err.to_string()))?;
        self.write_table("metabolites", &tables.metabolites)?;
        self.write_table("samples", &tables.samples)?;
        self.write_table("spectra", &tables.spectra)?;
        self.write_table("multiplets", &tables.multiplets)?;
        self.write_table("peaks", &tables.peaks)?;
        self.write_table("synonyms", &tables.synonyms)?;
        self.write_table("isin", &tables.isin)?;
        self.write_table("ontology", &tables.ontology)?;
        Ok(())
    }
}

fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), NmrError> {
    let parent = path.parent().unwrap_or(Utf8Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix("nmr-table")
        .suffix(".tmp")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| NmrError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| NmrError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| NmrError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Keeps the last written tables in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub tables: Option<Tables>,
    pub writes: usize,
}

impl Sink for MemorySink {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn replace_all(&mut self, tables: &Tables) -> Result<(), NmrError> {
        self.tables = Some(tables.clone());
        self.writes += 1;
        Ok(())
    }
}
