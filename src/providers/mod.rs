//! Format adapters. Each parses one file into a [`MemoryRecord`] laid out in
//! NMR-STAR categories, so the assembler sees a single shape regardless of source.

use std::fs;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;

use crate::domain::SourceFormat;
use crate::error::NmrError;
use crate::record::MemoryRecord;

pub mod catalog;
pub mod hmdb_xml;
pub mod nmrml;
pub mod peak_text;
pub mod single;
pub mod star;

/// Parses `path` with the adapter for `format`.
pub fn load(path: &Path, format: SourceFormat) -> Result<MemoryRecord, NmrError> {
    let text = read_text(path)?;
    let origin = path.display().to_string();
    match format {
        SourceFormat::Star => star::parse(&origin, &text),
        SourceFormat::Nmrml => nmrml::parse(&origin, &file_stem(path), &text),
        SourceFormat::HmdbXml => hmdb_xml::parse(&origin, &text),
        SourceFormat::PeakText => peak_text::parse(&origin, &file_stem(path), &text),
    }
}

/// Reads a whole file as UTF-8, decompressing it first when it ends in `.gz`.
pub fn read_text(path: &Path) -> Result<String, NmrError> {
    let bytes = fs::read(path)
        .map_err(|err| NmrError::Filesystem(format!("read {}: {err}", path.display())))?;
    let gzipped = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if !gzipped {
        return String::from_utf8(bytes).map_err(|err| NmrError::malformed(path.display(), err));
    }
    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|err| NmrError::malformed(path.display(), format!("gzip: {err}")))?;
    Ok(text)
}

/// File name with `.gz` and the format extension removed.
pub fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    match name.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => name.to_string(),
    }
}
