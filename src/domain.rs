use std::fmt;
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::NmrError;

macro_rules! counted_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name(u32);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new(number: u32) -> Self {
                Self(number)
            }

            pub fn number(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", Self::PREFIX, self.0)
            }
        }

        impl FromStr for $name {
            type Err = NmrError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let number = value
                    .trim()
                    .strip_prefix(Self::PREFIX)
                    .and_then(|rest| rest.strip_prefix(':'))
                    .and_then(|rest| rest.parse::<u32>().ok())
                    .filter(|number| *number > 0)
                    .ok_or_else(|| NmrError::InvalidId(value.to_string()))?;
                Ok(Self(number))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = NmrError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

macro_rules! scoped_id {
    ($name:ident, $prefix:literal) => {
        /// Identifier derived from its spectrum's number and a 1-based position inside it.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name {
            spectrum: u32,
            index: u32,
        }

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            pub fn new(spectrum: SpectrumId, index: u32) -> Self {
                Self {
                    spectrum: spectrum.number(),
                    index,
                }
            }

            pub fn spectrum(&self) -> SpectrumId {
                SpectrumId::new(self.spectrum)
            }

            pub fn index(&self) -> u32 {
                self.index
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}.{}", Self::PREFIX, self.spectrum, self.index)
            }
        }

        impl FromStr for $name {
            type Err = NmrError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let invalid = || NmrError::InvalidId(value.to_string());
                let rest = value
                    .trim()
                    .strip_prefix(Self::PREFIX)
                    .and_then(|rest| rest.strip_prefix(':'))
                    .ok_or_else(invalid)?;
                let (spectrum, index) = rest.split_once('.').ok_or_else(invalid)?;
                let spectrum = spectrum.parse::<u32>().map_err(|_| invalid())?;
                let index = index.parse::<u32>().map_err(|_| invalid())?;
                if spectrum == 0 || index == 0 {
                    return Err(invalid());
                }
                Ok(Self { spectrum, index })
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = NmrError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

counted_id!(MetaboliteId, "SU");
counted_id!(SampleId, "SA");
counted_id!(SpectrumId, "SP");
scoped_id!(MultipletId, "MT");
scoped_id!(PeakId, "PK");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SourceFormat {
    Star,
    Nmrml,
    HmdbXml,
    PeakText,
}

impl SourceFormat {
    /// Infers the format from a file name; `.gz` suffixes are looked through.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);
        if name.ends_with(".str") || name.ends_with(".star") || name.ends_with(".nmrstr") {
            Some(SourceFormat::Star)
        } else if name.ends_with(".nmrml") {
            Some(SourceFormat::Nmrml)
        } else if name.ends_with(".xml") {
            Some(SourceFormat::HmdbXml)
        } else if name.ends_with(".txt") {
            Some(SourceFormat::PeakText)
        } else {
            None
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Star => write!(f, "star"),
            SourceFormat::Nmrml => write!(f, "nmrml"),
            SourceFormat::HmdbXml => write!(f, "hmdb-xml"),
            SourceFormat::PeakText => write!(f, "peak-text"),
        }
    }
}

impl FromStr for SourceFormat {
    type Err = NmrError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "star" | "nmr-star" | "bmrb" => Ok(SourceFormat::Star),
            "nmrml" => Ok(SourceFormat::Nmrml),
            "hmdb-xml" | "hmdb" | "xml" => Ok(SourceFormat::HmdbXml),
            "peak-text" | "text" | "txt" => Ok(SourceFormat::PeakText),
            _ => Err(NmrError::InvalidFormat(value.to_string())),
        }
    }
}

/// Canonical processing order; ID allocation depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RecordOrder {
    #[default]
    Accession,
    Path,
    Discovery,
}

impl FromStr for RecordOrder {
    type Err = NmrError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "accession" => Ok(RecordOrder::Accession),
            "path" => Ok(RecordOrder::Path),
            "discovery" => Ok(RecordOrder::Discovery),
            _ => Err(NmrError::InvalidOrder(value.to_string())),
        }
    }
}
