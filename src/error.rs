use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum NmrError {
    #[error("missing config file nmr-normalize.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("malformed source {path}: {message}")]
    MalformedSource { path: String, message: String },

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid source format: {0}")]
    InvalidFormat(String),

    #[error("invalid record order: {0}")]
    InvalidOrder(String),

    #[error("referential integrity violated: {0}")]
    Integrity(String),

    #[error("sink failed: {0}")]
    Sink(String),
}

impl NmrError {
    pub fn malformed(path: impl fmt::Display, message: impl fmt::Display) -> Self {
        NmrError::MalformedSource {
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

/// Hard gate that rejects a whole record before any row is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoPeakList,
    InsufficientChemicalShift,
    InsufficientIntensity,
}

impl RejectReason {
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::NoPeakList => "no_peak_list",
            RejectReason::InsufficientChemicalShift => "insufficient_chemical_shift",
            RejectReason::InsufficientIntensity => "insufficient_intensity",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NoPeakList => write!(f, "no spectral peak list"),
            RejectReason::InsufficientChemicalShift => {
                write!(f, "insufficient chemical shift data")
            }
            RejectReason::InsufficientIntensity => write!(f, "insufficient peak intensity data"),
        }
    }
}

/// Why a record contributed nothing to the output tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FailureKind {
    Rejected(RejectReason),
    Malformed,
    Unidentified,
}

impl FailureKind {
    pub const ALL: [FailureKind; 5] = [
        FailureKind::Rejected(RejectReason::NoPeakList),
        FailureKind::Rejected(RejectReason::InsufficientChemicalShift),
        FailureKind::Rejected(RejectReason::InsufficientIntensity),
        FailureKind::Malformed,
        FailureKind::Unidentified,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Rejected(reason) => reason.label(),
            FailureKind::Malformed => "malformed",
            FailureKind::Unidentified => "unidentified",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Rejected(reason) => write!(f, "{reason}"),
            FailureKind::Malformed => write!(f, "malformed source"),
            FailureKind::Unidentified => write!(f, "no resolvable metabolite name"),
        }
    }
}
