//! Normalizes NMR spectral records (BMRB NMR-STAR, nmrML, HMDB spectrum XML and
//! legacy peak-list text) into one relational metabolite/sample/spectrum schema.

pub mod assembler;
pub mod config;
pub mod domain;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod providers;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod sink;
pub mod tables;
