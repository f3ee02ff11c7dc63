use std::io::{self, Write};

use serde::Serialize;

use crate::pipeline::{ProgressEvent, ProgressSink, RunSummary};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_summary(&mut stdout, summary)
    }

    pub fn write_summary(out: &mut dyn Write, summary: &RunSummary) -> io::Result<()> {
        writeln!(out, "NMR normalization summary")?;
        writeln!(
            out,
            "records: {} total, {} accepted, {} skipped",
            summary.total,
            summary.accepted,
            summary.failed()
        )?;
        for (reason, count) in summary.failures.iter().filter(|(_, count)| **count > 0) {
            writeln!(out, "  skipped {reason}: {count}")?;
        }
        writeln!(out, "tables:")?;
        for (table, count) in &summary.rows {
            writeln!(out, "  {table}: {count}")?;
        }
        writeln!(out, "completed at {}", summary.completed_at)?;
        Ok(())
    }
}

/// Prints progress lines to stderr.
impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => eprintln!("{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => eprintln!("{}", event.message),
        }
    }
}
