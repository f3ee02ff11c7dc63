mod common;

use std::fs;

use rusqlite::Connection;

use nmr_normalizer::pipeline::{NormalizationPipeline, SilentProgress};
use nmr_normalizer::sink::{self, JsonDirSink, OutputKind, Sink, SqliteSink};
use nmr_normalizer::tables::TABLE_NAMES;

use common::{glucose, proton_record};

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn sqlite_rerun_replaces_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out").join("nmr_metabolites.db");

    let mut first = NormalizationPipeline::default();
    first.process(&glucose()).unwrap();
    first
        .process(&proton_record("Alanine", &["1.47"], &["1"]))
        .unwrap();
    let mut sink = SqliteSink::new(&path);
    first.finish(&mut sink, &SilentProgress).unwrap();

    let conn = Connection::open(&path).unwrap();
    assert_eq!(count(&conn, "metabolites"), 2);
    assert_eq!(count(&conn, "peaks"), 3);
    drop(conn);

    let mut second = NormalizationPipeline::default();
    second.process(&glucose()).unwrap();
    second.finish(&mut sink, &SilentProgress).unwrap();

    let conn = Connection::open(&path).unwrap();
    assert_eq!(count(&conn, "metabolites"), 1);
    assert_eq!(count(&conn, "samples"), 1);
    assert_eq!(count(&conn, "multiplets"), 2);
    assert_eq!(count(&conn, "peaks"), 2);
    assert_eq!(count(&conn, "synonyms"), 0);

    let (peak_id, multiplet_id, width): (String, Option<String>, Option<f64>) = conn
        .query_row(
            "SELECT peak_id, multiplet_id, width FROM peaks ORDER BY shift LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(peak_id, "PK:1.1");
    assert_eq!(multiplet_id.as_deref(), Some("MT:1.1"));
    assert_eq!(width, Some(0.004));

    let name: String = conn
        .query_row(
            "SELECT m.name FROM samples s JOIN metabolites m ON m.metabolite_id = s.metabolite_id",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(name, "Glucose");
}

#[test]
fn json_directory_holds_one_file_per_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = NormalizationPipeline::default();
    pipeline.process(&glucose()).unwrap();

    let mut sink = sink::open(OutputKind::Json, dir.path()).unwrap();
    assert!(sink.describe().starts_with("json:"));
    pipeline.finish(sink.as_mut(), &SilentProgress).unwrap();
    pipeline.finish(sink.as_mut(), &SilentProgress).unwrap();

    for table in TABLE_NAMES {
        assert!(dir.path().join(format!("{table}.json")).is_file(), "{table}");
    }
    let leftovers = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);

    let peaks: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("peaks.json")).unwrap()).unwrap();
    let peaks = peaks.as_array().unwrap();
    assert_eq!(peaks.len(), 2);
    assert_eq!(peaks[0]["peak_id"], "PK:1.1");
    assert_eq!(peaks[0]["shift"], 1.23);

    let samples: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("samples.json")).unwrap())
            .unwrap();
    assert!(samples[0]["pH"].is_null());
    assert_eq!(samples[0]["metabolite_id"], "SU:1");
}

#[test]
fn json_sink_reports_its_table_paths() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonDirSink::new(dir.path()).unwrap();
    assert!(sink.table_path("isin").as_str().ends_with("isin.json"));
}
