use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use csv::ByteRecord;
use serde::Deserialize;
use tracing::warn;

use crate::error::AnalysisError;
use crate::models::{CategorizedRecord, EmployeeResult, RawEmployeeRow, ScoredRecord};

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.flexible(true).trim(csv::Trim::All);
    builder
}

/// Rows read from an employee export. A row the CSV layer cannot decode is
/// rejected on its own; the rest of the file still loads.
#[derive(Debug, Default)]
pub struct LoadedRows {
    pub rows: Vec<RawEmployeeRow>,
    pub rejected: Vec<AnalysisError>,
}

pub fn read_rows<R: Read>(source: R) -> anyhow::Result<LoadedRows> {
    let mut reader = reader_builder().from_reader(source);
    let headers = reader
        .byte_headers()
        .context("failed to read CSV header")?
        .clone();
    let id_column = headers.iter().position(|h| h == b"Employee_ID");

    let mut loaded = LoadedRows::default();
    let mut record = ByteRecord::new();
    let mut line = 0usize;
    while reader
        .read_byte_record(&mut record)
        .with_context(|| format!("malformed CSV after row {line}"))?
    {
        line += 1;
        match record.deserialize::<RawEmployeeRow>(Some(&headers)) {
            Ok(row) => loaded.rows.push(row),
            Err(err) => {
                let employee_id = id_column
                    .and_then(|idx| record.get(idx))
                    .and_then(|raw| std::str::from_utf8(raw).ok())
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("<row {line}>"));
                warn!(row = line, %err, "unreadable CSV row");
                loaded.rejected.push(AnalysisError::invalid(
                    employee_id,
                    format!("unreadable CSV row {line}: {err}"),
                ));
            }
        }
    }
    Ok(loaded)
}

pub fn load_rows(path: &Path) -> anyhow::Result<LoadedRows> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_rows(file)
}

/// Results of external models for one employee.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Annotation {
    #[serde(rename = "Employee_ID")]
    pub employee_id: String,
    pub cluster: Option<usize>,
    pub attrition_probability: Option<f64>,
}

pub fn read_annotations<R: Read>(source: R) -> anyhow::Result<HashMap<String, Annotation>> {
    let mut reader = reader_builder().from_reader(source);
    let mut annotations = HashMap::new();
    for result in reader.deserialize::<Annotation>() {
        let annotation = result.context("malformed annotation row")?;
        if let Some(p) = annotation.attrition_probability {
            anyhow::ensure!(
                (0.0..=1.0).contains(&p),
                "attrition probability {p} for {} is outside 0..=1",
                annotation.employee_id
            );
        }
        annotations.insert(annotation.employee_id.clone(), annotation);
    }
    Ok(annotations)
}

pub fn load_annotations(path: &Path) -> anyhow::Result<HashMap<String, Annotation>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_annotations(file)
}

/// Attach externally produced cluster ids and attrition probabilities.
pub fn apply_annotations(
    records: Vec<ScoredRecord>,
    annotations: &HashMap<String, Annotation>,
) -> Vec<ScoredRecord> {
    records
        .into_iter()
        .map(|record| match annotations.get(record.employee_id()) {
            Some(annotation) => ScoredRecord {
                cluster: annotation.cluster.or(record.cluster),
                attrition_probability: annotation
                    .attrition_probability
                    .or(record.attrition_probability),
                ..record
            },
            None => record,
        })
        .collect()
}

/// One line per categorized employee: scores, category and any model output.
pub fn write_results<W: Write>(sink: W, records: &[CategorizedRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    for record in records {
        writer
            .serialize(EmployeeResult::from_record(record))
            .with_context(|| format!("failed to write result for {}", record.employee_id()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_results(path: &Path, records: &[CategorizedRecord]) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_results(file, records)
}
