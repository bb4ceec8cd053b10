//! CSV and JSON output.
//!
//! Both files are written to temporary files next to their destination and
//! only renamed into place once both were written. If the JSON rename fails
//! after the CSV one succeeded, the previous CSV is restored from a backup,
//! so the pair on disk always comes from the same run.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{CanonicalField, ResultSet};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to move output into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: &Path, base_filename: &str) -> Self {
        Self {
            csv: dir.join(format!("{base_filename}.csv")),
            json: dir.join(format!("{base_filename}.json")),
        }
    }
}

/// Writes the header row and one row per record.
pub fn write_csv<W: Write>(records: &ResultSet, writer: W) -> Result<(), ExportError> {
    let mut out = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    out.write_record(CanonicalField::ALL.map(CanonicalField::column_name))?;
    for record in records.iter() {
        out.write_record(CanonicalField::ALL.map(|field| record.field(field)))?;
    }
    out.flush()?;
    Ok(())
}

/// Writes the records as a pretty-printed JSON array of objects.
pub fn write_json<W: Write>(records: &ResultSet, writer: W) -> Result<(), ExportError> {
    let mut out = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut out, records)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

/// Writes `<base>.csv` and `<base>.json` under `dir`, replacing prior output.
pub fn write_outputs(
    records: &ResultSet,
    dir: &Path,
    base_filename: &str,
) -> Result<OutputPaths, ExportError> {
    fs::create_dir_all(dir)?;
    let paths = OutputPaths::new(dir, base_filename);

    let mut csv_tmp = NamedTempFile::new_in(dir)?;
    write_csv(records, csv_tmp.as_file_mut())?;
    let mut json_tmp = NamedTempFile::new_in(dir)?;
    write_json(records, json_tmp.as_file_mut())?;

    let backup = if paths.csv.exists() {
        let backup = NamedTempFile::new_in(dir)?;
        fs::copy(&paths.csv, backup.path())?;
        Some(backup)
    } else {
        None
    };

    csv_tmp.persist(&paths.csv)?;
    if let Err(err) = json_tmp.persist(&paths.json) {
        warn!(json = %paths.json.display(), error = %err, "JSON rename failed, rolling back CSV");
        match backup {
            Some(backup) => {
                backup.persist(&paths.csv)?;
            }
            None => fs::remove_file(&paths.csv)?,
        }
        return Err(err.into());
    }

    info!(
        csv = %paths.csv.display(),
        json = %paths.json.display(),
        records = records.len(),
        "Wrote output files"
    );
    Ok(paths)
}
