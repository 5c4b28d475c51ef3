// JSON persistence for crawl output

use divcrawl_scanner::{DivisionNode, RetryEntry};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, DataError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> DataError + '_ {
    move |source| DataError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path) -> impl FnOnce(serde_json::Error) -> DataError + '_ {
    move |source| DataError::Json {
        path: path.display().to_string(),
        source,
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, pretty: bool) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io_error(path))?;
    }

    let file = File::create(path).map_err(io_error(path))?;
    let mut writer = BufWriter::new(file);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value).map_err(json_error(path))?;
    } else {
        serde_json::to_writer(&mut writer, value).map_err(json_error(path))?;
    }
    writer.flush().map_err(io_error(path))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(io_error(path))?;
    serde_json::from_reader(BufReader::new(file)).map_err(json_error(path))
}

/// Write records as one JSON array. Non-ASCII text is written as-is.
pub fn write_records(path: &Path, records: &[DivisionNode], pretty: bool) -> Result<()> {
    write_json(path, records, pretty)?;
    info!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

pub fn read_records(path: &Path) -> Result<Vec<DivisionNode>> {
    read_json(path)
}

pub fn write_retries(path: &Path, retries: &[RetryEntry]) -> Result<()> {
    write_json(path, retries, true)?;
    info!("Wrote {} retry entries to {}", retries.len(), path.display());
    Ok(())
}

pub fn read_retries(path: &Path) -> Result<Vec<RetryEntry>> {
    read_json(path)
}

/// Append newly found records to an existing output file, creating it if needed.
pub fn merge_records(path: &Path, new_records: &[DivisionNode], pretty: bool) -> Result<usize> {
    let mut records = if path.exists() {
        read_records(path)?
    } else {
        Vec::new()
    };
    records.extend_from_slice(new_records);
    write_records(path, &records, pretty)?;
    Ok(records.len())
}
