// src/output/writer.rs
//! File-backed sinks.
//!
//! This module is the only place where file I/O for rows occurs. Each job
//! gets its own directory under the output root; each row kind gets one
//! JSON-lines file in it whose first line is the header.

use super::types::RowKind;
use super::{RowSink, SinkFactory};
use crate::error::AppError;
use crate::types::JobId;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes `<output_dir>/<job_id>/<job_id>_<kind>.jsonl`.
#[derive(Debug, Clone)]
pub struct JsonLinesSinkFactory {
    output_dir: PathBuf,
}

impl JsonLinesSinkFactory {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the file holding `kind` rows for `job_id`.
    pub fn path_for(&self, job_id: &JobId, kind: RowKind) -> PathBuf {
        self.output_dir
            .join(job_id.as_str())
            .join(format!("{}_{}.jsonl", job_id, kind.plural()))
    }
}

impl SinkFactory for JsonLinesSinkFactory {
    fn open(&self, job_id: &JobId, kind: RowKind) -> Result<Box<dyn RowSink>, AppError> {
        let path = self.path_for(job_id, kind);
        if let Some(parent) = path.parent() {
            create_directory(parent)?;
        }
        let file = File::create(&path)?;
        log::debug!("Opened {} sink at {}", kind, path.display());
        Ok(Box::new(JsonLinesSink {
            path,
            writer: BufWriter::new(file),
            rows: 0,
        }))
    }
}

/// One JSON array per line.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl JsonLinesSink {
    fn write_line<T: serde::Serialize + ?Sized>(&mut self, line: &T) -> Result<(), AppError> {
        serde_json::to_writer(&mut self.writer, line)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl RowSink for JsonLinesSink {
    fn write_header(&mut self, columns: &[&str]) -> Result<(), AppError> {
        self.write_line(columns)
    }

    fn write_row(&mut self, fields: &[String]) -> Result<(), AppError> {
        self.write_line(fields)?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), AppError> {
        self.writer.flush()?;
        log::info!("Wrote {} rows to {}", self.rows, self.path.display());
        Ok(())
    }
}

/// Creates a directory, tolerating one that already exists.
fn create_directory(path: &Path) -> Result<(), AppError> {
    if path.exists() {
        if path.is_dir() {
            return Ok(());
        }
        return Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("Path exists but is not a directory: {}", path.display()),
        )));
    }
    fs::create_dir_all(path)?;
    log::debug!("Created directory: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn job_id() -> JobId {
        let at = chrono::Utc.with_ymd_and_hms(2017, 6, 1, 12, 30, 0).unwrap();
        JobId::new(at, "page_feed", &NodeId::parse("G1").unwrap())
    }

    #[test]
    fn writes_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let factory = JsonLinesSinkFactory::new(dir.path());
        let id = job_id();

        let mut sink = factory.open(&id, RowKind::Reaction).unwrap();
        sink.write_header(RowKind::Reaction.columns()).unwrap();
        sink.write_row(&[
            "P1_1".to_string(),
            "LIKE".to_string(),
            "U1".to_string(),
            "Some \"one\"".to_string(),
        ])
        .unwrap();
        sink.finish().unwrap();

        let content = fs::read_to_string(factory.path_for(&id, RowKind::Reaction)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"["to_id","reaction_type","user_id","user_name"]"#,
                r#"["P1_1","LIKE","U1","Some \"one\""]"#,
            ]
        );
    }

    #[test]
    fn files_are_grouped_per_job() {
        let dir = tempfile::tempdir().unwrap();
        let factory = JsonLinesSinkFactory::new(dir.path());
        let id = job_id();
        let path = factory.path_for(&id, RowKind::SharedPost);
        assert_eq!(path.parent().unwrap(), dir.path().join(id.as_str()));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_page_feed_G1_sharedposts.jsonl"));
    }

    #[test]
    fn refuses_a_file_where_the_job_directory_belongs() {
        let dir = tempfile::tempdir().unwrap();
        let factory = JsonLinesSinkFactory::new(dir.path());
        let id = job_id();
        fs::write(dir.path().join(id.as_str()), "not a directory").unwrap();
        assert!(matches!(
            factory.open(&id, RowKind::Post),
            Err(AppError::Io(_))
        ));
    }
}
