//! Writers for study results: JSON index files and CSV tables.

use anyhow::{ensure, Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Pretty-printed JSON document.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let file = File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("writing JSON to '{}'", path.display()))?;
    Ok(())
}

/// One CSV row per record; headers come from the record's field names.
pub fn write_records_csv<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let path = path.as_ref();
    create_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating '{}'", path.display()))?;
    for record in records {
        wtr.serialize(record)
            .with_context(|| format!("writing record to '{}'", path.display()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Labelled dense matrix: a header row of `col_labels` (after `corner`), then
/// one row per entry of `rows` prefixed by its label.
pub fn write_matrix_csv(
    path: impl AsRef<Path>,
    corner: &str,
    col_labels: &[String],
    row_labels: &[String],
    rows: &[Vec<f64>],
) -> Result<()> {
    let path = path.as_ref();
    ensure!(
        row_labels.len() == rows.len(),
        "{} row labels for {} rows",
        row_labels.len(),
        rows.len()
    );
    create_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating '{}'", path.display()))?;
    let mut header = vec![corner.to_string()];
    header.extend(col_labels.iter().cloned());
    wtr.write_record(&header)?;
    for (label, row) in row_labels.iter().zip(rows) {
        ensure!(
            row.len() == col_labels.len(),
            "row '{label}' has {} values, expected {}",
            row.len(),
            col_labels.len()
        );
        let mut record = vec![label.clone()];
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Serialize)]
    struct Row {
        trial: usize,
        energy_mwh: f64,
    }

    #[test]
    fn test_records_csv_has_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/events.csv");
        write_records_csv(
            &path,
            &[
                Row {
                    trial: 0,
                    energy_mwh: 1.5,
                },
                Row {
                    trial: 2,
                    energy_mwh: 0.25,
                },
            ],
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "trial,energy_mwh");
        assert_eq!(lines[2], "2,0.25");
    }

    #[test]
    fn test_matrix_csv_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("heatmap.csv");
        write_matrix_csv(
            &path,
            "month",
            &["0".to_string(), "1".to_string()],
            &["Jan".to_string()],
            &[vec![0.5, 0.0]],
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "month,0,1\nJan,0.5,0\n");
    }

    #[test]
    fn test_matrix_csv_rejects_ragged_rows() {
        let dir = tempdir().unwrap();
        let result = write_matrix_csv(
            dir.path().join("bad.csv"),
            "x",
            &["a".to_string()],
            &["r".to_string()],
            &[vec![1.0, 2.0]],
        );
        assert!(result.is_err());
    }
}
