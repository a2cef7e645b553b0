//! CSV input and output.
//!
//! Every column except the optional target column is parsed as a numeric
//! feature. Empty cells become `NaN`.

use super::{rows_to_array, Dataset};
use crate::error::{Result, StackingError};
use csv::{ReaderBuilder, Writer};
use ndarray::{Array1, ArrayView1};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

impl Dataset {
    /// Loads a dataset from a CSV file with a header row.
    ///
    /// When `target` is `Some(name)`, that column becomes the label vector and
    /// is excluded from the features.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use stacklearne_rs::dataset::Dataset;
    ///
    /// let train = Dataset::from_csv("data/train.csv", Some("survived")).unwrap();
    /// let test = Dataset::from_csv("data/test.csv", None).unwrap();
    /// assert_eq!(train.n_features(), test.n_features());
    /// ```
    pub fn from_csv<P: AsRef<Path>>(path: P, target: Option<&str>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_csv_reader(BufReader::new(file), target)
    }

    /// Same as [`Dataset::from_csv`] but reads from any [`Read`] source.
    pub fn from_csv_reader<R: Read>(reader: R, target: Option<&str>) -> Result<Self> {
        let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();

        let target_idx = match target {
            Some(name) => Some(headers.iter().position(|h| h == name).ok_or_else(|| {
                StackingError::invalid_parameter("target", format!("column '{}' not found", name))
            })?),
            None => None,
        };

        let feature_names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != target_idx)
            .map(|(_, h)| h.clone())
            .collect();

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (record_idx, result) in rdr.records().enumerate() {
            let record = result?;
            let mut row = Vec::with_capacity(feature_names.len());
            for (col_idx, cell) in record.iter().enumerate() {
                let value = parse_cell(cell, record_idx, &headers[col_idx])?;
                if Some(col_idx) == target_idx {
                    labels.push(value);
                } else {
                    row.push(value);
                }
            }
            rows.push(row);
        }

        let x = rows_to_array(rows)?;
        let dataset = match target_idx {
            Some(_) => Dataset::new(x, Array1::from(labels))?,
            None => Dataset::unlabeled(x)?,
        };
        dataset.with_feature_names(feature_names)
    }
}

fn parse_cell(cell: &str, record: usize, column: &str) -> Result<f64> {
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| StackingError::Parse {
        record,
        column: column.to_string(),
        value: cell.to_string(),
    })
}

/// Writes `id,prediction` rows, `id` being the test row index.
pub fn write_predictions_csv<W: Write>(writer: W, predictions: ArrayView1<'_, f64>) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(["id", "prediction"])?;
    for (i, p) in predictions.iter().enumerate() {
        wtr.write_record([i.to_string(), p.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}
