//! Forest-type to assessment-area crosswalk table.

use csv::ReaderBuilder;
use hashbrown::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};

/// Lookup from forest-type codes to assessment-area rows
#[derive(Debug, Clone)]
pub struct Crosswalk {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    key_column: usize,
    by_code: HashMap<String, Vec<usize>>,
}

/// A borrowed crosswalk row with access by column name
#[derive(Debug, Clone, Copy)]
pub struct CrosswalkRow<'a> {
    headers: &'a [String],
    values: &'a [String],
}

impl<'a> CrosswalkRow<'a> {
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.values.get(idx).map(String::as_str)
    }
}

impl Crosswalk {
    /// Load the crosswalk CSV keyed on `key_column` (the first column when `None`)
    pub fn load(path: &Path, key_column: Option<&str>) -> Result<Self> {
        info!("Loading forest type crosswalk from {}", path.display());

        let file = File::open(path)?;
        let crosswalk = Self::from_reader(file, key_column)?;

        info!(
            "Loaded {} crosswalk rows for {} forest types",
            crosswalk.len(),
            crosswalk.by_code.len()
        );
        Ok(crosswalk)
    }

    pub fn from_reader<R: Read>(reader: R, key_column: Option<&str>) -> Result<Self> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();

        let key_column = match key_column {
            Some(name) => headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| Error::MissingField {
                    field: name.to_string(),
                })?,
            None if headers.is_empty() => {
                return Err(Error::MissingField {
                    field: "<first column>".to_string(),
                })
            }
            None => 0,
        };

        let mut rows = Vec::new();
        let mut by_code: HashMap<String, Vec<usize>> = HashMap::new();

        for result in csv_reader.records() {
            let record = result?;
            let values: Vec<String> = record.iter().map(String::from).collect();
            if let Some(code) = values.get(key_column) {
                by_code.entry(code.clone()).or_default().push(rows.len());
            }
            rows.push(values);
        }

        Ok(Self {
            headers,
            rows,
            key_column,
            by_code,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Name of the column codes are looked up by
    pub fn key_column(&self) -> &str {
        &self.headers[self.key_column]
    }

    /// All rows for a forest-type code, in file order
    pub fn lookup(&self, code: &str) -> Vec<CrosswalkRow<'_>> {
        self.by_code
            .get(code)
            .map(|idxs| idxs.iter().map(|&i| self.row(i)).collect())
            .unwrap_or_default()
    }

    /// First value of `column` for a forest-type code
    pub fn value(&self, code: &str, column: &str) -> Option<&str> {
        self.lookup(code).into_iter().find_map(|row| row.get(column))
    }

    pub fn rows(&self) -> impl Iterator<Item = CrosswalkRow<'_>> {
        (0..self.rows.len()).map(move |i| self.row(i))
    }

    fn row(&self, idx: usize) -> CrosswalkRow<'_> {
        CrosswalkRow {
            headers: &self.headers,
            values: &self.rows[idx],
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
