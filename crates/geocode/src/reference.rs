//! Reference administrative dataset (municipality list) loader.
//!
//! CSV with a header row. Column positions vary between dataset editions,
//! so they are configurable.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub code: usize,
    pub prefecture: usize,
    pub district: usize,
    pub city: usize,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self { code: 0, prefecture: 1, district: 2, city: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRow {
    pub code: String,
    pub prefecture: String,
    pub district: Option<String>,
    pub city: String,
}

impl ReferenceRow {
    /// A district ending in `市` is a designated city, and `city` is one of
    /// its wards: the key becomes `大阪市北区`. Rural districts (`郡`) are
    /// not part of the key.
    pub fn key_city(&self) -> String {
        match &self.district {
            Some(d) if d.ends_with('市') => format!("{d}{}", self.city),
            _ => self.city.clone(),
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.prefecture.clone(), self.key_city())
    }

    /// Geocoder query: prefecture, district, city.
    pub fn query(&self) -> String {
        let mut q = self.prefecture.clone();
        if let Some(d) = &self.district {
            q.push_str(d);
        }
        q.push_str(&self.city);
        q
    }
}

/// Parse reference CSV text. Rows without a city (prefecture-level rows)
/// are skipped.
pub fn parse_reference(csv_data: &str, columns: ColumnMap) -> Result<Vec<ReferenceRow>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.trim_start_matches('\u{feff}').as_bytes());

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("row {}: {e}", line + 2))?;
        let field = |i: usize| record.get(i).map(str::trim).filter(|s| !s.is_empty());

        let (Some(prefecture), Some(city)) = (field(columns.prefecture), field(columns.city)) else {
            continue;
        };
        rows.push(ReferenceRow {
            code: field(columns.code).unwrap_or_default().to_string(),
            prefecture: prefecture.to_string(),
            district: field(columns.district).map(String::from),
            city: city.to_string(),
        });
    }
    Ok(rows)
}

/// Load the reference file. A missing file is [`DataError::NotFound`].
pub fn load_reference(path: &Path, columns: ColumnMap) -> Result<Vec<ReferenceRow>, DataError> {
    if !path.exists() {
        return Err(DataError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;
    parse_reference(&text, columns).map_err(|e| DataError::parse(path, e))
}
