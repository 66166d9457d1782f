//! Address input rows
//!
//! Input CSV files carry the address text plus optional disambiguators.
//! Columns other than the five known ones are ignored.

use crate::adapters::georef::{AddressQuery, QueryOptions};
use crate::domain::{GeorefError, Result};
use serde::Serialize;
use std::io::Read;

/// Disambiguator columns, in output order
pub const FILTER_COLUMNS: [&str; 4] = ["localidad_censal", "localidad", "departamento", "provincia"];

/// One raw address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddressRow {
    pub direccion: String,
    pub localidad_censal: Option<String>,
    pub localidad: Option<String>,
    pub departamento: Option<String>,
    pub provincia: Option<String>,
}

impl AddressRow {
    pub fn new(direccion: impl Into<String>) -> Self {
        Self {
            direccion: direccion.into(),
            ..Default::default()
        }
    }

    /// Row-level checks before a row is sent
    ///
    /// Only a blank address is rejected; the API reports every other
    /// unusable address itself.
    pub fn validate(&self) -> Result<()> {
        if self.direccion.trim().is_empty() {
            return Err(GeorefError::Validation("empty address".to_string()));
        }
        Ok(())
    }

    /// Builds the API query for this row
    pub fn to_query(&self, options: &QueryOptions) -> AddressQuery {
        AddressQuery {
            direccion: self.direccion.clone(),
            provincia: self.provincia.clone(),
            departamento: self.departamento.clone(),
            localidad_censal: self.localidad_censal.clone(),
            localidad: self.localidad.clone(),
            options: options.clone(),
        }
    }

    /// `(column, value)` pairs written back to the output, address first
    pub fn columns(&self) -> [(&'static str, &str); 5] {
        fn value(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or_default()
        }
        [
            ("direccion", self.direccion.as_str()),
            ("localidad_censal", value(&self.localidad_censal)),
            ("localidad", value(&self.localidad)),
            ("departamento", value(&self.departamento)),
            ("provincia", value(&self.provincia)),
        ]
    }
}

/// Streams [`AddressRow`]s out of a CSV source in chunks
pub struct AddressReader<R: Read> {
    reader: csv::Reader<R>,
    address_index: usize,
    filter_indices: [Option<usize>; 4],
    record: csv::StringRecord,
}

impl<R: Read> AddressReader<R> {
    /// Reads the header and locates the known columns
    ///
    /// # Errors
    ///
    /// Returns `GeorefError::Validation` when `address_column` is missing.
    pub fn new(source: R, address_column: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(source);
        let headers = reader.headers()?.clone();
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let address_index = position(address_column).ok_or_else(|| {
            GeorefError::Validation(format!("Input has no '{address_column}' column"))
        })?;
        let filter_indices = FILTER_COLUMNS.map(position);

        Ok(Self {
            reader,
            address_index,
            filter_indices,
            record: csv::StringRecord::new(),
        })
    }

    /// Reads up to `size` rows; an empty chunk means the input is exhausted
    pub fn next_chunk(&mut self, size: usize) -> Result<Vec<AddressRow>> {
        let mut rows = Vec::with_capacity(size);
        while rows.len() < size && self.reader.read_record(&mut self.record)? {
            let field = |index: Option<usize>| {
                index
                    .and_then(|i| self.record.get(i))
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            let [localidad_censal, localidad, departamento, provincia] =
                self.filter_indices.map(field);
            rows.push(AddressRow {
                direccion: field(Some(self.address_index)).unwrap_or_default(),
                localidad_censal,
                localidad,
                departamento,
                provincia,
            });
        }
        Ok(rows)
    }
}
