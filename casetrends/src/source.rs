//! Data-source abstraction over the on-disk CSV dataset.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use itertools::Itertools;
use log::debug;
use polars::prelude::*;

use crate::error::{CaseTrendsError, Result};
use crate::COL;

/// A tabular source of per-location, per-date records.
///
/// The loader is pluggable so that a caching layer can be put in front of the
/// raw CSV reader without changing the selection engine's contract.
pub trait DataSource {
    /// Load the two key columns plus `metric_columns`, in source row order.
    fn load(&self, metric_columns: &[&str]) -> Result<DataFrame>;
    /// Distinct location identifiers appearing anywhere in the source.
    fn load_locations(&self) -> Result<Vec<String>>;
}

/// Reads the static CSV dataset, materializing only the requested columns.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn scan(&self) -> Result<LazyFrame> {
        LazyCsvReader::new(&self.path)
            .with_has_header(true)
            .finish()
            .map_err(load_failure)
    }
}

fn load_failure(err: PolarsError) -> CaseTrendsError {
    CaseTrendsError::LoadFailure(err.to_string())
}

/// Strict parse of the date column; a single bad value fails the whole load.
pub(crate) fn parse_date_column() -> Expr {
    let options = StrptimeOptions {
        format: Some("%Y-%m-%d".into()),
        strict: true,
        exact: true,
        ..Default::default()
    };
    col(COL::DATE).str().to_date(options)
}

impl DataSource for CsvSource {
    fn load(&self, metric_columns: &[&str]) -> Result<DataFrame> {
        let mut columns = vec![col(COL::LOCATION), col(COL::DATE)];
        // Metrics are always Float64, whatever width the CSV reader inferred
        // for an all-integer column
        columns.extend(
            metric_columns
                .iter()
                .map(|name| col(name).cast(DataType::Float64)),
        );
        let df = self
            .scan()?
            .select(columns)
            .with_column(parse_date_column())
            .collect()
            .map_err(load_failure)?;
        debug!("loaded {} rows from {}", df.height(), self.path.display());
        Ok(df)
    }

    fn load_locations(&self) -> Result<Vec<String>> {
        let df = self
            .scan()?
            .select([col(COL::LOCATION)])
            .collect()
            .map_err(load_failure)?;
        Ok(df
            .column(COL::LOCATION)?
            .str()?
            .into_no_null_iter()
            .unique()
            .map(|location| location.to_string())
            .collect_vec())
    }
}

/// Shared read-only cache over an inner source, keyed by the requested
/// column set. Cache entries are cloned out, so callers can never mutate
/// shared state through the returned frames.
pub struct CachedSource<S> {
    inner: S,
    tables: Mutex<HashMap<Vec<String>, DataFrame>>,
    locations: Mutex<Option<Vec<String>>>,
}

impl<S> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            tables: Mutex::new(HashMap::new()),
            locations: Mutex::new(None),
        }
    }
}

impl<S: DataSource> DataSource for CachedSource<S> {
    fn load(&self, metric_columns: &[&str]) -> Result<DataFrame> {
        let key: Vec<String> = metric_columns.iter().map(|name| name.to_string()).collect();
        if let Some(df) = self.tables.lock().unwrap().get(&key) {
            debug!("cache hit for columns {key:?}");
            return Ok(df.clone());
        }
        let df = self.inner.load(metric_columns)?;
        self.tables.lock().unwrap().insert(key, df.clone());
        Ok(df)
    }

    fn load_locations(&self) -> Result<Vec<String>> {
        if let Some(locations) = self.locations.lock().unwrap().as_ref() {
            return Ok(locations.clone());
        }
        let locations = self.inner.load_locations()?;
        *self.locations.lock().unwrap() = Some(locations.clone());
        Ok(locations)
    }
}
