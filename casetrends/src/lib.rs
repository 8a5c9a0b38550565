use log::debug;
use polars::frame::DataFrame;

use crate::chart::Chart;
use crate::config::Config;
use crate::error::Result;
use crate::selection::{SelectionEngine, SelectionParams};
use crate::source::{CsvSource, DataSource};

// Re-exports
pub use column_names as COL;

// Modules
pub mod chart;
pub mod column_names;
pub mod config;
pub mod error;
pub mod selection;
pub mod source;

/// Type for the casetrends data and API.
///
/// Every call loads and filters independently; there is no shared mutable
/// state, so a single instance is safe to use from concurrent requests.
pub struct CaseTrends<S: DataSource> {
    pub source: S,
    pub engine: SelectionEngine,
    pub config: Config,
}

impl CaseTrends<CsvSource> {
    /// Setup against the configured CSV dataset with default configuration
    pub fn new() -> Self {
        Self::new_with_config(Config::default())
    }

    /// Setup against the configured CSV dataset with custom configuration
    pub fn new_with_config(config: Config) -> Self {
        debug!("config: {config:?}");
        let source = CsvSource::new(config.dataset_path.clone());
        Self::with_source(source, config)
    }
}

impl Default for CaseTrends<CsvSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DataSource> CaseTrends<S> {
    /// Setup with an explicit data source, e.g. a cached one
    pub fn with_source(source: S, config: Config) -> Self {
        let engine = SelectionEngine::new(&config);
        Self {
            source,
            engine,
            config,
        }
    }

    /// Load the dataset and filter it according to `params`
    pub fn select_chart_data(&self, params: &SelectionParams) -> Result<DataFrame> {
        let df = self.source.load(&[COL::NEW_CASES_PER_MILLION])?;
        self.engine.select(df, COL::NEW_CASES_PER_MILLION, params)
    }

    /// Distinct locations available for a selection control
    pub fn list_countries(&self) -> Result<Vec<String>> {
        self.source.load_locations()
    }

    /// Filter the dataset and render the result as a chart spec
    pub fn chart(&self, params: &SelectionParams) -> Result<Chart> {
        let df = self.select_chart_data(params)?;
        Chart::reported_cases_per_million(&df)
    }
}
