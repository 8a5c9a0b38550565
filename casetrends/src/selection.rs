//! The selection engine: filtering the loaded table by an optional country
//! set and an inclusive date window, deriving a ranked default country set
//! when none is given.

use chrono::NaiveDate;
use itertools::Itertools;
use log::debug;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{CaseTrendsError, Result};
use crate::COL;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Filter criteria for one request. All fields are optional; dates are kept
/// as raw strings so that parsing failures surface as request errors.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SelectionParams {
    pub countries: Option<Vec<String>>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl SelectionParams {
    /// Build params from raw query values. Empty strings count as "not
    /// provided" and `country` is a comma-separated list.
    pub fn from_query(
        country: Option<String>,
        start: Option<String>,
        end: Option<String>,
    ) -> Self {
        let non_empty = |value: Option<String>| value.filter(|s| !s.is_empty());
        Self {
            countries: non_empty(country)
                .map(|list| list.split(',').map(str::to_string).collect()),
            start: non_empty(start),
            end: non_empty(end),
        }
    }
}

/// How an omitted end date is resolved against the loaded table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum EndDatePolicy {
    /// The date of the last row in source order. This is the documented
    /// contract of the original tool, even when the source is not
    /// date-sorted and the last row is not the latest date.
    #[default]
    LastRow,
    /// The true maximum date present in the table.
    MaxDate,
}

/// Applies the selection policy to a loaded table.
///
/// The default start date and the size of the default country ranking are
/// injected at construction rather than read as literals, so they can be
/// overridden in tests and configuration.
#[derive(Clone, Debug)]
pub struct SelectionEngine {
    default_start: NaiveDate,
    top_n: usize,
    end_policy: EndDatePolicy,
}

impl SelectionEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            default_start: config.default_start_date,
            top_n: config.default_top_n,
            end_policy: EndDatePolicy::default(),
        }
    }

    pub fn with_end_policy(mut self, end_policy: EndDatePolicy) -> Self {
        self.end_policy = end_policy;
        self
    }

    /// Filter `df` to the requested countries and date window.
    ///
    /// When no countries are given, the effective set is the `top_n`
    /// locations ranked descending by `metric` among rows dated exactly at
    /// the resolved end date. An empty ranking yields an empty table, never
    /// "all countries". Ordering is validated on the fully resolved bounds,
    /// whether or not they were supplied explicitly.
    pub fn select(&self, df: DataFrame, metric: &str, params: &SelectionParams) -> Result<DataFrame> {
        debug!("selecting with params: {params:?}");
        let end_date = match &params.end {
            Some(raw) => parse_date(raw)?,
            None => match self.resolve_end_date(&df)? {
                Some(date) => date,
                // An empty source table has nothing to rank or window
                None => return Ok(df.clear()),
            },
        };
        let countries = match &params.countries {
            Some(explicit) => explicit.clone(),
            None => self.default_countries(&df, metric, end_date)?,
        };
        let start_date = match &params.start {
            Some(raw) => parse_date(raw)?,
            None => self.default_start,
        };
        if start_date >= end_date {
            return Err(CaseTrendsError::ValidationError {
                start: start_date,
                end: end_date,
            });
        }
        let country_series = Series::new("countries", countries);
        Ok(df
            .lazy()
            .filter(col(COL::LOCATION).is_in(lit(country_series)))
            .filter(
                col(COL::DATE)
                    .gt_eq(lit(start_date))
                    .and(col(COL::DATE).lt_eq(lit(end_date))),
            )
            .collect()?)
    }

    /// Resolution of the implicit end date is a separate step so the policy
    /// can be swapped without touching the rest of the engine. Returns `None`
    /// only when the table holds no dates.
    fn resolve_end_date(&self, df: &DataFrame) -> Result<Option<NaiveDate>> {
        let dates = df.column(COL::DATE)?.date()?;
        Ok(match self.end_policy {
            EndDatePolicy::LastRow => dates.as_date_iter().last().flatten(),
            EndDatePolicy::MaxDate => dates.as_date_iter().flatten().max(),
        })
    }

    /// Rank locations by `metric` among rows dated exactly `end_date`,
    /// keeping the first `top_n` distinct ones. The sort is stable, so ties
    /// keep their source order (first seen wins). Rows with a missing metric
    /// never qualify.
    fn default_countries(
        &self,
        df: &DataFrame,
        metric: &str,
        end_date: NaiveDate,
    ) -> Result<Vec<String>> {
        let on_end = df
            .clone()
            .lazy()
            .filter(
                col(COL::DATE)
                    .eq(lit(end_date))
                    .and(col(metric).is_not_null()),
            )
            .collect()?;
        let ranked = on_end.sort(
            [metric],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )?;
        let top = ranked
            .column(COL::LOCATION)?
            .str()?
            .into_no_null_iter()
            .unique()
            .take(self.top_n)
            .map(|location| location.to_string())
            .collect_vec();
        debug!("default countries at {end_date}: {top:?}");
        Ok(top)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| CaseTrendsError::ParseError {
        value: value.to_string(),
        format: DATE_FORMAT,
    })
}

#[cfg(test)]
mod tests {
    use polars::df;

    use super::*;
    use crate::source::parse_date_column;

    fn engine() -> SelectionEngine {
        SelectionEngine::new(&Config::default())
    }

    fn with_parsed_dates(df: DataFrame) -> DataFrame {
        df.lazy().with_column(parse_date_column()).collect().unwrap()
    }

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn distinct_locations(df: &DataFrame) -> Vec<String> {
        df.column(COL::LOCATION)
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .unique()
            .map(str::to_string)
            .collect()
    }

    /// Eight locations with a metric on 2021-01-01 (C and D tied), one with
    /// a missing metric on that date, plus rows on other dates.
    fn ranking_df() -> DataFrame {
        with_parsed_dates(
            df!(
                COL::LOCATION => &["A", "B", "C", "D", "E", "F", "G", "H", "I", "A", "B"],
                COL::DATE => &[
                    "2021-01-01", "2021-01-01", "2021-01-01", "2021-01-01",
                    "2021-01-01", "2021-01-01", "2021-01-01", "2021-01-01",
                    "2021-01-01", "2020-12-31", "2020-12-31",
                ],
                COL::NEW_CASES_PER_MILLION => &[
                    Some(5.0), Some(9.0), Some(7.0), Some(7.0),
                    Some(3.0), Some(8.0), Some(1.0), Some(2.0),
                    None, Some(100.0), Some(100.0),
                ],
            )
            .unwrap(),
        )
    }

    /// Slovenia, Sweden and Norway over a few August 2020 dates.
    fn window_df() -> DataFrame {
        with_parsed_dates(
            df!(
                COL::LOCATION => &[
                    "Slovenia", "Slovenia", "Slovenia",
                    "Sweden", "Sweden", "Sweden",
                    "Norway", "Norway",
                ],
                COL::DATE => &[
                    "2020-08-10", "2020-08-11", "2020-08-20",
                    "2020-08-11", "2020-08-20", "2020-08-21",
                    "2020-08-11", "2020-08-20",
                ],
                COL::NEW_CASES_PER_MILLION => &[
                    Some(1.0), Some(2.0), Some(3.0),
                    Some(4.0), Some(5.0), Some(6.0),
                    Some(7.0), Some(8.0),
                ],
            )
            .unwrap(),
        )
    }

    /// Deliberately not date-sorted: the last row is not the maximum date.
    fn unsorted_df() -> DataFrame {
        with_parsed_dates(
            df!(
                COL::LOCATION => &["A", "B", "A", "B"],
                COL::DATE => &["2021-03-01", "2021-05-01", "2021-04-01", "2021-04-01"],
                COL::NEW_CASES_PER_MILLION => &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)],
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_explicit_countries_and_window() -> anyhow::Result<()> {
        let params = SelectionParams {
            countries: Some(vec!["Slovenia".into(), "Sweden".into()]),
            start: Some("2020-08-11".into()),
            end: Some("2020-08-20".into()),
        };
        let result = engine().select(window_df(), COL::NEW_CASES_PER_MILLION, &params)?;
        assert_eq!(distinct_locations(&result), vec!["Slovenia", "Sweden"]);
        for date in result.column(COL::DATE)?.date()?.as_date_iter().flatten() {
            assert!(date >= ymd(2020, 8, 11) && date <= ymd(2020, 8, 20));
        }
        // Norway rows and Sweden's 2020-08-21 row are gone
        assert_eq!(result.height(), 4);
        Ok(())
    }

    #[test]
    fn test_default_ranking_takes_top_six() -> anyhow::Result<()> {
        let top = engine().default_countries(
            &ranking_df(),
            COL::NEW_CASES_PER_MILLION,
            ymd(2021, 1, 1),
        )?;
        // Descending by metric; C ties D at 7.0 and C appears first in the
        // source, so C ranks ahead
        assert_eq!(top, vec!["B", "F", "C", "D", "A", "E"]);
        Ok(())
    }

    #[test]
    fn test_default_ranking_flows_into_filter() -> anyhow::Result<()> {
        let params = SelectionParams {
            countries: None,
            start: None,
            end: Some("2021-01-01".into()),
        };
        let result = engine().select(ranking_df(), COL::NEW_CASES_PER_MILLION, &params)?;
        let mut locations = distinct_locations(&result);
        locations.sort();
        assert_eq!(locations, vec!["A", "B", "C", "D", "E", "F"]);
        Ok(())
    }

    #[test]
    fn test_default_ranking_ignores_missing_metric() -> anyhow::Result<()> {
        let top = engine().default_countries(
            &ranking_df(),
            COL::NEW_CASES_PER_MILLION,
            ymd(2021, 1, 1),
        )?;
        assert!(!top.contains(&"I".to_string()));
        Ok(())
    }

    #[test]
    fn test_end_date_resolves_to_last_row_not_maximum() -> anyhow::Result<()> {
        let df = unsorted_df();
        let last_row = engine().resolve_end_date(&df)?;
        assert_eq!(last_row, Some(ymd(2021, 4, 1)));
        let max_date = engine()
            .with_end_policy(EndDatePolicy::MaxDate)
            .resolve_end_date(&df)?;
        assert_eq!(max_date, Some(ymd(2021, 5, 1)));
        Ok(())
    }

    #[test]
    fn test_all_defaults_window_excludes_rows_after_last_row_date() -> anyhow::Result<()> {
        // start falls back to 2020-05-10, end to the last row's 2021-04-01,
        // so B's 2021-05-01 row is outside the window
        let params = SelectionParams::default();
        let result = engine().select(unsorted_df(), COL::NEW_CASES_PER_MILLION, &params)?;
        assert_eq!(result.height(), 3);
        for date in result.column(COL::DATE)?.date()?.as_date_iter().flatten() {
            assert!(date <= ymd(2021, 4, 1));
        }
        Ok(())
    }

    #[test]
    fn test_inverted_bounds_fail_validation() {
        let params = SelectionParams {
            countries: Some(vec!["Norway".into()]),
            start: Some("2021-01-01".into()),
            end: Some("2020-01-01".into()),
        };
        let result = engine().select(window_df(), COL::NEW_CASES_PER_MILLION, &params);
        assert!(matches!(
            result,
            Err(CaseTrendsError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validation_uses_resolved_end_when_end_omitted() {
        // Last row in window_df is dated 2020-08-20, so an explicit start
        // after it must still be rejected
        let params = SelectionParams {
            countries: Some(vec!["Norway".into()]),
            start: Some("2021-06-01".into()),
            end: None,
        };
        let result = engine().select(window_df(), COL::NEW_CASES_PER_MILLION, &params);
        assert!(matches!(
            result,
            Err(CaseTrendsError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_unmatched_end_date_yields_empty_table_not_error() -> anyhow::Result<()> {
        let params = SelectionParams {
            countries: None,
            start: None,
            end: Some("2022-01-01".into()),
        };
        let result = engine().select(ranking_df(), COL::NEW_CASES_PER_MILLION, &params)?;
        assert_eq!(result.height(), 0);
        Ok(())
    }

    #[test]
    fn test_empty_table_selects_empty_table() -> anyhow::Result<()> {
        let df = ranking_df();
        let empty = df.clear();
        let result = engine().select(empty, COL::NEW_CASES_PER_MILLION, &SelectionParams::default())?;
        assert_eq!(result.height(), 0);
        Ok(())
    }

    #[test]
    fn test_malformed_dates_fail_parsing() {
        for (start, end) in [
            (Some("11-08-2020".to_string()), None),
            (None, Some("2020/08/20".to_string())),
        ] {
            let params = SelectionParams {
                countries: Some(vec!["Norway".into()]),
                start,
                end,
            };
            let result = engine().select(window_df(), COL::NEW_CASES_PER_MILLION, &params);
            assert!(matches!(result, Err(CaseTrendsError::ParseError { .. })));
        }
    }

    #[test]
    fn test_selection_is_idempotent() -> anyhow::Result<()> {
        let params = SelectionParams {
            countries: None,
            start: None,
            end: Some("2021-01-01".into()),
        };
        let first = engine().select(ranking_df(), COL::NEW_CASES_PER_MILLION, &params)?;
        let second = engine().select(ranking_df(), COL::NEW_CASES_PER_MILLION, &params)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_overridden_top_n_is_respected() -> anyhow::Result<()> {
        let config = Config {
            default_top_n: 2,
            ..Config::default()
        };
        let top = SelectionEngine::new(&config).default_countries(
            &ranking_df(),
            COL::NEW_CASES_PER_MILLION,
            ymd(2021, 1, 1),
        )?;
        assert_eq!(top, vec!["B", "F"]);
        Ok(())
    }

    #[test]
    fn test_from_query_splits_and_drops_empty_strings() {
        let params = SelectionParams::from_query(
            Some("Slovenia,Sweden".into()),
            Some("".into()),
            Some("2021-01-01".into()),
        );
        assert_eq!(
            params.countries,
            Some(vec!["Slovenia".to_string(), "Sweden".to_string()])
        );
        assert_eq!(params.start, None);
        assert_eq!(params.end.as_deref(), Some("2021-01-01"));

        let empty = SelectionParams::from_query(Some("".into()), None, None);
        assert_eq!(empty.countries, None);
    }
}
