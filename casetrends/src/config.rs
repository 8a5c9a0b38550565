use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Path of the CSV dataset to serve.
    pub dataset_path: String,
    /// Lower bound substituted when a request carries no start date.
    pub default_start_date: NaiveDate,
    /// How many locations the default ranking keeps.
    pub default_top_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dataset_path: "owid-covid-data.csv".into(),
            // Unwrap: the date literal is valid
            default_start_date: NaiveDate::from_ymd_opt(2020, 5, 10).unwrap(),
            default_top_n: 6,
        }
    }
}
