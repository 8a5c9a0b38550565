//! This module stores the column names of the source dataset, which are used
//! when projecting columns at load time and when filtering. Note that these
//! must match the header of the CSV file being served!

pub const LOCATION: &str = "location";
pub const DATE: &str = "date";

pub const NEW_CASES_PER_MILLION: &str = "new_cases_per_million";
