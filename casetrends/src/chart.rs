//! Vega-Lite chart construction from a selected table.
//!
//! The chart is a plain serde-serializable spec; rendering happens client
//! side with vega-embed.

use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::COL;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";
const CHART_TITLE: &str = "Daily new confirmed COVID-19 cases per million people.";

#[derive(Serialize, Debug, Clone)]
pub struct Chart {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub title: String,
    pub data: ChartData,
    pub mark: String,
    pub encoding: Encoding,
    pub params: Vec<Param>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ChartData {
    pub values: Vec<DataPoint>,
}

#[derive(Serialize, Debug, Clone)]
pub struct DataPoint {
    pub location: String,
    pub date: String,
    #[serde(rename = "new_cases_per_million")]
    pub value: Option<f64>,
}

#[derive(Serialize, Debug, Clone)]
pub struct Encoding {
    pub x: PositionDef,
    pub y: PositionDef,
    pub color: ColorDef,
}

#[derive(Serialize, Debug, Clone)]
pub struct PositionDef {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub axis: Axis,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub title: String,
    pub title_font_size: u32,
    pub tick_count: u32,
}

#[derive(Serialize, Debug, Clone)]
pub struct ColorDef {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub legend: Legend,
}

#[derive(Serialize, Debug, Clone)]
pub struct Legend {
    pub title: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct Param {
    pub name: String,
    pub select: String,
    pub bind: String,
}

impl Chart {
    /// Build the line chart spec for a table with exactly the columns
    /// {location, date, new_cases_per_million}.
    pub fn reported_cases_per_million(df: &DataFrame) -> Result<Self> {
        Ok(Chart {
            schema: VEGA_LITE_SCHEMA.to_string(),
            title: CHART_TITLE.to_string(),
            data: ChartData {
                values: data_points(df, COL::NEW_CASES_PER_MILLION)?,
            },
            mark: "line".to_string(),
            encoding: Encoding {
                x: PositionDef {
                    field: COL::DATE.to_string(),
                    kind: "temporal".to_string(),
                    axis: Axis {
                        format: Some("%b, %Y".to_string()),
                        title: "Date".to_string(),
                        title_font_size: 14,
                        tick_count: 20,
                    },
                },
                y: PositionDef {
                    field: COL::NEW_CASES_PER_MILLION.to_string(),
                    kind: "quantitative".to_string(),
                    axis: Axis {
                        format: None,
                        title: "Number of Reported Cases per Million".to_string(),
                        title_font_size: 14,
                        tick_count: 10,
                    },
                },
                color: ColorDef {
                    field: COL::LOCATION.to_string(),
                    kind: "nominal".to_string(),
                    legend: Legend {
                        title: "Country".to_string(),
                    },
                },
            },
            // Binds zoom and pan to the scales, mirroring an interactive
            // line chart
            params: vec![Param {
                name: "pan_zoom".to_string(),
                select: "interval".to_string(),
                bind: "scales".to_string(),
            }],
        })
    }
}

fn data_points(df: &DataFrame, metric: &str) -> Result<Vec<DataPoint>> {
    let locations = df.column(COL::LOCATION)?.str()?;
    let dates = df.column(COL::DATE)?.date()?;
    let values = df.column(metric)?.f64()?;
    Ok(locations
        .into_iter()
        .zip(dates.as_date_iter())
        .zip(values.into_iter())
        .map(|((location, date), value)| DataPoint {
            location: location.unwrap_or_default().to_string(),
            date: date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            value,
        })
        .collect())
}
