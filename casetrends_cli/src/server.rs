//! The HTTP surface: an HTML page with the country picker and a JSON
//! endpoint returning the Vega-Lite chart spec.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use casetrends::chart::Chart;
use casetrends::error::CaseTrendsError;
use casetrends::selection::SelectionParams;
use casetrends::source::{CachedSource, CsvSource};
use casetrends::CaseTrends;
use log::{debug, info};
use serde::Deserialize;
use tokio::net::TcpListener;

/// The served application: a CSV dataset behind a shared read-only cache.
pub type App = CaseTrends<CachedSource<CsvSource>>;

pub async fn run(addr: SocketAddr, app: App) -> Result<()> {
    let state = Arc::new(app);
    let router = Router::new()
        .route("/", get(index))
        .route("/plot.json", get(plot_json))
        .layer(Extension(state));

    info!("Serving casetrends at http://{addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Raw query parameters of `/plot.json`; empty strings are treated the same
/// as absent parameters.
#[derive(Deserialize, Debug)]
struct PlotQuery {
    country: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

async fn plot_json(
    Extension(app): Extension<Arc<App>>,
    Query(query): Query<PlotQuery>,
) -> Result<Json<Chart>, AppError> {
    let params = SelectionParams::from_query(query.country, query.start, query.end);
    debug!("plot.json params: {params:?}");
    // polars is blocking, so keep it off the async workers
    let chart = tokio::task::spawn_blocking(move || app.chart(&params))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(Json(chart))
}

async fn index(Extension(app): Extension<Arc<App>>) -> Result<Html<String>, AppError> {
    let countries = tokio::task::spawn_blocking(move || app.list_countries())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(Html(render_index(&countries)))
}

/// Errors surfaced over HTTP. Request errors (bad dates, inverted window)
/// map to 400; everything else, load failures included, is a 500.
#[derive(Debug)]
enum AppError {
    Client(String),
    Internal(String),
}

impl From<CaseTrendsError> for AppError {
    fn from(err: CaseTrendsError) -> Self {
        match err {
            CaseTrendsError::ParseError { .. } | CaseTrendsError::ValidationError { .. } => {
                AppError::Client(err.to_string())
            }
            _ => AppError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Client(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Internal(msg) => {
                log::error!("request failed: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response()
            }
        }
    }
}

fn render_index(countries: &[String]) -> String {
    let options: String = countries
        .iter()
        .map(|country| {
            let country = escape_html(country);
            format!("      <option value=\"{country}\">{country}</option>\n")
        })
        .collect();
    INDEX_TEMPLATE.replace("{{options}}", &options)
}

/// Location names come from the dataset, so they cannot be trusted in
/// attribute or text position.
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const INDEX_TEMPLATE: &str = r##"<!DOCTYPE html>
<html>
<head>
  <title>Reported COVID-19 cases per million</title>
  <script src="https://cdn.jsdelivr.net/npm/vega@5"></script>
  <script src="https://cdn.jsdelivr.net/npm/vega-lite@5"></script>
  <script src="https://cdn.jsdelivr.net/npm/vega-embed@6"></script>
</head>
<body>
  <h1>Daily new confirmed COVID-19 cases per million people</h1>
  <form id="controls">
    <label for="country">Countries</label>
    <select id="country" multiple size="10">
{{options}}    </select>
    <label for="start">Start</label>
    <input type="date" id="start">
    <label for="end">End</label>
    <input type="date" id="end">
    <button type="submit">Update</button>
  </form>
  <div id="chart"></div>
  <script>
    async function refresh() {
      const selected = Array.from(
        document.getElementById("country").selectedOptions
      ).map((option) => option.value);
      const params = new URLSearchParams({
        country: selected.join(","),
        start: document.getElementById("start").value,
        end: document.getElementById("end").value,
      });
      const response = await fetch("/plot.json?" + params.toString());
      if (!response.ok) {
        document.getElementById("chart").textContent = await response.text();
        return;
      }
      vegaEmbed("#chart", await response.json());
    }
    document.getElementById("controls").addEventListener("submit", (event) => {
      event.preventDefault();
      refresh();
    });
    refresh();
  </script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_render_index_lists_countries() {
        let page = render_index(&["Norway".to_string(), "Sweden".to_string()]);
        assert!(page.contains(r#"<option value="Norway">Norway</option>"#));
        assert!(page.contains(r#"<option value="Sweden">Sweden</option>"#));
        assert!(!page.contains("{{options}}"));
    }

    #[test]
    fn test_render_index_escapes_markup_in_country_names() {
        let page = render_index(&[r#"Côte <d'Ivoire> & "friends""#.to_string()]);
        assert!(page.contains("Côte &lt;d&#39;Ivoire&gt; &amp; &quot;friends&quot;"));
        assert!(!page.contains("<d'Ivoire>"));
    }

    #[test]
    fn test_request_errors_map_to_bad_request() {
        let parse = CaseTrendsError::ParseError {
            value: "nope".into(),
            format: "%Y-%m-%d",
        };
        assert!(matches!(AppError::from(parse), AppError::Client(_)));

        let validation = CaseTrendsError::ValidationError {
            start: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        };
        assert!(matches!(AppError::from(validation), AppError::Client(_)));

        let load = CaseTrendsError::LoadFailure("unreadable".into());
        assert!(matches!(AppError::from(load), AppError::Internal(_)));
    }
}
