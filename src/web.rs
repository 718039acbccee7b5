//! Single-page prediction form served over HTTP.
//!
//! `GET /` renders the empty form, `POST /predict` runs one prediction and
//! renders the form again with the submitted values and the result.

use std::fmt::{self, Write as _};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::observation::{FunctioningDay, Holiday, ObservationError, RawObservation, Season};
use crate::predictor::{DemandPredictor, PredictionError, PredictionResult};
use crate::traits::Clock;

const PAGE_TITLE: &str = "Sharing Demand Prediction for MotorCycle using Machine Learning";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub predictor: DemandPredictor,
    pub clock: Arc<dyn Clock>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(show_form))
        .route("/predict", post(submit_form))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind the configured address and serve until the process exits.
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Prediction form listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .context("HTTP server terminated")
}

/// Form body as posted by the page, kept as text so that malformed values
/// can be reported in the page. Missing or empty fields take the form defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ObservationForm {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub hour: Option<String>,
    #[serde(default)]
    pub temperature: Option<String>,
    #[serde(default)]
    pub humidity_pct: Option<String>,
    #[serde(default)]
    pub wind_speed: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub dew_point: Option<String>,
    #[serde(default)]
    pub solar_radiation: Option<String>,
    #[serde(default)]
    pub rainfall: Option<String>,
    #[serde(default)]
    pub snowfall: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub holiday: Option<String>,
    #[serde(default)]
    pub functioning_day: Option<String>,
}

impl ObservationForm {
    /// Parse the submitted text. `today` fills an empty date.
    pub fn into_observation(self, today: NaiveDate) -> Result<RawObservation, ObservationError> {
        let date = match filled(&self.date) {
            None => today,
            Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map_err(|_| ObservationError::InvalidDate(text.to_string()))?,
        };

        Ok(RawObservation {
            date,
            hour: number_field("hour", &self.hour)?,
            temperature: number_field("temperature", &self.temperature)?,
            humidity_pct: number_field("humidity", &self.humidity_pct)?,
            wind_speed: number_field("wind speed", &self.wind_speed)?,
            visibility: number_field("visibility", &self.visibility)?,
            dew_point: number_field("dew point", &self.dew_point)?,
            solar_radiation: number_field("solar radiation", &self.solar_radiation)?,
            rainfall: number_field("rainfall", &self.rainfall)?,
            snowfall: number_field("snowfall", &self.snowfall)?,
            season: option_field(&self.season)?,
            holiday: option_field(&self.holiday)?,
            functioning_day: option_field(&self.functioning_day)?,
        })
    }
}

/// Trimmed value, or `None` when the field was left blank.
fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|text| !text.is_empty())
}

fn number_field<T>(field: &'static str, value: &Option<String>) -> Result<T, ObservationError>
where
    T: FromStr + Default,
{
    match filled(value) {
        None => Ok(T::default()),
        Some(text) => text.parse().map_err(|_| ObservationError::InvalidNumber {
            field,
            value: text.to_string(),
        }),
    }
}

fn option_field<T>(value: &Option<String>) -> Result<T, ObservationError>
where
    T: FromStr<Err = ObservationError> + Default,
{
    filled(value).map_or_else(|| Ok(T::default()), str::parse)
}

async fn show_form(State(state): State<AppState>) -> Response {
    let raw = RawObservation::with_defaults(state.clock.today());
    page_response(StatusCode::OK, &raw, None)
}

async fn submit_form(State(state): State<AppState>, Form(form): Form<ObservationForm>) -> Response {
    let today = state.clock.today();
    let raw = match form.into_observation(today) {
        Ok(raw) => raw,
        Err(err) => {
            let err = PredictionError::from(err);
            tracing::warn!("Rejected submission: {}", err);
            let defaults = RawObservation::with_defaults(today);
            return page_response(StatusCode::UNPROCESSABLE_ENTITY, &defaults, Some(Err(&err)));
        }
    };

    match state.predictor.predict(&raw) {
        Ok(result) => page_response(StatusCode::OK, &raw, Some(Ok(&result))),
        Err(err) => {
            let status = match err {
                PredictionError::Validation(_) => {
                    tracing::warn!("Rejected submission: {}", err);
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PredictionError::Encoding(_) | PredictionError::Model(_) => {
                    tracing::error!("Prediction failed: {}", err);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            page_response(status, &raw, Some(Err(&err)))
        }
    }
}

fn page_response(
    status: StatusCode,
    raw: &RawObservation,
    outcome: Option<Result<&PredictionResult, &PredictionError>>,
) -> Response {
    match render_page(raw, outcome) {
        Ok(page) => (status, Html(page)).into_response(),
        Err(err) => {
            tracing::error!("Failed to render page: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

// ==================== Rendering ====================

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn number_input(out: &mut String, label: &str, name: &str, value: f64) -> fmt::Result {
    writeln!(
        out,
        r#"<label>{label}<input type="number" name="{name}" step="0.01" value="{value}"></label>"#
    )
}

fn integer_input(out: &mut String, label: &str, name: &str, value: u32, max: u32) -> fmt::Result {
    writeln!(
        out,
        r#"<label>{label}<input type="number" name="{name}" min="0" max="{max}" step="1" value="{value}"></label>"#
    )
}

fn select_input(
    out: &mut String,
    label: &str,
    name: &str,
    options: &[&str],
    selected: &str,
) -> fmt::Result {
    writeln!(out, r#"<label>{label}<select name="{name}">"#)?;
    for option in options {
        let marker = if *option == selected { " selected" } else { "" };
        let option = escape_html(option);
        writeln!(out, r#"<option value="{option}"{marker}>{option}</option>"#)?;
    }
    writeln!(out, "</select></label>")
}

/// Render the whole page with the given values and optional outcome.
pub fn render_page(
    raw: &RawObservation,
    outcome: Option<Result<&PredictionResult, &PredictionError>>,
) -> Result<String, fmt::Error> {
    let mut out = String::with_capacity(4096);
    write_page(&mut out, raw, outcome)?;
    Ok(out)
}

fn write_page(
    out: &mut String,
    raw: &RawObservation,
    outcome: Option<Result<&PredictionResult, &PredictionError>>,
) -> fmt::Result {
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, r#"<html lang="en"><head><meta charset="utf-8">"#)?;
    writeln!(out, "<title>{PAGE_TITLE}</title></head><body>")?;
    writeln!(out, "<h1>{PAGE_TITLE}</h1>")?;
    writeln!(out, r#"<form method="post" action="/predict">"#)?;

    writeln!(
        out,
        r#"<label>Date (yyyy-mm-dd)<input type="date" name="date" value="{}" required></label>"#,
        raw.date.format("%Y-%m-%d")
    )?;
    integer_input(out, "Hour", "hour", raw.hour, 23)?;
    number_input(out, "Temperature (°C)", "temperature", raw.temperature)?;
    integer_input(out, "Humidity (%)", "humidity_pct", raw.humidity_pct, 100)?;
    number_input(out, "Wind Speed (m/s)", "wind_speed", raw.wind_speed)?;
    number_input(out, "Visibility (10m)", "visibility", raw.visibility)?;
    number_input(out, "Dew Point Temperature (°C)", "dew_point", raw.dew_point)?;
    number_input(out, "Solar Radiation (MJ/m2)", "solar_radiation", raw.solar_radiation)?;
    number_input(out, "Rainfall (mm)", "rainfall", raw.rainfall)?;
    number_input(out, "Snowfall (cm)", "snowfall", raw.snowfall)?;

    let seasons = Season::ALL.map(|s| s.label());
    select_input(out, "select season", "season", &seasons, raw.season.label())?;
    let holidays = Holiday::ALL.map(|h| h.label());
    select_input(out, "select holiday", "holiday", &holidays, raw.holiday.label())?;
    let functioning = FunctioningDay::ALL.map(|f| f.label());
    select_input(
        out,
        "select functioning day",
        "functioning_day",
        &functioning,
        raw.functioning_day.label(),
    )?;

    writeln!(out, r#"<button type="submit">Predict</button>"#)?;
    writeln!(out, "</form>")?;

    match outcome {
        Some(Ok(result)) => {
            for line in result.display_lines() {
                writeln!(out, r#"<p class="result">{}</p>"#, escape_html(&line))?;
            }
        }
        Some(Err(err)) => {
            writeln!(out, r#"<p class="error">{}</p>"#, escape_html(&err.to_string()))?;
        }
        None => {}
    }

    writeln!(out, "</body></html>")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawObservation {
        RawObservation::with_defaults(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
        assert_eq!(escape_html("Predicted Bike Demand: 5"), "Predicted Bike Demand: 5");
    }

    #[test]
    fn test_empty_page_has_every_field() {
        let page = render_page(&raw(), None).unwrap();

        for name in [
            "date",
            "hour",
            "temperature",
            "humidity_pct",
            "wind_speed",
            "visibility",
            "dew_point",
            "solar_radiation",
            "rainfall",
            "snowfall",
            "season",
            "holiday",
            "functioning_day",
        ] {
            assert!(page.contains(&format!(r#"name="{}""#, name)), "missing {}", name);
        }
        assert!(page.contains(r#"value="2024-01-15""#));
        assert!(!page.contains("Predicted Bike Demand"));
    }

    #[test]
    fn test_first_options_selected_by_default() {
        let page = render_page(&raw(), None).unwrap();
        assert!(page.contains(r#"<option value="Winter" selected>"#));
        assert!(page.contains(r#"<option value="No Holiday" selected>"#));
        assert!(page.contains(r#"<option value="Yes" selected>"#));
        assert!(page.contains(r#"<option value="Summer">"#));
    }

    #[test]
    fn test_result_lines_rendered() {
        let result = PredictionResult { value: 431.8 };
        let page = render_page(&raw(), Some(Ok(&result))).unwrap();
        assert!(page.contains("Predicted Bike Demand: 431"));
        assert!(page.contains("Available Bike Count : 50"));
    }

    #[test]
    fn test_error_rendered() {
        let err = PredictionError::Validation(ObservationError::HourOutOfRange(24));
        let page = render_page(&raw(), Some(Err(&err))).unwrap();
        assert!(page.contains(r#"<p class="error">Invalid input: Hour must be between 0 and 23, got 24</p>"#));
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn text(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_form_conversion_keeps_values() {
        let form = ObservationForm {
            date: text("2024-03-02"),
            hour: text("9"),
            temperature: text("11.5"),
            humidity_pct: text("40"),
            wind_speed: text("1.0"),
            visibility: text("1500"),
            dew_point: text("-2.0"),
            solar_radiation: text("0.8"),
            rainfall: text("0.0"),
            snowfall: text("0.0"),
            season: text("Spring"),
            holiday: text("Holiday"),
            functioning_day: text("No"),
        };
        let raw = form.into_observation(today()).unwrap();
        assert_eq!(raw.date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(raw.hour, 9);
        assert_eq!(raw.temperature, 11.5);
        assert_eq!(raw.dew_point, -2.0);
        assert_eq!(raw.season, Season::Spring);
        assert_eq!(raw.holiday, Holiday::Holiday);
        assert_eq!(raw.functioning_day, FunctioningDay::No);
    }

    #[test]
    fn test_blank_fields_take_defaults() {
        let form = ObservationForm {
            date: text(""),
            temperature: text(""),
            hour: text("  "),
            season: text(""),
            ..Default::default()
        };
        let raw = form.into_observation(today()).unwrap();
        assert_eq!(raw, RawObservation::with_defaults(today()));
    }

    #[test]
    fn test_option_labels_parse_like_the_cli() {
        let form = ObservationForm {
            season: text("winter"),
            holiday: text("no holiday"),
            functioning_day: text(" YES "),
            ..Default::default()
        };
        let raw = form.into_observation(today()).unwrap();
        assert_eq!(raw.season, "winter".parse::<Season>().unwrap());
        assert_eq!(raw.holiday, Holiday::NoHoliday);
        assert_eq!(raw.functioning_day, FunctioningDay::Yes);
    }

    #[test]
    fn test_malformed_values_are_reported() {
        let form = ObservationForm {
            hour: text("-1"),
            ..Default::default()
        };
        assert_eq!(
            form.into_observation(today()),
            Err(ObservationError::InvalidNumber {
                field: "hour",
                value: "-1".to_string()
            })
        );

        let form = ObservationForm {
            season: text("Monsoon"),
            ..Default::default()
        };
        assert_eq!(
            form.into_observation(today()),
            Err(ObservationError::UnknownOption {
                field: "season",
                value: "Monsoon".to_string()
            })
        );

        let form = ObservationForm {
            date: text("15/01/2024"),
            ..Default::default()
        };
        assert_eq!(
            form.into_observation(today()),
            Err(ObservationError::InvalidDate("15/01/2024".to_string()))
        );
    }

    #[test]
    fn test_page_response_sets_status() {
        let err = PredictionError::Validation(ObservationError::HourOutOfRange(24));
        let response = page_response(StatusCode::UNPROCESSABLE_ENTITY, &raw(), Some(Err(&err)));
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
