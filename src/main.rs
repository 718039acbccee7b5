use anyhow::{Context, Result};
use bike_demand::{
    DemandPredictor,
    config::AppConfig,
    observation::{FunctioningDay, Holiday, RawObservation, Season},
    persistence::Artifacts,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[cfg(feature = "server")]
use std::sync::Arc;

#[cfg(feature = "server")]
use bike_demand::{SystemClock, web};

#[derive(Parser, Debug)]
#[command(name = "bike-demand")]
#[command(about = "Bike sharing demand prediction - web form or one-shot CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the prediction form (default)
    Serve,
    /// Run a single prediction and print the result
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Date (yyyy-mm-dd)
    #[arg(long)]
    date: NaiveDate,
    #[arg(long, default_value_t = 0)]
    hour: u32,
    /// Temperature (°C)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    temperature: f64,
    /// Humidity (%)
    #[arg(long, default_value_t = 0)]
    humidity: u32,
    /// Wind speed (m/s)
    #[arg(long, default_value_t = 0.0)]
    wind_speed: f64,
    /// Visibility (10m)
    #[arg(long, default_value_t = 0.0)]
    visibility: f64,
    /// Dew point temperature (°C)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    dew_point: f64,
    /// Solar radiation (MJ/m2)
    #[arg(long, default_value_t = 0.0)]
    solar_radiation: f64,
    /// Rainfall (mm)
    #[arg(long, default_value_t = 0.0)]
    rainfall: f64,
    /// Snowfall (cm)
    #[arg(long, default_value_t = 0.0)]
    snowfall: f64,
    #[arg(long, default_value_t = Season::Winter)]
    season: Season,
    #[arg(long, default_value_t = Holiday::NoHoliday)]
    holiday: Holiday,
    #[arg(long, default_value_t = FunctioningDay::Yes)]
    functioning_day: FunctioningDay,
}

impl From<PredictArgs> for RawObservation {
    fn from(args: PredictArgs) -> Self {
        Self {
            date: args.date,
            hour: args.hour,
            temperature: args.temperature,
            humidity_pct: args.humidity,
            wind_speed: args.wind_speed,
            visibility: args.visibility,
            dew_point: args.dew_point,
            solar_radiation: args.solar_radiation,
            rainfall: args.rainfall,
            snowfall: args.snowfall,
            season: args.season,
            holiday: args.holiday,
            functioning_day: args.functioning_day,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy(&config.logging.filter);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let artifacts = Artifacts::load(&config.artifacts).context("Failed to load model artifacts")?;
    let predictor = DemandPredictor::from_artifacts(artifacts);
    tracing::info!("Model ready: {}", predictor.model_summary());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Predict(predict_args) => run_predict(&predictor, predict_args.into()),
        Command::Serve => run_server(config, predictor),
    }
}

/// Run one prediction and print the output lines.
fn run_predict(predictor: &DemandPredictor, raw: RawObservation) -> Result<()> {
    let result = predictor.predict(&raw)?;
    println!("{}", result);
    Ok(())
}

/// Run in server mode - serve the form until interrupted
#[cfg(feature = "server")]
fn run_server(config: AppConfig, predictor: DemandPredictor) -> Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

    let state = web::AppState {
        predictor,
        clock: Arc::new(SystemClock),
    };

    rt.block_on(web::serve(&config.server, state))
}

#[cfg(not(feature = "server"))]
fn run_server(_config: AppConfig, _predictor: DemandPredictor) -> Result<()> {
    anyhow::bail!("Web form not available. Build with --features server or use `predict`")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_predict(extra: &[&str]) -> PredictArgs {
        let mut argv = vec!["bike-demand", "predict", "--date", "2024-01-15"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Command::Predict(args)) => args,
            other => panic!("expected predict, got {:?}", other),
        }
    }

    #[test]
    fn test_predict_parses_labels_and_negatives() {
        let args = parse_predict(&[
            "--holiday",
            "No Holiday",
            "--dew-point",
            "-2.0",
            "--temperature",
            "-3.5",
            "--season",
            "winter",
            "--functioning-day",
            "No",
        ]);
        assert_eq!(args.date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert_eq!(args.holiday, Holiday::NoHoliday);
        assert_eq!(args.dew_point, -2.0);
        assert_eq!(args.temperature, -3.5);
        assert_eq!(args.season, Season::Winter);
        assert_eq!(args.functioning_day, FunctioningDay::No);
    }

    #[test]
    fn test_predict_defaults_match_form() {
        let raw = RawObservation::from(parse_predict(&[]));
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(raw, RawObservation::with_defaults(date));
    }

    #[test]
    fn test_humidity_flag_maps_to_percent() {
        let raw = RawObservation::from(parse_predict(&["--humidity", "60"]));
        assert_eq!(raw.humidity_pct, 60);
    }

    #[test]
    fn test_no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["bike-demand"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_unknown_season_is_rejected() {
        let result = Cli::try_parse_from([
            "bike-demand",
            "predict",
            "--date",
            "2024-01-15",
            "--season",
            "Monsoon",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_date_is_required() {
        assert!(Cli::try_parse_from(["bike-demand", "predict"]).is_err());
    }
}
