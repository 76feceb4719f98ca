//! CLI definition and the fit/backtest pipeline.

use chrono::NaiveDate;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_model_store::JsonModelStore;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::backtest::run_backtest;
use crate::domain::config_validation::{
    validate_run_settings, RawSettings, RegimeSettings, RunSettings,
};
use crate::domain::error::RegimeTraderError;
use crate::domain::metrics::Metrics;
use crate::domain::regime::RegimeModel;
use crate::domain::series::PriceSeries;
use crate::ports::config_port::DATE_FORMAT;
use crate::ports::model_store_port::ModelStorePort;
use crate::ports::price_port::PricePort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug, Default)]
#[command(
    name = "regimetrader",
    about = "Backtest volatility-regime strategies on a daily price series"
)]
pub struct Cli {
    /// INI file supplying defaults for any flag not given
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Price history CSV
    #[arg(long)]
    pub csv_file: Option<PathBuf>,

    /// First backtest day (DD.MM.YYYY)
    #[arg(long, value_parser = parse_date)]
    pub backtest_start: Option<NaiveDate>,

    /// Last backtest day (DD.MM.YYYY), 31.12.2017 when omitted
    #[arg(long, value_parser = parse_date)]
    pub backtest_end: Option<NaiveDate>,

    /// First training day (DD.MM.YYYY)
    #[arg(long, value_parser = parse_date)]
    pub training_start: Option<NaiveDate>,

    /// Training end, exclusive (DD.MM.YYYY)
    #[arg(long, value_parser = parse_date)]
    pub training_end: Option<NaiveDate>,

    /// buy-and-hold, regime-filter or new-regime-filter
    #[arg(short, long)]
    pub strategy: Option<String>,

    /// Number of hidden regimes to fit
    #[arg(long)]
    pub regimes: Option<i64>,

    /// Where the fitted model is written and read back
    #[arg(long, alias = "pickle-path")]
    pub model_path: Option<PathBuf>,

    /// EM iteration cap, 100000 when omitted
    #[arg(long)]
    pub max_iters: Option<i64>,

    /// EM log-likelihood convergence tolerance, 1e-4 when omitted
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Starting equity, 1.0 when omitted
    #[arg(long)]
    pub initial_equity: Option<f64>,

    /// smoothed or incremental state decoding
    #[arg(long)]
    pub inference: Option<String>,

    /// Print performance metrics to stderr after the report
    #[arg(long)]
    pub summary: bool,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| format!("invalid date '{value}', expected DD.MM.YYYY"))
}

impl Cli {
    fn raw_settings(&self) -> RawSettings {
        RawSettings {
            csv_file: self.csv_file.clone(),
            strategy: self.strategy.clone(),
            backtest_start: self.backtest_start,
            backtest_end: self.backtest_end,
            initial_equity: self.initial_equity,
            inference: self.inference.clone(),
            training_start: self.training_start,
            training_end: self.training_end,
            regimes: self.regimes,
            max_iters: self.max_iters,
            tolerance: self.tolerance,
            model_path: self.model_path.clone(),
            summary: self.summary.then_some(true),
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(&cli, &mut io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Run the whole pipeline, writing the report to `out`.
pub fn execute(cli: &Cli, out: &mut dyn io::Write) -> Result<(), RegimeTraderError> {
    // Stage 1: Resolve and validate settings
    let settings = resolve_settings(cli)?;
    info!(strategy = %settings.strategy, "running backtest");

    // Stage 2: Load prices
    let series = CsvAdapter::new().load_series(&settings.csv_file)?;

    // Stage 3: Fit or reuse the regime model
    let model = match &settings.regime {
        Some(regime) => Some(prepare_model(&series, regime, &JsonModelStore::new())?),
        None => None,
    };

    // Stage 4: Backtest
    let strategy = settings.strategy.resolve(model.as_ref())?;
    let result = run_backtest(
        &series.prices,
        &series.returns,
        &strategy,
        model.as_ref(),
        &settings.backtest,
    )?;

    // Stage 5: Report
    TextReportAdapter::new().write(&result, out)?;
    if settings.summary {
        print_summary(&Metrics::compute(&result));
    }
    Ok(())
}

/// Merge command-line flags over the optional config file and validate.
pub fn resolve_settings(cli: &Cli) -> Result<RunSettings, RegimeTraderError> {
    let file = match &cli.config {
        Some(path) => RawSettings::from_config(&FileConfigAdapter::from_file(path)?)?,
        None => RawSettings::default(),
    };
    validate_run_settings(&cli.raw_settings().or(file))
}

/// Produce the model the backtest runs on.
///
/// With a training plan the model is fitted, saved and read back from the
/// store, so the backtest always runs on the persisted artefact. Without one
/// the model already stored at the configured path is reused.
pub fn prepare_model(
    series: &PriceSeries,
    regime: &RegimeSettings,
    store: &dyn ModelStorePort,
) -> Result<RegimeModel, RegimeTraderError> {
    let Some(plan) = &regime.training else {
        if !store.exists(&regime.model_path) {
            return Err(RegimeTraderError::Configuration {
                reason: format!(
                    "no training window given and no model found at {}",
                    regime.model_path.display()
                ),
            });
        }
        info!("reusing stored model, skipping fit");
        return store.load(&regime.model_path);
    };

    let observations = plan.window.extract(&series.returns)?;
    info!(
        observations = observations.len(),
        start = %plan.window.start_date,
        end = %plan.window.end_date,
        states = plan.fit.n_states,
        "fitting regime model"
    );

    let model = RegimeModel::fit_with(&observations, &plan.fit)?;
    if let Some(summary) = model.fit_summary() {
        if !summary.converged {
            warn!(
                iterations = summary.iterations,
                "fit stopped at max_iters before reaching tolerance"
            );
        }
    }

    store.save(&model, &regime.model_path)?;
    store.load(&regime.model_path)
}

fn print_summary(metrics: &Metrics) {
    eprintln!("\n=== Summary ===");
    eprintln!("Total Return:      {:.2}%", metrics.total_return * 100.0);
    eprintln!("Annualized Return: {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:      {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:     {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:      -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Drawdown Days:     {}", metrics.max_drawdown_duration);
    eprintln!("Trading Days:      {}", metrics.trading_days);
    eprintln!("Time Invested:     {:.1}%", metrics.time_invested * 100.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_pickle_alias() {
        let cli = Cli::try_parse_from([
            "regimetrader",
            "--csv-file",
            "prices.csv",
            "--strategy",
            "regime-filter",
            "--backtest-start",
            "01.01.2010",
            "--training-start",
            "01.01.2000",
            "--training-end",
            "01.01.2010",
            "--regimes",
            "2",
            "--pickle-path",
            "model.json",
        ])
        .unwrap();

        assert_eq!(cli.model_path, Some(PathBuf::from("model.json")));
        assert_eq!(cli.backtest_start, NaiveDate::from_ymd_opt(2010, 1, 1));
        assert!(!cli.summary);

        let settings = resolve_settings(&cli).unwrap();
        assert!(settings.regime.unwrap().training.is_some());
    }

    #[test]
    fn rejects_badly_formatted_date() {
        let result = Cli::try_parse_from(["regimetrader", "--backtest-start", "2010-01-01"]);
        assert!(result.is_err());
    }

    #[test]
    fn summary_flag_sets_override() {
        let cli = Cli {
            summary: true,
            ..Cli::default()
        };
        assert_eq!(cli.raw_settings().summary, Some(true));
        assert_eq!(Cli::default().raw_settings().summary, None);
    }

    #[test]
    fn missing_config_file_is_parse_error() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/regimetrader.ini")),
            ..Cli::default()
        };
        assert!(matches!(
            resolve_settings(&cli),
            Err(RegimeTraderError::ConfigParse { .. })
        ));
    }
}
