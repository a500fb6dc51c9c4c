use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use contango::prelude::*;
use prettytable::{Cell, Row, Table};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "contango")]
#[command(about = "A layered backtesting engine for rolled futures strategies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    //run a backtest from an engine configuration file
    Run {
        //path to the engine configuration json
        #[arg(long)]
        config: PathBuf,

        //directory with per-contract csv files
        #[arg(long)]
        data_dir: PathBuf,

        //directory used as the local contract cache
        #[arg(long, default_value = "cache")]
        cache_dir: PathBuf,

        //override of the configured backtest start date (yyyy-mm-dd)
        #[arg(long)]
        start: Option<chrono::NaiveDate>,

        //override of the configured backtest end date (yyyy-mm-dd)
        #[arg(long)]
        end: Option<chrono::NaiveDate>,

        //report gross instead of net returns
        #[arg(long)]
        gross: bool,

        //output path for the aggregate return series csv
        #[arg(long)]
        output_returns_csv: Option<PathBuf>,
    },

    //list the markets known to the registry
    Markets,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            cache_dir,
            start,
            end,
            gross,
            output_returns_csv,
        } => run_backtest(
            config,
            data_dir,
            cache_dir,
            start,
            end,
            gross,
            output_returns_csv,
        ),
        Commands::Markets => {
            print_markets();
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_backtest(
    config_path: PathBuf,
    data_dir: PathBuf,
    cache_dir: PathBuf,
    start: Option<chrono::NaiveDate>,
    end: Option<chrono::NaiveDate>,
    gross: bool,
    output_returns_csv: Option<PathBuf>,
) -> Result<()> {
    let mut config = EngineConfig::from_json_file(&config_path)
        .context(format!("Failed to load config from {:?}", config_path))?;
    if start.is_some() {
        config.start_date = start;
    }
    if end.is_some() {
        config.end_date = end;
    }

    let source = CsvDataSource::new(&data_dir);
    let store = CsvStore::open(&cache_dir)
        .context(format!("Failed to open cache at {:?}", cache_dir))?;
    let ctx = BacktestContext {
        source: &source,
        store: &store,
        today: Local::now().date_naive(),
    };

    let mut engine = CompositionEngine::from_config(config);
    engine.backtest(&ctx)?;

    let returns = if gross {
        engine.final_gross_returns()?
    } else {
        engine.final_net_returns()?
    };

    let summary = SummaryMetrics::from_returns(&returns);
    summary.pretty_print_table();

    if let Some(path) = output_returns_csv {
        write_returns_csv(&path, &returns)
            .context(format!("Failed to write returns to {:?}", path))?;
        println!("Returns written to {:?}", path);
    }

    Ok(())
}

fn write_returns_csv(path: &PathBuf, returns: &TimeSeries) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Date", "Return"])?;
    for (date, value) in returns.iter() {
        let cell = if value.is_nan() {
            String::new()
        } else {
            format!("{}", value)
        };
        writer.write_record([date.format("%Y-%m-%d").to_string(), cell])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_markets() {
    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Name"),
        Cell::new("Full Name"),
        Cell::new("First Contract"),
        Cell::new("Currency"),
        Cell::new("Schedule"),
        Cell::new("Last Trade Rule"),
    ]));

    for spec in all_markets() {
        table.add_row(Row::new(vec![
            Cell::new(spec.name),
            Cell::new(spec.full_name),
            Cell::new(spec.start_from),
            Cell::new(spec.currency),
            Cell::new(spec.roll_schedule),
            Cell::new(spec.last_trade_rule),
        ]));
    }

    table.printstd();
}
