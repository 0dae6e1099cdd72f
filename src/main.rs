use anyhow::Result;
use budgetload::{
    config::{LoaderConfig, SinkKind},
    upload::{self, UploadSummary},
    warehouse::{self, TableWriter},
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Load budget / forecast files into the warehouse.
#[derive(Parser, Debug)]
#[command(name = "budgetload", version)]
struct Cli {
    /// YAML config; defaults are used for anything it leaves out
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reshape the budget spreadsheet and replace the destination table with it
    Budget(UploadArgs),
    /// Upload the forecast CSV as-is, replacing the destination table
    Forecast(UploadArgs),
    /// Set the forecast CSV's last_updated column in place
    StampForecast {
        /// Defaults to the configured last_updated
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Read and transform, but don't write anything
    #[arg(long)]
    no_write: bool,

    /// Override the configured sink
    #[arg(long, value_enum)]
    sink: Option<SinkKind>,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,budgetload=debug"));
    fmt::Subscriber::builder().with_env_filter(env).init();
    info!("starting");

    // ─── 2) config ───────────────────────────────────────────────────
    let cli = Cli::parse();
    let mut cfg = LoaderConfig::load(cli.config.as_deref())?;

    // ─── 3) run ──────────────────────────────────────────────────────
    match cli.command {
        Command::Budget(args) => {
            apply_upload_args(&mut cfg, &args);
            let writer = build_writer(&cfg)?;
            report(upload::upload_budget(&cfg, writer.as_deref())?);
        }
        Command::Forecast(args) => {
            apply_upload_args(&mut cfg, &args);
            let writer = build_writer(&cfg)?;
            report(upload::upload_forecast(&cfg, writer.as_deref())?);
        }
        Command::StampForecast { date } => {
            let date = date.unwrap_or(cfg.last_updated);
            let rows = upload::stamp_last_updated(&cfg.forecast_path, date)?;
            info!(rows, %date, path = %cfg.forecast_path.display(), "forecast stamped");
        }
    }

    info!("finished");
    Ok(())
}

fn apply_upload_args(cfg: &mut LoaderConfig, args: &UploadArgs) {
    if args.no_write {
        cfg.write_enabled = false;
    }
    if let Some(sink) = args.sink {
        cfg.sink = sink;
    }
}

/// No writer at all when writing is disabled, so no credentials are needed.
fn build_writer(cfg: &LoaderConfig) -> Result<Option<Box<dyn TableWriter>>> {
    if !cfg.write_enabled {
        warn!("write disabled for this run");
        return Ok(None);
    }
    Ok(Some(warehouse::writer_for(cfg)?))
}

fn report(summary: UploadSummary) {
    info!(
        table = %summary.destination,
        rows = summary.rows,
        coercion_warnings = summary.coercion_warnings,
        written = summary.written,
        "run summary"
    );
}
