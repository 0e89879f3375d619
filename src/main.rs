//! sweep-lab command line.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn, Level};

use sweep_lab::{
    aggregate::{read_csv, write_csv, CsvLayout, ResultAggregator},
    backend::{LocalBackend, Termination},
    configuration::Configuration,
    constraints::ConstraintsBuilder,
    dispatch::{DryRunBackend, RunDispatcher, SolverCommand},
    extract::OutputExtractor,
    logger,
    recover::{parameter_series, write_series},
    results::{load_store, write_jsonl},
    sweeps::{ArgumentSharing, Sweep},
};

/// Generate, dispatch and aggregate seeded sweeps of game-playing agents.
#[derive(Parser)]
#[command(name = "sweep-lab", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// More logs (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the configurations of a sweep as JSON.
    GenerateGrid(GridArgs),

    /// Run every unit of a sweep on this machine.
    Dispatch(DispatchArgs),

    /// Sum the replicates of a results store into a CSV table.
    Aggregate(AggregateArgs),

    /// Recover the swept parameter of a results table and sum outcomes per value.
    ExtractParameterSeries(SeriesArgs),
}

#[derive(Args)]
struct GridArgs {
    /// Sweep to generate.
    sweep: Sweep,

    /// Give each tree-policy showdown pairing its own arguments.
    #[arg(long)]
    per_matchup_arguments: bool,

    /// Output file (stdout by default).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct DispatchArgs {
    #[command(flatten)]
    grid: GridArgs,

    /// Solver jar.
    #[arg(long, env = "SWEEP_SOLVER_JAR", default_value = "carcassonne.jar")]
    solver_jar: String,

    /// Directory receiving one sub-directory per run.
    #[arg(long, default_value = "results")]
    results: PathBuf,

    /// Only print the command lines.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct AggregateArgs {
    /// Backend results directory, lab `properties` file or directory, or `.jsonl` run records.
    store: PathBuf,

    /// Output CSV.
    #[arg(short, long)]
    output: PathBuf,

    /// Also write the per-run records.
    #[arg(long)]
    runs_jsonl: Option<PathBuf>,

    /// Drop the `replicates` column, as historical tables do.
    #[arg(long)]
    legacy_layout: bool,
}

#[derive(Args)]
struct SeriesArgs {
    /// Results table written by `aggregate`.
    csv: PathBuf,

    /// Text preceding the parameter in configuration names (e.g. `uct`).
    token: String,

    /// Outcome column (repeatable).
    #[arg(long = "column", default_values_t = [String::from("p1_points"), String::from("p2_points")])]
    columns: Vec<String>,

    /// Output file (stdout by default).
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Configuration::from_env();

    if config.log() {
        logger::init_logger()?;
    } else {
        let level = match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        };
        logger::init_console_logger(level)?;
    }

    match cli.command {
        Commands::GenerateGrid(args) => generate_grid(args),
        Commands::Dispatch(args) => dispatch(args, config),
        Commands::Aggregate(args) => aggregate(args),
        Commands::ExtractParameterSeries(args) => extract_parameter_series(args),
    }
}

fn output(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("could not create '{}'", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn sharing(args: &GridArgs) -> ArgumentSharing {
    if args.per_matchup_arguments {
        ArgumentSharing::PerMatchup
    } else {
        ArgumentSharing::Legacy
    }
}

fn generate_grid(args: GridArgs) -> anyhow::Result<()> {
    let grid = args.sweep.build(sharing(&args))?;
    let mut out = output(args.output.as_ref())?;
    serde_json::to_writer_pretty(&mut out, &grid).context("could not write grid")?;
    writeln!(out)?;
    out.flush()?;
    info!(configs = grid.len(), units = grid.len() * grid.seeds().len(), "grid written");
    Ok(())
}

fn dispatch(args: DispatchArgs, config: Configuration) -> anyhow::Result<()> {
    let grid = args.grid.sweep.build(sharing(&args.grid))?;
    let command = SolverCommand::java_jar(args.solver_jar);

    if args.dry_run {
        let out = output(args.grid.output.as_ref())?;
        let mut dispatcher = RunDispatcher::new(DryRunBackend::new(out), command, config);
        dispatcher.dispatch(&grid);
        return Ok(());
    }

    let constraints = ConstraintsBuilder::from_env().build()?;
    let largest_run = grid
        .configs()
        .map(|c| c.memory_limit_mb)
        .max()
        .unwrap_or_default();
    info!(
        units = grid.units().count(),
        concurrent_runs = constraints.capacity(largest_run),
        "resource pool ready"
    );
    let backend = LocalBackend::new(&args.results, constraints, config)?;
    let mut dispatcher = RunDispatcher::new(backend, command, config);
    let report = dispatcher.dispatch(&grid);
    let runs = dispatcher.into_backend().wait_all();

    let failed = runs
        .iter()
        .filter(|r| r.termination != Termination::Success)
        .count();
    info!(
        submitted = report.submitted.len(),
        refused = report.rejected.len(),
        failed,
        "sweep finished"
    );
    Ok(())
}

fn aggregate(args: AggregateArgs) -> anyhow::Result<()> {
    let extractor = OutputExtractor::carcassonne()?;
    let runs = load_store(&args.store, &extractor)?;
    if let Some(path) = &args.runs_jsonl {
        write_jsonl(path, &runs)?;
    }

    let aggregator = ResultAggregator::carcassonne();
    let aggregation = aggregator.aggregate(&runs);
    let layout = if args.legacy_layout {
        warn!("legacy layout: replicate counts are not written");
        CsvLayout::Legacy
    } else {
        CsvLayout::WithReplicates
    };
    let file = File::create(&args.output)
        .with_context(|| format!("could not create '{}'", args.output.display()))?;
    write_csv(
        BufWriter::new(file),
        aggregator.fields(),
        &aggregation.records,
        layout,
    )
}

fn extract_parameter_series(args: SeriesArgs) -> anyhow::Result<()> {
    let file =
        File::open(&args.csv).with_context(|| format!("could not open '{}'", args.csv.display()))?;
    let (fields, records) = read_csv(file)?;
    for column in &args.columns {
        if !fields.contains(column) {
            bail!("'{}' has no column '{column}'", args.csv.display());
        }
    }
    let series = parameter_series(&records, &args.token, &args.columns);
    write_series(output(args.output.as_ref())?, &series)
}
