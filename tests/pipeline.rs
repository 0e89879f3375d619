use std::{fs, path::PathBuf};

use sweep_lab::{
    aggregate::{read_csv, write_csv, CsvLayout, ResultAggregator},
    dispatch::{ExecutionBackend, RunDispatcher, SolverCommand, SubmitRequest},
    error::{BackendError, SubmissionError},
    extract::OutputExtractor,
    grid::{Axis, AxisValue, ConfigId, GridBuilder, Matchup, ParameterSpace, PlayerSpec, Treatment},
    recover::parameter_series,
    results::{load_store, RunResult, Scalar, PROPERTIES_FILE, STDOUT_FILE},
    sweeps::{ArgumentSharing, Sweep},
};
use sweep_lab::configuration::Configuration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn init_test_logger() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Writes what a finished run would leave behind, with a score derived from the arguments.
struct FakeSolver {
    dir: PathBuf,
}

impl ExecutionBackend for FakeSolver {
    type Handle = PathBuf;

    fn submit(&mut self, request: SubmitRequest) -> Result<PathBuf, BackendError> {
        let run_dir = self.dir.join(&request.run_id);
        fs::create_dir_all(&run_dir).map_err(anyhow::Error::from)?;
        fs::write(
            run_dir.join(PROPERTIES_FILE),
            serde_json::to_string(&request.properties).map_err(anyhow::Error::from)?,
        )
        .map_err(anyhow::Error::from)?;

        let term = request
            .argv
            .windows(2)
            .find(|w| w[0].ends_with("explorationterm"))
            .map(|w| w[1].clone())
            .unwrap_or_default();
        let seed: u64 = request.properties.seed;
        // seed 1 crashes before printing its times
        let output = if seed == 1 {
            format!("P1 points: {}\nP2 points: 1\n", 10 + seed)
        } else {
            format!(
                "P1 points: {}\nP2 points: 1\nP1 contemplation time in seconds: {term}\nP2 contemplation time in seconds: 0.5\n",
                10 + seed
            )
        };
        fs::write(run_dir.join(STDOUT_FILE), output).map_err(anyhow::Error::from)?;
        Ok(run_dir)
    }
}

fn quiet() -> Configuration {
    Configuration::new().with_verbose(false)
}

fn terms_grid() -> sweep_lab::grid::SweepGrid {
    let space = ParameterSpace::new().with_axis(Axis::discrete(
        "exploration_term",
        [AxisValue::Int(0), AxisValue::Float(0.5), AxisValue::Int(3)],
    ));
    GridBuilder::new("terms", space)
        .with_role_swap(true)
        .with_seeds(0..3)
        .with_treatment(|point, role| {
            let term = point.get("exploration_term")?;
            let uct = PlayerSpec::new("uct").with_exploration_term(term.to_text());
            Some(Treatment {
                id: ConfigId::new("uct", role).with_exploration_term(term),
                name: format!("uct{term}-vs-random_{}", role.number()),
                arguments: Matchup::new(uct, PlayerSpec::new("random"))
                    .seated(role)
                    .arguments(),
            })
        })
        .build()
        .unwrap()
}

#[test]
fn grid_to_parameter_series() {
    init_test_logger();
    let dir = tempfile::tempdir().unwrap();
    let grid = terms_grid();
    assert_eq!(grid.len(), 6);

    let backend = FakeSolver {
        dir: dir.path().to_owned(),
    };
    let mut dispatcher = RunDispatcher::new(backend, SolverCommand::java_jar("solver.jar"), quiet());
    let report = dispatcher.dispatch(&grid);
    assert_eq!(report.submitted.len(), 18);
    assert!(report.rejected.is_empty());

    let runs = load_store(dir.path(), &OutputExtractor::carcassonne().unwrap()).unwrap();
    assert_eq!(runs.len(), 18);

    let aggregation = ResultAggregator::carcassonne().aggregate(&runs);
    assert_eq!(aggregation.records.len(), 6);
    // one incomplete replicate per configuration
    assert_eq!(aggregation.gaps.len(), 6);

    let record = aggregation
        .records
        .iter()
        .find(|r| r.canonical_name == "carcassonne-uct0.5-vs-random_1")
        .unwrap();
    assert_eq!(record.replicate_count, 3);
    assert_eq!(record.summed_fields["p1_points"], Scalar::Int(10 + 11 + 12));
    assert_eq!(record.summed_fields["p1_contemplation_time"], Scalar::Float(1.0));
    assert_eq!(record.summed_fields["p2_contemplation_time"], Scalar::Float(1.0));

    let mut table = vec![];
    write_csv(
        &mut table,
        ResultAggregator::carcassonne().fields(),
        &aggregation.records,
        CsvLayout::Legacy,
    )
    .unwrap();
    let text = String::from_utf8(table.clone()).unwrap();
    assert!(text.starts_with(
        "name, p1_points, p2_points, p1_contemplation_time, p2_contemplation_time\n"
    ));

    let (_, records) = read_csv(table.as_slice()).unwrap();
    let series = parameter_series(&records, "uct", &["p1_points".to_owned()]);
    let values = series.series["p1_points"]
        .iter()
        .map(|p| p.parameter_value)
        .collect::<Vec<_>>();
    assert_eq!(values, [0.0, 0.5, 3.0]);
    // treatment in both seats, three seeds each
    assert!(series.series["p1_points"]
        .iter()
        .all(|p| p.aggregated_outcome == Scalar::Int(66)));
    assert!(series.diagnostics.is_empty());
}

#[test]
fn csv_round_trip() {
    let runs = (0..4)
        .map(|seed| RunResult {
            config_name: format!("carcassonne-boltzmann{}_1-{seed}", seed % 2),
            seed: Some(seed),
            fields: [
                ("p1_points".to_owned(), Some(Scalar::Int(seed as i64 * 7))),
                ("p2_points".to_owned(), Some(Scalar::Int(3))),
                (
                    "p1_contemplation_time".to_owned(),
                    Some(Scalar::Float(0.1 * seed as f64 + 1.0 / 3.0)),
                ),
                ("p2_contemplation_time".to_owned(), None),
            ]
            .into(),
            raw_output: String::new(),
        })
        .collect::<Vec<_>>();
    let aggregator = ResultAggregator::carcassonne();
    let records = aggregator.aggregate(&runs).records;

    let mut table = vec![];
    write_csv(&mut table, aggregator.fields(), &records, CsvLayout::WithReplicates).unwrap();
    let (fields, read_back) = read_csv(table.as_slice()).unwrap();
    assert_eq!(fields, aggregator.fields());
    assert_eq!(read_back.len(), records.len());
    for (original, read) in records.iter().zip(&read_back) {
        assert_eq!(original.canonical_name, read.canonical_name);
        assert_eq!(original.replicate_count, read.replicate_count);
        assert_eq!(original.summed_fields.len(), read.summed_fields.len());
        for (field, value) in &original.summed_fields {
            assert!((value.as_f64() - read.summed_fields[field].as_f64()).abs() < 1e-9);
        }
    }
}

#[test]
fn aggregation_ignores_input_order() {
    let runs = (0..6)
        .map(|i| RunResult {
            config_name: format!("carcassonne-uct{}-vs-random-{}", i % 2, i),
            seed: Some(i),
            fields: [
                ("p1_points".to_owned(), Some(Scalar::Float(0.1 * i as f64))),
                ("p2_points".to_owned(), (i != 3).then_some(Scalar::Int(i as i64))),
            ]
            .into(),
            raw_output: String::new(),
        })
        .collect::<Vec<_>>();
    let aggregator = ResultAggregator::new(["p1_points", "p2_points"]);
    let expected = aggregator.aggregate(&runs);

    let mut reversed = runs.clone();
    reversed.reverse();
    assert_eq!(aggregator.aggregate(&reversed), expected);

    let mut rotated = runs;
    rotated.rotate_left(2);
    assert_eq!(aggregator.aggregate(&rotated), expected);
}

#[test]
fn legacy_showdown_units_are_refused() {
    let grid = Sweep::TreePolicyShowdown
        .build(ArgumentSharing::Legacy)
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let backend = FakeSolver {
        dir: dir.path().to_owned(),
    };
    let mut dispatcher = RunDispatcher::new(backend, SolverCommand::java_jar("solver.jar"), quiet());
    let report = dispatcher.dispatch(&grid);
    assert!(report.submitted.is_empty());
    assert_eq!(report.rejected.len(), 12 * 5);
    assert!(report
        .rejected
        .iter()
        .all(|(_, e)| matches!(e, SubmissionError::NonStringValue { .. })));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

    let grid = Sweep::TreePolicyShowdown
        .build(ArgumentSharing::PerMatchup)
        .unwrap();
    assert_eq!(dispatcher.dispatch(&grid).submitted.len(), 12 * 5);
}
