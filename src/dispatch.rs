//! Turning `(RunConfig, seed)` pairs into execution units.
//!
//! The [`RunDispatcher`] validates the argument vector of every unit, attaches its resource
//! limits and properties, and hands it to an [`ExecutionBackend`]. Submission is
//! fire-and-forget: the dispatcher never waits for a run to finish.
//!
//! A unit whose arguments cannot be passed to the solver is refused before the backend sees
//! it, so it never takes a worker slot.

use std::{collections::HashSet, io::Write, thread, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    configuration::Configuration,
    error::{BackendError, SubmissionError},
    grid::{Argument, AxisValue, SweepGrid, Unit},
};

/// Properties persisted by the backend beside the output of each run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProperties {
    /// Experiment domain.
    pub domain: String,
    /// Problem id: the configuration name.
    pub problem: String,
    /// Algorithm name: the configuration name.
    pub algorithm: String,
    /// Wall-clock limit, in seconds.
    pub time_limit: u64,
    /// Memory limit, in MB.
    pub memory_limit: u64,
    /// Replicate seed.
    pub seed: u64,
    /// `[domain, name, seed]`, joined with `-` into the run id. The seed is a string, as in
    /// every lab `properties` file.
    pub id: (String, String, String),
}

impl RunProperties {
    /// Properties of `unit`.
    pub fn of(unit: &Unit<'_>) -> Self {
        Self {
            domain: unit.domain.to_owned(),
            problem: unit.config.name.clone(),
            algorithm: unit.config.name.clone(),
            time_limit: unit.config.time_limit.as_secs(),
            memory_limit: unit.config.memory_limit_mb,
            seed: unit.seed,
            id: (
                unit.domain.to_owned(),
                unit.config.name.clone(),
                unit.seed.to_string(),
            ),
        }
    }

    /// `<domain>-<name>-<seed>`.
    pub fn run_id(&self) -> String {
        format!("{}-{}-{}", self.id.0, self.id.1, self.id.2)
    }
}

/// What a backend receives for one execution unit.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    /// Unique id of the run within the sweep.
    pub run_id: String,
    /// Full command line, program first.
    pub argv: Vec<String>,
    /// Wall-clock limit.
    pub time_limit: Duration,
    /// Memory limit, in MB.
    pub memory_limit_mb: u64,
    /// Properties to persist beside the output.
    pub properties: RunProperties,
}

/// Something that runs execution units: a cluster scheduler, a local process pool...
pub trait ExecutionBackend {
    /// Returned for every accepted unit.
    type Handle;

    /// Accept one unit. Must not block until the run completes.
    ///
    /// # Errors
    /// [`BackendError::Transient`] when retrying may help, [`BackendError::Rejected`] when it
    /// will not.
    fn submit(&mut self, request: SubmitRequest) -> Result<Self::Handle, BackendError>;
}

/// How the solver is invoked.
///
/// The command line is `program leading.. <flag value>.. --deckseed <seed> trailing.. extra..`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverCommand {
    /// Executable.
    pub program: String,
    /// Arguments before the configuration flags.
    pub leading: Vec<String>,
    /// Arguments after the seed.
    pub trailing: Vec<String>,
}

impl SolverCommand {
    /// `java -jar <jar> .. -v false`.
    pub fn java_jar(jar: impl Into<String>) -> Self {
        Self {
            program: "java".to_owned(),
            leading: vec!["-jar".to_owned(), jar.into()],
            trailing: vec!["-v".to_owned(), "false".to_owned()],
        }
    }

    /// Command line of `unit`.
    ///
    /// # Errors
    /// [`SubmissionError`] when a flag or a value cannot be passed as a single argument.
    pub fn argv(&self, unit: &Unit<'_>, extra: &[String]) -> Result<Vec<String>, SubmissionError> {
        let mut argv = vec![self.program.clone()];
        argv.extend(self.leading.iter().cloned());
        argv.extend(render_arguments(&unit.config.arguments)?);
        argv.push("--deckseed".to_owned());
        argv.push(unit.seed.to_string());
        argv.extend(self.trailing.iter().cloned());
        argv.extend(extra.iter().cloned());
        Ok(argv)
    }
}

/// Flatten `(flag, value)` pairs. Every value must already be a string.
pub fn render_arguments(arguments: &[Argument]) -> Result<Vec<String>, SubmissionError> {
    let mut argv = Vec::with_capacity(arguments.len() * 2);
    for Argument { flag, value } in arguments {
        if !flag.starts_with('-') || flag.len() < 2 || flag.contains(char::is_whitespace) {
            return Err(SubmissionError::InvalidFlag(flag.clone()));
        }
        let AxisValue::Text(text) = value else {
            return Err(SubmissionError::NonStringValue {
                flag: flag.clone(),
                kind: value.kind(),
                value: value.to_string(),
            });
        };
        let malformed = |reason| SubmissionError::MalformedValue {
            flag: flag.clone(),
            value: text.clone(),
            reason,
        };
        if text.is_empty() {
            return Err(malformed("is empty"));
        }
        if text.contains(char::is_whitespace) {
            return Err(malformed("contains whitespace"));
        }
        if text.contains(['"', '\'']) {
            return Err(malformed("contains quotes"));
        }
        argv.push(flag.clone());
        argv.push(text.clone());
    }
    Ok(argv)
}

/// Outcome of dispatching a grid.
#[derive(Debug)]
pub struct DispatchReport<H> {
    /// Accepted units: run id and backend handle.
    pub submitted: Vec<(String, H)>,
    /// Refused units: run id and reason.
    pub rejected: Vec<(String, SubmissionError)>,
}

/// Submits execution units to a backend, at most once per `(canonical name, seed)`.
pub struct RunDispatcher<B: ExecutionBackend> {
    backend: B,
    command: SolverCommand,
    config: Configuration,
    submitted: HashSet<(String, u64)>,
}

impl<B: ExecutionBackend> RunDispatcher<B> {
    /// Dispatcher submitting to `backend`.
    pub fn new(backend: B, command: SolverCommand, config: Configuration) -> Self {
        Self {
            backend,
            command,
            config,
            submitted: HashSet::new(),
        }
    }

    /// Number of units accepted so far.
    pub fn submitted(&self) -> usize {
        self.submitted.len()
    }

    /// The backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Give the backend back, e.g. to wait for its runs.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Submit one unit.
    ///
    /// The argument vector is checked first, then duplicates, then the backend is called.
    /// Transient backend failures are retried as configured.
    ///
    /// # Errors
    /// [`SubmissionError`]; the unit is then not registered and may be submitted again.
    pub fn submit(&mut self, unit: &Unit<'_>, extra: &[String]) -> Result<B::Handle, SubmissionError> {
        let argv = self.command.argv(unit, extra)?;
        let key = (unit.canonical_name(), unit.seed);
        if self.submitted.contains(&key) {
            return Err(SubmissionError::DuplicateUnit {
                canonical_name: key.0,
                seed: key.1,
            });
        }

        let properties = RunProperties::of(unit);
        let request = SubmitRequest {
            run_id: properties.run_id(),
            argv,
            time_limit: unit.config.time_limit,
            memory_limit_mb: unit.config.memory_limit_mb,
            properties,
        };

        let max_attempts = self.config.submit_retries.saturating_add(1);
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.backend.submit(request.clone()) {
                Ok(handle) => {
                    debug!(run_id = %request.run_id, attempts, "submitted");
                    self.submitted.insert(key);
                    return Ok(handle);
                }
                Err(BackendError::Transient(reason)) if attempts < max_attempts => {
                    debug!(run_id = %request.run_id, attempts, %reason, "transient failure, retrying");
                    thread::sleep(self.config.retry_backoff);
                }
                Err(source) => {
                    return Err(SubmissionError::Backend {
                        run_id: request.run_id,
                        attempts,
                        source,
                    })
                }
            }
        }
    }

    /// Submit every unit of `grid`. A refused unit is logged and reported, never fatal.
    #[instrument(skip_all, fields(sweep = %grid.name()))]
    pub fn dispatch(&mut self, grid: &SweepGrid) -> DispatchReport<B::Handle> {
        let mut report = DispatchReport {
            submitted: vec![],
            rejected: vec![],
        };
        for unit in grid.units() {
            let run_id = unit.run_id();
            match self.submit(&unit, grid.extra_solver_args()) {
                Ok(handle) => report.submitted.push((run_id, handle)),
                Err(e) => {
                    warn!(%run_id, "not submitted: {e}");
                    report.rejected.push((run_id, e));
                }
            }
        }
        info!(
            submitted = report.submitted.len(),
            rejected = report.rejected.len(),
            "grid dispatched"
        );
        if self.config.verbose {
            println!(
                "{}: {} unit(s) submitted, {} refused",
                grid.name(),
                report.submitted.len(),
                report.rejected.len()
            );
        }
        report
    }
}

/// Backend that only writes the command line of every unit, one per line.
#[derive(Debug)]
pub struct DryRunBackend<W> {
    out: W,
}

impl<W: Write> DryRunBackend<W> {
    /// Print to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ExecutionBackend for DryRunBackend<W> {
    type Handle = ();

    fn submit(&mut self, request: SubmitRequest) -> Result<(), BackendError> {
        writeln!(self.out, "{}\t{}", request.run_id, request.argv.join(" "))
            .map_err(|e| BackendError::Other(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{ConfigId, GridBuilder, ParameterSpace, Treatment};

    #[derive(Default)]
    struct Flaky {
        failures: u32,
        calls: u32,
        accepted: Vec<SubmitRequest>,
    }

    impl ExecutionBackend for Flaky {
        type Handle = usize;

        fn submit(&mut self, request: SubmitRequest) -> Result<usize, BackendError> {
            self.calls += 1;
            if self.calls <= self.failures {
                return Err(BackendError::Transient("queue full".into()));
            }
            self.accepted.push(request);
            Ok(self.accepted.len())
        }
    }

    fn grid(arguments: Vec<Argument>) -> SweepGrid {
        GridBuilder::new("unit", ParameterSpace::new())
            .with_seeds([3])
            .with_extra_solver_args(&["--graphviz", "false"])
            .with_treatment(move |_, role| {
                Some(Treatment {
                    id: ConfigId::new("uct", role),
                    name: "uct0.5_1".to_owned(),
                    arguments: arguments.clone(),
                })
            })
            .build()
            .unwrap()
    }

    fn quiet() -> Configuration {
        Configuration::new()
            .with_verbose(false)
            .with_retry_backoff(Duration::ZERO)
    }

    #[test]
    fn command_line_and_properties() {
        let grid = grid(vec![
            Argument::text("--p1", "uct"),
            Argument::text("--p1explorationterm", "0.5"),
        ]);
        let mut dispatcher =
            RunDispatcher::new(Flaky::default(), SolverCommand::java_jar("solver.jar"), quiet());
        let report = dispatcher.dispatch(&grid);
        assert_eq!(report.submitted.len(), 1);

        let request = &dispatcher.backend_mut().accepted[0];
        assert_eq!(request.run_id, "carcassonne-uct0.5_1-3");
        assert_eq!(
            request.argv.join(" "),
            "java -jar solver.jar --p1 uct --p1explorationterm 0.5 --deckseed 3 -v false --graphviz false"
        );
        assert_eq!(request.properties.problem, "uct0.5_1");
        assert_eq!(request.properties.time_limit, 1800);
        assert_eq!(request.properties.memory_limit, 2048);
        let json = serde_json::to_value(&request.properties).unwrap();
        assert_eq!(json["id"], serde_json::json!(["carcassonne", "uct0.5_1", "3"]));
    }

    #[test]
    fn non_string_values_never_reach_the_backend() {
        let grid = grid(vec![Argument {
            flag: "--p1explorationterm".into(),
            value: AxisValue::Int(3),
        }]);
        let mut dispatcher =
            RunDispatcher::new(Flaky::default(), SolverCommand::java_jar("solver.jar"), quiet());
        let report = dispatcher.dispatch(&grid);
        assert!(report.submitted.is_empty());
        assert!(matches!(
            report.rejected[0].1,
            SubmissionError::NonStringValue { kind: "integer", .. }
        ));
        assert_eq!(dispatcher.backend_mut().calls, 0);
    }

    #[test]
    fn malformed_arguments() {
        assert!(matches!(
            render_arguments(&[Argument::text("p1", "uct")]),
            Err(SubmissionError::InvalidFlag(_))
        ));
        assert!(matches!(
            render_arguments(&[Argument::text("--p1", "uct tuned")]),
            Err(SubmissionError::MalformedValue { .. })
        ));
        assert!(matches!(
            render_arguments(&[Argument::text("--p1", "'uct'")]),
            Err(SubmissionError::MalformedValue { .. })
        ));
    }

    #[test]
    fn units_are_submitted_once() {
        let grid = grid(vec![Argument::text("--p1", "uct")]);
        let mut dispatcher =
            RunDispatcher::new(Flaky::default(), SolverCommand::java_jar("solver.jar"), quiet());
        assert_eq!(dispatcher.dispatch(&grid).submitted.len(), 1);
        let again = dispatcher.dispatch(&grid);
        assert!(matches!(
            again.rejected[0].1,
            SubmissionError::DuplicateUnit { seed: 3, .. }
        ));
        assert_eq!(dispatcher.submitted(), 1);
    }

    #[test]
    fn transient_failures_are_retried_when_enabled() {
        let grid = grid(vec![Argument::text("--p1", "uct")]);
        let backend = Flaky {
            failures: 2,
            ..Default::default()
        };

        let mut strict = RunDispatcher::new(backend, SolverCommand::java_jar("s.jar"), quiet());
        let report = strict.dispatch(&grid);
        assert!(matches!(
            report.rejected[0].1,
            SubmissionError::Backend { attempts: 1, .. }
        ));

        let backend = Flaky {
            failures: 2,
            ..Default::default()
        };
        let mut patient = RunDispatcher::new(
            backend,
            SolverCommand::java_jar("s.jar"),
            quiet().with_submit_retries(2),
        );
        assert_eq!(patient.dispatch(&grid).submitted.len(), 1);
        assert_eq!(patient.into_backend().calls, 3);
    }

    #[test]
    fn dry_run_prints_command_lines() {
        let grid = grid(vec![Argument::text("--p1", "uct")]);
        let mut dispatcher = RunDispatcher::new(
            DryRunBackend::new(Vec::new()),
            SolverCommand::java_jar("s.jar"),
            quiet(),
        );
        dispatcher.dispatch(&grid);
        let out = String::from_utf8(dispatcher.into_backend().out).unwrap();
        assert!(out.starts_with("carcassonne-uct0.5_1-3\tjava -jar s.jar --p1 uct --deckseed 3"));
    }
}
