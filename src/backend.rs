//! Local execution backend: runs every unit as a process on this machine.
//!
//! Each accepted unit gets a directory `<results>/<run id>/` holding `properties.json`, the
//! captured stdout (`run.log`) and stderr (`run.err`). Runs start as soon as the worker pool
//! (a [`Constraints`]) has the CPUs and the RAM they need, each on its own thread, inside a
//! cgroup when possible. The wall-clock limit is enforced by polling.
//!
//! Once a run is over, its termination is appended to its `properties.json`.

use std::{
    collections::VecDeque,
    fmt, fs,
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, Sender},
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    cgroup_manager::{LimitedProcess, ProcessOutput},
    configuration::Configuration,
    constraints::Constraints,
    dispatch::{ExecutionBackend, SubmitRequest},
    error::BackendError,
    results::{PROPERTIES_FILE, STDERR_FILE, STDOUT_FILE},
};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const KILL_TIMEOUT: Duration = Duration::from_secs(1);

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// Exited with status 0.
    Success,
    /// Exited with a non-zero status, or was killed by a signal (memory limit...).
    ExitCode,
    /// Killed after its wall-clock limit.
    Timeout,
    /// Never started.
    LaunchFailed,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Termination::Success => "success",
            Termination::ExitCode => "exit-code",
            Termination::Timeout => "timeout",
            Termination::LaunchFailed => "launch-failed",
        })
    }
}

/// What is known about a run once it is over.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Run id.
    pub run_id: String,
    /// How it ended.
    pub termination: Termination,
    /// Exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Wall-clock time, in seconds.
    pub wall_time: f64,
    #[serde(skip)]
    resources: Option<Constraints>,
}

/// Runs units as local processes, bounded by a worker pool.
///
/// Submission never blocks; call [`wait_all`](LocalBackend::wait_all) to wait for every
/// accepted run.
pub struct LocalBackend {
    results_dir: PathBuf,
    pool: Constraints,
    pool_ram: u64,
    config: Configuration,
    pending: VecDeque<(SubmitRequest, PathBuf)>,
    running: usize,
    tx: Sender<RunReport>,
    rx: Receiver<RunReport>,
    finished: Vec<RunReport>,
}

impl LocalBackend {
    /// Backend writing under `results_dir` (created if needed).
    ///
    /// # Errors
    /// When `results_dir` cannot be created.
    pub fn new(
        results_dir: impl Into<PathBuf>,
        pool: Constraints,
        config: Configuration,
    ) -> anyhow::Result<Self> {
        let results_dir = results_dir.into();
        fs::create_dir_all(&results_dir)
            .with_context(|| format!("could not create '{}'", results_dir.display()))?;
        trace!(?config, ?pool);
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            results_dir,
            pool_ram: pool.total_ram(),
            pool,
            config,
            pending: VecDeque::new(),
            running: 0,
            tx,
            rx,
            finished: vec![],
        })
    }

    /// Directory holding the run directories.
    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Number of runs accepted but not over yet.
    pub fn in_flight(&self) -> usize {
        self.pending.len() + self.running
    }

    /// Start as many pending runs as the pool allows, and collect the finished ones.
    pub fn pump(&mut self) {
        while let Ok(report) = self.rx.try_recv() {
            self.on_report(report);
        }
        while let Some((request, _)) = self.pending.front() {
            let Some(resources) = self.pool.try_take(request.memory_limit_mb) else {
                break;
            };
            let Some((request, run_dir)) = self.pending.pop_front() else {
                break;
            };
            self.launch(request, run_dir, resources);
        }
    }

    /// Block until every accepted run is over, and return the reports of the runs finished
    /// since the last call.
    #[instrument(skip_all)]
    pub fn wait_all(&mut self) -> Vec<RunReport> {
        self.pump();
        while self.running > 0 {
            match self.rx.recv() {
                Ok(report) => self.on_report(report),
                // unreachable while `self.tx` is alive
                Err(_) => break,
            }
            self.pump();
        }
        info!(runs = self.finished.len(), "all runs finished");
        std::mem::take(&mut self.finished)
    }

    fn on_report(&mut self, mut report: RunReport) {
        self.running -= 1;
        if let Some(resources) = report.resources.take() {
            self.pool.add(resources);
        }
        if self.config.verbose {
            println!(
                "{}: {} ({:.1}s)",
                report.run_id, report.termination, report.wall_time
            );
        }
        self.finished.push(report);
    }

    fn launch(&mut self, request: SubmitRequest, run_dir: PathBuf, resources: Constraints) {
        debug!(run_id = %request.run_id, cpus = %resources.cpu_list(), "starting run");
        self.running += 1;
        let tx = self.tx.clone();
        let config = self.config;
        thread::spawn(move || {
            let mut report = execute(&request, &run_dir, &resources, config);
            if let Err(e) = record_termination(&run_dir, &report) {
                warn!(run_id = %request.run_id, "could not record termination: {e:#}");
            }
            report.resources = Some(resources);
            // the backend may be gone if the caller did not wait
            let _ = tx.send(report);
        });
    }
}

impl ExecutionBackend for LocalBackend {
    type Handle = PathBuf;

    fn submit(&mut self, request: SubmitRequest) -> Result<PathBuf, BackendError> {
        if request.run_id.is_empty()
            || request.run_id.contains(['/', '\\'])
            || request.run_id.starts_with('.')
        {
            return Err(BackendError::Rejected(format!(
                "'{}' is not a valid directory name",
                request.run_id
            )));
        }
        if request.argv.is_empty() {
            return Err(BackendError::Rejected("empty command line".into()));
        }
        if request.memory_limit_mb > self.pool_ram {
            return Err(BackendError::Rejected(format!(
                "needs {}MB but the pool only has {}MB",
                request.memory_limit_mb, self.pool_ram
            )));
        }

        let run_dir = self.results_dir.join(&request.run_id);
        if run_dir.join(PROPERTIES_FILE).exists() {
            return Err(BackendError::Rejected(format!(
                "'{}' already holds a run",
                run_dir.display()
            )));
        }
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("could not create '{}'", run_dir.display()))?;
        let properties = serde_json::to_string_pretty(&request.properties)
            .context("could not serialize run properties")?;
        fs::write(run_dir.join(PROPERTIES_FILE), properties)
            .with_context(|| format!("could not write properties of '{}'", request.run_id))?;

        self.pending.push_back((request, run_dir.clone()));
        self.pump();
        Ok(run_dir)
    }
}

fn open_output(run_dir: &Path) -> anyhow::Result<ProcessOutput> {
    Ok(ProcessOutput {
        stdout: fs::File::create(run_dir.join(STDOUT_FILE)).context("could not create run.log")?,
        stderr: fs::File::create(run_dir.join(STDERR_FILE)).context("could not create run.err")?,
    })
}

fn spawn(
    request: &SubmitRequest,
    run_dir: &Path,
    resources: &Constraints,
    config: Configuration,
) -> anyhow::Result<LimitedProcess> {
    let (command, args) = request
        .argv
        .split_first()
        .context("empty command line")?;
    let max_memory = i64::try_from(request.memory_limit_mb.saturating_mul(1024 * 1024))
        .unwrap_or(i64::MAX);
    match LimitedProcess::launch(
        command,
        args,
        open_output(run_dir)?,
        max_memory,
        &resources.cpu_list(),
    ) {
        Ok(process) => Ok(process),
        Err(e) if config.allow_uncontained => {
            warn!(run_id = %request.run_id, "running without cgroup: {e:#}");
            LimitedProcess::launch_without_container(command, args, open_output(run_dir)?)
        }
        Err(e) => Err(e.context("could not launch contained process (uncontained runs are not allowed)")),
    }
}

fn execute(
    request: &SubmitRequest,
    run_dir: &Path,
    resources: &Constraints,
    config: Configuration,
) -> RunReport {
    let start = Instant::now();
    let report = |termination, exit_code| RunReport {
        run_id: request.run_id.clone(),
        termination,
        exit_code,
        wall_time: start.elapsed().as_secs_f64(),
        resources: None,
    };

    let mut process = match spawn(request, run_dir, resources, config) {
        Ok(process) => process,
        Err(e) => {
            warn!(run_id = %request.run_id, "launch failed: {e:#}");
            return report(Termination::LaunchFailed, None);
        }
    };
    debug!(run_id = %request.run_id, contained = process.is_contained(), "run started");

    // A limit too large for `Instant` means no deadline.
    let deadline = start.checked_add(request.time_limit);
    loop {
        match process.try_wait() {
            Ok(Some(status)) if status.success() => {
                return report(Termination::Success, status.code())
            }
            Ok(Some(status)) => return report(Termination::ExitCode, status.code()),
            Ok(None) if deadline.is_some_and(|d| Instant::now() >= d) => {
                if let Err(e) = process.try_kill(KILL_TIMEOUT) {
                    warn!(run_id = %request.run_id, "could not kill timed out run: {e:#}");
                }
                return report(Termination::Timeout, None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                warn!(run_id = %request.run_id, "lost track of run: {e:#}");
                let _ = process.try_kill(KILL_TIMEOUT);
                return report(Termination::ExitCode, None);
            }
        }
    }
}

fn record_termination(run_dir: &Path, report: &RunReport) -> anyhow::Result<()> {
    let path = run_dir.join(PROPERTIES_FILE);
    let mut properties: serde_json::Map<String, Value> =
        serde_json::from_str(&fs::read_to_string(&path).context("could not read properties")?)
            .context("malformed properties")?;
    if let Value::Object(fields) = serde_json::to_value(report)? {
        properties.extend(fields.into_iter().filter(|(k, _)| k != "run_id"));
    }
    fs::write(&path, serde_json::to_string_pretty(&properties)?)
        .context("could not write properties")
}
