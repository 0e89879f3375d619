//! Per-run results and the stores they are read from.
//!
//! A results store is one of:
//! - a directory written by the [`LocalBackend`](crate::backend::LocalBackend): one
//!   sub-directory per run holding `properties.json` and the raw output `run.log`, from which
//!   fields are extracted;
//! - a lab-style `properties` file (or a directory holding one): a JSON object mapping each run
//!   id to its already-parsed fields;
//! - a `.jsonl` file of [`RunResult`] records, as written by [`write_jsonl`].

use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    ops::Add,
    path::Path,
};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::{dispatch::RunProperties, extract::OutputExtractor};

/// Name of the properties file of a backend run directory.
pub const PROPERTIES_FILE: &str = "properties.json";
/// Name of the captured stdout of a backend run directory.
pub const STDOUT_FILE: &str = "run.log";
/// Name of the captured stderr of a backend run directory.
pub const STDERR_FILE: &str = "run.err";

/// A numeric field value. Integers stay integers when summed together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
}

impl Scalar {
    /// Value as `f64`.
    pub fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    /// Read a CSV cell: an integer literal is an `Int`, any other number a `Float`.
    pub fn parse(literal: &str) -> Option<Scalar> {
        let literal = literal.trim();
        literal
            .parse()
            .map(Scalar::Int)
            .ok()
            .or_else(|| literal.parse().map(Scalar::Float).ok())
    }

    fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            Value::String(s) => Scalar::parse(s),
            _ => None,
        }
    }
}

impl Add for Scalar {
    type Output = Scalar;

    fn add(self, rhs: Scalar) -> Scalar {
        match (self, rhs) {
            (Scalar::Int(a), Scalar::Int(b)) => match a.checked_add(b) {
                Some(sum) => Scalar::Int(sum),
                None => Scalar::Float(a as f64 + b as f64),
            },
            (a, b) => Scalar::Float(a.as_f64() + b.as_f64()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            // Always a `.` or an exponent, so the literal reads back as a float.
            Scalar::Float(v) => write!(f, "{v:?}"),
        }
    }
}

/// Outcome of one run. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Run id, i.e. the configuration name followed by its replicate marker.
    pub config_name: String,
    /// Replicate seed, when known.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Every declared field, `None` when absent.
    pub fields: BTreeMap<String, Option<Scalar>>,
    /// Raw solver output, when it was kept.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_output: String,
}

/// Load every run of the store at `path`. See the [module documentation](self) for the
/// accepted layouts. `extractor` is applied to raw outputs and names the declared fields.
///
/// # Errors
/// When the store cannot be read or is malformed.
#[instrument(skip(extractor))]
pub fn load_store(path: &Path, extractor: &OutputExtractor) -> anyhow::Result<Vec<RunResult>> {
    let results = if path.is_dir() {
        let lab = path.join("properties");
        if lab.is_file() {
            load_lab_properties(&lab, extractor)?
        } else {
            load_backend_dir(path, extractor)?
        }
    } else if path.extension().is_some_and(|e| e == "jsonl") {
        read_jsonl(path)?
    } else if path.is_file() {
        load_lab_properties(path, extractor)?
    } else {
        bail!("results store '{}' does not exist", path.display());
    };
    info!(runs = results.len(), "results loaded");
    Ok(results)
}

/// Read a [`LocalBackend`](crate::backend::LocalBackend) results directory.
///
/// Sub-directories without `properties.json` are ignored. A run without output (never
/// started, or crashed before printing) yields a result with every field absent.
///
/// # Errors
/// When the directory cannot be listed or a `properties.json` is malformed.
pub fn load_backend_dir(dir: &Path, extractor: &OutputExtractor) -> anyhow::Result<Vec<RunResult>> {
    let mut results = vec![];
    let entries =
        fs::read_dir(dir).with_context(|| format!("could not read '{}'", dir.display()))?;
    for entry in entries {
        let run_dir = entry.context("could not read directory entry")?.path();
        let properties_path = run_dir.join(PROPERTIES_FILE);
        if !properties_path.is_file() {
            debug!(path = %run_dir.display(), "not a run directory");
            continue;
        }
        let properties: RunProperties = serde_json::from_str(
            &fs::read_to_string(&properties_path)
                .with_context(|| format!("could not read '{}'", properties_path.display()))?,
        )
        .with_context(|| format!("malformed '{}'", properties_path.display()))?;

        let run_id = properties.run_id();
        let raw_output = match fs::read_to_string(run_dir.join(STDOUT_FILE)) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%run_id, "no output: {e}");
                String::new()
            }
        };
        let extraction = extractor.extract(&run_id, &raw_output);
        results.push(RunResult {
            config_name: run_id,
            seed: Some(properties.seed),
            fields: extraction.fields,
            raw_output,
        });
    }
    results.sort_by(|a, b| (&a.config_name, a.seed).cmp(&(&b.config_name, b.seed)));
    Ok(results)
}

/// Read a lab-style `properties` JSON document: `{ "<run id>": { "<field>": value, .. }, .. }`.
///
/// Only the fields declared by `extractor` are kept. The seed is read from `seed` or from the
/// last element of `id` when present.
///
/// # Errors
/// When the file cannot be read or is not a JSON object of objects.
pub fn load_lab_properties(
    path: &Path,
    extractor: &OutputExtractor,
) -> anyhow::Result<Vec<RunResult>> {
    let file = File::open(path).with_context(|| format!("could not open '{}'", path.display()))?;
    let document: BTreeMap<String, BTreeMap<String, Value>> =
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("malformed properties file '{}'", path.display()))?;

    Ok(document
        .into_iter()
        .map(|(run_id, properties)| {
            let seed = properties
                .get("seed")
                .and_then(Value::as_u64)
                .or_else(|| {
                    let last = properties.get("id")?.as_array()?.last()?;
                    last.as_u64().or_else(|| last.as_str()?.parse().ok())
                });
            let fields = extractor
                .fields()
                .map(|field| {
                    let value = properties.get(field).and_then(Scalar::from_json);
                    (field.to_owned(), value)
                })
                .collect();
            RunResult {
                config_name: run_id,
                seed,
                fields,
                raw_output: String::new(),
            }
        })
        .collect())
}

/// Read line-delimited [`RunResult`] records. Blank lines are skipped.
///
/// # Errors
/// When the file cannot be read or a line is not a record.
pub fn read_jsonl(path: &Path) -> anyhow::Result<Vec<RunResult>> {
    let file = File::open(path).with_context(|| format!("could not open '{}'", path.display()))?;
    let mut results = vec![];
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("could not read '{}'", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        results.push(
            serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: malformed record", path.display(), i + 1))?,
        );
    }
    Ok(results)
}

/// Write one [`RunResult`] per line.
///
/// # Errors
/// When the file cannot be written.
pub fn write_jsonl(path: &Path, results: &[RunResult]) -> anyhow::Result<()> {
    let file =
        File::create(path).with_context(|| format!("could not create '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    for result in results {
        serde_json::to_writer(&mut writer, result).context("could not serialize run result")?;
        writeln!(writer)?;
    }
    writer.flush().context("could not write run results")
}
