//! Defines the resources of the local worker pool.
//!
//! The [`LocalBackend`](crate::backend::LocalBackend) runs every execution unit as its own
//! process. How many of them run at once is bounded by a [`Constraints`]: a set of CPUs, some of
//! which are handed to each run, and a total amount of RAM from which each run's memory limit is
//! taken.
//!
//! # Linux-Only
//!
//! CPU pinning and memory limits are enforced with cgroups v2, so they only apply on Linux. On
//! other platforms the constraints still bound concurrency.
//!
//! # Example
//!
//! ```no_run
//! use sweep_lab::constraints::ConstraintsBuilder;
//!
//! let constraints = ConstraintsBuilder::new()
//!     .with_max_total_ram(32_000)
//!     .with_cpu_list("0-7")
//!     .with_cpus_per_run(2)
//!     .build()
//!     .unwrap();
//! ```
//!
//! You may also construct constraints from environment variables using
//! [`ConstraintsBuilder::from_env()`].

use std::{collections::BTreeSet, env};

use anyhow::{bail, Context};
use tracing::warn;

#[derive(Debug, Default)]
enum AutoCpus {
    #[default]
    Auto,
    Count(usize),
    List(String),
}

/// A builder for the worker pool resources.
///
/// By default the pool uses the available memory of the host and its physical CPUs, one CPU
/// per run.
#[derive(Debug, Default)]
pub struct ConstraintsBuilder {
    total_ram: Option<u64>,
    cpus: AutoCpus,
    cpus_per_run: Option<usize>,
}

impl ConstraintsBuilder {
    /// Creates a new `ConstraintsBuilder` with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `ConstraintsBuilder` configured from environment variables.
    ///
    /// Read environment variables are:
    /// - `MAX_TOTAL_RAM` (MB): RAM shared by all the runs
    /// - `CPU_LIST` (string): comma-separated list or ranges of CPUs, e.g. "0-3,6"
    /// - `TOTAL_CPU_COUNT`: number of CPUs, overridden by `CPU_LIST`
    /// - `CPUS_PER_RUN`: number of CPUs given to each run
    #[must_use]
    pub fn from_env() -> Self {
        fn parse_number<T: std::str::FromStr>(var: &str) -> Option<T> {
            env::var(var).ok()?.trim().parse().ok()
        }

        let cpus = if let Ok(list) = env::var("CPU_LIST") {
            AutoCpus::List(list)
        } else if let Some(count) = parse_number("TOTAL_CPU_COUNT") {
            AutoCpus::Count(count)
        } else {
            AutoCpus::Auto
        };

        ConstraintsBuilder {
            total_ram: parse_number("MAX_TOTAL_RAM"),
            cpus,
            cpus_per_run: parse_number("CPUS_PER_RUN"),
        }
    }

    /// Sets the RAM shared by all the runs (in MB).
    #[must_use]
    pub fn with_max_total_ram(self, max: u64) -> Self {
        Self {
            total_ram: Some(max),
            ..self
        }
    }

    /// Sets the specific CPUs available to the runs.
    ///
    /// Format follows the pattern: `"0-3,6,8"` (inclusive ranges and individual IDs).
    #[must_use]
    pub fn with_cpu_list(self, cpus: &str) -> Self {
        Self {
            cpus: AutoCpus::List(cpus.to_string()),
            ..self
        }
    }

    /// Sets the number of CPUs available to the runs.
    ///
    /// This will be ignored if `with_cpu_list` is also specified.
    #[must_use]
    pub fn with_total_cpu_count(self, max: usize) -> Self {
        if let AutoCpus::List(_) = self.cpus {
            warn!("`with_total_cpu_count` is ignored if `with_cpu_list` is used!");
            self
        } else {
            Self {
                cpus: AutoCpus::Count(max),
                ..self
            }
        }
    }

    /// Sets the number of CPUs given to each run.
    ///
    /// Default is one
    #[must_use]
    pub fn with_cpus_per_run(self, count: usize) -> Self {
        Self {
            cpus_per_run: Some(count),
            ..self
        }
    }

    /// Consumes the builder and returns the constructed `Constraints`.
    ///
    /// # Errors
    ///
    /// When the CPU list cannot be parsed, or when a single run needs more CPUs than the pool
    /// has.
    pub fn build(self) -> anyhow::Result<Constraints> {
        let total_ram = self.total_ram.unwrap_or_else(|| {
            let mut sys = sysinfo::System::new();
            sys.refresh_memory();
            sys.available_memory() / 1_000_000
        });

        // Physical CPUs by default: sharing a core between two solvers skews their timings.
        let cpus = match self.cpus {
            AutoCpus::Auto => (0..num_cpus::get_physical() as u16).collect(),
            AutoCpus::Count(count) => (0..count as u16).collect(),
            AutoCpus::List(s) => {
                cpu_list_to_set(&s).map_err(|e| e.context("error parsing cpu list"))?
            }
        };
        let cpus_per_run = self.cpus_per_run.unwrap_or(1).max(1);
        if cpus_per_run > cpus.len() {
            bail!(
                "runs need {cpus_per_run} CPUs but only {} are available",
                cpus.len()
            );
        }

        Ok(Constraints {
            total_ram,
            cpus,
            cpus_per_run,
        })
    }
}

fn cpu_list_to_set(s: &str) -> anyhow::Result<BTreeSet<u16>> {
    if s.trim().is_empty() {
        bail!("Empty string");
    }
    let parse = |value: &str| -> anyhow::Result<u16> {
        value
            .trim()
            .parse()
            .with_context(|| format!("could not parse {value}"))
    };
    let mut set = BTreeSet::new();
    for item in s.split(',') {
        match item.split('-').collect::<Vec<_>>()[..] {
            [value] => {
                set.insert(parse(value)?);
            }
            [start, end] => {
                let (start, end) = (parse(start)?, parse(end)?);
                set.extend(start.min(end)..=start.max(end));
            }
            _ => bail!(
                "each comma-separated item must be a number or a range (e.g. '0-3'), got '{item}'"
            ),
        }
    }
    Ok(set)
}

/// Resources of the worker pool, or of one run once taken from the pool.
///
/// Obtained using `ConstraintsBuilder`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Constraints {
    pub(crate) total_ram: u64,
    pub(crate) cpus: BTreeSet<u16>,
    pub(crate) cpus_per_run: usize,
}

impl Constraints {
    /// create a ConstraintsBuilder
    pub fn builder() -> ConstraintsBuilder {
        ConstraintsBuilder::new()
    }

    /// RAM, in MB.
    pub fn total_ram(&self) -> u64 {
        self.total_ram
    }

    /// CPUs, in cgroup `cpuset` syntax (`"0,1,4"`).
    pub fn cpu_list(&self) -> String {
        self.cpus
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Maximum number of runs the pool can hold at once, if each takes `ram` MB.
    pub fn capacity(&self, ram: u64) -> usize {
        let by_cpu = self.cpus.len() / self.cpus_per_run;
        match ram {
            0 => by_cpu,
            ram => by_cpu.min((self.total_ram / ram) as usize),
        }
    }

    /// Give back resources taken with [`try_take`](Self::try_take).
    pub(crate) fn add(&mut self, res: Constraints) {
        self.total_ram += res.total_ram;
        self.cpus.extend(res.cpus);
    }

    /// Take `cpus_per_run` CPUs and `ram` MB for one run, if the pool has them.
    pub(crate) fn try_take(&mut self, ram: u64) -> Option<Constraints> {
        if self.cpus.len() < self.cpus_per_run || self.total_ram < ram {
            return None;
        }
        let mut cpus = BTreeSet::new();
        for _ in 0..self.cpus_per_run {
            cpus.insert(self.cpus.pop_first()?);
        }
        self.total_ram -= ram;
        Some(Constraints {
            total_ram: ram,
            cpus,
            cpus_per_run: self.cpus_per_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_list_ranges() {
        let set = cpu_list_to_set("0-3,6, 5-4").unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), [0, 1, 2, 3, 4, 5, 6]);
        assert!(cpu_list_to_set("").is_err());
        assert!(cpu_list_to_set("1-2-3").is_err());
        assert!(cpu_list_to_set("a").is_err());
    }

    #[test]
    fn take_and_give_back() {
        let mut pool = ConstraintsBuilder::new()
            .with_max_total_ram(10_000)
            .with_cpu_list("0-3")
            .with_cpus_per_run(2)
            .build()
            .unwrap();
        assert_eq!(pool.capacity(4_000), 2);
        assert_eq!(pool.capacity(8_000), 1);
        assert_eq!(pool.capacity(0), 2);
        assert_eq!(pool.capacity(20_000), 0);

        let first = pool.try_take(4_000).unwrap();
        assert_eq!(first.cpu_list(), "0,1");
        let second = pool.try_take(4_000).unwrap();
        assert!(pool.try_take(1).is_none());

        pool.add(first);
        assert_eq!(pool.total_ram(), 6_000);
        assert!(pool.try_take(8_000).is_none());
        assert!(pool.try_take(6_000).is_some());
        drop(second);
    }

    #[test]
    fn too_many_cpus_per_run() {
        assert!(ConstraintsBuilder::new()
            .with_max_total_ram(1_000)
            .with_total_cpu_count(2)
            .with_cpus_per_run(3)
            .build()
            .is_err());
    }
}
