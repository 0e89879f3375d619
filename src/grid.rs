//! Configuration grid generation.
//!
//! A sweep is declared as a [`ParameterSpace`] (named axes), optional filters over its points and
//! one or more treatments turning a point into a [`Treatment`]: a structured [`ConfigId`], a
//! display name and the solver argument vector. [`GridBuilder::build`] enumerates the product
//! once and returns an immutable [`SweepGrid`].
//!
//! Names are only a rendering of the identity. Two distinct identities rendering the same name
//! (e.g. a `1.5` and a `15` once the dot is stripped) are rejected at build time with
//! [`ConfigurationError::DuplicateName`].
//!
//! ```
//! use sweep_lab::grid::*;
//!
//! let space = ParameterSpace::new().with_axis(Axis::discrete("term", [0.0, 0.5, 3.0]));
//! let grid = GridBuilder::new("terms", space)
//!     .with_role_swap(true)
//!     .with_seeds(0..2)
//!     .with_treatment(|point, role| {
//!         let term = point.get("term")?.clone();
//!         let uct = PlayerSpec::new("uct").with_exploration_term(term.clone());
//!         let matchup = Matchup::new(uct, PlayerSpec::new("random")).seated(role);
//!         Some(Treatment {
//!             id: ConfigId::new("uct", role).with_exploration_term(&term),
//!             name: format!("uct{term}-vs-random_{}", role.number()),
//!             arguments: matchup.arguments(),
//!         })
//!     })
//!     .build()
//!     .unwrap();
//! assert_eq!(grid.len(), 6);
//! assert_eq!(grid.units().count(), 12);
//! ```

use std::{collections::BTreeMap, fmt, time::Duration};

use serde::{Serialize, Serializer};
use tracing::{debug, info, instrument};

use crate::error::ConfigurationError;

/// Default per-run wall-clock limit.
pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(1800);
/// Default per-run memory limit, in MB.
pub const DEFAULT_MEMORY_LIMIT_MB: u64 = 2048;
/// Default experiment domain.
pub const DEFAULT_DOMAIN: &str = "carcassonne";

/// A value on an axis, and the value type of solver arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AxisValue {
    /// Integer literal.
    Int(i64),
    /// Floating point literal. Rendered with at least one decimal (`3.0`, `0.5`).
    Float(f64),
    /// String literal.
    Text(String),
}

impl AxisValue {
    /// Numeric view of the value, `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AxisValue::Int(v) => Some(*v as f64),
            AxisValue::Float(v) => Some(*v),
            AxisValue::Text(_) => None,
        }
    }

    /// Same literal, as a string value.
    pub fn to_text(&self) -> AxisValue {
        AxisValue::Text(self.to_string())
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            AxisValue::Int(_) => "integer",
            AxisValue::Float(_) => "float",
            AxisValue::Text(_) => "string",
        }
    }
}

impl fmt::Display for AxisValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisValue::Int(v) => write!(f, "{v}"),
            AxisValue::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            AxisValue::Float(v) => write!(f, "{v}"),
            AxisValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i32> for AxisValue {
    fn from(value: i32) -> Self {
        AxisValue::Int(value.into())
    }
}

impl From<i64> for AxisValue {
    fn from(value: i64) -> Self {
        AxisValue::Int(value)
    }
}

impl From<u32> for AxisValue {
    fn from(value: u32) -> Self {
        AxisValue::Int(value.into())
    }
}

impl From<f64> for AxisValue {
    fn from(value: f64) -> Self {
        AxisValue::Float(value)
    }
}

impl From<&str> for AxisValue {
    fn from(value: &str) -> Self {
        AxisValue::Text(value.to_owned())
    }
}

impl From<String> for AxisValue {
    fn from(value: String) -> Self {
        AxisValue::Text(value)
    }
}

/// A named, discrete axis of a parameter space.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    name: String,
    values: Vec<AxisValue>,
}

impl Axis {
    /// Axis with an explicit list of values.
    pub fn discrete<V: Into<AxisValue>>(
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Integers `start, start + step, ...` strictly below `end`.
    pub fn int_range(
        name: impl Into<String>,
        start: i64,
        end: i64,
        step: i64,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if step <= 0 {
            return Err(ConfigurationError::InvalidRange {
                axis: name,
                reason: format!("step must be positive, got {step}"),
            });
        }
        let mut values = vec![];
        let mut v = start;
        while v < end {
            values.push(AxisValue::Int(v));
            match v.checked_add(step) {
                Some(next) => v = next,
                None => break,
            }
        }
        Ok(Self { name, values })
    }

    /// `count` floats `0, step, 2 * step, ...` (each computed as `i * step`).
    pub fn float_steps(
        name: impl Into<String>,
        count: usize,
        step: f64,
    ) -> Result<Self, ConfigurationError> {
        let name = name.into();
        if !step.is_finite() || step <= 0.0 {
            return Err(ConfigurationError::InvalidRange {
                axis: name,
                reason: format!("step must be a positive finite number, got {step}"),
            });
        }
        let values = (0..count)
            .map(|i| AxisValue::Float(i as f64 * step))
            .collect();
        Ok(Self { name, values })
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Axis values, in declaration order.
    pub fn values(&self) -> &[AxisValue] {
        &self.values
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.values.is_empty() {
            return Err(ConfigurationError::EmptyAxis(self.name.clone()));
        }
        for (i, value) in self.values.iter().enumerate() {
            if self.values[..i].contains(value) {
                return Err(ConfigurationError::RepeatedAxisValue {
                    axis: self.name.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One point of a parameter space: a value per axis.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Point {
    coords: Vec<(String, AxisValue)>,
}

impl Point {
    /// Value of `axis` at this point.
    pub fn get(&self, axis: &str) -> Option<&AxisValue> {
        self.coords
            .iter()
            .find_map(|(name, value)| (name == axis).then_some(value))
    }

    /// Numeric value of `axis` at this point.
    pub fn f64(&self, axis: &str) -> Option<f64> {
        self.get(axis)?.as_f64()
    }
}

/// The axes of a sweep. Static, defined once per sweep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSpace {
    axes: Vec<Axis>,
}

impl ParameterSpace {
    /// A space without axes. Its product is a single empty point.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an axis. Later axes vary fastest.
    pub fn with_axis(mut self, axis: Axis) -> Self {
        self.axes.push(axis);
        self
    }

    /// Declared axes.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Number of points in the full product.
    pub fn size(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    /// Full cartesian product, in declaration order.
    pub fn points(&self) -> Vec<Point> {
        let mut result = vec![Point::default()];
        for axis in &self.axes {
            let mut next = Vec::with_capacity(result.len() * axis.values.len());
            for existing in &result {
                for value in &axis.values {
                    let mut point = existing.clone();
                    point.coords.push((axis.name.clone(), value.clone()));
                    next.push(point);
                }
            }
            result = next;
        }
        result
    }
}

/// Which seat the treatment player takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Role {
    /// Treatment plays as player 1.
    First,
    /// Treatment plays as player 2.
    Second,
}

impl Role {
    /// 1 or 2.
    pub fn number(self) -> u8 {
        match self {
            Role::First => 1,
            Role::Second => 2,
        }
    }
}

/// Structured identity of a configuration. The display name is derived from it, never the
/// other way around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConfigId {
    /// Tree-policy family (or pairing) under test.
    pub family: String,
    /// Exploration term literal, if swept.
    pub exploration_term: Option<String>,
    /// Training iterations, if swept.
    pub iterations: Option<u32>,
    /// Seat of the treatment player.
    pub role: Role,
    /// Any other distinguishing coordinate (opponent, meeple probability...).
    pub variant: Option<String>,
}

impl ConfigId {
    /// Identity with only a family and a role.
    pub fn new(family: impl Into<String>, role: Role) -> Self {
        Self {
            family: family.into(),
            exploration_term: None,
            iterations: None,
            role,
            variant: None,
        }
    }

    /// Set the exploration term.
    pub fn with_exploration_term(mut self, term: impl fmt::Display) -> Self {
        self.exploration_term = Some(term.to_string());
        self
    }

    /// Set the training iterations.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    /// Set the variant.
    pub fn with_variant(mut self, variant: impl fmt::Display) -> Self {
        self.variant = Some(variant.to_string());
        self
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.family)?;
        if let Some(term) = &self.exploration_term {
            write!(f, "term={term}, ")?;
        }
        if let Some(its) = self.iterations {
            write!(f, "its={its}, ")?;
        }
        if let Some(variant) = &self.variant {
            write!(f, "variant={variant}, ")?;
        }
        write!(f, "role={}]", self.role.number())
    }
}

/// A `(flag, value)` pair of the solver command line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Argument {
    /// Flag, e.g. `--p1explorationterm`.
    pub flag: String,
    /// Value. Must be a string by the time it is submitted.
    pub value: AxisValue,
}

impl Argument {
    /// Pair with a string value.
    pub fn text(flag: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            flag: flag.into(),
            value: AxisValue::Text(value.to_string()),
        }
    }
}

/// One player of a match, as the solver sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSpec {
    /// Solver policy name (`uct`, `uct-tuned`, `random`...).
    pub policy: String,
    /// `--pNtrainingiterations`.
    pub training_iterations: Option<AxisValue>,
    /// `--pNexplorationterm`.
    pub exploration_term: Option<AxisValue>,
    /// `--pNmeepleplacementprob`.
    pub meeple_placement_prob: Option<AxisValue>,
    /// `--pNplayout`.
    pub playout: Option<String>,
}

impl PlayerSpec {
    /// Player with solver defaults.
    pub fn new(policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            training_iterations: None,
            exploration_term: None,
            meeple_placement_prob: None,
            playout: None,
        }
    }

    #[allow(missing_docs)]
    pub fn with_iterations(mut self, iterations: impl Into<AxisValue>) -> Self {
        self.training_iterations = Some(iterations.into());
        self
    }

    #[allow(missing_docs)]
    pub fn with_exploration_term(mut self, term: impl Into<AxisValue>) -> Self {
        self.exploration_term = Some(term.into());
        self
    }

    #[allow(missing_docs)]
    pub fn with_meeple_placement_prob(mut self, prob: impl Into<AxisValue>) -> Self {
        self.meeple_placement_prob = Some(prob.into());
        self
    }

    #[allow(missing_docs)]
    pub fn with_playout(mut self, playout: impl Into<String>) -> Self {
        self.playout = Some(playout.into());
        self
    }
}

/// Two players, in seat order.
#[derive(Debug, Clone, PartialEq)]
pub struct Matchup {
    /// Player 1.
    pub p1: PlayerSpec,
    /// Player 2.
    pub p2: PlayerSpec,
}

impl Matchup {
    /// `treatment` as player 1, `opponent` as player 2.
    pub fn new(treatment: PlayerSpec, opponent: PlayerSpec) -> Self {
        Self {
            p1: treatment,
            p2: opponent,
        }
    }

    /// Seat the treatment according to `role` (players exchanged for [`Role::Second`]).
    pub fn seated(self, role: Role) -> Self {
        match role {
            Role::First => self,
            Role::Second => Self {
                p1: self.p2,
                p2: self.p1,
            },
        }
    }

    /// Render the solver flags. Values keep their literal kind: a numeric value is not turned
    /// into a string here.
    pub fn arguments(&self) -> Vec<Argument> {
        let mut args = vec![
            Argument::text("--p1", &self.p1.policy),
            Argument::text("--p2", &self.p2.policy),
        ];
        let players = [(1, &self.p1), (2, &self.p2)];
        let mut push = |suffix: &str, pick: fn(&PlayerSpec) -> Option<AxisValue>| {
            for (n, player) in players {
                if let Some(value) = pick(player) {
                    args.push(Argument {
                        flag: format!("--p{n}{suffix}"),
                        value,
                    });
                }
            }
        };
        push("trainingiterations", |p| p.training_iterations.clone());
        push("explorationterm", |p| p.exploration_term.clone());
        push("meepleplacementprob", |p| p.meeple_placement_prob.clone());
        push("playout", |p| p.playout.clone().map(AxisValue::Text));
        args
    }
}

/// What a treatment produces for one point and one role.
#[derive(Debug, Clone, PartialEq)]
pub struct Treatment {
    /// Structured identity.
    pub id: ConfigId,
    /// Display name, unique within the sweep.
    pub name: String,
    /// Solver flags.
    pub arguments: Vec<Argument>,
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

/// A generated configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    /// Structured identity.
    pub id: ConfigId,
    /// Display name.
    pub name: String,
    /// Solver flags.
    pub arguments: Vec<Argument>,
    /// Wall-clock limit per run.
    #[serde(serialize_with = "as_secs", rename = "time_limit_seconds")]
    pub time_limit: Duration,
    /// Memory limit per run, in MB.
    pub memory_limit_mb: u64,
}

/// One execution unit of a grid: a configuration and a replicate seed.
#[derive(Debug, Clone, Copy)]
pub struct Unit<'g> {
    /// Experiment domain.
    pub domain: &'g str,
    /// Configuration.
    pub config: &'g RunConfig,
    /// Replicate seed.
    pub seed: u64,
}

impl Unit<'_> {
    /// `<domain>-<name>`: the aggregation key of every replicate of this configuration.
    pub fn canonical_name(&self) -> String {
        format!("{}-{}", self.domain, self.config.name)
    }

    /// `<domain>-<name>-<seed>`: unique within a sweep.
    pub fn run_id(&self) -> String {
        format!("{}-{}", self.canonical_name(), self.seed)
    }
}

type FilterFn<'a> = Box<dyn Fn(&Point) -> bool + 'a>;
type TreatmentFn<'a> = Box<dyn Fn(&Point, Role) -> Option<Treatment> + 'a>;

/// A parameter space with its own filters and treatments.
struct Block<'a> {
    space: ParameterSpace,
    filters: Vec<FilterFn<'a>>,
    treatments: Vec<TreatmentFn<'a>>,
}

impl<'a> Block<'a> {
    fn new(space: ParameterSpace) -> Self {
        Self {
            space,
            filters: vec![],
            treatments: vec![],
        }
    }
}

/// Declarative sweep description. Consumed by [`build`](GridBuilder::build).
///
/// A sweep may combine several parameter spaces (see [`with_space`](GridBuilder::with_space)):
/// filters and treatments always attach to the latest one.
pub struct GridBuilder<'a> {
    sweep: String,
    domain: String,
    blocks: Vec<Block<'a>>,
    role_swap: bool,
    seeds: Vec<u64>,
    time_limit: Duration,
    memory_limit_mb: u64,
    extra_solver_args: Vec<String>,
}

impl<'a> GridBuilder<'a> {
    /// Sweep `sweep` over `space`, with seeds `0..5`, no role swap and default limits.
    pub fn new(sweep: impl Into<String>, space: ParameterSpace) -> Self {
        Self {
            sweep: sweep.into(),
            domain: DEFAULT_DOMAIN.to_owned(),
            blocks: vec![Block::new(space)],
            role_swap: false,
            seeds: (0..5).collect(),
            time_limit: DEFAULT_TIME_LIMIT,
            memory_limit_mb: DEFAULT_MEMORY_LIMIT_MB,
            extra_solver_args: vec![],
        }
    }

    /// Set the experiment domain.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Start a new parameter space. Following filters and treatments apply to it only.
    pub fn with_space(mut self, space: ParameterSpace) -> Self {
        self.blocks.push(Block::new(space));
        self
    }

    fn current(&mut self) -> &mut Block<'a> {
        let last = self.blocks.len() - 1;
        &mut self.blocks[last]
    }

    /// Keep only the points for which `filter` holds (e.g. `i != j`).
    pub fn with_filter(mut self, filter: impl Fn(&Point) -> bool + 'a) -> Self {
        self.current().filters.push(Box::new(filter));
        self
    }

    /// Add a treatment. Returning `None` skips the point for that treatment; this is how
    /// conditional and derived axes are expressed.
    pub fn with_treatment(
        mut self,
        treatment: impl Fn(&Point, Role) -> Option<Treatment> + 'a,
    ) -> Self {
        self.current().treatments.push(Box::new(treatment));
        self
    }

    /// When enabled, every treatment is rendered for both seats.
    pub fn with_role_swap(mut self, value: bool) -> Self {
        self.role_swap = value;
        self
    }

    /// Replicate seeds.
    pub fn with_seeds(mut self, seeds: impl IntoIterator<Item = u64>) -> Self {
        self.seeds = seeds.into_iter().collect();
        self
    }

    /// Wall-clock limit of every run.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = limit;
        self
    }

    /// Memory limit of every run, in MB.
    pub fn with_memory_limit(mut self, megabytes: u64) -> Self {
        self.memory_limit_mb = megabytes;
        self
    }

    /// Arguments appended after the seed on every solver command line.
    pub fn with_extra_solver_args(mut self, args: &[&str]) -> Self {
        self.extra_solver_args = args.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Enumerate the sweep.
    ///
    /// # Errors
    /// [`ConfigurationError`] on an empty or repeated axis, on an empty or repeated seed list, and
    /// when two treatments render the same name.
    #[instrument(skip_all, fields(sweep = %self.sweep))]
    pub fn build(self) -> Result<SweepGrid, ConfigurationError> {
        for block in &self.blocks {
            for axis in block.space.axes() {
                axis.validate()?;
            }
        }
        if self.seeds.is_empty() {
            return Err(ConfigurationError::NoSeeds(self.sweep));
        }
        Axis::discrete("seed", self.seeds.iter().map(|&s| s as i64)).validate()?;

        let roles: &[Role] = if self.role_swap {
            &[Role::First, Role::Second]
        } else {
            &[Role::First]
        };

        let mut configs: BTreeMap<String, RunConfig> = BTreeMap::new();
        let mut skipped = 0;
        for block in &self.blocks {
            for point in block.space.points() {
                if !block.filters.iter().all(|keep| keep(&point)) {
                    skipped += block.treatments.len() * roles.len();
                    continue;
                }
                for treatment in &block.treatments {
                    for &role in roles {
                        let Some(t) = treatment(&point, role) else {
                            skipped += 1;
                            continue;
                        };
                        if let Some(existing) = configs.get(&t.name) {
                            return Err(ConfigurationError::DuplicateName {
                                name: t.name,
                                first: Box::new(existing.id.clone()),
                                second: Box::new(t.id),
                            });
                        }
                        configs.insert(
                            t.name.clone(),
                            RunConfig {
                                id: t.id,
                                name: t.name,
                                arguments: t.arguments,
                                time_limit: self.time_limit,
                                memory_limit_mb: self.memory_limit_mb,
                            },
                        );
                    }
                }
            }
        }

        debug!(skipped, "skipped (point, treatment, role) combinations");
        info!(
            configs = configs.len(),
            units = configs.len() * self.seeds.len(),
            "grid generated"
        );

        Ok(SweepGrid {
            sweep: self.sweep,
            domain: self.domain,
            configs,
            seeds: self.seeds,
            extra_solver_args: self.extra_solver_args,
            skipped,
        })
    }
}

/// A finished sweep: name -> configuration, plus the replicate seeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepGrid {
    sweep: String,
    domain: String,
    configs: BTreeMap<String, RunConfig>,
    seeds: Vec<u64>,
    extra_solver_args: Vec<String>,
    skipped: usize,
}

impl SweepGrid {
    /// Sweep name.
    pub fn name(&self) -> &str {
        &self.sweep
    }

    /// Experiment domain.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Replicate seeds.
    pub fn seeds(&self) -> &[u64] {
        &self.seeds
    }

    /// Arguments appended to every solver command line.
    pub fn extra_solver_args(&self) -> &[String] {
        &self.extra_solver_args
    }

    /// Number of configurations (not counting seeds).
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// True when no configuration was generated.
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Number of `(point, treatment, role)` combinations that were explicitly skipped.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Configuration named `name`.
    pub fn get(&self, name: &str) -> Option<&RunConfig> {
        self.configs.get(name)
    }

    /// Configurations, ordered by name.
    pub fn configs(&self) -> impl Iterator<Item = &RunConfig> {
        self.configs.values()
    }

    /// Every `(configuration, seed)` pair, ordered by name then seed.
    pub fn units(&self) -> impl Iterator<Item = Unit<'_>> {
        self.configs.values().flat_map(move |config| {
            self.seeds.iter().map(move |&seed| Unit {
                domain: &self.domain,
                config,
                seed,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn exploration_grid(role_swap: bool) -> Result<SweepGrid, ConfigurationError> {
        let space = ParameterSpace::new().with_axis(Axis::discrete(
            "exploration_term",
            [AxisValue::Int(0), AxisValue::Float(0.5), AxisValue::Int(3)],
        ));
        GridBuilder::new("example", space)
            .with_role_swap(role_swap)
            .with_seeds([0, 1])
            .with_treatment(|point, role| {
                let term = point.get("exploration_term")?.clone();
                let uct = PlayerSpec::new("uct").with_exploration_term(term.to_text());
                Some(Treatment {
                    id: ConfigId::new("uct", role).with_exploration_term(&term),
                    name: format!("uct{term}-vs-random_{}", role.number()),
                    arguments: Matchup::new(uct, PlayerSpec::new("random"))
                        .seated(role)
                        .arguments(),
                })
            })
            .build()
    }

    #[test]
    fn role_swap_doubles_every_treatment() {
        let grid = exploration_grid(true).unwrap();
        assert_eq!(grid.len(), 6);
        let run_ids: HashSet<_> = grid.units().map(|u| u.run_id()).collect();
        assert_eq!(run_ids.len(), 12);

        let second = grid.get("uct0.5-vs-random_2").unwrap();
        assert_eq!(second.arguments[0], Argument::text("--p1", "random"));
        assert_eq!(second.arguments[1], Argument::text("--p2", "uct"));
        assert_eq!(second.arguments[2], Argument::text("--p2explorationterm", "0.5"));
    }

    #[test]
    fn generation_is_deterministic() {
        assert_eq!(exploration_grid(true).unwrap(), exploration_grid(true).unwrap());
    }

    #[test]
    fn filter_excludes_diagonal() {
        let space = ParameterSpace::new()
            .with_axis(Axis::int_range("i", 0, 3, 1).unwrap())
            .with_axis(Axis::int_range("j", 0, 3, 1).unwrap());
        let grid = GridBuilder::new("self-play", space)
            .with_filter(|p| p.get("i") != p.get("j"))
            .with_treatment(|p, role| {
                let (i, j) = (p.get("i")?, p.get("j")?);
                Some(Treatment {
                    id: ConfigId::new("uct", role).with_variant(format!("{i}/{j}")),
                    name: format!("uct{i}-vs-uct{j}"),
                    arguments: vec![],
                })
            })
            .build()
            .unwrap();
        assert_eq!(grid.len(), 6);
        assert!(grid.get("uct1-vs-uct1").is_none());
        assert_eq!(grid.skipped(), 3);
    }

    #[test]
    fn conditional_axis_skips_are_counted() {
        let space = ParameterSpace::new().with_axis(Axis::int_range("i", 0, 4, 1).unwrap());
        let grid = GridBuilder::new("epsilon", space)
            .with_treatment(|p, role| {
                let i = p.f64("i")?;
                if i == 0.0 {
                    return None;
                }
                let epsilon = AxisValue::Float(1.0 / i);
                Some(Treatment {
                    id: ConfigId::new("epsilon-greedy", role).with_exploration_term(&epsilon),
                    name: format!("epsilongreedy{epsilon}"),
                    arguments: vec![],
                })
            })
            .build()
            .unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.skipped(), 1);
        assert!(grid.get("epsilongreedy0.5").is_some());
        assert!(grid.get("epsilongreedy1.0").is_some());
    }

    #[test]
    fn numeric_literal_collision_is_rejected() {
        let space = ParameterSpace::new().with_axis(Axis::discrete("term", [1.5, 15.0]));
        let err = GridBuilder::new("dotless", space)
            .with_treatment(|p, role| {
                let term = p.get("term")?;
                let literal = match term {
                    AxisValue::Float(v) if v.fract() == 0.0 => format!("{}", *v as i64),
                    other => other.to_string(),
                };
                Some(Treatment {
                    id: ConfigId::new("uct", role).with_exploration_term(term),
                    name: format!("uct{}", literal.replace('.', "")),
                    arguments: vec![],
                })
            })
            .build()
            .unwrap_err();
        assert!(
            matches!(err, ConfigurationError::DuplicateName { ref name, .. } if name == "uct15")
        );
    }

    #[test]
    fn invalid_axes_are_rejected() {
        let repeated = ParameterSpace::new().with_axis(Axis::discrete("x", [1, 1]));
        assert!(matches!(
            GridBuilder::new("r", repeated).build(),
            Err(ConfigurationError::RepeatedAxisValue { .. })
        ));

        let empty = ParameterSpace::new().with_axis(Axis::discrete::<i64>("x", []));
        assert!(matches!(
            GridBuilder::new("e", empty).build(),
            Err(ConfigurationError::EmptyAxis(_))
        ));

        assert!(Axis::int_range("x", 0, 10, 0).is_err());
        assert!(matches!(
            GridBuilder::new("s", ParameterSpace::new())
                .with_seeds([])
                .build(),
            Err(ConfigurationError::NoSeeds(_))
        ));
    }

    #[test]
    fn ranges_stop_at_the_integer_limit() {
        let axis = Axis::int_range("x", i64::MAX - 1, i64::MAX, 5).unwrap();
        assert_eq!(axis.values, [AxisValue::Int(i64::MAX - 1)]);

        let axis = Axis::int_range("x", i64::MAX - 10, i64::MAX, 4).unwrap();
        assert_eq!(
            axis.values,
            [i64::MAX - 10, i64::MAX - 6, i64::MAX - 2].map(AxisValue::Int)
        );
    }

    #[test]
    fn floats_render_like_literals() {
        assert_eq!(AxisValue::Float(3.0).to_string(), "3.0");
        assert_eq!(AxisValue::Float(0.5).to_string(), "0.5");
        assert_eq!(AxisValue::Float(1.0 / 1.5).to_string(), "0.6666666666666666");
        assert_eq!(AxisValue::Int(3).to_string(), "3");
    }
}
