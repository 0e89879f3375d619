//! Catalogue of the Carcassonne sweeps.
//!
//! Each preset reproduces one experiment: names, argument vectors, seeds and limits. Names keep
//! their historical formats; [`recover`](crate::recover) decodes parameters back out of them.

use std::{fmt, str::FromStr, time::Duration};

use crate::{
    error::ConfigurationError,
    grid::{
        Argument, Axis, AxisValue, ConfigId, GridBuilder, Matchup, ParameterSpace, PlayerSpec,
        Role, SweepGrid, Treatment,
    },
};

/// Every known sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Sweep {
    /// UCT, Boltzmann and epsilon-greedy exploration terms against decaying epsilon-greedy.
    ExplorationTerms,
    /// Six tree policies against each other at 1000 iterations.
    TreePolicyShowdown,
    /// Training iterations against a random opponent.
    TrainingIterations,
    /// Exploration constant `0, 0.5, .., 14.5` and the derived epsilon `1/i`.
    ExplorationConstants,
    /// Self-play with exploration terms `i != j`.
    SelfPlayTerms,
    /// Meeple placement probability against random and heuristic opponents.
    MeeplePlacement,
    /// Mirror matches to measure seed variance.
    Variance,
}

impl Sweep {
    /// All presets.
    pub const ALL: [Sweep; 7] = [
        Sweep::ExplorationTerms,
        Sweep::TreePolicyShowdown,
        Sweep::TrainingIterations,
        Sweep::ExplorationConstants,
        Sweep::SelfPlayTerms,
        Sweep::MeeplePlacement,
        Sweep::Variance,
    ];

    /// Kebab-case name of the preset.
    pub fn name(self) -> &'static str {
        match self {
            Sweep::ExplorationTerms => "exploration-terms",
            Sweep::TreePolicyShowdown => "tree-policy-showdown",
            Sweep::TrainingIterations => "training-iterations",
            Sweep::ExplorationConstants => "exploration-constants",
            Sweep::SelfPlayTerms => "self-play-terms",
            Sweep::MeeplePlacement => "meeple-placement",
            Sweep::Variance => "variance",
        }
    }

    /// Build the preset. `sharing` only matters for [`Sweep::TreePolicyShowdown`].
    pub fn build(self, sharing: ArgumentSharing) -> Result<SweepGrid, ConfigurationError> {
        match self {
            Sweep::ExplorationTerms => exploration_terms(),
            Sweep::TreePolicyShowdown => tree_policy_showdown(sharing),
            Sweep::TrainingIterations => training_iterations(),
            Sweep::ExplorationConstants => exploration_constants(),
            Sweep::SelfPlayTerms => self_play_terms(),
            Sweep::MeeplePlacement => meeple_placement(),
            Sweep::Variance => variance(),
        }
    }
}

impl fmt::Display for Sweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Sweep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sweep::ALL
            .into_iter()
            .find(|sweep| sweep.name() == s)
            .ok_or_else(|| format!("unknown sweep '{s}'"))
    }
}

/// How the tree-policy showdown assigns argument vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgumentSharing {
    /// Historical behavior: every name maps to the argument vector of the first pairing, with
    /// integer exploration terms. The dispatcher refuses those units.
    #[default]
    Legacy,
    /// Each pairing gets its own (string) arguments.
    PerMatchup,
}

const DECAYING: &str = "decaying-epsilon-greedy";
const MEMORY_LIMIT_8G: u64 = 8192;

fn dotted(term: &AxisValue) -> String {
    match term {
        AxisValue::Float(v) if (v - 1.4142).abs() < 1e-9 => "sqrt2".to_owned(),
        other => other.to_string().replace('.', "dot"),
    }
}

fn versus(treatment: &str, opponent: &str, role: Role) -> String {
    match role {
        Role::First => format!("{treatment}-vs-{opponent}"),
        Role::Second => format!("{opponent}-vs-{treatment}"),
    }
}

/// Exploration terms of UCT (50 and 500 iterations), Boltzmann temperatures and epsilon-greedy
/// epsilons, each against decaying epsilon-greedy, both seatings.
pub fn exploration_terms() -> Result<SweepGrid, ConfigurationError> {
    let uct_terms = ParameterSpace::new()
        .with_axis(Axis::discrete(
            "exploration_term",
            [
                AxisValue::Int(0),
                AxisValue::Float(0.5),
                AxisValue::Float(1.4142),
                AxisValue::Int(3),
                AxisValue::Int(5),
                AxisValue::Int(10),
            ],
        ))
        .with_axis(Axis::discrete("iterations", [50, 500]));
    let temperatures = ParameterSpace::new().with_axis(Axis::discrete("tau", [1, 2, 5, 10]));
    let epsilons = ParameterSpace::new().with_axis(Axis::discrete(
        "epsilon",
        [
            AxisValue::Int(0),
            AxisValue::Float(0.1),
            AxisValue::Float(0.2),
            AxisValue::Float(0.3),
            AxisValue::Float(0.4),
            AxisValue::Float(0.5),
        ],
    ));

    GridBuilder::new(Sweep::ExplorationTerms.name(), uct_terms)
        .with_role_swap(true)
        .with_memory_limit(MEMORY_LIMIT_8G)
        .with_treatment(|p, role| {
            let term = p.get("exploration_term")?;
            let its = p.get("iterations")?;
            let uct = PlayerSpec::new("uct")
                .with_iterations(its.to_text())
                .with_exploration_term(term.to_text());
            let opponent = PlayerSpec::new(DECAYING).with_iterations(its.to_text());
            Some(Treatment {
                id: ConfigId::new("uct", role)
                    .with_exploration_term(term)
                    .with_iterations(p.f64("iterations")? as u32),
                name: format!(
                    "{}-expterm-{}-{its}its",
                    versus("uct", DECAYING, role),
                    dotted(term)
                ),
                arguments: Matchup::new(uct, opponent).seated(role).arguments(),
            })
        })
        .with_space(temperatures)
        .with_treatment(|p, role| {
            let tau = p.get("tau")?;
            let boltzmann = PlayerSpec::new("boltzmann")
                .with_iterations("200")
                .with_exploration_term(tau.to_text());
            let opponent = PlayerSpec::new(DECAYING).with_iterations("200");
            Some(Treatment {
                id: ConfigId::new("boltzmann", role)
                    .with_exploration_term(tau)
                    .with_iterations(200),
                name: format!("{}-tau-{tau}", versus("boltzmann", DECAYING, role)),
                arguments: Matchup::new(boltzmann, opponent).seated(role).arguments(),
            })
        })
        .with_space(epsilons)
        .with_treatment(|p, role| {
            let epsilon = p.get("epsilon")?;
            let greedy = PlayerSpec::new("epsilon-greedy")
                .with_iterations("200")
                .with_exploration_term(epsilon.to_text());
            let opponent = PlayerSpec::new(DECAYING).with_iterations("200");
            Some(Treatment {
                id: ConfigId::new("epsilon-greedy", role)
                    .with_exploration_term(epsilon)
                    .with_iterations(200),
                name: format!(
                    "{}-{}",
                    versus("epsilon-greedy", DECAYING, role),
                    dotted(epsilon)
                ),
                arguments: Matchup::new(greedy, opponent).seated(role).arguments(),
            })
        })
        .build()
}

struct Contender {
    label: &'static str,
    policy: &'static str,
    term: i64,
}

const UCT3: Contender = Contender {
    label: "uct3",
    policy: "uct",
    term: 3,
};
const UCTTUNED10: Contender = Contender {
    label: "ucttuned10",
    policy: "ucttuned",
    term: 10,
};
const BOLTZMANN10: Contender = Contender {
    label: "boltzmann10",
    policy: "boltzmann",
    term: 10,
};
const EPSILONGREEDY: Contender = Contender {
    label: "epsilongreedy",
    policy: DECAYING,
    term: 1,
};

static SHOWDOWN: [(Contender, Contender); 6] = [
    (UCT3, BOLTZMANN10),
    (UCTTUNED10, BOLTZMANN10),
    (EPSILONGREEDY, BOLTZMANN10),
    (UCT3, UCTTUNED10),
    (UCT3, EPSILONGREEDY),
    (UCTTUNED10, EPSILONGREEDY),
];

/// Pairwise showdown of four tree policies at 1000 iterations, both seatings.
///
/// See [`ArgumentSharing`] for the argument vectors.
pub fn tree_policy_showdown(sharing: ArgumentSharing) -> Result<SweepGrid, ConfigurationError> {
    let pairings = ParameterSpace::new().with_axis(Axis::int_range("pairing", 0, 6, 1)?);

    let shared = {
        let (a, b) = &SHOWDOWN[0];
        let mut args = Matchup::new(
            PlayerSpec::new(a.policy).with_iterations("1000"),
            PlayerSpec::new(b.policy).with_iterations("1000"),
        )
        .arguments();
        args.push(Argument {
            flag: "--p1explorationterm".to_owned(),
            value: AxisValue::Int(a.term),
        });
        args.push(Argument {
            flag: "--p2explorationterm".to_owned(),
            value: AxisValue::Int(b.term),
        });
        args
    };

    GridBuilder::new(Sweep::TreePolicyShowdown.name(), pairings)
        .with_role_swap(true)
        .with_memory_limit(MEMORY_LIMIT_8G)
        .with_treatment(move |p, role| {
            let (a, b) = SHOWDOWN.get(p.f64("pairing")? as usize)?;
            let arguments = match sharing {
                ArgumentSharing::Legacy => shared.clone(),
                ArgumentSharing::PerMatchup => {
                    let player = |c: &Contender| {
                        PlayerSpec::new(c.policy)
                            .with_iterations("1000")
                            .with_exploration_term(AxisValue::Int(c.term).to_text())
                    };
                    Matchup::new(player(a), player(b)).seated(role).arguments()
                }
            };
            Some(Treatment {
                id: ConfigId::new(format!("{}-vs-{}", a.label, b.label), role).with_iterations(1000),
                name: format!("{}-1000its", versus(a.label, b.label, role)),
                arguments,
            })
        })
        .build()
}

/// Tree policy family: name prefix, solver policy, fixed exploration term.
const ITERATION_FAMILIES: [(&str, &str, &str); 4] = [
    ("uct", "uct", "4"),
    ("ucttuned", "uct-tuned", "2"),
    ("decayingepsilongreedy", DECAYING, "1"),
    ("epsilongreedy", "epsilon-greedy", "0.3"),
];

/// Training iterations `1, 2, 4, .., 256, 300, 400, .., 3400` against a random opponent.
pub fn training_iterations() -> Result<SweepGrid, ConfigurationError> {
    let iterations = (0..9)
        .map(|i| 1i64 << i)
        .chain((300..3500).step_by(100))
        .collect::<Vec<_>>();
    let space = ParameterSpace::new().with_axis(Axis::discrete("iterations", iterations));

    let mut builder = GridBuilder::new(Sweep::TrainingIterations.name(), space)
        .with_role_swap(true)
        .with_time_limit(Duration::from_secs(14400))
        .with_memory_limit(16384);
    for (family, policy, term) in ITERATION_FAMILIES {
        builder = builder.with_treatment(move |p, role| {
            let its = p.get("iterations")?;
            let player = PlayerSpec::new(policy)
                .with_iterations(its.to_text())
                .with_exploration_term(term);
            Some(Treatment {
                id: ConfigId::new(family, role)
                    .with_exploration_term(term)
                    .with_iterations(p.f64("iterations")? as u32),
                name: format!("{family}-{its}its{}", role.number()),
                arguments: Matchup::new(player, PlayerSpec::new("random"))
                    .seated(role)
                    .arguments(),
            })
        });
    }
    builder.build()
}

/// Exploration constant `i` in `0, 0.5, .., 14.5` for UCT, UCT-tuned and Boltzmann, and
/// `epsilon = 1/i` for epsilon-greedy, against decaying epsilon-greedy at 300 iterations.
///
/// The derived axis has two explicit special cases: `epsilon = 0` at `i = 0`, and `i = 0.5`
/// produces no epsilon-greedy configuration.
pub fn exploration_constants() -> Result<SweepGrid, ConfigurationError> {
    let space = ParameterSpace::new().with_axis(Axis::float_steps("i", 30, 0.5)?);

    let mut builder = GridBuilder::new(Sweep::ExplorationConstants.name(), space)
        .with_role_swap(true)
        .with_seeds(0..10)
        .with_memory_limit(MEMORY_LIMIT_8G);
    for family in ["uct", "ucttuned", "boltzmann"] {
        builder = builder.with_treatment(move |p, role| {
            let i = p.get("i")?;
            let player = PlayerSpec::new(family)
                .with_iterations("300")
                .with_exploration_term(i.to_text());
            let opponent = PlayerSpec::new(DECAYING)
                .with_iterations("300")
                .with_exploration_term("1");
            Some(Treatment {
                id: ConfigId::new(family, role)
                    .with_exploration_term(i)
                    .with_iterations(300),
                name: format!("{family}{i}_{}", role.number()),
                arguments: Matchup::new(player, opponent).seated(role).arguments(),
            })
        });
    }
    builder
        .with_treatment(|p, role| {
            let i = p.f64("i")?;
            let epsilon = if i == 0.0 {
                AxisValue::Int(0)
            } else if i == 0.5 {
                return None;
            } else {
                AxisValue::Float(1.0 / i)
            };
            let player = PlayerSpec::new("epsilon-greedy")
                .with_iterations("300")
                .with_exploration_term(epsilon.to_text());
            let opponent = PlayerSpec::new(DECAYING)
                .with_iterations("300")
                .with_exploration_term("1");
            Some(Treatment {
                id: ConfigId::new("epsilongreedy", role)
                    .with_exploration_term(&epsilon)
                    .with_iterations(300),
                name: format!("epsilongreedy{epsilon}_{}", role.number()),
                arguments: Matchup::new(player, opponent).seated(role).arguments(),
            })
        })
        .build()
}

/// Self-play with exploration terms `i != j` in `0, 5, .., 495` at 1000 iterations.
///
/// Both seatings already come from the ordered `(i, j)` product, so role swap is off: doubling
/// would render `uct{j}-vs-uct{i}` twice. Epsilon-greedy (`1/i` against `1/j`) only exists for
/// `1 <= i, j <= 10`.
pub fn self_play_terms() -> Result<SweepGrid, ConfigurationError> {
    let space = ParameterSpace::new()
        .with_axis(Axis::int_range("i", 0, 500, 5)?)
        .with_axis(Axis::int_range("j", 0, 500, 5)?);

    let mut builder = GridBuilder::new(Sweep::SelfPlayTerms.name(), space)
        .with_memory_limit(MEMORY_LIMIT_8G)
        .with_filter(|p| p.get("i") != p.get("j"));
    for (family, policy) in [
        ("uct", "uct"),
        ("boltzmann", "boltzmann"),
        ("ucttuned", "uct-tuned"),
    ] {
        builder = builder.with_treatment(move |p, role| {
            let (i, j) = (p.get("i")?, p.get("j")?);
            let player = |term: &AxisValue| {
                PlayerSpec::new(policy)
                    .with_iterations("1000")
                    .with_exploration_term(term.to_text())
            };
            Some(Treatment {
                id: ConfigId::new(family, role)
                    .with_exploration_term(i)
                    .with_iterations(1000)
                    .with_variant(format!("vs{j}")),
                name: format!("{family}{i}-vs-{family}{j}-1000its"),
                arguments: Matchup::new(player(i), player(j)).arguments(),
            })
        });
    }
    builder
        .with_treatment(|p, role| {
            let (i, j) = (p.f64("i")?, p.f64("j")?);
            if !((1.0..=10.0).contains(&i) && (1.0..=10.0).contains(&j)) {
                return None;
            }
            let player = |term: f64| {
                PlayerSpec::new("epsilon-greedy")
                    .with_iterations("1000")
                    .with_exploration_term(AxisValue::Float(1.0 / term).to_text())
            };
            Some(Treatment {
                id: ConfigId::new("egreedy", role)
                    .with_exploration_term(format!("1div{i}"))
                    .with_iterations(1000)
                    .with_variant(format!("vs1div{j}")),
                name: format!("egreedy-1div{i}-vs-egreedy-1div{j}-1000its"),
                arguments: Matchup::new(player(i), player(j)).arguments(),
            })
        })
        .build()
}

/// Meeple placement probability `0, 0.1, .., 1` of four tree policies against random and
/// heuristic opponents, 500 iterations, seeds `5..10`.
pub fn meeple_placement() -> Result<SweepGrid, ConfigurationError> {
    let mut probabilities = vec![AxisValue::Int(0)];
    probabilities.extend(
        [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9]
            .into_iter()
            .map(AxisValue::Float),
    );
    probabilities.push(AxisValue::Int(1));

    let space = ParameterSpace::new()
        .with_axis(Axis::discrete(
            "policy",
            ["boltzmann", "uct", "uct-tuned", "epsilon-greedy"],
        ))
        .with_axis(Axis::discrete("meeple_placement_prob", probabilities))
        .with_axis(Axis::discrete("opponent", ["random", "heuristic"]));

    GridBuilder::new(Sweep::MeeplePlacement.name(), space)
        .with_role_swap(true)
        .with_seeds(5..10)
        .with_memory_limit(MEMORY_LIMIT_8G)
        .with_extra_solver_args(&["--graphviz", "false"])
        .with_treatment(|p, role| {
            let policy = p.get("policy")?.to_string();
            let prob = p.get("meeple_placement_prob")?;
            let opponent = p.get("opponent")?.to_string();
            let term = match policy.as_str() {
                "boltzmann" | "uct" => "7",
                "uct-tuned" => "13",
                _ => "0.3",
            };
            let player = PlayerSpec::new(&policy)
                .with_iterations("500")
                .with_exploration_term(term)
                .with_meeple_placement_prob(prob.to_text());
            let other = PlayerSpec::new(&opponent)
                .with_iterations("500")
                .with_exploration_term(term);
            Some(Treatment {
                id: ConfigId::new(&policy, role)
                    .with_exploration_term(term)
                    .with_iterations(500)
                    .with_variant(format!("{opponent}@{prob}")),
                name: format!("{policy}_{prob}_{opponent}_{}", role.number()),
                arguments: Matchup::new(player, other).seated(role).arguments(),
            })
        })
        .build()
}

/// Mirror matches at 200 iterations, twice per family (`<family>1`, `<family>2`).
pub fn variance() -> Result<SweepGrid, ConfigurationError> {
    let mut builder = GridBuilder::new(Sweep::Variance.name(), ParameterSpace::new())
        .with_role_swap(true)
        .with_time_limit(Duration::from_secs(4800))
        .with_memory_limit(MEMORY_LIMIT_8G);
    for (family, policy, term) in [
        ("ucttuned", "uct-tuned", "10"),
        ("boltzmann", "boltzmann", "5"),
        ("uct", "uct", "2"),
        ("epsilongreedy", DECAYING, "1"),
    ] {
        builder = builder.with_treatment(move |_, role| {
            // The historical `epsilongreedy` vector repeated `--p1trainingiterations` and never
            // set player 2; both players get 200 iterations here.
            let player = || {
                PlayerSpec::new(policy)
                    .with_iterations("200")
                    .with_exploration_term(term)
            };
            Some(Treatment {
                id: ConfigId::new(family, role)
                    .with_exploration_term(term)
                    .with_iterations(200),
                name: format!("{family}{}", role.number()),
                arguments: Matchup::new(player(), player()).arguments(),
            })
        });
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag<'g>(grid: &'g SweepGrid, name: &str, flag: &str) -> Option<&'g AxisValue> {
        grid.get(name)?
            .arguments
            .iter()
            .find_map(|a| (a.flag == flag).then_some(&a.value))
    }

    #[test]
    fn every_preset_builds() {
        for sweep in Sweep::ALL {
            let grid = sweep.build(ArgumentSharing::Legacy).unwrap();
            assert!(!grid.is_empty(), "{sweep} is empty");
            assert_eq!(sweep.to_string().parse::<Sweep>().unwrap(), sweep);
        }
    }

    #[test]
    fn exploration_terms_names() {
        let grid = exploration_terms().unwrap();
        // 6 terms x 2 iterations + 4 temperatures + 6 epsilons, both seatings
        assert_eq!(grid.len(), (12 + 4 + 6) * 2);
        assert!(grid
            .get("uct-vs-decaying-epsilon-greedy-expterm-0dot5-50its")
            .is_some());
        assert!(grid
            .get("decaying-epsilon-greedy-vs-uct-expterm-sqrt2-500its")
            .is_some());
        assert_eq!(
            flag(
                &grid,
                "decaying-epsilon-greedy-vs-epsilon-greedy-0dot1",
                "--p2explorationterm"
            ),
            Some(&AxisValue::Text("0.1".into()))
        );
    }

    #[test]
    fn showdown_legacy_shares_one_vector() {
        let grid = tree_policy_showdown(ArgumentSharing::Legacy).unwrap();
        assert_eq!(grid.len(), 12);
        let first = &grid.get("uct3-vs-boltzmann10-1000its").unwrap().arguments;
        assert!(grid.configs().all(|c| &c.arguments == first));
        assert_eq!(
            flag(&grid, "ucttuned10-vs-uct3-1000its", "--p1explorationterm"),
            Some(&AxisValue::Int(3))
        );
    }

    #[test]
    fn showdown_per_matchup_seats_players() {
        let grid = tree_policy_showdown(ArgumentSharing::PerMatchup).unwrap();
        assert_eq!(
            flag(&grid, "boltzmann10-vs-uct3-1000its", "--p1"),
            Some(&AxisValue::Text("boltzmann".into()))
        );
        assert_eq!(
            flag(&grid, "boltzmann10-vs-uct3-1000its", "--p2explorationterm"),
            Some(&AxisValue::Text("3".into()))
        );
    }

    #[test]
    fn exploration_constants_derived_epsilon() {
        let grid = exploration_constants().unwrap();
        assert!(grid.get("uct0.0_1").is_some());
        assert!(grid.get("boltzmann14.5_2").is_some());
        assert!(grid.get("epsilongreedy0_1").is_some());
        assert!(grid.get("epsilongreedy1.0_2").is_some());
        assert!(grid.get("epsilongreedy0.6666666666666666_1").is_some());
        // 30 points x 3 families + 29 epsilons (i = 0.5 skipped), both seatings
        assert_eq!(grid.len(), (30 * 3 + 29) * 2);
        assert_eq!(grid.skipped(), 2);
        assert_eq!(grid.seeds().len(), 10);
    }

    #[test]
    fn self_play_excludes_diagonal_and_limits_epsilon() {
        let grid = self_play_terms().unwrap();
        assert!(grid.get("uct5-vs-uct5-1000its").is_none());
        assert!(grid.get("uct5-vs-uct10-1000its").is_some());
        assert!(grid.get("uct10-vs-uct5-1000its").is_some());
        assert!(grid.get("egreedy-1div5-vs-egreedy-1div10-1000its").is_some());
        assert!(grid.get("egreedy-1div10-vs-egreedy-1div5-1000its").is_some());
        assert_eq!(grid.len(), 100 * 99 * 3 + 2);
        assert_eq!(
            flag(&grid, "egreedy-1div5-vs-egreedy-1div10-1000its", "--p2explorationterm"),
            Some(&AxisValue::Text("0.1".into()))
        );
    }

    #[test]
    fn self_play_role_swap_would_collide() {
        let space = ParameterSpace::new()
            .with_axis(Axis::int_range("i", 0, 10, 5).unwrap())
            .with_axis(Axis::int_range("j", 0, 10, 5).unwrap());
        let err = GridBuilder::new("collide", space)
            .with_role_swap(true)
            .with_filter(|p| p.get("i") != p.get("j"))
            .with_treatment(|p, role| {
                let (i, j) = match role {
                    Role::First => (p.get("i")?, p.get("j")?),
                    Role::Second => (p.get("j")?, p.get("i")?),
                };
                Some(Treatment {
                    id: ConfigId::new("uct", role).with_exploration_term(i),
                    name: format!("uct{i}-vs-uct{j}-1000its"),
                    arguments: vec![],
                })
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::DuplicateName { .. }));
    }

    #[test]
    fn meeple_placement_layout() {
        let grid = meeple_placement().unwrap();
        assert_eq!(grid.len(), 4 * 11 * 2 * 2);
        assert_eq!(grid.seeds(), &[5, 6, 7, 8, 9]);
        assert_eq!(grid.extra_solver_args(), &["--graphviz", "false"]);
        assert_eq!(
            flag(&grid, "uct-tuned_0.7_heuristic_2", "--p2meepleplacementprob"),
            Some(&AxisValue::Text("0.7".into()))
        );
        assert!(grid.get("epsilon-greedy_1_random_1").is_some());
    }

    #[test]
    fn training_iterations_layout() {
        let grid = training_iterations().unwrap();
        assert_eq!(grid.len(), (9 + 32) * 4 * 2);
        assert!(grid.get("uct-256its1").is_some());
        assert!(grid.get("epsilongreedy-3400its2").is_some());
        assert_eq!(grid.get("uct-1its1").unwrap().time_limit, Duration::from_secs(14400));
    }

    #[test]
    fn variance_mirrors() {
        let grid = variance().unwrap();
        assert_eq!(grid.len(), 8);
        assert_eq!(
            grid.get("uct1").unwrap().arguments,
            grid.get("uct2").unwrap().arguments
        );

        let flags = grid
            .get("epsilongreedy1")
            .unwrap()
            .arguments
            .iter()
            .filter(|a| a.flag.ends_with("trainingiterations"))
            .map(|a| a.flag.as_str())
            .collect::<Vec<_>>();
        assert_eq!(flags, ["--p1trainingiterations", "--p2trainingiterations"]);
    }
}
