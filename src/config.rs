use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Number of competing languages in the model.
pub const N_LANGUAGES: usize = 2;

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use. Every section and field
/// is optional and falls back to its default.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lattice: LatticeConfig,
    pub languages: LanguagesConfig,
    pub model: ModelConfig,
    pub variant: VariantConfig,
    pub conductor: ConductorConfig,
}

/// Population layout.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    /// Number of rows of the lattice.
    pub side: usize,
    /// Number of agents (default: `side * side`).
    pub n_agents: Option<usize>,
    /// Long-range rewiring parameter.
    pub epsilon: f64,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            side: 4,
            n_agents: None,
            epsilon: 0.05,
        }
    }
}

/// Initial state of each language.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    /// Initial number of users of each language (default: population split in halves).
    pub n_users: Option<Vec<usize>>,
    /// Number of things initially named in each language (default: all of them).
    pub dev_degrees: Option<Vec<usize>>,
}

/// Lexicon and learning parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Number of things in the environment.
    pub n_things: usize,
    /// Lower bound of association weights.
    pub min_weight: f64,
    /// Upper bound of association weights.
    pub max_weight: f64,
    /// Weight of the associations in the initial lexicons.
    pub initial_weight: f64,
    /// Weight of newly acquired or invented associations.
    pub acquire_weight: f64,
    /// Base amount by which weights change after a game.
    pub learning_rate: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_things: 5,
            min_weight: 0.0,
            max_weight: 3.0,
            initial_weight: 3.0,
            acquire_weight: 1.0,
            learning_rate: 0.3,
        }
    }
}

/// Kind of external agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    #[default]
    #[serde(alias = "zero")]
    None,
    #[serde(alias = "tl")]
    AlwaysListener,
    #[serde(alias = "ts")]
    AlwaysSpeaker,
}

/// External agent biasing the population.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantConfig {
    pub kind: VariantKind,
    /// Number of games played by the variant agent per step.
    pub influence: usize,
    /// Index of the language whose lexicon the always-speaker uses.
    pub language: usize,
}

/// Repetition parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    /// Number of independent runs.
    pub n_runs: usize,
    /// Maximum number of steps of each run.
    pub stop_iteration: usize,
    /// Evaluate runs concurrently.
    pub parallel: bool,
    /// Seed of the random number generator (default: drawn from the OS).
    pub seed: Option<u64>,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            n_runs: 1000,
            stop_iteration: 100_000,
            parallel: false,
            seed: None,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded. Performs validation on all parameters
    /// before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn n_agents(&self) -> usize {
        self.lattice
            .n_agents
            .unwrap_or(self.lattice.side * self.lattice.side)
    }

    pub fn n_users(&self) -> Vec<usize> {
        let n_agents = self.n_agents();
        self.languages
            .n_users
            .clone()
            .unwrap_or_else(|| vec![n_agents / 2, n_agents - n_agents / 2])
    }

    pub fn dev_degrees(&self) -> Vec<usize> {
        self.languages
            .dev_degrees
            .clone()
            .unwrap_or_else(|| vec![self.model.n_things; N_LANGUAGES])
    }

    pub fn validate(&self) -> Result<()> {
        let side = self.lattice.side;
        check_num(side, 2..10_000).context("invalid lattice side")?;
        let n_agents = self.n_agents();
        check_num(n_agents, 4..10_000_000).context("invalid number of agents")?;
        if n_agents % side != 0 || n_agents / side < 2 {
            bail!("{n_agents} agents do not fill a lattice of {side} rows and at least 2 columns");
        }
        check_num(self.lattice.epsilon, 0.0..1e6).context("invalid epsilon")?;

        let n_users = self.n_users();
        check_len(&n_users, N_LANGUAGES).context("invalid numbers of users")?;
        let n_users_sum: usize = n_users.iter().sum();
        if n_users_sum != n_agents {
            bail!("numbers of users must sum to {n_agents}, but sum to {n_users_sum}");
        }

        let model = &self.model;
        check_num(model.n_things, 1..100_000).context("invalid number of things")?;
        let dev_degrees = self.dev_degrees();
        check_len(&dev_degrees, N_LANGUAGES).context("invalid development degrees")?;
        for &dev_degree in &dev_degrees {
            check_num(dev_degree, 1..=model.n_things).context("invalid development degree")?;
        }

        check_num(model.min_weight, -1e6..1e6).context("invalid minimum weight")?;
        check_num(model.max_weight, model.min_weight + 0.1..1e6)
            .context("invalid maximum weight")?;
        check_weight(model.initial_weight, model).context("invalid initial weight")?;
        check_weight(model.acquire_weight, model).context("invalid acquire weight")?;
        check_num(model.learning_rate, 0.0..1e6).context("invalid learning rate")?;

        check_num(self.variant.influence, 0..1_000_000).context("invalid variant influence")?;
        check_num(self.variant.language, 0..N_LANGUAGES).context("invalid variant language")?;

        check_num(self.conductor.n_runs, 1..100_000_000).context("invalid number of runs")?;
        check_num(self.conductor.stop_iteration, 1..1_000_000_000)
            .context("invalid stop iteration")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_len<T>(vec: &[T], exp_len: usize) -> Result<()> {
    let len = vec.len();
    if len != exp_len {
        bail!("vector length must be {exp_len}, but is {len}");
    }
    Ok(())
}

fn check_weight(weight: f64, model: &ModelConfig) -> Result<()> {
    // Weights at the minimum would be dropped by the lexicon.
    if weight <= model.min_weight {
        bail!("weight must exceed {}, but is {weight}", model.min_weight);
    }
    check_num(weight, model.min_weight..=model.max_weight)
}
