use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::{LayoutParams, PopulationWindows, SimParams};
use std::path::Path;

/// Largest supported `final_population` exponent (2^30 cells).
pub const MAX_POPULATION_EXPONENT: u32 = 30;

// Division schedule and population target
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GrowthSection {
    /// Probability that a cell divides during one growth step.
    pub division: f64,
    /// Final population target as a power of two.
    pub final_population: u32,
    /// Optional cap on the number of steps of every growth window.
    pub max_iters_per_phase: Option<usize>,
}

impl Default for GrowthSection {
    fn default() -> Self {
        GrowthSection {
            division: 0.1,
            final_population: 11,
            max_iters_per_phase: None,
        }
    }
}

/// How a recombining division resolves the genotypes of its two children.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecombinationPolicy {
    /// Each child independently becomes homozygous A or B.
    #[default]
    Independent,
    /// Both children share a single homozygous outcome.
    Shared,
    /// One child becomes homozygous A and the other homozygous B.
    Reciprocal,
}

// Recombination window
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RecombinationConfig {
    /// Probability that a dividing heterozygous cell recombines.
    pub rate: f64,
    /// Population (as a power of two) at which the window opens.
    pub start: u32,
    /// Width of the window, in doublings.
    pub duration: u32,
    pub policy: RecombinationPolicy,
}

impl Default for RecombinationConfig {
    fn default() -> Self {
        RecombinationConfig {
            rate: 0.1,
            start: 0,
            duration: 8,
            policy: RecombinationPolicy::Independent,
        }
    }
}

// Adjacency cutoff and relaxation constants
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Longest triangulation edge kept as a contact, in colony units.
    pub max_edge_length: f64,
    pub iterations: usize,
    pub spring: f64,
    pub repulsion: f64,
    pub gravity: f64,
    pub step: f64,
    pub cooling: f64,
    pub tolerance: f64,
    /// Offset applied to coincident daughters, as a fraction of the rest spacing.
    pub jitter: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            max_edge_length: 0.1,
            iterations: 50,
            spring: 0.5,
            repulsion: 0.5,
            gravity: 0.05,
            step: 0.2,
            cooling: 0.95,
            tolerance: 1e-4,
            jitter: 0.25,
        }
    }
}

// Genotype-dependent intensity model used for reporting
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FluorescenceConfig {
    /// Standard deviation of each underlying normal distribution.
    pub ambiguity: f64,
    /// Median intensity per genotype (homozygous A, heterozygous, homozygous B).
    pub mu: [f64; 3],
}

impl Default for FluorescenceConfig {
    fn default() -> Self {
        FluorescenceConfig {
            ambiguity: 0.1,
            mu: [0.5, 1.0, 2.0],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Seed for the culture; drawn at random when absent.
    pub seed: Option<u64>,
    pub replicates: usize,
    /// Depth of the synchronously grown inoculum.
    pub seed_generations: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            seed: None,
            replicates: 1,
            seed_generations: 2,
        }
    }
}

// Grid over recombination start and rate
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SweepConfig {
    /// Number of recombination rates sampled on a log2 scale.
    pub density: usize,
    /// Replicates per parameter set.
    pub batch_size: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            density: 5,
            batch_size: 10,
        }
    }
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_history: bool,
    pub save_summary: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: "growth".to_string(),
            save_history: false,
            save_summary: true,
            format: None,
        }
    }
}

// Main configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct GrowthConfig {
    #[serde(default)]
    pub growth: GrowthSection,
    #[serde(default)]
    pub recombination: RecombinationConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub fluorescence: FluorescenceConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub sweep: Option<SweepConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{} must lie in [0, 1], got {}.", name, value);
    }
    Ok(())
}

impl GrowthConfig {
    /// Loads the configuration from a TOML file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: GrowthConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_probability("growth.division", self.growth.division)?;
        check_probability("recombination.rate", self.recombination.rate)?;
        if self.growth.final_population == 0 || self.growth.final_population > MAX_POPULATION_EXPONENT {
            anyhow::bail!(
                "growth.final_population must be in 1..={}, got {}.",
                MAX_POPULATION_EXPONENT,
                self.growth.final_population
            );
        }
        if self.recombination.start > MAX_POPULATION_EXPONENT || self.recombination.duration > MAX_POPULATION_EXPONENT {
            anyhow::bail!(
                "recombination.start and recombination.duration must be at most {}, got {} and {}.",
                MAX_POPULATION_EXPONENT,
                self.recombination.start,
                self.recombination.duration
            );
        }
        if self.growth.max_iters_per_phase == Some(0) {
            anyhow::bail!("growth.max_iters_per_phase must be positive when given.");
        }
        let layout = &self.layout;
        if !(layout.max_edge_length > 0.0) {
            anyhow::bail!("layout.max_edge_length must be positive.");
        }
        if layout.iterations == 0 {
            anyhow::bail!("layout.iterations must be greater than 0.");
        }
        if !(layout.step > 0.0) || !(layout.cooling > 0.0 && layout.cooling <= 1.0) {
            anyhow::bail!("layout.step must be positive and layout.cooling in (0, 1].");
        }
        if layout.spring < 0.0 || layout.repulsion < 0.0 || layout.gravity < 0.0 {
            anyhow::bail!("layout force constants must be non-negative.");
        }
        // Daughters start on their parent's position; without jitter they never separate
        if !(layout.jitter > 0.0) || !layout.jitter.is_finite() {
            anyhow::bail!("layout.jitter must be positive, got {}.", layout.jitter);
        }
        if !(self.fluorescence.ambiguity >= 0.0) || self.fluorescence.mu.iter().any(|m| !(*m > 0.0)) {
            anyhow::bail!("fluorescence.ambiguity must be non-negative and every mu positive.");
        }
        if self.run.replicates == 0 {
            anyhow::bail!("run.replicates must be greater than 0.");
        }
        if let Some(sweep) = &self.sweep {
            if sweep.density == 0 || sweep.batch_size == 0 {
                anyhow::bail!("sweep.density and sweep.batch_size must be greater than 0.");
            }
        }
        Ok(())
    }

    /// Converts the configuration into the parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let start = self.recombination.start.min(MAX_POPULATION_EXPONENT);
        let end = start.saturating_add(self.recombination.duration).min(MAX_POPULATION_EXPONENT);
        let final_population = 1usize << self.growth.final_population.min(MAX_POPULATION_EXPONENT);

        // The window may not overshoot the final target.
        let windows = PopulationWindows {
            pre_window: 1usize << start,
            end_of_window: (1usize << end).min(final_population),
            final_population,
        };

        SimParams {
            division: self.growth.division,
            recombination: self.recombination.rate,
            policy: self.recombination.policy,
            max_iters: self.growth.max_iters_per_phase,
            reference_population: final_population as f64,
            windows,
            layout: LayoutParams::from(&self.layout),
        }
    }
}
