use serde::{Deserialize, Serialize};
use crate::config::{LayoutConfig, RecombinationPolicy};

/// Population thresholds of the three growth windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PopulationWindows {
    /// Population reached before recombination is enabled.
    pub pre_window: usize,
    /// Population at which recombination is switched off again.
    pub end_of_window: usize,
    pub final_population: usize,
}

/// Relaxation constants, copied out of the layout config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutParams {
    pub max_edge_length: f64,
    pub iterations: usize,
    pub spring: f64,
    pub repulsion: f64,
    pub gravity: f64,
    pub step: f64,
    pub cooling: f64,
    pub tolerance: f64,
    pub jitter: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        LayoutParams::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for LayoutParams {
    fn from(config: &LayoutConfig) -> Self {
        LayoutParams {
            max_edge_length: config.max_edge_length,
            iterations: config.iterations,
            spring: config.spring,
            repulsion: config.repulsion,
            gravity: config.gravity,
            step: config.step,
            cooling: config.cooling,
            tolerance: config.tolerance,
            jitter: config.jitter,
        }
    }
}

/// Simulation parameters derived from the configuration, used frequently during growth steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    pub division: f64,
    pub recombination: f64,
    pub policy: RecombinationPolicy,
    pub max_iters: Option<usize>,
    /// Number of cells that fill a circle of unit radius.
    pub reference_population: f64,
    pub windows: PopulationWindows,
    pub layout: LayoutParams,
}
