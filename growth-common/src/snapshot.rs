use serde::{Deserialize, Serialize};
use crate::config::GrowthConfig;

/// Version of the on-disk record layout. Bumped whenever a field changes.
pub const FORMAT_VERSION: u32 = 1;

/// One cell as it is written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    /// 0 = homozygous A, 1 = heterozygous, 2 = homozygous B.
    pub genotype: u8,
    /// Division choices from the founder, as a string of '0' and '1'.
    pub lineage: String,
    pub generation: u32,
    pub x: f64,
    pub y: f64,
}

/// Generation history of a culture. Derived views (adjacency, clones,
/// phylogeny) are not stored; they are recomputed after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CultureRecord {
    pub seed: u64,
    pub scaling: f64,
    pub reference_population: f64,
    pub generations: Vec<Vec<CellRecord>>,
}

/// A saved simulation: its configuration plus the culture it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    pub format_version: u32,
    pub config: GrowthConfig,
    pub culture: CultureRecord,
}

/// Flat per-run result row consumed by aggregation and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub division_rate: f64,
    pub recombination_rate: f64,
    pub recombination_start: u32,
    pub recombination_duration: u32,
    pub population: usize,
    /// Fraction of contacts joining cells of different genotype.
    pub transclone_edges: f64,
    pub percent_heterozygous: f64,
    pub num_clones: usize,
    /// Coefficient of variation of clone sizes.
    pub clone_size_variation: f64,
    pub seed: u64,
}
