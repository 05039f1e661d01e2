use crate::cell::{Cell, Genotype, Lineage};
use crate::clones::{self, CloneSet, Clones};
use crate::fluorescence::{DosageFluorescence, PhenotypeModel};
use crate::layout::{build_adjacency, relax, rest_spacing, separate_coincident, AdjacencyGraph};
use crate::phylogeny::Phylogeny;
use anyhow::Result;
use growth_common::{LayoutParams, RecombinationPolicy, Vec2};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Number of cells that fill a circle of unit radius unless configured otherwise.
pub const DEFAULT_REFERENCE_POPULATION: f64 = 1000.0;

// Mixing constants for the per-step random streams
const GENERATION_MIX: u64 = 0x9E37_79B9_7F4A_7C15;
const DIVISION_STREAM: u64 = 0x1F3A;
const LAYOUT_STREAM: u64 = 0x58C7;
const PHENOTYPE_STREAM: u64 = 0x7D21;
const INOCULUM_STREAM: u64 = 0x3B95;

/// Smallest jitter fraction used to pull apart coincident daughters.
const MIN_JITTER: f64 = 1e-3;

/// Outcome of a single growth step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSummary {
    /// Index of the generation produced by the step.
    pub generation: usize,
    pub parents: usize,
    pub divided: usize,
    pub population: usize,
}

/// A colony expanding from a single founder lineage.
///
/// Owns its whole generation history. Every step draws from a generator
/// derived from the culture seed and the generation index, so two cultures
/// with the same seed and parameters evolve identically, and branches or
/// reloaded copies resume on the same stream.
#[derive(Debug, Clone)]
pub struct Culture {
    history: Vec<Vec<Cell>>,
    /// Population at this snapshot relative to the culture it was frozen from.
    scaling: f64,
    seed: u64,
    reference_population: f64,
    center: Vec2,
    policy: RecombinationPolicy,
    layout: LayoutParams,
    phenotype: Arc<dyn PhenotypeModel>,
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        anyhow::bail!("{} probability must lie in [0, 1], got {}.", name, value);
    }
    Ok(())
}

impl Culture {
    /// Starts a culture from `starter` as generation 0.
    pub fn new(starter: Vec<Cell>, seed: u64) -> Result<Self> {
        Self::from_history(vec![starter], seed)
    }

    /// A single heterozygous founder.
    pub fn from_founder(seed: u64) -> Self {
        Self::with_history_unchecked(vec![vec![Cell::founder()]], seed)
    }

    /// The founder divided synchronously `generations` times without recombination.
    pub fn inoculate(generations: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed ^ INOCULUM_STREAM);
        let starter = Cell::founder().grow(generations, 0.0, RecombinationPolicy::default(), &mut rng);
        Self::with_history_unchecked(vec![starter], seed)
    }

    /// Rebuilds a culture from a full history, e.g. after loading.
    pub fn from_history(history: Vec<Vec<Cell>>, seed: u64) -> Result<Self> {
        if history.is_empty() {
            anyhow::bail!("A culture needs at least one generation.");
        }
        if let Some(t) = history.iter().position(Vec::is_empty) {
            anyhow::bail!("Generation {} of the culture is empty.", t);
        }
        Ok(Self::with_history_unchecked(history, seed))
    }

    fn with_history_unchecked(history: Vec<Vec<Cell>>, seed: u64) -> Self {
        Culture {
            history,
            scaling: 1.0,
            seed,
            reference_population: DEFAULT_REFERENCE_POPULATION,
            center: Vec2::zero(),
            policy: RecombinationPolicy::default(),
            layout: LayoutParams::default(),
            phenotype: Arc::new(DosageFluorescence::default()),
        }
    }

    pub fn with_reference_population(mut self, reference_population: f64) -> Self {
        self.reference_population = reference_population;
        self
    }

    pub fn with_center(mut self, center: Vec2) -> Self {
        self.center = center;
        self
    }

    pub fn with_policy(mut self, policy: RecombinationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_layout(mut self, layout: LayoutParams) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_phenotype(mut self, phenotype: Arc<dyn PhenotypeModel>) -> Self {
        self.phenotype = phenotype;
        self
    }

    pub fn with_scaling(mut self, scaling: f64) -> Self {
        self.scaling = scaling;
        self
    }

    // --- Generation-level views ---

    /// Current generation.
    pub fn cells(&self) -> &[Cell] {
        self.history.last().map_or(&[], |cells| cells.as_slice())
    }

    /// Generation the current cells descend from; `None` before the first step.
    pub fn parents(&self) -> Option<&[Cell]> {
        let n = self.history.len();
        if n >= 2 {
            Some(&self.history[n - 2])
        } else {
            None
        }
    }

    pub fn history(&self) -> &[Vec<Cell>] {
        &self.history
    }

    pub fn size(&self) -> usize {
        self.cells().len()
    }

    /// Number of growth steps recorded in the history.
    pub fn generation(&self) -> usize {
        self.history.len() - 1
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn scaling(&self) -> f64 {
        self.scaling
    }

    pub fn reference_population(&self) -> f64 {
        self.reference_population
    }

    pub fn policy(&self) -> RecombinationPolicy {
        self.policy
    }

    pub fn layout(&self) -> &LayoutParams {
        &self.layout
    }

    // --- Population-level views ---

    pub fn genotypes(&self) -> Vec<Genotype> {
        self.cells().iter().map(Cell::genotype).collect()
    }

    pub fn positions(&self) -> Vec<Vec2> {
        self.cells().iter().map(Cell::xy).collect()
    }

    pub fn lineages(&self) -> Vec<Lineage> {
        self.cells().iter().map(|c| c.lineage().clone()).collect()
    }

    /// Division depth of every current cell.
    pub fn generations(&self) -> Vec<u32> {
        self.cells().iter().map(Cell::generation).collect()
    }

    /// Indices of the current cells carrying `genotype`.
    pub fn select(&self, genotype: Genotype) -> Vec<usize> {
        self.cells()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.genotype() == genotype)
            .map(|(i, _)| i)
            .collect()
    }

    /// Contact graph of the current generation.
    pub fn adjacency(&self) -> AdjacencyGraph {
        build_adjacency(&self.positions(), self.layout.max_edge_length)
    }

    pub fn heterogeneity(&self) -> f64 {
        clones::heterogeneity(&self.genotypes(), &self.adjacency())
    }

    pub fn percent_heterozygous(&self) -> f64 {
        clones::percent_heterozygous(&self.genotypes())
    }

    pub fn clones(&self) -> Clones {
        Clones::new(&self.genotypes(), &self.adjacency())
    }

    pub fn analyze(&self, genotype: Genotype) -> CloneSet {
        clones::analyze(&self.genotypes(), &self.adjacency(), genotype)
    }

    pub fn phylogeny(&self) -> Phylogeny {
        Phylogeny::build(self.cells().iter().map(Cell::lineage))
    }

    /// Reporting intensities sampled by the injected phenotype model.
    pub fn phenotypes(&self) -> Result<Vec<f64>> {
        let mut rng = self.step_rng(self.generation(), PHENOTYPE_STREAM);
        self.phenotype.phenotypes(&self.genotypes(), &mut rng)
    }

    /// Position of each cell in the depth-first leaf order of the phylogeny,
    /// mapped to [-1, 1) and multiplied by the scaling factor.
    pub fn diversification(&self) -> Vec<f64> {
        let n = self.size();
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| self.cells()[a].lineage().cmp(self.cells()[b].lineage()));
        let spread = n as f64 / 2.0;
        let mut values = vec![0.0; n];
        for (rank, idx) in order.into_iter().enumerate() {
            values[idx] = (rank as f64 - spread) / spread * self.scaling;
        }
        values
    }

    // --- Growth ---

    fn step_rng(&self, generation: usize, stream: u64) -> StdRng {
        let seed = self
            .seed
            .wrapping_add((generation as u64).wrapping_mul(GENERATION_MIX))
            .wrapping_add(stream);
        StdRng::seed_from_u64(seed)
    }

    /// Builds the next generation from the current cells. Each cell divides
    /// with probability `division`; the others are carried forward unchanged.
    fn next_generation(&self, division: f64, recombination: f64) -> (Vec<Cell>, usize) {
        let parents = self.cells();
        let mut rng = self.step_rng(self.generation() + 1, DIVISION_STREAM);
        let mut cells = Vec::with_capacity(parents.len() * 2);
        let mut divided = 0;

        for parent in parents {
            if rng.random::<f64>() < division {
                cells.extend(parent.divide(recombination, self.policy, &mut rng));
                divided += 1;
            } else {
                cells.push(parent.clone());
            }
        }
        (cells, divided)
    }

    /// Separates coincident daughters, then relaxes the cells into a disc whose
    /// radius grows with the square root of the population. Returns the number
    /// of contacts the relaxation ran on.
    fn layout_cells(&self, cells: &mut [Cell], generation: usize, center: Vec2, reference_population: f64) -> usize {
        let n = cells.len();
        let scale = (n as f64 / reference_population).sqrt();
        let mut rng = self.step_rng(generation, LAYOUT_STREAM);

        let mut positions: Vec<Vec2> = cells.iter().map(Cell::xy).collect();
        let jitter = self.layout.jitter.max(MIN_JITTER) * rest_spacing(n, scale);
        separate_coincident(&mut positions, jitter, &mut rng);

        let graph = build_adjacency(&positions, self.layout.max_edge_length);
        let relaxed = relax(&graph, &positions, center, scale, &self.layout);
        for (cell, xy) in cells.iter_mut().zip(relaxed) {
            cell.set_xy(xy);
        }
        graph.num_edges()
    }

    /// Appends the next generation without moving any cell.
    pub fn divide(&mut self, division: f64, recombination: f64) -> Result<StepSummary> {
        check_probability("Division", division)?;
        check_probability("Recombination", recombination)?;
        let (cells, divided) = self.next_generation(division, recombination);
        let summary = StepSummary {
            generation: self.generation() + 1,
            parents: self.size(),
            divided,
            population: cells.len(),
        };
        self.history.push(cells);
        Ok(summary)
    }

    /// Recomputes contacts and relaxes the positions of the current generation.
    pub fn move_cells(&mut self, center: Vec2, reference_population: f64) -> Result<()> {
        if !(reference_population > 0.0) || !reference_population.is_finite() {
            anyhow::bail!("Reference population must be positive, got {}.", reference_population);
        }
        let generation = self.generation();
        let mut cells = std::mem::take(&mut self.history[generation]);
        let edges = self.layout_cells(&mut cells, generation, center, reference_population);
        debug!("Generation {} relaxed on {} contacts", generation, edges);
        self.history[generation] = cells;
        Ok(())
    }

    /// One growth step: division followed by relaxation. Either the new
    /// generation is committed with its final positions, or nothing changes.
    pub fn update(&mut self, division: f64, recombination: f64) -> Result<StepSummary> {
        check_probability("Division", division)?;
        check_probability("Recombination", recombination)?;
        if !(self.reference_population > 0.0) || !self.reference_population.is_finite() {
            anyhow::bail!("Reference population must be positive, got {}.", self.reference_population);
        }

        let generation = self.generation() + 1;
        let (mut cells, divided) = self.next_generation(division, recombination);
        let edges = self.layout_cells(&mut cells, generation, self.center, self.reference_population);

        let summary = StepSummary {
            generation,
            parents: self.size(),
            divided,
            population: cells.len(),
        };
        self.history.push(cells);
        debug!(
            "Generation {}: {} of {} cells divided, population {}, {} contacts",
            summary.generation, summary.divided, summary.parents, summary.population, edges
        );
        Ok(summary)
    }

    /// Steps until the population reaches `min_population`, or until
    /// `max_iters` steps have run. Returns the number of steps taken.
    ///
    /// With `division == 0` the population never grows, so callers must pass
    /// `max_iters` in that case or the loop does not end.
    pub fn grow(
        &mut self,
        min_population: usize,
        max_iters: Option<usize>,
        division: f64,
        recombination: f64,
    ) -> Result<usize> {
        check_probability("Division", division)?;
        check_probability("Recombination", recombination)?;
        if min_population == 0 {
            anyhow::bail!("Target population must be positive.");
        }
        if division == 0.0 && max_iters.is_none() && self.size() < min_population {
            warn!(
                "Growing to {} cells with zero division probability and no iteration cap will not terminate.",
                min_population
            );
        }

        let mut steps = 0;
        while self.size() < min_population {
            if max_iters.is_some_and(|max| steps >= max) {
                break;
            }
            self.update(division, recombination)?;
            steps += 1;
        }
        Ok(steps)
    }

    // --- Checkpoints ---

    /// Independent copy holding the history up to generation `t` (all of it for `None`).
    pub fn branch(&self, t: Option<usize>) -> Result<Culture> {
        let mut culture = self.clone();
        if let Some(t) = t {
            if t > self.generation() {
                anyhow::bail!("Cannot branch at generation {}; the culture has {}.", t, self.generation());
            }
            culture.history.truncate(t + 1);
        }
        Ok(culture)
    }

    /// Single-generation snapshot of generation `t`, scaled by its population
    /// relative to the current one.
    pub fn freeze(&self, t: usize) -> Result<Culture> {
        let Some(cells) = self.history.get(t) else {
            anyhow::bail!("Cannot freeze generation {}; the culture has {}.", t, self.generation());
        };
        let mut culture = self.clone();
        culture.scaling = cells.len() as f64 / self.size() as f64;
        culture.history = vec![cells.clone()];
        Ok(culture)
    }
}
