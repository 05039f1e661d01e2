use crate::cell::Cell;
use crate::culture::Culture;
use crate::fluorescence::DosageFluorescence;
use crate::persist::{self, SaveFormat};
use anyhow::Result;
use growth_common::{GrowthConfig, SimParams, SummaryRecord};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// A culture grown through a transient recombination window.
///
/// Recombination is active only while the population grows from
/// `2^start` to `2^(start + duration)` cells; before and after the window
/// divisions never recombine.
#[derive(Debug, Clone)]
pub struct GrowthSimulation {
    config: GrowthConfig,
    params: SimParams,
    culture: Culture,
}

impl GrowthSimulation {
    /// Creates a simulation using the configured seed, or a random one.
    pub fn new(config: GrowthConfig) -> Result<Self> {
        let seed = config.run.seed.unwrap_or_else(rand::random);
        Self::with_seed(config, seed)
    }

    /// Creates a simulation with an explicit seed, ignoring `run.seed`.
    pub fn with_seed(config: GrowthConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();
        if params.division == 0.0 && params.max_iters.is_none() {
            warn!("Division probability is zero and no iteration cap is set; run() will not terminate.");
        }

        // Inoculum: the founder doubled synchronously, recombining only in
        // the generation where the window opens.
        let mut rng = StdRng::seed_from_u64(seed);
        let mut starter = vec![Cell::founder()];
        for generation in 0..config.run.seed_generations {
            let rate = if config.recombination.start == generation { params.recombination } else { 0.0 };
            starter = starter
                .iter()
                .flat_map(|cell| cell.grow(1, rate, params.policy, &mut rng))
                .collect();
        }

        let culture = Culture::new(starter, seed)?;
        Self::from_parts(config, culture)
    }

    /// Attaches a configuration to an existing culture, e.g. after loading.
    pub fn from_parts(config: GrowthConfig, culture: Culture) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();
        let phenotype = DosageFluorescence::new(config.fluorescence.clone())?;
        let culture = culture
            .with_reference_population(params.reference_population)
            .with_policy(params.policy)
            .with_layout(params.layout)
            .with_phenotype(Arc::new(phenotype));
        Ok(GrowthSimulation { config, params, culture })
    }

    pub fn config(&self) -> &GrowthConfig {
        &self.config
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn culture(&self) -> &Culture {
        &self.culture
    }

    pub fn seed(&self) -> u64 {
        self.culture.seed()
    }

    /// Grows through the three windows: before, during and after recombination.
    pub fn run(&mut self) -> Result<()> {
        let windows = self.params.windows;
        let division = self.params.division;
        let max_iters = self.params.max_iters;
        let start_time = Instant::now();

        info!(
            "Growing from {} cells: pre-window to {}, window to {}, final {}",
            self.culture.size(),
            windows.pre_window,
            windows.end_of_window,
            windows.final_population
        );

        let phases = [
            ("pre-window", windows.pre_window, 0.0),
            ("recombination window", windows.end_of_window, self.params.recombination),
            ("post-window", windows.final_population, 0.0),
        ];
        for (name, target, recombination) in phases {
            let steps = self.culture.grow(target, max_iters, division, recombination)?;
            info!(
                "Finished {} after {} steps: population {}, generation {}",
                name,
                steps,
                self.culture.size(),
                self.culture.generation()
            );
            if self.culture.size() < target {
                warn!("{} stopped at {} cells, short of {}.", name, self.culture.size(), target);
            }
        }

        debug!("Run completed in {:.3} s", start_time.elapsed().as_secs_f64());
        Ok(())
    }

    /// Copy including the history up to generation `t` (all of it for `None`).
    pub fn branch(&self, t: Option<usize>) -> Result<Self> {
        Ok(GrowthSimulation {
            config: self.config.clone(),
            params: self.params.clone(),
            culture: self.culture.branch(t)?,
        })
    }

    /// Single-generation snapshot of generation `t`.
    pub fn freeze(&self, t: usize) -> Result<Self> {
        Ok(GrowthSimulation {
            config: self.config.clone(),
            params: self.params.clone(),
            culture: self.culture.freeze(t)?,
        })
    }

    /// Flat result row for aggregation.
    pub fn results(&self) -> SummaryRecord {
        let clones = self.culture.clones();
        SummaryRecord {
            division_rate: self.config.growth.division,
            recombination_rate: self.config.recombination.rate,
            recombination_start: self.config.recombination.start,
            recombination_duration: self.config.recombination.duration,
            population: self.culture.size(),
            transclone_edges: self.culture.heterogeneity(),
            percent_heterozygous: self.culture.percent_heterozygous(),
            num_clones: clones.num_clones(),
            clone_size_variation: clones.size_variation(),
            seed: self.culture.seed(),
        }
    }

    /// Writes `simulation.<ext>` into `dir`, creating the directory if needed.
    /// Without `save_history` only the current generation is kept.
    pub fn save<P: AsRef<Path>>(&self, dir: P, save_history: bool) -> Result<PathBuf> {
        let format = SaveFormat::from_name(self.config.output.format.as_deref());
        persist::save_simulation(dir.as_ref(), self, save_history, format)
    }

    /// Loads the simulation saved in `dir` by [`GrowthSimulation::save`].
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        persist::load_simulation(dir.as_ref())
    }
}
