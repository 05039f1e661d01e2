//! Independent replicate runs and parameter sweeps, executed in parallel.
//!
//! Every run owns its own culture; nothing is shared between threads.

use crate::simulation::GrowthSimulation;
use anyhow::{Context, Result};
use growth_common::{GrowthConfig, SummaryRecord, SweepConfig};
use log::{info, warn};
use rayon::prelude::*;
use std::path::Path;

fn run_one(config: GrowthConfig, seed: u64) -> Result<SummaryRecord> {
    let mut sim = GrowthSimulation::with_seed(config, seed)?;
    sim.run()?;
    Ok(sim.results())
}

/// Runs `replicates` simulations seeded `base_seed`, `base_seed + 1`, ...
/// Results come back in replicate order.
pub fn run_replicates(config: &GrowthConfig, replicates: usize, base_seed: u64) -> Result<Vec<SummaryRecord>> {
    config.validate()?;
    info!("Running {} replicates on {} threads.", replicates, rayon::current_num_threads());
    (0..replicates)
        .into_par_iter()
        .map(|i| {
            let seed = base_seed.wrapping_add(i as u64);
            run_one(config.clone(), seed).with_context(|| format!("Replicate {} (seed {}) failed", i, seed))
        })
        .collect()
}

/// One point of a sweep grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepPoint {
    pub recombination_start: u32,
    pub recombination_rate: f64,
}

/// Grid over when the recombination window opens and how strong it is,
/// with the window duration and division rate held fixed.
#[derive(Debug, Clone)]
pub struct Sweep {
    base: GrowthConfig,
    sweep: SweepConfig,
}

impl Sweep {
    pub fn new(base: GrowthConfig, sweep: SweepConfig) -> Result<Self> {
        base.validate()?;
        if sweep.density == 0 || sweep.batch_size == 0 {
            anyhow::bail!("Sweep density and batch size must be greater than 0.");
        }
        Ok(Sweep { base, sweep })
    }

    /// Recombination rates spaced evenly on a log2 scale from 2^-5 to 1.
    pub fn recombination_rates(&self) -> Vec<f64> {
        let n = self.sweep.density;
        if n == 1 {
            return vec![2f64.powi(-5)];
        }
        (0..n)
            .map(|i| 2f64.powf(-5.0 + 5.0 * i as f64 / (n - 1) as f64))
            .collect()
    }

    /// Every start for which the window still fits before the final population.
    pub fn recombination_starts(&self) -> Vec<u32> {
        let last = self
            .base
            .growth
            .final_population
            .checked_sub(self.base.recombination.duration)
            .unwrap_or_else(|| {
                warn!(
                    "Recombination duration {} exceeds the final population exponent {}; sweeping start 0 only.",
                    self.base.recombination.duration, self.base.growth.final_population
                );
                0
            });
        (0..=last).collect()
    }

    /// Grid points, rate-major, each repeated `batch_size` times.
    pub fn points(&self) -> Vec<SweepPoint> {
        let starts = self.recombination_starts();
        let mut points = Vec::new();
        for rate in self.recombination_rates() {
            for &start in &starts {
                for _ in 0..self.sweep.batch_size {
                    points.push(SweepPoint { recombination_start: start, recombination_rate: rate });
                }
            }
        }
        points
    }

    /// Runs every grid point in parallel; run `i` is seeded `base_seed + i`.
    pub fn run(&self, base_seed: u64) -> Result<Vec<SummaryRecord>> {
        let points = self.points();
        info!(
            "Sweeping {} runs ({} rates x {} starts x {} replicates).",
            points.len(),
            self.sweep.density,
            self.recombination_starts().len(),
            self.sweep.batch_size
        );
        points
            .par_iter()
            .enumerate()
            .map(|(i, point)| {
                let mut config = self.base.clone();
                config.recombination.start = point.recombination_start;
                config.recombination.rate = point.recombination_rate;
                config.sweep = None;
                let seed = base_seed.wrapping_add(i as u64);
                run_one(config, seed).with_context(|| format!("Sweep run {} ({:?}) failed", i, point))
            })
            .collect()
    }
}

/// Writes one CSV row per run, with a header.
pub fn write_summaries<P: AsRef<Path>>(path: P, records: &[SummaryRecord]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create summary file '{}'", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!("{} summary rows saved to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> GrowthConfig {
        let mut config = GrowthConfig::default();
        config.growth.division = 0.8;
        config.growth.final_population = 5;
        config.growth.max_iters_per_phase = Some(100);
        config.recombination.duration = 3;
        config
    }

    #[test]
    fn replicates_are_reproducible_and_ordered() {
        let config = tiny_config();
        let first = run_replicates(&config, 3, 100).unwrap();
        let second = run_replicates(&config, 3, 100).unwrap();
        assert_eq!(first, second);
        let seeds: Vec<u64> = first.iter().map(|r| r.seed).collect();
        assert_eq!(seeds, vec![100, 101, 102]);
        assert!(first.iter().all(|r| r.population >= 32));
    }

    #[test]
    fn sweep_grid_shape() {
        let sweep = Sweep::new(tiny_config(), SweepConfig { density: 3, batch_size: 2 }).unwrap();
        let rates = sweep.recombination_rates();
        assert_eq!(rates.len(), 3);
        assert!((rates[0] - 1.0 / 32.0).abs() < 1e-12);
        assert!((rates[2] - 1.0).abs() < 1e-12);
        assert_eq!(sweep.recombination_starts(), vec![0, 1, 2]);
        assert_eq!(sweep.points().len(), 3 * 3 * 2);
    }

    #[test]
    fn sweep_runs_carry_their_parameters() {
        let sweep = Sweep::new(tiny_config(), SweepConfig { density: 2, batch_size: 1 }).unwrap();
        let records = sweep.run(7).unwrap();
        let points = sweep.points();
        assert_eq!(records.len(), points.len());
        for (record, point) in records.iter().zip(&points) {
            assert_eq!(record.recombination_start, point.recombination_start);
            assert_eq!(record.recombination_rate, point.recombination_rate);
        }
    }

    #[test]
    fn summaries_are_written_as_csv() {
        let records = run_replicates(&tiny_config(), 2, 0).unwrap();
        let path = std::env::temp_dir().join(format!("clonal_growth_summary_{}.csv", std::process::id()));
        write_summaries(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("division_rate,recombination_rate"));
        assert_eq!(lines.count(), 2);
    }
}
