use anyhow::Result;
use clonal_growth::batch::{run_replicates, write_summaries, Sweep};
use clonal_growth::GrowthSimulation;
use growth_common::GrowthConfig;
use log::{debug, info};
use std::time::Instant;

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Clonal Growth Engine...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = GrowthConfig::load(&config_path)?;
    info!("Loaded configuration from {}", config_path);
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    let base_seed = config.run.seed.unwrap_or_else(rand::random);
    let base_filename = config.output.base_filename.clone();
    let start_time = Instant::now();

    // --- Parameter Sweep ---
    if let Some(sweep_config) = config.sweep.clone() {
        let sweep = Sweep::new(config, sweep_config)?;
        let records = sweep.run(base_seed)?;
        write_summaries(format!("{}_sweep.csv", base_filename), &records)?;
        info!("Sweep finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());
        return Ok(());
    }

    // --- Replicates ---
    if config.run.replicates > 1 {
        let records = run_replicates(&config, config.run.replicates, base_seed)?;
        if config.output.save_summary {
            write_summaries(format!("{}_summary.csv", base_filename), &records)?;
        }
        info!(
            "{} replicates finished in {:.3} seconds.",
            records.len(),
            start_time.elapsed().as_secs_f64()
        );
        return Ok(());
    }

    // --- Single Simulation ---
    let mut sim = GrowthSimulation::with_seed(config, base_seed)?;
    info!("Culture inoculated with {} cells (seed {}).", sim.culture().size(), sim.seed());
    debug!("Simulation Parameters: {:#?}", sim.params());

    sim.run()?;
    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds: {} cells over {} generations.",
        total_duration.as_secs_f64(),
        sim.culture().size(),
        sim.culture().generation()
    );

    // --- Save Recorded Data ---
    let results = sim.results();
    info!(
        "Heterogeneity {:.4} | Heterozygous {:.4} | Clones {} | Clone size CV {:.4}",
        results.transclone_edges, results.percent_heterozygous, results.num_clones, results.clone_size_variation
    );
    sim.save(&base_filename, sim.config().output.save_history)?;
    if sim.config().output.save_summary {
        write_summaries(format!("{}_summary.csv", base_filename), &[results])?;
    } else {
        info!("Skipping summary output as per config (save_summary is false).");
    }

    info!("Simulation Complete.");
    Ok(())
}
