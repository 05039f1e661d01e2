use clonal_growth::GrowthSimulation;
use growth_common::GrowthConfig;
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("clonal_growth_{}_{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn grown(format: Option<&str>) -> GrowthSimulation {
    let mut config = GrowthConfig::default();
    config.growth.division = 0.7;
    config.growth.final_population = 6;
    config.recombination.rate = 0.4;
    config.recombination.start = 2;
    config.recombination.duration = 3;
    config.output.format = format.map(str::to_string);
    let mut sim = GrowthSimulation::with_seed(config, 515).unwrap();
    sim.run().unwrap();
    sim
}

#[test]
fn full_history_survives_save_and_load() {
    for format in ["json", "bincode", "messagepack"] {
        let sim = grown(Some(format));
        let dir = scratch_dir(format);
        let path = sim.save(&dir, true).unwrap();
        assert!(path.starts_with(&dir));

        let loaded = GrowthSimulation::load(&dir).unwrap();
        assert_eq!(loaded.config(), sim.config());
        assert_eq!(loaded.seed(), sim.seed());
        assert_eq!(loaded.culture().history(), sim.culture().history());
        assert_eq!(loaded.results(), sim.results());
        let _ = std::fs::remove_dir_all(&dir);
    }
}

#[test]
fn without_history_only_the_last_generation_is_kept() {
    let sim = grown(None);
    let dir = scratch_dir("last_generation");
    sim.save(&dir, false).unwrap();

    let loaded = GrowthSimulation::load(&dir).unwrap();
    assert_eq!(loaded.culture().generation(), 0);
    assert_eq!(loaded.culture().cells(), sim.culture().cells());
    assert_eq!(loaded.culture().scaling(), 1.0);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn loaded_simulation_keeps_growing_like_the_original() {
    let sim = grown(None);
    let dir = scratch_dir("resume");
    sim.save(&dir, true).unwrap();
    let loaded = GrowthSimulation::load(&dir).unwrap();

    let mut a = sim.culture().clone();
    let mut b = loaded.culture().clone();
    a.update(0.5, 0.1).unwrap();
    b.update(0.5, 0.1).unwrap();
    assert_eq!(a.cells(), b.cells());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_directory_is_an_error() {
    assert!(GrowthSimulation::load(scratch_dir("missing")).is_err());
}
