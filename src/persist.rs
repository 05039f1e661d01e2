//! Saving and loading simulations as versioned records.

use crate::cell::{Cell, Genotype, Lineage};
use crate::culture::Culture;
use crate::simulation::GrowthSimulation;
use anyhow::{Context, Result};
use growth_common::{CellRecord, CultureRecord, SimulationRecord, Vec2, FORMAT_VERSION};
use log::{error, info};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const FILE_STEM: &str = "simulation";

/// On-disk encoding of a simulation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    Json,
    Bincode,
    MessagePack,
}

impl SaveFormat {
    pub const ALL: [SaveFormat; 3] = [SaveFormat::Json, SaveFormat::Bincode, SaveFormat::MessagePack];

    /// Resolves the `output.format` setting; unknown names fall back to JSON.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.unwrap_or("json") {
            "json" => SaveFormat::Json,
            "bincode" => SaveFormat::Bincode,
            "messagepack" => SaveFormat::MessagePack,
            other => {
                error!("Unknown output format: {}. Using JSON instead.", other);
                SaveFormat::Json
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SaveFormat::Json => "json",
            SaveFormat::Bincode => "bin",
            SaveFormat::MessagePack => "msgpack",
        }
    }
}

pub fn cell_to_record(cell: &Cell) -> CellRecord {
    CellRecord {
        genotype: cell.genotype().as_u8(),
        lineage: cell.lineage().to_string(),
        generation: cell.generation(),
        x: cell.xy().x,
        y: cell.xy().y,
    }
}

pub fn cell_from_record(record: &CellRecord) -> Result<Cell> {
    let genotype = Genotype::try_from(record.genotype)?;
    let lineage = Lineage::parse(&record.lineage)?;
    if lineage.len() as u32 != record.generation {
        anyhow::bail!(
            "Cell with lineage '{}' claims generation {}.",
            record.lineage,
            record.generation
        );
    }
    let xy = Vec2::new(record.x, record.y);
    if !xy.is_finite() {
        anyhow::bail!("Cell with lineage '{}' has a non-finite position.", record.lineage);
    }
    Ok(Cell::new(genotype, lineage, xy))
}

pub fn culture_to_record(culture: &Culture) -> CultureRecord {
    CultureRecord {
        seed: culture.seed(),
        scaling: culture.scaling(),
        reference_population: culture.reference_population(),
        generations: culture
            .history()
            .iter()
            .map(|cells| cells.iter().map(cell_to_record).collect())
            .collect(),
    }
}

pub fn culture_from_record(record: &CultureRecord) -> Result<Culture> {
    let history = record
        .generations
        .iter()
        .enumerate()
        .map(|(t, cells)| {
            cells
                .iter()
                .map(cell_from_record)
                .collect::<Result<Vec<Cell>>>()
                .with_context(|| format!("Invalid cell record in generation {}", t))
        })
        .collect::<Result<Vec<Vec<Cell>>>>()?;
    Ok(Culture::from_history(history, record.seed)?
        .with_scaling(record.scaling)
        .with_reference_population(record.reference_population))
}

pub fn simulation_to_record(sim: &GrowthSimulation, save_history: bool) -> Result<SimulationRecord> {
    let culture = if save_history {
        culture_to_record(sim.culture())
    } else {
        culture_to_record(&sim.culture().freeze(sim.culture().generation())?)
    };
    Ok(SimulationRecord {
        format_version: FORMAT_VERSION,
        config: sim.config().clone(),
        culture,
    })
}

pub fn simulation_from_record(record: SimulationRecord) -> Result<GrowthSimulation> {
    if record.format_version != FORMAT_VERSION {
        anyhow::bail!(
            "Unsupported record version {} (expected {}).",
            record.format_version,
            FORMAT_VERSION
        );
    }
    let culture = culture_from_record(&record.culture)?;
    GrowthSimulation::from_parts(record.config, culture)
}

pub fn write_record<W: Write>(mut writer: W, record: &SimulationRecord, format: SaveFormat) -> Result<()> {
    match format {
        SaveFormat::Json => serde_json::to_writer(&mut writer, record)?,
        SaveFormat::Bincode => bincode::serialize_into(&mut writer, record)?,
        SaveFormat::MessagePack => rmp_serde::encode::write(&mut writer, record)?,
    }
    writer.flush()?;
    Ok(())
}

pub fn read_record<R: Read>(reader: R, format: SaveFormat) -> Result<SimulationRecord> {
    let record = match format {
        SaveFormat::Json => serde_json::from_reader(reader)?,
        SaveFormat::Bincode => bincode::deserialize_from(reader)?,
        SaveFormat::MessagePack => rmp_serde::decode::from_read(reader)?,
    };
    Ok(record)
}

/// Writes `dir/simulation.<ext>` and returns its path.
pub fn save_simulation(dir: &Path, sim: &GrowthSimulation, save_history: bool, format: SaveFormat) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory '{}'", dir.display()))?;
    let path = dir.join(format!("{}.{}", FILE_STEM, format.extension()));
    let record = simulation_to_record(sim, save_history)?;
    let file = File::create(&path).with_context(|| format!("Failed to create '{}'", path.display()))?;
    write_record(BufWriter::new(file), &record, format)?;
    info!(
        "Simulation saved to {} ({} generations)",
        path.display(),
        record.culture.generations.len()
    );
    Ok(path)
}

/// Loads whichever `simulation.<ext>` exists in `dir`.
pub fn load_simulation(dir: &Path) -> Result<GrowthSimulation> {
    for format in SaveFormat::ALL {
        let path = dir.join(format!("{}.{}", FILE_STEM, format.extension()));
        if !path.exists() {
            continue;
        }
        let file = File::open(&path).with_context(|| format!("Failed to open '{}'", path.display()))?;
        let record = read_record(BufReader::new(file), format)
            .with_context(|| format!("Failed to decode '{}'", path.display()))?;
        return simulation_from_record(record);
    }
    anyhow::bail!("No saved simulation found in '{}'.", dir.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use growth_common::GrowthConfig;

    #[test]
    fn cell_records_validate_their_fields() {
        let good = CellRecord { genotype: 2, lineage: "011".into(), generation: 3, x: 0.1, y: -0.2 };
        let cell = cell_from_record(&good).unwrap();
        assert_eq!(cell_to_record(&cell), good);

        let bad_genotype = CellRecord { genotype: 5, ..good.clone() };
        let bad_generation = CellRecord { generation: 2, ..good.clone() };
        let bad_lineage = CellRecord { lineage: "0x1".into(), ..good.clone() };
        assert!(cell_from_record(&bad_genotype).is_err());
        assert!(cell_from_record(&bad_generation).is_err());
        assert!(cell_from_record(&bad_lineage).is_err());
    }

    #[test]
    fn empty_history_is_rejected() {
        let record = CultureRecord { seed: 0, scaling: 1.0, reference_population: 1000.0, generations: vec![] };
        assert!(culture_from_record(&record).is_err());
    }

    #[test]
    fn every_format_decodes_what_it_encodes() {
        let mut culture = Culture::inoculate(2, 31);
        culture.grow(16, Some(20), 0.7, 0.5).unwrap();
        let sim = GrowthSimulation::from_parts(GrowthConfig::default(), culture).unwrap();
        let record = simulation_to_record(&sim, true).unwrap();

        for format in SaveFormat::ALL {
            let mut buffer = Vec::new();
            write_record(&mut buffer, &record, format).unwrap();
            let decoded = read_record(buffer.as_slice(), format).unwrap();
            assert_eq!(decoded, record, "{:?}", format);
        }
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let sim = GrowthSimulation::from_parts(GrowthConfig::default(), Culture::from_founder(0)).unwrap();
        let mut record = simulation_to_record(&sim, true).unwrap();
        record.format_version += 1;
        assert!(simulation_from_record(record).is_err());
    }

    #[test]
    fn format_names() {
        assert_eq!(SaveFormat::from_name(None), SaveFormat::Json);
        assert_eq!(SaveFormat::from_name(Some("bincode")), SaveFormat::Bincode);
        assert_eq!(SaveFormat::from_name(Some("messagepack")).extension(), "msgpack");
        assert_eq!(SaveFormat::from_name(Some("yaml")), SaveFormat::Json);
    }
}
