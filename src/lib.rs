//! Clonal expansion of cells in a two-dimensional culture, with loss of
//! heterozygosity confined to a transient recombination window.

pub mod batch;
pub mod cell;
pub mod clones;
pub mod culture;
pub mod fluorescence;
pub mod grid;
pub mod layout;
pub mod persist;
pub mod phylogeny;
pub mod simulation;
pub mod triangulation;

pub use cell::{Cell, Genotype, Lineage};
pub use clones::{CloneSet, Clones};
pub use culture::{Culture, StepSummary};
pub use fluorescence::{DosageFluorescence, PhenotypeModel};
pub use layout::AdjacencyGraph;
pub use phylogeny::Phylogeny;
pub use simulation::GrowthSimulation;
