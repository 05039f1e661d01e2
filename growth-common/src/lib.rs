pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    FluorescenceConfig, GrowthConfig, GrowthSection, LayoutConfig, OutputConfig,
    RecombinationConfig, RecombinationPolicy, RunConfig, SweepConfig,
};
pub use sim_params::{LayoutParams, PopulationWindows, SimParams};
pub use snapshot::{CellRecord, CultureRecord, SimulationRecord, SummaryRecord, FORMAT_VERSION};
pub use vecmath::Vec2;
