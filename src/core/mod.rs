//! Core reprojection modules

pub mod fill;
pub mod grid;
pub mod projection;
pub mod resample;
pub mod reproject;

// Re-export main types
pub use fill::GapFiller;
pub use grid::{GridBuilder, GridDefinition};
pub use projection::MapProjection;
pub use resample::{ResampleParams, SwathDataset, SwathResampler, SwathStack};
pub use reproject::{ReprojectionEngine, GEOMETRY_DATASETS};
