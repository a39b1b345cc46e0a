//! Plaice: A Fast, Modular Processing Pipeline for Aquatic Remote Sensing Products
//!
//! This library drives raw satellite captures through atmospheric correction,
//! thermal correction and parameter derivation stages, and re-grids the
//! irregular swath output onto regular projected rasters. The numerical
//! correction collaborators and the raster container backend plug in behind
//! traits; the crate owns stage sequencing, artifact bookkeeping, target-grid
//! derivation, resampling and gap filling.

pub mod types;
pub mod config;
pub mod io;
pub mod core;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    Artifact, ArtifactKind, BoundingBox, PlaiceError, PlaiceResult, Pixel, RasterImage,
    RasterStack, Stage, NO_DATA,
};

pub use config::{AdjacencyMethod, GridParams, ResamplingMethod, RunConfig};

pub use self::core::{GapFiller, GridBuilder, GridDefinition, MapProjection, ReprojectionEngine,
    SwathDataset, SwathResampler, SwathStack};

pub use io::{AttrValue, Attributes, CompressionOptions, MemoryStore, RasterStore};

pub use pipeline::{ArtifactExporter, ArtifactLedger, Bundle, BundleId, PipelineOrchestrator,
    StageContext, StageOperation, StageSet};
