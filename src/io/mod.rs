//! I/O collaborators: the raster-container storage contract

pub mod store;

pub use store::{AttrValue, Attributes, CompressionOptions, MemoryStore, RasterStore};
