use crate::types::{PlaiceError, PlaiceResult};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Attribute value carried by artifacts and datasets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Float(f64),
    FloatList(Vec<f64>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Attribute mapping, ordered for reproducible output
pub type Attributes = std::collections::BTreeMap<String, AttrValue>;

/// Compression options passed through to the container backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionOptions {
    pub enabled: bool,
    pub level: u8,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            level: 4,
        }
    }
}

/// Raster-container storage contract.
///
/// The pipeline never parses the container format itself; a backend (NetCDF,
/// GeoTIFF, ...) implements this trait outside the crate. Datasets keep their
/// write order so that repeated reads enumerate them identically.
pub trait RasterStore: Send + Sync {
    /// Global attributes of the artifact at `path`.
    fn read_attributes(&self, path: &Path) -> PlaiceResult<Attributes>;

    /// Dataset names in write order.
    fn list_datasets(&self, path: &Path) -> PlaiceResult<Vec<String>>;

    /// One dataset with its attributes.
    fn read_dataset(&self, path: &Path, name: &str) -> PlaiceResult<(ArrayD<f32>, Attributes)>;

    /// Write one dataset. `new` replaces any artifact already at `path`;
    /// otherwise the dataset is appended and the global attributes updated.
    #[allow(clippy::too_many_arguments)]
    fn write_dataset(
        &self,
        path: &Path,
        name: &str,
        data: ArrayD<f32>,
        global_attrs: &Attributes,
        dataset_attrs: &Attributes,
        compression: &CompressionOptions,
        new: bool,
    ) -> PlaiceResult<()>;
}

#[derive(Debug, Default)]
struct MemoryFile {
    attributes: Attributes,
    order: Vec<String>,
    datasets: HashMap<String, (ArrayD<f32>, Attributes)>,
}

/// In-memory `RasterStore` used by tests and demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<PathBuf, MemoryFile>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).contains_key(path)
    }

    pub fn remove(&self, path: &Path) {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).remove(path);
    }
}

impl RasterStore for MemoryStore {
    fn read_attributes(&self, path: &Path) -> PlaiceResult<Attributes> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files
            .get(path)
            .map(|f| f.attributes.clone())
            .ok_or_else(|| PlaiceError::Store(format!("no artifact at {}", path.display())))
    }

    fn list_datasets(&self, path: &Path) -> PlaiceResult<Vec<String>> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files
            .get(path)
            .map(|f| f.order.clone())
            .ok_or_else(|| PlaiceError::Store(format!("no artifact at {}", path.display())))
    }

    fn read_dataset(&self, path: &Path, name: &str) -> PlaiceResult<(ArrayD<f32>, Attributes)> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        let file = files
            .get(path)
            .ok_or_else(|| PlaiceError::Store(format!("no artifact at {}", path.display())))?;
        file.datasets
            .get(name)
            .cloned()
            .ok_or_else(|| {
                PlaiceError::Store(format!("no dataset '{}' in {}", name, path.display()))
            })
    }

    fn write_dataset(
        &self,
        path: &Path,
        name: &str,
        data: ArrayD<f32>,
        global_attrs: &Attributes,
        dataset_attrs: &Attributes,
        _compression: &CompressionOptions,
        new: bool,
    ) -> PlaiceResult<()> {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        if new {
            files.insert(path.to_path_buf(), MemoryFile::default());
        }
        let file = files.entry(path.to_path_buf()).or_default();
        file.attributes = global_attrs.clone();
        if !file.datasets.contains_key(name) {
            file.order.push(name.to_string());
        }
        file.datasets
            .insert(name.to_string(), (data, dataset_attrs.clone()));
        Ok(())
    }
}
