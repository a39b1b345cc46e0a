use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Real-valued raster or swath data
pub type Pixel = f32;

/// 2D data array (row x column)
pub type RasterImage = ndarray::Array2<Pixel>;

/// 3D stacked data (row x column x band)
pub type RasterStack = ndarray::Array3<Pixel>;

/// Reserved value marking cells with no valid sample.
///
/// NaN rather than a numeric zero so that genuine zero measurements stay
/// distinguishable downstream.
pub const NO_DATA: Pixel = Pixel::NAN;

/// Processing stages in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Convert a raw capture bundle into one or more L1R products
    RawConvert,
    /// VIS-SWIR atmospheric correction (L1R -> L2R)
    AtmosphericCorrect,
    /// Adjacency correction; its outputs replace the L2R list
    AdjacencyCorrect,
    /// Thermal atmospheric correction (L1R -> L2T)
    ThermalCorrect,
    /// Per-parameter derivation (L2R -> L2W), once per parameter group
    DeriveParameters,
    /// Swath-to-grid reprojection of any designated artifact kind
    Reproject,
}

impl Stage {
    /// The artifact kind this stage produces, if it produces any.
    pub fn output_kind(&self) -> Option<ArtifactKind> {
        match self {
            Stage::RawConvert => Some(ArtifactKind::L1R),
            Stage::AtmosphericCorrect => Some(ArtifactKind::L2R),
            Stage::AdjacencyCorrect => Some(ArtifactKind::L2R),
            Stage::ThermalCorrect => Some(ArtifactKind::L2T),
            Stage::DeriveParameters => Some(ArtifactKind::L2W),
            Stage::Reproject => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::RawConvert => write!(f, "raw_convert"),
            Stage::AtmosphericCorrect => write!(f, "atmospheric_correct"),
            Stage::AdjacencyCorrect => write!(f, "adjacency_correct"),
            Stage::ThermalCorrect => write!(f, "thermal_correct"),
            Stage::DeriveParameters => write!(f, "derive_parameters"),
            Stage::Reproject => write!(f, "reproject"),
        }
    }
}

/// Kind tag carried by every artifact.
///
/// `Raw` marks un-converted input captures; it is never produced by a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    Raw,
    L1R,
    L2R,
    L2T,
    L2W,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Raw => write!(f, "raw"),
            ArtifactKind::L1R => write!(f, "l1r"),
            ArtifactKind::L2R => write!(f, "l2r"),
            ArtifactKind::L2T => write!(f, "l2t"),
            ArtifactKind::L2W => write!(f, "l2w"),
        }
    }
}

/// One output file produced by a stage invocation.
///
/// Read-only once written; downstream stages always write new artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    /// Sensor identifier, e.g. "L8_OLI"
    pub sensor: Option<String>,
    /// Whether per-pixel lat/lon coordinate layers are present
    pub has_geolocation: bool,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>, kind: ArtifactKind) -> Self {
        Self {
            path: path.into(),
            kind,
            sensor: None,
            has_geolocation: false,
        }
    }

    pub fn with_sensor(mut self, sensor: impl Into<String>) -> Self {
        self.sensor = Some(sensor.into());
        self
    }

    pub fn with_geolocation(mut self) -> Self {
        self.has_geolocation = true;
        self
    }

    /// File stem used to derive output names for sibling artifacts.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// Geographic bounding box in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// Smallest box covering a set of lon/lat vertices, e.g. a region polygon.
    pub fn from_vertices(vertices: &[(f64, f64)]) -> Option<Self> {
        let mut it = vertices
            .iter()
            .filter(|(lon, lat)| lon.is_finite() && lat.is_finite());
        let &(lon0, lat0) = it.next()?;
        let mut bbox = Self::new(lon0, lon0, lat0, lat0);
        for &(lon, lat) in it {
            bbox.min_lon = bbox.min_lon.min(lon);
            bbox.max_lon = bbox.max_lon.max(lon);
            bbox.min_lat = bbox.min_lat.min(lat);
            bbox.max_lat = bbox.max_lat.max(lat);
        }
        Some(bbox)
    }

    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        )
    }

    /// The four corners, counter-clockwise from the south-west.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.min_lon, self.min_lat),
            (self.max_lon, self.min_lat),
            (self.max_lon, self.max_lat),
            (self.min_lon, self.max_lat),
        ]
    }
}

/// Error types for pipeline processing
#[derive(Debug, thiserror::Error)]
pub enum PlaiceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing extent: {0}")]
    MissingExtent(String),

    #[error("Invalid pixel size: {0} x {1}")]
    InvalidPixelSize(f64, f64),

    #[error("Invalid extent: {0}")]
    InvalidExtent(String),

    #[error("Unsupported artifact: {0}")]
    UnsupportedArtifact(String),

    #[error("Resampling error: {0}")]
    Resampling(String),

    #[error("Projection resolution error: {0}")]
    ProjectionResolution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Store(String),
}

/// Result type for pipeline operations
pub type PlaiceResult<T> = Result<T, PlaiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_output_kinds() {
        assert_eq!(Stage::RawConvert.output_kind(), Some(ArtifactKind::L1R));
        assert_eq!(Stage::AdjacencyCorrect.output_kind(), Some(ArtifactKind::L2R));
        assert_eq!(Stage::ThermalCorrect.output_kind(), Some(ArtifactKind::L2T));
        assert_eq!(Stage::DeriveParameters.output_kind(), Some(ArtifactKind::L2W));
        assert_eq!(Stage::Reproject.output_kind(), None);
    }

    #[test]
    fn test_bounding_box_from_vertices() {
        let ring = [(20.0, 10.0), (20.5, 10.0), (20.5, 10.5), (20.0, 10.5)];
        let bbox = BoundingBox::from_vertices(&ring).unwrap();
        assert_eq!(bbox.min_lon, 20.0);
        assert_eq!(bbox.max_lon, 20.5);
        assert_eq!(bbox.min_lat, 10.0);
        assert_eq!(bbox.max_lat, 10.5);
        assert_eq!(bbox.centroid(), (20.25, 10.25));
    }

    #[test]
    fn test_bounding_box_from_empty_vertices() {
        assert!(BoundingBox::from_vertices(&[]).is_none());
    }

    #[test]
    fn test_artifact_stem() {
        let a = Artifact::new("/data/out/S2A_MSI_2023_08_04_L1R.nc", ArtifactKind::L1R);
        assert_eq!(a.stem(), "S2A_MSI_2023_08_04_L1R");
    }
}
