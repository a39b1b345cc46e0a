use crate::io::CompressionOptions;
use crate::types::{ArtifactKind, BoundingBox, PlaiceError, PlaiceResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Interpolation method for swath-to-grid resampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResamplingMethod {
    /// Weighted interpolation over the nearest neighbours within the search radius
    Bilinear,
    /// Value of the single nearest neighbour within the search radius
    Nearest,
}

impl Default for ResamplingMethod {
    fn default() -> Self {
        ResamplingMethod::Bilinear
    }
}

/// Adjacency-correction algorithms.
///
/// Closed set: an unrecognized method name is a configuration error at
/// resolution time, never a silent pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjacencyMethod {
    AcStar3,
    Glad,
}

impl FromStr for AdjacencyMethod {
    type Err = PlaiceError;

    fn from_str(s: &str) -> PlaiceResult<Self> {
        match s.to_lowercase().as_str() {
            "acstar3" => Ok(AdjacencyMethod::AcStar3),
            "glad" => Ok(AdjacencyMethod::Glad),
            other => Err(PlaiceError::Config(format!(
                "unknown adjacency method '{}' (expected acstar3 or glad)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AdjacencyMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjacencyMethod::AcStar3 => write!(f, "acstar3"),
            AdjacencyMethod::Glad => write!(f, "glad"),
        }
    }
}

/// Target-grid parameters for reprojection.
///
/// Option fields left empty fall back to the Run defaults when merged, and
/// ultimately to values derived from the artifact itself (extent from the
/// lat/lon layers, projection from the extent centroid).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    /// Target CRS registry code; inferred from the extent when absent
    pub epsg: Option<u32>,
    /// Geographic bounding region
    pub limit: Option<BoundingBox>,
    /// Region polygon as lon/lat vertices; its bounding box is used
    pub polygon: Option<Vec<(f64, f64)>>,
    /// Explicit projected x extent (min, max); bypasses geographic derivation
    pub xrange: Option<(f64, f64)>,
    /// Explicit projected y extent (min, max); bypasses geographic derivation
    pub yrange: Option<(f64, f64)>,
    /// Target pixel size (x, y) in projection units
    pub pixel_size: Option<(f64, f64)>,
    /// Snap the extent outward to whole pixels from the coordinate origin
    pub align: bool,
    pub resampling: ResamplingMethod,
    /// Neighbour search radius in projected-plane units
    pub search_radius: f64,
    /// Fill remaining no-data cells by nearest-valid propagation
    pub fill_gaps: bool,
    /// Suffix appended to the source name for the reprojected sibling
    pub name_suffix: Option<String>,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            epsg: None,
            limit: None,
            polygon: None,
            xrange: None,
            yrange: None,
            pixel_size: None,
            align: true,
            resampling: ResamplingMethod::default(),
            search_radius: 30e3,
            fill_gaps: false,
            name_suffix: None,
        }
    }
}

impl GridParams {
    /// Requested overrides merged onto these defaults.
    ///
    /// Option fields: the override wins where set. Plain fields are taken
    /// from the override as-is.
    pub fn merged(&self, over: &GridParams) -> GridParams {
        GridParams {
            epsg: over.epsg.or(self.epsg),
            limit: over.limit.or(self.limit),
            polygon: over.polygon.clone().or_else(|| self.polygon.clone()),
            xrange: over.xrange.or(self.xrange),
            yrange: over.yrange.or(self.yrange),
            pixel_size: over.pixel_size.or(self.pixel_size),
            align: over.align,
            resampling: over.resampling,
            search_radius: over.search_radius,
            fill_gaps: over.fill_gaps,
            name_suffix: over.name_suffix.clone().or_else(|| self.name_suffix.clone()),
        }
    }
}

/// Fully-resolved per-Run configuration.
///
/// Built once at Run start from merged defaults and user overrides, then
/// passed by reference into every stage and engine call. Nothing in the
/// pipeline reads process-wide state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Run identifier; timestamp-derived when absent
    pub run_id: Option<String>,
    /// Output root directory; current directory when absent
    pub output: Option<PathBuf>,
    /// Input capture paths (directories, files, or tiles to merge)
    pub inputs: Vec<PathBuf>,
    /// Process all inputs as a single merged bundle
    pub merge_tiles: bool,

    /// Enable the VIS-SWIR atmospheric-correction branch
    pub atmospheric_correction: bool,
    /// Adjacency correction applied to L2R outputs, when set
    pub adjacency_method: Option<AdjacencyMethod>,
    /// Enable the thermal-correction branch
    pub thermal_correction: bool,
    /// Parameter groups derived from each L2R artifact, one artifact each
    pub derived_parameters: Vec<String>,

    /// Enable the reprojection pass over `reproject_targets`
    pub output_projection: bool,
    /// Artifact kinds reprojected onto the target grid
    pub reproject_targets: Vec<ArtifactKind>,
    /// Run-default target-grid parameters
    pub grid: GridParams,

    /// Decimal digits retained for non-geometry datasets; None keeps full precision
    pub least_significant_digit: Option<i32>,
    pub compression: CompressionOptions,

    /// Artifact kinds handed to the exporter after production/reprojection
    pub export_kinds: Vec<ArtifactKind>,
    /// Artifact kinds whose files are deleted after the Run completes
    pub delete_kinds: Vec<ArtifactKind>,
    /// Remove the settings snapshot and run log at the end of the Run
    pub delete_run_text_files: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            run_id: None,
            output: None,
            inputs: Vec::new(),
            merge_tiles: false,
            atmospheric_correction: true,
            adjacency_method: None,
            thermal_correction: false,
            derived_parameters: Vec::new(),
            output_projection: false,
            reproject_targets: vec![ArtifactKind::L2R, ArtifactKind::L2W],
            grid: GridParams::default(),
            least_significant_digit: Some(4),
            compression: CompressionOptions::default(),
            export_kinds: Vec::new(),
            delete_kinds: Vec::new(),
            delete_run_text_files: false,
        }
    }
}

impl RunConfig {
    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> PlaiceResult<()> {
        if self.inputs.is_empty() {
            return Err(PlaiceError::Config(
                "no input bundles configured, nothing to do".to_string(),
            ));
        }
        if let Some((px, py)) = self.grid.pixel_size {
            if px <= 0.0 || py <= 0.0 {
                return Err(PlaiceError::InvalidPixelSize(px, py));
            }
        }
        if self.output_projection && self.reproject_targets.is_empty() {
            return Err(PlaiceError::Config(
                "output_projection is set but reproject_targets is empty".to_string(),
            ));
        }
        Ok(())
    }
}
