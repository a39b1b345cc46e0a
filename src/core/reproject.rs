use crate::config::{GridParams, RunConfig};
use crate::core::fill::GapFiller;
use crate::core::grid::GridBuilder;
use crate::core::resample::{ResampleParams, SwathDataset, SwathResampler, SwathStack};
use crate::io::{AttrValue, RasterStore};
use crate::types::{Artifact, BoundingBox, PlaiceError, PlaiceResult, Pixel, RasterImage};
use ndarray::{Axis, Ix2};
use std::path::PathBuf;

/// Datasets always written at full precision: coordinates and view/solar
/// geometry must survive round-trips exactly.
pub const GEOMETRY_DATASETS: &[&str] = &["lat", "lon", "vza", "sza", "vaa", "saa", "raa"];

/// Default suffix appended to the source name of a reprojected artifact
const DEFAULT_NAME_SUFFIX: &str = "projected";

/// Composes grid derivation, resampling and gap filling into a single
/// "reproject this artifact" operation.
pub struct ReprojectionEngine<'a> {
    config: &'a RunConfig,
    store: &'a dyn RasterStore,
}

impl<'a> ReprojectionEngine<'a> {
    pub fn new(config: &'a RunConfig, store: &'a dyn RasterStore) -> Self {
        Self { config, store }
    }

    /// Reproject one artifact onto the effective target grid.
    ///
    /// Requested overrides are merged onto the Run's grid defaults; when no
    /// extent is configured anywhere, the artifact's own lat/lon layers
    /// provide it. Writes one new artifact and never touches the source.
    pub fn reproject(
        &self,
        artifact: &Artifact,
        overrides: Option<&GridParams>,
    ) -> PlaiceResult<Artifact> {
        let gatts = self.store.read_attributes(&artifact.path)?;
        let sensor = gatts
            .get("sensor")
            .and_then(|v| v.as_text())
            .ok_or_else(|| {
                PlaiceError::UnsupportedArtifact(format!(
                    "no sensor attribute in {}",
                    artifact.path.display()
                ))
            })?
            .to_string();

        let names = self.store.list_datasets(&artifact.path)?;
        if !names.iter().any(|n| n == "lat") || !names.iter().any(|n| n == "lon") {
            return Err(PlaiceError::UnsupportedArtifact(format!(
                "no lat/lon coordinate layers in {}",
                artifact.path.display()
            )));
        }

        let params = match overrides {
            Some(over) => self.config.grid.merged(over),
            None => self.config.grid.clone(),
        };

        let lat = self.read_2d(artifact, "lat")?;
        let lon = self.read_2d(artifact, "lon")?;

        // Extent fallback from the coordinate layers themselves
        let fallback = if params.xrange.is_none()
            && params.limit.is_none()
            && params.polygon.is_none()
        {
            let limit = swath_limit(&lat, &lon)?;
            log::info!(
                "Extent from lat/lon layers: lon {:.4}..{:.4} lat {:.4}..{:.4}",
                limit.min_lon,
                limit.max_lon,
                limit.min_lat,
                limit.max_lat
            );
            Some(limit)
        } else {
            None
        };
        let grid = GridBuilder::build(&params, fallback.as_ref())?;

        let mut stack = SwathStack::new(lat, lon)?;
        for name in &names {
            let (data, attrs) = self.store.read_dataset(&artifact.path, name)?;
            let Ok(data) = data.into_dimensionality::<Ix2>() else {
                log::debug!("Skipping non-2D dataset '{}'", name);
                continue;
            };
            stack.push(SwathDataset::new(name.clone(), data).with_attributes(attrs))?;
        }

        let resampler = SwathResampler::new(ResampleParams {
            method: params.resampling,
            search_radius: params.search_radius,
            ..ResampleParams::default()
        });
        let mut resampled = resampler.resample(&stack, &grid)?;
        if params.fill_gaps {
            let filled = GapFiller::fill_stack(&mut resampled);
            log::debug!("Gap filling assigned {} cells", filled);
        }

        let suffix = params.name_suffix.as_deref().unwrap_or(DEFAULT_NAME_SUFFIX);
        let stem = artifact.stem();
        let oname = format!("{}_{}", stem, suffix);
        let out_path = self.output_path(artifact, &oname);

        let mut out_gatts = gatts;
        out_gatts.extend(grid.attributes());
        out_gatts.insert("oname".to_string(), AttrValue::Text(oname));
        out_gatts.insert("source_name".to_string(), AttrValue::Text(stem));

        for (i, ds) in stack.datasets().iter().enumerate() {
            let mut band = resampled.index_axis(Axis(2), i).to_owned();
            if !GEOMETRY_DATASETS.contains(&ds.name.as_str()) {
                if let Some(digits) = self.config.least_significant_digit {
                    quantize(&mut band, digits);
                }
            }
            self.store.write_dataset(
                &out_path,
                &ds.name,
                band.into_dyn(),
                &out_gatts,
                &ds.attributes,
                &self.config.compression,
                i == 0,
            )?;
        }
        log::info!("Wrote {}", out_path.display());

        Ok(Artifact {
            path: out_path,
            kind: artifact.kind,
            sensor: Some(sensor),
            has_geolocation: true,
        })
    }

    fn read_2d(&self, artifact: &Artifact, name: &str) -> PlaiceResult<RasterImage> {
        let (data, _) = self.store.read_dataset(&artifact.path, name)?;
        data.into_dimensionality::<Ix2>().map_err(|_| {
            PlaiceError::UnsupportedArtifact(format!(
                "dataset '{}' in {} is not two-dimensional",
                name,
                artifact.path.display()
            ))
        })
    }

    fn output_path(&self, artifact: &Artifact, oname: &str) -> PathBuf {
        let dir = self
            .config
            .output
            .clone()
            .or_else(|| artifact.path.parent().map(|p| p.to_path_buf()))
            .unwrap_or_default();
        match artifact.path.extension() {
            Some(ext) => dir.join(format!("{}.{}", oname, ext.to_string_lossy())),
            None => dir.join(oname),
        }
    }
}

/// Bounding box of the finite lat/lon samples of a swath.
fn swath_limit(lat: &RasterImage, lon: &RasterImage) -> PlaiceResult<BoundingBox> {
    let mut bbox: Option<BoundingBox> = None;
    for (&la, &lo) in lat.iter().zip(lon.iter()) {
        if !la.is_finite() || !lo.is_finite() {
            continue;
        }
        let (la, lo) = (la as f64, lo as f64);
        bbox = Some(match bbox {
            None => BoundingBox::new(lo, lo, la, la),
            Some(b) => BoundingBox::new(
                b.min_lon.min(lo),
                b.max_lon.max(lo),
                b.min_lat.min(la),
                b.max_lat.max(la),
            ),
        });
    }
    bbox.ok_or_else(|| {
        PlaiceError::MissingExtent("no finite lat/lon samples in swath".to_string())
    })
}

/// Round to a fixed number of decimal digits, leaving no-data cells alone.
fn quantize(band: &mut RasterImage, digits: i32) {
    let factor = 10f64.powi(digits);
    band.mapv_inplace(|v| {
        if v.is_finite() {
            ((v as f64 * factor).round() / factor) as Pixel
        } else {
            v
        }
    });
}
