use crate::config::ResamplingMethod;
use crate::core::grid::GridDefinition;
use crate::io::Attributes;
use crate::types::{PlaiceError, PlaiceResult, Pixel, RasterImage, RasterStack, NO_DATA};
use std::collections::HashMap;

/// One named 2-D swath layer
#[derive(Debug, Clone)]
pub struct SwathDataset {
    pub name: String,
    pub data: RasterImage,
    pub attributes: Attributes,
}

impl SwathDataset {
    pub fn new(name: impl Into<String>, data: RasterImage) -> Self {
        Self {
            name: name.into(),
            data,
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// A stack of swath layers sharing one per-pixel lat/lon coordinate field.
///
/// Stacking exists so the expensive neighbour search is paid once per
/// capture instead of once per band.
#[derive(Debug, Clone)]
pub struct SwathStack {
    lat: RasterImage,
    lon: RasterImage,
    datasets: Vec<SwathDataset>,
}

impl SwathStack {
    pub fn new(lat: RasterImage, lon: RasterImage) -> PlaiceResult<Self> {
        if lat.dim() != lon.dim() {
            return Err(PlaiceError::Resampling(format!(
                "coordinate shapes differ: lat {:?} vs lon {:?}",
                lat.dim(),
                lon.dim()
            )));
        }
        Ok(Self {
            lat,
            lon,
            datasets: Vec::new(),
        })
    }

    /// Add a layer; its shape must match the coordinate field.
    pub fn push(&mut self, dataset: SwathDataset) -> PlaiceResult<()> {
        if dataset.data.dim() != self.lat.dim() {
            return Err(PlaiceError::Resampling(format!(
                "dataset '{}' shape {:?} does not match coordinate shape {:?}",
                dataset.name,
                dataset.data.dim(),
                self.lat.dim()
            )));
        }
        self.datasets.push(dataset);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn datasets(&self) -> &[SwathDataset] {
        &self.datasets
    }

    /// Swath shape (rows, columns).
    pub fn dim(&self) -> (usize, usize) {
        self.lat.dim()
    }
}

/// Resampling parameters
#[derive(Debug, Clone)]
pub struct ResampleParams {
    pub method: ResamplingMethod,
    /// Neighbour search radius in projected-plane units
    pub search_radius: f64,
    /// Nearest samples considered per output cell
    pub neighbours: usize,
}

impl Default for ResampleParams {
    fn default() -> Self {
        Self {
            method: ResamplingMethod::Bilinear,
            search_radius: 30e3,
            neighbours: 4,
        }
    }
}

/// Maps a swath stack onto a regular target grid.
pub struct SwathResampler {
    params: ResampleParams,
}

impl SwathResampler {
    pub fn new(params: ResampleParams) -> Self {
        Self { params }
    }

    /// Resample every layer of `stack` onto `grid`.
    ///
    /// Returns a (ny, nx, N) raster stack; cells with no qualifying sample
    /// hold the no-data marker. Swath coordinates are projected and bucketed
    /// once, and the per-cell neighbour weights applied to all N bands.
    pub fn resample(&self, stack: &SwathStack, grid: &GridDefinition) -> PlaiceResult<RasterStack> {
        if stack.is_empty() {
            return Err(PlaiceError::Resampling("empty dataset stack".to_string()));
        }
        if self.params.search_radius <= 0.0 {
            return Err(PlaiceError::Resampling(format!(
                "search radius must be positive, got {}",
                self.params.search_radius
            )));
        }
        let (rows, cols) = stack.dim();
        for ds in stack.datasets() {
            if ds.data.dim() != (rows, cols) {
                return Err(PlaiceError::Resampling(format!(
                    "dataset '{}' shape {:?} does not match coordinate shape {:?}",
                    ds.name,
                    ds.data.dim(),
                    (rows, cols)
                )));
            }
        }

        let nb = stack.len();
        let (ny, nx) = (grid.ny, grid.nx);
        log::info!(
            "Resampling {} datasets {}x{} onto {} {}x{}",
            nb,
            rows,
            cols,
            grid.projection,
            ny,
            nx
        );

        // Project the shared coordinate field once
        let mut samples: Vec<(f64, f64, u32)> = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let lat = stack.lat[[r, c]] as f64;
                let lon = stack.lon[[r, c]] as f64;
                if !lat.is_finite() || !lon.is_finite() {
                    continue;
                }
                let (x, y) = grid.projection.forward(lon, lat);
                samples.push((x, y, (r * cols + c) as u32));
            }
        }

        // Bucket side equals the search radius so a 3x3 bucket neighbourhood
        // is guaranteed to contain every sample within range of a cell centre.
        let bucket = self.params.search_radius;
        let mut buckets: HashMap<(i64, i64), Vec<u32>> = HashMap::new();
        for (i, &(x, y, _)) in samples.iter().enumerate() {
            let key = ((x / bucket).floor() as i64, (y / bucket).floor() as i64);
            buckets.entry(key).or_default().push(i as u32);
        }

        let bands: Vec<&RasterImage> = stack.datasets().iter().map(|d| &d.data).collect();
        let radius2 = self.params.search_radius * self.params.search_radius;
        let k = self.params.neighbours.max(1);
        let method = self.params.method;

        let fill_row = |row: usize, out_row: &mut [Pixel]| {
            // (distance^2, sample index), ascending, at most k entries
            let mut nearest: Vec<(f64, u32)> = Vec::with_capacity(k);
            for col in 0..nx {
                let (cx, cy) = grid.cell_center(row, col);
                nearest.clear();
                let bx = (cx / bucket).floor() as i64;
                let by = (cy / bucket).floor() as i64;
                for dx in -1..=1 {
                    for dy in -1..=1 {
                        let Some(ids) = buckets.get(&(bx + dx, by + dy)) else {
                            continue;
                        };
                        for &i in ids {
                            let (sx, sy, _) = samples[i as usize];
                            let d2 = (sx - cx) * (sx - cx) + (sy - cy) * (sy - cy);
                            if d2 > radius2 {
                                continue;
                            }
                            if nearest.len() < k {
                                nearest.push((d2, i));
                                nearest.sort_by(|a, b| a.0.total_cmp(&b.0));
                            } else if d2 < nearest[k - 1].0 {
                                nearest[k - 1] = (d2, i);
                                nearest.sort_by(|a, b| a.0.total_cmp(&b.0));
                            }
                        }
                    }
                }

                let base = col * nb;
                if nearest.is_empty() {
                    for b in 0..nb {
                        out_row[base + b] = NO_DATA;
                    }
                    continue;
                }
                match method {
                    ResamplingMethod::Nearest => {
                        for (b, band) in bands.iter().enumerate() {
                            let mut value = NO_DATA;
                            for &(_, i) in &nearest {
                                let flat = samples[i as usize].2 as usize;
                                let v = band[[flat / cols, flat % cols]];
                                if v.is_finite() {
                                    value = v;
                                    break;
                                }
                            }
                            out_row[base + b] = value;
                        }
                    }
                    ResamplingMethod::Bilinear => {
                        for (b, band) in bands.iter().enumerate() {
                            let mut num = 0.0f64;
                            let mut den = 0.0f64;
                            for &(d2, i) in &nearest {
                                let flat = samples[i as usize].2 as usize;
                                let v = band[[flat / cols, flat % cols]];
                                if !v.is_finite() {
                                    continue;
                                }
                                let w = 1.0 / (d2 + 1e-12);
                                num += w * v as f64;
                                den += w;
                            }
                            out_row[base + b] = if den > 0.0 { (num / den) as Pixel } else { NO_DATA };
                        }
                    }
                }
            }
        };

        let mut out = vec![NO_DATA; ny * nx * nb];
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            out.par_chunks_mut(nx * nb)
                .enumerate()
                .for_each(|(row, out_row)| fill_row(row, out_row));
        }
        #[cfg(not(feature = "parallel"))]
        for (row, out_row) in out.chunks_mut(nx * nb).enumerate() {
            fill_row(row, out_row);
        }

        RasterStack::from_shape_vec((ny, nx, nb), out)
            .map_err(|e| PlaiceError::Resampling(format!("output shape error: {}", e)))
    }
}
