use crate::config::GridParams;
use crate::core::projection::MapProjection;
use crate::io::{AttrValue, Attributes};
use crate::types::{BoundingBox, PlaiceError, PlaiceResult};
use serde::{Deserialize, Serialize};

/// Target raster geometry: projection, pixel size, aligned extent, dimensions.
///
/// Rows follow the north-up raster convention: row 0 sits at `yrange.1`
/// (the maximum y) and rows increase southward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDefinition {
    pub projection: MapProjection,
    /// Pixel size (x, y) in projection units, both strictly positive
    pub pixel_size: (f64, f64),
    /// Projected x extent (min, max)
    pub xrange: (f64, f64),
    /// Projected y extent (min, max)
    pub yrange: (f64, f64),
    pub nx: usize,
    pub ny: usize,
}

impl GridDefinition {
    /// Projected coordinates of a cell centre.
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        let x = self.xrange.0 + (col as f64 + 0.5) * self.pixel_size.0;
        let y = self.yrange.1 - (row as f64 + 0.5) * self.pixel_size.1;
        (x, y)
    }

    /// Grid geometry as artifact attributes, carried on every reprojected output.
    pub fn attributes(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(
            "xrange".to_string(),
            AttrValue::FloatList(vec![self.xrange.0, self.xrange.1]),
        );
        attrs.insert(
            "yrange".to_string(),
            AttrValue::FloatList(vec![self.yrange.0, self.yrange.1]),
        );
        attrs.insert(
            "pixel_size".to_string(),
            AttrValue::FloatList(vec![self.pixel_size.0, self.pixel_size.1]),
        );
        attrs.insert("epsg".to_string(), AttrValue::Int(self.projection.epsg() as i64));
        attrs.insert(
            "projection".to_string(),
            AttrValue::Text(self.projection.to_string()),
        );
        attrs.insert("xdim".to_string(), AttrValue::Int(self.nx as i64));
        attrs.insert("ydim".to_string(), AttrValue::Int(self.ny as i64));
        attrs
    }
}

/// Derives a `GridDefinition` from grid parameters and an extent source.
pub struct GridBuilder;

impl GridBuilder {
    /// Build the target grid.
    ///
    /// Extent precedence: explicit projected x/y ranges, then the configured
    /// geographic limit, then the polygon's bounding box, then
    /// `fallback_limit` (typically the min/max of a dataset's lat/lon
    /// layers). Geographic extents are projected corner-by-corner since a
    /// geographic bounding box is not a bounding box in the projected plane.
    pub fn build(
        params: &GridParams,
        fallback_limit: Option<&BoundingBox>,
    ) -> PlaiceResult<GridDefinition> {
        let (px, py) = params
            .pixel_size
            .ok_or_else(|| PlaiceError::Config("no target pixel size configured".to_string()))?;
        if px <= 0.0 || py <= 0.0 {
            return Err(PlaiceError::InvalidPixelSize(px, py));
        }

        let (projection, xrange, yrange) = match (params.xrange, params.yrange) {
            (Some(xrange), Some(yrange)) => {
                let epsg = params.epsg.ok_or_else(|| {
                    PlaiceError::ProjectionResolution(
                        "explicit projected extent requires a target EPSG code".to_string(),
                    )
                })?;
                (MapProjection::from_epsg(epsg)?, xrange, yrange)
            }
            (None, None) => {
                let limit = params
                    .limit
                    .or_else(|| {
                        params
                            .polygon
                            .as_deref()
                            .and_then(BoundingBox::from_vertices)
                    })
                    .or_else(|| fallback_limit.copied())
                    .ok_or_else(|| {
                        PlaiceError::MissingExtent(
                            "no limit, polygon, explicit range or dataset extent available"
                                .to_string(),
                        )
                    })?;

                let projection = match params.epsg {
                    Some(code) => MapProjection::from_epsg(code)?,
                    None => {
                        let (lon, lat) = limit.centroid();
                        let inferred = MapProjection::utm_for(lon, lat);
                        log::info!("Inferred target projection {} from extent centroid", inferred);
                        inferred
                    }
                };

                let mut xmin = f64::INFINITY;
                let mut xmax = f64::NEG_INFINITY;
                let mut ymin = f64::INFINITY;
                let mut ymax = f64::NEG_INFINITY;
                for (lon, lat) in limit.corners() {
                    let (x, y) = projection.forward(lon, lat);
                    xmin = xmin.min(x);
                    xmax = xmax.max(x);
                    ymin = ymin.min(y);
                    ymax = ymax.max(y);
                }
                (projection, (xmin, xmax), (ymin, ymax))
            }
            _ => {
                return Err(PlaiceError::InvalidExtent(
                    "xrange and yrange must be supplied together".to_string(),
                ))
            }
        };

        if !(xrange.0.is_finite() && xrange.1.is_finite() && yrange.0.is_finite() && yrange.1.is_finite()) {
            return Err(PlaiceError::InvalidExtent("non-finite extent".to_string()));
        }
        if xrange.1 <= xrange.0 || yrange.1 <= yrange.0 {
            return Err(PlaiceError::InvalidExtent(format!(
                "degenerate extent x {:?} y {:?}",
                xrange, yrange
            )));
        }

        let (xrange, yrange) = if params.align {
            (align_outward(xrange, px), align_outward(yrange, py))
        } else {
            (xrange, yrange)
        };

        let nx = ((xrange.1 - xrange.0) / px).floor() as usize;
        let ny = ((yrange.1 - yrange.0) / py).floor() as usize;
        if nx == 0 || ny == 0 {
            return Err(PlaiceError::InvalidExtent(format!(
                "extent smaller than one pixel ({} x {})",
                nx, ny
            )));
        }

        log::debug!(
            "Target grid {} {}x{} px {}x{} x {:?} y {:?}",
            projection,
            nx,
            ny,
            px,
            py,
            xrange,
            yrange
        );

        Ok(GridDefinition {
            projection,
            pixel_size: (px, py),
            xrange,
            yrange,
            nx,
            ny,
        })
    }
}

/// Snap a range outward so both edges land on whole-pixel multiples from the
/// coordinate origin. The extent grows, never shrinks, so the requested
/// region stays fully covered.
fn align_outward(range: (f64, f64), pixel: f64) -> (f64, f64) {
    let min = (range.0 / pixel).floor() * pixel;
    let max = (range.1 / pixel).ceil() * pixel;
    (min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn metric_params(xrange: (f64, f64), yrange: (f64, f64), pixel: f64) -> GridParams {
        GridParams {
            epsg: Some(32634),
            xrange: Some(xrange),
            yrange: Some(yrange),
            pixel_size: Some((pixel, pixel)),
            ..GridParams::default()
        }
    }

    #[test]
    fn test_dimension_invariant() {
        let mut params = metric_params((0.0, 95.0), (0.0, 65.0), 30.0);
        params.align = false;
        let grid = GridBuilder::build(&params, None).unwrap();
        assert_eq!(grid.nx, 3); // floor(95 / 30)
        assert_eq!(grid.ny, 2); // floor(65 / 30)
    }

    #[test]
    fn test_alignment_grows_outward() {
        let params = metric_params((10.0, 95.0), (-5.0, 65.0), 30.0);
        let grid = GridBuilder::build(&params, None).unwrap();
        assert_eq!(grid.xrange, (0.0, 120.0));
        assert_eq!(grid.yrange, (-30.0, 90.0));
        assert_eq!(grid.nx, 4);
        assert_eq!(grid.ny, 4);
    }

    #[test]
    fn test_alignment_is_idempotent() {
        let aligned = align_outward((0.0, 120.0), 30.0);
        assert_eq!(aligned, (0.0, 120.0));
        assert_eq!(align_outward(aligned, 30.0), aligned);
    }

    #[test]
    fn test_invalid_pixel_size() {
        let params = metric_params((0.0, 100.0), (0.0, 100.0), -30.0);
        assert!(matches!(
            GridBuilder::build(&params, None),
            Err(PlaiceError::InvalidPixelSize(_, _))
        ));
    }

    #[test]
    fn test_degenerate_extent() {
        let params = metric_params((100.0, 100.0), (0.0, 100.0), 30.0);
        assert!(matches!(
            GridBuilder::build(&params, None),
            Err(PlaiceError::InvalidExtent(_))
        ));
    }

    #[test]
    fn test_extent_smaller_than_pixel() {
        let mut params = metric_params((0.0, 10.0), (0.0, 10.0), 30.0);
        params.align = false;
        assert!(matches!(
            GridBuilder::build(&params, None),
            Err(PlaiceError::InvalidExtent(_))
        ));
    }

    #[test]
    fn test_missing_extent() {
        let params = GridParams {
            pixel_size: Some((30.0, 30.0)),
            ..GridParams::default()
        };
        assert!(matches!(
            GridBuilder::build(&params, None),
            Err(PlaiceError::MissingExtent(_))
        ));
    }

    #[test]
    fn test_half_range_without_partner_is_invalid() {
        let mut params = metric_params((0.0, 100.0), (0.0, 100.0), 30.0);
        params.yrange = None;
        assert!(matches!(
            GridBuilder::build(&params, None),
            Err(PlaiceError::InvalidExtent(_))
        ));
    }

    #[test]
    fn test_utm_grid_from_geographic_limit() {
        // Half a degree near lat 10 is roughly 55 km, so 30 m pixels give
        // a grid in the 1800x1800 neighbourhood.
        let params = GridParams {
            limit: Some(BoundingBox::new(20.0, 20.5, 10.0, 10.5)),
            pixel_size: Some((30.0, 30.0)),
            ..GridParams::default()
        };
        let grid = GridBuilder::build(&params, None).unwrap();
        assert_eq!(grid.projection.epsg(), 32634);
        assert!(grid.nx > 1700 && grid.nx < 2000, "nx = {}", grid.nx);
        assert!(grid.ny > 1700 && grid.ny < 2000, "ny = {}", grid.ny);
        // Aligned edges land on whole-pixel multiples
        assert_relative_eq!(grid.xrange.0 % 30.0, 0.0, epsilon = 1e-9);
        assert_relative_eq!(grid.yrange.1 % 30.0, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fallback_limit_is_used() {
        let params = GridParams {
            pixel_size: Some((30.0, 30.0)),
            ..GridParams::default()
        };
        let fallback = BoundingBox::new(20.0, 20.5, 10.0, 10.5);
        let grid = GridBuilder::build(&params, Some(&fallback)).unwrap();
        assert_eq!(grid.projection.epsg(), 32634);
    }

    #[test]
    fn test_polygon_limit() {
        let params = GridParams {
            polygon: Some(vec![(20.0, 10.0), (20.5, 10.0), (20.5, 10.5), (20.0, 10.5)]),
            pixel_size: Some((30.0, 30.0)),
            ..GridParams::default()
        };
        let grid = GridBuilder::build(&params, None).unwrap();
        assert_eq!(grid.projection.epsg(), 32634);
    }

    #[test]
    fn test_cell_center_top_down() {
        let mut params = metric_params((0.0, 120.0), (0.0, 90.0), 30.0);
        params.align = false;
        let grid = GridBuilder::build(&params, None).unwrap();
        // Row 0 is the northernmost row
        assert_eq!(grid.cell_center(0, 0), (15.0, 75.0));
        assert_eq!(grid.cell_center(2, 3), (105.0, 15.0));
    }
}
