use crate::types::{PlaiceError, PlaiceResult};
use serde::{Deserialize, Serialize};

/// WGS84 semi-major axis (metres)
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 first eccentricity squared
const WGS84_E2: f64 = 0.006_694_379_990_14;
/// Transverse Mercator scale factor at the central meridian
const UTM_K0: f64 = 0.9996;
/// UTM false easting (metres)
const UTM_FALSE_EASTING: f64 = 500_000.0;
/// UTM false northing for the southern hemisphere (metres)
const UTM_FALSE_NORTHING: f64 = 10_000_000.0;

/// Closed set of target projections.
///
/// The pipeline only ever writes zoned UTM or plain geographic grids; any
/// other registry code is rejected when the configuration is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapProjection {
    /// Universal Transverse Mercator on WGS84
    Utm { zone: u8, south: bool },
    /// Plain lon/lat degrees (EPSG:4326)
    Geographic,
}

impl MapProjection {
    /// Resolve an EPSG registry code to a supported projection.
    pub fn from_epsg(code: u32) -> PlaiceResult<Self> {
        match code {
            4326 => Ok(MapProjection::Geographic),
            32601..=32660 => Ok(MapProjection::Utm {
                zone: (code - 32600) as u8,
                south: false,
            }),
            32701..=32760 => Ok(MapProjection::Utm {
                zone: (code - 32700) as u8,
                south: true,
            }),
            other => Err(PlaiceError::ProjectionResolution(format!(
                "EPSG:{} is not a supported target projection",
                other
            ))),
        }
    }

    /// The UTM zone whose central meridian is nearest the given point.
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        let zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        MapProjection::Utm {
            zone,
            south: lat < 0.0,
        }
    }

    pub fn epsg(&self) -> u32 {
        match self {
            MapProjection::Geographic => 4326,
            MapProjection::Utm { zone, south: false } => 32600 + *zone as u32,
            MapProjection::Utm { zone, south: true } => 32700 + *zone as u32,
        }
    }

    /// Central meridian of a UTM zone in degrees.
    fn central_meridian(zone: u8) -> f64 {
        (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
    }

    /// Forward projection: WGS84 lon/lat degrees to the projected plane.
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            MapProjection::Geographic => (lon, lat),
            MapProjection::Utm { zone, south } => {
                let (x, y) = tm_forward(lon, lat, Self::central_meridian(*zone));
                let y = if *south { y + UTM_FALSE_NORTHING } else { y };
                (x + UTM_FALSE_EASTING, y)
            }
        }
    }
}

impl std::fmt::Display for MapProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Transverse Mercator forward solution on the WGS84 ellipsoid.
///
/// Series expansion in the eccentricity, accurate to well under a metre
/// inside a UTM zone.
fn tm_forward(lon: f64, lat: f64, lon0: f64) -> (f64, f64) {
    let lat_rad = lat.to_radians();
    let dlon_rad = (lon - lon0).to_radians();

    let e2 = WGS84_E2;
    let ep2 = e2 / (1.0 - e2);

    let sin_lat = lat_rad.sin();
    let cos_lat = lat_rad.cos();
    let tan_lat = lat_rad.tan();

    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = ep2 * cos_lat * cos_lat;
    let a = cos_lat * dlon_rad;

    let m = meridian_arc(lat_rad);

    let x = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0);
    let y = UTM_K0
        * (m + n
            * tan_lat
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));

    (x, y)
}

/// Meridian arc length from the equator to `lat_rad`.
fn meridian_arc(lat_rad: f64) -> f64 {
    let e2 = WGS84_E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat_rad
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat_rad).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat_rad).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * lat_rad).sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_utm_zone_inference() {
        // Central meridian of zone 34 is 21E; covers 18E..24E
        assert_eq!(
            MapProjection::utm_for(20.25, 10.25),
            MapProjection::Utm { zone: 34, south: false }
        );
        assert_eq!(MapProjection::utm_for(20.25, 10.25).epsg(), 32634);
        // Southern hemisphere flips the registry block
        assert_eq!(MapProjection::utm_for(20.25, -10.25).epsg(), 32734);
        // Longitude extremes clamp to valid zones
        assert_eq!(MapProjection::utm_for(-180.0, 0.0), MapProjection::Utm { zone: 1, south: false });
        assert_eq!(MapProjection::utm_for(180.0, 0.0), MapProjection::Utm { zone: 60, south: false });
    }

    #[test]
    fn test_from_epsg() {
        assert_eq!(
            MapProjection::from_epsg(32634).unwrap(),
            MapProjection::Utm { zone: 34, south: false }
        );
        assert_eq!(
            MapProjection::from_epsg(32734).unwrap(),
            MapProjection::Utm { zone: 34, south: true }
        );
        assert_eq!(MapProjection::from_epsg(4326).unwrap(), MapProjection::Geographic);
        assert!(matches!(
            MapProjection::from_epsg(3857),
            Err(PlaiceError::ProjectionResolution(_))
        ));
    }

    #[test]
    fn test_forward_on_central_meridian() {
        // Equator on the central meridian of zone 31 (3E) is exactly the false easting
        let p = MapProjection::Utm { zone: 31, south: false };
        let (x, y) = p.forward(3.0, 0.0);
        assert_relative_eq!(x, 500_000.0, epsilon = 1e-6);
        assert_relative_eq!(y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_forward_known_point() {
        // Zone 34 (central meridian 21E), 0.75 degrees west of it at lat 10.25
        let p = MapProjection::Utm { zone: 34, south: false };
        let (x, y) = p.forward(20.25, 10.25);
        // ~82 km west of the central meridian, ~1134 km north of the equator
        assert!(x > 410_000.0 && x < 425_000.0, "easting {} out of range", x);
        assert!(y > 1_125_000.0 && y < 1_140_000.0, "northing {} out of range", y);
    }

    #[test]
    fn test_forward_southern_false_northing() {
        let north = MapProjection::Utm { zone: 34, south: false };
        let south = MapProjection::Utm { zone: 34, south: true };
        let (_, yn) = north.forward(21.0, -5.0);
        let (_, ys) = south.forward(21.0, -5.0);
        assert_relative_eq!(ys - yn, UTM_FALSE_NORTHING, epsilon = 1e-6);
        assert!(ys > 0.0);
    }

    #[test]
    fn test_geographic_is_identity() {
        let (x, y) = MapProjection::Geographic.forward(20.25, 10.25);
        assert_eq!((x, y), (20.25, 10.25));
    }
}
