use crate::error::{ConvertError, Result};

/// Conversion from a projected EPSG CRS to WGS84 longitude/latitude.
pub struct Projection {
    epsg: u32,
    proj: proj::Proj,
}

impl Projection {
    pub fn to_wgs84(epsg: u32) -> Result<Self> {
        let from = format!("EPSG:{epsg}");
        let proj = proj::Proj::new_known_crs(&from, "EPSG:4326", None).map_err(|e| {
            ConvertError::Projection(format!(
                "Failed to create projection from {from} to WGS84: {e}"
            ))
        })?;
        Ok(Self { epsg, proj })
    }

    /// Returns `(longitude, latitude)` in degrees.
    pub fn convert(&self, easting: f64, northing: f64) -> Result<(f64, f64)> {
        self.proj.convert((easting, northing)).map_err(|e| {
            ConvertError::Projection(format!(
                "EPSG:{} projection failed at ({easting}, {northing}): {e}",
                self.epsg
            ))
        })
    }
}

impl std::fmt::Debug for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projection").field("epsg", &self.epsg).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utm_zone_36n_to_wgs84() {
        // UTM zone 36N central meridian = 33°E
        let p = Projection::to_wgs84(32636).unwrap();
        let (lon, lat) = p.convert(500_000.0, 0.0).unwrap();
        assert!(
            (lon - 33.0).abs() < 0.01,
            "longitude {lon} should be near 33.0"
        );
        assert!(lat.abs() < 0.01, "latitude {lat} should be near 0.0");
    }

    #[test]
    fn utm_zone_36n_known_offset() {
        let p = Projection::to_wgs84(32636).unwrap();
        let (lon, lat) = p.convert(772_598.0, 3_575_069.0).unwrap();
        assert!(lon > 30.0 && lon < 40.0, "longitude {lon} out of range");
        assert!(lat > 30.0 && lat < 35.0, "latitude {lat} out of range");
    }

    #[test]
    fn invalid_epsg_returns_error() {
        let err = Projection::to_wgs84(99999).unwrap_err();
        assert!(matches!(err, ConvertError::Projection(_)));
    }
}
