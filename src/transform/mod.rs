pub mod ecef;
pub mod projection;

use glam::{DMat4, DVec3};
use tracing::info;

use crate::collect::CoordinateTransform;
use crate::config::Georeference;
use crate::error::Result;

use ecef::{ecef_to_enu, geodetic_to_ecef};
use projection::Projection;

/// Projected scene coordinates → local East-North-Up at the georeferenced
/// origin.
///
/// A point is shifted by the origin, projected to WGS84, lifted to ECEF and
/// expressed in the ENU frame of the origin.
#[derive(Debug)]
pub struct GeoCorrection {
    projection: Projection,
    origin: DVec3,
    ecef_to_enu: DMat4,
}

impl GeoCorrection {
    pub fn new(georef: &Georeference) -> Result<Self> {
        let projection = Projection::to_wgs84(georef.epsg)?;
        let origin = DVec3::new(georef.easting, georef.northing, georef.elevation);
        let (lon, lat) = projection.convert(origin.x, origin.y)?;
        let origin_ecef = geodetic_to_ecef(lon, lat, origin.z);

        info!(
            epsg = georef.epsg,
            lon,
            lat,
            elevation = origin.z,
            "Geodetic correction origin"
        );

        Ok(Self {
            projection,
            origin,
            ecef_to_enu: ecef_to_enu(lon, lat, origin_ecef),
        })
    }
}

impl CoordinateTransform for GeoCorrection {
    fn transform_point(&self, point: DVec3) -> Result<DVec3> {
        let projected = point + self.origin;
        let (lon, lat) = self.projection.convert(projected.x, projected.y)?;
        let ecef = geodetic_to_ecef(lon, lat, projected.z);
        Ok(self.ecef_to_enu.transform_point3(ecef))
    }
}
