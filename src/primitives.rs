//! Points, bounding boxes, and the haversine distance used everywhere else
//! in this crate.

use geo::algorithm::{Bearing, Distance};
use geo::{Haversine, Point as GeoPoint, Rhumb};

/// A latitude/longitude pair in degrees.
///
/// Invariant: `-90 <= lat <= 90`, `-180 <= lon <= 180`. Equality is
/// bit-exact on the stored `f64`s; use [`Point::approx_eq`] for a
/// tolerance-based comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Point {
    /// Build a point, clamping both components into their valid ranges.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: lat.clamp(-90.0, 90.0),
            lon: lon.clamp(-180.0, 180.0),
        }
    }

    /// Great-circle distance to `other`, in kilometers, using the given
    /// earth radius (see [`crate::config::QueryConfig::earth_radius_km`]).
    pub fn distance_km(&self, other: &Point, earth_radius_km: f64) -> f64 {
        let scale = earth_radius_km / EARTH_RADIUS_KM_GEO;
        Haversine.distance(self.to_geo(), other.to_geo()) / 1000.0 * scale
    }

    /// Rhumb bearing from this point to `other`, in degrees clockwise
    /// from north. A convenience on top of [`Point::distance_km`]; not
    /// load-bearing for any covering or ordering invariant.
    pub fn bearing_to(&self, other: &Point) -> f64 {
        Rhumb.bearing(self.to_geo(), other.to_geo())
    }

    /// Tolerance-based equality, in degrees.
    pub fn approx_eq(&self, other: &Point, tolerance_deg: f64) -> bool {
        (self.lat - other.lat).abs() <= tolerance_deg && (self.lon - other.lon).abs() <= tolerance_deg
    }

    fn to_geo(self) -> GeoPoint<f64> {
        GeoPoint::new(self.lon, self.lat)
    }
}

/// `geo`'s `Haversine` uses its own internal earth radius; we rescale its
/// output by the ratio of the configured radius to this constant rather
/// than reimplementing the trig ourselves.
const EARTH_RADIUS_KM_GEO: f64 = 6371.0088;

/// An axis-aligned box in lat/lon space that may wrap the antimeridian.
///
/// Longitude wrap is legal and signalled by `southwest.lon > northeast.lon`;
/// the box then spans `[sw.lon, 180] ∪ [-180, ne.lon]`. Latitude never
/// wraps: `southwest.lat <= northeast.lat` always.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southwest corner.
    pub southwest: Point,
    /// Northeast corner.
    pub northeast: Point,
}

impl BoundingBox {
    /// Build a box from explicit corners, clamping latitude into range
    /// (`sw.lat <= ne.lat` is the caller's responsibility; the two lats
    /// are not reordered here because the box's wrap status is carried
    /// entirely in longitude).
    pub fn new(southwest: Point, northeast: Point) -> Self {
        Self {
            southwest,
            northeast,
        }
    }

    /// Whether this box wraps the antimeridian.
    pub fn wraps(&self) -> bool {
        self.southwest.lon > self.northeast.lon
    }

    /// Whether `p` falls within this box.
    pub fn contains(&self, p: &Point) -> bool {
        let lat_ok = self.southwest.lat <= p.lat && p.lat <= self.northeast.lat;
        if !lat_ok {
            return false;
        }
        if self.wraps() {
            p.lon >= self.southwest.lon || p.lon <= self.northeast.lon
        } else {
            self.southwest.lon <= p.lon && p.lon <= self.northeast.lon
        }
    }

    /// Build a box covering a spherical cap, expanding the center by
    /// `radius_km` in both axes, with pole and date-line handling.
    ///
    /// Latitude expands by `radius_km / 111.0` degrees. Longitude expands
    /// by `radius_km / (111.0 * cos(lat))` degrees, which blows up near
    /// the poles. When the latitude expansion reaches a pole, the box
    /// becomes longitude-full (`[-180, 180]`) instead of attempting a
    /// meaningless longitude delta.
    pub fn from_center_radius(center: &Point, radius_km: f64) -> Self {
        const KM_PER_DEGREE_LAT: f64 = 111.0;

        let lat_delta = radius_km / KM_PER_DEGREE_LAT;
        let south_lat = center.lat - lat_delta;
        let north_lat = center.lat + lat_delta;

        if south_lat <= -90.0 || north_lat >= 90.0 {
            return Self {
                southwest: Point::new(south_lat.max(-90.0), -180.0),
                northeast: Point::new(north_lat.min(90.0), 180.0),
            };
        }

        let cos_lat = center.lat.to_radians().cos().abs().max(f64::EPSILON);
        let lon_delta = radius_km / (KM_PER_DEGREE_LAT * cos_lat);

        if lon_delta >= 180.0 {
            return Self {
                southwest: Point::new(south_lat, -180.0),
                northeast: Point::new(north_lat, 180.0),
            };
        }

        let mut west_lon = center.lon - lon_delta;
        let mut east_lon = center.lon + lon_delta;

        // Normalize into [-180, 180], preserving wrap if the expansion
        // crossed the antimeridian on either side.
        west_lon = normalize_lon(west_lon);
        east_lon = normalize_lon(east_lon);

        Self {
            southwest: Point::new(south_lat, west_lon),
            northeast: Point::new(north_lat, east_lon),
        }
    }

    /// Approximate geometric center, handling antimeridian wrap via a
    /// circular mean of longitude.
    pub(crate) fn center(&self) -> Point {
        let lat = (self.southwest.lat + self.northeast.lat) / 2.0;
        let lon = if self.wraps() {
            let span = (self.northeast.lon + 360.0) - self.southwest.lon;
            normalize_lon(self.southwest.lon + span / 2.0)
        } else {
            (self.southwest.lon + self.northeast.lon) / 2.0
        };
        Point::new(lat, lon)
    }

    /// This box padded outward by `margin_km` on every side, used by
    /// [`crate::covering::CellCovering`] to decide when ring expansion
    /// has gone far enough past the original region.
    pub(crate) fn expanded_by_km(&self, margin_km: f64) -> Self {
        const KM_PER_DEGREE_LAT: f64 = 111.0;
        let lat_delta = margin_km / KM_PER_DEGREE_LAT;
        let south_lat = (self.southwest.lat - lat_delta).max(-90.0);
        let north_lat = (self.northeast.lat + lat_delta).min(90.0);

        if south_lat <= -89.9999 || north_lat >= 89.9999 {
            return Self {
                southwest: Point::new(south_lat, -180.0),
                northeast: Point::new(north_lat, 180.0),
            };
        }

        let cos_lat = self
            .southwest
            .lat
            .min(self.northeast.lat)
            .abs()
            .to_radians()
            .cos()
            .abs()
            .max(f64::EPSILON);
        let lon_delta = margin_km / (KM_PER_DEGREE_LAT * cos_lat);

        Self {
            southwest: Point::new(south_lat, normalize_lon(self.southwest.lon - lon_delta)),
            northeast: Point::new(north_lat, normalize_lon(self.northeast.lon + lon_delta)),
        }
    }
}

pub(crate) fn normalize_lon(lon: f64) -> f64 {
    let mut x = lon;
    while x > 180.0 {
        x -= 360.0;
    }
    while x < -180.0 {
        x += 360.0;
    }
    x
}
