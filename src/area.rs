use geo::{ConvexHull, GeodesicBearing, GeodesicDestination, MultiPoint, Point};
use itertools::Itertools;

use crate::coords::LatLon;
use crate::error::AreaError;

/// Geometry of the zone around a way where an accident is considered possible.
///
/// Every pair of the way's nodes forms a segment; each segment is stretched by
/// `extension_meters` past both ends along its own bearing, and the area is the
/// convex hull of all stretched endpoints.
pub struct WayArea<'a> {
    nodes: &'a [LatLon],
}

impl<'a> WayArea<'a> {
    pub fn new(nodes: &'a [LatLon]) -> Self {
        Self { nodes }
    }

    /// All segments between distinct node positions, `i < j`.
    pub fn segments(&self) -> Vec<(LatLon, LatLon)> {
        self.nodes.iter().copied().tuple_combinations().collect()
    }

    pub fn extended_segments(&self, extension_meters: f64) -> Vec<(LatLon, LatLon)> {
        self.segments()
            .into_iter()
            .map(|(a, b)| extend_segment(a, b, extension_meters))
            .collect()
    }

    /// Unique endpoints of the extended segments, in first-seen order.
    pub fn extended_points(&self, extension_meters: f64) -> Vec<LatLon> {
        self.extended_segments(extension_meters)
            .into_iter()
            .flat_map(|(a, b)| [a, b])
            .unique_by(|p| p.bits())
            .collect()
    }

    /// Closed hull ring (first point repeated at the end) as `[lat, lon]` pairs.
    pub fn accident_area(&self, extension_meters: f64) -> Result<Vec<LatLon>, AreaError> {
        if !extension_meters.is_finite() || extension_meters < 0.0 {
            return Err(AreaError::InvalidExtension(extension_meters));
        }

        let distinct = self.nodes.iter().unique_by(|p| p.bits()).count();
        if distinct < 2 {
            return Err(AreaError::Degenerate(distinct));
        }

        let points: MultiPoint<f64> = self
            .extended_points(extension_meters)
            .into_iter()
            .map(LatLon::to_point)
            .collect();

        let hull = points.convex_hull();
        let mut ring: Vec<LatLon> = hull
            .exterior()
            .points()
            .map(LatLon::from_point)
            .collect();

        if ring.first() != ring.last() {
            if let Some(&first) = ring.first() {
                ring.push(first);
            }
        }

        Ok(ring)
    }
}

/// Moves `a` backwards and `b` forwards along the initial bearing a->b.
pub fn extend_segment(a: LatLon, b: LatLon, extension_meters: f64) -> (LatLon, LatLon) {
    let pa: Point<f64> = a.to_point();
    let pb: Point<f64> = b.to_point();

    let forward = pa.geodesic_bearing(pb);
    let backward = (forward + 180.0) % 360.0;

    let ea = pa.geodesic_destination(backward, extension_meters);
    let eb = pb.geodesic_destination(forward, extension_meters);

    (LatLon::from_point(ea), LatLon::from_point(eb))
}
