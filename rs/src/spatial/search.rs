use crate::core::types::Point;
use crate::spatial::geometry::{
    distance_meters, nearest_projection, project_on_segment, Projection,
};
use rstar::{RTree, RTreeObject, AABB};

const METERS_PER_DEGREE: f64 = 111_195.0;
const ENVELOPE_MARGIN: f64 = 1.1;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEnvelope {
    pub segment_index: usize,
    pub envelope: AABB<[f64; 2]>,
}

impl RTreeObject for SegmentEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope.clone()
    }
}

/// R-tree over the segments of one route polyline, built once per route so
/// each position sample only looks at nearby segments.
#[derive(Debug, Clone)]
pub struct SnapIndex {
    polyline: Vec<Point>,
    cumulative: Vec<f64>,
    rtree: RTree<SegmentEnvelope>,
}

impl SnapIndex {
    pub fn new(polyline: &[Point]) -> Self {
        let mut cumulative = Vec::with_capacity(polyline.len());
        let mut total = 0.0;
        for (i, point) in polyline.iter().enumerate() {
            if i > 0 {
                total += distance_meters(&polyline[i - 1], point);
            }
            cumulative.push(total);
        }

        let envelopes: Vec<SegmentEnvelope> = polyline
            .windows(2)
            .enumerate()
            .map(|(segment_index, w)| SegmentEnvelope {
                segment_index,
                envelope: AABB::from_corners(
                    [w[0].longitude(), w[0].latitude()],
                    [w[1].longitude(), w[1].latitude()],
                ),
            })
            .collect();

        SnapIndex {
            polyline: polyline.to_vec(),
            cumulative,
            rtree: RTree::bulk_load(envelopes),
        }
    }

    pub fn polyline(&self) -> &[Point] {
        &self.polyline
    }

    pub fn total_length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Nearest projection within `max_distance_m`; same answer as a linear
    /// scan, first segment wins ties.
    pub fn project(&self, point: &Point, max_distance_m: f64) -> Option<Projection> {
        if self.polyline.len() < 2 {
            return nearest_projection(point, &self.polyline)
                .filter(|projection| projection.distance_m <= max_distance_m);
        }

        let query = query_envelope(point, max_distance_m);
        let mut best: Option<Projection> = None;

        for candidate in self.rtree.locate_in_envelope_intersecting(&query) {
            let i = candidate.segment_index;
            let (a, b) = (&self.polyline[i], &self.polyline[i + 1]);
            let projected = project_on_segment(point, a, b);
            let dist = distance_meters(point, &projected);
            if dist > max_distance_m {
                continue;
            }

            let is_better = best.map_or(true, |prev| {
                dist < prev.distance_m || (dist == prev.distance_m && i < prev.segment_index)
            });
            if is_better {
                best = Some(Projection {
                    point: projected,
                    segment_index: i,
                    distance_m: dist,
                    distance_along_m: self.cumulative[i] + distance_meters(a, &projected),
                });
            }
        }

        best
    }

    /// Linear scan for the nearest projection on segments from
    /// `first_segment` on, ignoring distance. Used to place maneuver points
    /// in route order.
    pub fn project_from(&self, point: &Point, first_segment: usize) -> Option<Projection> {
        if self.polyline.len() < 2 {
            return nearest_projection(point, &self.polyline);
        }
        let first_segment = first_segment.min(self.polyline.len() - 2);
        nearest_projection(point, &self.polyline[first_segment..]).map(|projection| Projection {
            segment_index: projection.segment_index + first_segment,
            distance_along_m: projection.distance_along_m + self.cumulative[first_segment],
            ..projection
        })
    }
}

fn query_envelope(point: &Point, radius_m: f64) -> AABB<[f64; 2]> {
    let dlat = radius_m * ENVELOPE_MARGIN / METERS_PER_DEGREE;
    let cos_lat = point.latitude().to_radians().cos().max(1e-6);
    let dlon = (dlat / cos_lat).min(360.0);

    AABB::from_corners(
        [point.longitude() - dlon, point.latitude() - dlat],
        [point.longitude() + dlon, point.latitude() + dlat],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::geometry::{project_onto_polyline, MAX_PROJECTION_DISTANCE};

    fn pt(lat: f64, lon: f64) -> Point {
        Point::new(lat, lon).unwrap()
    }

    fn route() -> Vec<Point> {
        vec![
            pt(51.5000, -0.1000),
            pt(51.5000, -0.0950),
            pt(51.5040, -0.0950),
            pt(51.5040, -0.0900),
        ]
    }

    #[test]
    fn matches_linear_scan() {
        let line = route();
        let index = SnapIndex::new(&line);
        let probes = [
            pt(51.5002, -0.0970),
            pt(51.5020, -0.0948),
            pt(51.5041, -0.0920),
            pt(51.5100, -0.0920),
            pt(51.5000, -0.1003),
        ];
        for probe in probes {
            let indexed = index
                .project(&probe, MAX_PROJECTION_DISTANCE)
                .map(|projection| projection.point);
            assert_eq!(indexed, project_onto_polyline(&probe, &line), "{probe:?}");
        }
    }

    #[test]
    fn reports_distance_along() {
        let line = route();
        let index = SnapIndex::new(&line);
        let projection = index
            .project(&pt(51.5020, -0.0950), MAX_PROJECTION_DISTANCE)
            .unwrap();
        assert_eq!(projection.segment_index, 1);
        let first_leg = distance_meters(&line[0], &line[1]);
        assert!(projection.distance_along_m > first_leg);
        assert!(projection.distance_along_m < index.total_length());
    }

    #[test]
    fn project_from_skips_earlier_segments() {
        // Out and back: the turnaround's return leg is only found when the
        // scan starts past the first segment.
        let line = vec![pt(51.5, -0.1), pt(51.5, -0.09), pt(51.5, -0.1)];
        let index = SnapIndex::new(&line);
        let probe = pt(51.5, -0.1);
        assert_eq!(index.project_from(&probe, 0).unwrap().segment_index, 0);
        let later = index.project_from(&probe, 1).unwrap();
        assert_eq!(later.segment_index, 1);
        assert!(later.distance_along_m > distance_meters(&line[0], &line[1]));
    }

    #[test]
    fn single_point_route() {
        let index = SnapIndex::new(&[pt(51.5, -0.1)]);
        assert!(index.project(&pt(51.5001, -0.1), 50.0).is_some());
        assert!(index.project(&pt(51.6, -0.1), 50.0).is_none());
        assert_eq!(index.total_length(), 0.0);
    }
}
