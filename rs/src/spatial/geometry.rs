use crate::core::types::Point;

pub const EARTH_RADIUS: f64 = 6371000.0;

/// Projections farther than this from the polyline are not considered on it.
pub const MAX_PROJECTION_DISTANCE: f64 = 50.0;

const METERS_PER_MILE: f64 = 1609.344;
const FEET_PER_METER: f64 = 3.28084;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub point: Point,
    pub segment_index: usize,
    pub distance_m: f64,
    pub distance_along_m: f64,
}

pub fn distance_meters(a: &Point, b: &Point) -> f64 {
    let lat1_rad = a.latitude().to_radians();
    let lat2_rad = b.latitude().to_radians();

    let dlat = lat2_rad - lat1_rad;
    let dlon = (b.longitude() - a.longitude()).to_radians();

    let h =
        (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS * c
}

/// Initial bearing from `a` to `b` in degrees, `[0, 360)`.
pub fn calculate_bearing(a: &Point, b: &Point) -> f64 {
    let lat1_rad = a.latitude().to_radians();
    let lat2_rad = b.latitude().to_radians();
    let dlon = (b.longitude() - a.longitude()).to_radians();

    let y = dlon.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * dlon.cos();

    let mut bearing_deg = y.atan2(x).to_degrees();
    if bearing_deg < 0.0 {
        bearing_deg += 360.0;
    }
    bearing_deg
}

/// Point reached by travelling `distance_m` from `origin` along `bearing_deg`.
pub fn destination_point(origin: &Point, bearing_deg: f64, distance_m: f64) -> Point {
    let angular = distance_m / EARTH_RADIUS;
    let bearing_rad = bearing_deg.to_radians();
    let lat1 = origin.latitude().to_radians();
    let lon1 = origin.longitude().to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing_rad.cos()).asin();
    let lon2 = lon1
        + (bearing_rad.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());

    Point::wrapped(lat2.to_degrees(), lon2.to_degrees())
}

pub fn polyline_length(polyline: &[Point]) -> f64 {
    polyline
        .windows(2)
        .map(|w| distance_meters(&w[0], &w[1]))
        .sum()
}

/// Nearest point on segment `a`-`b`, using a planar approximation scaled by
/// the cosine of the mean latitude. Good enough for route segments.
pub fn project_on_segment(p: &Point, a: &Point, b: &Point) -> Point {
    let cos_lat = ((a.latitude() + b.latitude()) / 2.0).to_radians().cos();

    let ab_x = (b.longitude() - a.longitude()) * cos_lat;
    let ab_y = b.latitude() - a.latitude();
    let ap_x = (p.longitude() - a.longitude()) * cos_lat;
    let ap_y = p.latitude() - a.latitude();

    let seg_len_sq = ab_x * ab_x + ab_y * ab_y;
    if seg_len_sq < 1e-20 {
        return *a;
    }

    let t = (ap_x * ab_x + ap_y * ab_y) / seg_len_sq;
    if t <= 0.0 {
        return *a;
    }
    if t >= 1.0 {
        return *b;
    }

    Point::wrapped(
        a.latitude() + t * (b.latitude() - a.latitude()),
        a.longitude() + t * (b.longitude() - a.longitude()),
    )
}

/// Nearest projection of `point` onto `polyline` regardless of distance.
/// The first segment reaching the minimum wins.
pub fn nearest_projection(point: &Point, polyline: &[Point]) -> Option<Projection> {
    match polyline {
        [] => None,
        [only] => Some(Projection {
            point: *only,
            segment_index: 0,
            distance_m: distance_meters(point, only),
            distance_along_m: 0.0,
        }),
        _ => {
            let mut best: Option<Projection> = None;
            let mut cumulative = 0.0;

            for (i, segment) in polyline.windows(2).enumerate() {
                let (a, b) = (&segment[0], &segment[1]);
                let projected = project_on_segment(point, a, b);
                let dist = distance_meters(point, &projected);

                let is_better = best.map_or(true, |prev| dist < prev.distance_m);
                if is_better {
                    best = Some(Projection {
                        point: projected,
                        segment_index: i,
                        distance_m: dist,
                        distance_along_m: cumulative + distance_meters(a, &projected),
                    });
                }

                cumulative += distance_meters(a, b);
            }

            best
        }
    }
}

pub fn project_onto_polyline(point: &Point, polyline: &[Point]) -> Option<Point> {
    nearest_projection(point, polyline)
        .filter(|projection| projection.distance_m <= MAX_PROJECTION_DISTANCE)
        .map(|projection| projection.point)
}

/// Formats a distance for imperial display: feet (rounded to 10 ft) below a
/// tenth of a mile, miles with one decimal above.
pub fn format_imperial_distance(meters: f64) -> String {
    let miles = meters / METERS_PER_MILE;
    if miles < 0.1 {
        let feet = ((meters * FEET_PER_METER) / 10.0).round() as i64 * 10;
        format!("{} ft", feet)
    } else {
        format!("{:.1} mi", miles)
    }
}
