use crate::core::types::Point;
use crate::spatial::geometry::{distance_meters, project_on_segment};

/// Ramer–Douglas–Peucker simplification with a tolerance in meters.
///
/// Deviation is measured from each point to the chord between the current
/// endpoints, so the result is deterministic and simplifying twice gives the
/// same polyline.
pub fn simplify(polyline: &[Point], tolerance_m: f64) -> Vec<Point> {
    if polyline.len() <= 2 {
        return polyline.to_vec();
    }

    let mut keep = vec![false; polyline.len()];
    keep[0] = true;
    keep[polyline.len() - 1] = true;
    rdp_mark(polyline, 0, polyline.len() - 1, tolerance_m, &mut keep);

    polyline
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}

fn rdp_mark(points: &[Point], first: usize, last: usize, tolerance_m: f64, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }

    let (index, distance) = find_furthest_point(points, first, last);

    if distance > tolerance_m {
        keep[index] = true;
        rdp_mark(points, first, index, tolerance_m, keep);
        rdp_mark(points, index, last, tolerance_m, keep);
    }
}

fn find_furthest_point(points: &[Point], first: usize, last: usize) -> (usize, f64) {
    let start = &points[first];
    let end = &points[last];

    let mut max_distance = 0.0;
    let mut max_index = first;

    for (i, point) in points.iter().enumerate().take(last).skip(first + 1) {
        let distance = chord_distance(point, start, end);

        if distance > max_distance {
            max_distance = distance;
            max_index = i;
        }
    }

    (max_index, max_distance)
}

fn chord_distance(point: &Point, line_start: &Point, line_end: &Point) -> f64 {
    let foot = project_on_segment(point, line_start, line_end);
    distance_meters(point, &foot)
}
