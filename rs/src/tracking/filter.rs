use crate::core::config::FilterOptions;
use crate::core::types::{FilteredPosition, Point, PositionSample};
use crate::spatial::geometry::{calculate_bearing, destination_point, distance_meters};
use crate::spatial::search::SnapIndex;

#[derive(Debug, Clone, Copy)]
struct Fix {
    point: Point,
    timestamp_ms: u64,
}

/// Turns a raw position stream into positions worth acting on.
///
/// Inaccurate samples are replaced by a dead-reckoned estimate when one is
/// plausible; accurate samples that barely moved are dropped as jitter.
/// With an active route, the emitted position is snapped onto it while the
/// speed and heading state keeps following the raw fixes.
#[derive(Debug, Clone)]
pub struct PositionFilter {
    options: FilterOptions,
    last_good: Option<Fix>,
    estimated_speed: f64,
    heading: Option<f64>,
}

impl PositionFilter {
    pub fn new(options: FilterOptions) -> Self {
        PositionFilter {
            options,
            last_good: None,
            estimated_speed: 0.0,
            heading: None,
        }
    }

    pub fn process(
        &mut self,
        sample: &PositionSample,
        route: Option<&SnapIndex>,
    ) -> Option<FilteredPosition> {
        let point = match Point::new(sample.latitude, sample.longitude) {
            Ok(point) => point,
            Err(e) => {
                log::debug!("Dropping position sample: {}", e);
                return None;
            }
        };

        if !sample.accuracy.is_finite() || sample.accuracy > self.options.max_accuracy_m {
            let estimate = self.dead_reckon(sample)?;
            return Some(self.emit(estimate, true, route));
        }

        match self.last_good {
            None => {
                self.estimated_speed = sample.speed.filter(|s| s.is_finite() && *s >= 0.0).unwrap_or(0.0);
                self.heading = sample.heading;
            }
            Some(prev) => {
                let moved = distance_meters(&prev.point, &point);
                if moved < self.options.min_movement_m {
                    log::trace!("Ignoring {:.1} m of jitter", moved);
                    return None;
                }

                let elapsed = sample.timestamp_ms.saturating_sub(prev.timestamp_ms) as f64 / 1000.0;
                if elapsed > 0.0 {
                    let smoothing = self.options.speed_smoothing;
                    self.estimated_speed =
                        smoothing * self.estimated_speed + (1.0 - smoothing) * (moved / elapsed);
                }
                self.heading = sample
                    .heading
                    .or_else(|| Some(calculate_bearing(&prev.point, &point)));
            }
        }

        self.last_good = Some(Fix {
            point,
            timestamp_ms: sample.timestamp_ms,
        });

        Some(self.emit(point, false, route))
    }

    fn dead_reckon(&self, sample: &PositionSample) -> Option<Point> {
        let prev = self.last_good?;
        let heading = sample.heading.or(self.heading)?;

        let elapsed = sample.timestamp_ms.saturating_sub(prev.timestamp_ms) as f64 / 1000.0;
        let distance = self.estimated_speed * elapsed;
        if distance >= self.options.dead_reckoning_cap_m {
            log::debug!(
                "Dropping inaccurate sample ({:.0} m): extrapolation of {:.0} m exceeds cap",
                sample.accuracy,
                distance
            );
            return None;
        }

        Some(destination_point(&prev.point, heading, distance))
    }

    fn emit(&self, point: Point, dead_reckoned: bool, route: Option<&SnapIndex>) -> FilteredPosition {
        let projection = route.and_then(|index| index.project(&point, self.options.snap_threshold_m));

        FilteredPosition {
            point: projection.map_or(point, |projection| projection.point),
            heading: self.heading,
            snapped: projection.is_some(),
            dead_reckoned,
        }
    }

    /// Last accepted raw fix, unsnapped.
    pub fn raw_position(&self) -> Option<Point> {
        self.last_good.map(|fix| fix.point)
    }

    pub fn estimated_speed(&self) -> f64 {
        self.estimated_speed
    }

    pub fn heading(&self) -> Option<f64> {
        self.heading
    }

    pub fn reset(&mut self) {
        self.last_good = None;
        self.estimated_speed = 0.0;
        self.heading = None;
    }
}
