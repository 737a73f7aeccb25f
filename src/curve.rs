use crate::error::{ScheduleError, ScheduleResult};
use serde::{Deserialize, Serialize};

/// One measured point of a dose's absorption profile: efficacy percent
/// reached after `minutes` of elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub minutes: f64,
    pub percent: f64,
}

/// Absorption/efficacy-over-time profile for a single dose.
///
/// With data points, efficacy is piecewise-linear between them. Without
/// data (`points` absent), the dose counts as fully effective the moment
/// it is reached and time-to-efficacy falls back to linear scaling over
/// the optimal offset.
#[derive(Debug, Clone)]
pub struct EfficacyCurve {
    points: Option<Vec<CurvePoint>>,
    min_offset_minutes: f64,
    optimal_offset_minutes: f64,
}

/// JS-style rounding: halves go up.
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

impl EfficacyCurve {
    pub fn new(
        points: Option<Vec<CurvePoint>>,
        min_offset_minutes: f64,
        optimal_offset_minutes: f64,
    ) -> ScheduleResult<Self> {
        if min_offset_minutes < 0.0 || optimal_offset_minutes < 0.0 {
            return Err(ScheduleError::InvalidDose(
                "offset minutes must be non-negative".to_string(),
            ));
        }

        if let Some(pts) = &points {
            if pts.is_empty() {
                return Err(ScheduleError::InvalidDose(
                    "efficacy points declared but empty".to_string(),
                ));
            }
            for window in pts.windows(2) {
                if window[1].minutes <= window[0].minutes {
                    return Err(ScheduleError::InvalidDose(format!(
                        "efficacy point times must be strictly increasing ({} then {})",
                        window[0].minutes, window[1].minutes
                    )));
                }
            }
            for point in pts {
                if point.minutes < 0.0 {
                    return Err(ScheduleError::InvalidDose(
                        "efficacy point time must be non-negative".to_string(),
                    ));
                }
                if !(0.0..=100.0).contains(&point.percent) {
                    return Err(ScheduleError::InvalidDose(format!(
                        "efficacy percent {} outside [0, 100]",
                        point.percent
                    )));
                }
            }
        }

        Ok(Self {
            points,
            min_offset_minutes,
            optimal_offset_minutes,
        })
    }

    pub fn has_points(&self) -> bool {
        self.points.is_some()
    }

    pub fn min_offset_minutes(&self) -> f64 {
        self.min_offset_minutes
    }

    /// Efficacy percent at `elapsed_minutes` since the dose's anchor.
    ///
    /// Before the first point (including negative elapsed) the dose is at 0%;
    /// at or beyond the last point it holds the last value; in between the
    /// value is linearly interpolated and rounded to the nearest percent.
    pub fn efficacy_at(&self, elapsed_minutes: f64) -> u8 {
        let points = match &self.points {
            Some(pts) => pts,
            None => return 100,
        };

        let first = points[0];
        let last = points[points.len() - 1];

        if elapsed_minutes < first.minutes {
            return 0;
        }
        if elapsed_minutes >= last.minutes {
            return round_half_up(last.percent) as u8;
        }

        for window in points.windows(2) {
            let (p1, p2) = (window[0], window[1]);
            if elapsed_minutes >= p1.minutes && elapsed_minutes < p2.minutes {
                // y = y1 + (x - x1) * (y2 - y1) / (x2 - x1)
                let interpolated = p1.percent
                    + (elapsed_minutes - p1.minutes) * (p2.percent - p1.percent)
                        / (p2.minutes - p1.minutes);
                return round_half_up(interpolated) as u8;
            }
        }

        0
    }

    /// Minutes of waiting needed to reach `target_percent` efficacy,
    /// floored at the dose's minimum offset.
    pub fn time_for_efficacy(&self, target_percent: f64) -> i64 {
        let min_offset = round_half_up(self.min_offset_minutes) as i64;

        let points = match &self.points {
            Some(pts) => pts,
            None => {
                // Linear scale between 0 minutes (0%) and the optimal offset (100%).
                let span = if self.optimal_offset_minutes > 0.0 {
                    self.optimal_offset_minutes
                } else {
                    self.min_offset_minutes
                };
                let minutes = round_half_up(target_percent / 100.0 * span) as i64;
                return minutes.max(min_offset);
            }
        };

        let first = points[0];
        let last = points[points.len() - 1];

        if target_percent <= first.percent {
            return (round_half_up(first.minutes) as i64).max(min_offset);
        }
        if target_percent >= last.percent {
            return (round_half_up(last.minutes) as i64).max(min_offset);
        }

        for window in points.windows(2) {
            let (p1, p2) = (window[0], window[1]);
            if target_percent >= p1.percent && target_percent <= p2.percent {
                if p2.percent <= p1.percent {
                    return (round_half_up(p1.minutes) as i64).max(min_offset);
                }
                let minutes = p1.minutes
                    + (target_percent - p1.percent) * (p2.minutes - p1.minutes)
                        / (p2.percent - p1.percent);
                return (round_half_up(minutes) as i64).max(min_offset);
            }
        }

        (round_half_up(last.minutes) as i64).max(min_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_curve() -> EfficacyCurve {
        EfficacyCurve::new(
            Some(vec![
                CurvePoint {
                    minutes: 0.0,
                    percent: 60.0,
                },
                CurvePoint {
                    minutes: 10.0,
                    percent: 75.0,
                },
                CurvePoint {
                    minutes: 20.0,
                    percent: 88.0,
                },
                CurvePoint {
                    minutes: 30.0,
                    percent: 100.0,
                },
            ]),
            0.0,
            30.0,
        )
        .unwrap()
    }

    #[test]
    fn test_efficacy_before_first_point() {
        assert_eq!(test_curve().efficacy_at(-5.0), 0);
    }

    #[test]
    fn test_efficacy_exact_points() {
        let curve = test_curve();
        assert_eq!(curve.efficacy_at(0.0), 60);
        assert_eq!(curve.efficacy_at(10.0), 75);
        assert_eq!(curve.efficacy_at(30.0), 100);
    }

    #[test]
    fn test_efficacy_interpolation() {
        let curve = test_curve();
        // (60 + 75) / 2 = 67.5, half rounds up
        assert_eq!(curve.efficacy_at(5.0), 68);
        assert_eq!(curve.efficacy_at(15.0), 82);
    }

    #[test]
    fn test_efficacy_beyond_last_point() {
        let curve = test_curve();
        assert_eq!(curve.efficacy_at(40.0), 100);
        assert_eq!(curve.efficacy_at(60.0), 100);
    }

    #[test]
    fn test_efficacy_without_points() {
        let curve = EfficacyCurve::new(None, 0.0, 30.0).unwrap();
        assert_eq!(curve.efficacy_at(15.0), 100);
        assert_eq!(curve.efficacy_at(-1.0), 100);
    }

    #[test]
    fn test_time_for_efficacy_clamps() {
        let curve = test_curve();
        assert_eq!(curve.time_for_efficacy(50.0), 0); // 50 <= 60, first point
        assert_eq!(curve.time_for_efficacy(100.0), 30);
        assert_eq!(curve.time_for_efficacy(120.0), 30);
    }

    #[test]
    fn test_time_for_efficacy_inverse_interpolation() {
        let curve = test_curve();
        assert_eq!(curve.time_for_efficacy(75.0), 10);
        // Halfway between 75% and 88% lands halfway between 10 and 20 minutes.
        assert_eq!(curve.time_for_efficacy(81.5), 15);
    }

    #[test]
    fn test_time_for_efficacy_min_offset_floor() {
        let curve = EfficacyCurve::new(
            Some(vec![
                CurvePoint {
                    minutes: 0.0,
                    percent: 60.0,
                },
                CurvePoint {
                    minutes: 30.0,
                    percent: 100.0,
                },
            ]),
            5.0,
            30.0,
        )
        .unwrap();
        assert_eq!(curve.time_for_efficacy(50.0), 5);
    }

    #[test]
    fn test_time_for_efficacy_fallback_scaling() {
        let curve = EfficacyCurve::new(None, 0.0, 100.0).unwrap();
        assert_eq!(curve.time_for_efficacy(50.0), 50);
        assert_eq!(curve.time_for_efficacy(100.0), 100);

        let floored = EfficacyCurve::new(None, 30.0, 60.0).unwrap();
        assert_eq!(floored.time_for_efficacy(10.0), 30);
    }

    #[test]
    fn test_round_trip_within_rounding_tolerance() {
        let curve = test_curve();
        for target in [65, 70, 80, 90, 95] {
            let minutes = curve.time_for_efficacy(target as f64);
            let back = curve.efficacy_at(minutes as f64) as i32;
            assert!(
                (back - target).abs() <= 1,
                "target {} came back as {}",
                target,
                back
            );
        }
    }

    #[test]
    fn test_time_for_efficacy_monotonic() {
        let curve = test_curve();
        let mut previous = i64::MIN;
        for target in 0..=100 {
            let minutes = curve.time_for_efficacy(target as f64);
            assert!(minutes >= previous, "non-monotonic at target {}", target);
            previous = minutes;
        }
    }

    #[test]
    fn test_empty_points_rejected() {
        let result = EfficacyCurve::new(Some(vec![]), 0.0, 30.0);
        assert!(matches!(result, Err(ScheduleError::InvalidDose(_))));
    }

    #[test]
    fn test_non_increasing_points_rejected() {
        let result = EfficacyCurve::new(
            Some(vec![
                CurvePoint {
                    minutes: 10.0,
                    percent: 50.0,
                },
                CurvePoint {
                    minutes: 10.0,
                    percent: 80.0,
                },
            ]),
            0.0,
            30.0,
        );
        assert!(matches!(result, Err(ScheduleError::InvalidDose(_))));
    }

    #[test]
    fn test_percent_out_of_range_rejected() {
        let result = EfficacyCurve::new(
            Some(vec![CurvePoint {
                minutes: 0.0,
                percent: 120.0,
            }]),
            0.0,
            30.0,
        );
        assert!(matches!(result, Err(ScheduleError::InvalidDose(_))));
    }
}
