//! Distance augmentation, uniform-grid resampling, and corner-delta
//! derivation for raw car telemetry.

use ndarray::{aview1, Array1};
use serde::{Deserialize, Serialize};

use crate::{CarSample, TrendError};

/// A raw sample augmented with cumulative lap distance in meters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DistancedSample {
    pub distance_m: f64,
    pub speed_kmh: f64,
}

/// Speed resampled onto a uniform distance grid. Both collections have the
/// same length; the grid starts at 0 and ends at the lap's maximum
/// observed distance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpeedTrace {
    pub distance_m: Vec<f64>,
    pub speed_kmh: Vec<f64>,
}

impl SpeedTrace {
    pub fn len(&self) -> usize {
        self.distance_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance_m.is_empty()
    }

    pub fn max_distance_m(&self) -> f64 {
        self.distance_m.last().copied().unwrap_or(0.0)
    }

    pub fn mean_speed_kmh(&self) -> f64 {
        aview1(&self.speed_kmh).mean().unwrap_or(0.0)
    }
}

/// Augment time-indexed samples with cumulative distance: a running sum of
/// `speed / 3.6 * dt` over the sample spacing, first sample at 0.
pub fn with_distance(samples: &[CarSample]) -> Vec<DistancedSample> {
    let mut out = Vec::with_capacity(samples.len());
    let mut total = 0.0;
    for (idx, sample) in samples.iter().enumerate() {
        if idx > 0 {
            let dt = (sample.time_s - samples[idx - 1].time_s).max(0.0);
            total += sample.speed_kmh / 3.6 * dt;
        }
        out.push(DistancedSample {
            distance_m: total,
            speed_kmh: sample.speed_kmh,
        });
    }
    out
}

/// Uniform grid of `count` points spanning `[start, stop]` inclusive.
pub fn linspace(start: f64, stop: f64, count: usize) -> Array1<f64> {
    Array1::linspace(start, stop, count)
}

/// Piecewise-linear interpolation with endpoint clamping: queries outside
/// the sample range take the nearest endpoint value. `xs` must be
/// non-decreasing and the same length as `ys`.
pub fn interp(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.is_empty() {
        return f64::NAN;
    }
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    let hi = xs.partition_point(|&v| v < x);
    let lo = hi - 1;
    let (x0, x1) = (xs[lo], xs[hi]);
    if (x1 - x0).abs() < f64::EPSILON {
        return ys[hi];
    }
    let frac = ((x - x0) / (x1 - x0)).clamp(0.0, 1.0);
    ys[lo] + (ys[hi] - ys[lo]) * frac
}

/// Resample speed onto a `points`-long uniform distance grid covering
/// `[0, max observed distance]`.
pub fn resample_speed(
    samples: &[DistancedSample],
    points: usize,
) -> Result<SpeedTrace, TrendError> {
    if samples.len() < 2 {
        return Err(TrendError::InsufficientTelemetry {
            samples: samples.len(),
        });
    }
    let xs: Vec<f64> = samples.iter().map(|s| s.distance_m).collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.speed_kmh).collect();
    let max_distance = xs.iter().copied().fold(0.0, f64::max);
    let grid = linspace(0.0, max_distance, points);
    let speed = grid.iter().map(|&x| interp(x, &xs, &ys)).collect();
    Ok(SpeedTrace {
        distance_m: grid.to_vec(),
        speed_kmh: speed,
    })
}

/// Speed relative to the trace's own mean, sampled at `corners` uniform
/// points across the trace's distance range.
pub fn corner_deltas(trace: &SpeedTrace, corners: usize) -> Vec<f64> {
    let mean = trace.mean_speed_kmh();
    let delta = (&aview1(&trace.speed_kmh) - mean).to_vec();
    linspace(0.0, trace.max_distance_m(), corners)
        .iter()
        .map(|&x| interp(x, &trace.distance_m, &delta))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_samples() -> Vec<DistancedSample> {
        (0..=10)
            .map(|i| DistancedSample {
                distance_m: i as f64 * 50.0,
                speed_kmh: 120.0 + i as f64 * 10.0,
            })
            .collect()
    }

    #[test]
    fn interp_is_linear_between_samples() {
        let xs = [0.0, 10.0];
        let ys = [100.0, 200.0];
        assert!((interp(5.0, &xs, &ys) - 150.0).abs() < 1e-12);
    }

    #[test]
    fn interp_clamps_outside_sample_range() {
        let xs = [0.0, 10.0];
        let ys = [100.0, 200.0];
        assert_eq!(interp(-5.0, &xs, &ys), 100.0);
        assert_eq!(interp(15.0, &xs, &ys), 200.0);
    }

    #[test]
    fn with_distance_integrates_speed_over_time() {
        let samples: Vec<CarSample> = (0..5)
            .map(|i| CarSample {
                time_s: i as f64,
                speed_kmh: 36.0,
            })
            .collect();
        let distanced = with_distance(&samples);
        // 36 km/h is 10 m/s, one sample per second.
        let expected = [0.0, 10.0, 20.0, 30.0, 40.0];
        for (sample, want) in distanced.iter().zip(expected) {
            assert!((sample.distance_m - want).abs() < 1e-12);
        }
    }

    #[test]
    fn resampled_grid_spans_full_distance_range() {
        let trace = resample_speed(&ramp_samples(), 3000).unwrap();
        assert_eq!(trace.len(), 3000);
        assert_eq!(trace.distance_m[0], 0.0);
        assert!((trace.max_distance_m() - 500.0).abs() < 1e-9);
        assert!(trace
            .distance_m
            .windows(2)
            .all(|pair| pair[1] > pair[0]));
    }

    #[test]
    fn resample_rejects_insufficient_telemetry() {
        let single = [DistancedSample {
            distance_m: 0.0,
            speed_kmh: 150.0,
        }];
        assert!(matches!(
            resample_speed(&single, 3000),
            Err(TrendError::InsufficientTelemetry { samples: 1 })
        ));
    }

    #[test]
    fn corner_delta_count_is_independent_of_sample_density() {
        let sparse = resample_speed(&ramp_samples()[..3], 3000).unwrap();
        let dense = resample_speed(&ramp_samples(), 3000).unwrap();
        assert_eq!(corner_deltas(&sparse, 20).len(), 20);
        assert_eq!(corner_deltas(&dense, 20).len(), 20);
    }

    #[test]
    fn delta_signal_is_mean_centered() {
        let trace = resample_speed(&ramp_samples(), 3000).unwrap();
        let mean = trace.mean_speed_kmh();
        let delta_mean = trace
            .speed_kmh
            .iter()
            .map(|speed| speed - mean)
            .sum::<f64>()
            / trace.len() as f64;
        assert!(delta_mean.abs() < 1e-9);
    }
}
