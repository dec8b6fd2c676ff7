//! Core cross-season qualifying trend computation library.
//!
//! Walks an ordered season/round configuration, loads each qualifying
//! session through a [`SessionSource`], selects the target driver's
//! fastest lap, and derives the per-season metrics (lap time, sector
//! splits, distance-resampled speed trace, corner deltas) into an
//! index-aligned [`TrendReport`].

mod session;
mod trace;

pub use session::{CarSample, Lap, Session, SessionSource, SourceError};
pub use trace::{
    corner_deltas, interp, linspace, resample_speed, with_distance, DistancedSample, SpeedTrace,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Resampled speed trace length.
pub const TRACE_POINTS: usize = 3000;
/// Fixed corner count standing in for corner locations.
pub const NUM_CORNERS: usize = 20;

#[derive(Error, Debug)]
pub enum TrendError {
    #[error("telemetry has too few samples to resample ({samples})")]
    InsufficientTelemetry { samples: usize },
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// One entry of the static season -> event-round configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeasonRound {
    pub season: u16,
    pub round: u32,
}

#[derive(Clone, Debug)]
pub struct TrendParams {
    /// Target driver code (three-letter acronym).
    pub driver: String,
    /// Ordered season/round entries; output collections follow this order.
    pub rounds: Vec<SeasonRound>,
    pub trace_points: usize,
    pub corner_count: usize,
}

impl TrendParams {
    pub fn new(driver: impl Into<String>, rounds: Vec<SeasonRound>) -> Self {
        Self {
            driver: driver.into(),
            rounds,
            trace_points: TRACE_POINTS,
            corner_count: NUM_CORNERS,
        }
    }
}

/// Why a season was excluded from the report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The provider failed while requesting or decoding the session.
    LoadFailed(String),
    /// The session loaded but held no usable lap for the target driver.
    NoFastestLap,
}

/// All metrics one season contributes, extracted together so the report
/// append stays atomic.
#[derive(Clone, Debug)]
pub struct SeasonMetrics {
    pub lap_time_s: f64,
    pub sector_times_s: [f64; 3],
    pub trace: SpeedTrace,
    pub corner_deltas: Vec<f64>,
}

/// Cross-season collections, mutually aligned by index: position `i` in
/// every collection refers to the same season. A season contributes to all
/// of them or to none.
#[derive(Clone, Debug, Default)]
pub struct TrendReport {
    pub seasons: Vec<u16>,
    pub lap_times_s: Vec<f64>,
    pub sector_times_s: Vec<[f64; 3]>,
    pub speed_traces: Vec<SpeedTrace>,
    pub corner_deltas: Vec<Vec<f64>>,
    pub skipped: Vec<(SeasonRound, SkipReason)>,
}

impl TrendReport {
    pub fn push(&mut self, season: u16, metrics: SeasonMetrics) {
        self.seasons.push(season);
        self.lap_times_s.push(metrics.lap_time_s);
        self.sector_times_s.push(metrics.sector_times_s);
        self.speed_traces.push(metrics.trace);
        self.corner_deltas.push(metrics.corner_deltas);
    }

    pub fn len(&self) -> usize {
        self.seasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty()
    }
}

/// Derive one season's metrics from its fastest lap and raw car data.
pub fn extract_metrics(
    lap: &Lap,
    samples: &[CarSample],
    params: &TrendParams,
) -> Result<SeasonMetrics, TrendError> {
    let distanced = with_distance(samples);
    let trace = resample_speed(&distanced, params.trace_points)?;
    let deltas = corner_deltas(&trace, params.corner_count);
    Ok(SeasonMetrics {
        lap_time_s: lap.time_s,
        sector_times_s: lap.sector_times_s,
        trace,
        corner_deltas: deltas,
    })
}

/// Single sequential pass over the configured seasons.
///
/// A session-load failure is logged and recorded as a skip; a session
/// without a fastest lap for the driver is recorded silently. Telemetry
/// failures after a fastest lap exists propagate to the caller.
pub fn collect_trend(
    source: &dyn SessionSource,
    params: &TrendParams,
) -> Result<TrendReport, TrendError> {
    let mut report = TrendReport::default();
    for &round in &params.rounds {
        let session = match source.load_qualifying(round) {
            Ok(session) => session,
            Err(err) => {
                warn!(season = round.season, "failed to load qualifying: {err}");
                report.skipped.push((round, SkipReason::LoadFailed(err.to_string())));
                continue;
            }
        };
        let Some(lap) = session.fastest_lap(&params.driver) else {
            report.skipped.push((round, SkipReason::NoFastestLap));
            continue;
        };
        let samples = source.car_data(&session, lap)?;
        let metrics = extract_metrics(lap, &samples, params)?;
        report.push(round.season, metrics);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    struct StubSource {
        fail_seasons: Vec<u16>,
        laps_by_season: HashMap<u16, Vec<Lap>>,
        samples: Vec<CarSample>,
        fail_car_data: bool,
    }

    impl StubSource {
        fn new() -> Self {
            Self {
                fail_seasons: Vec::new(),
                laps_by_season: HashMap::new(),
                samples: (0..=30)
                    .map(|i| CarSample {
                        time_s: i as f64 * 0.25,
                        speed_kmh: 180.0 + (i % 7) as f64 * 12.0,
                    })
                    .collect(),
                fail_car_data: false,
            }
        }
    }

    impl SessionSource for StubSource {
        fn load_qualifying(&self, round: SeasonRound) -> Result<Session, SourceError> {
            if self.fail_seasons.contains(&round.season) {
                return Err(SourceError::Request(format!(
                    "connection refused loading {} round {}",
                    round.season, round.round
                )));
            }
            Ok(Session {
                round,
                provider_key: round.season as i64,
                laps: self
                    .laps_by_season
                    .get(&round.season)
                    .cloned()
                    .unwrap_or_default(),
            })
        }

        fn car_data(&self, _: &Session, _: &Lap) -> Result<Vec<CarSample>, SourceError> {
            if self.fail_car_data {
                return Err(SourceError::Request("car data unavailable".to_string()));
            }
            Ok(self.samples.clone())
        }
    }

    fn lap(driver: &str, time_s: f64) -> Lap {
        Lap {
            driver: driver.to_string(),
            number: 1,
            time_s,
            sector_times_s: [time_s * 0.3, time_s * 0.4, time_s * 0.3],
            started_at: Utc::now(),
        }
    }

    fn reference_rounds() -> Vec<SeasonRound> {
        vec![
            SeasonRound {
                season: 2021,
                round: 17,
            },
            SeasonRound {
                season: 2022,
                round: 19,
            },
        ]
    }

    #[test]
    fn load_failure_skips_season_and_continues() {
        let mut source = StubSource::new();
        source.fail_seasons.push(2021);
        source.laps_by_season.insert(2022, vec![lap("VER", 93.4)]);

        let params = TrendParams::new("VER", reference_rounds());
        let report = collect_trend(&source, &params).unwrap();

        assert_eq!(report.seasons, vec![2022]);
        assert_eq!(report.len(), 1);
        assert!(matches!(
            report.skipped.as_slice(),
            [(round, SkipReason::LoadFailed(_))] if round.season == 2021
        ));
    }

    #[test]
    fn collections_stay_aligned_under_mixed_outcomes() {
        let mut source = StubSource::new();
        source.fail_seasons.push(2021);
        source.laps_by_season.insert(2022, vec![lap("HAM", 91.0)]);
        let mut rounds = reference_rounds();
        rounds.push(SeasonRound {
            season: 2023,
            round: 18,
        });
        source
            .laps_by_season
            .insert(2023, vec![lap("VER", 94.1), lap("VER", 92.6)]);

        let params = TrendParams::new("VER", rounds);
        let report = collect_trend(&source, &params).unwrap();

        assert_eq!(report.seasons.len(), report.lap_times_s.len());
        assert_eq!(report.seasons.len(), report.sector_times_s.len());
        assert_eq!(report.seasons.len(), report.speed_traces.len());
        assert_eq!(report.seasons.len(), report.corner_deltas.len());
        assert_eq!(report.seasons, vec![2023]);
        assert!((report.lap_times_s[0] - 92.6).abs() < 1e-12);
    }

    #[test]
    fn session_without_driver_laps_is_a_silent_typed_skip() {
        let mut source = StubSource::new();
        source.laps_by_season.insert(2021, vec![lap("HAM", 92.0)]);
        source.laps_by_season.insert(2022, vec![lap("VER", 93.0)]);

        let params = TrendParams::new("VER", reference_rounds());
        let report = collect_trend(&source, &params).unwrap();

        assert_eq!(report.seasons, vec![2022]);
        assert!(matches!(
            report.skipped.as_slice(),
            [(round, SkipReason::NoFastestLap)] if round.season == 2021
        ));
    }

    #[test]
    fn all_seasons_failing_yields_empty_report() {
        let mut source = StubSource::new();
        source.fail_seasons.extend([2021, 2022]);

        let params = TrendParams::new("VER", reference_rounds());
        let report = collect_trend(&source, &params).unwrap();

        assert!(report.is_empty());
        assert!(report.lap_times_s.is_empty());
        assert!(report.speed_traces.is_empty());
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn car_data_failure_terminates_the_run() {
        let mut source = StubSource::new();
        source.laps_by_season.insert(2021, vec![lap("VER", 92.0)]);
        source.fail_car_data = true;

        let params = TrendParams::new("VER", reference_rounds());
        assert!(matches!(
            collect_trend(&source, &params),
            Err(TrendError::Source(_))
        ));
    }

    #[test]
    fn extracted_metrics_use_the_configured_grid_sizes() {
        let source = StubSource::new();
        let fastest = lap("VER", 93.718);
        let params = TrendParams::new("VER", Vec::new());

        let metrics = extract_metrics(&fastest, &source.samples, &params).unwrap();
        assert_eq!(metrics.trace.len(), TRACE_POINTS);
        assert_eq!(metrics.corner_deltas.len(), NUM_CORNERS);
        assert!((metrics.lap_time_s - 93.718).abs() < 1e-12);
    }
}
