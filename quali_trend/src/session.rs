use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SeasonRound;

/// Errors surfaced by a [`SessionSource`]. These are the only failures the
/// season loop absorbs into a skip; everything downstream of a selected
/// fastest lap terminates the run instead.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected response payload: {0}")]
    Decode(String),
    #[error("no {entity} found for {context}")]
    Missing {
        entity: &'static str,
        context: String,
    },
}

/// Raw car telemetry sample: seconds since the first sample of the lap and
/// speed in km/h.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CarSample {
    pub time_s: f64,
    pub speed_kmh: f64,
}

/// One timed lap. Laps with incomplete timing never surface out of the
/// provider layer, so every field here is populated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lap {
    pub driver: String,
    pub number: u32,
    pub time_s: f64,
    pub sector_times_s: [f64; 3],
    pub started_at: DateTime<Utc>,
}

/// A loaded qualifying session: provider key plus all decoded laps.
/// Created by [`SessionSource::load_qualifying`], discarded once the
/// season's metrics are extracted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub round: SeasonRound,
    pub provider_key: i64,
    pub laps: Vec<Lap>,
}

impl Session {
    /// The driver's minimum-time lap, or `None` when the driver set no lap
    /// in this session.
    pub fn fastest_lap(&self, driver: &str) -> Option<&Lap> {
        self.laps
            .iter()
            .filter(|lap| lap.driver == driver)
            .min_by(|a, b| {
                a.time_s
                    .partial_cmp(&b.time_s)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// Seam to the external session/telemetry provider.
pub trait SessionSource {
    /// Request and decode the qualifying session for one season round.
    fn load_qualifying(&self, round: SeasonRound) -> Result<Session, SourceError>;

    /// Raw car telemetry for one lap of a loaded session.
    fn car_data(&self, session: &Session, lap: &Lap) -> Result<Vec<CarSample>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lap(driver: &str, number: u32, time_s: f64) -> Lap {
        Lap {
            driver: driver.to_string(),
            number,
            time_s,
            sector_times_s: [time_s / 3.0; 3],
            started_at: Utc::now(),
        }
    }

    #[test]
    fn fastest_lap_is_driver_filtered_minimum() {
        let session = Session {
            round: SeasonRound {
                season: 2023,
                round: 18,
            },
            provider_key: 9158,
            laps: vec![
                lap("VER", 1, 95.3),
                lap("VER", 7, 93.718),
                lap("HAM", 5, 92.1),
                lap("VER", 12, 94.2),
            ],
        };

        let fastest = session.fastest_lap("VER").unwrap();
        assert_eq!(fastest.number, 7);
        assert!((fastest.time_s - 93.718).abs() < 1e-12);
    }

    #[test]
    fn fastest_lap_is_none_without_matching_laps() {
        let session = Session {
            round: SeasonRound {
                season: 2021,
                round: 17,
            },
            provider_key: 7763,
            laps: vec![lap("HAM", 3, 92.9)],
        };
        assert!(session.fastest_lap("VER").is_none());
    }
}
