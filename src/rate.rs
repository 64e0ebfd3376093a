//! Converts successive counter snapshots into a pieces-per-minute rate.
//! Grounded on `app/api/rate.py`'s `RateCalculator` in the original
//! implementation; ported verbatim since it's pure numeric logic (`spec.md`
//! §4.6).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::registry::Reading;

/// Outcome of projecting one sensor's rate for one consumer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateStatus {
    Ok,
    Offline,
    NotFound,
}

/// A rate sample as presented to a consumer (HTTP listing, uplink payload).
/// `value` is absent whenever there isn't yet enough history to project a
/// rate, even when `status` is `Ok`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub status: RateStatus,
    pub value: Option<f64>,
}

impl RateSample {
    fn offline() -> Self {
        RateSample {
            status: RateStatus::Offline,
            value: None,
        }
    }

    fn ok_no_value() -> Self {
        RateSample {
            status: RateStatus::Ok,
            value: None,
        }
    }

    fn ok(rate: f64) -> Self {
        RateSample {
            status: RateStatus::Ok,
            value: Some(rate),
        }
    }

    pub fn not_found() -> Self {
        RateSample {
            status: RateStatus::NotFound,
            value: None,
        }
    }
}

/// Holds one consumer's view of "the previous reading per sensor". The HTTP
/// listing and the uplink push each own a separate `RateProjector` so that
/// one consumer's query cadence never perturbs the other's baseline
/// (`spec.md` §4.6's "independent `prev` per consumer").
pub struct RateProjector {
    prev: Mutex<HashMap<String, Arc<Reading>>>,
}

impl RateProjector {
    pub fn new() -> Self {
        RateProjector {
            prev: Mutex::new(HashMap::new()),
        }
    }

    /// Projects a rate for `sensor_name` given its current reading. Returns
    /// `None` when the sensor should be skipped entirely this round (a
    /// non-positive elapsed time since the last sample).
    pub fn project(&self, sensor_name: &str, current: &Arc<Reading>) -> Option<RateSample> {
        let Some(cur_value) = current.value.as_ref().map(|v| v.as_f64()) else {
            return Some(RateSample::offline());
        };

        let mut prev_map = self.prev.lock().unwrap();
        let prev = prev_map.get(sensor_name).cloned();

        let Some(prev) = prev else {
            prev_map.insert(sensor_name.to_string(), current.clone());
            return Some(RateSample::ok_no_value());
        };
        let Some(prev_value) = prev.value.as_ref().map(|v| v.as_f64()) else {
            prev_map.insert(sensor_name.to_string(), current.clone());
            return Some(RateSample::ok_no_value());
        };

        let dt = (current.time - prev.time).num_milliseconds() as f64 / 1000.0;
        if dt <= 0.0 {
            return None;
        }

        let rate = (cur_value - prev_value) / dt * 60.0;
        prev_map.insert(sensor_name.to_string(), current.clone());
        Some(RateSample::ok(rate))
    }
}

impl Default for RateProjector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ParamValue;
    use chrono::{DateTime, Duration, Utc};

    fn reading_at(value: Option<u64>, time: DateTime<Utc>) -> Arc<Reading> {
        Arc::new(Reading {
            value: value.map(ParamValue::Count),
            time,
        })
    }

    #[test]
    fn two_samples_sixty_seconds_apart_yield_120_per_minute() {
        let projector = RateProjector::new();
        let t0 = Utc::now();
        let first = reading_at(Some(100), t0);
        let second = reading_at(Some(220), t0 + Duration::seconds(60));

        let first_sample = projector.project("s1", &first).unwrap();
        assert_eq!(first_sample.status, RateStatus::Ok);
        assert_eq!(first_sample.value, None);

        let second_sample = projector.project("s1", &second).unwrap();
        assert_eq!(second_sample.status, RateStatus::Ok);
        assert_eq!(second_sample.value, Some(120.0));
    }

    #[test]
    fn offline_tick_is_reported_without_disturbing_the_baseline() {
        let projector = RateProjector::new();
        let t0 = Utc::now();

        let present = reading_at(Some(50), t0);
        let absent = reading_at(None, t0 + Duration::seconds(1));
        let present_again = reading_at(Some(70), t0 + Duration::seconds(2));

        let first = projector.project("s1", &present).unwrap();
        assert_eq!(first.status, RateStatus::Ok);
        assert_eq!(first.value, None);

        let second = projector.project("s1", &absent).unwrap();
        assert_eq!(second.status, RateStatus::Offline);
        assert_eq!(second.value, None);

        // The offline tick never touched `prev` (spec.md §4.6 rule 1: "leave
        // `prev` unchanged"), so the baseline is still the first sample.
        let third = projector.project("s1", &present_again).unwrap();
        assert_eq!(third.status, RateStatus::Ok);
        assert_eq!(third.value, Some((70.0 - 50.0) / 2.0 * 60.0));
    }

    #[test]
    fn non_positive_elapsed_time_is_skipped_without_advancing_baseline() {
        let projector = RateProjector::new();
        let t0 = Utc::now();
        let first = reading_at(Some(10), t0);
        let stale = reading_at(Some(10), t0);

        projector.project("s1", &first).unwrap();
        assert!(projector.project("s1", &stale).is_none());

        let later = reading_at(Some(40), t0 + Duration::seconds(30));
        let sample = projector.project("s1", &later).unwrap();
        assert_eq!(sample.value, Some(60.0));
    }

    #[test]
    fn negative_rate_is_emitted_faithfully_on_counter_reset() {
        let projector = RateProjector::new();
        let t0 = Utc::now();
        let first = reading_at(Some(200), t0);
        let reset = reading_at(Some(10), t0 + Duration::seconds(30));

        projector.project("s1", &first).unwrap();
        let sample = projector.project("s1", &reset).unwrap();
        assert_eq!(sample.status, RateStatus::Ok);
        assert_eq!(sample.value, Some((10.0 - 200.0) / 30.0 * 60.0));
    }
}
