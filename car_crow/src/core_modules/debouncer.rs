// THEORY:
// The debouncer decides when a frame is worth reporting. Centroids bounce and
// counts flicker, so a raw "something is in the region" signal would fire on
// almost every frame a car is visible. Two rules tame it:
//
// 1.  **Leading edge**: a frame is only a candidate when it has strictly more
//     in-region blobs than the frame just before it. The comparison is always
//     against the previous frame, never a running maximum, so a count that
//     oscillates (3, 2, 3, 2, ...) offers a new candidate on every rise.
// 2.  **Cooldown**: a candidate is accepted only when strictly more than
//     `cooldown_seconds` have passed since the last accepted event.
//
// The component is either "armed" or "cooling down", but that state is never
// stored: it is derived from the last event time and the clock. `snapshot` and
// `state_at` make it observable from the outside.

use chrono::NaiveDateTime;

/// The two logical states, derived from elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// A candidate at this instant would be accepted.
    Armed,
    /// A candidate at this instant would be suppressed.
    CoolingDown,
}

/// A copy of the debouncer's internal state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebouncerSnapshot {
    pub last_in_region_count: usize,
    pub last_event_timestamp: NaiveDateTime,
    pub total_events: u64,
    /// Number of times `consider` has been called.
    pub frames_considered: u64,
}

#[derive(Debug, Clone)]
pub struct DetectionDebouncer {
    cooldown_seconds: f64,
    last_in_region_count: usize,
    last_event_timestamp: NaiveDateTime,
    total_events: u64,
    frames_considered: u64,
}

impl DetectionDebouncer {
    /// A fresh debouncer whose cooldown is measured from `start`.
    pub fn new(cooldown_seconds: f64, start: NaiveDateTime) -> Self {
        Self {
            cooldown_seconds,
            last_in_region_count: 0,
            last_event_timestamp: start,
            total_events: 0,
            frames_considered: 0,
        }
    }

    /// Returns true iff this frame is a new reportable event.
    pub fn consider(&mut self, in_region_count: usize, timestamp: NaiveDateTime) -> bool {
        self.frames_considered += 1;

        let accepted = in_region_count > self.last_in_region_count
            && self.elapsed_seconds(timestamp) > self.cooldown_seconds;
        if accepted {
            self.last_event_timestamp = timestamp;
            self.total_events += 1;
        }

        self.last_in_region_count = in_region_count;
        accepted
    }

    pub fn state_at(&self, now: NaiveDateTime) -> DebounceState {
        if self.elapsed_seconds(now) > self.cooldown_seconds {
            DebounceState::Armed
        } else {
            DebounceState::CoolingDown
        }
    }

    pub fn snapshot(&self) -> DebouncerSnapshot {
        DebouncerSnapshot {
            last_in_region_count: self.last_in_region_count,
            last_event_timestamp: self.last_event_timestamp,
            total_events: self.total_events,
            frames_considered: self.frames_considered,
        }
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    fn elapsed_seconds(&self, now: NaiveDateTime) -> f64 {
        let elapsed = now - self.last_event_timestamp;
        match elapsed.num_microseconds() {
            Some(micros) => micros as f64 / 1_000_000.0,
            None => elapsed.num_seconds() as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeDelta};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 3, 1)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap()
    }

    fn at(millis: i64) -> NaiveDateTime {
        start() + TimeDelta::milliseconds(millis)
    }

    #[test]
    fn first_frame_can_fire_against_zero() {
        let mut debouncer = DetectionDebouncer::new(1.0, start());
        assert!(debouncer.consider(1, at(1_200)));
        assert_eq!(debouncer.total_events(), 1);
    }

    #[test]
    fn first_frame_is_still_subject_to_cooldown_from_start() {
        let mut debouncer = DetectionDebouncer::new(1.0, start());
        assert!(!debouncer.consider(1, at(0)));
        assert_eq!(debouncer.snapshot().last_in_region_count, 1);
    }

    #[test]
    fn cooldown_boundary_is_exclusive() {
        let mut debouncer = DetectionDebouncer::new(1.0, start());
        assert!(debouncer.consider(1, at(2_000)));
        assert!(!debouncer.consider(0, at(2_200)));
        // Exactly C seconds later: rejected.
        assert!(!debouncer.consider(1, at(3_000)));
        assert!(!debouncer.consider(0, at(3_000)));
        // C plus a millisecond: accepted.
        assert!(debouncer.consider(1, at(3_001)));
        assert_eq!(debouncer.total_events(), 2);
    }

    #[test]
    fn candidates_a_tenth_of_a_second_apart_fire_once() {
        let mut debouncer = DetectionDebouncer::new(1.0, start());
        assert!(debouncer.consider(1, at(5_000)));
        assert!(!debouncer.consider(2, at(5_100)));
        assert_eq!(debouncer.total_events(), 1);
    }

    #[test]
    fn sustained_presence_does_not_refire() {
        let mut debouncer = DetectionDebouncer::new(0.0, start());
        assert!(debouncer.consider(2, at(200)));
        for millis in (400..5_000).step_by(200) {
            assert!(!debouncer.consider(2, at(millis)));
        }
        assert_eq!(debouncer.total_events(), 1);
    }

    #[test]
    fn oscillating_counts_retrigger_on_every_rise() {
        let mut debouncer = DetectionDebouncer::new(0.5, start());
        let counts = [3, 2, 3, 2, 3];
        let fired: Vec<bool> = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| debouncer.consider(count, at(1_000 * (i as i64 + 1))))
            .collect();
        assert_eq!(fired, vec![true, false, true, false, true]);
    }

    #[test]
    fn totals_never_decrease_and_never_exceed_calls() {
        let mut debouncer = DetectionDebouncer::new(0.3, start());
        let counts = [0, 1, 0, 2, 2, 3, 1, 4, 0, 5, 6, 0, 1];
        let mut previous_total = 0;
        let mut previous_event = start();
        for (i, &count) in counts.iter().enumerate() {
            debouncer.consider(count, at(200 * (i as i64 + 1)));
            let snapshot = debouncer.snapshot();
            assert!(snapshot.total_events >= previous_total);
            assert!(snapshot.total_events <= snapshot.frames_considered);
            assert!(snapshot.last_event_timestamp >= previous_event);
            assert_eq!(snapshot.last_in_region_count, count);
            previous_total = snapshot.total_events;
            previous_event = snapshot.last_event_timestamp;
        }
        assert_eq!(debouncer.snapshot().frames_considered, counts.len() as u64);
    }

    #[test]
    fn state_is_derived_from_elapsed_time() {
        let mut debouncer = DetectionDebouncer::new(1.0, start());
        assert_eq!(debouncer.state_at(at(500)), DebounceState::CoolingDown);
        assert_eq!(debouncer.state_at(at(1_001)), DebounceState::Armed);

        assert!(debouncer.consider(1, at(1_500)));
        assert_eq!(debouncer.state_at(at(1_500)), DebounceState::CoolingDown);
        assert_eq!(debouncer.state_at(at(2_500)), DebounceState::CoolingDown);
        assert_eq!(debouncer.state_at(at(2_501)), DebounceState::Armed);
    }
}
