//! Synthetic wall-clock handling: parsing the configured start time, the
//! stamps used in output file names and log lines, and carrying the clock from
//! one video segment to the next.

use crate::error::{CrowError, CrowResult};
use chrono::{NaiveDateTime, TimeDelta};

pub const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const IMAGE_STAMP_FORMAT: &str = "%Y-%m-%d %H.%M.%S";
pub const LOG_STAMP_FORMAT: &str = "%H:%M:%S";

/// Parses `YYYY-MM-DD HH:MM:SS`.
pub fn parse_start_time(value: &str) -> CrowResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), START_TIME_FORMAT).map_err(|err| {
        CrowError::InvalidTimestamp {
            value: value.to_string(),
            reason: err.to_string(),
        }
    })
}

pub fn image_stamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(IMAGE_STAMP_FORMAT).to_string()
}

pub fn log_stamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(LOG_STAMP_FORMAT).to_string()
}

/// Start time of the segment that follows one of `frame_count` frames sampled
/// at `frame_rate`.
///
/// Advances by the segment's whole-second duration minus one second, which is
/// how consecutive camera files overlap. Never moves the clock backwards.
pub fn next_segment_start(
    start: NaiveDateTime,
    frame_count: usize,
    frame_rate: f64,
) -> NaiveDateTime {
    let whole_seconds = (frame_count as f64 / frame_rate).floor() as i64;
    start + TimeDelta::seconds((whole_seconds - 1).max(0))
}
