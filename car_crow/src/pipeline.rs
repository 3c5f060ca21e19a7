// THEORY:
// The `pipeline` module is the top-level API of the detection engine. A
// `TrafficScanner` holds the two things that never change during a run, the
// tunables and the region of interest, and turns an ordered list of frames into
// a lazy stream of `DetectionEvent`s.
//
// Per frame, strictly in order:
// 1.  **Extract**: compare the previous frame with this one. The very first frame
//     is compared with itself, which by construction finds no motion.
// 2.  **Filter**: count the blobs whose centroid lies inside the region.
// 3.  **Debounce**: hand that count and the frame's timestamp to the debouncer.
// 4.  **Emit**: if the debouncer accepts, yield an event carrying the frame
//     (annotated when enabled).
// 5.  **Advance**: step the clock by one frame interval and slide the window.
//
// Time is synthetic. Frame N is stamped `start + N * interval` no matter how long
// the work took, so a run is fully determined by its frames, start time, region
// and config. A scan owns its state exclusively and is consumed as it goes; it
// cannot be rewound.

use crate::config::DetectionConfig;
use crate::core_modules::annotate::annotate;
use crate::core_modules::debouncer::{DebouncerSnapshot, DetectionDebouncer};
use crate::core_modules::frame::{Frame, FrameInput};
use crate::core_modules::motion_features::motion_features;
use crate::core_modules::region::{Region, count_in_region};
use crate::error::CrowResult;
use crate::timeline::log_stamp;
use chrono::{NaiveDateTime, TimeDelta};
use image::RgbImage;
use std::path::PathBuf;
use tracing::{debug, info};

// Re-export key data structures for the public API.
pub use crate::core_modules::blob::Blob;
pub use crate::core_modules::debouncer::DebounceState;

/// A frame the debouncer accepted as a new traffic event.
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    /// Synthetic time of the frame.
    pub timestamp: NaiveDateTime,
    /// Zero-based position of the frame in the scanned sequence.
    pub frame_index: usize,
    /// The file the frame was read from, when it came from disk.
    pub frame_source: Option<PathBuf>,
    /// Blobs inside the region on this frame.
    pub in_region_count: usize,
    /// Every blob found on this frame, inside the region or not.
    pub blobs: Vec<Blob>,
    /// The frame, annotated when `DetectionConfig::annotate` is set.
    pub image: RgbImage,
}

/// Mutable state of one scan run.
#[derive(Debug, Clone)]
pub struct DetectionState {
    pub last_frame: Option<Frame>,
    pub debouncer: DetectionDebouncer,
    /// Timestamp the next frame will receive.
    pub next_timestamp: NaiveDateTime,
    pub frames_processed: usize,
}

/// Totals reported once a scan is finished (or at any point during it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSummary {
    pub start_timestamp: NaiveDateTime,
    /// Timestamp the frame after the last processed one would have received.
    pub end_timestamp: NaiveDateTime,
    pub frames_processed: usize,
    pub total_events: u64,
}

/// Walks frame sequences looking for traffic inside one region.
#[derive(Debug, Clone)]
pub struct TrafficScanner<'a> {
    config: &'a DetectionConfig,
    region: Region,
}

impl<'a> TrafficScanner<'a> {
    pub fn new(config: &'a DetectionConfig, region: Region) -> Self {
        Self { config, region }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Starts a scan over `frames`, the first of which is stamped `start`.
    pub fn scan<I>(&self, frames: I, start: NaiveDateTime) -> TrafficScan<'a, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: FrameInput,
    {
        TrafficScan {
            config: self.config,
            region: self.region,
            frames: frames.into_iter(),
            interval: self.config.frame_interval(),
            start,
            state: DetectionState {
                last_frame: None,
                debouncer: DetectionDebouncer::new(self.config.cooldown_seconds, start),
                next_timestamp: start,
                frames_processed: 0,
            },
            halted: false,
        }
    }
}

/// A scan in progress. Yields each accepted event; the first error (an
/// unreadable frame or a frame of the wrong size) is yielded once and ends the
/// scan.
pub struct TrafficScan<'a, I> {
    config: &'a DetectionConfig,
    region: Region,
    frames: I,
    interval: TimeDelta,
    start: NaiveDateTime,
    state: DetectionState,
    halted: bool,
}

impl<I> TrafficScan<'_, I>
where
    I: Iterator,
    I::Item: FrameInput,
{
    pub fn state(&self) -> &DetectionState {
        &self.state
    }

    pub fn snapshot(&self) -> DebouncerSnapshot {
        self.state.debouncer.snapshot()
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            start_timestamp: self.start,
            end_timestamp: self.state.next_timestamp,
            frames_processed: self.state.frames_processed,
            total_events: self.state.debouncer.total_events(),
        }
    }

    /// Drains the scan, returning every event and the final summary. Stops at
    /// the first error.
    pub fn run_to_end(mut self) -> CrowResult<(Vec<DetectionEvent>, ScanSummary)> {
        let mut events = Vec::new();
        for event in self.by_ref() {
            events.push(event?);
        }
        Ok((events, self.summary()))
    }

    fn step(&mut self, input: I::Item) -> CrowResult<Option<DetectionEvent>> {
        let next_frame = input.load()?;
        let timestamp = self.state.next_timestamp;
        let frame_index = self.state.frames_processed;

        // --- 1. Extract ---
        let blobs = {
            let last_frame = self.state.last_frame.as_ref().unwrap_or(&next_frame);
            motion_features::extract(last_frame, &next_frame, self.config)?
        };

        // --- 2. Filter ---
        let in_region_count = count_in_region(&blobs, &self.region);
        debug!(
            frame_index,
            blobs = blobs.len(),
            in_region = in_region_count,
            "frame compared"
        );

        // --- 3. Debounce ---
        let accepted = self.state.debouncer.consider(in_region_count, timestamp);

        // --- 4. Emit ---
        let event = if accepted {
            info!(frame_index, "Detection at: {}", log_stamp(timestamp));
            let image = if self.config.annotate {
                annotate(next_frame.image(), &self.region, &blobs)
            } else {
                next_frame.image().clone()
            };
            Some(DetectionEvent {
                timestamp,
                frame_index,
                frame_source: next_frame.source().map(|p| p.to_path_buf()),
                in_region_count,
                blobs,
                image,
            })
        } else {
            None
        };

        // --- 5. Advance ---
        self.state.next_timestamp = timestamp + self.interval;
        self.state.frames_processed += 1;
        self.state.last_frame = Some(next_frame);

        Ok(event)
    }
}

impl<I> Iterator for TrafficScan<'_, I>
where
    I: Iterator,
    I::Item: FrameInput,
{
    type Item = CrowResult<DetectionEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }
        loop {
            let input = self.frames.next()?;
            match self.step(input) {
                Ok(Some(event)) => return Some(Ok(event)),
                Ok(None) => continue,
                Err(err) => {
                    self.halted = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::region::BoundingBox;
    use crate::error::CrowError;
    use chrono::NaiveDate;
    use image::Rgb;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 11, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn region() -> Region {
        Region::from_bounding_box(BoundingBox::new(0, 0, 100, 100)).unwrap()
    }

    fn blank() -> Frame {
        Frame::new(RgbImage::from_pixel(160, 160, Rgb([0, 0, 0])))
    }

    fn with_square(x0: u32, y0: u32) -> Frame {
        let mut image = RgbImage::from_pixel(160, 160, Rgb([0, 0, 0]));
        for y in y0..y0 + 20 {
            for x in x0..x0 + 20 {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        Frame::new(image)
    }

    #[test]
    fn single_frame_is_compared_with_itself() {
        let config = DetectionConfig::default();
        let scanner = TrafficScanner::new(&config, region());
        let (events, summary) = scanner
            .scan(vec![with_square(40, 40)], start())
            .run_to_end()
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(summary.frames_processed, 1);
        assert_eq!(summary.total_events, 0);
        assert_eq!(summary.end_timestamp, start() + TimeDelta::milliseconds(200));
    }

    #[test]
    fn event_carries_frame_details() {
        let config = DetectionConfig {
            cooldown_seconds: 0.1,
            annotate: false,
            ..DetectionConfig::default()
        };
        let scanner = TrafficScanner::new(&config, region());
        let frames = vec![blank(), blank(), with_square(40, 40)];
        let (events, _) = scanner.scan(frames.clone(), start()).run_to_end().unwrap();

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.frame_index, 2);
        assert_eq!(event.timestamp, start() + TimeDelta::milliseconds(400));
        assert_eq!(event.in_region_count, 1);
        assert_eq!(event.blobs.len(), 1);
        assert!(event.frame_source.is_none());
        assert_eq!(&event.image, frames[2].image());
    }

    #[test]
    fn motion_outside_the_region_is_not_an_event() {
        let config = DetectionConfig {
            cooldown_seconds: 0.0,
            ..DetectionConfig::default()
        };
        let region = Region::from_bounding_box(BoundingBox::new(0, 0, 30, 30)).unwrap();
        let scanner = TrafficScanner::new(&config, region);
        let frames = vec![blank(), with_square(100, 100)];

        let mut scan = scanner.scan(frames, start());
        assert!(scan.next().is_none());
        assert_eq!(scan.summary().frames_processed, 2);
        assert_eq!(scan.snapshot().last_in_region_count, 0);
    }

    #[test]
    fn size_mismatch_ends_the_scan() {
        let config = DetectionConfig::default();
        let scanner = TrafficScanner::new(&config, region());
        let small = Frame::new(RgbImage::new(80, 80));
        let frames = vec![blank(), small, blank()];

        let mut scan = scanner.scan(frames, start());
        assert!(matches!(scan.next(), Some(Err(CrowError::FrameSizeMismatch { .. }))));
        assert!(scan.next().is_none());
        assert_eq!(scan.summary().frames_processed, 1);
    }

    #[test]
    fn unreadable_frame_is_reported() {
        let config = DetectionConfig::default();
        let scanner = TrafficScanner::new(&config, region());
        let frames = vec![PathBuf::from("missing/frame0001.jpg")];

        let err = scanner.scan(frames, start()).run_to_end().unwrap_err();
        assert!(matches!(err, CrowError::FrameLoad { .. }));
    }
}
