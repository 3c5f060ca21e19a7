// THEORY:
// A session walks a list of videos in order, treating each as one segment of a
// continuous recording. For every segment it extracts frames, scans them and
// removes them again, whatever the scan's outcome. The region of interest is
// chosen once, on the middle frame of the first segment that yields frames, and
// reused for the rest of the session. The synthetic clock is carried from one
// segment to the next with `timeline::next_segment_start`.
//
// Scanning is CPU-bound and synchronous, so it runs on the blocking pool. The
// sinks are moved into that task and handed back when it finishes, which keeps
// ownership linear and lets one set of sinks serve every segment. The region
// provider travels the same way, since a prompt blocks on the terminal.
//
// A scan that fails partway still counts: its published events and failed
// writes go into the report and the clock advances past all of its frames.

use crate::frames::FrameSource;
use crate::region_select::RegionProvider;
use car_crow::output::EventSinks;
use car_crow::timeline::next_segment_start;
use car_crow::{CrowConfig, CrowError, Frame, Region, ScanSummary, TrafficScanner};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Crow(#[from] CrowError),

    #[error("Scan task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SessionError {
    /// Errors that stop the session even when failed segments are skipped.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Crow(err) => err.is_configuration(),
            Self::Join(_) => true,
        }
    }
}

/// Totals for a whole session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub segments_scanned: usize,
    pub segments_failed: usize,
    pub frames_scanned: usize,
    /// Accepted events, including those of segments whose scan later failed.
    pub total_events: u64,
    /// Event writes that a sink could not complete.
    pub sink_failures: usize,
    /// Clock value the next segment would have started at.
    pub end_time: NaiveDateTime,
}

/// What one segment's scan produced, up to its first error if it had one.
struct SegmentScan {
    frame_count: usize,
    summary: ScanSummary,
    sink_failures: usize,
    failure: Option<CrowError>,
}

pub struct Session<S> {
    config: Arc<CrowConfig>,
    source: S,
    /// Lent to the blocking pool while a region is being chosen.
    regions: Option<Box<dyn RegionProvider + Send>>,
    region: Option<Region>,
    sinks: EventSinks,
    keep_going: bool,
}

impl<S: FrameSource> Session<S> {
    pub fn new(config: CrowConfig, source: S, regions: Box<dyn RegionProvider + Send>) -> Self {
        Self {
            config: Arc::new(config),
            source,
            regions: Some(regions),
            region: None,
            sinks: EventSinks::new(),
            keep_going: false,
        }
    }

    pub fn with_sinks(mut self, sinks: EventSinks) -> Self {
        self.sinks = sinks;
        self
    }

    /// Skip segments whose extraction or scan fails instead of stopping.
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }

    /// The region in use, once it has been chosen.
    pub fn region(&self) -> Option<Region> {
        self.region
    }

    pub async fn run(
        &mut self,
        videos: &[PathBuf],
        start: NaiveDateTime,
    ) -> Result<SessionReport, SessionError> {
        let mut report = SessionReport {
            segments_scanned: 0,
            segments_failed: 0,
            frames_scanned: 0,
            total_events: 0,
            sink_failures: 0,
            end_time: start,
        };

        for (index, video) in videos.iter().enumerate() {
            info!(
                video = %video.display(),
                segment = index + 1,
                of = videos.len(),
                start = %report.end_time,
                "scanning segment"
            );

            let segment = match self.scan_segment(video, report.end_time).await {
                Ok(segment) => segment,
                Err(err) => {
                    self.skip_or_stop(video, err, &mut report)?;
                    continue;
                }
            };

            report.frames_scanned += segment.summary.frames_processed;
            report.total_events += segment.summary.total_events;
            report.sink_failures += segment.sink_failures;
            report.end_time = next_segment_start(
                report.end_time,
                segment.frame_count,
                self.config.detection.frame_rate,
            );
            if segment.sink_failures > 0 {
                warn!(
                    video = %video.display(),
                    failed = segment.sink_failures,
                    "some detections were not written"
                );
            }

            match segment.failure {
                None => {
                    info!(
                        video = %video.display(),
                        frames = segment.summary.frames_processed,
                        events = segment.summary.total_events,
                        "segment done"
                    );
                    report.segments_scanned += 1;
                }
                Some(err) => self.skip_or_stop(video, err.into(), &mut report)?,
            }
        }

        Ok(report)
    }

    fn skip_or_stop(
        &self,
        video: &Path,
        err: SessionError,
        report: &mut SessionReport,
    ) -> Result<(), SessionError> {
        if self.keep_going && !err.is_fatal() {
            warn!(video = %video.display(), error = %err, "skipping segment");
            report.segments_failed += 1;
            Ok(())
        } else {
            Err(err)
        }
    }

    async fn scan_segment(
        &mut self,
        video: &Path,
        start: NaiveDateTime,
    ) -> Result<SegmentScan, SessionError> {
        let frames = self.source.extract(video, &self.config.temp_path).await?;
        let outcome = self.scan_frames(video, &frames, start).await;
        let removed = self.source.cleanup(&frames).await;
        debug!(removed, "frames cleaned up");
        outcome
    }

    async fn scan_frames(
        &mut self,
        video: &Path,
        frames: &[PathBuf],
        start: NaiveDateTime,
    ) -> Result<SegmentScan, SessionError> {
        if frames.is_empty() {
            return Err(CrowError::NoFramesExtracted(video.to_path_buf()).into());
        }
        let region = match self.region {
            Some(region) => region,
            None => {
                let region = self.choose_region(frames).await?;
                self.region = Some(region);
                region
            }
        };

        let config = Arc::clone(&self.config);
        let frames = frames.to_vec();
        let mut sinks = std::mem::take(&mut self.sinks);

        let (sinks, segment) = tokio::task::spawn_blocking(move || {
            let scanner = TrafficScanner::new(&config.detection, region);
            let mut scan = scanner.scan(&frames, start);
            let mut sink_failures = 0;
            let mut failure = None;
            for event in scan.by_ref() {
                match event {
                    Ok(event) => sink_failures += sinks.publish(&event).failed,
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
            let segment = SegmentScan {
                frame_count: frames.len(),
                summary: scan.summary(),
                sink_failures,
                failure,
            };
            (sinks, segment)
        })
        .await?;

        self.sinks = sinks;
        Ok(segment)
    }

    /// Asks the provider on the blocking pool, since it may wait on a terminal.
    async fn choose_region(&mut self, frames: &[PathBuf]) -> Result<Region, SessionError> {
        let sample_path = frames[frames.len() / 2].clone();
        let mut regions = self
            .regions
            .take()
            .ok_or_else(|| CrowError::invalid_region("no region provider"))?;

        let (regions, selected) = tokio::task::spawn_blocking(move || {
            let selected = Frame::open(&sample_path).and_then(|sample| regions.select(&sample));
            (regions, selected)
        })
        .await?;

        self.regions = Some(regions);
        Ok(Region::from_bounding_box(selected?)?)
    }
}
