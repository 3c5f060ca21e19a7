// THEORY:
// Output is the boundary where detection meets the filesystem. Each accepted
// event can be written as an image and as a line in a log; both are optional
// and both can fail. A failing writer must never take the scan down with it:
// `EventSinks` hands the event to every sink, logs each failure and carries on,
// so a full disk costs the image but still leaves the log line (or the other
// way round), and the next frame is scanned as usual.

use crate::error::CrowResult;
use crate::pipeline::DetectionEvent;
use crate::timeline::{image_stamp, log_stamp};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Literal prefix of every saved motion image.
pub const IMAGE_TAG: &str = "motion";

/// A destination for detection events.
pub trait EventSink: Send {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    fn record(&mut self, event: &DetectionEvent) -> CrowResult<()>;
}

/// Saves each event's frame as `<dir>/motion YYYY-MM-DD HH.MM.SS.jpg`.
#[derive(Debug, Clone)]
pub struct ImageSink {
    output_dir: PathBuf,
}

impl ImageSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, event: &DetectionEvent) -> PathBuf {
        self.output_dir
            .join(format!("{IMAGE_TAG} {}.jpg", image_stamp(event.timestamp)))
    }
}

impl EventSink for ImageSink {
    fn name(&self) -> &str {
        "image"
    }

    fn record(&mut self, event: &DetectionEvent) -> CrowResult<()> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.path_for(event);
        event.image.save(&path)?;
        debug!(path = %path.display(), "motion image saved");
        Ok(())
    }
}

/// Appends `HH:MM:SS` per event. The file is opened for every line; no handle
/// is held between events.
#[derive(Debug, Clone)]
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn record(&mut self, event: &DetectionEvent) -> CrowResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", log_stamp(event.timestamp))?;
        Ok(())
    }
}

/// Outcome of publishing one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans every event out to all configured sinks.
#[derive(Default)]
pub struct EventSinks {
    sinks: Vec<Box<dyn EventSink>>,
}

impl EventSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Delivers `event` to every sink. A sink that fails is logged and skipped;
    /// the remaining sinks still receive the event.
    pub fn publish(&mut self, event: &DetectionEvent) -> PublishReport {
        let mut report = PublishReport::default();
        for sink in &mut self.sinks {
            match sink.record(event) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    warn!(
                        sink = sink.name(),
                        frame_index = event.frame_index,
                        error = %err,
                        "failed to record detection"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrowError;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use image::RgbImage;

    fn event_at(seconds: i64) -> DetectionEvent {
        let base: NaiveDateTime = NaiveDate::from_ymd_opt(2016, 2, 29)
            .unwrap()
            .and_hms_opt(17, 45, 0)
            .unwrap();
        DetectionEvent {
            timestamp: base + TimeDelta::seconds(seconds),
            frame_index: 3,
            frame_source: None,
            in_region_count: 1,
            blobs: Vec::new(),
            image: RgbImage::new(16, 16),
        }
    }

    struct BrokenSink;

    impl EventSink for BrokenSink {
        fn name(&self) -> &str {
            "broken"
        }

        fn record(&mut self, _event: &DetectionEvent) -> CrowResult<()> {
            Err(CrowError::Io(std::io::Error::other("disk full")))
        }
    }

    #[test]
    fn image_names_follow_timestamp() {
        let sink = ImageSink::new("out");
        assert_eq!(
            sink.path_for(&event_at(5)),
            PathBuf::from("out").join("motion 2016-02-29 17.45.05.jpg")
        );
    }

    #[test]
    fn writes_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ImageSink::new(dir.path().join("motion"));
        let event = event_at(0);
        sink.record(&event).unwrap();
        assert!(sink.path_for(&event).is_file());
    }

    #[test]
    fn log_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        std::fs::write(&path, "17:00:00\n").unwrap();

        let mut sink = LogSink::new(&path);
        sink.record(&event_at(1)).unwrap();
        sink.record(&event_at(62)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "17:00:00\n17:45:01\n17:46:02\n");
    }

    #[test]
    fn a_failing_sink_does_not_block_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.txt");
        let mut sinks = EventSinks::new().with(BrokenSink).with(LogSink::new(&path));

        let report = sinks.publish(&event_at(0));
        assert_eq!(report, PublishReport { delivered: 1, failed: 1 });
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "17:45:00\n");

        let report = sinks.publish(&event_at(3));
        assert_eq!(report.failed, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "17:45:00\n17:45:03\n");
    }
}
