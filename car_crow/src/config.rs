// THEORY:
// Every tunable of the engine lives in one immutable value that is built once,
// validated once and then only ever borrowed. `DetectionConfig` is what the
// extractor and scanner read; `CrowConfig` wraps it with the paths, output
// toggles and start time that a whole corpus run needs. Both deserialize from a
// partial JSON document: anything missing falls back to the defaults below.

use crate::core_modules::region::BoundingBox;
use crate::error::{CrowError, CrowResult};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the two smoothed frames are subtracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceMode {
    /// `|before - after|`: motion is seen whether the scene gets brighter or darker.
    #[default]
    Absolute,
    /// `max(before - after, 0)`: only pixels that got darker register.
    Saturating,
}

/// Tunables for the motion extractor and the scanning loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Noise floor: a pixel must change by at least this much to count as movement.
    pub threshold: u8,
    /// Erosion passes. More passes keep only large movements.
    pub erode_iterations: u8,
    /// Dilation passes. More passes merge nearby movement into one blob.
    pub dilate_iterations: u8,
    /// Gaussian aperture (width, height) applied before connected-component extraction.
    pub smooth_aperture: (u32, u32),
    /// Gaussian aperture applied to each frame before differencing.
    pub pre_smooth_aperture: (u32, u32),
    /// Components with fewer pixels than this are discarded.
    pub blob_min_size: usize,
    /// A new event is only accepted when strictly more than this many seconds
    /// have passed since the previous one.
    pub cooldown_seconds: f64,
    /// Rate at which frames were sampled from the video.
    pub frame_rate: f64,
    pub difference: DifferenceMode,
    /// Draw the region, blob boxes and centroids on emitted frames.
    pub annotate: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            erode_iterations: 3,
            dilate_iterations: 40,
            smooth_aperture: (19, 19),
            pre_smooth_aperture: (3, 3),
            blob_min_size: 30,
            cooldown_seconds: 2.0,
            frame_rate: 5.0,
            difference: DifferenceMode::Absolute,
            annotate: true,
        }
    }
}

/// Slowest accepted sampling rate: one frame every 100 seconds.
pub const MIN_FRAME_RATE: f64 = 0.01;
/// Fastest accepted sampling rate: one frame per millisecond.
pub const MAX_FRAME_RATE: f64 = 1000.0;

impl DetectionConfig {
    pub fn validate(&self) -> CrowResult<()> {
        if !(MIN_FRAME_RATE..=MAX_FRAME_RATE).contains(&self.frame_rate) {
            return Err(CrowError::config(format!(
                "frame_rate must be between {MIN_FRAME_RATE} and {MAX_FRAME_RATE}, got {}",
                self.frame_rate
            )));
        }
        if !self.cooldown_seconds.is_finite() || self.cooldown_seconds < 0.0 {
            return Err(CrowError::config(format!(
                "cooldown_seconds must be zero or positive, got {}",
                self.cooldown_seconds
            )));
        }
        validate_aperture("smooth_aperture", self.smooth_aperture)?;
        validate_aperture("pre_smooth_aperture", self.pre_smooth_aperture)?;
        Ok(())
    }

    /// Synthetic time between two consecutive frames (200ms at 5fps).
    pub fn frame_interval(&self) -> TimeDelta {
        TimeDelta::microseconds((1_000_000.0 / self.frame_rate).round() as i64)
    }
}

fn validate_aperture(name: &str, (width, height): (u32, u32)) -> CrowResult<()> {
    if width == 0 || height == 0 || width % 2 == 0 || height % 2 == 0 {
        return Err(CrowError::config(format!(
            "{name} must be odd in both dimensions, got {width}x{height}"
        )));
    }
    Ok(())
}

/// Everything a corpus run needs: tunables, locations and output switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrowConfig {
    pub detection: DetectionConfig,
    /// Root directory searched recursively for `.avi` files.
    pub video_path: PathBuf,
    /// Directory receiving annotated motion images and the event log.
    pub output_path: PathBuf,
    /// Scratch directory for extracted frames; emptied after every segment.
    pub temp_path: PathBuf,
    pub log_filename: String,
    /// Image extension ffmpeg writes extracted frames with.
    pub frame_extension: String,
    /// Wall-clock time of the first frame, `YYYY-MM-DD HH:MM:SS`. Defaults to now.
    pub start_time: Option<String>,
    pub output_images: bool,
    pub output_log: bool,
    /// Region of interest as `[x, y, w, h]`. Asked for interactively when absent.
    pub region: Option<BoundingBox>,
}

impl Default for CrowConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            video_path: PathBuf::from("videos"),
            output_path: PathBuf::from("output"),
            temp_path: PathBuf::from("temp"),
            log_filename: "log.txt".to_string(),
            frame_extension: "jpg".to_string(),
            start_time: None,
            output_images: true,
            output_log: true,
            region: None,
        }
    }
}

impl CrowConfig {
    /// Reads a JSON config file. Missing keys take their default values.
    pub fn from_file(path: impl AsRef<Path>) -> CrowResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn validate(&self) -> CrowResult<()> {
        self.detection.validate()?;
        if self.log_filename.trim().is_empty() {
            return Err(CrowError::config("log_filename must not be empty"));
        }
        if self.frame_extension.trim().is_empty() {
            return Err(CrowError::config("frame_extension must not be empty"));
        }
        if let Some(bounding_box) = self.region {
            bounding_box.validate()?;
        }
        if let Some(start_time) = &self.start_time {
            crate::timeline::parse_start_time(start_time)?;
        }
        Ok(())
    }

    pub fn log_file(&self) -> PathBuf {
        self.output_path.join(&self.log_filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_tuning() {
        let config = DetectionConfig::default();
        assert_eq!(config.threshold, 20);
        assert_eq!(config.erode_iterations, 3);
        assert_eq!(config.dilate_iterations, 40);
        assert_eq!(config.smooth_aperture, (19, 19));
        assert_eq!(config.blob_min_size, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn frame_interval_follows_frame_rate() {
        let config = DetectionConfig::default();
        assert_eq!(config.frame_interval(), TimeDelta::milliseconds(200));

        let config = DetectionConfig {
            frame_rate: 25.0,
            ..DetectionConfig::default()
        };
        assert_eq!(config.frame_interval(), TimeDelta::milliseconds(40));
    }

    #[test]
    fn rejects_bad_tunables() {
        let even = DetectionConfig {
            smooth_aperture: (18, 19),
            ..DetectionConfig::default()
        };
        assert!(matches!(even.validate(), Err(CrowError::Config(_))));

        let stopped = DetectionConfig {
            frame_rate: 0.0,
            ..DetectionConfig::default()
        };
        assert!(stopped.validate().is_err());

        for frame_rate in [1e-9, 5000.0, f64::NAN, f64::INFINITY] {
            let extreme = DetectionConfig {
                frame_rate,
                ..DetectionConfig::default()
            };
            assert!(extreme.validate().is_err(), "{frame_rate} should be rejected");
        }
        let slowest = DetectionConfig {
            frame_rate: MIN_FRAME_RATE,
            ..DetectionConfig::default()
        };
        assert!(slowest.validate().is_ok());
        assert_eq!(slowest.frame_interval(), TimeDelta::seconds(100));

        let negative = DetectionConfig {
            cooldown_seconds: -1.0,
            ..DetectionConfig::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{
            "detection": { "cooldown_seconds": 5.0, "difference": "saturating" },
            "output_path": "out",
            "region": [10, 20, 30, 40]
        }"#;
        let config: CrowConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.detection.cooldown_seconds, 5.0);
        assert_eq!(config.detection.difference, DifferenceMode::Saturating);
        assert_eq!(config.detection.dilate_iterations, 40);
        assert_eq!(config.output_path, PathBuf::from("out"));
        assert_eq!(config.log_file(), PathBuf::from("out").join("log.txt"));
        assert_eq!(config.region, Some(BoundingBox::new(10, 20, 30, 40)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_start_time_is_a_configuration_error() {
        let config = CrowConfig {
            start_time: Some("yesterday".to_string()),
            ..CrowConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crow.json");
        std::fs::write(&path, r#"{ "log_filename": "events.log" }"#).unwrap();

        let config = CrowConfig::from_file(&path).unwrap();
        assert_eq!(config.log_filename, "events.log");
        assert!(config.output_images);
    }
}
