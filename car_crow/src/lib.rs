// THEORY:
// This file is the entry point for the `car_crow` library crate: a traffic
// counter for fixed cameras that looks for movement between consecutive still
// frames, keeps only movement inside an operator-chosen region, and reports the
// leading edge of each burst of traffic as a timestamped event.
//
// `pipeline::TrafficScanner` is the high-level interface. The pieces it is built
// from (`core_modules`) are public so they can be tested and reused on their
// own, but a consumer normally only needs the scanner, the config types and the
// output sinks. Processes, terminals and directory walking live in the
// `crow_runner` binary, never here.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod timeline;

pub use config::{CrowConfig, DetectionConfig, DifferenceMode};
pub use core_modules::frame::{Frame, FrameInput};
pub use core_modules::region::{BoundingBox, Region};
pub use error::{CrowError, CrowResult};
pub use pipeline::{DetectionEvent, ScanSummary, TrafficScanner};
