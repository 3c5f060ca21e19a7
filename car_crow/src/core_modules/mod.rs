pub mod annotate;
pub mod blob;
pub mod debouncer;
pub mod frame;
pub mod motion_features;
pub mod region;
