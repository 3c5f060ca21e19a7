// THEORY:
// The motion extractor turns two frames into a list of motion blobs. It is the
// only place in the engine that touches pixels, and it works by brute force
// image morphology rather than by modelling the scene:
//
// 1.  **Smooth & Difference**: both frames are converted to grayscale and lightly
//     blurred so that sensor noise does not survive the subtraction. The
//     difference of the two blurred frames is the raw "movement" signal.
// 2.  **Threshold**: differences below the noise floor are zeroed, everything else
//     becomes fully white. From here on the image is a binary mask.
// 3.  **Erode**: every white region shrinks. Flicker, leaves and compression
//     artefacts are a few pixels wide and disappear entirely.
// 4.  **Dilate**: whatever survived grows back, many times further than it was
//     shrunk. Fragments of one car (windows, wheels, shadow) fuse into a single
//     region. The dilate count is deliberately much larger than the erode count.
// 5.  **Re-smooth**: a wide blur rounds off the merged regions so their edges
//     join up like a lava lamp before labelling.
// 6.  **Blob extraction**: the blurred mask is binarised at Otsu's level and split
//     into 8-connected components. Tiny components are dropped and the rest
//     become `Blob`s, in label order.
//
// The order is load-bearing: each stage only ever sees the previous stage's
// output. The extractor is stateless; it has no memory of earlier frame pairs.

use crate::config::{DetectionConfig, DifferenceMode};
use crate::core_modules::blob::Blob;
use crate::core_modules::frame::Frame;
use crate::error::{CrowError, CrowResult};
use image::{GrayImage, Luma};
use imageproc::contrast::{self, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::filter::separable_filter;
use imageproc::morphology::{dilate, erode};
use imageproc::region_labelling::{Connectivity, connected_components};
use std::collections::BTreeMap;
use tracing::trace;

pub mod motion_features {
    use super::*;

    /// Finds the motion blobs between `before` and `after`.
    ///
    /// Both frames must have the same dimensions; anything else is a
    /// `FrameSizeMismatch`.
    pub fn extract(
        before: &Frame,
        after: &Frame,
        config: &DetectionConfig,
    ) -> CrowResult<Vec<Blob>> {
        if before.dimensions() != after.dimensions() {
            return Err(CrowError::FrameSizeMismatch {
                before: before.dimensions(),
                after: after.dimensions(),
            });
        }

        // --- 1. Smooth & Difference ---
        let before_luma = smooth(&before.to_luma(), config.pre_smooth_aperture);
        let after_luma = smooth(&after.to_luma(), config.pre_smooth_aperture);
        let difference = difference(&before_luma, &after_luma, config.difference);

        // --- 2. Threshold ---
        let mask = threshold(&difference, config.threshold);
        if is_blank(&mask) {
            return Ok(Vec::new());
        }

        // --- 3. Erode ---
        let mask = if config.erode_iterations > 0 {
            erode(&mask, Norm::LInf, config.erode_iterations)
        } else {
            mask
        };
        if is_blank(&mask) {
            return Ok(Vec::new());
        }

        // --- 4. Dilate ---
        let mask = if config.dilate_iterations > 0 {
            dilate(&mask, Norm::LInf, config.dilate_iterations)
        } else {
            mask
        };

        // --- 5. Re-smooth ---
        let merged = smooth(&mask, config.smooth_aperture);

        // --- 6. Blob Extraction ---
        let blobs = find_blobs(&merged, config.blob_min_size);
        trace!(blobs = blobs.len(), "motion features extracted");
        Ok(blobs)
    }

    /// Gaussian sigma for a kernel of `size` taps, the same rule OpenCV applies
    /// when no sigma is given.
    pub fn aperture_sigma(size: u32) -> f32 {
        0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8
    }

    /// A normalised 1D Gaussian kernel with `size` taps.
    pub fn gaussian_kernel(size: u32) -> Vec<f32> {
        let sigma = aperture_sigma(size);
        let radius = (size / 2) as i32;
        let weights: Vec<f32> = (-radius..=radius)
            .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
            .collect();
        let total: f32 = weights.iter().sum();
        weights.into_iter().map(|w| w / total).collect()
    }

    fn smooth(image: &GrayImage, (width, height): (u32, u32)) -> GrayImage {
        let h_kernel = gaussian_kernel(width);
        let v_kernel = gaussian_kernel(height);
        separable_filter(image, &h_kernel, &v_kernel)
    }

    fn difference(before: &GrayImage, after: &GrayImage, mode: DifferenceMode) -> GrayImage {
        GrayImage::from_fn(before.width(), before.height(), |x, y| {
            let b = before.get_pixel(x, y).0[0];
            let a = after.get_pixel(x, y).0[0];
            match mode {
                DifferenceMode::Absolute => Luma([b.abs_diff(a)]),
                DifferenceMode::Saturating => Luma([b.saturating_sub(a)]),
            }
        })
    }

    /// Values at or above `level` become 255, the rest 0.
    fn threshold(image: &GrayImage, level: u8) -> GrayImage {
        match level.checked_sub(1) {
            Some(below) => contrast::threshold(image, below, ThresholdType::Binary),
            None => GrayImage::from_pixel(image.width(), image.height(), Luma([255])),
        }
    }

    fn is_blank(image: &GrayImage) -> bool {
        image.pixels().all(|p| p.0[0] == 0)
    }

    /// Running totals for one connected component.
    struct ComponentStats {
        area: usize,
        sum_x: u64,
        sum_y: u64,
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
    }

    impl ComponentStats {
        fn new(x: u32, y: u32) -> Self {
            Self {
                area: 0,
                sum_x: 0,
                sum_y: 0,
                min_x: x,
                min_y: y,
                max_x: x,
                max_y: y,
            }
        }

        fn add(&mut self, x: u32, y: u32) {
            self.area += 1;
            self.sum_x += x as u64;
            self.sum_y += y as u64;
            self.min_x = self.min_x.min(x);
            self.min_y = self.min_y.min(y);
            self.max_x = self.max_x.max(x);
            self.max_y = self.max_y.max(y);
        }

        fn into_blob(self, label: u32) -> Blob {
            Blob {
                label,
                x: self.sum_x as f64 / self.area as f64,
                y: self.sum_y as f64 / self.area as f64,
                width: self.max_x - self.min_x + 1,
                height: self.max_y - self.min_y + 1,
                area: self.area,
            }
        }
    }

    fn find_blobs(smoothed: &GrayImage, min_size: usize) -> Vec<Blob> {
        if is_blank(smoothed) {
            return Vec::new();
        }

        let level = contrast::otsu_level(smoothed);
        let binary = contrast::threshold(smoothed, level, ThresholdType::Binary);

        let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

        let mut components: BTreeMap<u32, ComponentStats> = BTreeMap::new();
        for (x, y, label) in labels.enumerate_pixels() {
            let label = label.0[0];
            if label == 0 {
                continue;
            }
            components
                .entry(label)
                .or_insert_with(|| ComponentStats::new(x, y))
                .add(x, y);
        }

        components
            .into_iter()
            .filter(|(_, stats)| stats.area >= min_size)
            .map(|(label, stats)| stats.into_blob(label))
            .collect()
    }

}
