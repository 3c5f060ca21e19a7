//! Draws the region of interest and detected blobs onto a frame for the saved
//! motion images. Purely presentational; nothing here feeds back into detection.

use crate::core_modules::blob::Blob;
use crate::core_modules::region::{Region, classify};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

pub const REGION_COLOUR: Rgb<u8> = Rgb([238, 130, 238]);
pub const IN_REGION_COLOUR: Rgb<u8> = Rgb([34, 139, 34]);
pub const OUT_OF_REGION_COLOUR: Rgb<u8> = Rgb([255, 0, 0]);
pub const CENTROID_COLOUR: Rgb<u8> = Rgb([255, 112, 0]);

const REGION_LINE_WIDTH: i32 = 2;
const BLOB_LINE_WIDTH: i32 = 3;
const CENTROID_RADIUS: i32 = 10;
const CENTROID_THICKNESS: i32 = 5;

/// Returns a copy of `image` with the region outline, one box per blob (green
/// inside the region, red outside) and a ring on every centroid.
pub fn annotate(image: &RgbImage, region: &Region, blobs: &[Blob]) -> RgbImage {
    let mut canvas = image.clone();

    let outline = region.bounding_box();
    draw_thick_rect(
        &mut canvas,
        (outline.x as i32, outline.y as i32),
        (outline.width, outline.height),
        REGION_LINE_WIDTH,
        REGION_COLOUR,
    );

    for blob in blobs {
        let colour = if classify(blob, region) {
            IN_REGION_COLOUR
        } else {
            OUT_OF_REGION_COLOUR
        };
        let bounding_box = blob.bounding_box();
        draw_thick_rect(
            &mut canvas,
            (bounding_box.x.round() as i32, bounding_box.y.round() as i32),
            (bounding_box.width, bounding_box.height),
            BLOB_LINE_WIDTH,
            colour,
        );

        let centre = (blob.x.round() as i32, blob.y.round() as i32);
        let inner = CENTROID_RADIUS - CENTROID_THICKNESS / 2;
        for radius in inner..inner + CENTROID_THICKNESS {
            draw_hollow_circle_mut(&mut canvas, centre, radius, CENTROID_COLOUR);
        }
    }

    canvas
}

/// Lines grow inwards from the outer edge.
fn draw_thick_rect(
    canvas: &mut RgbImage,
    (x, y): (i32, i32),
    (width, height): (u32, u32),
    thickness: i32,
    colour: Rgb<u8>,
) {
    for inset in 0..thickness {
        let w = width as i32 - 2 * inset;
        let h = height as i32 - 2 * inset;
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(x + inset, y + inset).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(canvas, rect, colour);
    }
}
