// THEORY:
// A `Blob` is one connected region of movement found between two frames. It is a
// snapshot of a single frame pair and nothing more: blobs carry no identity from
// one pair to the next, so the engine can count movement but never follow it.
//
// The centroid is the centre of mass of the component's pixels. Width and height
// are the extents of the component. The box drawn around a blob is centred on the
// centroid rather than on the pixel extents, which is what the annotated output
// images show.

/// A single connected component of motion.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    /// The connected-component label this blob was built from. Only meaningful
    /// within the frame pair that produced it.
    pub label: u32,
    /// Centroid x, in image pixels.
    pub x: f64,
    /// Centroid y, in image pixels.
    pub y: f64,
    /// Horizontal extent of the component in pixels.
    pub width: u32,
    /// Vertical extent of the component in pixels.
    pub height: u32,
    /// Number of pixels in the component.
    pub area: usize,
}

/// A box centred on a blob's centroid: top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentredBox {
    pub x: f64,
    pub y: f64,
    pub width: u32,
    pub height: u32,
}

impl Blob {
    pub fn centroid(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// `(x - width/2, y - height/2, width, height)`.
    pub fn bounding_box(&self) -> CentredBox {
        CentredBox {
            x: self.x - self.width as f64 / 2.0,
            y: self.y - self.height as f64 / 2.0,
            width: self.width,
            height: self.height,
        }
    }
}
