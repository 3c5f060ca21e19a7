// THEORY:
// The region of interest decides which movement matters. An operator draws a
// box once, before any scanning, and that box is turned into inclusive
// min/max bounds that never change for the rest of the run. Membership is a
// pure test on a blob's centroid, so a blob whose box pokes out of the region
// still counts as long as its centre of mass is inside, and a centroid lying
// exactly on an edge counts as inside.

use crate::core_modules::blob::Blob;
use crate::error::{CrowError, CrowResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An operator-selected rectangle in image pixels: top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn validate(&self) -> CrowResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CrowError::invalid_region(format!("{self} has no area")));
        }
        if self.x.checked_add(self.width).is_none() || self.y.checked_add(self.height).is_none() {
            return Err(CrowError::invalid_region(format!("{self} overflows")));
        }
        Ok(())
    }
}

impl From<[u32; 4]> for BoundingBox {
    fn from([x, y, width, height]: [u32; 4]) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<BoundingBox> for [u32; 4] {
    fn from(bounding_box: BoundingBox) -> Self {
        [bounding_box.x, bounding_box.y, bounding_box.width, bounding_box.height]
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses `x,y,w,h`; whitespace around the numbers is ignored and spaces may
/// be used instead of commas.
impl FromStr for BoundingBox {
    type Err = CrowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u32>().map_err(|_| {
                    CrowError::invalid_region(format!("{part:?} is not a pixel coordinate"))
                })
            })
            .collect::<CrowResult<Vec<u32>>>()?;

        match values.as_slice() {
            [x, y, width, height] => Ok(Self::new(*x, *y, *width, *height)),
            _ => Err(CrowError::invalid_region(format!(
                "expected x,y,w,h but got {} values",
                values.len()
            ))),
        }
    }
}

/// Inclusive bounds derived once from a `BoundingBox`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl Region {
    pub fn from_bounding_box(bounding_box: BoundingBox) -> CrowResult<Self> {
        bounding_box.validate()?;
        Ok(Self {
            x_min: bounding_box.x,
            y_min: bounding_box.y,
            x_max: bounding_box.x + bounding_box.width,
            y_max: bounding_box.y + bounding_box.height,
        })
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.x_min as f64..=self.x_max as f64).contains(&x)
            && (self.y_min as f64..=self.y_max as f64).contains(&y)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            self.x_min,
            self.y_min,
            self.x_max - self.x_min,
            self.y_max - self.y_min,
        )
    }
}

/// True iff the blob's centroid lies inside the region, edges included.
pub fn classify(blob: &Blob, region: &Region) -> bool {
    region.contains(blob.x, blob.y)
}

/// Number of blobs whose centroid lies inside the region.
pub fn count_in_region(blobs: &[Blob], region: &Region) -> usize {
    blobs.iter().filter(|blob| classify(blob, region)).count()
}
