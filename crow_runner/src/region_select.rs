//! Choosing the region of interest, either from configuration or by asking the
//! operator once per session.

use car_crow::{BoundingBox, CrowError, CrowResult, Frame};
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use tracing::{info, warn};

/// Supplies the region of interest, given a representative frame of the
/// first segment.
pub trait RegionProvider {
    fn select(&mut self, sample: &Frame) -> CrowResult<BoundingBox>;
}

/// A region fixed up front, typically from the config file or `--region`.
#[derive(Debug, Clone, Copy)]
pub struct FixedRegion(pub BoundingBox);

impl RegionProvider for FixedRegion {
    fn select(&mut self, sample: &Frame) -> CrowResult<BoundingBox> {
        self.0.validate()?;
        if !fits(&self.0, sample) {
            warn!(
                region = %self.0,
                width = sample.width(),
                height = sample.height(),
                "region extends beyond the frame"
            );
        }
        Ok(self.0)
    }
}

/// Asks for `x,y,w,h` on a line-oriented terminal, repeating the question
/// until the answer is a valid box inside the sample frame.
pub struct PromptRegion<R, W> {
    input: R,
    output: W,
}

impl PromptRegion<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptRegion<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> RegionProvider for PromptRegion<R, W> {
    fn select(&mut self, sample: &Frame) -> CrowResult<BoundingBox> {
        let name = sample
            .source()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "sample frame".to_string());
        writeln!(
            self.output,
            "Open {name} ({}x{}) and choose the area to count traffic in.",
            sample.width(),
            sample.height()
        )?;

        loop {
            write!(self.output, "Region as x,y,w,h: ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(CrowError::invalid_region("no region entered"));
            }

            let answer = line
                .parse::<BoundingBox>()
                .and_then(|bounding_box| bounding_box.validate().map(|_| bounding_box));
            match answer {
                Ok(bounding_box) if fits(&bounding_box, sample) => {
                    info!(region = %bounding_box, "region selected");
                    return Ok(bounding_box);
                }
                Ok(bounding_box) => writeln!(
                    self.output,
                    "{bounding_box} does not fit inside {}x{}, try again.",
                    sample.width(),
                    sample.height()
                )?,
                Err(err) => writeln!(self.output, "{err}, try again.")?,
            }
        }
    }
}

fn fits(bounding_box: &BoundingBox, sample: &Frame) -> bool {
    let right = bounding_box.x as u64 + bounding_box.width as u64;
    let bottom = bounding_box.y as u64 + bounding_box.height as u64;
    right <= sample.width() as u64 && bottom <= sample.height() as u64
}
