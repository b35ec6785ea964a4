use std::path::Path;

use crate::error::{Error, Result};
use crate::frame::Frame;

/// Anything that can hand out video frames on demand.
pub trait FrameSource: Send {
    /// True when a frame can be read right now without waiting.
    fn is_ready(&self) -> bool;

    fn capture(&mut self) -> Result<Frame>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }

    fn capture(&mut self) -> Result<Frame> {
        (**self).capture()
    }
}

/// Repeats one still image forever.
pub struct StillSource {
    frame: Frame,
    sequence: u64,
}

impl StillSource {
    pub fn new(frame: Frame) -> Self {
        Self { frame, sequence: 0 }
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let image = image::open(path.as_ref())?;
        Ok(Self::new(Frame::from_dynamic(&image, 0)))
    }
}

impl FrameSource for StillSource {
    fn is_ready(&self) -> bool {
        true
    }

    fn capture(&mut self) -> Result<Frame> {
        self.sequence += 1;
        Ok(Frame::new(self.frame.image.clone(), self.sequence))
    }
}

/// Cycles through a fixed list of frames.
pub struct SequenceSource {
    frames: Vec<Frame>,
    cursor: usize,
    sequence: u64,
}

impl SequenceSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            cursor: 0,
            sequence: 0,
        }
    }
}

impl FrameSource for SequenceSource {
    fn is_ready(&self) -> bool {
        !self.frames.is_empty()
    }

    fn capture(&mut self) -> Result<Frame> {
        if self.frames.is_empty() {
            return Err(Error::FrameCapture("sequence is empty".to_string()));
        }

        let image = self.frames[self.cursor].image.clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        self.sequence += 1;

        Ok(Frame::new(image, self.sequence))
    }
}
