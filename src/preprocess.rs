use image::imageops::{self, FilterType};
use image::{ImageBuffer, Pixel};
use ndarray::Array4;

use crate::frame::Frame;
use crate::tensor::{Tensor, TensorLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    Gray,
    Rgb,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Gray => 1,
            Channels::Rgb => 3,
        }
    }
}

/// Fixed input geometry expected by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
}

impl InputSpec {
    pub fn shape(&self) -> [usize; 4] {
        [
            1,
            self.height as usize,
            self.width as usize,
            self.channels.count(),
        ]
    }
}

/// 48x48 grayscale, the FER-style emotion classifier input.
pub const EMOTION_INPUT: InputSpec = InputSpec {
    width: 48,
    height: 48,
    channels: Channels::Gray,
};

/// 224x224 RGB, the face-presence classifier input.
pub const FACE_INPUT: InputSpec = InputSpec {
    width: 224,
    height: 224,
    channels: Channels::Rgb,
};

/// Converts a frame into a `[1, H, W, C]` tensor with values scaled to [0, 1].
///
/// The grayscale/resized intermediates live only inside this call; the
/// returned tensor is owned by the caller.
pub fn preprocess(frame: &Frame, spec: InputSpec, ledger: &TensorLedger) -> Tensor {
    if frame.pixel_count() == 0 {
        // nothing to sample from, keep the shape contract
        let [n, h, w, c] = spec.shape();
        return Tensor::new(Array4::zeros((n, h, w, c)), ledger);
    }

    match spec.channels {
        Channels::Gray => {
            let gray = imageops::grayscale(&frame.image);
            let resized = imageops::resize(&gray, spec.width, spec.height, FilterType::Triangle);
            to_tensor(&resized, ledger)
        }
        Channels::Rgb => {
            let resized =
                imageops::resize(&frame.image, spec.width, spec.height, FilterType::Triangle);
            to_tensor(&resized, ledger)
        }
    }
}

fn to_tensor<P>(image: &ImageBuffer<P, Vec<u8>>, ledger: &TensorLedger) -> Tensor
where
    P: Pixel<Subpixel = u8>,
{
    let (width, height) = image.dimensions();
    let shape = (
        1,
        height as usize,
        width as usize,
        P::CHANNEL_COUNT as usize,
    );

    let data = Array4::from_shape_fn(shape, |(_, y, x, c)| {
        image.get_pixel(x as u32, y as u32).channels()[c] as f32 / 255.0
    });

    Tensor::new(data, ledger)
}
