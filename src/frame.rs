use image::{DynamicImage, Rgb, RgbImage};

/// A single captured video frame (RGB, 8 bits per channel).
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub sequence: u64,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self { image, sequence }
    }

    pub fn from_dynamic(image: &DynamicImage, sequence: u64) -> Self {
        Self::new(image.to_rgb8(), sequence)
    }

    // a frame filled with one color, handy for synthetic input
    pub fn uniform(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self::new(RgbImage::from_pixel(width, height, Rgb(rgb)), 0)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> usize {
        (self.width() as usize) * (self.height() as usize)
    }

    /// Raw interleaved RGB bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn mirrored(self) -> Self {
        Self {
            image: image::imageops::flip_horizontal(&self.image),
            sequence: self.sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_frame() {
        let frame = Frame::uniform(4, 3, [10, 20, 30]);
        assert_eq!(frame.width(), 4);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.pixel_count(), 12);
        assert_eq!(frame.as_raw().len(), 36);
        assert_eq!(&frame.as_raw()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_mirrored_swaps_columns() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 0, 255]));

        let frame = Frame::new(image, 7).mirrored();
        assert_eq!(frame.image.get_pixel(0, 0).0, [0, 0, 255]);
        assert_eq!(frame.image.get_pixel(1, 0).0, [255, 0, 0]);
        assert_eq!(frame.sequence, 7);
    }
}
