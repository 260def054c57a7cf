use image::RgbImage;

use crate::error::Error;

/// One decoded video frame.
pub struct Frame {
    pub index: u64,
    pub timestamp: f64, // in seconds
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, timestamp: f64, image: RgbImage) -> Result<Self, Error> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::InvalidFrame(format!(
                "frame {} has empty dimensions {}x{}",
                index,
                image.width(),
                image.height()
            )));
        }

        if !timestamp.is_finite() {
            return Err(Error::InvalidFrame(format!(
                "frame {} has non-finite timestamp",
                index
            )));
        }

        Ok(Self {
            index,
            timestamp,
            image,
        })
    }

    /// Wraps a packed RGB8 buffer.
    pub fn from_rgb(
        index: u64,
        timestamp: f64,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self, Error> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(Error::InvalidFrame(format!(
                "frame {}: expected {} bytes for {}x{} rgb, got {}",
                index,
                expected,
                width,
                height,
                data.len()
            )));
        }

        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| Error::InvalidFrame(format!("frame {}: bad buffer", index)))?;

        Self::new(index, timestamp, image)
    }

    /// Decodes an encoded image (jpeg, png, ...).
    pub fn decode(index: u64, timestamp: f64, bytes: &[u8]) -> Result<Self, Error> {
        let image = image::load_from_memory(bytes)
            .map_err(|err| Error::InvalidFrame(format!("frame {}: {}", index, err)))?
            .to_rgb8();

        Self::new(index, timestamp, image)
    }

    /// Uniform frame, used when only detections are replayed.
    pub fn blank(index: u64, timestamp: f64, width: u32, height: u32) -> Result<Self, Error> {
        Self::new(index, timestamp, RgbImage::new(width, height))
    }

    #[inline]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}
