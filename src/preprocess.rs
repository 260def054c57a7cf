//! Frame conditioning ahead of detection and OCR.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::contrast::{equalize_histogram, otsu_level};
use ndarray::prelude::*;

use crate::bbox::{BBox, Ltrb};
use crate::config::PreprocessConfig;
use crate::frame::Frame;

/// Frame as handed to the detector, with its scale relative to the source.
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    pub index: u64,
    pub image: RgbImage,
    /// Prepared size divided by source size.
    pub scale: f32,
}

impl PreparedFrame {
    /// Maps a box from prepared pixels back to source frame pixels.
    #[inline]
    pub fn to_frame_coords(&self, bbox: &BBox<Ltrb>) -> BBox<Ltrb> {
        bbox.scale(1.0 / self.scale)
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Stretches the image to `size x size` and lays it out as `[1, 3, size, size]` in `[0, 1]`.
    pub fn tensor(&self, size: u32) -> Array4<f32> {
        let resized = imageops::resize(&self.image, size, size, FilterType::Triangle);
        let side = size as usize;

        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, px) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                tensor[[0, c, y, x]] = px[c] as f32 / 255.0;
            }
        }

        tensor
    }
}

#[derive(Debug, Clone)]
pub struct FramePreprocessor {
    config: PreprocessConfig,
}

impl FramePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn prepare(&self, frame: &Frame) -> PreparedFrame {
        let (w, h) = frame.dims();
        let short = w.min(h);

        let (image, scale) = if short < self.config.min_side {
            let scale = self.config.min_side as f32 / short as f32;
            let nw = (w as f32 * scale).round() as u32;
            let nh = (h as f32 * scale).round() as u32;
            (
                imageops::resize(frame.image(), nw, nh, FilterType::CatmullRom),
                scale,
            )
        } else {
            (frame.image().clone(), 1.0)
        };

        let image = if self.config.equalize {
            equalize_luminance(&image)
        } else {
            image
        };

        PreparedFrame {
            index: frame.index,
            image,
            scale,
        }
    }
}

/// Equalizes the luminance histogram, scaling each pixel's channels by the same factor.
pub fn equalize_luminance(image: &RgbImage) -> RgbImage {
    let gray = imageops::grayscale(image);
    let equalized = equalize_histogram(&gray);

    let mut out = image.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        let before = gray.get_pixel(x, y)[0] as f32;
        let after = equalized.get_pixel(x, y)[0] as f32;

        if before == 0.0 {
            let v = after as u8;
            px.0 = [v, v, v];
            continue;
        }

        let gain = after / before;
        for c in px.0.iter_mut() {
            *c = (*c as f32 * gain).round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}

/// Upscaled crop, its Otsu-binarized equalized grayscale, and that binarization inverted.
pub fn ocr_variants(crop: &RgbImage, upscale: f32) -> Vec<DynamicImage> {
    let (w, h) = crop.dimensions();
    let nw = ((w as f32 * upscale).round() as u32).max(1);
    let nh = ((h as f32 * upscale).round() as u32).max(1);
    let upscaled = imageops::resize(crop, nw, nh, FilterType::CatmullRom);

    let gray = equalize_histogram(&imageops::grayscale(&upscaled));
    let binary = binarize(&gray, otsu_level(&gray));
    let mut inverted = binary.clone();
    imageops::invert(&mut inverted);

    vec![
        DynamicImage::ImageRgb8(upscaled),
        DynamicImage::ImageLuma8(binary),
        DynamicImage::ImageLuma8(inverted),
    ]
}

/// Pixels under `bbox`, clipped to the image. `None` when nothing is left.
pub fn crop(image: &RgbImage, bbox: &BBox<Ltrb>) -> Option<RgbImage> {
    let (w, h) = image.dimensions();
    let clipped = bbox.clip(w as f32, h as f32);

    let x = clipped.left().floor() as u32;
    let y = clipped.top().floor() as u32;
    let cw = (clipped.right().ceil() as u32).min(w).saturating_sub(x);
    let ch = (clipped.bottom().ceil() as u32).min(h).saturating_sub(y);
    if cw == 0 || ch == 0 {
        return None;
    }

    Some(imageops::crop_imm(image, x, y, cw, ch).to_image())
}

fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > level {
            image::Luma([255])
        } else {
            image::Luma([0])
        }
    })
}
