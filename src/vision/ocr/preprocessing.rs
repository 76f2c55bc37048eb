// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing: resize and normalize into NCHW tensors

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

/// Square input size of the detection model
pub const DET_INPUT_SIZE: u32 = 640;

/// Recognition model input height
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Maximum width for recognition model input
pub const REC_MAX_WIDTH: u32 = 320;

/// ImageNet mean, per RGB channel
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet std, per RGB channel
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Letterbox padding color
const PAD_GRAY: Rgb<u8> = Rgb([128, 128, 128]);

/// Fill an RGB image into a `[1, 3, H, W]` tensor as `(pixel / 255 - mean) / std`
fn rgb_to_tensor(rgb: &RgbImage, mean: &[f32; 3], std: &[f32; 3]) -> Array4<f32> {
    let (width, height) = rgb.dimensions();
    let mut tensor = Array4::zeros((1, 3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
        }
    }
    tensor
}

/// Letterbox an image onto a `DET_INPUT_SIZE` square and normalize it
pub fn preprocess_for_detection(image: &DynamicImage) -> Array4<f32> {
    let padded = resize_with_padding(image, DET_INPUT_SIZE);
    rgb_to_tensor(&padded.to_rgb8(), &MEAN, &STD)
}

/// Resize a cropped text region to the recognition height
///
/// Width follows the aspect ratio, clamped to `[4, REC_MAX_WIDTH]`.
pub fn preprocess_for_recognition(image: &DynamicImage) -> Array4<f32> {
    let (orig_w, orig_h) = image.dimensions();
    let scale = REC_INPUT_HEIGHT as f32 / orig_h.max(1) as f32;
    let new_width = ((orig_w as f32 * scale).round() as u32).clamp(4, REC_MAX_WIDTH);

    let resized = image.resize_exact(new_width, REC_INPUT_HEIGHT, FilterType::Lanczos3);
    rgb_to_tensor(&resized.to_rgb8(), &MEAN, &STD)
}

/// Preprocess a whole image for a fixed-size local recognizer
///
/// `channels` must be 1 (grayscale) or 3 (RGB); `mean`/`std` hold either one
/// value broadcast over all channels or one value per channel.
pub fn preprocess_fixed(
    image: &DynamicImage,
    channels: usize,
    height: u32,
    width: u32,
    mean: &[f32],
    std: &[f32],
) -> anyhow::Result<Array4<f32>> {
    if channels != 1 && channels != 3 {
        anyhow::bail!("unsupported input channel count: {}", channels);
    }
    if height == 0 || width == 0 {
        anyhow::bail!("invalid input size {}x{}", height, width);
    }
    let per_channel = |values: &[f32], name: &str| -> anyhow::Result<Vec<f32>> {
        match values.len() {
            1 => Ok(vec![values[0]; channels]),
            n if n == channels => Ok(values.to_vec()),
            n => anyhow::bail!("{} has {} values, expected 1 or {}", name, n, channels),
        }
    };
    let mean = per_channel(mean, "normalize_mean")?;
    let std = per_channel(std, "normalize_std")?;
    if std.iter().any(|s| *s == 0.0) {
        anyhow::bail!("normalize_std must not contain zero");
    }

    let resized = image.resize_exact(width, height, FilterType::Triangle);
    let mut tensor = Array4::zeros((1, channels, height as usize, width as usize));

    if channels == 1 {
        let gray = resized.to_luma8();
        for (x, y, pixel) in gray.enumerate_pixels() {
            tensor[[0, 0, y as usize, x as usize]] = (pixel[0] as f32 / 255.0 - mean[0]) / std[0];
        }
    } else {
        let rgb = resized.to_rgb8();
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
            }
        }
    }

    Ok(tensor)
}

/// Scale to fit a `target_size` square preserving aspect ratio, centered on gray
pub fn resize_with_padding(image: &DynamicImage, target_size: u32) -> DynamicImage {
    let info = PreprocessInfo::new(image, target_size);
    let mut output = RgbImage::from_pixel(target_size, target_size, PAD_GRAY);

    if info.original_width == 0 || info.original_height == 0 {
        return DynamicImage::ImageRgb8(output);
    }

    let resized = image
        .resize_exact(info.scaled_width, info.scaled_height, FilterType::Lanczos3)
        .to_rgb8();
    image::imageops::replace(&mut output, &resized, info.offset_x as i64, info.offset_y as i64);

    DynamicImage::ImageRgb8(output)
}

/// Geometry of a letterbox operation, for mapping detections back
#[derive(Debug, Clone, Copy)]
pub struct PreprocessInfo {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl PreprocessInfo {
    pub fn new(image: &DynamicImage, target_size: u32) -> Self {
        let (orig_w, orig_h) = image.dimensions();

        if orig_w == 0 || orig_h == 0 {
            return Self {
                scale: 1.0,
                offset_x: 0,
                offset_y: 0,
                scaled_width: 0,
                scaled_height: 0,
                original_width: orig_w,
                original_height: orig_h,
            };
        }

        let scale = (target_size as f32 / orig_w as f32).min(target_size as f32 / orig_h as f32);
        let scaled_width = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
        let scaled_height = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            scaled_width,
            scaled_height,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map a point from letterboxed space back to the original image, clamped to its bounds
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.offset_x as f32) / self.scale;
        let orig_y = (y - self.offset_y as f32) / self.scale;
        (
            orig_x.clamp(0.0, self.original_width as f32),
            orig_y.clamp(0.0, self.original_height as f32),
        )
    }
}
