// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for the plate detector and text recognizer

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use ndarray::Array4;

/// Default square input size for the YOLO plate detector
pub const DETECTOR_INPUT_SIZE: u32 = 640;

/// Letterbox padding value used by YOLO exports
pub const LETTERBOX_FILL: u8 = 114;

/// Recognition model input height
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Maximum width for recognition model input
pub const REC_MAX_WIDTH: u32 = 320;

/// Minimum width for recognition model input
pub const REC_MIN_WIDTH: u32 = 4;

/// Mean values for recognizer normalization (ImageNet)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for recognizer normalization (ImageNet)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Preprocess an image for plate detection
///
/// Steps:
/// 1. Letterbox to `target_size` x `target_size` (aspect preserved, grey padding)
/// 2. Scale pixels to [0, 1]
/// 3. Convert to NCHW tensor format [1, 3, S, S]
///
/// Returns the tensor together with the [`PreprocessInfo`] needed to map
/// detector boxes back onto the source image.
pub fn preprocess_for_detection(image: &RgbImage, target_size: u32) -> (Array4<f32>, PreprocessInfo) {
    let info = PreprocessInfo::new(image, target_size);
    let letterboxed = letterbox(image, target_size, &info);

    let size = target_size as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));

    for (x, y, pixel) in letterboxed.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
        }
    }

    (tensor, info)
}

/// Preprocess a cropped plate region for recognition
///
/// Steps:
/// 1. Resize to height 48, dynamic width (aspect preserved, clamped to [4, 320])
/// 2. Normalize with ImageNet mean/std
/// 3. Convert to NCHW tensor format [1, 3, 48, W]
pub fn preprocess_for_recognition(region: &RgbImage) -> Array4<f32> {
    let (orig_w, orig_h) = region.dimensions();

    let scale = REC_INPUT_HEIGHT as f32 / orig_h.max(1) as f32;
    let new_width = ((orig_w as f32 * scale).round() as u32).clamp(REC_MIN_WIDTH, REC_MAX_WIDTH);

    let resized = imageops::resize(region, new_width, REC_INPUT_HEIGHT, FilterType::Lanczos3);

    let mut tensor = Array4::zeros((1, 3, REC_INPUT_HEIGHT as usize, new_width as usize));

    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let normalized = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            tensor[[0, c, y as usize, x as usize]] = normalized;
        }
    }

    tensor
}

/// Resize with aspect ratio preservation and centre the result on a grey canvas
fn letterbox(image: &RgbImage, target_size: u32, info: &PreprocessInfo) -> RgbImage {
    let mut output = RgbImage::from_pixel(
        target_size,
        target_size,
        Rgb([LETTERBOX_FILL, LETTERBOX_FILL, LETTERBOX_FILL]),
    );

    if info.original_width == 0 || info.original_height == 0 {
        return output;
    }

    let resized = imageops::resize(image, info.scaled_width, info.scaled_height, FilterType::Triangle);
    imageops::replace(
        &mut output,
        &resized,
        info.offset_x as i64,
        info.offset_y as i64,
    );

    output
}

/// Scaling factor and offsets used during letterboxing
///
/// Maps detector-space coordinates back to the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessInfo {
    /// Scale factor applied
    pub scale: f32,
    /// X offset from padding
    pub offset_x: u32,
    /// Y offset from padding
    pub offset_y: u32,
    /// Width after scaling, before padding
    pub scaled_width: u32,
    /// Height after scaling, before padding
    pub scaled_height: u32,
    /// Original image width
    pub original_width: u32,
    /// Original image height
    pub original_height: u32,
}

impl PreprocessInfo {
    /// Calculate preprocessing info for an image
    pub fn new(image: &RgbImage, target_size: u32) -> Self {
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
        let new_w = ((orig_w as f32 * scale).round() as u32).clamp(1, target_size);
        let new_h = ((orig_h as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            offset_x: (target_size - new_w) / 2,
            offset_y: (target_size - new_h) / 2,
            scaled_width: new_w,
            scaled_height: new_h,
            original_width: orig_w,
            original_height: orig_h,
        }
    }

    /// Map a coordinate from preprocessed space back to original image space
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.offset_x as f32) / self.scale;
        let orig_y = (y - self.offset_y as f32) / self.scale;
        (orig_x, orig_y)
    }
}
