use std::f32::consts::{FRAC_PI_2, PI};

use image::{DynamicImage, Rgba};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

use crate::crop::CropRotateState;

const ANGLE_EPS: f32 = 1e-4;

/// Apply geometry from `state` to `img`.
/// Order: rotate → flip → crop.
pub fn apply(img: DynamicImage, state: &CropRotateState) -> DynamicImage {
    if state.is_identity() {
        return img;
    }

    let mut out = rotate(img, state.rotation());

    if state.flip_horizontal() {
        out = out.fliph();
    }
    if state.flip_vertical() {
        out = out.flipv();
    }

    // Crop last, in normalized 0.0–1.0 coordinates of the rotated frame.
    let crop = state.crop();
    if !crop.is_full() {
        let w = out.width() as f32;
        let h = out.height() as f32;
        let cx = (crop.x * w) as u32;
        let cy = (crop.y * h) as u32;
        let cw = (crop.width * w).min(w - cx as f32).round() as u32;
        let ch = (crop.height * h).min(h - cy as f32).round() as u32;
        if cw > 0 && ch > 0 {
            out = out.crop_imm(cx, cy, cw, ch);
        }
    }

    out
}

/// Clockwise rotation in radians. Quarter turns are exact; other angles are
/// resampled bilinearly onto the same canvas with black fill.
fn rotate(img: DynamicImage, radians: f32) -> DynamicImage {
    if radians.abs() < ANGLE_EPS {
        return img;
    }
    if (radians - FRAC_PI_2).abs() < ANGLE_EPS {
        return img.rotate90();
    }
    if (radians + FRAC_PI_2).abs() < ANGLE_EPS {
        return img.rotate270();
    }
    if (radians.abs() - PI).abs() < ANGLE_EPS {
        return img.rotate180();
    }

    let rgba = img.to_rgba8();
    let rotated = rotate_about_center(
        &rgba,
        radians,
        Interpolation::Bilinear,
        Rgba([0u8, 0u8, 0u8, 255u8]),
    );
    DynamicImage::ImageRgba8(rotated)
}
