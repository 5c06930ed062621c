use image::DynamicImage;
use rayon::prelude::*;

use crate::adjustments::{AdjustmentField, Adjustments};

const EPS: f32 = 0.001;

/// Applies brightness, exposure, contrast, highlights, and shadows.
pub fn apply(img: DynamicImage, adjustments: &Adjustments) -> DynamicImage {
    let brightness = adjustments.get(AdjustmentField::Brightness);
    let exposure = adjustments.get(AdjustmentField::Exposure);
    let contrast = adjustments.get(AdjustmentField::Contrast);
    let highlights = adjustments.get(AdjustmentField::Highlights);
    let shadows = adjustments.get(AdjustmentField::Shadows);

    if brightness.abs() < EPS
        && exposure.abs() < EPS
        && contrast.abs() < EPS
        && highlights.abs() < EPS
        && shadows.abs() < EPS
    {
        return img;
    }

    let exposure_gain = 2.0_f32.powf(exposure);
    let contrast_gain = 1.0 + contrast;
    let offset = brightness * 0.5;

    let mut rgba = img.to_rgba8();
    rgba.par_chunks_mut(4).for_each(|px| {
        let mut rgb = [0.0_f32; 3];
        for c in 0..3 {
            let v = px[c] as f32 / 255.0;
            // Exposure, then brightness offset, then contrast around mid-gray.
            rgb[c] = (((v * exposure_gain + offset) - 0.5) * contrast_gain + 0.5).clamp(0.0, 1.0);
        }

        let luma = 0.2126 * rgb[0] + 0.7152 * rgb[1] + 0.0722 * rgb[2];
        let mut target_luma = luma;

        if shadows.abs() > EPS {
            let w = 1.0 - smoothstep(0.0, 0.5, target_luma);
            if shadows >= 0.0 {
                target_luma += (1.0 - target_luma) * shadows * w;
            } else {
                target_luma *= 1.0 + shadows * w;
            }
        }

        if highlights.abs() > EPS {
            let w = smoothstep(0.5, 1.0, target_luma);
            if highlights >= 0.0 {
                target_luma += (1.0 - target_luma) * highlights * w;
            } else {
                target_luma *= 1.0 + highlights * w;
            }
        }

        let scale = if luma > 1e-5 { target_luma / luma } else { 1.0 };
        for c in 0..3 {
            px[c] = ((rgb[c] * scale).clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    });

    DynamicImage::ImageRgba8(rgba)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
