use image::DynamicImage;
use rayon::prelude::*;

use crate::filter::{AppliedFilter, FilterType};

/// Per-filter treatment applied on top of the filter's base adjustments.
/// Each amount is blended in proportion to the filter intensity.
#[derive(Clone, Copy, Default)]
struct Look {
    grayscale: f32,
    sepia: f32,
    fade: f32,
}

fn look(filter_type: FilterType) -> Look {
    match filter_type {
        FilterType::Mono | FilterType::Noir => Look {
            grayscale: 1.0,
            ..Look::default()
        },
        FilterType::Sepia => Look {
            sepia: 1.0,
            ..Look::default()
        },
        FilterType::Vintage => Look {
            sepia: 0.25,
            fade: 0.08,
            ..Look::default()
        },
        FilterType::Fade => Look {
            fade: 0.15,
            ..Look::default()
        },
        _ => Look::default(),
    }
}

/// Applies the filter's look. Filters without a look (or ineffective ones)
/// return the input untouched.
pub fn apply(img: DynamicImage, filter: Option<&AppliedFilter>) -> DynamicImage {
    let Some(filter) = filter.filter(|f| f.is_effective()) else {
        return img;
    };
    let k = filter.intensity();
    let look = look(filter.filter_type());
    let grayscale = look.grayscale * k;
    let sepia = look.sepia * k;
    let fade = look.fade * k;
    if grayscale < 0.001 && sepia < 0.001 && fade < 0.001 {
        return img;
    }

    let mut rgba = img.to_rgba8();
    rgba.par_chunks_mut(4).for_each(|px| {
        let r = px[0] as f32 / 255.0;
        let g = px[1] as f32 / 255.0;
        let b = px[2] as f32 / 255.0;
        let luma = 0.2126 * r + 0.7152 * g + 0.0722 * b;

        let mut rgb = [r, g, b];
        for c in 0..3 {
            rgb[c] += (luma - rgb[c]) * grayscale;
        }

        if sepia > 0.0 {
            let toned = [
                0.393 * r + 0.769 * g + 0.189 * b,
                0.349 * r + 0.686 * g + 0.168 * b,
                0.272 * r + 0.534 * g + 0.131 * b,
            ];
            for c in 0..3 {
                rgb[c] += (toned[c].min(1.0) - rgb[c]) * sepia;
            }
        }

        // Fade lifts blacks and compresses whites.
        for c in 0..3 {
            rgb[c] = rgb[c] * (1.0 - fade) + fade * 0.5;
            px[c] = (rgb[c].clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    });

    DynamicImage::ImageRgba8(rgba)
}
